//! URL blocklist enforcement for browser-capable environments

use url::Url;

use crate::{Error, Result};

/// Hostnames the agent must never land on.
///
/// A host matches exactly or as a parent domain ("example.com" blocks
/// "sub.example.com"). Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct UrlBlocklist {
    hosts: Vec<String>,
}

impl UrlBlocklist {
    /// Build a blocklist from hostnames
    #[must_use]
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Whether the blocklist has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Whether `url` resolves to a blocked host
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        if self.hosts.is_empty() {
            return false;
        }
        let Ok(parsed) = Url::parse(url) else {
            // Non-URL targets (about:blank etc.) can't match a hostname.
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_lowercase();
        self.hosts
            .iter()
            .any(|blocked| host == *blocked || host.ends_with(&format!(".{blocked}")))
    }
}

/// Fail the turn when `url` is blocklisted.
///
/// Applied after every navigating action; violations always surface, they
/// are never degraded to a summary.
///
/// # Errors
///
/// Returns `Error::BlockedUrl` on a match.
pub fn check_blocklisted_url(url: &str, blocklist: &UrlBlocklist) -> Result<()> {
    if blocklist.matches(url) {
        tracing::warn!(%url, "navigation hit the URL blocklist");
        return Err(Error::BlockedUrl(url.to_string()));
    }
    Ok(())
}
