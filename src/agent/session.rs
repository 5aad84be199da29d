//! CDP-backed automation session
//!
//! One Chromium instance, one page, driven over the `DevTools` protocol via
//! `chromiumoxide`. The same session serves both provider variants: the
//! browser provider uses it as an [`AutomationSession`], the computer
//! provider as a [`Computer`] in the `browser` environment.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::actions::ComputerAction;
use super::computer::{Computer, ComputerConnector, ComputerEnvironment};
use super::engine::AutomationSession;
use crate::config::BrowserConfig;
use crate::{Error, Result};

/// Executable names probed when no Chrome path is configured
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Default pause for a `wait` action
const DEFAULT_WAIT: Duration = Duration::from_millis(1000);

/// Locate a Chrome/Chromium executable on `PATH`
#[must_use]
pub fn find_chrome() -> Option<PathBuf> {
    CHROME_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// A live browser session: the launched process, its CDP event pump, and
/// the single page all actions target.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    width: u32,
    height: u32,
}

impl ChromiumSession {
    /// Launch Chromium and open a blank page.
    ///
    /// # Errors
    ///
    /// Returns `Error::Browser` if no executable can be found or the
    /// launch fails.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let chrome_path = match &config.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                Error::Browser(
                    "no Chrome/Chromium executable found; set --chrome-path or ARIA_CHROME_PATH"
                        .to_string(),
                )
            })?,
        };

        let mut builder = ChromeConfig::builder()
            .chrome_executable(&chrome_path)
            .window_size(config.width, config.height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");
        if config.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let chrome_config = builder
            .build()
            .map_err(|e| Error::Browser(format!("config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(chrome_config)
            .await
            .map_err(|e| Error::Browser(format!("launch failed: {e}")))?;

        // Event pump; ends when the browser drops.
        let handler = tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Browser(format!("new page failed: {e}")))?;

        tracing::info!(chrome = %chrome_path.display(), "browser session launched");
        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler: Some(handler),
            width: config.width,
            height: config.height,
        })
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| Error::Browser("session is closed".to_string()))
    }

    async fn evaluate(&self, script: String) -> Result<Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| Error::Browser(format!("script failed: {e}")))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| Error::Browser(format!("navigation to {url} failed: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| Error::Browser(format!("navigation to {url} did not settle: {e}")))?;
        tracing::debug!(%url, "navigated");
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| Error::Browser(format!("url query failed: {e}")))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn screenshot_b64(&self) -> Result<String> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let data = self
            .page()?
            .screenshot(params)
            .await
            .map_err(|e| Error::Browser(format!("screenshot failed: {e}")))?;
        Ok(BASE64.encode(data))
    }

    fn shutdown(&mut self) {
        if let Some(browser) = self.browser.take() {
            drop(self.page.take());
            drop(browser);
            if let Some(handler) = self.handler.take() {
                handler.abort();
            }
            tracing::info!("browser session closed");
        }
    }

    /// Synthesize a mouse event at page coordinates via script injection
    async fn dispatch_mouse(&self, event: &str, x: i64, y: i64) -> Result<()> {
        let script = format!(
            "(() => {{ const el = document.elementFromPoint({x}, {y}) || document.body; \
             el.dispatchEvent(new MouseEvent('{event}', {{bubbles: true, cancelable: true, \
             clientX: {x}, clientY: {y}, view: window}})); }})()"
        );
        self.evaluate(script).await.map(|_| ())
    }

    async fn click_at(&self, x: i64, y: i64) -> Result<()> {
        self.dispatch_mouse("mousedown", x, y).await?;
        self.dispatch_mouse("mouseup", x, y).await?;
        let script = format!(
            "(() => {{ const el = document.elementFromPoint({x}, {y}); if (el) el.click(); }})()"
        );
        self.evaluate(script).await.map(|_| ())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        // JSON-encode the text so it lands in the script as a safe literal.
        let literal = Value::String(text.to_string()).to_string();
        let script = format!(
            "(() => {{ const el = document.activeElement; \
             if (el && ('value' in el || el.isContentEditable)) \
             document.execCommand('insertText', false, {literal}); }})()"
        );
        self.evaluate(script).await.map(|_| ())
    }

    async fn press_keys(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            let literal = Value::String(key.clone()).to_string();
            let script = format!(
                "(() => {{ const el = document.activeElement || document.body; \
                 for (const type of ['keydown', 'keyup']) \
                 el.dispatchEvent(new KeyboardEvent(type, {{bubbles: true, key: {literal}}})); }})()"
            );
            self.evaluate(script).await?;
        }
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl AutomationSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.navigate(url).await
    }

    async fn current_url(&mut self) -> Result<String> {
        self.url().await
    }

    async fn describe(&mut self) -> Result<String> {
        let url = self.url().await?;
        let title = self
            .page()?
            .get_title()
            .await
            .map_err(|e| Error::Browser(format!("title query failed: {e}")))?;
        Ok(match title.filter(|t| !t.trim().is_empty()) {
            Some(title) => format!("The current page is \"{title}\" at {url}."),
            None => format!("The current page is {url}."),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

#[async_trait]
impl Computer for ChromiumSession {
    fn environment(&self) -> ComputerEnvironment {
        ComputerEnvironment::Browser
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn perform(&self, action: &ComputerAction) -> Result<()> {
        match action {
            ComputerAction::Click { x, y, .. } => self.click_at(*x, *y).await,
            ComputerAction::DoubleClick { x, y } => {
                self.click_at(*x, *y).await?;
                self.dispatch_mouse("dblclick", *x, *y).await
            }
            ComputerAction::Move { x, y } => self.dispatch_mouse("mousemove", *x, *y).await,
            ComputerAction::Drag { path } => {
                let Some((first, rest)) = path.split_first() else {
                    return Ok(());
                };
                self.dispatch_mouse("mousedown", first.x, first.y).await?;
                for point in rest {
                    self.dispatch_mouse("mousemove", point.x, point.y).await?;
                }
                let last = path.last().unwrap_or(first);
                self.dispatch_mouse("mouseup", last.x, last.y).await
            }
            ComputerAction::Scroll {
                x, y, scroll_x, scroll_y,
            } => {
                self.dispatch_mouse("mousemove", *x, *y).await?;
                self.evaluate(format!("window.scrollBy({scroll_x}, {scroll_y})"))
                    .await
                    .map(|_| ())
            }
            ComputerAction::Type { text } => self.type_text(text).await,
            ComputerAction::Keypress { keys } => self.press_keys(keys).await,
            ComputerAction::Wait { ms } => {
                let pause = ms.map_or(DEFAULT_WAIT, Duration::from_millis);
                tokio::time::sleep(pause).await;
                Ok(())
            }
            // The provider screenshots after every action anyway.
            ComputerAction::Screenshot => Ok(()),
            ComputerAction::Goto { url } => self.navigate(url).await,
            ComputerAction::Back => self.evaluate("history.back()".to_string()).await.map(|_| ()),
        }
    }

    async fn screenshot(&self) -> Result<String> {
        self.screenshot_b64().await
    }

    async fn current_url(&self) -> Result<String> {
        self.url().await
    }

    async fn close(&mut self) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

/// Connects the computer provider to a fresh browser-backed computer
pub struct ChromiumConnector {
    config: BrowserConfig,
}

impl ChromiumConnector {
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ComputerConnector for ChromiumConnector {
    async fn connect(&self) -> Result<Box<dyn Computer>> {
        let session = ChromiumSession::launch(&self.config).await?;
        Ok(Box::new(session))
    }
}
