use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aria_agent::agent::{
    ChromiumConnector, PageReaderEngine, ProviderDeps, UnconfiguredModel, UrlBlocklist,
    find_chrome, provider_from_name,
};
use aria_agent::conversation::{ConversationLoop, VoiceIo};
use aria_agent::voice::{Cues, HotkeyListener, Narrator, Player, PushToTalk, detect_backend};
use aria_agent::{Config, speech};

/// Aria - conversational accessibility agent for web and desktop
#[derive(Parser)]
#[command(name = "aria", version, about)]
struct Cli {
    /// Agent backend: "browser" or "computer"
    #[arg(short, long, env = "ARIA_AGENT_PROVIDER", default_value = "browser")]
    provider: String,

    /// URL to open on the first agent turn
    #[arg(short, long, env = "ARIA_START_URL")]
    start_url: Option<String>,

    /// Use voice input/output instead of the keyboard
    #[arg(long)]
    voice: bool,

    /// Propagate turn errors instead of degrading to spoken summaries
    #[arg(long)]
    debug: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Cut off a push-to-talk recording after this many seconds
    #[arg(long)]
    max_capture_secs: Option<u64>,

    /// Disable the on-disk narration cache
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,aria_agent=info",
        1 => "info,aria_agent=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::resolve(
        &cli.provider,
        cli.start_url,
        cli.voice,
        cli.debug,
        cli.max_capture_secs,
        cli.no_cache,
    )?;

    preflight(&config);

    tracing::info!(
        provider = %config.agent_provider,
        start_url = ?config.start_url,
        voice = config.voice.enabled,
        "starting aria"
    );

    let blocklist = UrlBlocklist::new(config.url_blocklist.clone());
    let deps = ProviderDeps {
        browser_engine: Box::new(PageReaderEngine::new(config.browser.clone())),
        computer_model: Box::new(UnconfiguredModel),
        computer_connector: Box::new(ChromiumConnector::new(config.browser.clone())),
        safety_ack: Arc::new(ask_safety_ack),
        blocklist,
    };
    let provider = provider_from_name(&config.agent_provider, deps)?;

    let voice = if config.voice.enabled {
        Some(build_voice(&config)?)
    } else {
        None
    };

    ConversationLoop::new(provider, voice, config.start_url.clone(), config.debug)
        .run()
        .await?;
    Ok(())
}

/// Wire up capture and narration for a spoken session
fn build_voice(config: &Config) -> anyhow::Result<VoiceIo> {
    let hotkeys = Arc::new(HotkeyListener::spawn()?);
    let cues = Arc::new(Cues::new(&config.voice.cache_dir.join("cues"))?);

    let stt = speech::stt_provider(&config.speech)?;
    let tts = speech::tts_provider(&config.speech)?;

    let capture = PushToTalk::new(
        stt,
        Arc::clone(&hotkeys),
        Arc::clone(&cues),
        &config.voice,
    )?;
    let player = Player::new(Some(Arc::clone(&hotkeys)), Some(Arc::clone(&cues)));
    let narrator = Arc::new(Narrator::new(
        tts,
        Arc::new(player),
        &config.voice.cache_dir,
        config.voice.cache_narration,
    )?);

    Ok(VoiceIo { capture, narrator })
}

/// Log actionable warnings for missing host tooling before anything
/// launches. None of these are fatal on their own; the component that
/// actually needs the tool fails with its own error.
fn preflight(config: &Config) {
    if config.browser.chrome_path.is_none() && find_chrome().is_none() {
        tracing::warn!(
            "no Chrome/Chromium found on PATH; install one or set ARIA_CHROME_PATH"
        );
    }
    if config.voice.enabled {
        if detect_backend().is_none() {
            tracing::warn!(
                "no audio player found (tried afplay, mpg123, aplay, paplay); \
                 narration will fail until one is installed"
            );
        }
        if config.speech.openai_api_key.is_none()
            && (config.speech.stt_provider == "openai" || config.speech.tts_provider == "openai")
        {
            tracing::warn!(
                "OPENAI_API_KEY is not set; set it or switch ARIA_STT_PROVIDER / \
                 ARIA_TTS_PROVIDER to 'system'"
            );
        }
    }
}

/// Ask the user to confirm a pending safety check on the terminal
fn ask_safety_ack(message: &str) -> bool {
    use std::io::{BufRead, Write};
    println!("Safety check: {message}");
    print!("Acknowledge and continue? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
