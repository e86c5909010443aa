use crate::api::{ApiServer, AppState, ProcessLauncher};
use crate::browser::{ChromeSession, LaunchOptions};
use crate::cli::{JoinCliArgs, ServeCliArgs};
use crate::config::{Config, SessionConfig};
use crate::meeting::{MeetBot, RunReport};
use crate::notify::WebhookNotifier;
use crate::recorder::FfmpegRecorder;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Run one bot session to completion.
///
/// Only a browser startup failure is returned as an error; every way the
/// meeting can end is a normal return.
pub async fn run_bot(args: JoinCliArgs, config: Config) -> Result<RunReport> {
    // Listen before launching so a signal during startup still goes through
    // the normal teardown instead of killing the process.
    let shutdown = ShutdownSignal::install();
    let session = SessionConfig::from_args(&args, |key| std::env::var(key).ok())?;
    info!(
        "Starting bot for {} as {:?}, recording to {:?}",
        session.meet_link,
        session.bot_name,
        session.output_path()
    );

    let options = LaunchOptions {
        executable: config.browser.executable.clone(),
        profile: session.profile.clone(),
        headless: session.headless,
        window_width: session.capture.width,
        window_height: session.capture.height,
        request_timeout: Duration::from_secs(config.browser.request_timeout_seconds),
    };
    let browser = ChromeSession::open(&options)
        .await
        .context("Browser session could not be started")?;

    let recorder = FfmpegRecorder::new(config.recorder.clone(), config.timing.recorder_grace());
    if !recorder.is_available() {
        warn!(
            "{} was not found; the meeting will be joined but not recorded.\n\
             Install FFmpeg:\n\
             - macOS: brew install ffmpeg\n\
             - Ubuntu/Debian: sudo apt install ffmpeg\n\
             - Windows: winget install ffmpeg",
            config.recorder.ffmpeg
        );
    }
    let capture = recorder.spec_for(&session);

    let mut bot = MeetBot::new(
        Box::new(browser),
        Box::new(recorder),
        session.clone(),
        config.locators,
        config.timing.clone(),
        capture,
    );
    if let Some(url) = &session.notify_url {
        match WebhookNotifier::new(url.clone(), config.timing.notify_timeout()) {
            Ok(notifier) => bot = bot.with_notifier(Box::new(notifier)),
            Err(e) => warn!("Notifications disabled: {:#}", e),
        }
    }

    let report = bot.run(shutdown.recv()).await;
    info!(
        "Bot finished ({:?}); recording: {:?}, notified: {}",
        report.reason, report.recording, report.notified
    );
    Ok(report)
}

pub async fn run_server(
    args: ServeCliArgs,
    config: Config,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let record_dir = args.record_dir.unwrap_or(config.server.record_dir);
    let public_base_url = config.server.public_base_url;

    let launcher = ProcessLauncher::current_exe()?
        .with_config_path(config_path)
        .with_public_base_url(public_base_url.clone());
    let state = AppState::new(record_dir, public_base_url, Arc::new(launcher))?;
    let shutdown = ShutdownSignal::install();

    tokio::select! {
        result = ApiServer::new(host, port, state).start() => result,
        _ = shutdown.recv() => {
            info!("Server stopped");
            Ok(())
        }
    }
}

/// Ctrl-C / SIGTERM listener.
///
/// Handlers are registered by `install`, so a signal that arrives before
/// `recv` is first polled is still observed.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Option<Signal>,
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl ShutdownSignal {
    /// Must be called from within the tokio runtime.
    pub fn install() -> Self {
        Self {
            #[cfg(unix)]
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
            #[cfg(unix)]
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
        }
    }

    /// Resolves once either signal has been received.
    pub async fn recv(self) {
        #[cfg(unix)]
        {
            let Self {
                mut interrupt,
                mut terminate,
            } = self;
            tokio::select! {
                _ = next_signal(&mut interrupt) => {},
                _ = next_signal(&mut terminate) => {},
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self;
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }

        info!("Termination signal received");
    }
}

#[cfg(unix)]
fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
    match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Failed to install {} handler: {}", name, e);
            None
        }
    }
}

/// Pending forever when the handler could not be installed.
#[cfg(unix)]
async fn next_signal(stream: &mut Option<Signal>) {
    if let Some(stream) = stream {
        if stream.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}
