pub mod session;

use crate::browser::Locator;
use crate::global;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub use session::{session_env, CaptureSettings, SessionConfig};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserSettings,
    pub locators: LocatorConfig,
    pub timing: TimingConfig,
    pub recorder: RecorderConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary; searched on PATH when unset.
    pub executable: Option<PathBuf>,
    /// Timeout for individual DevTools requests.
    pub request_timeout_seconds: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            request_timeout_seconds: 30,
        }
    }
}

/// Candidate lists for every UI element the bot touches.
///
/// Meet changes its markup regularly; these can be updated in the config
/// file without rebuilding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Script run when no join button candidate resolves.
    pub legacy_join_script: String,
    pub name_input: Vec<Locator>,
    pub join_button: Vec<Locator>,
    /// Any of these visible means the bot is in the call.
    pub leave_call: Vec<Locator>,
    pub lobby: Vec<Locator>,
    pub call_ended: Vec<Locator>,
    pub popups: Vec<Locator>,
    pub participant_count: Vec<Locator>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            legacy_join_script:
                r#"(() => { const b = document.getElementsByClassName("snByac")[1]; if (!b) return false; b.click(); return true; })()"#
                    .to_string(),
            name_input: vec![
                Locator::css(r#"input[aria-label="Your name"]"#),
                Locator::css(r#"input[aria-label="Tên của bạn"]"#),
                Locator::xpath(
                    r#"//input[@name="name" or @aria-label="Your name" or @aria-label="Tên của bạn"]"#,
                ),
                Locator::xpath(r#"//*[@role="textbox"]"#),
            ],
            join_button: vec![
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Ask to join"]]"#),
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Join now"]]"#),
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Yêu cầu tham gia"]]"#),
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Tham gia"]]"#),
                Locator::xpath(
                    r#"//*[contains(concat(" ", normalize-space(@class), " "), " snByac ")]"#,
                ),
                Locator::xpath(
                    r#"//*[@role="button" and .//span[contains(translate(normalize-space(.),"ABCDEFGHIJKLMNOPQRSTUVWXYZ","abcdefghijklmnopqrstuvwxyz"), "join") or contains(normalize-space(.), "tham gia")]]"#,
                ),
            ],
            leave_call: vec![
                Locator::css(r#"button[aria-label="Leave call"]"#),
                Locator::css(r#"button[aria-label="Rời khỏi cuộc gọi"]"#),
                Locator::css(r#"button[jsname="CQylAd"]"#),
                Locator::xpath(r#"//button[contains(@aria-label, "Leave call")]"#),
            ],
            lobby: vec![
                Locator::xpath(r#"//*[contains(normalize-space(.), "Asking to be let in")]"#),
                Locator::xpath(
                    r#"//*[contains(normalize-space(.), "Đang yêu cầu tham gia")]"#,
                ),
            ],
            call_ended: vec![
                Locator::xpath(
                    r#"//*[contains(concat(" ", normalize-space(@class), " "), " j7nIZb ")]//*[contains(concat(" ", normalize-space(@class), " "), " snByac ")]"#,
                ),
                Locator::xpath(
                    r#"//*[contains(concat(" ", normalize-space(@class), " "), " nS35F ")]//*[contains(concat(" ", normalize-space(@class), " "), " snByac ")]"#,
                ),
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Return to home screen"]]"#),
                Locator::xpath(r#"//*[contains(normalize-space(.), "You've been removed from the meeting")]"#),
                Locator::xpath(r#"//*[contains(normalize-space(.), "You can't join this call")]"#),
                Locator::xpath(r#"//*[contains(normalize-space(.), "You left the meeting")]"#),
            ],
            popups: vec![
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Got it"]]"#),
                Locator::xpath(r#"//button[.//span[normalize-space(text())="Dismiss"]]"#),
                Locator::css(r#"div[role="dialog"] button[aria-label="Close"]"#),
            ],
            participant_count: vec![
                Locator::xpath(
                    r#"//*[@id="ow3"]/div[1]/div/div[4]/div[3]/div[6]/div[3]/div/div[2]/div[1]/span/span/div/div/span[2]"#,
                ),
                Locator::css(r#"div.uGOf1d"#),
            ],
        }
    }
}

/// Delays and bounds for the join, admission and watch phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub page_settle_ms: u64,
    pub after_mute_ms: u64,
    pub after_name_ms: u64,
    pub name_input_timeout_ms: u64,
    pub join_button_timeout_ms: u64,
    pub post_join_settle_ms: u64,
    pub locator_poll_ms: u64,
    pub admission_poll_ms: u64,
    pub watch_interval_ms: u64,
    pub recorder_grace_ms: u64,
    pub notify_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_settle_ms: 6_000,
            after_mute_ms: 1_500,
            after_name_ms: 500,
            name_input_timeout_ms: 10_000,
            join_button_timeout_ms: 10_000,
            post_join_settle_ms: 5_000,
            locator_poll_ms: 250,
            admission_poll_ms: 2_000,
            watch_interval_ms: 6_000,
            recorder_grace_ms: 10_000,
            notify_timeout_ms: 10_000,
        }
    }
}

impl TimingConfig {
    /// No settle delays or page waits; the recorder and notification bounds
    /// keep their defaults. Used to drive the flows against scripted pages.
    pub fn immediate() -> Self {
        Self {
            page_settle_ms: 0,
            after_mute_ms: 0,
            after_name_ms: 0,
            name_input_timeout_ms: 0,
            join_button_timeout_ms: 0,
            post_join_settle_ms: 0,
            locator_poll_ms: 0,
            admission_poll_ms: 0,
            watch_interval_ms: 0,
            ..Self::default()
        }
    }

    /// Poll intervals must be non-zero or the loops spin on the DevTools
    /// connection.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("locator_poll_ms", self.locator_poll_ms),
            ("admission_poll_ms", self.admission_poll_ms),
            ("watch_interval_ms", self.watch_interval_ms),
        ] {
            if value == 0 {
                bail!("timing.{} must be greater than zero", name);
            }
        }
        Ok(())
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub fn admission_poll(&self) -> Duration {
        Duration::from_millis(self.admission_poll_ms)
    }

    pub fn locator_poll(&self) -> Duration {
        Duration::from_millis(self.locator_poll_ms)
    }

    pub fn recorder_grace(&self) -> Duration {
        Duration::from_millis(self.recorder_grace_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub ffmpeg: String,
    /// X11 display grabbed on Linux; falls back to `$DISPLAY`.
    pub linux_display: Option<String>,
    pub linux_audio_source: String,
    /// avfoundation `video:audio` device pair on macOS.
    pub macos_input: String,
    pub preset: String,
    pub crf: u32,
    pub audio_bitrate: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            linux_display: None,
            linux_audio_source: "default".to_string(),
            macos_input: "1:none".to_string(),
            preset: "ultrafast".to_string(),
            crf: 18,
            audio_bitrate: "128k".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub record_dir: PathBuf,
    /// Prefix used to build `file_url` in responses and webhooks.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            record_dir: PathBuf::from("/var/app/recordings"),
            public_base_url: None,
        }
    }
}

impl Config {
    /// Load from `path`, or the default location when `None`.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => global::config_file()?,
        };

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save(&config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .timing
            .validate()
            .with_context(|| format!("Invalid config file {:?}", config_path))?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}
