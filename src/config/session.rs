//! Per-run session configuration assembled from CLI arguments and the
//! environment handed over by the launcher.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::ProfileLocation;
use crate::cli::JoinCliArgs;
use crate::global;

/// Environment variable names read at startup.
pub mod session_env {
    pub const REC_WIDTH: &str = "REC_WIDTH";
    pub const REC_HEIGHT: &str = "REC_HEIGHT";
    pub const REC_FPS: &str = "REC_FPS";
    pub const REC_DIR: &str = "REC_DIR";
    pub const REC_OUT: &str = "REC_OUT";
    pub const NOTIFY_URL: &str = "NOTIFY_URL";
    pub const MESSAGE_ID: &str = "MESSAGE_ID";
    pub const PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";
}

const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;
const DEFAULT_FPS: u32 = 25;
const DEFAULT_REC_DIR: &str = "/var/app/recordings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

/// Everything one bot run needs. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub meet_link: String,
    pub profile: ProfileLocation,
    pub headless: bool,
    pub min_members: u32,
    pub min_record: Duration,
    pub admission_timeout: Duration,
    pub bot_name: String,
    pub capture: CaptureSettings,
    pub output_dir: PathBuf,
    pub output_file: String,
    pub notify_url: Option<String>,
    pub message_id: Option<String>,
    pub public_base_url: Option<String>,
}

impl SessionConfig {
    /// Build from CLI args, reading the remaining settings through `env`.
    ///
    /// `env` returns `None` for unset variables; empty values count as unset.
    pub fn from_args<F>(args: &JoinCliArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let meet_link = args.meetlink.trim().to_string();
        if meet_link.is_empty() {
            bail!("A meeting link is required");
        }

        let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u32| -> Result<u32> {
            match var(key) {
                Some(raw) => match raw.parse::<u32>() {
                    Ok(0) => bail!("{} must be a positive integer, got {:?}", key, raw),
                    parsed => parsed
                        .with_context(|| format!("{} must be a positive integer, got {:?}", key, raw)),
                },
                None => Ok(default),
            }
        };

        let capture = CaptureSettings {
            width: number(session_env::REC_WIDTH, DEFAULT_WIDTH)?,
            height: number(session_env::REC_HEIGHT, DEFAULT_HEIGHT)?,
            fps: number(session_env::REC_FPS, DEFAULT_FPS)?,
        };

        let profile_root = match &args.profile_dir {
            Some(dir) => dir.clone(),
            None => global::profiles_dir()?,
        };
        let profile = if args.persist_profile {
            ProfileLocation::Persistent(profile_root.join(&args.profile_name))
        } else {
            ProfileLocation::Temporary {
                parent: profile_root,
            }
        };

        let output_file = var(session_env::REC_OUT)
            .map(|name| basename(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_output_name);

        Ok(Self {
            meet_link,
            profile,
            headless: args.headless,
            min_members: args.min_members,
            min_record: Duration::from_secs(args.min_record_seconds),
            admission_timeout: Duration::from_secs(args.admission_timeout),
            bot_name: args.bot_name.clone(),
            capture,
            output_dir: var(session_env::REC_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REC_DIR)),
            output_file,
            notify_url: var(session_env::NOTIFY_URL),
            message_id: var(session_env::MESSAGE_ID),
            public_base_url: var(session_env::PUBLIC_BASE_URL),
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    /// Public download URL of the recording, when a base URL is configured.
    pub fn file_url(&self) -> Option<String> {
        self.public_base_url.as_ref().map(|base| {
            format!(
                "{}/api/recordings/{}",
                base.trim_end_matches('/'),
                self.output_file
            )
        })
    }
}

fn basename(name: &str) -> String {
    std::path::Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn default_output_name() -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let extension = if cfg!(target_os = "macos") { "mp4" } else { "mkv" };
    format!("output-{}.{}", timestamp, extension)
}
