//! Spawning bot runs on behalf of the HTTP front end.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::info;

use crate::config::session_env;

/// One queued bot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub meet_link: String,
    pub headless: bool,
    pub output_file: String,
    pub record_dir: PathBuf,
    pub message_id: Option<String>,
}

#[async_trait]
pub trait BotLauncher: Send + Sync {
    /// Start the run in the background and return its process id.
    async fn launch(&self, request: &LaunchRequest) -> Result<u32>;
}

/// Runs `<program> join <link>` as a detached child process.
pub struct ProcessLauncher {
    program: PathBuf,
    config_path: Option<PathBuf>,
    public_base_url: Option<String>,
}

impl ProcessLauncher {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            config_path: None,
            public_base_url: None,
        }
    }

    /// Launch the currently running executable.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().context("Failed to resolve current executable")?;
        Ok(Self::new(program))
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url;
        self
    }

    fn args(&self, request: &LaunchRequest) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.to_string_lossy().to_string());
        }
        args.push("join".to_string());
        args.push(request.meet_link.clone());
        if request.headless {
            args.push("--headless".to_string());
        }
        args
    }
}

#[async_trait]
impl BotLauncher for ProcessLauncher {
    async fn launch(&self, request: &LaunchRequest) -> Result<u32> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(self.args(request))
            .env(session_env::REC_OUT, &request.output_file)
            .env(session_env::REC_DIR, &request.record_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(id) = &request.message_id {
            command.env(session_env::MESSAGE_ID, id);
        }
        if let Some(url) = &self.public_base_url {
            command.env(session_env::PUBLIC_BASE_URL, url);
        }

        // The child is not awaited; it outlives this request.
        let child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", self.program))?;
        let pid = child.id().context("Bot process exited immediately")?;

        info!("Launched bot (pid {}) for {}", pid, request.meet_link);
        Ok(pid)
    }
}
