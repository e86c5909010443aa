//! Screen/audio capture process management.
//!
//! The capture itself is delegated to ffmpeg. This module only owns the
//! process: start it after admission, stop it gracefully at shutdown.

pub mod command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::{RecorderConfig, SessionConfig};

pub use command::{build_capture_command, CaptureCommand, CaptureSpec, Platform};

/// Ownership of one running capture and the file it writes.
///
/// Dropping the handle kills the process, so a recorder can never outlive
/// the coordinator that started it.
#[derive(Debug)]
pub struct RecorderHandle {
    output_path: PathBuf,
    process: Option<Child>,
}

impl RecorderHandle {
    pub fn new(output_path: PathBuf, process: Child) -> Self {
        Self {
            output_path,
            process: Some(process),
        }
    }

    /// Handle for a capture that is not backed by a local child process.
    pub fn from_path(output_path: PathBuf) -> Self {
        Self {
            output_path,
            process: None,
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.id())
    }
}

#[async_trait]
pub trait Recorder: Send + Sync {
    async fn start(&self, spec: &CaptureSpec) -> Result<RecorderHandle>;

    /// Stop the capture. Never fails; whatever was written stays on disk.
    async fn stop(&self, handle: RecorderHandle);
}

pub struct FfmpegRecorder {
    config: RecorderConfig,
    grace: Duration,
}

impl FfmpegRecorder {
    pub fn new(config: RecorderConfig, grace: Duration) -> Self {
        Self { config, grace }
    }

    /// Whether the configured ffmpeg binary can be found.
    pub fn is_available(&self) -> bool {
        which::which(&self.config.ffmpeg).is_ok()
    }

    /// Capture spec for this host derived from the session settings.
    pub fn spec_for(&self, session: &SessionConfig) -> CaptureSpec {
        let display = self
            .config
            .linux_display
            .clone()
            .or_else(|| std::env::var("DISPLAY").ok().filter(|d| !d.is_empty()))
            .unwrap_or_else(|| ":0.0".to_string());
        CaptureSpec {
            output_path: session.output_path(),
            settings: session.capture,
            platform: Platform::current(),
            display,
        }
    }
}

#[async_trait]
impl Recorder for FfmpegRecorder {
    async fn start(&self, spec: &CaptureSpec) -> Result<RecorderHandle> {
        if let Some(parent) = spec.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create recording directory {:?}", parent))?;
        }

        let command = build_capture_command(spec, &self.config);
        debug!("Recorder command: {} {}", command.program, command.args.join(" "));

        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", command.program))?;

        info!(
            "Recorder started (pid {:?}) writing {:?}",
            child.id(),
            spec.output_path
        );
        Ok(RecorderHandle::new(spec.output_path.clone(), child))
    }

    async fn stop(&self, mut handle: RecorderHandle) {
        let Some(mut child) = handle.process.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                info!("Recorder had already exited ({})", status);
                return;
            }
            Ok(None) => {}
            Err(e) => debug!("Could not poll recorder: {}", e),
        }

        if let Some(pid) = child.id() {
            if let Err(e) = request_terminate(pid).await {
                debug!("Graceful stop request failed: {}", e);
            }
        }

        match tokio::time::timeout(self.grace, child.wait()).await {
            Ok(Ok(status)) => info!("Recorder stopped ({})", status),
            Ok(Err(e)) => warn!("Failed waiting for recorder: {}", e),
            Err(_) => {
                warn!(
                    "Recorder still running after {:?}, killing it",
                    self.grace
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill recorder: {}", e);
                }
            }
        }

        info!("Recording kept at {:?}", handle.output_path);
    }
}

/// Ask the process to finish up. ffmpeg finalizes the container on SIGTERM.
#[cfg(unix)]
async fn request_terminate(pid: u32) -> Result<()> {
    let status = Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("Failed to run kill")?;
    if !status.success() {
        anyhow::bail!("kill -TERM {} exited with {}", pid, status);
    }
    Ok(())
}

#[cfg(not(unix))]
async fn request_terminate(_pid: u32) -> Result<()> {
    anyhow::bail!("graceful termination is not supported on this platform")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_stop_without_process_is_noop() {
        let recorder = FfmpegRecorder::new(RecorderConfig::default(), Duration::from_millis(100));
        let handle = RecorderHandle::from_path(PathBuf::from("/tmp/none.mkv"));
        assert!(handle.pid().is_none());
        recorder.stop(handle).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_terminates_gracefully() {
        let child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
        let handle = RecorderHandle::new(PathBuf::from("/tmp/out.mkv"), child);
        let recorder = FfmpegRecorder::new(RecorderConfig::default(), Duration::from_secs(5));

        let started = Instant::now();
        recorder.stop(handle).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_kills_after_grace_period() {
        // Ignored dispositions survive exec, so this sleep ignores SIGTERM.
        let child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; exec sleep 30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let handle = RecorderHandle::new(PathBuf::from("/tmp/out.mkv"), child);
        let recorder = FfmpegRecorder::new(RecorderConfig::default(), Duration::from_millis(300));

        let started = Instant::now();
        recorder.stop(handle).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_after_early_exit() {
        let child = Command::new("true").spawn().unwrap();
        let handle = RecorderHandle::new(PathBuf::from("/tmp/out.mkv"), child);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let recorder = FfmpegRecorder::new(RecorderConfig::default(), Duration::from_secs(1));
        recorder.stop(handle).await;
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            ffmpeg: "/nonexistent/ffmpeg".to_string(),
            ..RecorderConfig::default()
        };
        let recorder = FfmpegRecorder::new(config, Duration::from_secs(1));
        let spec = CaptureSpec {
            output_path: dir.path().join("recs").join("out.mkv"),
            settings: Default::default(),
            platform: Platform::Linux,
            display: ":0.0".to_string(),
        };

        assert!(recorder.start(&spec).await.is_err());
        // Output directory is still prepared for the caller
        assert!(dir.path().join("recs").exists());
    }
}
