//! Teardown run once at the end of every bot run.

use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::browser::BrowserDriver;
use crate::config::SessionConfig;
use crate::notify::{NotificationPayload, RecordingNotifier};
use crate::recorder::{Recorder, RecorderHandle};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Output path when a recorder was started.
    pub recording: Option<PathBuf>,
    pub notified: bool,
}

/// Stop recorder, then notify, then close the browser.
///
/// `run` takes `self`, so the sequence can only execute once.
pub struct Shutdown<'a> {
    pub driver: &'a dyn BrowserDriver,
    pub recorder: &'a dyn Recorder,
    pub notifier: Option<&'a dyn RecordingNotifier>,
    pub session: &'a SessionConfig,
    pub notify_timeout: Duration,
}

impl Shutdown<'_> {
    pub async fn run(self, handle: Option<RecorderHandle>) -> ShutdownReport {
        let mut report = ShutdownReport::default();

        if let Some(handle) = handle {
            let output = handle.output_path().to_path_buf();
            info!("Stopping recorder");
            self.recorder.stop(handle).await;
            report.notified = self.notify(&output).await;
            report.recording = Some(output);
        }

        info!("Closing browser");
        self.driver.close().await;
        report
    }

    async fn notify(&self, output: &std::path::Path) -> bool {
        let Some(notifier) = self.notifier else {
            return false;
        };

        let payload = NotificationPayload::for_session(self.session, output);
        info!("Sending {:?} notification", payload.event);
        match tokio::time::timeout(self.notify_timeout, notifier.notify(&payload)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Notification failed: {:#}", e);
                false
            }
            Err(_) => {
                warn!("Notification timed out after {:?}", self.notify_timeout);
                false
            }
        }
    }
}
