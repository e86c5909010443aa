//! Coordinator for one bot run: join, admission, record and watch, shutdown.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::time::Instant;
use tracing::{info, warn};

use super::admission::AdmissionMonitor;
use super::join::JoinFlow;
use super::shutdown::Shutdown;
use super::watch::{MeetingWatch, WatchExit};
use crate::browser::BrowserDriver;
use crate::config::{LocatorConfig, SessionConfig, TimingConfig};
use crate::notify::RecordingNotifier;
use crate::recorder::{CaptureSpec, Recorder, RecorderHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    AdmissionTimeout,
    CallEnded,
    LowAttendance(u32),
    Terminated,
    /// The join, admission or watch phase panicked.
    Crashed,
}

impl From<WatchExit> for ExitReason {
    fn from(exit: WatchExit) -> Self {
        match exit {
            WatchExit::CallEnded => Self::CallEnded,
            WatchExit::LowAttendance(count) => Self::LowAttendance(count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub reason: ExitReason,
    pub recording: Option<PathBuf>,
    pub notified: bool,
}

pub struct MeetBot {
    driver: Box<dyn BrowserDriver>,
    recorder: Box<dyn Recorder>,
    notifier: Option<Box<dyn RecordingNotifier>>,
    session: SessionConfig,
    locators: LocatorConfig,
    timing: TimingConfig,
    capture: CaptureSpec,
}

impl MeetBot {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        recorder: Box<dyn Recorder>,
        session: SessionConfig,
        locators: LocatorConfig,
        timing: TimingConfig,
        capture: CaptureSpec,
    ) -> Self {
        Self {
            driver,
            recorder,
            notifier: None,
            session,
            locators,
            timing,
            capture,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn RecordingNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run until the meeting is over or `shutdown` resolves, then tear down.
    ///
    /// Always returns; the shutdown sequence runs exactly once on every path.
    pub async fn run<F>(self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let (reason, handle) = self.drive(shutdown.as_mut()).await;
        info!("Meeting finished: {:?}", reason);

        let report = Shutdown {
            driver: self.driver.as_ref(),
            recorder: self.recorder.as_ref(),
            notifier: self.notifier.as_deref(),
            session: &self.session,
            notify_timeout: self.timing.notify_timeout(),
        }
        .run(handle)
        .await;

        RunReport {
            reason,
            recording: report.recording,
            notified: report.notified,
        }
    }

    async fn drive<F>(&self, mut shutdown: Pin<&mut F>) -> (ExitReason, Option<RecorderHandle>)
    where
        F: Future<Output = ()>,
    {
        let driver = self.driver.as_ref();

        let join_and_admit = async {
            JoinFlow::new(driver, &self.locators, &self.timing)
                .run(
                    &self.session.meet_link,
                    &self.session.bot_name,
                    (self.session.capture.width, self.session.capture.height),
                )
                .await;
            AdmissionMonitor::new(driver, &self.locators, self.timing.admission_poll())
                .wait_until_joined(self.session.admission_timeout)
                .await
        };

        let admitted = tokio::select! {
            admitted = AssertUnwindSafe(join_and_admit).catch_unwind() => match admitted {
                Ok(admitted) => admitted,
                Err(panic) => {
                    warn!("Join flow panicked: {}", panic_message(&*panic));
                    return (ExitReason::Crashed, None);
                }
            },
            _ = shutdown.as_mut() => {
                info!("Termination requested before admission");
                return (ExitReason::Terminated, None);
            }
        };
        if !admitted {
            return (ExitReason::AdmissionTimeout, None);
        }

        let admitted_at = Instant::now();
        let watch = MeetingWatch::new(
            driver,
            &self.locators,
            self.timing.watch_interval(),
            self.session.min_members,
            self.session.min_record,
        );

        // Recorder start is not raced: once spawned, its handle must reach
        // the shutdown sequence.
        let (handle, exit) = tokio::join!(self.start_recorder(), async {
            tokio::select! {
                exit = AssertUnwindSafe(watch.run(admitted_at)).catch_unwind() => match exit {
                    Ok(exit) => ExitReason::from(exit),
                    Err(panic) => {
                        warn!("Meeting watch panicked: {}", panic_message(&*panic));
                        ExitReason::Crashed
                    }
                },
                _ = shutdown.as_mut() => {
                    info!("Termination requested while recording");
                    ExitReason::Terminated
                }
            }
        });

        (exit, Some(handle))
    }

    /// A failed start still yields a handle for the expected output path so
    /// the notification reports the recording as empty.
    async fn start_recorder(&self) -> RecorderHandle {
        match self.recorder.start(&self.capture).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Recorder failed to start: {:#}", e);
                RecorderHandle::from_path(self.capture.output_path.clone())
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
