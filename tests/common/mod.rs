//! Scripted stand-ins for the browser, recorder and notifier.
//!
//! All three append to one shared event log so tests can assert the order in
//! which the shutdown sequence touched them.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use meetbot::browser::{BrowserDriver, BrowserError, KeyCommand, Locator, ProfileLocation};
use meetbot::config::{CaptureSettings, LocatorConfig, SessionConfig, TimingConfig};
use meetbot::notify::{NotificationPayload, RecordingNotifier};
use meetbot::recorder::{CaptureSpec, Platform, Recorder, RecorderHandle};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A meeting page driven by a clock started at construction.
pub struct ScriptedMeeting {
    start: Instant,
    /// When the host lets the bot in; `None` keeps it in the lobby forever.
    pub admit_at: Option<Duration>,
    /// When the call ends for everyone.
    pub ends_at: Option<Duration>,
    /// Participant counter text, as `(from, text)` in ascending order.
    pub counts: Vec<(Duration, &'static str)>,
    /// Panic inside `navigate` / `read_text`, as a broken driver would.
    pub panic_on_navigate: bool,
    pub panic_on_read: bool,
    pub log: EventLog,
    pub closes: Arc<AtomicUsize>,
}

impl ScriptedMeeting {
    pub fn new(log: EventLog) -> Self {
        Self {
            start: Instant::now(),
            admit_at: Some(Duration::ZERO),
            ends_at: None,
            counts: vec![(Duration::ZERO, "5")],
            panic_on_navigate: false,
            panic_on_read: false,
            log,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn ended(&self) -> bool {
        self.ends_at.map(|at| self.now() >= at).unwrap_or(false)
    }

    fn admitted(&self) -> bool {
        self.admit_at.map(|at| self.now() >= at).unwrap_or(false)
    }
}

#[async_trait]
impl BrowserDriver for ScriptedMeeting {
    async fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
        if self.panic_on_navigate {
            panic!("page crashed during navigation");
        }
        Ok(())
    }

    async fn set_viewport(&self, _width: u32, _height: u32) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn send_key_command(&self, _command: KeyCommand) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError> {
        let in_call = self.admitted() && !self.ended();
        Ok(match locator.selector.as_str() {
            "#leave" | "#count" => in_call,
            "#lobby" => !self.admitted() && !self.ended(),
            "#ended" => self.ended(),
            "#name" | "#join" => !self.admitted(),
            _ => false,
        })
    }

    async fn click(&self, _locator: &Locator) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn fill(&self, _locator: &Locator, _text: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn read_text(&self, locator: &Locator) -> Result<String, BrowserError> {
        if self.panic_on_read {
            panic!("participant counter vanished mid-read");
        }
        let now = self.now();
        self.counts
            .iter()
            .rev()
            .find(|(from, _)| *from <= now)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| BrowserError::NotFound(locator.to_string()))
    }

    async fn run_script(&self, _script: &str) -> Result<serde_json::Value, BrowserError> {
        Ok(serde_json::Value::Bool(false))
    }

    async fn close(&self) {
        if self.closes.fetch_add(1, Ordering::SeqCst) == 0 {
            self.log.lock().unwrap().push("browser.close".to_string());
        }
    }
}

/// Writes `contents` to the output path on start (nothing when `None`).
pub struct FakeRecorder {
    pub log: EventLog,
    pub contents: Option<&'static [u8]>,
    pub fail_start: bool,
}

impl FakeRecorder {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            contents: Some(b"matroska"),
            fail_start: false,
        }
    }
}

#[async_trait]
impl Recorder for FakeRecorder {
    async fn start(&self, spec: &CaptureSpec) -> Result<RecorderHandle> {
        if self.fail_start {
            anyhow::bail!("ffmpeg not found");
        }
        if let Some(contents) = self.contents {
            std::fs::write(&spec.output_path, contents)?;
        }
        self.log.lock().unwrap().push("recorder.start".to_string());
        Ok(RecorderHandle::from_path(spec.output_path.clone()))
    }

    async fn stop(&self, _handle: RecorderHandle) {
        self.log.lock().unwrap().push("recorder.stop".to_string());
    }
}

pub struct CapturingNotifier {
    pub log: EventLog,
    pub payloads: Arc<Mutex<Vec<NotificationPayload>>>,
}

impl CapturingNotifier {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            payloads: Arc::default(),
        }
    }
}

#[async_trait]
impl RecordingNotifier for CapturingNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        let event = serde_json::to_value(payload.event)?;
        self.log
            .lock()
            .unwrap()
            .push(format!("notify:{}", event.as_str().unwrap_or_default()));
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

pub fn locators() -> LocatorConfig {
    LocatorConfig {
        legacy_join_script: "false".to_string(),
        name_input: vec![Locator::css("#name")],
        join_button: vec![Locator::css("#join")],
        leave_call: vec![Locator::css("#leave")],
        lobby: vec![Locator::css("#lobby")],
        call_ended: vec![Locator::css("#ended")],
        popups: vec![Locator::css("#popup")],
        participant_count: vec![Locator::css("#count")],
    }
}

/// No settle delays; production poll intervals.
pub fn timing() -> TimingConfig {
    TimingConfig {
        admission_poll_ms: 2_000,
        watch_interval_ms: 6_000,
        locator_poll_ms: 250,
        notify_timeout_ms: 5_000,
        ..TimingConfig::immediate()
    }
}

pub fn session(output_dir: &Path) -> SessionConfig {
    SessionConfig {
        meet_link: "https://meet.google.com/abc-defg-hij".to_string(),
        profile: ProfileLocation::Temporary {
            parent: output_dir.to_path_buf(),
        },
        headless: true,
        min_members: 2,
        min_record: Duration::from_secs(200),
        admission_timeout: Duration::from_secs(600),
        bot_name: "Recorder Bot".to_string(),
        capture: CaptureSettings::default(),
        output_dir: output_dir.to_path_buf(),
        output_file: "rec-test.mkv".to_string(),
        notify_url: None,
        message_id: Some("msg-1".to_string()),
        public_base_url: None,
    }
}

pub fn capture(session: &SessionConfig) -> CaptureSpec {
    CaptureSpec {
        output_path: session.output_path(),
        settings: session.capture,
        platform: Platform::Linux,
        display: ":99.0".to_string(),
    }
}
