//! End-to-end runs of the bot coordinator against a scripted meeting page.

mod common;

use common::*;
use meetbot::meeting::{ExitReason, MeetBot, RunReport};
use meetbot::notify::{RecordingEvent, WebhookNotifier};
use std::future::pending;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::{sleep, Instant};

struct Run {
    report: RunReport,
    events: Vec<String>,
    closes: usize,
    elapsed: Duration,
    notified_events: Vec<RecordingEvent>,
}

async fn run_with<F>(
    configure: impl FnOnce(&mut ScriptedMeeting, &mut FakeRecorder, &mut meetbot::config::SessionConfig),
    shutdown: F,
) -> Run
where
    F: std::future::Future<Output = ()>,
{
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let mut page = ScriptedMeeting::new(log.clone());
    let mut recorder = FakeRecorder::new(log.clone());
    let mut session = session(dir.path());
    configure(&mut page, &mut recorder, &mut session);

    let closes = page.closes.clone();
    let notifier = CapturingNotifier::new(log.clone());
    let payloads = notifier.payloads.clone();
    let capture = capture(&session);

    let started = Instant::now();
    let report = MeetBot::new(
        Box::new(page),
        Box::new(recorder),
        session,
        locators(),
        timing(),
        capture,
    )
    .with_notifier(Box::new(notifier))
    .run(shutdown)
    .await;

    let notified_events = payloads.lock().unwrap().iter().map(|p| p.event).collect();
    Run {
        report,
        events: events(&log),
        closes: closes.load(Ordering::SeqCst),
        elapsed: started.elapsed(),
        notified_events,
    }
}

const FULL_SHUTDOWN: [&str; 4] = [
    "recorder.start",
    "recorder.stop",
    "notify:recording_completed",
    "browser.close",
];

#[tokio::test(start_paused = true)]
async fn test_admission_timeout_skips_recorder() {
    let run = run_with(|page, _, _| page.admit_at = None, pending()).await;

    assert_eq!(run.report.reason, ExitReason::AdmissionTimeout);
    assert!(run.report.recording.is_none());
    assert!(!run.report.notified);
    assert_eq!(run.events, vec!["browser.close"]);
    assert_eq!(run.closes, 1);
    assert!(run.elapsed >= Duration::from_secs(600));
    assert!(run.elapsed <= Duration::from_secs(602));
}

#[tokio::test(start_paused = true)]
async fn test_single_member_minimum_records_until_call_ends() {
    let run = run_with(
        |page, _, session| {
            session.min_members = 1;
            page.counts = vec![(Duration::ZERO, "1")];
            page.ends_at = Some(Duration::from_secs(500));
        },
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::CallEnded);
    assert!(run.elapsed >= Duration::from_secs(500));
    assert!(run.elapsed <= Duration::from_secs(506));
    assert_eq!(run.events, FULL_SHUTDOWN);
    assert!(run.report.notified);
}

#[tokio::test(start_paused = true)]
async fn test_low_attendance_never_before_min_record() {
    let run = run_with(
        |page, _, session| {
            session.min_members = 1;
            page.counts = vec![(Duration::ZERO, "1"), (Duration::from_secs(210), "0")];
        },
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::LowAttendance(0));
    assert!(run.elapsed >= Duration::from_secs(210));
    assert!(run.elapsed <= Duration::from_secs(216));
    assert_eq!(run.events, FULL_SHUTDOWN);
}

#[tokio::test(start_paused = true)]
async fn test_empty_room_still_waits_for_min_record() {
    let run = run_with(|page, _, _| page.counts = vec![(Duration::ZERO, "0")], pending()).await;

    assert_eq!(run.report.reason, ExitReason::LowAttendance(0));
    assert!(run.elapsed > Duration::from_secs(200));
    assert!(run.elapsed <= Duration::from_secs(206));
}

#[tokio::test(start_paused = true)]
async fn test_call_end_detected_on_next_tick() {
    let run = run_with(
        |page, _, _| page.ends_at = Some(Duration::from_secs(50)),
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::CallEnded);
    assert!(run.elapsed >= Duration::from_secs(50));
    assert!(run.elapsed <= Duration::from_secs(56));
    assert_eq!(run.events, FULL_SHUTDOWN);
}

#[tokio::test(start_paused = true)]
async fn test_admitted_after_waiting_in_lobby() {
    let run = run_with(
        |page, _, _| {
            page.admit_at = Some(Duration::from_secs(45));
            page.ends_at = Some(Duration::from_secs(100));
        },
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::CallEnded);
    assert_eq!(run.events, FULL_SHUTDOWN);
}

#[tokio::test(start_paused = true)]
async fn test_termination_while_recording() {
    let run = run_with(|_, _, _| {}, sleep(Duration::from_secs(30))).await;

    assert_eq!(run.report.reason, ExitReason::Terminated);
    assert!(run.elapsed >= Duration::from_secs(30));
    assert!(run.elapsed < Duration::from_secs(31));
    assert_eq!(run.events, FULL_SHUTDOWN);
    assert_eq!(run.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_termination_before_admission() {
    let run = run_with(|page, _, _| page.admit_at = None, sleep(Duration::from_secs(5))).await;

    assert_eq!(run.report.reason, ExitReason::Terminated);
    assert!(run.elapsed < Duration::from_secs(6));
    assert_eq!(run.events, vec!["browser.close"]);
    assert!(run.report.recording.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_watch_panic_still_runs_full_shutdown() {
    let run = run_with(
        |page, _, session| {
            session.min_record = Duration::from_secs(1);
            page.panic_on_read = true;
        },
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::Crashed);
    assert_eq!(run.events, FULL_SHUTDOWN);
    assert_eq!(run.closes, 1);
    assert!(run.report.notified);
    assert!(run.elapsed <= Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_join_panic_closes_browser() {
    let run = run_with(|page, _, _| page.panic_on_navigate = true, pending()).await;

    assert_eq!(run.report.reason, ExitReason::Crashed);
    assert_eq!(run.events, vec!["browser.close"]);
    assert_eq!(run.closes, 1);
    assert!(run.report.recording.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_empty_output_reported() {
    let run = run_with(
        |page, recorder, _| {
            recorder.contents = None;
            page.ends_at = Some(Duration::from_secs(20));
        },
        pending(),
    )
    .await;

    assert_eq!(run.notified_events, vec![RecordingEvent::Empty]);
    assert_eq!(
        run.events,
        vec![
            "recorder.start",
            "recorder.stop",
            "notify:recording_empty",
            "browser.close"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_recorder_start_failure_still_shuts_down() {
    let run = run_with(
        |page, recorder, _| {
            recorder.fail_start = true;
            page.ends_at = Some(Duration::from_secs(20));
        },
        pending(),
    )
    .await;

    assert_eq!(run.report.reason, ExitReason::CallEnded);
    assert_eq!(run.notified_events, vec![RecordingEvent::Empty]);
    assert_eq!(run.events.last().map(String::as_str), Some("browser.close"));
    assert_eq!(run.closes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_webhook_does_not_block_close() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let mut page = ScriptedMeeting::new(log.clone());
    page.ends_at = Some(Duration::from_secs(20));
    let closes = page.closes.clone();
    let session = session(dir.path());
    let capture = capture(&session);

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let notifier =
        WebhookNotifier::new(format!("http://127.0.0.1:{}/hook", port), Duration::from_secs(2))
            .unwrap();

    let report = MeetBot::new(
        Box::new(page),
        Box::new(FakeRecorder::new(log.clone())),
        session,
        locators(),
        timing(),
        capture,
    )
    .with_notifier(Box::new(notifier))
    .run(pending())
    .await;

    assert!(!report.notified);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(
        events(&log),
        vec!["recorder.start", "recorder.stop", "browser.close"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_without_notifier() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let mut page = ScriptedMeeting::new(log.clone());
    page.ends_at = Some(Duration::from_secs(20));
    let session = session(dir.path());
    let capture = capture(&session);
    let output = session.output_path();

    let report = MeetBot::new(
        Box::new(page),
        Box::new(FakeRecorder::new(log.clone())),
        session,
        locators(),
        timing(),
        capture,
    )
    .run(pending())
    .await;

    assert_eq!(report.recording, Some(output));
    assert!(!report.notified);
    assert_eq!(
        events(&log),
        vec!["recorder.start", "recorder.stop", "browser.close"]
    );
}
