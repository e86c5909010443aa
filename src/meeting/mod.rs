//! Meeting automation.
//!
//! Joins a call as a guest, waits to be admitted, watches the call while the
//! recorder runs, and tears everything down in a fixed order when it ends.

pub mod admission;
pub mod bot;
pub mod join;
pub mod shutdown;
pub mod watch;

pub use admission::{AdmissionMonitor, CallState};
pub use bot::{ExitReason, MeetBot, RunReport};
pub use join::{JoinAttempt, JoinClick, JoinFlow};
pub use shutdown::{Shutdown, ShutdownReport};
pub use watch::{parse_participant_count, MeetingWatch, WatchExit};
