//! Liveness loop that runs while the recording is in progress.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::admission::AdmissionMonitor;
use crate::browser::{first_visible, BrowserDriver};
use crate::config::LocatorConfig;

/// Why the watch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// In-call controls disappeared: ended, removed or disconnected.
    CallEnded,
    /// Attendance dropped below the minimum after the minimum record time.
    LowAttendance(u32),
}

pub struct MeetingWatch<'a> {
    driver: &'a dyn BrowserDriver,
    locators: &'a LocatorConfig,
    interval: Duration,
    min_members: u32,
    min_record: Duration,
}

impl<'a> MeetingWatch<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        locators: &'a LocatorConfig,
        interval: Duration,
        min_members: u32,
        min_record: Duration,
    ) -> Self {
        Self {
            driver,
            locators,
            interval,
            min_members,
            min_record,
        }
    }

    /// Tick until the meeting is over. `admitted_at` anchors the minimum
    /// record duration.
    pub async fn run(&self, admitted_at: Instant) -> WatchExit {
        let monitor = AdmissionMonitor::new(self.driver, self.locators, self.interval);
        loop {
            self.dismiss_popups().await;

            if !monitor.is_in_call().await {
                info!("No longer in the call");
                return WatchExit::CallEnded;
            }

            if admitted_at.elapsed() > self.min_record {
                if let Some(count) = self.participant_count().await {
                    debug!("Participants: {}", count);
                    if count < self.min_members {
                        info!(
                            "Participant count {} below minimum {}",
                            count, self.min_members
                        );
                        return WatchExit::LowAttendance(count);
                    }
                }
            }

            sleep(self.interval).await;
        }
    }

    async fn dismiss_popups(&self) {
        for popup in &self.locators.popups {
            if matches!(self.driver.is_visible(popup).await, Ok(true)) {
                match self.driver.click(popup).await {
                    Ok(()) => debug!("Dismissed popup {}", popup),
                    Err(e) => debug!("Could not dismiss {}: {}", popup, e),
                }
            }
        }
    }

    async fn participant_count(&self) -> Option<u32> {
        let locator = first_visible(self.driver, &self.locators.participant_count).await?;
        match self.driver.read_text(locator).await {
            Ok(text) => {
                let count = parse_participant_count(&text);
                if count.is_none() {
                    debug!("Unparseable participant count {:?}", text);
                }
                count
            }
            Err(e) => {
                debug!("Could not read participant count: {}", e);
                None
            }
        }
    }
}

/// First run of ASCII digits in `text`, e.g. "3" or "(12 people)".
pub fn parse_participant_count(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
