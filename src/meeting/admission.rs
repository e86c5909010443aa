//! Call-state detection and the bounded wait for admission.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::browser::{first_visible, BrowserDriver};
use crate::config::LocatorConfig;

/// What the page currently shows. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    InCall,
    InLobby,
    EndedOrKicked,
    Unknown,
}

pub struct AdmissionMonitor<'a> {
    driver: &'a dyn BrowserDriver,
    locators: &'a LocatorConfig,
    poll: Duration,
}

impl<'a> AdmissionMonitor<'a> {
    pub fn new(driver: &'a dyn BrowserDriver, locators: &'a LocatorConfig, poll: Duration) -> Self {
        Self {
            driver,
            locators,
            poll,
        }
    }

    /// In-call controls take precedence over any other signal on the page.
    pub async fn classify(&self) -> CallState {
        if first_visible(self.driver, &self.locators.leave_call)
            .await
            .is_some()
        {
            return CallState::InCall;
        }
        if first_visible(self.driver, &self.locators.call_ended)
            .await
            .is_some()
        {
            return CallState::EndedOrKicked;
        }
        if first_visible(self.driver, &self.locators.lobby)
            .await
            .is_some()
        {
            return CallState::InLobby;
        }
        CallState::Unknown
    }

    pub async fn is_in_call(&self) -> bool {
        self.classify().await == CallState::InCall
    }

    /// Poll until admitted or `timeout` elapses.
    ///
    /// Returns within `timeout` plus one poll interval (plus one probe).
    pub async fn wait_until_joined(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut last = None;
        loop {
            let state = self.classify().await;
            if state == CallState::InCall {
                info!("Admitted to the call");
                return true;
            }
            if last != Some(state) {
                debug!("Waiting for admission, page state {:?}", state);
                last = Some(state);
            }

            if Instant::now() >= deadline {
                info!("Not admitted within {:?}", timeout);
                return false;
            }
            sleep(self.poll).await;
        }
    }
}
