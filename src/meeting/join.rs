//! Pre-join screen automation.
//!
//! Every step is best-effort: a missing control or a failed command is logged
//! and the flow moves on. Whether the bot actually got in is decided later by
//! the admission monitor, not here.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{find_visible, BrowserDriver, KeyCommand};
use crate::config::{LocatorConfig, TimingConfig};

/// How the join request was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinClick {
    Button,
    LegacyScript,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAttempt {
    pub name_entered: bool,
    pub join: JoinClick,
}

pub struct JoinFlow<'a> {
    driver: &'a dyn BrowserDriver,
    locators: &'a LocatorConfig,
    timing: &'a TimingConfig,
}

impl<'a> JoinFlow<'a> {
    pub fn new(
        driver: &'a dyn BrowserDriver,
        locators: &'a LocatorConfig,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            driver,
            locators,
            timing,
        }
    }

    pub async fn run(&self, meet_link: &str, bot_name: &str, viewport: (u32, u32)) -> JoinAttempt {
        info!("Opening meeting {}", meet_link);
        if let Err(e) = self.driver.navigate(meet_link).await {
            warn!("Navigation failed: {}", e);
        }
        if let Err(e) = self.driver.set_viewport(viewport.0, viewport.1).await {
            debug!("Could not apply viewport: {}", e);
        }
        pause(self.timing.page_settle_ms).await;

        self.mute().await;
        let name_entered = self.enter_name(bot_name).await;
        let join = self.request_join().await;
        pause(self.timing.post_join_settle_ms).await;

        JoinAttempt { name_entered, join }
    }

    async fn mute(&self) {
        for command in [KeyCommand::ToggleCamera, KeyCommand::ToggleMicrophone] {
            if let Err(e) = self.driver.send_key_command(command).await {
                debug!("{:?} failed: {}", command, e);
            }
        }
        pause(self.timing.after_mute_ms).await;
    }

    async fn enter_name(&self, bot_name: &str) -> bool {
        let Some(field) = find_visible(
            self.driver,
            &self.locators.name_input,
            Duration::from_millis(self.timing.name_input_timeout_ms),
            self.timing.locator_poll(),
        )
        .await
        else {
            debug!("No name field shown, probably signed in");
            return false;
        };

        match self.driver.fill(field, bot_name).await {
            Ok(()) => {
                info!("Entered display name via {}", field);
                pause(self.timing.after_name_ms).await;
                true
            }
            Err(e) => {
                warn!("Could not type display name: {}", e);
                false
            }
        }
    }

    async fn request_join(&self) -> JoinClick {
        if let Some(button) = find_visible(
            self.driver,
            &self.locators.join_button,
            Duration::from_millis(self.timing.join_button_timeout_ms),
            self.timing.locator_poll(),
        )
        .await
        {
            match self.driver.click(button).await {
                Ok(()) => {
                    info!("Clicked join via {}", button);
                    return JoinClick::Button;
                }
                Err(e) => warn!("Join click via {} failed: {}", button, e),
            }
        }

        match self.driver.run_script(&self.locators.legacy_join_script).await {
            Ok(serde_json::Value::Bool(true)) => {
                info!("Clicked join via legacy script");
                JoinClick::LegacyScript
            }
            Ok(_) => {
                warn!("Join control not found");
                JoinClick::NotFound
            }
            Err(e) => {
                warn!("Legacy join script failed: {}", e);
                JoinClick::NotFound
            }
        }
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}
