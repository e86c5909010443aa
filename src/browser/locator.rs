//! Prioritized multi-locator search over the meeting UI.
//!
//! Meet renders different markup per language and rotates its class names, so
//! every interaction goes through an ordered candidate list instead of a single
//! selector. The first candidate that resolves to a visible element wins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::BrowserDriver;

/// How a selector string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Css,
    Xpath,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Xpath => "xpath",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub by: Strategy,
    pub selector: String,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            by: Strategy::Css,
            selector: selector.into(),
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            by: Strategy::Xpath,
            selector: selector.into(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.by.as_str(), self.selector)
    }
}

/// Single pass over `candidates`, no waiting.
///
/// Lookup errors count as "not visible" so one broken selector never hides
/// the ones after it.
pub async fn first_visible<'a>(
    driver: &dyn BrowserDriver,
    candidates: &'a [Locator],
) -> Option<&'a Locator> {
    for candidate in candidates {
        match driver.is_visible(candidate).await {
            Ok(true) => return Some(candidate),
            Ok(false) => {}
            Err(e) => debug!("Locator {} failed: {}", candidate, e),
        }
    }
    None
}

/// Repeats [`first_visible`] every `poll` until a candidate resolves or
/// `timeout` elapses. Always performs at least one pass.
pub async fn find_visible<'a>(
    driver: &dyn BrowserDriver,
    candidates: &'a [Locator],
    timeout: Duration,
    poll: Duration,
) -> Option<&'a Locator> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(found) = first_visible(driver, candidates).await {
            return Some(found);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(poll.min(deadline - now)).await;
    }
}
