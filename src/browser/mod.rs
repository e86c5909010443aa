//! Controlled browser session.
//!
//! The meeting flows only talk to [`BrowserDriver`]; [`chrome::ChromeSession`]
//! is the Chrome DevTools implementation used in production.

pub mod chrome;
pub mod locator;

use async_trait::async_trait;
use thiserror::Error;

pub use chrome::{remove_singleton_locks, ChromeSession, LaunchOptions, ProfileLocation};
pub use locator::{find_visible, first_visible, Locator, Strategy};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to start browser session: {0}")]
    SessionStart(String),

    #[error("No element matches {0}")]
    NotFound(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("DevTools command failed: {0}")]
    Cdp(String),

    #[error("Browser session already closed")]
    Closed,
}

/// Keyboard shortcuts sent to the pre-join screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleCamera,
    ToggleMicrophone,
}

impl KeyCommand {
    /// Key pressed together with Ctrl (Cmd on macOS).
    pub fn key(&self) -> char {
        match self {
            Self::ToggleCamera => 'e',
            Self::ToggleMicrophone => 'd',
        }
    }
}

/// Browser operations needed to drive a meeting page.
///
/// Element operations take a [`Locator`] and resolve it at call time, so
/// callers never hold element handles across UI re-renders.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError>;

    async fn send_key_command(&self, command: KeyCommand) -> Result<(), BrowserError>;

    /// Whether `locator` currently resolves to a rendered element.
    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError>;

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError>;

    /// Clear the field and type `text` into it.
    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), BrowserError>;

    async fn read_text(&self, locator: &Locator) -> Result<String, BrowserError>;

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Release the browser and its profile. Safe to call more than once.
    async fn close(&self);
}
