//! Chrome/Chromium session driven over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::locator::{Locator, Strategy};
use super::{BrowserDriver, BrowserError, KeyCommand};

/// Lock artifacts Chrome leaves in a profile after an unclean exit.
/// A leftover lock makes the next launch fail with "profile in use".
pub const SINGLETON_ARTIFACTS: [&str; 3] = ["SingletonLock", "SingletonCookie", "SingletonSocket"];

const CHROME_BINARIES: [&str; 5] = [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "macos")]
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

// Meet refuses or degrades sessions that advertise automation.
const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// chromiumoxide's launch defaults without `--enable-automation`, which
/// sets `navigator.webdriver` and shows the automation infobar.
const BASE_ARGS: [&str; 23] = [
    "--disable-background-networking",
    "--enable-features=NetworkService,NetworkServiceInProcess",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-component-extensions-with-background-pages",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-features=TranslateUI",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--force-color-profile=srgb",
    "--metrics-recording-only",
    "--password-store=basic",
    "--use-mock-keychain",
    "--enable-blink-features=IdleDetection",
    "--lang=en_US",
];

/// Focuses `el` and clears its current content, for inputs and
/// contenteditable boxes alike.
const FOCUS_AND_CLEAR: &str = "if (!el) return false; el.focus(); \
     if ('value' in el) { el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); } \
     else if (el.isContentEditable) { el.textContent = ''; el.dispatchEvent(new Event('input', { bubbles: true })); } \
     return true;";

/// Where the browser keeps its user data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLocation {
    /// Fresh directory created under `parent` and deleted on close.
    Temporary { parent: PathBuf },
    /// Long-lived profile (e.g. with a seeded login). Stale locks are cleared on open and close.
    Persistent(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: Option<PathBuf>,
    pub profile: ProfileLocation,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout: Duration,
}

enum SessionProfile {
    Temporary(TempDir),
    Persistent(PathBuf),
}

impl SessionProfile {
    fn prepare(location: &ProfileLocation) -> Result<Self, BrowserError> {
        match location {
            ProfileLocation::Temporary { parent } => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BrowserError::SessionStart(format!(
                        "cannot create profile parent {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                let dir = tempfile::Builder::new()
                    .prefix("meetbot-profile-")
                    .tempdir_in(parent)
                    .map_err(|e| {
                        BrowserError::SessionStart(format!("cannot create temporary profile: {}", e))
                    })?;
                Ok(Self::Temporary(dir))
            }
            ProfileLocation::Persistent(path) => {
                std::fs::create_dir_all(path).map_err(|e| {
                    BrowserError::SessionStart(format!(
                        "cannot create profile {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let removed = remove_singleton_locks(path);
                if removed > 0 {
                    info!("Removed {} stale lock file(s) from {:?}", removed, path);
                }
                Ok(Self::Persistent(path.clone()))
            }
        }
    }

    fn path(&self) -> &Path {
        match self {
            Self::Temporary(dir) => dir.path(),
            Self::Persistent(path) => path,
        }
    }

    fn release(self) {
        match self {
            Self::Temporary(dir) => {
                let path = dir.path().to_path_buf();
                if let Err(e) = dir.close() {
                    warn!("Failed to remove temporary profile {:?}: {}", path, e);
                } else {
                    debug!("Removed temporary profile {:?}", path);
                }
            }
            Self::Persistent(path) => {
                remove_singleton_locks(&path);
            }
        }
    }
}

/// Delete Chrome's singleton lock artifacts from `folder`; returns how many were removed.
///
/// `SingletonLock` is usually a dangling symlink, so presence is checked
/// without following links.
pub fn remove_singleton_locks(folder: &Path) -> usize {
    SINGLETON_ARTIFACTS
        .iter()
        .map(|name| folder.join(name))
        .filter(|path| std::fs::symlink_metadata(path).is_ok())
        .filter(|path| std::fs::remove_file(path).is_ok())
        .count()
}

fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf, BrowserError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(BrowserError::SessionStart(format!(
            "configured browser executable {} does not exist",
            path.display()
        )));
    }

    if let Some(path) = CHROME_BINARIES
        .iter()
        .find_map(|name| which::which(name).ok())
    {
        debug!("Found browser at {:?}", path);
        return Ok(path);
    }

    #[cfg(target_os = "macos")]
    {
        let path = PathBuf::from(MACOS_CHROME);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(BrowserError::SessionStart(
        "failed to find google-chrome or chromium on PATH".to_string(),
    ))
}

fn chrome_args(headless: bool) -> Vec<String> {
    let mut args: Vec<String> = BASE_ARGS.iter().map(|arg| arg.to_string()).collect();
    args.extend(
        [
            "--profile-directory=Default",
            "--use-fake-ui-for-media-stream",
            "--disable-notifications",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-blink-features=AutomationControlled",
        ]
        .map(String::from),
    );
    if headless {
        args.push("--headless=new".to_string());
    }
    args
}

fn lookup_js(locator: &Locator) -> String {
    let selector = serde_json::Value::String(locator.selector.clone()).to_string();
    match locator.by {
        Strategy::Css => format!("document.querySelector({})", selector),
        Strategy::Xpath => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            selector
        ),
    }
}

/// Wraps `body` in an IIFE with `el` bound to the element `locator` resolves to (or null).
fn element_script(locator: &Locator, body: &str) -> String {
    format!("(() => {{ const el = {}; {} }})()", lookup_js(locator), body)
}

fn cdp_err(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Cdp(e.to_string())
}

/// Primary modifier for shortcuts: Cmd on macOS, Ctrl elsewhere (CDP modifier bits).
fn shortcut_modifier() -> i64 {
    if cfg!(target_os = "macos") {
        4
    } else {
        2
    }
}

/// What has to be released once the browser process is gone.
struct SessionResources {
    handler: Option<JoinHandle<()>>,
    profile: Option<SessionProfile>,
}

impl SessionResources {
    /// Abort the event handler and release the profile. Returns `false`
    /// when there was nothing left to release.
    fn release(&mut self) -> bool {
        let handler = self.handler.take();
        let profile = self.profile.take();
        if handler.is_none() && profile.is_none() {
            return false;
        }
        if let Some(task) = handler {
            task.abort();
        }
        if let Some(profile) = profile {
            profile.release();
        }
        true
    }
}

pub struct ChromeSession {
    page: Page,
    browser: Mutex<Option<Browser>>,
    resources: Mutex<SessionResources>,
}

impl ChromeSession {
    /// Launch a browser bound to its own profile directory.
    pub async fn open(options: &LaunchOptions) -> Result<Self, BrowserError> {
        let executable = find_chrome(options.executable.as_deref())?;
        let profile = SessionProfile::prepare(&options.profile)?;

        info!(
            "Launching {:?} (headless: {}) with profile {:?}",
            executable,
            options.headless,
            profile.path()
        );

        // `with_head` stops chromiumoxide adding the legacy `--headless` flag;
        // headless runs get `--headless=new` from `chrome_args` instead.
        let config = BrowserConfig::builder()
            .disable_default_args()
            .with_head()
            .window_size(options.window_width, options.window_height)
            .viewport(None)
            .user_data_dir(profile.path())
            .chrome_executable(executable)
            .args(chrome_args(options.headless))
            .request_timeout(options.request_timeout)
            .build()
            .map_err(BrowserError::SessionStart)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::SessionStart(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::SessionStart(format!("cannot open tab: {}", e)));
            }
        };

        if let Err(e) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await
        {
            warn!("Failed to install automation fingerprint script: {}", e);
        }

        Ok(Self {
            page,
            browser: Mutex::new(Some(browser)),
            resources: Mutex::new(SessionResources {
                handler: Some(handler_task),
                profile: Some(profile),
            }),
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn dispatch_key(
        &self,
        kind: DispatchKeyEventType,
        key: char,
    ) -> Result<(), BrowserError> {
        let upper = key.to_ascii_uppercase();
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .modifiers(shortcut_modifier())
            .key(key.to_string())
            .code(format!("Key{}", upper))
            .windows_virtual_key_code(upper as i64)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        if self.browser.lock().await.is_none() {
            return Err(BrowserError::Closed);
        }
        self.page.goto(url).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Cdp)?;
        self.page.execute(params).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn send_key_command(&self, command: KeyCommand) -> Result<(), BrowserError> {
        let key = command.key();
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool, BrowserError> {
        self.eval(element_script(
            locator,
            "return !!el && !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);",
        ))
        .await
    }

    async fn click(&self, locator: &Locator) -> Result<(), BrowserError> {
        let clicked: bool = self
            .eval(element_script(
                locator,
                "if (!el) return false; el.scrollIntoView({ block: 'center' }); el.click(); return true;",
            ))
            .await?;
        if clicked {
            Ok(())
        } else {
            Err(BrowserError::NotFound(locator.to_string()))
        }
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), BrowserError> {
        let focused: bool = self
            .eval(element_script(locator, FOCUS_AND_CLEAR))
            .await?;
        if !focused {
            return Err(BrowserError::NotFound(locator.to_string()));
        }
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn read_text(&self, locator: &Locator) -> Result<String, BrowserError> {
        let text: Option<String> = self
            .eval(element_script(
                locator,
                "return el ? (el.innerText || el.textContent || '') : null;",
            ))
            .await?;
        text.ok_or_else(|| BrowserError::NotFound(locator.to_string()))
    }

    async fn run_script(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn close(&self) {
        let Some(mut browser) = self.browser.lock().await.take() else {
            debug!("Browser session already closed");
            return;
        };

        info!("Closing browser session");
        match tokio::time::timeout(CLOSE_TIMEOUT, browser.close()).await {
            Ok(Ok(_)) => {
                if let Err(e) = tokio::time::timeout(CLOSE_TIMEOUT, browser.wait()).await {
                    debug!("Browser did not exit in time: {}", e);
                }
            }
            Ok(Err(e)) => debug!("Browser close failed: {}", e),
            Err(_) => debug!("Browser close timed out"),
        }
        drop(browser);

        self.resources.lock().await.release();
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.resources.get_mut().release();
    }
}
