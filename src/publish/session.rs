//! Publisher backed by one logged-in browser session.
//!
//! The session is established once before polling starts and reused for every
//! post. Lifecycle:
//!
//! ```text
//! Uninitialized → Authenticating → Ready ⇄ Posting
//!                       │            │        │
//!                       └────────────┴────────┴──→ Failed (terminal)
//! ```
//!
//! There is no in-process re-login: once the session is `Failed`, every
//! publish returns `SessionExpired` and the process is expected to exit and be
//! restarted by its supervisor.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use super::Publisher;
use crate::config::{selectors, SessionCredentials, DEFAULT_SETTLE_MILLIS, X_WEB_URL};
use crate::error::{PipelineError, Result};
use crate::types::DeliveryId;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("webdriver error: {0}")]
    Protocol(String),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// The handful of browser operations the session publisher needs
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn goto(&self, url: &str) -> DriverResult<()>;
    async fn current_url(&self) -> DriverResult<String>;
    /// Wait until an element matching `selector` is present
    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()>;
    async fn click(&self, selector: &str) -> DriverResult<()>;
    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()>;
    async fn press_enter(&self, selector: &str) -> DriverResult<()>;
    async fn close(&self) -> DriverResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Authenticating,
    Ready,
    Posting,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Posting => "posting",
            SessionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_url: String,
    /// Pause after submitting a post before it is considered delivered
    pub settle: Duration,
    /// Upper bound for any element to appear
    pub element_timeout: Duration,
    /// Pause between the username and password steps of the login flow
    pub login_step_pause: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            base_url: X_WEB_URL.to_string(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MILLIS),
            element_timeout: Duration::from_secs(20),
            login_step_pause: Duration::from_secs(2),
        }
    }
}

pub struct SessionPublisher {
    driver: Box<dyn BrowserDriver>,
    settings: SessionSettings,
    state: Mutex<SessionState>,
    posts: AtomicU64,
}

impl SessionPublisher {
    /// Log in and return a publisher in the `Ready` state.
    ///
    /// Any failure closes the browser and yields `SessionAuthFailed`.
    pub async fn establish(
        driver: Box<dyn BrowserDriver>,
        credentials: &SessionCredentials,
        settings: SessionSettings,
    ) -> Result<Self> {
        let publisher = Self {
            driver,
            settings,
            state: Mutex::new(SessionState::Uninitialized),
            posts: AtomicU64::new(0),
        };

        {
            let mut state = publisher.state.lock().await;
            *state = SessionState::Authenticating;
            tracing::info!("🔐 logging in to {} as {}", publisher.settings.base_url, credentials.username);

            match publisher.login(credentials).await {
                Ok(()) => {
                    *state = SessionState::Ready;
                    tracing::info!("✅ browser session ready");
                }
                Err(e) => {
                    *state = SessionState::Failed;
                    if let Err(close_err) = publisher.driver.close().await {
                        tracing::warn!("failed to close browser after login error: {}", close_err);
                    }
                    return Err(PipelineError::SessionAuthFailed(e.to_string()));
                }
            }
        }

        Ok(publisher)
    }

    async fn login(&self, credentials: &SessionCredentials) -> DriverResult<()> {
        let timeout = self.settings.element_timeout;

        self.driver.goto(&format!("{}/login", self.settings.base_url)).await?;

        self.driver.wait_for(selectors::LOGIN_USERNAME, timeout).await?;
        self.driver.type_text(selectors::LOGIN_USERNAME, &credentials.username).await?;
        self.driver.press_enter(selectors::LOGIN_USERNAME).await?;
        tokio::time::sleep(self.settings.login_step_pause).await;

        self.driver.wait_for(selectors::LOGIN_PASSWORD, timeout).await?;
        self.driver.type_text(selectors::LOGIN_PASSWORD, &credentials.password).await?;
        self.driver.press_enter(selectors::LOGIN_PASSWORD).await?;

        self.driver.wait_for(selectors::HOME_TIMELINE, timeout).await?;
        let landed = self.driver.current_url().await?;
        if is_login_url(&landed) {
            return Err(DriverError::Navigation(format!("still on login page ({})", landed)));
        }
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Close the browser. The session cannot be used afterwards.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if *state == SessionState::Failed {
            return;
        }
        *state = SessionState::Failed;
        match self.driver.close().await {
            Ok(()) => tracing::info!("🛑 browser session closed"),
            Err(e) => tracing::warn!("failed to close browser session: {}", e),
        }
    }

    fn composer_url(&self, destination: &str) -> String {
        format!("{}/i/communities/{}/home", self.settings.base_url, destination)
    }

    async fn post(&self, destination: &str, text: &str) -> DriverResult<()> {
        self.driver.goto(&self.composer_url(destination)).await?;
        self.driver
            .wait_for(selectors::COMPOSER, self.settings.element_timeout)
            .await?;
        self.driver.click(selectors::COMPOSER).await?;
        self.driver.type_text(selectors::COMPOSER, text).await?;
        self.driver.click(selectors::POST_BUTTON).await?;
        tokio::time::sleep(self.settings.settle).await;
        Ok(())
    }
}

fn is_login_url(url: &str) -> bool {
    url.contains("/login") || url.contains("/i/flow/login")
}

#[async_trait]
impl Publisher for SessionPublisher {
    fn name(&self) -> &str {
        "x-session"
    }

    async fn publish(&self, destination: &str, text: &str) -> Result<DeliveryId> {
        let mut state = self.state.lock().await;
        if *state != SessionState::Ready {
            return Err(PipelineError::SessionExpired(format!(
                "session is {}, cannot post",
                state.as_str()
            )));
        }
        *state = SessionState::Posting;

        match self.post(destination, text).await {
            Ok(()) => {
                *state = SessionState::Ready;
                let n = self.posts.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(DeliveryId(format!("{}#{}", destination, n)))
            }
            Err(DriverError::ElementNotFound(selector)) => {
                // A missing composer is only fatal when we were bounced to the login page
                let landed = self.driver.current_url().await.unwrap_or_default();
                if is_login_url(&landed) {
                    *state = SessionState::Failed;
                    Err(PipelineError::SessionExpired(format!(
                        "redirected to {} while posting to {}",
                        landed, destination
                    )))
                } else {
                    *state = SessionState::Ready;
                    Err(PipelineError::PublishFailed {
                        destination: destination.to_string(),
                        reason: format!("element not found: {}", selector),
                    })
                }
            }
            Err(e) => {
                *state = SessionState::Failed;
                Err(PipelineError::SessionExpired(format!(
                    "browser fault while posting to {}: {}",
                    destination, e
                )))
            }
        }
    }
}
