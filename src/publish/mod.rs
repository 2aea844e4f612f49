//! Publishing backends.
//!
//! The runner only sees the [`Publisher`] trait. Three backends implement it:
//! - [`XApiPublisher`]: stateless call to the X v2 API per alert
//! - [`SessionPublisher`]: one logged-in browser session reused for every post
//! - [`ConsolePublisher`]: prints alerts instead of posting them (dry run)

pub mod console;
pub mod session;
pub mod webdriver;
pub mod x_api;

pub use console::ConsolePublisher;
pub use session::{BrowserDriver, DriverError, SessionPublisher, SessionSettings, SessionState};
pub use webdriver::WebDriverBrowser;
pub use x_api::XApiPublisher;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DeliveryId;

/// Delivers formatted alert text to a destination
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Deliver `text` to `destination`. Failures are reported, never retried here.
    async fn publish(&self, destination: &str, text: &str) -> Result<DeliveryId>;
}
