use async_trait::async_trait;
use fantoccini::{error::CmdError, Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;

use super::session::{BrowserDriver, DriverError, DriverResult};

/// WebDriver key code for Enter
const ENTER: &str = "\u{E007}";

/// Browser driven over the WebDriver protocol (chromedriver, geckodriver, ...)
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    pub async fn connect(webdriver_url: &str, headless: bool) -> DriverResult<Self> {
        let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1280,900"];
        if headless {
            args.push("--headless=new");
        }

        let mut capabilities = serde_json::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities);
        let client = builder
            .connect(webdriver_url)
            .await
            .map_err(|e| DriverError::Protocol(format!("cannot open session at {}: {}", webdriver_url, e)))?;

        tracing::debug!(webdriver_url, headless, "webdriver session opened");
        Ok(Self { client })
    }
}

fn map_err(selector: &str, err: CmdError) -> DriverError {
    if err.is_no_such_element() || matches!(err, CmdError::WaitTimeout) {
        DriverError::ElementNotFound(selector.to_string())
    } else {
        DriverError::Protocol(err.to_string())
    }
}

#[async_trait]
impl BrowserDriver for WebDriverBrowser {
    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.client
            .goto(url)
            .await
            .map_err(|e| DriverError::Navigation(format!("{}: {}", url, e)))
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.client
            .wait()
            .at_most(timeout)
            .for_element(Locator::Css(selector))
            .await
            .map(|_| ())
            .map_err(|e| map_err(selector, e))
    }

    async fn click(&self, selector: &str) -> DriverResult<()> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| map_err(selector, e))?;
        element.click().await.map_err(|e| map_err(selector, e))
    }

    async fn type_text(&self, selector: &str, text: &str) -> DriverResult<()> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(|e| map_err(selector, e))?;
        element.send_keys(text).await.map_err(|e| map_err(selector, e))
    }

    async fn press_enter(&self, selector: &str) -> DriverResult<()> {
        self.type_text(selector, ENTER).await
    }

    async fn close(&self) -> DriverResult<()> {
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }
}
