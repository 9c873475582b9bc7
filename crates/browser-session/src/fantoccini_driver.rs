//! A [`BrowserDriver`] backed by a real WebDriver session via `fantoccini`.
//! Requires the `fantoccini-driver` feature and a running WebDriver endpoint
//! (geckodriver/chromedriver) configured to route through `options.proxy_url`.

use crate::driver::{ActOutcome, BrowserDriver, DialogEvent, NavigateOutcome, ProxyConnectionError, SessionOptions};
use crate::oracle::VisibleElement;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

/// WebDriver endpoint this crate talks to, e.g. `http://localhost:4444`.
/// `SessionOptions` does not carry this separately from `proxy_url` since
/// the proxy is a browser *capability*, not the WebDriver server address;
/// deployments set this alongside their geckodriver/chromedriver instance.
const WEBDRIVER_URL: &str = "http://localhost:4444";

/// A `BrowserDriver` implementation driving a real browser through
/// `fantoccini`'s WebDriver client.
pub struct FantocciniDriver {
    client: Client,
    dialogs: Mutex<Vec<DialogEvent>>,
}

fn proxy_capabilities(options: &SessionOptions) -> Map<String, Value> {
    let mut caps = Map::new();
    caps.insert(
        "proxy".to_string(),
        json!({
            "proxyType": "manual",
            "httpProxy": options.proxy_url,
            "sslProxy": options.proxy_url,
        }),
    );
    if options.headless {
        caps.insert(
            "moz:firefoxOptions".to_string(),
            json!({ "args": ["-headless"] }),
        );
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": ["--headless=new"] }),
        );
    }
    caps
}

#[async_trait]
impl BrowserDriver for FantocciniDriver {
    async fn open(options: &SessionOptions) -> Result<Self, ProxyConnectionError> {
        let caps = proxy_capabilities(options);
        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(WEBDRIVER_URL)
            .await
            .map_err(|e| ProxyConnectionError { proxy_url: options.proxy_url.clone(), message: e.to_string() })?;
        Ok(Self { client, dialogs: Mutex::new(Vec::new()) })
    }

    async fn navigate(&self, url: &str) -> anyhow::Result<NavigateOutcome> {
        self.client.goto(url).await?;
        let final_url = self.client.current_url().await?.to_string();
        Ok(NavigateOutcome { final_url, status_code: 200, redirect_chain: Vec::new() })
    }

    async fn fill(&self, selector: &str, value: &str) -> anyhow::Result<()> {
        let mut element = self.client.find(Locator::Css(selector)).await?;
        element.clear().await?;
        element.send_keys(value).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> anyhow::Result<()> {
        let element = self.client.find(Locator::Css(selector)).await?;
        element.click().await?;
        Ok(())
    }

    async fn select(&self, selector: &str, value: &str) -> anyhow::Result<()> {
        let element = self.client.find(Locator::Css(selector)).await?;
        element.select_by_value(value).await?;
        Ok(())
    }

    async fn submit(&self, selector: &str) -> anyhow::Result<ActOutcome> {
        let element = self.client.find(Locator::Css(selector)).await?;
        let succeeded = element.click().await.is_ok();
        let post_url = self.client.current_url().await?.to_string();
        Ok(ActOutcome { selector_used: selector.to_string(), succeeded, post_url })
    }

    async fn page_text(&self) -> anyhow::Result<String> {
        let body = self.client.find(Locator::Css("body")).await?;
        Ok(body.text().await?)
    }

    async fn visible_interactive_elements(&self) -> anyhow::Result<Vec<VisibleElement>> {
        let mut out = Vec::new();
        for (tag, selector) in [
            ("a", "a"),
            ("button", "button"),
            ("input", "input"),
            ("select", "select"),
            ("textarea", "textarea"),
        ] {
            let elements = self.client.find_all(Locator::Css(selector)).await?;
            for (i, element) in elements.into_iter().enumerate() {
                let label = element.text().await.ok().filter(|t| !t.is_empty());
                out.push(VisibleElement { selector: format!("{selector}:nth-of-type({})", i + 1), tag: tag.to_string(), label });
            }
        }
        Ok(out)
    }

    async fn page_html(&self) -> anyhow::Result<String> {
        Ok(self.client.source().await?)
    }

    async fn current_url(&self) -> anyhow::Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn install_dialog_listener(&self) -> anyhow::Result<()> {
        // WebDriver exposes only a synchronous alert-text/accept surface, not
        // a push-based event stream; callers must poll via drain_dialog_events.
        Ok(())
    }

    async fn drain_dialog_events(&self) -> anyhow::Result<Vec<DialogEvent>> {
        if let Ok(text) = self.client.get_alert_text().await {
            self.client.accept_alert().await?;
            self.dialogs.lock().await.push(DialogEvent { kind: "alert".to_string(), message: text });
        }
        Ok(std::mem::take(&mut *self.dialogs.lock().await))
    }

    async fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_options_set_both_browser_capability_flags() {
        let options = SessionOptions { proxy_url: "http://127.0.0.1:8080".to_string(), headless: true, user_agent: None };
        let caps = proxy_capabilities(&options);
        assert!(caps.contains_key("moz:firefoxOptions"));
        assert!(caps.contains_key("goog:chromeOptions"));
    }

    #[test]
    fn proxy_capability_uses_the_configured_proxy_url() {
        let options = SessionOptions { proxy_url: "http://127.0.0.1:9090".to_string(), headless: false, user_agent: None };
        let caps = proxy_capabilities(&options);
        assert_eq!(caps["proxy"]["httpProxy"], "http://127.0.0.1:9090");
    }
}
