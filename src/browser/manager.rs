use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::driver::PageDriver;
use crate::error::EngineError;
use crate::semantic::{self, RawElement, EXTRACT_ELEMENTS_SCRIPT};

/// Manages the browser lifecycle and implements the page operations the
/// replay engine needs over CDP.
pub struct BrowserManager {
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<Page>>>,
    /// Lock to prevent concurrent browser launches.
    launch_lock: tokio::sync::Mutex<()>,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            page: Arc::new(Mutex::new(None)),
            launch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Launch Chrome and open a blank page.
    pub async fn launch(&self, headless: bool) -> Result<()> {
        let _launch_guard = self.launch_lock.lock().await;

        // Close any existing browser first
        self.close().await.ok();

        let mut config = BrowserConfig::builder().window_size(1280, 720);
        if !headless {
            config = config.with_head();
        }
        config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-default-apps")
            .arg("--disable-extensions");

        let config = config
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = timeout(Duration::from_secs(30), Browser::launch(config))
            .await
            .map_err(|_| anyhow!("Browser launch timeout (30s) - Chrome may not be installed or is unresponsive"))?
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("Failed to create page: {}", e))?;

        *self.browser.lock().await = Some(browser);
        *self.page.lock().await = Some(page);

        tracing::info!(headless, "Browser launched");
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        let mut page_guard = self.page.lock().await;
        let mut browser_guard = self.browser.lock().await;

        if let Some(page) = page_guard.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = browser_guard.take() {
            let _ = browser.close().await;
        }

        tracing::info!("Browser closed");
        Ok(())
    }

    async fn page(&self) -> Result<Page> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No page available"))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.page().await?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("Failed to evaluate script: {}", e))?;
        result
            .into_value()
            .map_err(|e| anyhow!("Failed to parse script result: {}", e))
    }

    /// Run `body` with `el` bound to the element the selector matches.
    /// Understands CSS selectors and XPath (anything starting with `/`).
    async fn with_element(&self, selector: &str, body: &str) -> Result<serde_json::Value> {
        let selector_js = serde_json::to_string(selector)?;
        let script = format!(
            r#"
            (() => {{
                const sel = {selector_js};
                const el = sel.startsWith('/')
                    ? document.evaluate(sel, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue
                    : document.querySelector(sel);
                if (!el) return null;
                return ((el) => {{ {body} }})(el);
            }})()
            "#
        );
        self.evaluate(&script).await
    }

    async fn require_element(&self, selector: &str, body: &str) -> Result<serde_json::Value> {
        let value = self.with_element(selector, body).await?;
        if value.is_null() {
            return Err(anyhow!("No element matches selector '{}'", selector));
        }
        Ok(value)
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

fn interaction_err(e: anyhow::Error) -> EngineError {
    EngineError::InteractionError(e.to_string())
}

#[async_trait]
impl PageDriver for BrowserManager {
    async fn navigate(&self, url: &str) -> crate::error::Result<()> {
        let page = self.page().await.map_err(interaction_err)?;
        page.goto(url)
            .await
            .map_err(|e| EngineError::InteractionError(format!("Failed to navigate to {}: {}", url, e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| EngineError::InteractionError(format!("Navigation to {} did not settle: {}", url, e)))?;
        Ok(())
    }

    async fn current_url(&self) -> crate::error::Result<String> {
        let page = self.page().await.map_err(interaction_err)?;
        page.url()
            .await
            .map_err(|e| EngineError::InteractionError(format!("Failed to get URL: {}", e)))?
            .ok_or_else(|| EngineError::InteractionError("URL is None".to_string()))
    }

    async fn snapshot_elements(&self) -> crate::error::Result<Vec<RawElement>> {
        let value = self
            .evaluate(EXTRACT_ELEMENTS_SCRIPT)
            .await
            .map_err(interaction_err)?;
        semantic::element::parse_elements(&value).map_err(interaction_err)
    }

    async fn selector_exists(&self, selector: &str) -> crate::error::Result<bool> {
        let value = self
            .with_element(selector, "return true;")
            .await
            .map_err(interaction_err)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, force: bool) -> crate::error::Result<()> {
        if force || selector.starts_with('/') {
            self.require_element(selector, "el.click(); return true;")
                .await
                .map_err(interaction_err)?;
            return Ok(());
        }

        let page = self.page().await.map_err(interaction_err)?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|e| EngineError::InteractionError(format!("Failed to find element '{}': {}", selector, e)))?;
        element
            .click()
            .await
            .map_err(|e| EngineError::InteractionError(format!("Failed to click '{}': {}", selector, e)))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> crate::error::Result<()> {
        let value_js = serde_json::to_string(value).map_err(|e| interaction_err(e.into()))?;
        let body = format!(
            r#"
            el.focus();
            el.value = {value_js};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#
        );
        self.require_element(selector, &body)
            .await
            .map_err(interaction_err)?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, option_label: &str) -> crate::error::Result<()> {
        let label_js = serde_json::to_string(option_label).map_err(|e| interaction_err(e.into()))?;
        let body = format!(
            r#"
            const wanted = {label_js}.trim();
            const option = Array.from(el.options || [])
                .find(o => o.text.trim() === wanted);
            if (!option) return false;
            el.value = option.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#
        );
        let value = self
            .require_element(selector, &body)
            .await
            .map_err(interaction_err)?;
        if value.as_bool() != Some(true) {
            return Err(EngineError::InteractionError(format!(
                "No option labelled '{}' in '{}'",
                option_label, selector
            )));
        }
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> crate::error::Result<()> {
        let body = format!(
            r#"
            el.checked = {checked};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#
        );
        self.require_element(selector, &body)
            .await
            .map_err(interaction_err)?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: &str) -> crate::error::Result<()> {
        let key_js = serde_json::to_string(key).map_err(|e| interaction_err(e.into()))?;
        let body = format!(
            r#"
            el.focus();
            const opts = {{ key: {key_js}, bubbles: true, cancelable: true }};
            el.dispatchEvent(new KeyboardEvent('keydown', opts));
            el.dispatchEvent(new KeyboardEvent('keypress', opts));
            el.dispatchEvent(new KeyboardEvent('keyup', opts));
            if ({key_js} === 'Enter' && el.form) el.form.requestSubmit();
            return true;
            "#
        );
        self.require_element(selector, &body)
            .await
            .map_err(interaction_err)?;
        Ok(())
    }

    async fn scroll_by(&self, x: i64, y: i64) -> crate::error::Result<()> {
        self.evaluate(&format!("window.scrollBy({}, {})", x, y))
            .await
            .map_err(interaction_err)?;
        Ok(())
    }

    async fn field_value(&self, selector: &str) -> crate::error::Result<Option<String>> {
        let value = self
            .with_element(selector, "return el.value ?? null;")
            .await
            .map_err(interaction_err)?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn is_checked(&self, selector: &str) -> crate::error::Result<Option<bool>> {
        let value = self
            .with_element(selector, "return el.checked ?? null;")
            .await
            .map_err(interaction_err)?;
        Ok(value.as_bool())
    }

    async fn selected_label(&self, selector: &str) -> crate::error::Result<Option<String>> {
        let body = r#"
            const option = el.selectedOptions && el.selectedOptions[0];
            return option ? option.text.trim() : null;
        "#;
        let value = self
            .with_element(selector, body)
            .await
            .map_err(interaction_err)?;
        Ok(value.as_str().map(|s| s.to_string()))
    }
}
