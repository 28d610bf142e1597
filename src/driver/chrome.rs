//! Headless Chromium page driver.
//!
//! Runs the source's JavaScript, so pagination controls that are plain
//! `<button>`s wired to scripts can be clicked. One browser process is
//! started per run and closed by `quit`; `abandon` hands the close off to
//! the runtime when the run can no longer await it.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ScrapeConfig;
use crate::driver::{
    DriverError, DriverLauncher, Locator, PageDriver, collapse_whitespace, is_disabled_control,
};

/// Handle to a live DOM element.
#[derive(Clone)]
pub struct ChromeNode(Arc<Element>);

pub struct ChromeDriver {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: JoinHandle<()>,
    runtime: Handle,
    nav_timeout: Duration,
    poll_interval: Duration,
}

fn browser_error(err: CdpError) -> DriverError {
    match err {
        CdpError::Timeout => DriverError::Timeout("browser request".to_string()),
        other => DriverError::Browser(other.to_string()),
    }
}

impl ChromeDriver {
    fn page(&self) -> Result<&Page, DriverError> {
        self.page.as_ref().ok_or(DriverError::Closed)
    }

    async fn query(
        &self,
        scope: Option<&ChromeNode>,
        locator: &Locator,
    ) -> Result<Vec<ChromeNode>, DriverError> {
        let css = locator.css_selector();
        let elements = match scope {
            Some(node) => node.0.find_elements(css).await,
            None => self.page()?.find_elements(css).await,
        }
        .map_err(browser_error)?;

        let mut nodes = Vec::with_capacity(elements.len());
        for element in elements {
            if let Locator::CssWithText { text, .. } = locator {
                let visible = element
                    .inner_text()
                    .await
                    .map_err(browser_error)?
                    .unwrap_or_default();
                if !visible.contains(text.as_str()) {
                    continue;
                }
            }
            nodes.push(ChromeNode(Arc::new(element)));
        }
        Ok(nodes)
    }

    /// Resolve a relative `href` against the page the browser is showing.
    async fn absolute(&self, value: &str) -> Result<String, DriverError> {
        let current = self.page()?.url().await.map_err(browser_error)?;
        let resolved = current
            .and_then(|base| Url::parse(&base).ok())
            .and_then(|base| base.join(value).ok())
            .map(String::from);
        Ok(resolved.unwrap_or_else(|| value.to_string()))
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    type Node = ChromeNode;

    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let page = self.page()?;
        match tokio::time::timeout(self.nav_timeout, page.goto(url)).await {
            Ok(result) => {
                result.map_err(browser_error)?;
                Ok(())
            }
            Err(_) => Err(DriverError::Timeout(url.to_string())),
        }
    }

    #[instrument(skip(self, locator), fields(locator = %locator))]
    async fn wait_for_elements(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<ChromeNode>, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.query(None, locator).await {
                Ok(nodes) if !nodes.is_empty() => return Ok(nodes),
                Ok(_) => {}
                // the document may be swapped out mid-query while a page loads
                Err(DriverError::Browser(e)) => debug!("Query failed while waiting: {}", e),
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout(locator.to_string()));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn find_elements(
        &self,
        scope: Option<&ChromeNode>,
        locator: &Locator,
    ) -> Result<Vec<ChromeNode>, DriverError> {
        self.query(scope, locator).await
    }

    async fn text(&self, node: &ChromeNode) -> Result<String, DriverError> {
        let text = node.0.inner_text().await.map_err(browser_error)?;
        Ok(collapse_whitespace(&text.unwrap_or_default()))
    }

    async fn attribute(
        &self,
        node: &ChromeNode,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let Some(value) = node.0.attribute(name).await.map_err(browser_error)? else {
            return Ok(None);
        };
        if name.eq_ignore_ascii_case("href") {
            return self.absolute(&value).await.map(Some);
        }
        Ok(Some(value))
    }

    /// Click and wait until the document changes, whether the control
    /// navigates or re-renders the listing in place.
    #[instrument(skip_all)]
    async fn click(&mut self, node: &ChromeNode) -> Result<(), DriverError> {
        if !self.is_enabled(node).await? {
            return Err(DriverError::NotClickable("control is disabled".to_string()));
        }
        let page = self.page()?;
        let before = page.content().await.map_err(browser_error)?;
        node.0.click().await.map_err(browser_error)?;

        let deadline = Instant::now() + self.nav_timeout;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            match page.content().await {
                Ok(after) if after != before => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("Page not readable after click: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout("page change after click".to_string()));
            }
        }
    }

    async fn is_enabled(&self, node: &ChromeNode) -> Result<bool, DriverError> {
        let disabled = node.0.attribute("disabled").await.map_err(browser_error)?;
        let aria = node.0.attribute("aria-disabled").await.map_err(browser_error)?;
        let class = node.0.attribute("class").await.map_err(browser_error)?;
        Ok(!is_disabled_control(
            disabled.is_some(),
            aria.as_deref(),
            class.as_deref(),
        ))
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!("Failed to close page: {}", e);
        }

        let mut closed = Ok(());
        if let Some(mut browser) = self.browser.take() {
            closed = browser.close().await.map(|_| ()).map_err(browser_error);
            if let Err(e) = browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
        closed
    }

    fn abandon(&mut self) {
        let page = self.page.take();
        let browser = self.browser.take();
        if page.is_none() && browser.is_none() {
            return;
        }
        let handler = self.handler.abort_handle();

        self.runtime.spawn(async move {
            if let Some(page) = page
                && let Err(e) = page.close().await
            {
                debug!("Failed to close abandoned page: {}", e);
            }
            if let Some(mut browser) = browser {
                if let Err(e) = browser.close().await {
                    warn!("Failed to close abandoned browser: {}", e);
                }
                let _ = browser.wait().await;
            }
            handler.abort();
        });
    }
}

/// Starts a headless Chromium per run.
pub struct ChromeLauncher {
    config: ScrapeConfig,
}

impl ChromeLauncher {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverLauncher for ChromeLauncher {
    type Driver = ChromeDriver;

    async fn launch(&self) -> Result<ChromeDriver, DriverError> {
        let browser_config = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.config.wait_timeout)
            .arg(format!("--user-agent={}", self.config.user_agent))
            .build()
            .map_err(DriverError::Init)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| DriverError::Init(e.to_string()))?;

        // CDP events must be drained for the browser to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(DriverError::Init(e.to_string()));
            }
        };
        debug!("Browser started");

        Ok(ChromeDriver {
            browser: Some(browser),
            page: Some(page),
            handler,
            runtime: Handle::current(),
            nav_timeout: self.config.wait_timeout,
            poll_interval: self.config.poll_interval,
        })
    }
}
