//! Static-HTML page driver.
//!
//! Pages are loaded through a [`PageSource`] and parsed with `scraper`.
//! No JavaScript runs, so this only works for sources that render their
//! listing cards server-side. Pagination controls are "clicked" by following
//! their `href` (or `data-href`); a script-only control is `NotClickable`.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument};
use url::Url;

use crate::config::ScrapeConfig;
use crate::driver::{
    DriverError, DriverLauncher, Locator, PageDriver, collapse_whitespace, is_disabled_control,
};
use crate::fetcher::{FetchError, HttpFetcher};

/// A page as handed to the driver by its source.
#[derive(Debug, Clone)]
pub struct SourcePage {
    pub url: Url,
    pub html: String,
}

/// Where the HTML driver gets its pages from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn load(&self, url: &Url) -> Result<SourcePage, FetchError>;
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn load(&self, url: &Url) -> Result<SourcePage, FetchError> {
        let page = self.fetch(url).await?;
        Ok(SourcePage {
            url: page.url_final,
            html: page.body,
        })
    }
}

/// Serves canned pages from memory. Used for replaying saved listing pages
/// and in tests; URLs marked with `with_timeout` fail like a stalled server.
#[derive(Default)]
pub struct StaticSource {
    pages: HashMap<String, String>,
    stalled: HashSet<String>,
    loads: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(normalize_key(url), html.to_string());
        self
    }

    pub fn with_timeout(mut self, url: &str) -> Self {
        self.stalled.insert(normalize_key(url));
        self
    }

    /// Number of `load` calls served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

fn normalize_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl PageSource for StaticSource {
    async fn load(&self, url: &Url) -> Result<SourcePage, FetchError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        if self.stalled.contains(url.as_str()) {
            return Err(FetchError::RequestTimeout);
        }
        let html = self.pages.get(url.as_str()).ok_or(FetchError::Http {
            status: reqwest::StatusCode::NOT_FOUND,
            retriable: false,
        })?;
        Ok(SourcePage {
            url: url.clone(),
            html: html.clone(),
        })
    }
}

/// Owned snapshot of one element. Holding the serialized fragment instead of
/// a tree reference keeps nodes `Send` across awaits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlNode {
    tag: String,
    outer_html: String,
    text: String,
    attrs: Vec<(String, String)>,
}

impl HtmlNode {
    fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            tag: element.value().name().to_string(),
            outer_html: element.html(),
            text: collapse_whitespace(&element.text().collect::<String>()),
            attrs: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn is_disabled(&self) -> bool {
        is_disabled_control(
            self.attr("disabled").is_some(),
            self.attr("aria-disabled"),
            self.attr("class"),
        )
    }
}

pub struct HtmlPageDriver<S> {
    source: S,
    poll_interval: Duration,
    current: Option<SourcePage>,
    closed: bool,
}

impl<S: PageSource> HtmlPageDriver<S> {
    pub fn new(source: S, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            current: None,
            closed: false,
        }
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.current.as_ref().map(|p| &p.url)
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    fn page(&self) -> Result<&SourcePage, DriverError> {
        self.ensure_open()?;
        self.current.as_ref().ok_or(DriverError::NoPage)
    }

    fn resolve(&self, target: &str) -> Result<Url, DriverError> {
        let resolved = match &self.current {
            Some(page) => page.url.join(target),
            None => Url::parse(target),
        };
        resolved.map_err(|e| DriverError::Navigation(FetchError::InvalidUrl(e)))
    }

    async fn load(&mut self, url: Url) -> Result<(), DriverError> {
        let page = self.source.load(&url).await.map_err(|e| {
            if e.is_timeout() {
                DriverError::Timeout(url.to_string())
            } else {
                DriverError::Navigation(e)
            }
        })?;
        debug!("Loaded {}", page.url);
        self.current = Some(page);
        Ok(())
    }
}

#[async_trait]
impl<S: PageSource> PageDriver for HtmlPageDriver<S> {
    type Node = HtmlNode;

    #[instrument(skip(self))]
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.ensure_open()?;
        let url = self.resolve(url)?;
        self.load(url).await
    }

    #[instrument(skip(self, locator), fields(locator = %locator))]
    async fn wait_for_elements(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<HtmlNode>, DriverError> {
        let deadline = Instant::now() + timeout;

        loop {
            let page = self.page()?;
            let nodes = select(&page.html, None, locator)?;
            if !nodes.is_empty() {
                return Ok(nodes);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DriverError::Timeout(locator.to_string()));
            }
            let url = page.url.clone();
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;

            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.load(url)).await {
                Ok(result) => result?,
                Err(_) => return Err(DriverError::Timeout(locator.to_string())),
            }
        }
    }

    async fn find_elements(
        &self,
        scope: Option<&HtmlNode>,
        locator: &Locator,
    ) -> Result<Vec<HtmlNode>, DriverError> {
        let page = self.page()?;
        select(&page.html, scope, locator)
    }

    async fn text(&self, node: &HtmlNode) -> Result<String, DriverError> {
        Ok(node.text.clone())
    }

    async fn attribute(&self, node: &HtmlNode, name: &str) -> Result<Option<String>, DriverError> {
        let Some(value) = node.attr(name) else {
            return Ok(None);
        };
        // links come back absolute, like a browser's `href` property
        if name.eq_ignore_ascii_case("href") {
            return Ok(Some(
                self.resolve(value)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| value.to_string()),
            ));
        }
        Ok(Some(value.to_string()))
    }

    async fn click(&mut self, node: &HtmlNode) -> Result<(), DriverError> {
        self.ensure_open()?;
        if node.is_disabled() {
            return Err(DriverError::NotClickable(format!("<{}> is disabled", node.tag)));
        }
        let target = node
            .attr("href")
            .or_else(|| node.attr("data-href"))
            .ok_or_else(|| {
                DriverError::NotClickable(format!("<{}> has no link to follow", node.tag))
            })?
            .to_string();
        let url = self.resolve(&target)?;
        self.load(url).await
    }

    async fn is_enabled(&self, node: &HtmlNode) -> Result<bool, DriverError> {
        Ok(!node.is_disabled())
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.abandon();
        Ok(())
    }

    fn abandon(&mut self) {
        self.current = None;
        self.closed = true;
    }
}

/// Launches an [`HtmlPageDriver`] over HTTP for each run.
pub struct HtmlLauncher {
    config: ScrapeConfig,
}

impl HtmlLauncher {
    pub fn new(config: ScrapeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverLauncher for HtmlLauncher {
    type Driver = HtmlPageDriver<HttpFetcher>;

    async fn launch(&self) -> Result<Self::Driver, DriverError> {
        let fetcher = HttpFetcher::new(&self.config.user_agent, self.config.wait_timeout)
            .map_err(|e| DriverError::Init(e.to_string()))?;
        Ok(HtmlPageDriver::new(fetcher, self.config.poll_interval))
    }
}

fn select(
    html: &str,
    scope: Option<&HtmlNode>,
    locator: &Locator,
) -> Result<Vec<HtmlNode>, DriverError> {
    let css = locator.css_selector();
    let selector = Selector::parse(css)
        .map_err(|e| DriverError::InvalidSelector(format!("`{}`: {:?}", css, e)))?;

    let matched: Vec<HtmlNode> = match scope {
        None => {
            let document = Html::parse_document(html);
            document.select(&selector).map(HtmlNode::from_element).collect()
        }
        Some(node) => {
            let fragment = Html::parse_fragment(&node.outer_html);
            // the fragment root is a synthetic <html>; the node is its first element child
            let element = fragment
                .root_element()
                .children()
                .find_map(ElementRef::wrap);
            match element {
                Some(element) => element.select(&selector).map(HtmlNode::from_element).collect(),
                None => Vec::new(),
            }
        }
    };

    Ok(match locator {
        Locator::Css(_) => matched,
        Locator::CssWithText { text, .. } => matched
            .into_iter()
            .filter(|n| n.text.contains(text.as_str()))
            .collect(),
    })
}
