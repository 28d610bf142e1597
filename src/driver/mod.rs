//! Page driver abstraction used by the ingestion pipeline.
//!
//! A driver owns one browsing session: it navigates to a URL, waits for
//! listing elements to show up, and hands back opaque node handles that the
//! field extractors query. The pipeline never holds a driver as global
//! state; it is launched per run through a [`DriverLauncher`] and released
//! with [`PageDriver::quit`] on every exit path.
//!
//! Two drivers ship: [`HtmlPageDriver`] reads server-rendered HTML and
//! follows link-bearing controls, and `ChromeDriver` (feature `browser`)
//! drives headless Chromium for pages that paginate with JavaScript.

#[cfg(feature = "browser")]
pub mod chrome;
pub mod html;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::fetcher::FetchError;

#[cfg(feature = "browser")]
pub use chrome::{ChromeDriver, ChromeLauncher, ChromeNode};
pub use html::{HtmlLauncher, HtmlNode, HtmlPageDriver, PageSource, SourcePage, StaticSource};

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("driver failed to start: {0}")]
    Init(String),

    #[error("navigation failed: {0}")]
    Navigation(#[from] FetchError),

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    Absent(String),

    #[error("invalid selector {0}")]
    InvalidSelector(String),

    #[error("element cannot be clicked: {0}")]
    NotClickable(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("no page loaded")]
    NoPage,

    #[error("driver already closed")]
    Closed,
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Navigation(fetch) => fetch.is_timeout(),
            _ => false,
        }
    }
}

/// How to find an element on a page or inside another element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    /// CSS match whose visible text contains `text`.
    CssWithText { css: String, text: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn css_with_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: selector.into(),
            text: text.into(),
        }
    }

    pub fn css_selector(&self) -> &str {
        match self {
            Self::Css(css) | Self::CssWithText { css, .. } => css,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "`{}`", css),
            Self::CssWithText { css, text } => write!(f, "`{}` containing '{}'", css, text),
        }
    }
}

/// Browser-like capability consumed by the scraper.
///
/// `scope = None` searches the whole page; `Some(node)` searches only the
/// descendants of `node`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Node: Clone + Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Block until at least one element matches, or fail with
    /// [`DriverError::Timeout`] once `timeout` has elapsed.
    async fn wait_for_elements(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Vec<Self::Node>, DriverError>;

    async fn find_elements(
        &self,
        scope: Option<&Self::Node>,
        locator: &Locator,
    ) -> Result<Vec<Self::Node>, DriverError>;

    async fn find_element(
        &self,
        scope: Option<&Self::Node>,
        locator: &Locator,
    ) -> Result<Self::Node, DriverError> {
        self.find_elements(scope, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Absent(locator.to_string()))
    }

    /// Visible text with whitespace collapsed.
    async fn text(&self, node: &Self::Node) -> Result<String, DriverError>;

    async fn attribute(&self, node: &Self::Node, name: &str)
    -> Result<Option<String>, DriverError>;

    async fn click(&mut self, node: &Self::Node) -> Result<(), DriverError>;

    async fn is_enabled(&self, node: &Self::Node) -> Result<bool, DriverError>;

    /// Release the session. Must be safe to call more than once.
    async fn quit(&mut self) -> Result<(), DriverError>;

    /// Synchronous fallback for when `quit` can no longer be awaited, such
    /// as a run unwinding from a panic. Best effort; must not block.
    fn abandon(&mut self) {}
}

/// Acquires a fresh driver for one ingestion run.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    type Driver: PageDriver;

    async fn launch(&self) -> Result<Self::Driver, DriverError>;
}

/// Same rule for every driver: `disabled`, `aria-disabled="true"` or a
/// `disabled` class.
pub(crate) fn is_disabled_control(
    disabled_attr: bool,
    aria_disabled: Option<&str>,
    class: Option<&str>,
) -> bool {
    disabled_attr
        || aria_disabled.is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || class.is_some_and(|c| c.split_whitespace().any(|c| c == "disabled"))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_display() {
        assert_eq!(Locator::css(".job").to_string(), "`.job`");
        assert_eq!(
            Locator::css_with_text("button", "Next").to_string(),
            "`button` containing 'Next'"
        );
        assert_eq!(Locator::css_with_text("button", "Next").css_selector(), "button");
    }

    #[test]
    fn test_timeout_detection_covers_navigation() {
        assert!(DriverError::Timeout("x".to_string()).is_timeout());
        assert!(DriverError::Navigation(FetchError::RequestTimeout).is_timeout());
        assert!(!DriverError::Absent("x".to_string()).is_timeout());
        assert!(!DriverError::Browser("target closed".to_string()).is_timeout());
    }

    #[test]
    fn test_disabled_control_rule() {
        assert!(is_disabled_control(true, None, None));
        assert!(is_disabled_control(false, Some("TRUE"), None));
        assert!(is_disabled_control(false, None, Some("btn disabled")));
        assert!(!is_disabled_control(false, Some("false"), Some("btn btn-disabled")));
    }
}
