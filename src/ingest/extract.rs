//! Per-field extraction from one listing node.
//!
//! Every field is looked up independently and a failure only blanks that
//! field. Nothing in here returns an error to the caller.

use tracing::debug;

use crate::driver::{Locator, PageDriver};
use crate::ingest::selectors::SelectorSet;

/// Country plus the cities listed with it, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationParts {
    pub country: String,
    pub cities: Vec<String>,
}

/// Fields as found on the page, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<LocationParts>,
    /// Collected for logging; not part of the stored record.
    pub salary: Option<String>,
    pub tags: Vec<String>,
    pub posted_on: Option<String>,
    pub link: Option<String>,
}

pub struct FieldExtractor<'a> {
    selectors: &'a SelectorSet,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(selectors: &'a SelectorSet) -> Self {
        Self { selectors }
    }

    pub async fn extract<D: PageDriver>(&self, driver: &D, node: &D::Node) -> RawListing {
        RawListing {
            title: self.title(driver, node).await,
            company: self.company(driver, node).await,
            location: self.location(driver, node).await,
            salary: self.salary(driver, node).await,
            tags: self.tags(driver, node).await,
            posted_on: self.posted_on(driver, node).await,
            link: self.link(driver, node).await,
        }
    }

    pub async fn title<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Option<String> {
        text_of(driver, node, &self.selectors.title).await
    }

    pub async fn company<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Option<String> {
        text_of(driver, node, &self.selectors.company).await
    }

    pub async fn salary<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Option<String> {
        text_of(driver, node, &self.selectors.salary).await
    }

    pub async fn posted_on<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Option<String> {
        text_of(driver, node, &self.selectors.posted_on).await
    }

    /// Absent country means the whole location is unknown, even when cities
    /// are present.
    pub async fn location<D: PageDriver>(
        &self,
        driver: &D,
        node: &D::Node,
    ) -> Option<LocationParts> {
        let block = match driver.find_element(Some(node), &self.selectors.locations).await {
            Ok(block) => block,
            Err(e) => {
                debug!("location block unavailable: {}", e);
                return None;
            }
        };
        let country = text_of(driver, &block, &self.selectors.country).await?;
        let cities = texts_of(driver, &block, &self.selectors.city).await;
        Some(LocationParts { country, cities })
    }

    pub async fn tags<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Vec<String> {
        match driver.find_element(Some(node), &self.selectors.tags).await {
            Ok(block) => texts_of(driver, &block, &self.selectors.tag).await,
            Err(e) => {
                debug!("tag block unavailable: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn link<D: PageDriver>(&self, driver: &D, node: &D::Node) -> Option<String> {
        let anchor = match driver.find_element(Some(node), &self.selectors.link).await {
            Ok(anchor) => anchor,
            Err(e) => {
                debug!("link unavailable: {}", e);
                return None;
            }
        };
        match driver.attribute(&anchor, "href").await {
            Ok(Some(href)) if !href.trim().is_empty() => Some(href.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!("link href unreadable: {}", e);
                None
            }
        }
    }
}

/// Trimmed text of the first match, `None` when missing or blank.
async fn text_of<D: PageDriver>(driver: &D, scope: &D::Node, locator: &Locator) -> Option<String> {
    let element = match driver.find_element(Some(scope), locator).await {
        Ok(element) => element,
        Err(e) => {
            debug!("{} unavailable: {}", locator, e);
            return None;
        }
    };
    match driver.text(&element).await {
        Ok(text) => non_blank(text),
        Err(e) => {
            debug!("{} text unreadable: {}", locator, e);
            None
        }
    }
}

/// Trimmed, non-blank texts of every match, in page order.
async fn texts_of<D: PageDriver>(driver: &D, scope: &D::Node, locator: &Locator) -> Vec<String> {
    let elements = match driver.find_elements(Some(scope), locator).await {
        Ok(elements) => elements,
        Err(e) => {
            debug!("{} unavailable: {}", locator, e);
            return Vec::new();
        }
    };
    let mut texts = Vec::with_capacity(elements.len());
    for element in &elements {
        if let Ok(text) = driver.text(element).await
            && let Some(text) = non_blank(text)
        {
            texts.push(text);
        }
    }
    texts
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
