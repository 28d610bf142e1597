use crate::driver::Locator;

/// Where each field lives in the source markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSet {
    pub listing: Locator,
    pub title: Locator,
    pub company: Locator,
    pub locations: Locator,
    pub country: Locator,
    pub city: Locator,
    pub salary: Locator,
    pub tags: Locator,
    pub tag: Locator,
    pub posted_on: Locator,
    pub link: Locator,
    pub next_page: Locator,
}

impl Default for SelectorSet {
    /// Markup of the actuary job board the scraper was written for.
    fn default() -> Self {
        Self {
            listing: Locator::css(".Job_job-card__YgDAV"),
            title: Locator::css(".Job_job-card__position__ic1rc"),
            company: Locator::css(".Job_job-card__company__7T9qY"),
            locations: Locator::css(".Job_job-card__locations__x1exr"),
            country: Locator::css(".Job_job-card__country__GRVhK"),
            city: Locator::css(".Job_job-card__location__bq7jX"),
            salary: Locator::css("[class*='Job_job-card__salary']"),
            tags: Locator::css(".Job_job-card__tags__zfriA"),
            // the board reuses the location chip class for tags
            tag: Locator::css(".Job_job-card__location__bq7jX"),
            posted_on: Locator::css(".Job_job-card__posted-on__NCZaJ"),
            link: Locator::css(".Job_job-page-link__a5I5g"),
            next_page: Locator::css_with_text("button", "Next"),
        }
    }
}
