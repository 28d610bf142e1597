//! Paginated ingestion run.
//!
//! One driver is launched per run and walked page by page: listings on the
//! current page are extracted, assembled, deduplicated and stored before the
//! "next" control is followed. The run ends on the first stop condition and
//! always reports how many records it stored and why it stopped. The driver
//! is released on every exit path, including a panic mid-run.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ScrapeConfig;
use crate::driver::{DriverError, DriverLauncher, PageDriver};
use crate::ingest::assemble::assemble;
use crate::ingest::dedup::Deduplicator;
use crate::ingest::extract::FieldExtractor;
use crate::ingest::selectors::SelectorSet;
use crate::repositories::{JobStore, StoreError};

#[derive(Error, Debug)]
pub enum IngestError {
    /// The page driver could not be started. Nothing was scraped.
    #[error("ingestion could not start: {0}")]
    Init(#[source] DriverError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub start_url: String,
    /// Maximum number of new records stored per run.
    pub cap: usize,
    pub wait_timeout: Duration,
    /// Pause after each page advance.
    pub page_delay: Duration,
    pub selectors: SelectorSet,
}

impl IngestSettings {
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            start_url: config.source_url.clone(),
            cap: config.max_jobs,
            wait_timeout: config.wait_timeout,
            page_delay: config.page_delay,
            selectors: SelectorSet::default(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&ScrapeConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CapReached,
    NoMorePages,
    Timeout,
    /// A page or next control failed for a reason other than time.
    NavigationFailed,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CapReached => "cap_reached",
            Self::NoMorePages => "no_more_pages",
            Self::Timeout => "timeout",
            Self::NavigationFailed => "navigation_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// New records stored during this run.
    pub scraped_count: usize,
    pub stop_reason: StopReason,
    pub pages_visited: usize,
    pub skipped_duplicates: usize,
    /// Listings that could not be assembled or persisted.
    pub dropped: usize,
}

/// Owns the driver for one run. `release` is the normal exit; if the run is
/// torn down before reaching it the driver is abandoned on drop.
struct DriverGuard<D: PageDriver> {
    driver: D,
    released: bool,
}

impl<D: PageDriver> DriverGuard<D> {
    fn new(driver: D) -> Self {
        Self {
            driver,
            released: false,
        }
    }

    async fn release(&mut self) {
        if let Err(e) = self.driver.quit().await {
            warn!("Failed to release page driver: {}", e);
        }
        self.released = true;
    }
}

impl<D: PageDriver> Drop for DriverGuard<D> {
    fn drop(&mut self) {
        if !self.released {
            warn!("Run ended without releasing the page driver, abandoning it");
            self.driver.abandon();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingOutcome {
    Stored,
    Duplicate,
    Dropped,
}

#[derive(Default)]
struct Counters {
    scraped: usize,
    pages: usize,
    duplicates: usize,
    dropped: usize,
}

impl Counters {
    fn record(&mut self, outcome: ListingOutcome) {
        match outcome {
            ListingOutcome::Stored => self.scraped += 1,
            ListingOutcome::Duplicate => self.duplicates += 1,
            ListingOutcome::Dropped => self.dropped += 1,
        }
    }

    fn finish(self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            scraped_count: self.scraped,
            stop_reason,
            pages_visited: self.pages,
            skipped_duplicates: self.duplicates,
            dropped: self.dropped,
        }
    }
}

/// Run one ingestion pass. Only a driver that fails to start is an error;
/// every other failure ends up in the summary or in the logs.
pub async fn run_ingestion<L, S>(
    launcher: &L,
    store: &S,
    settings: &IngestSettings,
    cancel: Option<&CancellationToken>,
) -> Result<RunSummary, IngestError>
where
    L: DriverLauncher,
    S: JobStore + ?Sized,
{
    let span = info_span!("ingest", source = %settings.start_url, cap = settings.cap);

    async move {
        let mut guard = match launcher.launch().await {
            Ok(driver) => DriverGuard::new(driver),
            Err(e) => {
                error!("Failed to start page driver: {}", e);
                return Err(IngestError::Init(e));
            }
        };

        let today = Local::now().date_naive();
        let summary = traverse(&mut guard.driver, store, settings, cancel, today).await;
        guard.release().await;

        info!(
            scraped = summary.scraped_count,
            pages = summary.pages_visited,
            skipped = summary.skipped_duplicates,
            dropped = summary.dropped,
            "Ingestion stopped: {}",
            summary.stop_reason
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}

async fn traverse<D, S>(
    driver: &mut D,
    store: &S,
    settings: &IngestSettings,
    cancel: Option<&CancellationToken>,
    today: NaiveDate,
) -> RunSummary
where
    D: PageDriver,
    S: JobStore + ?Sized,
{
    let extractor = FieldExtractor::new(&settings.selectors);
    let dedup = Deduplicator::new(store);
    let mut counters = Counters::default();

    if let Err(e) = driver.navigate(&settings.start_url).await {
        warn!("Could not open {}: {}", settings.start_url, e);
        return counters.finish(failure_reason(&e));
    }

    let stop_reason = loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            info!("Cancellation requested");
            break StopReason::Cancelled;
        }

        let page_span = info_span!("page", number = counters.pages + 1);
        let listings = match driver
            .wait_for_elements(&settings.selectors.listing, settings.wait_timeout)
            .instrument(page_span.clone())
            .await
        {
            Ok(listings) => listings,
            Err(e) => {
                warn!("Listings did not appear: {}", e);
                break StopReason::Timeout;
            }
        };
        counters.pages += 1;

        async {
            debug!("Found {} listings", listings.len());
            for node in &listings {
                if counters.scraped >= settings.cap {
                    break;
                }
                let outcome = process_listing(&*driver, &extractor, &dedup, store, node, today).await;
                counters.record(outcome);
            }
        }
        .instrument(page_span)
        .await;

        if counters.scraped >= settings.cap {
            break StopReason::CapReached;
        }

        let next = match driver.find_element(None, &settings.selectors.next_page).await {
            Ok(next) => next,
            Err(e) => {
                debug!("No next page control: {}", e);
                break StopReason::NoMorePages;
            }
        };
        match driver.is_enabled(&next).await {
            Ok(true) => {}
            Ok(false) => break StopReason::NoMorePages,
            Err(e) => {
                warn!("Next page control unreadable: {}", e);
                break failure_reason(&e);
            }
        }
        // enabled control: more pages exist
        if let Err(e) = driver.click(&next).await {
            warn!("Could not advance to the next page: {}", e);
            break failure_reason(&e);
        }

        if pause(settings.page_delay, cancel).await {
            info!("Cancellation requested");
            break StopReason::Cancelled;
        }
    };

    counters.finish(stop_reason)
}

fn failure_reason(err: &DriverError) -> StopReason {
    if err.is_timeout() {
        StopReason::Timeout
    } else {
        StopReason::NavigationFailed
    }
}

/// Sleep for `delay`; returns true when cancelled first.
async fn pause(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        },
        None => {
            tokio::time::sleep(delay).await;
            false
        }
    }
}

async fn process_listing<D, S>(
    driver: &D,
    extractor: &FieldExtractor<'_>,
    dedup: &Deduplicator<'_, S>,
    store: &S,
    node: &D::Node,
    today: NaiveDate,
) -> ListingOutcome
where
    D: PageDriver,
    S: JobStore + ?Sized,
{
    let raw = extractor.extract(driver, node).await;
    if let Some(salary) = &raw.salary {
        debug!(salary = %salary, "Salary seen");
    }

    let job = match assemble(raw, today) {
        Ok(job) => job,
        Err(e) => {
            warn!("Dropping listing: {}", e);
            return ListingOutcome::Dropped;
        }
    };

    match dedup.exists(&job.link).await {
        Ok(true) => {
            info!(link = %job.link, "Skipped duplicate");
            return ListingOutcome::Duplicate;
        }
        Ok(false) => {}
        Err(e) => {
            error!(link = %job.link, "Duplicate check failed: {}", e);
            return ListingOutcome::Dropped;
        }
    }

    match store.insert(&job).await {
        Ok(stored) => {
            info!(id = stored.id, link = %stored.link, "Stored job");
            ListingOutcome::Stored
        }
        Err(StoreError::UniquenessViolation { link }) => {
            info!(link = %link, "Skipped duplicate (inserted concurrently)");
            ListingOutcome::Duplicate
        }
        Err(e) => {
            error!(link = %job.link, "Failed to store job: {}", e);
            ListingOutcome::Dropped
        }
    }
}
