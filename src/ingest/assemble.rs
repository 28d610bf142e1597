use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::entities::{JobType, NOT_AVAILABLE, NewJob, TAG_DELIMITER};
use crate::ingest::dates::normalize_posting_date;
use crate::ingest::extract::{LocationParts, RawListing};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AssembleError {
    /// Without a link the listing has no identity and cannot be deduplicated.
    #[error("listing has no detail link")]
    MissingLink,
}

/// "Austin, Dallas, USA", "USA", or the sentinel when the country is unknown.
pub fn compose_location(parts: Option<&LocationParts>) -> String {
    match parts {
        Some(LocationParts { country, cities }) if !country.trim().is_empty() => {
            let mut segments: Vec<&str> = cities.iter().map(String::as_str).collect();
            segments.push(country);
            segments.join(", ")
        }
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// "intern" wins over "part-time"; anything else is full-time.
pub fn infer_job_type(tags: &[String]) -> JobType {
    let lowered: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    if lowered.iter().any(|t| t.contains("intern")) {
        JobType::Intern
    } else if lowered.iter().any(|t| t.contains("part-time")) {
        JobType::PartTime
    } else {
        JobType::FullTime
    }
}

/// Drop tags that cannot be stored because they contain the delimiter.
/// The rest of the record is unaffected.
pub fn retain_storable_tags(tags: Vec<String>, link: &str) -> Vec<String> {
    tags.into_iter()
        .filter(|tag| {
            let storable = !tag.contains(TAG_DELIMITER);
            if !storable {
                warn!(link = %link, tag = %tag, "Dropping tag containing '{}'", TAG_DELIMITER);
            }
            storable
        })
        .collect()
}

/// Build the canonical record for one listing. A record is either complete
/// or not produced at all.
pub fn assemble(raw: RawListing, today: NaiveDate) -> Result<NewJob, AssembleError> {
    let link = raw
        .link
        .filter(|l| !l.trim().is_empty())
        .ok_or(AssembleError::MissingLink)?;
    let job_type = infer_job_type(&raw.tags);
    let tags = retain_storable_tags(raw.tags, &link);

    Ok(NewJob {
        title: raw.title.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        company: raw.company.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        location: compose_location(raw.location.as_ref()),
        posting_date: normalize_posting_date(raw.posted_on.as_deref(), today),
        job_type,
        tags,
        link,
    })
}
