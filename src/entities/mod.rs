use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Placeholder stored when a text field could not be extracted.
pub const NOT_AVAILABLE: &str = "N/A";

/// Separator used for the `tags` column. A tag may never contain it.
pub const TAG_DELIMITER: char = ',';

/// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum JobType {
    #[default]
    #[serde(rename = "Full-Time")]
    FullTime,
    #[serde(rename = "Part-Time")]
    PartTime,
    #[serde(rename = "Intern")]
    Intern,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullTime => "Full-Time",
            Self::PartTime => "Part-Time",
            Self::Intern => "Intern",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown job type: {0}")]
pub struct UnknownJobType(pub String);

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-time" | "fulltime" | "full time" => Ok(Self::FullTime),
            "part-time" | "parttime" | "part time" => Ok(Self::PartTime),
            "intern" | "internship" => Ok(Self::Intern),
            _ => Err(UnknownJobType(s.to_string())),
        }
    }
}

/// --- Tags ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TagError {
    #[error("tag '{0}' contains the ',' delimiter")]
    ContainsDelimiter(String),
}

/// Join tags for storage, preserving order.
pub fn encode_tags(tags: &[String]) -> Result<String, TagError> {
    if let Some(bad) = tags.iter().find(|t| t.contains(TAG_DELIMITER)) {
        return Err(TagError::ContainsDelimiter(bad.clone()));
    }
    Ok(tags.join(&TAG_DELIMITER.to_string()))
}

/// Split a stored tag column back into an ordered list. Empty column means no tags.
pub fn decode_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(TAG_DELIMITER).map(str::to_string).collect()
}

/// --- Tables ---

/// Row of the `jobs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: NaiveDate,
    pub job_type: String,
    pub tags: String,
    pub link: String,
}

/// A stored job listing with its tags decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: NaiveDate,
    pub job_type: JobType,
    pub tags: Vec<String>,
    pub link: String,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            // rows written outside the pipeline may carry free-form types
            job_type: row.job_type.parse().unwrap_or_default(),
            tags: decode_tags(&row.tags),
            title: row.title,
            company: row.company,
            location: row.location,
            posting_date: row.posting_date,
            link: row.link,
        }
    }
}

/// A fully assembled listing that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    pub location: String,
    pub posting_date: NaiveDate,
    pub job_type: JobType,
    pub tags: Vec<String>,
    pub link: String,
}

impl NewJob {
    pub fn encoded_tags(&self) -> Result<String, TagError> {
        encode_tags(&self.tags)
    }

    pub fn into_job(self, id: i64) -> Job {
        Job {
            id,
            title: self.title,
            company: self.company,
            location: self.location,
            posting_date: self.posting_date,
            job_type: self.job_type,
            tags: self.tags,
            link: self.link,
        }
    }
}

/// Partial update applied through the HTTP API. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub posting_date: Option<NaiveDate>,
    pub job_type: Option<JobType>,
    pub tags: Option<Vec<String>>,
    pub link: Option<String>,
}

impl JobPatch {
    pub fn apply(self, job: &mut Job) {
        if let Some(title) = self.title {
            job.title = title;
        }
        if let Some(company) = self.company {
            job.company = company;
        }
        if let Some(location) = self.location {
            job.location = location;
        }
        if let Some(posting_date) = self.posting_date {
            job.posting_date = posting_date;
        }
        if let Some(job_type) = self.job_type {
            job.job_type = job_type;
        }
        if let Some(tags) = self.tags {
            job.tags = tags;
        }
        if let Some(link) = self.link {
            job.link = link;
        }
    }
}
