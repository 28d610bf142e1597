use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{JobPatch, JobType, NewJob, encode_tags};
use crate::repositories::{JobQuery, SortOrder};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_TEXT_LEN: usize = 255;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct JobListParams {
    /// Exact job type: `Full-Time`, `Part-Time` or `Intern`.
    pub job_type: Option<String>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    /// Case-insensitive substring of any tag.
    pub tag: Option<String>,
    /// `posting_date_asc` or `posting_date_desc` (default).
    pub sort: Option<String>,
}

impl JobListParams {
    pub fn into_query(self) -> Result<JobQuery, String> {
        let job_type = match non_empty(self.job_type) {
            Some(raw) => Some(parse_job_type(&raw)?),
            None => None,
        };
        Ok(JobQuery {
            job_type,
            location: non_empty(self.location),
            tag: non_empty(self.tag),
            sort: SortOrder::from_param(self.sort.as_deref()),
        })
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub posting_date: Option<String>,
    pub job_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub link: Option<String>,
}

impl CreateJobRequest {
    pub fn validate(self) -> Result<NewJob, String> {
        let (Some(title), Some(company), Some(location), Some(posting_date), Some(job_type), Some(link)) = (
            self.title,
            self.company,
            self.location,
            self.posting_date,
            self.job_type,
            self.link,
        ) else {
            return Err("Missing required fields".to_string());
        };

        let job = NewJob {
            title: checked_text("title", title)?,
            company: checked_text("company", company)?,
            location: checked_text("location", location)?,
            posting_date: parse_date(&posting_date)?,
            job_type: parse_job_type(&job_type)?,
            tags: checked_tags(self.tags)?,
            link: checked_link(link)?,
        };
        Ok(job)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    /// `YYYY-MM-DD`
    pub posting_date: Option<String>,
    pub job_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub link: Option<String>,
}

impl UpdateJobRequest {
    pub fn validate(self) -> Result<JobPatch, String> {
        Ok(JobPatch {
            title: self.title.map(|v| checked_text("title", v)).transpose()?,
            company: self.company.map(|v| checked_text("company", v)).transpose()?,
            location: self.location.map(|v| checked_text("location", v)).transpose()?,
            posting_date: self.posting_date.as_deref().map(parse_date).transpose()?,
            job_type: self.job_type.as_deref().map(parse_job_type).transpose()?,
            tags: self.tags.map(checked_tags).transpose()?,
            link: self.link.map(checked_link).transpose()?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| "Invalid date format, use YYYY-MM-DD".to_string())
}

fn parse_job_type(raw: &str) -> Result<JobType, String> {
    raw.parse::<JobType>().map_err(|e| e.to_string())
}

fn checked_text(field: &str, value: String) -> Result<String, String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(format!("{} too long", field));
    }
    Ok(value)
}

fn checked_tags(tags: Vec<String>) -> Result<Vec<String>, String> {
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    encode_tags(&tags).map_err(|e| e.to_string())?;
    Ok(tags)
}

fn checked_link(link: String) -> Result<String, String> {
    let link = link.trim().to_string();
    if link.is_empty() {
        return Err("link cannot be empty".to_string());
    }
    Ok(link)
}
