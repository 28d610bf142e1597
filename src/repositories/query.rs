use std::cmp::Ordering;

use crate::entities::{Job, JobType, TAG_DELIMITER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Anything other than `posting_date_asc` sorts newest first.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("posting_date_asc") => Self::Ascending,
            _ => Self::Descending,
        }
    }
}

/// Filters accepted by the listing endpoint. Text filters are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub job_type: Option<JobType>,
    pub location: Option<String>,
    pub tag: Option<String>,
    pub sort: SortOrder,
}

impl JobQuery {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(job_type) = self.job_type
            && job.job_type != job_type
        {
            return false;
        }
        if let Some(location) = &self.location
            && !contains_ignore_case(&job.location, location)
        {
            return false;
        }
        if let Some(tag) = &self.tag {
            // same haystack as the stored column
            let joined = job.tags.join(&TAG_DELIMITER.to_string());
            if !contains_ignore_case(&joined, tag) {
                return false;
            }
        }
        true
    }

    pub fn compare(&self, a: &Job, b: &Job) -> Ordering {
        let by_date = match self.sort {
            SortOrder::Ascending => a.posting_date.cmp(&b.posting_date),
            SortOrder::Descending => b.posting_date.cmp(&a.posting_date),
        };
        by_date.then(a.id.cmp(&b.id))
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escape `%`, `_` and `\` so user input is matched literally by `ILIKE`.
pub fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
