//! JSON-lines import and export of job records.
//!
//! One object per line with `title, company, location, posting_date,
//! job_type, tags, link`. Imported rows go through the same date
//! normalization and link deduplication as scraped listings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::entities::{Job, JobType, NOT_AVAILABLE, NewJob, TAG_DELIMITER};
use crate::ingest::{
    Deduplicator, infer_job_type, normalize_posting_date, retain_storable_tags,
};
use crate::repositories::{JobQuery, JobQueryService, JobStore, SortOrder, StoreError};

#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tags arrive either as a JSON list or as one delimited string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowTags {
    List(Vec<String>),
    Joined(String),
}

impl Default for RowTags {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl RowTags {
    fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::List(tags) => tags,
            Self::Joined(joined) => joined.split(TAG_DELIMITER).map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchangeRow {
    pub title: String,
    pub company: String,
    pub location: String,
    /// ISO date or relative text such as `5d ago`.
    pub posting_date: String,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub tags: RowTags,
    pub link: String,
}

impl InterchangeRow {
    /// A missing job type is inferred from the tags; an unknown one fails the row.
    pub fn into_new_job(self, today: NaiveDate) -> Result<NewJob, String> {
        let link = self.link.trim().to_string();
        if link.is_empty() {
            return Err("row has no link".to_string());
        }

        let tags = self.tags.into_vec();
        let job_type = match self.job_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<JobType>().map_err(|e| e.to_string())?,
            _ => infer_job_type(&tags),
        };
        let tags = retain_storable_tags(tags, &link);

        Ok(NewJob {
            title: or_not_available(self.title.trim().to_string()),
            company: or_not_available(self.company.trim().to_string()),
            location: or_not_available(clean_location(&self.location)),
            posting_date: normalize_posting_date(Some(&self.posting_date), today),
            job_type,
            tags,
            link,
        })
    }
}

impl From<Job> for InterchangeRow {
    fn from(job: Job) -> Self {
        Self {
            title: job.title,
            company: job.company,
            location: job.location,
            posting_date: job.posting_date.format("%Y-%m-%d").to_string(),
            job_type: Some(job.job_type.to_string()),
            tags: RowTags::List(job.tags),
            link: job.link,
        }
    }
}

fn or_not_available(value: String) -> String {
    if value.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        value
    }
}

/// `['Austin', 'USA']` becomes `Austin, USA`; plain text is only re-spaced.
pub fn clean_location(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(|part| part.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Import every line of `reader`. Bad rows are counted and skipped; only
/// reading the input can abort the import.
pub async fn import_jsonl<R, S>(
    reader: R,
    store: &S,
    today: NaiveDate,
) -> Result<ImportReport, InterchangeError>
where
    R: AsyncBufRead + Unpin,
    S: JobStore + ?Sized,
{
    let dedup = Deduplicator::new(store);
    let mut report = ImportReport::default();
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let job = match serde_json::from_str::<InterchangeRow>(&line)
            .map_err(|e| e.to_string())
            .and_then(|row| row.into_new_job(today))
        {
            Ok(job) => job,
            Err(e) => {
                warn!(line = line_no, "Skipping malformed row: {}", e);
                report.failed += 1;
                continue;
            }
        };

        match dedup.exists(&job.link).await {
            Ok(true) => {
                info!(link = %job.link, "Skipping existing job");
                report.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(line = line_no, "Duplicate check failed: {}", e);
                report.failed += 1;
                continue;
            }
        }

        match store.insert(&job).await {
            Ok(_) => report.imported += 1,
            Err(StoreError::UniquenessViolation { .. }) => report.skipped += 1,
            Err(e) => {
                warn!(line = line_no, "Failed to import row: {}", e);
                report.failed += 1;
            }
        }
    }

    info!(
        imported = report.imported,
        skipped = report.skipped,
        failed = report.failed,
        "Import finished"
    );
    Ok(report)
}

/// Write every stored record, oldest first. Returns the number of rows written.
pub async fn export_jsonl<W, Q>(mut writer: W, store: &Q) -> Result<usize, InterchangeError>
where
    W: AsyncWrite + Unpin,
    Q: JobQueryService + ?Sized,
{
    let query = JobQuery {
        sort: SortOrder::Ascending,
        ..Default::default()
    };
    let jobs = store.list(&query).await?;
    let count = jobs.len();

    for job in jobs {
        let mut line = serde_json::to_vec(&InterchangeRow::from(job))?;
        line.push(b'\n');
        writer.write_all(&line).await?;
    }
    writer.flush().await?;

    info!(rows = count, "Export finished");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryJobStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn test_clean_location() {
        assert_eq!(clean_location("['Austin', 'Dallas', 'USA']"), "Austin, Dallas, USA");
        assert_eq!(clean_location("[\"Remote\"]"), "Remote");
        assert_eq!(clean_location("Austin ,USA"), "Austin, USA");
        assert_eq!(clean_location("[]"), "");
    }

    #[test]
    fn test_row_conversion() {
        let row: InterchangeRow = serde_json::from_str(
            r#"{"title":"Analyst","company":"Acme","location":"['London', 'UK']",
                "posting_date":"5d ago","tags":"Life,Internship","link":"https://board.example/job/9"}"#,
        )
        .unwrap();
        let job = row.into_new_job(today()).unwrap();

        assert_eq!(job.location, "London, UK");
        assert_eq!(job.posting_date, NaiveDate::from_ymd_opt(2024, 6, 5).unwrap());
        assert_eq!(job.tags, vec!["Life", "Internship"]);
        assert_eq!(job.job_type, JobType::Intern);
    }

    #[test]
    fn test_row_with_unknown_job_type_fails() {
        let row = InterchangeRow {
            title: "Analyst".to_string(),
            company: "Acme".to_string(),
            location: "UK".to_string(),
            posting_date: "2024-06-01".to_string(),
            job_type: Some("Contract".to_string()),
            tags: RowTags::default(),
            link: "https://board.example/job/9".to_string(),
        };
        assert!(row.into_new_job(today()).is_err());
    }

    #[test]
    fn test_blank_fields_become_sentinels() {
        let row: InterchangeRow = serde_json::from_str(
            r#"{"title":"  ","company":"","location":"[]","posting_date":"2024-06-01",
                "tags":["Life, Health","Remote"],"link":"https://board.example/job/4"}"#,
        )
        .unwrap();
        let job = row.into_new_job(today()).unwrap();

        assert_eq!(job.title, "N/A");
        assert_eq!(job.company, "N/A");
        assert_eq!(job.location, "N/A");
        assert_eq!(job.tags, vec!["Remote"]);
    }

    #[tokio::test]
    async fn test_import_counts_each_outcome() {
        let input = concat!(
            r#"{"title":"A","company":"Acme","location":"USA","posting_date":"2024-06-01","job_type":"Full-Time","tags":["Life"],"link":"https://board.example/job/1"}"#,
            "\n",
            "\n",
            r#"{"title":"A again","company":"Acme","location":"USA","posting_date":"2024-06-01","link":"https://board.example/job/1"}"#,
            "\n",
            "not json\n",
            r#"{"title":"B","company":"Beta","location":"UK","posting_date":"garbage","tags":[],"link":"https://board.example/job/2"}"#,
            "\n",
        );
        let store = InMemoryJobStore::new();

        let report = import_jsonl(input.as_bytes(), &store, today()).await.unwrap();

        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                skipped: 1,
                failed: 1
            }
        );
        let b = store
            .find_by_link("https://board.example/job/2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.posting_date, today());
    }

    #[tokio::test]
    async fn test_export_then_import_into_fresh_store() {
        let source = InMemoryJobStore::new();
        let input = concat!(
            r#"{"title":"Late","company":"Acme","location":"USA","posting_date":"2024-06-05","tags":["Part-Time"],"link":"https://board.example/job/2"}"#,
            "\n",
            r#"{"title":"Early","company":"Acme","location":"USA","posting_date":"2024-06-01","tags":[],"link":"https://board.example/job/1"}"#,
            "\n",
        );
        import_jsonl(input.as_bytes(), &source, today()).await.unwrap();

        let mut out = Vec::new();
        let written = export_jsonl(&mut out, &source).await.unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let first: InterchangeRow = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first.title, "Early");
        assert_eq!(first.posting_date, "2024-06-01");

        let target = InMemoryJobStore::new();
        let report = import_jsonl(text.as_bytes(), &target, today()).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(target.snapshot().await[1].job_type, JobType::PartTime);
    }
}
