use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::entities::{Job, JobPatch, JobRow, NewJob};
use crate::repositories::{
    JobQuery, JobQueryService, JobStore, SortOrder, StoreError, query::like_pattern,
};

const JOB_COLUMNS: &str = "id, title, company, location, posting_date, job_type, tags, link";

/// PostgreSQL-backed job repository. The `link` column carries a UNIQUE
/// constraint, which is the final word on duplicates.
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_write_error(err: sqlx::Error, link: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
    {
        return StoreError::UniquenessViolation {
            link: link.to_string(),
        };
    }
    StoreError::Database(err)
}

#[async_trait]
impl JobStore for PgJobRepository {
    async fn find_by_link(&self, link: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE link = $1",
            JOB_COLUMNS
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Job::from))
    }

    async fn insert(&self, job: &NewJob) -> Result<Job, StoreError> {
        let tags = job
            .encoded_tags()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            INSERT INTO jobs (title, company, location, posting_date, job_type, tags, link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(job.posting_date)
        .bind(job.job_type.as_str())
        .bind(tags)
        .bind(&job.link)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &job.link))?;

        Ok(row.into())
    }
}

#[async_trait]
impl JobQueryService for PgJobRepository {
    async fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM jobs WHERE TRUE", JOB_COLUMNS));

        if let Some(job_type) = query.job_type {
            builder.push(" AND job_type = ").push_bind(job_type.as_str());
        }
        if let Some(location) = &query.location {
            builder
                .push(" AND location ILIKE ")
                .push_bind(like_pattern(location));
        }
        if let Some(tag) = &query.tag {
            builder.push(" AND tags ILIKE ").push_bind(like_pattern(tag));
        }
        builder.push(match query.sort {
            SortOrder::Ascending => " ORDER BY posting_date ASC, id ASC",
            SortOrder::Descending => " ORDER BY posting_date DESC, id ASC",
        });

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Job::from))
    }

    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError> {
        let mut job = self.get(id).await?.ok_or(StoreError::NotFound(id))?;
        patch.apply(&mut job);

        let tags = crate::entities::encode_tags(&job.tags)
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            r#"
            UPDATE jobs
            SET title = $2,
                company = $3,
                location = $4,
                posting_date = $5,
                job_type = $6,
                tags = $7,
                link = $8
            WHERE id = $1
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .bind(id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(job.posting_date)
        .bind(job.job_type.as_str())
        .bind(tags)
        .bind(&job.link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &job.link))?
        // deleted between the read and the write
        .ok_or(StoreError::NotFound(id))?;

        Ok(row.into())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::JobType;
    use chrono::NaiveDate;

    async fn setup_test_db() -> Option<PgJobRepository> {
        // Skip tests if TEST_DATABASE_URL is not set
        let database_url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping database tests: TEST_DATABASE_URL not set");
                return None;
            }
        };

        let pool = PgPool::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        Some(PgJobRepository::new(pool))
    }

    fn new_job(link: &str) -> NewJob {
        NewJob {
            title: "Valuation Actuary".to_string(),
            company: "Acme Life".to_string(),
            location: "Hartford, USA".to_string(),
            posting_date: NaiveDate::from_ymd_opt(2024, 6, 5).unwrap(),
            job_type: JobType::FullTime,
            tags: vec!["Life".to_string(), "Valuation".to_string()],
            link: link.to_string(),
        }
    }

    fn unique_link() -> String {
        format!(
            "https://example.com/jobs/{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_by_link() {
        let Some(repo) = setup_test_db().await else {
            return;
        };
        let link = unique_link();

        let stored = repo.insert(&new_job(&link)).await.expect("insert failed");
        assert_eq!(stored.tags, vec!["Life", "Valuation"]);

        let found = repo
            .find_by_link(&link)
            .await
            .expect("lookup failed")
            .expect("job should exist");
        assert_eq!(found, stored);

        repo.delete(stored.id).await.expect("cleanup failed");
    }

    #[tokio::test]
    async fn test_duplicate_link_is_a_uniqueness_violation() {
        let Some(repo) = setup_test_db().await else {
            return;
        };
        let link = unique_link();

        let stored = repo.insert(&new_job(&link)).await.expect("insert failed");
        let err = repo.insert(&new_job(&link)).await.unwrap_err();
        assert!(matches!(err, StoreError::UniquenessViolation { .. }));

        repo.delete(stored.id).await.expect("cleanup failed");
    }

    #[tokio::test]
    async fn test_update_and_filtered_list() {
        let Some(repo) = setup_test_db().await else {
            return;
        };
        let link = unique_link();
        let stored = repo.insert(&new_job(&link)).await.expect("insert failed");

        let updated = repo
            .update(
                stored.id,
                JobPatch {
                    location: Some("Zürich, Switzerland".to_string()),
                    job_type: Some(JobType::Intern),
                    ..Default::default()
                },
            )
            .await
            .expect("update failed");
        assert_eq!(updated.location, "Zürich, Switzerland");

        let query = JobQuery {
            job_type: Some(JobType::Intern),
            location: Some("zürich".to_string()),
            tag: Some("valuation".to_string()),
            sort: SortOrder::Ascending,
        };
        let listed = repo.list(&query).await.expect("list failed");
        assert!(listed.iter().any(|j| j.id == stored.id));

        assert!(repo.delete(stored.id).await.expect("delete failed"));
        assert!(!repo.delete(stored.id).await.expect("delete failed"));
        assert!(matches!(
            repo.update(stored.id, JobPatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
