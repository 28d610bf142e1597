use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::entities::{Job, JobPatch, NewJob, encode_tags};
use crate::repositories::{JobQuery, JobQueryService, JobStore, StoreError};

#[derive(Default)]
struct State {
    next_id: i64,
    jobs: Vec<Job>,
}

/// Process-local store with the same uniqueness rules as the `jobs` table.
/// Backs dry runs and tests.
#[derive(Default)]
pub struct InMemoryJobStore {
    state: RwLock<State>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.state.read().await.jobs.clone()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_by_link(&self, link: &str) -> Result<Option<Job>, StoreError> {
        let state = self.state.read().await;
        Ok(state.jobs.iter().find(|j| j.link == link).cloned())
    }

    async fn insert(&self, job: &NewJob) -> Result<Job, StoreError> {
        job.encoded_tags()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        if job.link.is_empty() {
            return Err(StoreError::InvalidRecord("link must not be empty".to_string()));
        }

        let mut state = self.state.write().await;
        if state.jobs.iter().any(|j| j.link == job.link) {
            return Err(StoreError::UniquenessViolation {
                link: job.link.clone(),
            });
        }
        state.next_id += 1;
        let stored = job.clone().into_job(state.next_id);
        state.jobs.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl JobQueryService for InMemoryJobStore {
    async fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let state = self.state.read().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| query.matches(j))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| query.compare(a, b));
        Ok(jobs)
    }

    async fn get(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let state = self.state.read().await;
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn update(&self, id: i64, patch: JobPatch) -> Result<Job, StoreError> {
        let mut state = self.state.write().await;

        let mut updated = state
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))?;
        patch.apply(&mut updated);

        encode_tags(&updated.tags).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        if state
            .jobs
            .iter()
            .any(|j| j.id != id && j.link == updated.link)
        {
            return Err(StoreError::UniquenessViolation {
                link: updated.link,
            });
        }

        if let Some(slot) = state.jobs.iter_mut().find(|j| j.id == id) {
            *slot = updated.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.jobs.len();
        state.jobs.retain(|j| j.id != id);
        Ok(state.jobs.len() < before)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::JobType;
    use chrono::NaiveDate;

    fn new_job(link: &str) -> NewJob {
        NewJob {
            title: "Pricing Actuary".to_string(),
            company: "Acme Re".to_string(),
            location: "USA".to_string(),
            posting_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            job_type: JobType::FullTime,
            tags: vec![],
            link: link.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_enforces_unique_link() {
        let store = InMemoryJobStore::new();
        let a = store.insert(&new_job("https://example.com/a")).await.unwrap();
        let b = store.insert(&new_job("https://example.com/b")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let err = store
            .insert(&new_job("https://example.com/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniquenessViolation { link } if link == "https://example.com/a"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_rejects_tags_containing_delimiter() {
        let store = InMemoryJobStore::new();
        let mut job = new_job("https://example.com/a");
        job.tags = vec!["Life, Health".to_string()];
        assert!(matches!(
            store.insert(&job).await,
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_cannot_steal_another_link() {
        let store = InMemoryJobStore::new();
        store.insert(&new_job("https://example.com/a")).await.unwrap();
        let b = store.insert(&new_job("https://example.com/b")).await.unwrap();

        let err = store
            .update(
                b.id,
                JobPatch {
                    link: Some("https://example.com/a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniquenessViolation { .. }));
        assert_eq!(
            store.get(b.id).await.unwrap().unwrap().link,
            "https://example.com/b"
        );
    }

    #[tokio::test]
    async fn test_delete_reports_whether_row_existed() {
        let store = InMemoryJobStore::new();
        let a = store.insert(&new_job("https://example.com/a")).await.unwrap();
        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(store.find_by_link("https://example.com/a").await.unwrap().is_none());
    }
}
