use crate::repositories::{JobStore, StoreError};

/// Point lookup by link ahead of insertion. The store's unique constraint
/// stays the final authority when two runs race.
pub struct Deduplicator<'a, S: JobStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: JobStore + ?Sized> Deduplicator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn exists(&self, link: &str) -> Result<bool, StoreError> {
        Ok(self.store.find_by_link(link).await?.is_some())
    }
}
