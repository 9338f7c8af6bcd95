//! Section content store trait and upsert helper.

use crate::error::Result;
use async_trait::async_trait;
use sitekit_core::{Content, SectionId, SectionRecord};
use tracing::debug;

/// Result of a write against an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row existed and was written
    Written,
    /// The row does not exist (HTTP 404)
    Missing,
}

/// Which write an [`upsert`] ended up performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// PATCH succeeded against an existing row
    Updated,
    /// PATCH found no row, POST created it
    Created,
}

/// Backend holding one JSON content blob per section id.
///
/// A missing row is a normal state, not an error: reads report it as `None`
/// and in-place writes as [`WriteOutcome::Missing`]. Every other failure is
/// an `Err`.
#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Fetch the stored record, `None` if the section was never created.
    async fn fetch(&self, id: &SectionId) -> Result<Option<SectionRecord>>;

    /// Replace the content of an existing row.
    async fn update(&self, id: &SectionId, content: &Content) -> Result<WriteOutcome>;

    /// Create a new row.
    async fn create(&self, id: &SectionId, content: &Content) -> Result<()>;

    /// Delete a row.
    async fn delete(&self, id: &SectionId) -> Result<WriteOutcome>;

    /// List every stored row.
    async fn list(&self) -> Result<Vec<SectionRecord>>;

    /// Short identifier used in logs.
    fn store_id(&self) -> &str;
}

/// Write `content` for `id`, creating the row when the update finds none.
///
/// Callers never need to know whether the section already exists.
pub async fn upsert(store: &dyn SectionStore, id: &SectionId, content: &Content) -> Result<Upsert> {
    match store.update(id, content).await? {
        WriteOutcome::Written => Ok(Upsert::Updated),
        WriteOutcome::Missing => {
            debug!(section_id = %id, store = store.store_id(), "section missing, creating");
            store.create(id, content).await?;
            Ok(Upsert::Created)
        }
    }
}
