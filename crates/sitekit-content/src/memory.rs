//! In-process section store.
//!
//! Used by hosts running without a backend (static previews) and by tests,
//! which rely on its request log, failure injection and fetch gate.

use crate::error::{ContentError, Result};
use crate::store::{SectionStore, WriteOutcome};
use async_trait::async_trait;
use chrono::Utc;
use sitekit_core::{Content, SectionId, SectionRecord};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Store operation, as recorded in the request log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMethod {
    /// `fetch`
    Get,
    /// `update`
    Patch,
    /// `create`
    Post,
    /// `delete`
    Delete,
    /// `list`
    List,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreRequest {
    /// Operation
    pub method: StoreMethod,
    /// Target section, `None` for `list`
    pub section_id: Option<SectionId>,
    /// Written content for `update`/`create`
    pub body: Option<Content>,
}

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<SectionId, SectionRecord>,
    requests: Vec<StoreRequest>,
    failures: HashMap<StoreMethod, u16>,
}

/// Section store kept entirely in memory.
#[derive(Clone)]
pub struct MemorySectionStore {
    state: Arc<Mutex<MemoryState>>,
    gate: Arc<watch::Sender<bool>>,
}

impl Default for MemorySectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySectionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            gate: Arc::new(gate),
        }
    }

    /// Seed a record without logging a request.
    pub fn insert(&self, id: SectionId, content: Content) {
        let now = Utc::now();
        self.lock().records.insert(
            id.clone(),
            SectionRecord {
                section_id: id,
                content,
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
    }

    /// Current stored content for `id`.
    #[must_use]
    pub fn content(&self, id: &SectionId) -> Option<Content> {
        self.lock().records.get(id).map(|r| r.content.clone())
    }

    /// Every request made so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<StoreRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests made with `method`.
    #[must_use]
    pub fn count(&self, method: StoreMethod) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Make every subsequent `method` call fail with `status`.
    pub fn fail_with(&self, method: StoreMethod, status: u16) {
        self.lock().failures.insert(method, status);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Hold `fetch` calls after they are logged until [`resume_fetches`](Self::resume_fetches).
    pub fn pause_fetches(&self) {
        self.gate.send_replace(false);
    }

    /// Release held and future `fetch` calls.
    pub fn resume_fetches(&self) {
        self.gate.send_replace(true);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().expect("acquire memory store lock")
    }

    fn record(
        &self,
        method: StoreMethod,
        section_id: Option<&SectionId>,
        body: Option<&Content>,
    ) -> Result<()> {
        let mut state = self.lock();
        state.requests.push(StoreRequest {
            method,
            section_id: section_id.cloned(),
            body: body.cloned(),
        });
        match state.failures.get(&method) {
            Some(&status) => Err(ContentError::Api {
                status,
                message: "injected failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SectionStore for MemorySectionStore {
    async fn fetch(&self, id: &SectionId) -> Result<Option<SectionRecord>> {
        let outcome = self.record(StoreMethod::Get, Some(id), None);

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| ContentError::Internal("memory store gate closed".to_string()))?;

        outcome?;
        Ok(self.lock().records.get(id).cloned())
    }

    async fn update(&self, id: &SectionId, content: &Content) -> Result<WriteOutcome> {
        self.record(StoreMethod::Patch, Some(id), Some(content))?;
        let mut state = self.lock();
        match state.records.get_mut(id) {
            Some(record) => {
                record.content = content.clone();
                record.updated_at = Some(Utc::now());
                Ok(WriteOutcome::Written)
            }
            None => Ok(WriteOutcome::Missing),
        }
    }

    async fn create(&self, id: &SectionId, content: &Content) -> Result<()> {
        self.record(StoreMethod::Post, Some(id), Some(content))?;
        let mut state = self.lock();
        if state.records.contains_key(id) {
            return Err(ContentError::Api {
                status: 400,
                message: "Section with this ID already exists".to_string(),
            });
        }
        let now = Utc::now();
        state.records.insert(
            id.clone(),
            SectionRecord {
                section_id: id.clone(),
                content: content.clone(),
                created_at: Some(now),
                updated_at: Some(now),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &SectionId) -> Result<WriteOutcome> {
        self.record(StoreMethod::Delete, Some(id), None)?;
        match self.lock().records.remove(id) {
            Some(_) => Ok(WriteOutcome::Written),
            None => Ok(WriteOutcome::Missing),
        }
    }

    async fn list(&self) -> Result<Vec<SectionRecord>> {
        self.record(StoreMethod::List, None, None)?;
        Ok(self.lock().records.values().cloned().collect())
    }

    fn store_id(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{upsert, Upsert};
    use serde_json::json;
    use sitekit_core::content::as_object;

    fn id(s: &str) -> SectionId {
        SectionId::new(s).expect("valid id")
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let store = MemorySectionStore::new();
        let body = as_object(json!({"title": "A"})).unwrap();

        assert_eq!(upsert(&store, &id("cta-1"), &body).await.unwrap(), Upsert::Created);
        assert_eq!(upsert(&store, &id("cta-1"), &body).await.unwrap(), Upsert::Updated);

        let methods: Vec<_> = store.requests().iter().map(|r| r.method).collect();
        assert_eq!(
            methods,
            vec![StoreMethod::Patch, StoreMethod::Post, StoreMethod::Patch]
        );
        assert_eq!(store.content(&id("cta-1")), Some(body));
    }

    #[tokio::test]
    async fn test_create_existing_is_rejected() {
        let store = MemorySectionStore::new();
        store.insert(id("faq-1"), Content::new());
        let err = store.create(&id("faq-1"), &Content::new()).await.unwrap_err();
        assert!(matches!(err, ContentError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemorySectionStore::new();
        store.fail_with(StoreMethod::Get, 503);
        let err = store.fetch(&id("hero-1")).await.unwrap_err();
        assert!(matches!(err, ContentError::Api { status: 503, .. }));

        store.clear_failures();
        assert!(store.fetch(&id("hero-1")).await.unwrap().is_none());
        assert_eq!(store.count(StoreMethod::Get), 2);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let store = MemorySectionStore::new();
        store.insert(id("a-1"), Content::new());
        store.insert(id("b-1"), Content::new());

        assert_eq!(store.delete(&id("a-1")).await.unwrap(), WriteOutcome::Written);
        assert_eq!(store.delete(&id("a-1")).await.unwrap(), WriteOutcome::Missing);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].section_id, id("b-1"));
    }

    #[tokio::test]
    async fn test_paused_fetch_waits_for_resume() {
        let store = MemorySectionStore::new();
        store.insert(id("hero-1"), as_object(json!({"title": "B"})).unwrap());
        store.pause_fetches();

        let pending = tokio::spawn({
            let store = store.clone();
            async move { store.fetch(&id("hero-1")).await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        store.resume_fetches();
        let record = pending.await.unwrap().unwrap().expect("record");
        assert_eq!(record.content["title"], "B");
    }
}
