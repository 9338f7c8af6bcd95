//! Per-section in-flight fetch tracking.

use sitekit_core::SectionId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Set of section ids with a content fetch outstanding.
#[derive(Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<HashSet<SectionId>>>,
}

impl InFlightSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as in flight. Returns `None` if another fetch holds it.
    #[must_use]
    pub fn try_acquire(&self, id: &SectionId) -> Option<InFlightGuard> {
        let inserted = self
            .ids
            .lock()
            .expect("acquire in-flight lock")
            .insert(id.clone());
        inserted.then(|| InFlightGuard {
            set: self.clone(),
            id: id.clone(),
        })
    }

    /// Whether a fetch for `id` is outstanding.
    #[must_use]
    pub fn contains(&self, id: &SectionId) -> bool {
        self.ids.lock().expect("acquire in-flight lock").contains(id)
    }

    /// Number of outstanding fetches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.lock().expect("acquire in-flight lock").len()
    }

    /// Whether no fetch is outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its section id from the set on drop.
pub struct InFlightGuard {
    set: InFlightSet,
    id: SectionId,
}

impl InFlightGuard {
    /// Section this guard holds.
    #[must_use]
    pub fn section_id(&self) -> &SectionId {
        &self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.set.ids.lock() {
            ids.remove(&self.id);
        }
    }
}
