//! Shared preview overlay.
//!
//! The overlay maps section ids to unsaved content written by the editing UI.
//! Each entry is a `watch` channel, so resolvers subscribe to exactly the
//! section they render and are only woken when the stored value actually
//! changes. Rewriting an entry with equal content is not a change.
//!
//! Alongside the pending content every slot remembers the content last
//! committed to the store. Open handles follow commits to move their
//! baseline; a pending entry equal to its committed content is not unsaved.

use sitekit_core::{Content, SectionId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::debug;

struct Slot {
    pending: watch::Sender<Option<Content>>,
    committed: watch::Sender<Option<Content>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            pending: watch::channel(None).0,
            committed: watch::channel(None).0,
        }
    }

    fn is_unsaved(&self) -> bool {
        let pending = self.pending.borrow();
        pending.is_some() && *pending != *self.committed.borrow()
    }

    /// Nothing pending and nobody listening.
    fn is_idle(&self) -> bool {
        self.pending.borrow().is_none()
            && self.pending.receiver_count() == 0
            && self.committed.receiver_count() == 0
    }
}

/// Process-wide map from section id to its preview override.
///
/// Cloning yields another handle to the same overlay.
#[derive(Clone, Default)]
pub struct PreviewOverlay {
    slots: Arc<RwLock<HashMap<SectionId, Slot>>>,
}

impl PreviewOverlay {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current override for `id`.
    #[must_use]
    pub fn get(&self, id: &SectionId) -> Option<Content> {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        slots.get(id).and_then(|slot| slot.pending.borrow().clone())
    }

    /// Store an override. Returns `true` if the stored value changed.
    pub fn set(&self, id: &SectionId, content: Content) -> bool {
        let changed = self.with_slot(id, |slot| {
            slot.pending.send_if_modified(|current| {
                if current.as_ref() == Some(&content) {
                    false
                } else {
                    *current = Some(content);
                    true
                }
            })
        });
        if changed {
            debug!(section_id = %id, "preview override updated");
        }
        changed
    }

    /// Drop the override for `id`, returning it.
    pub fn remove(&self, id: &SectionId) -> Option<Content> {
        let mut slots = self.slots.write().expect("acquire write lock on overlay");
        let slot = slots.get(id)?;
        let mut previous = None;
        slot.pending.send_if_modified(|current| {
            previous = current.take();
            previous.is_some()
        });
        if slot.is_idle() {
            slots.remove(id);
        }
        previous
    }

    /// Remove the override for `id` only if it still equals `expected`.
    pub fn remove_if_eq(&self, id: &SectionId, expected: &Content) -> bool {
        let mut slots = self.slots.write().expect("acquire write lock on overlay");
        let Some(slot) = slots.get(id) else {
            return false;
        };
        let removed = slot.pending.send_if_modified(|current| {
            if current.as_ref() == Some(expected) {
                *current = None;
                true
            } else {
                false
            }
        });
        if slot.is_idle() {
            slots.remove(id);
        }
        removed
    }

    /// Record that `content` was written to the store for `id`.
    ///
    /// Handles following `id` move their baseline to it. A pending entry
    /// equal to `content` stops counting as unsaved; it is dropped at once
    /// when no handle renders it, otherwise the handles settle it. A pending
    /// entry that changed since it was read is kept as unsaved.
    pub fn commit(&self, id: &SectionId, content: &Content) {
        let mut slots = self.slots.write().expect("acquire write lock on overlay");
        let slot = slots.entry(id.clone()).or_insert_with(Slot::new);
        slot.committed.send_replace(Some(content.clone()));
        if slot.pending.receiver_count() == 0 {
            slot.pending.send_if_modified(|current| {
                if current.as_ref() == Some(content) {
                    *current = None;
                    true
                } else {
                    false
                }
            });
        }
        if slot.is_idle() {
            slots.remove(id);
        }
        debug!(section_id = %id, "section content committed");
    }

    /// Content last committed for `id`.
    #[must_use]
    pub fn committed(&self, id: &SectionId) -> Option<Content> {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        slots.get(id).and_then(|slot| slot.committed.borrow().clone())
    }

    /// Drop every override and commit, as on navigation away from the editor.
    pub fn clear(&self) {
        let mut slots = self.slots.write().expect("acquire write lock on overlay");
        let mut cleared = 0usize;
        for slot in slots.values() {
            slot.committed.send_if_modified(|current| current.take().is_some());
            if slot.pending.send_if_modified(|current| current.take().is_some()) {
                cleared += 1;
            }
        }
        slots.retain(|_, slot| !slot.is_idle());
        debug!(cleared, "preview overlay cleared");
    }

    /// Subscribe to changes of the override for `id`.
    ///
    /// The receiver starts with the current value marked as seen.
    #[must_use]
    pub fn subscribe(&self, id: &SectionId) -> watch::Receiver<Option<Content>> {
        self.with_slot(id, |slot| slot.pending.subscribe())
    }

    /// Subscribe to commits for `id`.
    #[must_use]
    pub fn subscribe_commits(&self, id: &SectionId) -> watch::Receiver<Option<Content>> {
        self.with_slot(id, |slot| slot.committed.subscribe())
    }

    /// Whether an override exists for `id`.
    #[must_use]
    pub fn contains(&self, id: &SectionId) -> bool {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        slots.get(id).is_some_and(|slot| slot.pending.borrow().is_some())
    }

    /// Every pending override, ordered by section id.
    #[must_use]
    pub fn entries(&self) -> Vec<(SectionId, Content)> {
        self.collect_entries(|_| true)
    }

    /// Pending overrides that differ from what was last committed.
    #[must_use]
    pub fn unsaved_entries(&self) -> Vec<(SectionId, Content)> {
        self.collect_entries(Slot::is_unsaved)
    }

    /// Whether any override differs from what was last committed.
    #[must_use]
    pub fn has_unsaved(&self) -> bool {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        slots.values().any(Slot::is_unsaved)
    }

    /// Number of pending overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        slots
            .values()
            .filter(|slot| slot.pending.borrow().is_some())
            .count()
    }

    /// Whether no override is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_entries(&self, keep: impl Fn(&Slot) -> bool) -> Vec<(SectionId, Content)> {
        let slots = self.slots.read().expect("acquire read lock on overlay");
        let mut entries: Vec<_> = slots
            .iter()
            .filter(|&(_, slot)| keep(slot))
            .filter_map(|(id, slot)| {
                slot.pending
                    .borrow()
                    .clone()
                    .map(|content| (id.clone(), content))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.read().expect("acquire read lock on overlay").len()
    }

    fn with_slot<R>(&self, id: &SectionId, f: impl FnOnce(&Slot) -> R) -> R {
        {
            let slots = self.slots.read().expect("acquire read lock on overlay");
            if let Some(slot) = slots.get(id) {
                return f(slot);
            }
        }
        let mut slots = self.slots.write().expect("acquire write lock on overlay");
        let slot = slots.entry(id.clone()).or_insert_with(Slot::new);
        f(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitekit_core::content::as_object;

    fn id(s: &str) -> SectionId {
        SectionId::new(s).expect("valid id")
    }

    fn obj(v: serde_json::Value) -> Content {
        as_object(v).expect("object")
    }

    #[test]
    fn test_set_get_remove() {
        let overlay = PreviewOverlay::new();
        assert!(overlay.get(&id("hero-1")).is_none());

        assert!(overlay.set(&id("hero-1"), obj(json!({"title": "C"}))));
        assert_eq!(overlay.get(&id("hero-1")), Some(obj(json!({"title": "C"}))));
        assert!(overlay.contains(&id("hero-1")));
        assert_eq!(overlay.len(), 1);

        assert_eq!(overlay.remove(&id("hero-1")), Some(obj(json!({"title": "C"}))));
        assert!(overlay.is_empty());
        assert!(overlay.remove(&id("hero-1")).is_none());
    }

    #[test]
    fn test_equal_content_is_not_a_change() {
        let overlay = PreviewOverlay::new();
        assert!(overlay.set(&id("hero-1"), obj(json!({"title": "C", "n": 1}))));
        assert!(!overlay.set(&id("hero-1"), obj(json!({"n": 1, "title": "C"}))));
        assert!(overlay.set(&id("hero-1"), obj(json!({"title": "D", "n": 1}))));
    }

    #[tokio::test]
    async fn test_subscriber_sees_only_real_changes() {
        let overlay = PreviewOverlay::new();
        let mut rx = overlay.subscribe(&id("hero-1"));

        overlay.set(&id("hero-1"), obj(json!({"title": "C"})));
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow_and_update(), Some(obj(json!({"title": "C"}))));

        overlay.set(&id("hero-1"), obj(json!({"title": "C"})));
        assert!(!rx.has_changed().expect("sender alive"));

        overlay.clear();
        assert!(rx.has_changed().expect("sender alive"));
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_entries_are_sorted() {
        let overlay = PreviewOverlay::new();
        overlay.set(&id("b-1"), Content::new());
        overlay.set(&id("a-1"), Content::new());
        let ids: Vec<_> = overlay.entries().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![id("a-1"), id("b-1")]);
    }

    #[test]
    fn test_commit_settles_unwatched_entry() {
        let overlay = PreviewOverlay::new();
        overlay.set(&id("hero-1"), obj(json!({"title": "C"})));
        assert!(overlay.has_unsaved());

        overlay.commit(&id("hero-1"), &obj(json!({"title": "C"})));
        assert!(!overlay.contains(&id("hero-1")));
        assert!(!overlay.has_unsaved());
    }

    #[test]
    fn test_commit_keeps_watched_entry_as_saved() {
        let overlay = PreviewOverlay::new();
        let _rx = overlay.subscribe(&id("hero-1"));
        overlay.set(&id("hero-1"), obj(json!({"title": "C"})));

        overlay.commit(&id("hero-1"), &obj(json!({"title": "C"})));
        assert!(overlay.contains(&id("hero-1")));
        assert!(!overlay.has_unsaved());
        assert!(overlay.unsaved_entries().is_empty());
        assert_eq!(overlay.committed(&id("hero-1")), Some(obj(json!({"title": "C"}))));
    }

    #[test]
    fn test_commit_keeps_newer_edit_unsaved() {
        let overlay = PreviewOverlay::new();
        overlay.set(&id("hero-1"), obj(json!({"title": "D"})));

        overlay.commit(&id("hero-1"), &obj(json!({"title": "C"})));
        assert_eq!(overlay.get(&id("hero-1")), Some(obj(json!({"title": "D"}))));
        assert_eq!(overlay.unsaved_entries().len(), 1);
    }

    #[test]
    fn test_remove_if_eq() {
        let overlay = PreviewOverlay::new();
        overlay.set(&id("hero-1"), obj(json!({"title": "D"})));
        assert!(!overlay.remove_if_eq(&id("hero-1"), &obj(json!({"title": "C"}))));
        assert!(overlay.remove_if_eq(&id("hero-1"), &obj(json!({"title": "D"}))));
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_unwatched_slots_are_pruned() {
        let overlay = PreviewOverlay::new();
        overlay.set(&id("a-1"), Content::new());
        overlay.set(&id("b-1"), Content::new());
        let rx = overlay.subscribe(&id("c-1"));
        assert_eq!(overlay.slot_count(), 3);

        overlay.remove(&id("a-1"));
        assert_eq!(overlay.slot_count(), 2);

        overlay.clear();
        assert_eq!(overlay.slot_count(), 1);

        drop(rx);
        overlay.clear();
        assert_eq!(overlay.slot_count(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let overlay = PreviewOverlay::new();
        let editor = overlay.clone();
        editor.set(&id("faq-1"), obj(json!({"items": []})));
        assert!(overlay.contains(&id("faq-1")));
    }
}
