//! Explicit context injected into resolvers.
//!
//! Everything a resolver shares with its siblings lives here: the store, the
//! optional preview overlay, the in-flight fetch set and the frame queue.
//! Tests build one context per case to stay isolated.

use crate::frame::FrameQueue;
use crate::inflight::InFlightSet;
use crate::overlay::PreviewOverlay;
use crate::store::SectionStore;
use sitekit_core::PreviewConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared collaborators of every section handle opened from one resolver.
#[derive(Clone)]
pub struct ContentContext {
    store: Arc<dyn SectionStore>,
    overlay: Option<PreviewOverlay>,
    inflight: InFlightSet,
    frames: FrameQueue,
}

impl ContentContext {
    /// Context without a preview overlay (public, non-editing rendering).
    #[must_use]
    pub fn new(store: Arc<dyn SectionStore>) -> Self {
        Self {
            store,
            overlay: None,
            inflight: InFlightSet::new(),
            frames: FrameQueue::new(),
        }
    }

    /// Context with a fresh overlay when preview is enabled.
    #[must_use]
    pub fn from_config(store: Arc<dyn SectionStore>, config: &PreviewConfig) -> Self {
        let ctx = Self::new(store);
        if config.enabled {
            ctx.with_overlay(PreviewOverlay::new())
        } else {
            ctx
        }
    }

    /// Attach a preview overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: PreviewOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Detach the preview overlay.
    #[must_use]
    pub fn without_overlay(mut self) -> Self {
        self.overlay = None;
        self
    }

    /// Use an existing frame queue (shared with the host's render loop).
    #[must_use]
    pub fn with_frames(mut self, frames: FrameQueue) -> Self {
        self.frames = frames;
        self
    }

    /// Section store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SectionStore> {
        &self.store
    }

    /// Preview overlay, if editing.
    #[must_use]
    pub fn overlay(&self) -> Option<&PreviewOverlay> {
        self.overlay.as_ref()
    }

    /// In-flight fetch set.
    #[must_use]
    pub fn inflight(&self) -> &InFlightSet {
        &self.inflight
    }

    /// Frame queue used for deferred overlay writes.
    #[must_use]
    pub fn frames(&self) -> &FrameQueue {
        &self.frames
    }

    /// Flush the frame queue every `frame_interval_ms` until `cancel` fires.
    pub fn spawn_frame_driver(&self, config: &PreviewConfig, cancel: CancellationToken) -> JoinHandle<()> {
        self.frames
            .spawn_driver(Duration::from_millis(config.frame_interval_ms), cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySectionStore;

    #[test]
    fn test_from_config() {
        let store: Arc<dyn SectionStore> = Arc::new(MemorySectionStore::new());

        let editing = ContentContext::from_config(Arc::clone(&store), &PreviewConfig::default());
        assert!(editing.overlay().is_some());

        let public = ContentContext::from_config(
            store,
            &PreviewConfig {
                enabled: false,
                ..PreviewConfig::default()
            },
        );
        assert!(public.overlay().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_driver_flushes_deferred_writes() {
        let ctx = ContentContext::from_config(
            Arc::new(MemorySectionStore::new()),
            &PreviewConfig::default(),
        );
        let cancel = CancellationToken::new();
        let driver = ctx.spawn_frame_driver(&PreviewConfig::default(), cancel.clone());

        let id = sitekit_core::SectionId::new("hero-1").expect("valid id");
        let overlay = ctx.overlay().cloned().expect("overlay");
        let content = sitekit_core::content::as_object(serde_json::json!({"title": "x"}))
            .expect("object");
        {
            let overlay = overlay.clone();
            let id = id.clone();
            ctx.frames().defer(move || {
                overlay.set(&id, content);
            });
        }

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(overlay.contains(&id));

        cancel.cancel();
        driver.await.expect("driver exits");
    }
}
