//! Section content resolver.
//!
//! [`SectionResolver::open`] returns a [`SectionHandle`] that owns one
//! section's persisted baseline, loading flag and last error. The baseline is
//! fetched once per handle by a background task tied to the handle's
//! lifetime; closing or dropping the handle cancels it and turns every later
//! state update into a no-op.
//!
//! Content is resolved on every read:
//!
//! ```text
//! baseline = default <- fence(fetched)   (set by the fetch task, save, or a commit)
//! content  = baseline <- fence(override) (override read live from the overlay)
//! ```
//!
//! With an overlay attached, each handle also follows the overlay's commits
//! for its id, so content saved elsewhere (for example by a preview session)
//! becomes the handle's baseline.

use crate::context::ContentContext;
use crate::error::{ContentError, Result};
use crate::inflight::InFlightGuard;
use crate::store;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sitekit_core::content::{self, Content};
use sitekit_core::SectionId;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-handle state owned by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverState {
    /// Last content confirmed by the store (or the defaults)
    pub baseline: Content,
    /// Whether the initial fetch is outstanding
    pub loading: bool,
    /// Last read or write failure
    pub error: Option<String>,
}

/// What a renderer needs for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionSnapshot {
    /// Resolved content
    pub content: Content,
    /// Whether the initial fetch is outstanding
    pub loading: bool,
    /// Last read or write failure
    pub error: Option<String>,
}

/// Opens section handles against a shared [`ContentContext`].
#[derive(Clone)]
pub struct SectionResolver {
    ctx: ContentContext,
}

impl SectionResolver {
    /// Create a resolver over `ctx`.
    #[must_use]
    pub fn new(ctx: ContentContext) -> Self {
        Self { ctx }
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &ContentContext {
        &self.ctx
    }

    /// Open a handle for `section_id` and start fetching its baseline.
    ///
    /// If another handle is already fetching the same id, no request is made
    /// and this handle renders the defaults with `loading == false`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn open(&self, section_id: SectionId, default_content: Content) -> SectionHandle {
        let guard = self.ctx.inflight().try_acquire(&section_id);
        let (state, state_rx) = watch::channel(ResolverState {
            baseline: default_content.clone(),
            loading: guard.is_some(),
            error: None,
        });

        let inner = Arc::new(HandleInner {
            id: section_id,
            defaults: default_content,
            ctx: self.ctx.clone(),
            state,
            cancel: CancellationToken::new(),
        });

        match guard {
            Some(guard) => {
                debug!(section_id = %inner.id, "fetching section content");
                tokio::spawn(fetch_baseline(Arc::clone(&inner), guard));
            }
            None => {
                debug!(section_id = %inner.id, "fetch already in flight, rendering defaults");
            }
        }
        if let Some(overlay) = self.ctx.overlay() {
            let commits = overlay.subscribe_commits(&inner.id);
            tokio::spawn(follow_commits(Arc::clone(&inner), commits));
        }

        let overlay_rx = self.ctx.overlay().map(|o| o.subscribe(&inner.id));
        let mut handle = SectionHandle {
            inner,
            state_rx,
            overlay_rx,
            last_override: None,
        };
        handle.last_override = handle.fenced_override();
        handle
    }

    /// Open a handle whose defaults come from a typed value.
    ///
    /// # Errors
    /// Returns error if `default_content` does not serialize to a JSON object.
    pub fn open_typed<T: Serialize>(
        &self,
        section_id: SectionId,
        default_content: &T,
    ) -> Result<SectionHandle> {
        let defaults = content::as_object(serde_json::to_value(default_content)?)?;
        Ok(self.open(section_id, defaults))
    }
}

struct HandleInner {
    id: SectionId,
    defaults: Content,
    ctx: ContentContext,
    state: watch::Sender<ResolverState>,
    cancel: CancellationToken,
}

/// One rendered section's view of its content.
///
/// Dropping the handle closes it.
pub struct SectionHandle {
    inner: Arc<HandleInner>,
    state_rx: watch::Receiver<ResolverState>,
    overlay_rx: Option<watch::Receiver<Option<Content>>>,
    last_override: Option<Content>,
}

enum Wake {
    State(std::result::Result<(), watch::error::RecvError>),
    Overlay(std::result::Result<(), watch::error::RecvError>),
    Closed,
}

impl SectionHandle {
    /// Section id.
    #[must_use]
    pub fn id(&self) -> &SectionId {
        &self.inner.id
    }

    /// Default content this handle was opened with.
    #[must_use]
    pub fn default_content(&self) -> &Content {
        &self.inner.defaults
    }

    /// Resolved content: baseline with the fenced preview override on top.
    #[must_use]
    pub fn content(&self) -> Content {
        let state = self.inner.state.borrow();
        match self.fenced_override() {
            Some(over) => content::merge(&state.baseline, &over),
            None => state.baseline.clone(),
        }
    }

    /// Resolved content decoded into a typed value.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(serde_json::Value::Object(
            self.content(),
        ))?)
    }

    /// Whether the initial fetch is outstanding.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Last read or write failure.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }

    /// Persisted baseline without any preview override.
    #[must_use]
    pub fn baseline(&self) -> Content {
        self.inner.state.borrow().baseline.clone()
    }

    /// Content, loading flag and error in one read.
    #[must_use]
    pub fn snapshot(&self) -> SectionSnapshot {
        let (loading, error) = {
            let state = self.inner.state.borrow();
            (state.loading, state.error.clone())
        };
        SectionSnapshot {
            content: self.content(),
            loading,
            error,
        }
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait until something a renderer would show has changed: the baseline,
    /// loading flag or error, or the effective (fenced) preview override.
    ///
    /// # Errors
    /// Returns [`ContentError::Closed`] once the handle is closed.
    pub async fn changed(&mut self) -> Result<()> {
        loop {
            if self.is_closed() {
                return Err(ContentError::Closed);
            }

            let wake = tokio::select! {
                res = self.state_rx.changed() => Wake::State(res),
                res = overlay_changed(&mut self.overlay_rx) => Wake::Overlay(res),
                () = self.inner.cancel.cancelled() => Wake::Closed,
            };

            match wake {
                Wake::State(res) => {
                    res.map_err(|_| ContentError::Closed)?;
                    self.state_rx.borrow_and_update();
                    return Ok(());
                }
                Wake::Overlay(res) => {
                    res.map_err(|_| ContentError::Closed)?;
                    if let Some(rx) = self.overlay_rx.as_mut() {
                        rx.borrow_and_update();
                    }
                    let current = self.fenced_override();
                    if current != self.last_override {
                        self.last_override = current;
                        return Ok(());
                    }
                }
                Wake::Closed => return Err(ContentError::Closed),
            }
        }
    }

    /// Wait for the initial fetch to settle.
    ///
    /// # Errors
    /// Returns [`ContentError::Closed`] if the handle is closed first.
    pub async fn wait_loaded(&mut self) -> Result<SectionSnapshot> {
        let cancel = self.inner.cancel.clone();
        tokio::select! {
            res = self.state_rx.wait_for(|s| !s.loading) => {
                res.map_err(|_| ContentError::Closed)?;
            }
            () = cancel.cancelled() => return Err(ContentError::Closed),
        }
        Ok(self.snapshot())
    }

    /// Show `partial` on top of the current content without persisting it.
    ///
    /// The merged content is written into the preview overlay on the next
    /// frame. Without an overlay this is a no-op.
    pub fn preview(&self, partial: &Content) {
        let Some(overlay) = self.inner.ctx.overlay().cloned() else {
            debug!(section_id = %self.inner.id, "no preview overlay attached, ignoring preview");
            return;
        };

        let merged = content::merge(&self.content(), partial);
        let id = self.inner.id.clone();
        let cancel = self.inner.cancel.clone();
        self.inner.ctx.frames().defer(move || {
            if !cancel.is_cancelled() {
                overlay.set(&id, merged);
            }
        });
    }

    /// Persist `partial` merged over the current content.
    ///
    /// Updates the section, creating it if the store has no row yet. On
    /// success the merged content becomes the new baseline; on failure the
    /// baseline is untouched, `error` is set and the error is returned.
    pub async fn save(&self, partial: &Content) -> Result<()> {
        if self.is_closed() {
            return Err(ContentError::Closed);
        }

        let merged = content::merge(&self.content(), partial);
        let id = &self.inner.id;

        match store::upsert(self.inner.ctx.store().as_ref(), id, &merged).await {
            Ok(kind) => {
                info!(section_id = %id, ?kind, "section content saved");
                if !self.is_closed() {
                    self.inner.state.send_modify(|state| {
                        state.baseline = merged.clone();
                        state.error = None;
                    });
                    settle_override(&self.inner, merged);
                }
                Ok(())
            }
            Err(err) => {
                warn!(section_id = %id, "failed to save section content: {err}");
                if !self.is_closed() {
                    let message = err.to_string();
                    self.inner
                        .state
                        .send_modify(|state| state.error = Some(message));
                }
                Err(err)
            }
        }
    }

    /// Alias of [`save`](Self::save).
    pub async fn update(&self, partial: &Content) -> Result<()> {
        self.save(partial).await
    }

    /// Stop the pending fetch and ignore any later result.
    pub fn close(&self) {
        if !self.inner.cancel.is_cancelled() {
            debug!(section_id = %self.inner.id, "closing section handle");
            self.inner.cancel.cancel();
        }
    }

    fn fenced_override(&self) -> Option<Content> {
        let pending = self.inner.ctx.overlay()?.get(&self.inner.id)?;
        Some(content::fence(&pending, &self.inner.defaults))
    }
}

impl Drop for SectionHandle {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

async fn overlay_changed(
    rx: &mut Option<watch::Receiver<Option<Content>>>,
) -> std::result::Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

/// Once saved, an override equal to the baseline is dropped on the next frame.
fn settle_override(inner: &HandleInner, baseline: Content) {
    let Some(overlay) = inner.ctx.overlay().cloned() else {
        return;
    };
    let id = inner.id.clone();
    let defaults = inner.defaults.clone();
    inner.ctx.frames().defer(move || {
        if let Some(pending) = overlay.get(&id) {
            if content::merge(&baseline, &content::fence(&pending, &defaults)) == baseline {
                overlay.remove_if_eq(&id, &pending);
            }
        }
    });
}

/// Move the baseline to every content committed for the handle's id.
async fn follow_commits(inner: Arc<HandleInner>, mut commits: watch::Receiver<Option<Content>>) {
    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => return,
            res = commits.changed() => {
                if res.is_err() {
                    return;
                }
            }
        }

        let Some(committed) = commits.borrow_and_update().clone() else {
            continue;
        };
        if inner.cancel.is_cancelled() {
            return;
        }

        let baseline = content::merge(&inner.defaults, &content::fence(&committed, &inner.defaults));
        debug!(section_id = %inner.id, "committed content became the baseline");
        inner.state.send_modify(|state| {
            state.baseline = baseline.clone();
            state.error = None;
        });
        settle_override(&inner, baseline);
    }
}

async fn fetch_baseline(inner: Arc<HandleInner>, guard: InFlightGuard) {
    let id = &inner.id;
    let store = Arc::clone(inner.ctx.store());
    let committed_before = inner.ctx.overlay().and_then(|o| o.committed(id));

    let result = tokio::select! {
        () = inner.cancel.cancelled() => {
            debug!(section_id = %id, "handle closed before fetch completed");
            return;
        }
        result = store.fetch(id) => result,
    };

    if inner.cancel.is_cancelled() {
        return;
    }

    // A commit that landed while fetching is newer than the fetched record.
    let committed = inner.ctx.overlay().and_then(|o| o.committed(id));
    if committed.is_some() && committed != committed_before {
        debug!(section_id = %id, "content committed during fetch, keeping it");
        inner.state.send_modify(|state| state.loading = false);
        drop(guard);
        return;
    }

    let (baseline, error) = match result {
        Ok(Some(record)) => {
            let fetched = content::fence(&record.content, &inner.defaults);
            (content::merge(&inner.defaults, &fetched), None)
        }
        Ok(None) => {
            debug!(section_id = %id, "section not stored yet, using defaults");
            (inner.defaults.clone(), None)
        }
        Err(err) => {
            warn!(section_id = %id, "error fetching section content: {err}");
            (inner.defaults.clone(), Some(err.to_string()))
        }
    };

    inner.state.send_modify(|state| {
        state.baseline = baseline;
        state.loading = false;
        state.error = error;
    });
    drop(guard);
}
