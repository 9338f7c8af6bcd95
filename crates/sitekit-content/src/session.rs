//! Editor-side preview session.
//!
//! A [`PreviewSession`] tracks the saved and previewed state of one page's
//! section list and the site settings, plus the preview overlay every open
//! [`SectionHandle`](crate::SectionHandle) reads from. Nothing reaches the
//! backend until [`PreviewSession::save_changes`].

use crate::error::{ContentError, Result};
use crate::overlay::PreviewOverlay;
use crate::pages::CmsApi;
use crate::registry::ComponentRegistry;
use crate::store::{self, SectionStore, WriteOutcome};
use sitekit_core::content::{self, Content};
use sitekit_core::{PageData, PageId, Section, SectionId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// What [`PreviewSession::save_changes`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Site settings were patched
    pub settings_saved: bool,
    /// Sections whose preview content was persisted
    pub contents_saved: usize,
    /// Sections created because they were added to the page
    pub sections_created: usize,
    /// Sections deleted because they were removed from the page
    pub sections_deleted: usize,
    /// The page's section list was patched
    pub page_saved: bool,
}

impl SaveSummary {
    /// Whether nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Default)]
struct SessionState {
    page: Option<PageId>,
    saved_sections: Option<Vec<Section>>,
    preview_sections: Option<Vec<Section>>,
    saved_settings: Option<Content>,
    preview_settings: Option<Content>,
    sections_loading: bool,
}

impl SessionState {
    fn settings_dirty(&self) -> bool {
        matches!(
            (&self.saved_settings, &self.preview_settings),
            (Some(saved), Some(preview)) if saved != preview
        )
    }

    fn sections_dirty(&self) -> bool {
        matches!(
            (&self.saved_sections, &self.preview_sections),
            (Some(saved), Some(preview)) if saved != preview
        )
    }
}

/// Saved versus previewed page and settings state for one editor.
pub struct PreviewSession {
    api: Arc<dyn CmsApi>,
    store: Arc<dyn SectionStore>,
    registry: Option<Arc<ComponentRegistry>>,
    overlay: PreviewOverlay,
    state: Mutex<SessionState>,
    saving: AtomicBool,
}

struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PreviewSession {
    /// Create a session with a fresh overlay.
    #[must_use]
    pub fn new(api: Arc<dyn CmsApi>, store: Arc<dyn SectionStore>) -> Self {
        Self {
            api,
            store,
            registry: None,
            overlay: PreviewOverlay::new(),
            state: Mutex::new(SessionState::default()),
            saving: AtomicBool::new(false),
        }
    }

    /// Use `registry` for the default content of newly added sections.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Share an existing overlay instead of the session's own.
    #[must_use]
    pub fn with_overlay(mut self, overlay: PreviewOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    /// The overlay to attach to a [`ContentContext`](crate::ContentContext).
    #[must_use]
    pub fn overlay(&self) -> &PreviewOverlay {
        &self.overlay
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("acquire session lock")
    }

    /// Load a page's section list as both saved and previewed state.
    pub async fn load_page(&self, page_id: PageId) -> Result<PageData> {
        self.state().sections_loading = true;
        let result = self.api.fetch_page(page_id).await;

        let mut state = self.state();
        state.sections_loading = false;
        match result {
            Ok(page) => {
                debug!(page_id = %page_id, sections = page.sections.len(), "page loaded");
                state.page = Some(page.id);
                state.saved_sections = Some(page.sections.clone());
                state.preview_sections = Some(page.sections.clone());
                Ok(page)
            }
            Err(err) => {
                warn!(page_id = %page_id, "failed to load page sections: {err}");
                Err(err)
            }
        }
    }

    /// Load site settings. Settings already being previewed are kept.
    pub async fn load_settings(&self) -> Result<Content> {
        let settings = self.api.fetch_settings().await?;
        let mut state = self.state();
        state.saved_settings = Some(settings.clone());
        if state.preview_settings.is_none() {
            state.preview_settings = Some(settings.clone());
        }
        Ok(settings)
    }

    /// Replace the previewed section list.
    ///
    /// # Errors
    /// Returns [`ContentError::NoPageLoaded`] before [`load_page`](Self::load_page).
    pub fn update_sections(&self, sections: Vec<Section>) -> Result<()> {
        let mut state = self.state();
        if state.page.is_none() {
            return Err(ContentError::NoPageLoaded);
        }
        state.preview_sections = Some(sections);
        Ok(())
    }

    /// Merge `partial` into the previewed settings. Returns `false` if no
    /// settings have been loaded yet.
    pub fn update_settings(&self, partial: &Content) -> bool {
        let mut state = self.state();
        match state.preview_settings.as_mut() {
            Some(preview) => {
                content::merge_into(preview, partial);
                true
            }
            None => {
                debug!("settings not loaded, ignoring preview update");
                false
            }
        }
    }

    /// Put preview content for one section into the overlay.
    pub fn update_section_content(&self, section_id: &SectionId, content: Content) {
        self.overlay.set(section_id, content);
    }

    /// Preview content for one section, if any.
    #[must_use]
    pub fn section_content(&self, section_id: &SectionId) -> Option<Content> {
        self.overlay.get(section_id)
    }

    /// Whether sections, settings or section content differ from what was saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let state = self.state();
        state.settings_dirty() || state.sections_dirty() || self.overlay.has_unsaved()
    }

    /// Whether a page load is outstanding.
    #[must_use]
    pub fn is_sections_loading(&self) -> bool {
        self.state().sections_loading
    }

    /// Whether [`save_changes`](Self::save_changes) is running.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::SeqCst)
    }

    /// Previewed section list, falling back to the saved one.
    #[must_use]
    pub fn current_sections(&self) -> Option<Vec<Section>> {
        let state = self.state();
        state
            .preview_sections
            .clone()
            .or_else(|| state.saved_sections.clone())
    }

    /// Previewed settings, falling back to the saved ones.
    #[must_use]
    pub fn current_settings(&self) -> Option<Content> {
        let state = self.state();
        state
            .preview_settings
            .clone()
            .or_else(|| state.saved_settings.clone())
    }

    /// Last saved section list.
    #[must_use]
    pub fn saved_sections(&self) -> Option<Vec<Section>> {
        self.state().saved_sections.clone()
    }

    /// Last saved settings.
    #[must_use]
    pub fn saved_settings(&self) -> Option<Content> {
        self.state().saved_settings.clone()
    }

    /// Persist everything that changed.
    ///
    /// Order: settings, pending section content, created sections, deleted
    /// sections, then the page's section list. Any failure except a delete
    /// stops the save and is returned; steps already written stay written.
    ///
    /// Saved section content is committed to the overlay, so open handles
    /// take it as their baseline.
    pub async fn save_changes(&self) -> Result<SaveSummary> {
        if !self.is_dirty() {
            return Ok(SaveSummary::default());
        }
        if self
            .saving
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ContentError::Internal("save already in progress".to_string()));
        }
        let _saving = SavingGuard(&self.saving);

        let mut summary = SaveSummary::default();

        let settings = {
            let state = self.state();
            if state.settings_dirty() {
                state.preview_settings.clone()
            } else {
                None
            }
        };
        if let Some(settings) = settings {
            let stored = self.api.update_settings(&settings).await?;
            let mut state = self.state();
            state.saved_settings = Some(stored.clone());
            state.preview_settings = Some(stored);
            summary.settings_saved = true;
            info!("site settings saved");
        }

        let (page, saved, preview) = {
            let state = self.state();
            let changed = state.sections_dirty();
            (
                state.page,
                state.saved_sections.clone().unwrap_or_default(),
                state.preview_sections.clone().filter(|_| changed),
            )
        };
        let saved_ids: HashSet<&SectionId> = saved.iter().map(|s| &s.id).collect();
        let added: Vec<&Section> = preview
            .iter()
            .flatten()
            .filter(|s| !saved_ids.contains(&s.id))
            .collect();
        let added_ids: HashSet<&SectionId> = added.iter().map(|s| &s.id).collect();

        // Content of sections about to be created goes out with the create.
        // Edits made while saving stay unsaved for the next save.
        let pending = self.overlay.unsaved_entries();
        for (id, content) in pending.iter().filter(|(id, _)| !added_ids.contains(id)) {
            store::upsert(self.store.as_ref(), id, content).await?;
            self.overlay.commit(id, content);
            summary.contents_saved += 1;
        }

        let Some(preview) = preview.as_ref() else {
            return Ok(summary);
        };
        let page = page.ok_or(ContentError::NoPageLoaded)?;

        for section in &added {
            let content = match pending.iter().find(|(id, _)| *id == section.id) {
                Some((_, content)) => content.clone(),
                None => self.default_content_for(section),
            };
            self.store.create(&section.id, &content).await?;
            self.overlay.commit(&section.id, &content);
            summary.sections_created += 1;
            debug!(section_id = %section.id, "created section");
        }

        let kept: HashSet<&SectionId> = preview.iter().map(|s| &s.id).collect();
        for removed in saved.iter().filter(|s| !kept.contains(&s.id)) {
            match self.store.delete(&removed.id).await {
                Ok(WriteOutcome::Written) => summary.sections_deleted += 1,
                Ok(WriteOutcome::Missing) => {
                    debug!(section_id = %removed.id, "removed section had no content row");
                }
                Err(err) => warn!(section_id = %removed.id, "failed to delete section: {err}"),
            }
        }

        self.api.update_page_sections(page, preview).await?;
        summary.page_saved = true;
        self.state().saved_sections = Some(preview.clone());
        info!(page_id = %page, ?summary, "page saved");

        Ok(summary)
    }

    /// Drop previewed sections and settings in favour of the saved ones.
    pub fn reset_to_saved(&self) {
        let mut state = self.state();
        if let Some(saved) = state.saved_settings.clone() {
            state.preview_settings = Some(saved);
        }
        if let Some(saved) = state.saved_sections.clone() {
            state.preview_sections = Some(saved);
        }
    }

    /// Leave the editor: discard all pending section content.
    pub fn end(&self) {
        debug!(pending = self.overlay.len(), "ending preview session");
        self.overlay.clear();
    }

    fn default_content_for(&self, section: &Section) -> Content {
        let defaults = self
            .registry
            .as_ref()
            .zip(section.kind())
            .and_then(|(registry, kind)| registry.default_content(kind));
        if defaults.is_none() {
            warn!(
                section_id = %section.id,
                component = %section.component_type,
                "no default content for new section"
            );
        }
        defaults.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemorySectionStore, StoreMethod};
    use async_trait::async_trait;
    use serde_json::json;
    use sitekit_core::ComponentType;

    #[derive(Default)]
    struct FakeCms {
        page: Mutex<Option<PageData>>,
        settings: Mutex<Content>,
        page_writes: Mutex<Vec<Vec<Section>>>,
    }

    #[async_trait]
    impl CmsApi for FakeCms {
        async fn fetch_page(&self, id: PageId) -> Result<PageData> {
            self.page
                .lock()
                .unwrap()
                .clone()
                .filter(|p| p.id == id)
                .ok_or(ContentError::Api {
                    status: 404,
                    message: "Not found.".to_string(),
                })
        }

        async fn update_page_sections(&self, _id: PageId, sections: &[Section]) -> Result<()> {
            self.page_writes.lock().unwrap().push(sections.to_vec());
            Ok(())
        }

        async fn fetch_settings(&self) -> Result<Content> {
            Ok(self.settings.lock().unwrap().clone())
        }

        async fn update_settings(&self, settings: &Content) -> Result<Content> {
            *self.settings.lock().unwrap() = settings.clone();
            Ok(settings.clone())
        }
    }

    fn obj(value: serde_json::Value) -> Content {
        content::as_object(value).unwrap()
    }

    fn section(id: &str, kind: ComponentType) -> Section {
        Section::new(SectionId::new(id).unwrap(), kind)
    }

    fn session_with_page(sections: Vec<Section>) -> (PreviewSession, Arc<FakeCms>, MemorySectionStore) {
        let cms = Arc::new(FakeCms::default());
        *cms.page.lock().unwrap() = Some(PageData {
            id: PageId(1),
            title: "Home".to_string(),
            slug: "home".to_string(),
            sections,
            meta_title: String::new(),
            meta_description: String::new(),
            is_published: true,
        });
        *cms.settings.lock().unwrap() = obj(json!({"site_name": "Acme"}));
        let store = MemorySectionStore::new();
        let session = PreviewSession::new(cms.clone(), Arc::new(store.clone()));
        (session, cms, store)
    }

    #[tokio::test]
    async fn test_clean_session_saves_nothing() {
        let (session, cms, store) = session_with_page(vec![section("hero-1", ComponentType::Hero1)]);
        session.load_page(PageId(1)).await.unwrap();
        session.load_settings().await.unwrap();

        assert!(!session.is_dirty());
        assert!(session.save_changes().await.unwrap().is_empty());
        assert!(store.requests().is_empty());
        assert!(cms.page_writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_preview_and_reset() {
        let (session, _cms, _store) = session_with_page(Vec::new());
        assert!(!session.update_settings(&obj(json!({"site_name": "X"}))));

        session.load_settings().await.unwrap();
        assert!(session.update_settings(&obj(json!({"site_name": "Beta"}))));
        assert!(session.is_dirty());
        assert_eq!(session.current_settings().unwrap()["site_name"], "Beta");

        session.reset_to_saved();
        assert!(!session.is_dirty());
        assert_eq!(session.current_settings().unwrap()["site_name"], "Acme");
    }

    #[tokio::test]
    async fn test_update_sections_requires_page() {
        let (session, _cms, _store) = session_with_page(Vec::new());
        assert!(matches!(
            session.update_sections(Vec::new()),
            Err(ContentError::NoPageLoaded)
        ));
    }

    #[tokio::test]
    async fn test_save_creates_and_deletes_sections() {
        let kept = section("hero-1", ComponentType::Hero1);
        let removed = section("faq-1", ComponentType::Faq1);
        let (session, cms, store) = session_with_page(vec![kept.clone(), removed.clone()]);
        store.insert(removed.id.clone(), obj(json!({"title": "FAQ"})));

        session.load_page(PageId(1)).await.unwrap();
        let added = section("cta-1", ComponentType::Cta1);
        session.update_sections(vec![kept.clone(), added.clone()]).unwrap();
        session.update_section_content(&added.id, obj(json!({"title": "Buy now"})));
        session.update_section_content(&kept.id, obj(json!({"title": "Edited"})));

        let summary = session.save_changes().await.unwrap();
        assert_eq!(
            summary,
            SaveSummary {
                settings_saved: false,
                contents_saved: 1,
                sections_created: 1,
                sections_deleted: 1,
                page_saved: true,
            }
        );

        assert_eq!(store.content(&added.id).unwrap()["title"], "Buy now");
        assert_eq!(store.content(&kept.id).unwrap()["title"], "Edited");
        assert!(store.content(&removed.id).is_none());
        assert_eq!(store.count(StoreMethod::Post), 2);
        assert!(session.overlay().is_empty());
        assert!(!session.is_dirty());
        assert_eq!(cms.page_writes.lock().unwrap().as_slice(), &[vec![kept, added]]);
    }

    #[tokio::test]
    async fn test_new_section_uses_registry_defaults() {
        use crate::registry::SectionRenderer;
        use crate::resolver::SectionSnapshot;

        struct Cta;
        impl SectionRenderer for Cta {
            fn component_type(&self) -> ComponentType {
                ComponentType::Cta1
            }
            fn default_content(&self) -> serde_json::Value {
                json!({"title": "Default CTA"})
            }
            fn render(&self, _section: &Section, _snapshot: &SectionSnapshot) -> String {
                String::new()
            }
        }

        let mut registry = ComponentRegistry::new();
        registry.register(ComponentType::Cta1, Arc::new(Cta)).unwrap();

        let (session, _cms, store) = session_with_page(Vec::new());
        let session = session.with_registry(Arc::new(registry));
        session.load_page(PageId(1)).await.unwrap();

        let added = section("cta-2", ComponentType::Cta1);
        let unknown = Section {
            component_type: "Mystery".to_string(),
            ..section("mystery-1", ComponentType::Hero1)
        };
        session.update_sections(vec![added.clone(), unknown.clone()]).unwrap();
        session.save_changes().await.unwrap();

        assert_eq!(store.content(&added.id).unwrap()["title"], "Default CTA");
        assert!(store.content(&unknown.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_content_save_keeps_overlay() {
        let (session, cms, store) = session_with_page(vec![section("hero-1", ComponentType::Hero1)]);
        session.load_page(PageId(1)).await.unwrap();
        let id = SectionId::new("hero-1").unwrap();
        session.update_section_content(&id, obj(json!({"title": "Edited"})));
        store.fail_with(StoreMethod::Patch, 500);

        assert!(session.save_changes().await.is_err());
        assert!(session.section_content(&id).is_some());
        assert!(session.is_dirty());
        assert!(!session.is_saving());
        assert!(cms.page_writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_moves_open_handle_baseline() {
        use crate::context::ContentContext;
        use crate::resolver::SectionResolver;
        use std::time::Duration;

        let id = SectionId::new("hero-1").unwrap();
        let (session, _cms, store) = session_with_page(vec![section("hero-1", ComponentType::Hero1)]);
        store.insert(id.clone(), obj(json!({"title": "Old"})));
        session.load_page(PageId(1)).await.unwrap();

        let ctx = ContentContext::new(Arc::new(store.clone())).with_overlay(session.overlay().clone());
        let resolver = SectionResolver::new(ctx.clone());
        let mut handle = resolver.open(id.clone(), obj(json!({"title": "Default"})));
        assert_eq!(handle.wait_loaded().await.unwrap().content["title"], "Old");

        handle.preview(&obj(json!({"title": "Edited"})));
        ctx.frames().flush();
        assert_eq!(handle.content()["title"], "Edited");
        assert!(session.is_dirty());

        let summary = session.save_changes().await.unwrap();
        assert_eq!(summary.contents_saved, 1);
        assert_eq!(store.content(&id).unwrap()["title"], "Edited");
        assert_eq!(handle.content()["title"], "Edited");
        assert!(!session.is_dirty());

        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.baseline()["title"] != "Edited" {
                handle.changed().await.unwrap();
            }
        })
        .await
        .expect("baseline follows the commit");

        ctx.frames().flush();
        assert!(!session.overlay().contains(&id));
        assert_eq!(handle.content()["title"], "Edited");
        assert!(handle.error().is_none());
    }

    /// Writes into the overlay while a PATCH of `a-1` is in flight.
    struct TypingStore {
        inner: MemorySectionStore,
        overlay: PreviewOverlay,
    }

    #[async_trait]
    impl SectionStore for TypingStore {
        async fn fetch(&self, id: &SectionId) -> Result<Option<sitekit_core::SectionRecord>> {
            self.inner.fetch(id).await
        }

        async fn update(&self, id: &SectionId, content: &Content) -> Result<WriteOutcome> {
            if id.as_str() == "a-1" {
                self.overlay
                    .set(&SectionId::new("b-1").unwrap(), obj(json!({"title": "typed"})));
            }
            self.inner.update(id, content).await
        }

        async fn create(&self, id: &SectionId, content: &Content) -> Result<()> {
            self.inner.create(id, content).await
        }

        async fn delete(&self, id: &SectionId) -> Result<WriteOutcome> {
            self.inner.delete(id).await
        }

        async fn list(&self) -> Result<Vec<sitekit_core::SectionRecord>> {
            self.inner.list().await
        }

        fn store_id(&self) -> &str {
            "typing"
        }
    }

    #[tokio::test]
    async fn test_edit_during_save_stays_pending() {
        let (_session, cms, _store) = session_with_page(Vec::new());
        let overlay = PreviewOverlay::new();
        let store = MemorySectionStore::new();
        let typing = TypingStore {
            inner: store.clone(),
            overlay: overlay.clone(),
        };
        let session = PreviewSession::new(cms, Arc::new(typing)).with_overlay(overlay.clone());

        let a = SectionId::new("a-1").unwrap();
        let b = SectionId::new("b-1").unwrap();
        session.update_section_content(&a, obj(json!({"title": "A"})));

        let summary = session.save_changes().await.unwrap();
        assert_eq!(summary.contents_saved, 1);
        assert_eq!(store.content(&a).unwrap()["title"], "A");
        assert_eq!(overlay.get(&b), Some(obj(json!({"title": "typed"}))));
        assert!(store.content(&b).is_none());
        assert!(session.is_dirty());

        let summary = session.save_changes().await.unwrap();
        assert_eq!(summary.contents_saved, 1);
        assert_eq!(store.content(&b).unwrap()["title"], "typed");
        assert!(!session.is_dirty());
    }

    #[tokio::test]
    async fn test_end_clears_overlay() {
        let (session, _cms, _store) = session_with_page(Vec::new());
        let id = SectionId::new("hero-1").unwrap();
        session.update_section_content(&id, obj(json!({"title": "Draft"})));
        assert!(session.is_dirty());

        session.end();
        assert!(session.section_content(&id).is_none());
        assert!(!session.is_dirty());
    }
}
