//! Typed component registry and page rendering.
//!
//! Page section lists reference renderers by a string discriminator. The
//! registry maps the closed [`ComponentType`] set to renderer instances,
//! validating them when they are registered, and dispatch never fails: an
//! unknown or missing type yields a placeholder variant instead.

use crate::error::{ContentError, Result};
use crate::resolver::{SectionHandle, SectionResolver, SectionSnapshot};
use futures::future::join_all;
use sitekit_core::content::{self, Content};
use sitekit_core::markup::escape_html;
use sitekit_core::{ComponentType, Section, SectionBackground, SectionId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A presentational section renderer.
pub trait SectionRenderer: Send + Sync {
    /// The discriminator this renderer answers to.
    fn component_type(&self) -> ComponentType;

    /// Complete default content; its top-level keys define the schema.
    fn default_content(&self) -> serde_json::Value;

    /// Render one section from its resolved snapshot.
    fn render(&self, section: &Section, snapshot: &SectionSnapshot) -> String;
}

struct Registered {
    renderer: Arc<dyn SectionRenderer>,
    defaults: Content,
}

/// Closed map from component type to renderer.
#[derive(Default)]
pub struct ComponentRegistry {
    components: BTreeMap<ComponentType, Registered>,
}

/// Outcome of looking up a raw component type string.
pub enum Dispatch {
    /// A registered renderer
    Found {
        /// Parsed component type
        kind: ComponentType,
        /// Renderer
        renderer: Arc<dyn SectionRenderer>,
        /// Validated default content
        defaults: Content,
    },
    /// The string names no registered renderer
    NotFound {
        /// Requested discriminator
        requested: String,
        /// Registered types
        available: Vec<ComponentType>,
    },
    /// The section has no component type at all
    MissingType,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `renderer` under `kind`.
    ///
    /// # Errors
    /// Returns [`ContentError::Registration`] if `kind` is already taken, the
    /// renderer reports a different type, or its default content is not a
    /// JSON object.
    pub fn register(&mut self, kind: ComponentType, renderer: Arc<dyn SectionRenderer>) -> Result<()> {
        if renderer.component_type() != kind {
            return Err(ContentError::Registration(format!(
                "renderer for {} registered under {kind}",
                renderer.component_type()
            )));
        }
        if self.components.contains_key(&kind) {
            return Err(ContentError::Registration(format!(
                "{kind} is already registered"
            )));
        }
        let defaults = content::as_object(renderer.default_content()).map_err(|e| {
            ContentError::Registration(format!("default content of {kind}: {e}"))
        })?;

        debug!(component = %kind, keys = defaults.len(), "registered section renderer");
        self.components.insert(kind, Registered { renderer, defaults });
        Ok(())
    }

    /// Renderer for `kind`.
    #[must_use]
    pub fn get(&self, kind: ComponentType) -> Option<Arc<dyn SectionRenderer>> {
        self.components.get(&kind).map(|r| Arc::clone(&r.renderer))
    }

    /// Default content for `kind`.
    #[must_use]
    pub fn default_content(&self, kind: ComponentType) -> Option<Content> {
        self.components.get(&kind).map(|r| r.defaults.clone())
    }

    /// Registered types in order.
    #[must_use]
    pub fn available(&self) -> Vec<ComponentType> {
        self.components.keys().copied().collect()
    }

    /// Whether `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: ComponentType) -> bool {
        self.components.contains_key(&kind)
    }

    /// Number of registered renderers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Look up a raw discriminator from a page section list.
    #[must_use]
    pub fn dispatch(&self, raw: &str) -> Dispatch {
        if raw.trim().is_empty() {
            return Dispatch::MissingType;
        }

        let registered = raw
            .parse::<ComponentType>()
            .ok()
            .and_then(|kind| self.components.get(&kind).map(|r| (kind, r)));

        match registered {
            Some((kind, r)) => Dispatch::Found {
                kind,
                renderer: Arc::clone(&r.renderer),
                defaults: r.defaults.clone(),
            },
            None => {
                warn!(component = raw, "component type not registered");
                Dispatch::NotFound {
                    requested: raw.to_string(),
                    available: self.available(),
                }
            }
        }
    }
}

/// Rendered (or placeholder) output for one section.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    /// Output of a registered renderer
    Rendered {
        /// Renderer output
        html: String,
        /// Whether the section was still loading
        loading: bool,
        /// Last read or write failure
        error: Option<String>,
    },
    /// No renderer for the requested type
    NotFound {
        /// Requested discriminator
        requested: String,
        /// Registered types
        available: Vec<ComponentType>,
    },
    /// The section had no component type
    MissingType,
}

impl RenderOutput {
    /// Markup for this output, including placeholders.
    #[must_use]
    pub fn html(&self, section_id: &SectionId) -> String {
        match self {
            Self::Rendered { html, .. } => html.clone(),
            Self::NotFound {
                requested,
                available,
            } => {
                let available = available
                    .iter()
                    .map(|kind| kind.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let requested = escape_html(requested);
                let section_id = escape_html(section_id.as_str());
                format!(
                    "<div class=\"section-placeholder\"><h2>Component Not Found</h2>\
                     <p>Could not load component \"{requested}\"</p>\
                     <p>Section ID: {section_id}</p><p>Available: {available}</p></div>"
                )
            }
            Self::MissingType => {
                let section_id = escape_html(section_id.as_str());
                format!(
                    "<div class=\"section-placeholder\"><h2>Missing Component Type</h2>\
                     <p>Section \"{section_id}\" has no component_type defined</p></div>"
                )
            }
        }
    }
}

/// One rendered entry of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSection {
    /// Section id
    pub id: SectionId,
    /// Raw discriminator
    pub component_type: String,
    /// Background metadata, passed through for the section wrapper
    pub background: Option<SectionBackground>,
    /// First visible section
    pub is_first: bool,
    /// Last visible section
    pub is_last: bool,
    /// Output
    pub output: RenderOutput,
}

enum Slot {
    Live {
        renderer: Arc<dyn SectionRenderer>,
        handle: SectionHandle,
    },
    Placeholder(RenderOutput),
}

struct PageEntry {
    section: Section,
    slot: Slot,
}

/// Opens one handle per visible section of a page.
#[derive(Clone)]
pub struct PageRenderer {
    registry: Arc<ComponentRegistry>,
    resolver: SectionResolver,
}

impl PageRenderer {
    /// Create a page renderer.
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, resolver: SectionResolver) -> Self {
        Self { registry, resolver }
    }

    /// Registry used for dispatch.
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Open every visible section. Hidden sections are skipped entirely.
    #[must_use]
    pub fn open(&self, sections: &[Section]) -> PageView {
        let entries = sections
            .iter()
            .filter(|section| section.visible)
            .map(|section| {
                let slot = match self.registry.dispatch(&section.component_type) {
                    Dispatch::Found {
                        renderer, defaults, ..
                    } => Slot::Live {
                        renderer,
                        handle: self.resolver.open(section.id.clone(), defaults),
                    },
                    Dispatch::NotFound {
                        requested,
                        available,
                    } => Slot::Placeholder(RenderOutput::NotFound {
                        requested,
                        available,
                    }),
                    Dispatch::MissingType => Slot::Placeholder(RenderOutput::MissingType),
                };
                PageEntry {
                    section: section.clone(),
                    slot,
                }
            })
            .collect();

        PageView { entries }
    }
}

/// The open sections of one page.
///
/// Dropping the view closes every handle.
pub struct PageView {
    entries: Vec<PageEntry>,
}

impl PageView {
    /// Number of visible sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the page has no visible section.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle of a rendered section.
    #[must_use]
    pub fn handle(&self, id: &SectionId) -> Option<&SectionHandle> {
        self.entries.iter().find_map(|entry| match &entry.slot {
            Slot::Live { handle, .. } if &entry.section.id == id => Some(handle),
            _ => None,
        })
    }

    /// Mutable handle of a rendered section, for waiting on changes.
    pub fn handle_mut(&mut self, id: &SectionId) -> Option<&mut SectionHandle> {
        self.entries.iter_mut().find_map(|entry| match &mut entry.slot {
            Slot::Live { handle, .. } if &entry.section.id == id => Some(handle),
            _ => None,
        })
    }

    /// Wait until every section's initial fetch has settled.
    pub async fn wait_loaded(&mut self) {
        let pending = self.entries.iter_mut().filter_map(|entry| match &mut entry.slot {
            Slot::Live { handle, .. } => Some(handle.wait_loaded()),
            Slot::Placeholder(_) => None,
        });
        for result in join_all(pending).await {
            if let Err(err) = result {
                debug!("section closed while loading page: {err}");
            }
        }
    }

    /// Render every section in page order.
    #[must_use]
    pub fn render(&self) -> Vec<RenderedSection> {
        let last = self.entries.len().saturating_sub(1);
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let output = match &entry.slot {
                    Slot::Live { renderer, handle } => {
                        let snapshot = handle.snapshot();
                        RenderOutput::Rendered {
                            html: renderer.render(&entry.section, &snapshot),
                            loading: snapshot.loading,
                            error: snapshot.error,
                        }
                    }
                    Slot::Placeholder(output) => output.clone(),
                };
                RenderedSection {
                    id: entry.section.id.clone(),
                    component_type: entry.section.component_type.clone(),
                    background: entry.section.background.clone(),
                    is_first: index == 0,
                    is_last: index == last,
                    output,
                }
            })
            .collect()
    }

    /// Close every handle.
    pub fn close(self) {
        for entry in &self.entries {
            if let Slot::Live { handle, .. } = &entry.slot {
                handle.close();
            }
        }
    }
}
