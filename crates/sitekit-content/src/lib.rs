//! SiteKit Content - section content resolution and live preview.
//!
//! Every rendered section asks a [`SectionResolver`] for its content. The
//! resolver layers three sources, later ones winning:
//!
//! ```text
//! default content  <-  persisted content (store)  <-  preview override (overlay)
//! ```
//!
//! Persisted content is fetched once per open handle, deduplicated per
//! section id through the context's in-flight set. Preview overrides live in
//! a shared, observable [`PreviewOverlay`] written by the editing UI and are
//! schema-fenced against the default content before they are applied.
//!
//! # Example
//!
//! ```rust,no_run
//! use sitekit_content::{ContentContext, HttpSectionStore, PreviewOverlay, SectionResolver};
//! use sitekit_core::{content, SectionId};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpSectionStore::new("http://localhost:8000")?;
//! let ctx = ContentContext::new(Arc::new(store)).with_overlay(PreviewOverlay::new());
//! let resolver = SectionResolver::new(ctx);
//!
//! let defaults = content::as_object(json!({"title": "Welcome", "subtitle": ""}))?;
//! let mut hero = resolver.open(SectionId::new("hero-main")?, defaults);
//! hero.wait_loaded().await?;
//!
//! hero.save(&content::as_object(json!({"title": "Hello"}))?).await?;
//! assert_eq!(hero.content()["title"], "Hello");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod context;
pub mod error;
pub mod frame;
pub mod http;
pub mod inflight;
pub mod memory;
pub mod overlay;
pub mod pages;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use context::ContentContext;
pub use error::{ContentError, Result};
pub use frame::FrameQueue;
pub use http::HttpSectionStore;
pub use inflight::{InFlightGuard, InFlightSet};
pub use memory::{MemorySectionStore, StoreMethod, StoreRequest};
pub use overlay::PreviewOverlay;
pub use pages::{CmsApi, HttpCmsApi};
pub use registry::{
    ComponentRegistry, Dispatch, PageRenderer, PageView, RenderOutput, RenderedSection,
    SectionRenderer,
};
pub use resolver::{ResolverState, SectionHandle, SectionResolver, SectionSnapshot};
pub use session::{PreviewSession, SaveSummary};
pub use store::{upsert, SectionStore, Upsert, WriteOutcome};
