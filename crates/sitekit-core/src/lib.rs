//! SiteKit Core - Foundation crate for the SiteKit CMS frontend.
//!
//! This crate provides shared types, error handling, configuration management,
//! and JSON content helpers that the content and theme crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes and enums (`SectionId`, `ComponentType`, `Section`, `PageData`)
//! - [`content`] - Section content merging and schema fencing
//! - [`logging`] - Tracing subscriber initialisation
//! - [`markup`] - HTML escaping for generated placeholders and tags
//!
//! # Example
//!
//! ```rust
//! use sitekit_core::{content, ComponentType, SectionId};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let id = SectionId::new("hero-main")?;
//! let kind: ComponentType = "Hero1".parse()?;
//! assert_eq!(kind.to_string(), "Hero1");
//!
//! let defaults = content::as_object(json!({"title": "A", "color": "x"}))?;
//! let fetched = content::as_object(json!({"title": "B"}))?;
//! let baseline = content::merge(&defaults, &fetched);
//! assert_eq!(baseline["title"], "B");
//! assert_eq!(baseline["color"], "x");
//! # let _ = id;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod markup;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, AppConfig, FontConfig, PreviewConfig, ThemeConfig};
pub use content::Content;
pub use error::{ConfigError, ConfigResult, Result, SiteError};
pub use types::{
    generate_section_id, ComponentType, PageData, PageId, Section, SectionBackground,
    SectionId, SectionRecord, StaticColor,
};
