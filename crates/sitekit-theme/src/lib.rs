//! SiteKit Theme - theme application and web font loading.
//!
//! A theme is three sets of CSS custom properties: mode-independent `theme`
//! variables (font families, radius, font size), `light` colors and `dark`
//! colors. [`ThemeManager`] fetches the selected theme, loads the web fonts
//! its `font-*` variables name and writes everything into a [`StyleTarget`].
//!
//! # Example
//!
//! ```rust,no_run
//! use sitekit_core::AppConfig;
//! use sitekit_theme::{FontLoader, HttpFontFetcher, HttpThemeApi, StyleDocument, ThemeManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load()?;
//! let api = HttpThemeApi::from_config(&config.api)?;
//! let fonts = FontLoader::new(
//!     Arc::new(HttpFontFetcher::from_config(&config.api)?),
//!     config.fonts.clone(),
//! );
//! let manager = ThemeManager::new(Arc::new(api), fonts, config.theme.clone(), StyleDocument::new());
//!
//! let theme = manager.load().await;
//! println!("applied {}", theme.display_name);
//! let head = manager.with_target(StyleDocument::head_html);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod error;
pub mod fonts;
pub mod manager;
pub mod stylesheet;
pub mod types;

// Re-export commonly used types
pub use api::{HttpThemeApi, ThemeApi};
pub use error::{Result, ThemeError};
pub use fonts::{
    is_web_font, normalize_font_name, theme_fonts, FontFetcher, FontLoader, FontProvider,
    FontStatus, FontsReady, HttpFontFetcher,
};
pub use manager::ThemeManager;
pub use stylesheet::{apply_theme, render_mode_css, StyleDocument, StyleTarget};
pub use types::{CssVarMap, CssVars, ThemeData};
