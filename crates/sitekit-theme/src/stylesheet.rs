//! Applying theme variables to a document.
//!
//! Mode-independent variables go inline on the root element. Light and dark
//! variables are rendered into one style block so switching modes is a class
//! toggle on the root, never a refetch.

use crate::types::{CssVarMap, ThemeData};
use sitekit_core::ThemeConfig;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Something CSS can be written into.
pub trait StyleTarget: Send {
    /// Set an inline custom property (`name` includes the leading `--`).
    fn set_root_property(&mut self, name: &str, value: &str);

    /// Set the root element's `font-size`.
    fn set_root_font_size(&mut self, value: &str);

    /// Create or replace the style block with the given id.
    fn upsert_style_block(&mut self, id: &str, css: &str);
}

/// In-memory document head and root style, for server-side rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDocument {
    root_properties: BTreeMap<String, String>,
    root_font_size: Option<String>,
    blocks: Vec<(String, String)>,
}

impl StyleDocument {
    /// Empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of an inline root property.
    #[must_use]
    pub fn root_property(&self, name: &str) -> Option<&str> {
        self.root_properties.get(name).map(String::as_str)
    }

    /// Root `font-size`, if set.
    #[must_use]
    pub fn root_font_size(&self) -> Option<&str> {
        self.root_font_size.as_deref()
    }

    /// Contents of a style block.
    #[must_use]
    pub fn style_block(&self, id: &str) -> Option<&str> {
        self.blocks
            .iter()
            .find(|(block_id, _)| block_id == id)
            .map(|(_, css)| css.as_str())
    }

    /// Inline `style` attribute value for the root element.
    #[must_use]
    pub fn root_style(&self) -> String {
        let mut style = self
            .root_properties
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>();
        if let Some(size) = &self.root_font_size {
            style.push(format!("font-size: {size};"));
        }
        style.join(" ")
    }

    /// `<style>` elements for the document head, in creation order.
    #[must_use]
    pub fn head_html(&self) -> String {
        self.blocks
            .iter()
            .map(|(id, css)| format!("<style id=\"{id}\">{css}</style>"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl StyleTarget for StyleDocument {
    fn set_root_property(&mut self, name: &str, value: &str) {
        self.root_properties
            .insert(name.to_string(), value.to_string());
    }

    fn set_root_font_size(&mut self, value: &str) {
        self.root_font_size = Some(value.to_string());
    }

    fn upsert_style_block(&mut self, id: &str, css: &str) {
        match self.blocks.iter_mut().find(|(block_id, _)| block_id == id) {
            Some((_, existing)) => *existing = css.to_string(),
            None => self.blocks.push((id.to_string(), css.to_string())),
        }
    }
}

fn rule(selector: &str, vars: &CssVarMap) -> String {
    let mut css = format!("{selector} {{\n");
    for (name, value) in vars {
        let _ = writeln!(css, "  --{name}: {value};");
    }
    css.push('}');
    css
}

/// Light variables under `:root`, a blank line, dark variables under `.dark`.
#[must_use]
pub fn render_mode_css(theme: &ThemeData) -> String {
    format!(
        "{}\n\n{}",
        rule(":root", &theme.css_vars.light),
        rule(".dark", &theme.css_vars.dark)
    )
}

/// Write `theme` into `target`.
pub fn apply_theme(target: &mut dyn StyleTarget, theme: &ThemeData, config: &ThemeConfig) {
    for (name, value) in &theme.css_vars.theme {
        target.set_root_property(&format!("--{name}"), value);
        if name == "font-size" && config.apply_root_font_size {
            target.set_root_font_size(value);
        }
    }
    target.upsert_style_block(&config.style_element_id, &render_mode_css(theme));
    tracing::debug!(
        theme = %theme.name,
        light = theme.css_vars.light.len(),
        dark = theme.css_vars.dark.len(),
        "theme applied"
    );
}
