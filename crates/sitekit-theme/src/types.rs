//! Theme definitions as served by the theme API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// CSS custom properties keyed by name without the leading `--`.
pub type CssVarMap = BTreeMap<String, String>;

/// The three variable sets of a theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CssVars {
    /// Mode-independent variables (fonts, radius, font size)
    pub theme: CssVarMap,
    /// Light mode colors, applied under `:root`
    pub light: CssVarMap,
    /// Dark mode colors, applied under `.dark`
    pub dark: CssVarMap,
}

/// A named theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeData {
    /// Identifier used to select the theme
    pub name: String,
    /// Human readable name
    #[serde(default)]
    pub display_name: String,
    /// Variable sets
    #[serde(default)]
    pub css_vars: CssVars,
}

impl ThemeData {
    /// Built-in theme applied when the backend cannot be reached.
    #[must_use]
    pub fn fallback() -> Self {
        fn vars(pairs: &[(&str, &str)]) -> CssVarMap {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect()
        }

        Self {
            name: "fallback".to_string(),
            display_name: "Fallback Theme".to_string(),
            css_vars: CssVars {
                theme: vars(&[
                    ("font-sans", "system-ui, sans-serif"),
                    ("font-serif", "Georgia, serif"),
                    ("font-mono", "monospace"),
                    ("radius", "0.375rem"),
                ]),
                light: vars(&[
                    ("background", "oklch(1.0000 0 0)"),
                    ("foreground", "oklch(0.15 0 0)"),
                    ("primary", "oklch(0.6231 0.1880 259.8145)"),
                    ("secondary", "oklch(0.9670 0.0029 264.5419)"),
                    ("accent", "oklch(0.9514 0.0250 236.8242)"),
                    ("muted", "oklch(0.9608 0.0155 264.5380)"),
                    ("card", "oklch(1.0000 0 0)"),
                    ("border", "oklch(0.9216 0.0266 264.5312)"),
                ]),
                dark: vars(&[
                    ("background", "oklch(0.0902 0 0)"),
                    ("foreground", "oklch(0.9216 0.0266 264.5312)"),
                    ("primary", "oklch(0.6231 0.1880 259.8145)"),
                    ("secondary", "oklch(0.1725 0.0118 264.5419)"),
                    ("accent", "oklch(0.1686 0.0157 236.8242)"),
                    ("muted", "oklch(0.1412 0.0166 264.5380)"),
                    ("card", "oklch(0.0902 0 0)"),
                    ("border", "oklch(0.1725 0.0118 264.5419)"),
                ]),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_theme() {
        let theme: ThemeData = serde_json::from_str(
            r#"{
                "name": "ocean",
                "display_name": "Ocean",
                "css_vars": {
                    "theme": {"font-sans": "Inter, sans-serif", "radius": "0.5rem"},
                    "light": {"primary": "oklch(0.5 0.1 200)"}
                }
            }"#,
        )
        .expect("parse theme");

        assert_eq!(theme.name, "ocean");
        assert_eq!(theme.css_vars.theme["radius"], "0.5rem");
        assert!(theme.css_vars.dark.is_empty());
    }

    #[test]
    fn test_fallback_only_uses_system_fonts() {
        let theme = ThemeData::fallback();
        assert_eq!(theme.name, "fallback");
        assert_eq!(theme.css_vars.light.len(), theme.css_vars.dark.len());
        assert!(crate::fonts::theme_fonts(&theme.css_vars.theme, &[]).is_empty());
    }
}
