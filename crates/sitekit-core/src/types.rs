//! Shared types used across SiteKit.
//!
//! This module defines the newtypes and enums describing pages, sections and
//! the closed set of section component types.

use crate::error::SiteError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for section identifiers with validation.
///
/// Section IDs are used verbatim as a URL path segment and as the backend
/// primary key, so they are limited to 1-100 ASCII alphanumerics, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionId(String);

impl SectionId {
    /// Create a new `SectionId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, SiteError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), SiteError> {
        static SECTION_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            SECTION_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));

        if id.is_empty() || id.len() > 100 {
            return Err(SiteError::Validation(format!(
                "invalid section ID: must be 1-100 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SiteError::Validation(format!(
                "invalid section ID: must be alphanumeric with '-' or '_', got '{id}'"
            )))
        }
    }
}

impl TryFrom<String> for SectionId {
    type Error = SiteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SectionId> for String {
    fn from(id: SectionId) -> Self {
        id.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric page identifier assigned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(pub u64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! component_types {
    ($($variant:ident => $wire:literal, $name:literal;)+) => {
        /// Closed set of section renderers a page may reference.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ComponentType {
            $(
                #[doc = $name]
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl ComponentType {
            /// Every known component type, in registry order.
            pub const ALL: &'static [ComponentType] = &[$(ComponentType::$variant),+];

            /// The discriminator string stored in page section lists.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(ComponentType::$variant => $wire,)+
                }
            }

            /// Human readable name shown in the editor's section picker.
            #[must_use]
            pub fn display_name(self) -> &'static str {
                match self {
                    $(ComponentType::$variant => $name,)+
                }
            }
        }

        impl FromStr for ComponentType {
            type Err = SiteError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(ComponentType::$variant),)+
                    other => Err(SiteError::Validation(format!(
                        "unknown component type '{other}'"
                    ))),
                }
            }
        }
    };
}

component_types! {
    Hero1 => "Hero1", "Classic Hero Section";
    Hero2 => "Hero2", "Animated Text Hero";
    Hero3 => "Hero3", "Split Layout Hero";
    Hero4 => "Hero4", "Features Showcase Hero";
    Hero5 => "Hero5", "Stats & Metrics Hero";
    Hero6 => "Hero6", "Benefits List Hero";
    Hero7 => "Hero7", "Mobile App Hero";
    Hero8 => "Hero8", "Local Business Hero";
    Hero9 => "Hero9", "Community Trust Hero";
    Hero10 => "Hero10", "Social Proof Hero";
    Hero11 => "Hero11", "Card-Centered Hero";
    Feature1 => "Feature1", "Asymmetric Feature Grid";
    Feature2 => "Feature2", "Feature Cards with Benefits List";
    Feature3 => "Feature3", "Alternating Feature Showcase";
    Feature4 => "Feature4", "Simple Feature Grid";
    Feature5 => "Feature5", "Feature Highlights";
    Pricing1 => "Pricing1", "Multi-Plan Pricing Table";
    Pricing2 => "Pricing2", "Single Plan Spotlight";
    Pricing3 => "Pricing3", "Two-Tier Comparison";
    Testimonial1 => "Testimonial1", "Single Quote Testimonial";
    Testimonial2 => "Testimonial2", "Featured & Grid Testimonials";
    Testimonial3 => "Testimonial3", "Carousel Testimonials";
    Testimonial4 => "Testimonial4", "Infinite Scrolling Testimonials";
    Testimonial5 => "Testimonial5", "Animated Cards Stack";
    Faq1 => "Faq1", "Numbered FAQ Accordion";
    Faq2 => "Faq2", "Community-Style FAQ";
    Gallery1 => "Gallery1", "Portfolio Carousel";
    Gallery2 => "Gallery2", "Case Study Carousel";
    Gallery3 => "Gallery3", "Interactive Grid Gallery";
    Gallery4 => "Gallery4", "Parallax Scroll Gallery";
    Gallery5 => "Gallery5", "Simple Grid Gallery";
    Cta1 => "CTA1", "Feature-Focused CTA";
    Cta2 => "CTA2", "Centered Dual CTA";
    ClientList1 => "ClientList1", "Alphabetical Client Directory";
    ClientList2 => "ClientList2", "Brand Logo Marquee";
    Timeline1 => "Timeline1", "Animated Timeline";
    Simple1 => "Simple1", "Simple Content Block";
    TabbedList1 => "TabbedList1", "Tabbed List";
    Video1 => "Video1", "Video Showcase";
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Theme color token a section background may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticColor {
    /// Page background
    Background,
    /// Muted surface
    Muted,
    /// Accent surface
    Accent,
    /// Secondary brand color
    Secondary,
    /// Primary brand color
    Primary,
    /// Card surface
    Card,
}

/// Optional background styling attached to a page section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionBackground {
    /// `static` or `animated`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Color token for static backgrounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_color: Option<StaticColor>,
    /// Animation name for animated backgrounds (ripples, particles, waves, gradient)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated_type: Option<String>,
    /// Opacity between 0.0 and 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

fn default_visible() -> bool {
    true
}

/// One entry of a page's section list.
///
/// `component_type` is kept as the raw string the backend stored so that
/// unknown or missing types can still be rendered as a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section identifier, also the key of its content record
    pub id: SectionId,
    /// Renderer discriminator (see [`ComponentType`])
    #[serde(default)]
    pub component_type: String,
    /// Hidden sections stay in the list but are not rendered
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Display metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<SectionBackground>,
}

impl Section {
    /// Create a visible section without background.
    #[must_use]
    pub fn new(id: SectionId, component_type: ComponentType) -> Self {
        Self {
            id,
            component_type: component_type.as_str().to_string(),
            visible: true,
            background: None,
        }
    }

    /// Parse the component type, if it names a known renderer.
    #[must_use]
    pub fn kind(&self) -> Option<ComponentType> {
        self.component_type.parse().ok()
    }
}

/// A CMS page as returned by the pages API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    /// Page identifier
    pub id: PageId,
    /// Page title
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Ordered section list
    #[serde(default)]
    pub sections: Vec<Section>,
    /// SEO title tag
    #[serde(default)]
    pub meta_title: String,
    /// SEO meta description
    #[serde(default)]
    pub meta_description: String,
    /// Unpublished pages are only visible to editors
    #[serde(default)]
    pub is_published: bool,
}

/// A persisted section content row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    /// Section identifier
    pub section_id: SectionId,
    /// JSON content blob
    #[serde(default)]
    pub content: serde_json::Map<String, serde_json::Value>,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Generate a fresh section id for a newly added section of `component_type`.
///
/// Format: `<type slug>-<unix millis>-<6 char suffix>`.
#[must_use]
pub fn generate_section_id(component_type: &str) -> SectionId {
    let mut base: String = component_type
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(60)
        .collect();
    if base.is_empty() {
        base.push_str("section");
    }

    let millis = Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(6).collect();

    SectionId(format!("{base}-{millis}-{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_id_valid() {
        assert!(SectionId::new("hero-main").is_ok());
        assert!(SectionId::new("features_top_2").is_ok());
        assert!(SectionId::new("a").is_ok());
    }

    #[test]
    fn test_section_id_invalid() {
        assert!(SectionId::new("").is_err());
        assert!(SectionId::new("hero/main").is_err());
        assert!(SectionId::new("hero main").is_err());
        assert!(SectionId::new("x".repeat(101)).is_err());
    }

    #[test]
    fn test_section_id_serde_validates() {
        let id: SectionId = serde_json::from_value(json!("cta-1")).expect("valid id");
        assert_eq!(id.as_str(), "cta-1");
        assert!(serde_json::from_value::<SectionId>(json!("../etc")).is_err());
    }

    #[test]
    fn test_component_type_roundtrip_wire_names() {
        assert_eq!("CTA1".parse::<ComponentType>().unwrap(), ComponentType::Cta1);
        assert_eq!(ComponentType::ClientList2.to_string(), "ClientList2");
        assert!("Cta1".parse::<ComponentType>().is_err());
        assert_eq!(ComponentType::ALL.len(), 39);
        for kind in ComponentType::ALL {
            assert_eq!(kind.as_str().parse::<ComponentType>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_component_type_serde() {
        let kind: ComponentType = serde_json::from_value(json!("CTA2")).unwrap();
        assert_eq!(kind, ComponentType::Cta2);
        assert_eq!(serde_json::to_value(ComponentType::Hero10).unwrap(), json!("Hero10"));
    }

    #[test]
    fn test_section_defaults() {
        let section: Section =
            serde_json::from_value(json!({"id": "hero-1", "component_type": "Hero1"})).unwrap();
        assert!(section.visible);
        assert_eq!(section.kind(), Some(ComponentType::Hero1));
        assert!(section.background.is_none());

        let missing: Section = serde_json::from_value(json!({"id": "x-1"})).unwrap();
        assert_eq!(missing.component_type, "");
        assert_eq!(missing.kind(), None);
    }

    #[test]
    fn test_section_background() {
        let section: Section = serde_json::from_value(json!({
            "id": "features-1",
            "component_type": "Feature1",
            "visible": false,
            "background": {"type": "static", "static_color": "accent", "opacity": 0.3}
        }))
        .unwrap();
        let bg = section.background.expect("background");
        assert_eq!(bg.kind.as_deref(), Some("static"));
        assert_eq!(bg.static_color, Some(StaticColor::Accent));
        assert!(!section.visible);
    }

    #[test]
    fn test_page_data() {
        let page: PageData = serde_json::from_value(json!({
            "id": 3,
            "title": "Home",
            "slug": "home",
            "sections": [{"id": "hero-1", "component_type": "Hero1"}],
            "is_published": true
        }))
        .unwrap();
        assert_eq!(page.id, PageId(3));
        assert_eq!(page.sections.len(), 1);
        assert!(page.meta_title.is_empty());
    }

    #[test]
    fn test_generate_section_id() {
        let id = generate_section_id("Hero1");
        assert!(id.as_str().starts_with("hero1-"));
        assert!(SectionId::new(id.as_str()).is_ok());

        let other = generate_section_id("Hero1");
        assert_ne!(id, other);

        let weird = generate_section_id("Client List/2");
        assert!(weird.as_str().starts_with("client-list-2-"));
    }
}
