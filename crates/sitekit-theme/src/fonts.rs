//! Web font loading for theme font variables.
//!
//! Every `font-*` theme variable names a family stack; its first family is
//! loaded unless it is a system font. Each family is tried on the primary
//! stylesheet CDN and, independently of the others, on the fallback provider
//! if that fails. A family that fails on both is recorded as failed and still
//! counts as settled so a broken font host never blocks readiness.

use crate::error::{Result, ThemeError};
use crate::types::CssVarMap;
use async_trait::async_trait;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use reqwest::Client;
use sitekit_core::markup::escape_html;
use sitekit_core::{ApiConfig, FontConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Families never fetched: generic families and fonts shipped with common
/// operating systems. Matched exactly or as a substring.
pub const SYSTEM_FONTS: &[&str] = &[
    "serif",
    "sans-serif",
    "monospace",
    "cursive",
    "fantasy",
    "system-ui",
    "-apple-system",
    "blinkmacsystemfont",
    "arial",
    "helvetica",
    "times",
    "courier",
    "verdana",
    "ui-sans-serif",
    "ui-monospace",
    "ui-serif",
    "georgia",
    "times new roman",
    "cambria",
    "calibri",
    "segoe ui",
    "tahoma",
    "courier new",
    "consolas",
    "monaco",
];

/// Cache key for a family: lowercase, whitespace runs as `-`, nothing
/// outside `[a-z0-9-]`.
#[must_use]
pub fn normalize_font_name(family: &str) -> String {
    family
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Whether `family` has to be fetched.
#[must_use]
pub fn is_web_font(family: &str, extra_system_fonts: &[String]) -> bool {
    let family = family.trim().to_lowercase();
    let is_system = |system: &str| family == system || family.contains(system);

    !(SYSTEM_FONTS.iter().copied().any(|s| is_system(s))
        || extra_system_fonts
            .iter()
            .any(|s| is_system(&s.trim().to_lowercase())))
}

/// Web font families referenced by `font-*` variables, first occurrence order.
#[must_use]
pub fn theme_fonts(vars: &CssVarMap, extra_system_fonts: &[String]) -> Vec<String> {
    let mut fonts: Vec<String> = Vec::new();
    for (key, value) in vars {
        if !key.starts_with("font-") {
            continue;
        }
        let family = value
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .replace(['\'', '"'], "");
        if !family.is_empty()
            && is_web_font(&family, extra_system_fonts)
            && !fonts.contains(&family)
        {
            fonts.push(family);
        }
    }
    fonts
}

/// Where a stylesheet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProvider {
    /// Fontsource packages on the primary CDN
    Fontsource,
    /// Google Fonts CSS2 API
    GoogleFonts,
}

impl FontProvider {
    /// Stable name, used in `data-font-loader`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fontsource => "fontsource",
            Self::GoogleFonts => "google-fonts",
        }
    }
}

/// Settled state of one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontStatus {
    /// Stylesheet loaded
    Loaded {
        /// Provider that served it
        provider: FontProvider,
        /// Stylesheet URL
        url: String,
    },
    /// Both providers failed
    Failed,
}

/// Result of waiting for a theme's fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontsReady {
    /// Every family settled (loaded or failed) before the deadline
    pub ready: bool,
    /// The deadline passed first; callers proceed anyway
    pub timed_out: bool,
}

/// Loads a font stylesheet.
#[async_trait]
pub trait FontFetcher: Send + Sync {
    /// Load the stylesheet at `url`.
    async fn fetch_stylesheet(&self, url: &str) -> Result<()>;
}

/// [`FontFetcher`] issuing a GET for the stylesheet.
#[derive(Clone)]
pub struct HttpFontFetcher {
    client: Client,
}

impl HttpFontFetcher {
    /// Create a fetcher using the API timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ThemeError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FontFetcher for HttpFontFetcher {
    async fn fetch_stylesheet(&self, url: &str) -> Result<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ThemeError::Api {
                status: status.as_u16(),
                message: format!("stylesheet request to {url} failed"),
            });
        }
        Ok(())
    }
}

type PendingLoad = Shared<BoxFuture<'static, FontStatus>>;

#[derive(Default)]
struct LoaderState {
    settled: BTreeMap<String, FontStatus>,
    pending: HashMap<String, PendingLoad>,
}

/// Font loader with caches keyed by normalized family name.
///
/// Clones share their caches, so one loader per process avoids refetching a
/// family on every theme switch.
#[derive(Clone)]
pub struct FontLoader {
    fetcher: Arc<dyn FontFetcher>,
    config: Arc<FontConfig>,
    state: Arc<Mutex<LoaderState>>,
}

impl FontLoader {
    /// Create a loader.
    #[must_use]
    pub fn new(fetcher: Arc<dyn FontFetcher>, config: FontConfig) -> Self {
        Self {
            fetcher,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    /// Loader configuration.
    #[must_use]
    pub fn config(&self) -> &FontConfig {
        &self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LoaderState> {
        self.state.lock().expect("acquire font loader lock")
    }

    /// Stylesheet URL on the primary CDN.
    #[must_use]
    pub fn primary_url(&self, family: &str) -> String {
        format!(
            "{}/{}@latest/index.css",
            self.config.primary_cdn.trim_end_matches('/'),
            normalize_font_name(family)
        )
    }

    /// Stylesheet URL on the fallback provider.
    #[must_use]
    pub fn fallback_url(&self, family: &str) -> String {
        let weights = self
            .config
            .weights
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}?family={}:wght@{}&display=block",
            self.config.fallback_cdn,
            urlencoding::encode(family),
            weights
        )
    }

    /// Families of `vars` that need loading.
    #[must_use]
    pub fn theme_fonts(&self, vars: &CssVarMap) -> Vec<String> {
        theme_fonts(vars, &self.config.extra_system_fonts)
    }

    /// Load one family, sharing any load already in flight.
    ///
    /// The load runs on its own task and settles even if every caller stops
    /// waiting. Must be called from within a Tokio runtime.
    pub async fn load(&self, family: &str) -> FontStatus {
        let key = normalize_font_name(family);
        let pending = {
            let mut state = self.lock();
            if let Some(status) = state.settled.get(&key) {
                return status.clone();
            }
            match state.pending.get(&key) {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.start_load(family.to_string(), key.clone());
                    state.pending.insert(key, pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn start_load(&self, family: String, key: String) -> PendingLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let attempts = [
            (FontProvider::Fontsource, self.primary_url(&family)),
            (FontProvider::GoogleFonts, self.fallback_url(&family)),
        ];

        let load = async move {
            let mut status = FontStatus::Failed;
            for (provider, url) in attempts {
                match fetcher.fetch_stylesheet(&url).await {
                    Ok(()) => {
                        info!(font = %family, provider = provider.as_str(), "font loaded");
                        status = FontStatus::Loaded { provider, url };
                        break;
                    }
                    Err(err) => {
                        let err = ThemeError::Font {
                            family: family.clone(),
                            provider: provider.as_str(),
                            reason: err.to_string(),
                        };
                        warn!("{err}");
                    }
                }
            }

            let mut state = state.lock().expect("acquire font loader lock");
            state.pending.remove(&key);
            state.settled.insert(key, status.clone());
            status
        };

        // The load outlives its callers.
        tokio::spawn(load)
            .map(|joined| joined.unwrap_or(FontStatus::Failed))
            .boxed()
            .shared()
    }

    /// Load every web font of `vars`. Never fails; see [`FontStatus::Failed`].
    pub async fn preload(&self, vars: &CssVarMap) -> Vec<(String, FontStatus)> {
        let fonts = self.theme_fonts(vars);
        debug!(?fonts, "loading theme fonts");
        let statuses = join_all(fonts.iter().map(|family| self.load(family))).await;
        fonts.into_iter().zip(statuses).collect()
    }

    /// Whether every web font of `vars` has settled.
    #[must_use]
    pub fn fonts_ready(&self, vars: &CssVarMap) -> bool {
        let state = self.lock();
        self.theme_fonts(vars)
            .iter()
            .all(|family| state.settled.contains_key(&normalize_font_name(family)))
    }

    /// Preload `vars`, giving up after the configured readiness timeout.
    pub async fn wait_ready(&self, vars: &CssVarMap) -> FontsReady {
        let deadline = Duration::from_millis(self.config.ready_timeout_ms);
        match tokio::time::timeout(deadline, self.preload(vars)).await {
            Ok(_) => FontsReady {
                ready: true,
                timed_out: false,
            },
            Err(_) => {
                warn!(timeout_ms = self.config.ready_timeout_ms, "font loading timed out, continuing");
                FontsReady {
                    ready: self.fonts_ready(vars),
                    timed_out: true,
                }
            }
        }
    }

    /// Normalized names of loaded families.
    #[must_use]
    pub fn loaded_fonts(&self) -> Vec<String> {
        self.lock()
            .settled
            .iter()
            .filter(|(_, status)| matches!(status, FontStatus::Loaded { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Normalized names of families that failed on both providers.
    #[must_use]
    pub fn failed_fonts(&self) -> Vec<String> {
        self.lock()
            .settled
            .iter()
            .filter(|(_, status)| **status == FontStatus::Failed)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// `<link>` elements for every loaded stylesheet.
    #[must_use]
    pub fn link_tags(&self) -> String {
        self.lock()
            .settled
            .iter()
            .filter_map(|(name, status)| match status {
                FontStatus::Loaded { provider, url } => Some(format!(
                    "<link rel=\"stylesheet\" href=\"{}\" data-font-loader=\"{}\" data-font-name=\"{}\">",
                    escape_html(url),
                    provider.as_str(),
                    escape_html(name)
                )),
                FontStatus::Failed => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> CssVarMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_font_name() {
        assert_eq!(normalize_font_name("Playfair Display"), "playfair-display");
        assert_eq!(normalize_font_name("  Noto  Sans JP "), "noto-sans-jp");
        assert_eq!(normalize_font_name("Font+Name_2!"), "fontname2");
    }

    #[test]
    fn test_is_web_font() {
        assert!(is_web_font("Inter", &[]));
        assert!(!is_web_font("Arial", &[]));
        assert!(!is_web_font("ui-sans-serif", &[]));
        // Substring match against the system list.
        assert!(!is_web_font("Arial Narrow", &[]));
        assert!(!is_web_font("Brand Sans", &["brand sans".to_string()]));
    }

    #[test]
    fn test_theme_fonts() {
        let vars = vars(&[
            ("font-sans", "\"Inter\", sans-serif"),
            ("font-serif", "'Lora', Georgia, serif"),
            ("font-mono", "monospace"),
            ("font-heading", "Inter"),
            ("radius", "Fancy Font"),
        ]);
        assert_eq!(theme_fonts(&vars, &[]), vec!["Inter", "Lora"]);
    }

    struct NoFetch;

    #[async_trait]
    impl FontFetcher for NoFetch {
        async fn fetch_stylesheet(&self, _url: &str) -> Result<()> {
            Err(ThemeError::Internal("offline".to_string()))
        }
    }

    #[test]
    fn test_provider_urls() {
        let loader = FontLoader::new(Arc::new(NoFetch), FontConfig::default());
        assert_eq!(
            loader.primary_url("Playfair Display"),
            "https://cdn.jsdelivr.net/npm/@fontsource/playfair-display@latest/index.css"
        );
        assert_eq!(
            loader.fallback_url("Playfair Display"),
            "https://fonts.googleapis.com/css2?family=Playfair%20Display:wght@400;500;600;700&display=block"
        );
    }

    #[tokio::test]
    async fn test_failed_font_still_settles() {
        let loader = FontLoader::new(Arc::new(NoFetch), FontConfig::default());
        let vars = vars(&[("font-sans", "Inter, sans-serif")]);

        assert!(!loader.fonts_ready(&vars));
        let ready = loader.wait_ready(&vars).await;

        assert_eq!(
            ready,
            FontsReady {
                ready: true,
                timed_out: false
            }
        );
        assert!(loader.fonts_ready(&vars));
        assert!(loader.loaded_fonts().is_empty());
        assert_eq!(loader.failed_fonts(), vec!["inter"]);
        assert!(loader.link_tags().is_empty());
    }

    struct SlowFetch;

    #[async_trait]
    impl FontFetcher for SlowFetch {
        async fn fetch_stylesheet(&self, _url: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(6)).await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_continues_after_wait_times_out() {
        let loader = FontLoader::new(Arc::new(SlowFetch), FontConfig::default());
        let vars = vars(&[("font-sans", "Inter, sans-serif")]);

        let ready = loader.wait_ready(&vars).await;
        assert_eq!(
            ready,
            FontsReady {
                ready: false,
                timed_out: true
            }
        );
        assert!(loader.loaded_fonts().is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(loader.loaded_fonts(), vec!["inter"]);
        assert!(loader.fonts_ready(&vars));
        assert!(loader.link_tags().contains("data-font-name=\"inter\""));
    }

    #[test]
    fn test_link_tags_escape_urls() {
        let loader = FontLoader::new(Arc::new(NoFetch), FontConfig::default());
        loader.lock().settled.insert(
            "inter".to_string(),
            FontStatus::Loaded {
                provider: FontProvider::GoogleFonts,
                url: "https://fonts.example/css2?family=Inter\"><script>".to_string(),
            },
        );
        let tags = loader.link_tags();
        assert!(!tags.contains("<script>"));
        assert!(tags.contains("Inter&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn test_system_only_theme_is_ready() {
        let loader = FontLoader::new(Arc::new(NoFetch), FontConfig::default());
        assert!(loader.fonts_ready(&vars(&[("font-sans", "system-ui, sans-serif")])));
    }
}
