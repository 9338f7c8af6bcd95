//! Theme lifecycle: fetch, load fonts, apply, switch.

use crate::api::ThemeApi;
use crate::error::Result;
use crate::fonts::{FontLoader, FontsReady};
use crate::stylesheet::{apply_theme, StyleTarget};
use crate::types::ThemeData;
use sitekit_core::ThemeConfig;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

#[derive(Default)]
struct ManagerState {
    current: Option<ThemeData>,
    error: Option<String>,
    loading: bool,
    fonts_timed_out: bool,
}

/// Keeps the active theme applied to a [`StyleTarget`].
pub struct ThemeManager<T: StyleTarget> {
    api: Arc<dyn ThemeApi>,
    fonts: FontLoader,
    config: ThemeConfig,
    target: Mutex<T>,
    state: Mutex<ManagerState>,
}

impl<T: StyleTarget> ThemeManager<T> {
    /// Create a manager writing into `target`.
    #[must_use]
    pub fn new(api: Arc<dyn ThemeApi>, fonts: FontLoader, config: ThemeConfig, target: T) -> Self {
        Self {
            api,
            fonts,
            config,
            target: Mutex::new(target),
            state: Mutex::new(ManagerState {
                loading: true,
                ..ManagerState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().expect("acquire theme state lock")
    }

    /// Fetch and apply the current theme, falling back to the built-in theme
    /// if the backend fails. Returns the applied theme.
    pub async fn load(&self) -> ThemeData {
        {
            let mut state = self.state();
            state.loading = true;
            state.error = None;
        }

        match self.fetch_and_apply().await {
            Ok(theme) => theme,
            Err(err) => {
                warn!("failed to load theme from backend: {err}");
                let fallback = ThemeData::fallback();
                self.apply(&fallback);
                let mut state = self.state();
                state.current = Some(fallback.clone());
                state.error = Some("Failed to load theme from backend, using fallback".to_string());
                state.loading = false;
                fallback
            }
        }
    }

    /// Fetch and apply the current theme again. On failure the applied
    /// theme is kept and the error recorded.
    pub async fn refresh(&self) -> Result<ThemeData> {
        self.state().loading = true;
        self.fetch_and_apply().await.inspect_err(|err| {
            warn!("failed to refresh theme: {err}");
            let mut state = self.state();
            state.error = Some("Failed to refresh theme".to_string());
            state.loading = false;
        })
    }

    /// Persist `name` as the current theme, then refresh.
    pub async fn switch_theme(&self, name: &str) -> Result<ThemeData> {
        self.state().loading = true;
        if let Err(err) = self.api.set_current_theme(name).await {
            warn!(theme = name, "failed to switch theme: {err}");
            let mut state = self.state();
            state.error = Some("Failed to switch theme".to_string());
            state.loading = false;
            return Err(err);
        }
        self.refresh().await
    }

    async fn fetch_and_apply(&self) -> Result<ThemeData> {
        let theme = self.api.current_theme().await?;
        self.state().current = Some(theme.clone());

        let FontsReady { timed_out, .. } = self.fonts.wait_ready(&theme.css_vars.theme).await;
        self.apply(&theme);
        info!(theme = %theme.name, "theme applied");

        let mut state = self.state();
        state.fonts_timed_out = timed_out;
        state.error = None;
        state.loading = false;
        Ok(theme)
    }

    fn apply(&self, theme: &ThemeData) {
        let mut target = self.target.lock().expect("acquire style target lock");
        apply_theme(&mut *target, theme, &self.config);
    }

    /// Loading, or fonts of the current theme not yet ready.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        let state = self.state();
        let fonts_ready = state.fonts_timed_out
            || state
                .current
                .as_ref()
                .map_or(true, |theme| self.fonts.fonts_ready(&theme.css_vars.theme));
        state.loading || !fonts_ready
    }

    /// The applied theme.
    #[must_use]
    pub fn current(&self) -> Option<ThemeData> {
        self.state().current.clone()
    }

    /// Last failure, cleared by a successful load.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    /// The font loader.
    #[must_use]
    pub fn fonts(&self) -> &FontLoader {
        &self.fonts
    }

    /// Read the style target.
    pub fn with_target<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let target = self.target.lock().expect("acquire style target lock");
        f(&target)
    }
}
