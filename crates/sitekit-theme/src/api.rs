//! Theme API client.

use crate::error::{Result, ThemeError};
use crate::types::ThemeData;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use sitekit_core::ApiConfig;
use tracing::debug;

/// Backend holding the theme catalogue and the current selection.
#[async_trait]
pub trait ThemeApi: Send + Sync {
    /// The theme currently selected for the site.
    async fn current_theme(&self) -> Result<ThemeData>;

    /// Persist `name` as the current theme.
    async fn set_current_theme(&self, name: &str) -> Result<()>;

    /// Every available theme.
    async fn list_themes(&self) -> Result<Vec<ThemeData>>;
}

/// [`ThemeApi`] over `/api/v1/themes/`.
#[derive(Clone)]
pub struct HttpThemeApi {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SelectBody<'a> {
    name: &'a str,
}

impl HttpThemeApi {
    /// Create a client for the given backend base URL with default settings.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let config = ApiConfig {
            base_url: base_url.into(),
            ..ApiConfig::default()
        };
        Self::from_config(&config)
    }

    /// Create a client from API configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ThemeError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base().to_string(),
        })
    }

    fn current_url(&self) -> String {
        format!("{}/api/v1/themes/current/", self.base_url)
    }

    fn list_url(&self) -> String {
        format!("{}/api/v1/themes/", self.base_url)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ThemeError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ThemeApi for HttpThemeApi {
    async fn current_theme(&self) -> Result<ThemeData> {
        let response = self.client.get(self.current_url()).send().await?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ThemeError::InvalidTheme(format!("failed to parse current theme: {e}")))
    }

    async fn set_current_theme(&self, name: &str) -> Result<()> {
        debug!(theme = name, "selecting theme");
        let response = self
            .client
            .post(self.current_url())
            .json(&SelectBody { name })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list_themes(&self) -> Result<Vec<ThemeData>> {
        let response = self.client.get(self.list_url()).send().await?;
        let response = ensure_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| ThemeError::InvalidTheme(format!("failed to parse theme list: {e}")))
    }
}
