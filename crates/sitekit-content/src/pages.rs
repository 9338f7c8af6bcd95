//! CMS pages and site settings API used by the preview session.

use crate::error::{ContentError, Result};
use crate::http::ensure_success;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use sitekit_core::{ApiConfig, Content, PageData, PageId, Section};
use tracing::debug;

/// Backend for page section lists and site settings.
#[async_trait]
pub trait CmsApi: Send + Sync {
    /// Fetch a page with its section list.
    async fn fetch_page(&self, id: PageId) -> Result<PageData>;

    /// Replace a page's section list.
    async fn update_page_sections(&self, id: PageId, sections: &[Section]) -> Result<()>;

    /// Fetch the site settings object.
    async fn fetch_settings(&self) -> Result<Content>;

    /// Patch the site settings, returning the stored result.
    async fn update_settings(&self, settings: &Content) -> Result<Content>;
}

/// [`CmsApi`] over `/api/v1/pages/` and `/api/v1/settings/`.
#[derive(Clone)]
pub struct HttpCmsApi {
    client: Client,
    base_url: String,
    csrf_token: Option<String>,
}

impl HttpCmsApi {
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
            .map_err(|e| ContentError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base().to_string(),
            csrf_token: None,
        })
    }

    /// Send `token` as `X-CSRFToken` on writes.
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    fn page_url(&self, id: PageId) -> String {
        format!("{}/api/v1/pages/{}/", self.base_url, id)
    }

    fn settings_url(&self) -> String {
        format!("{}/api/v1/settings/", self.base_url)
    }

    fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.csrf_token {
            Some(token) => request.header("X-CSRFToken", token),
            None => request,
        }
    }
}

#[derive(Serialize)]
struct SectionsBody<'a> {
    sections: &'a [Section],
}

#[async_trait]
impl CmsApi for HttpCmsApi {
    async fn fetch_page(&self, id: PageId) -> Result<PageData> {
        let response = self.client.get(self.page_url(id)).send().await?;
        let response = ensure_success(response).await?;
        let page = response
            .json()
            .await
            .map_err(|e| ContentError::InvalidContent(format!("failed to parse page {id}: {e}")))?;
        Ok(page)
    }

    async fn update_page_sections(&self, id: PageId, sections: &[Section]) -> Result<()> {
        debug!(page_id = %id, count = sections.len(), "saving page sections");
        let request = self
            .client
            .patch(self.page_url(id))
            .json(&SectionsBody { sections });
        let response = self.with_csrf(request).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Content> {
        let response = self.client.get(self.settings_url()).send().await?;
        let response = ensure_success(response).await?;
        let settings = response
            .json()
            .await
            .map_err(|e| ContentError::InvalidContent(format!("failed to parse settings: {e}")))?;
        Ok(settings)
    }

    async fn update_settings(&self, settings: &Content) -> Result<Content> {
        let request = self.client.patch(self.settings_url()).json(settings);
        let response = self.with_csrf(request).send().await?;
        let response = ensure_success(response).await?;
        let stored = response
            .json()
            .await
            .map_err(|e| ContentError::InvalidContent(format!("failed to parse settings: {e}")))?;
        Ok(stored)
    }
}
