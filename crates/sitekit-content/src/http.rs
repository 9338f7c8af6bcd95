//! HTTP section store backed by the public sections endpoint.

use crate::error::{ContentError, Result};
use crate::store::{SectionStore, WriteOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sitekit_core::{ApiConfig, Content, SectionId, SectionRecord};
use tracing::{debug, warn};

/// Section store talking to `{base}/public/sections/{id}/`.
#[derive(Clone)]
pub struct HttpSectionStore {
    client: Client,
    base_url: String,
}

impl HttpSectionStore {
    /// Create a store for the given backend base URL with default settings.
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

    /// Create a store from API configuration.
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
        })
    }

    fn section_url(&self, id: &SectionId) -> String {
        format!("{}/public/sections/{}/", self.base_url, id)
    }

    fn list_url(&self) -> String {
        format!("{}/public/sections/", self.base_url)
    }
}

/// Turn a non-success response into [`ContentError::Api`].
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ContentError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SectionStore for HttpSectionStore {
    async fn fetch(&self, id: &SectionId) -> Result<Option<SectionRecord>> {
        let response = self.client.get(self.section_url(id)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(section_id = %id, "section not created yet");
            return Ok(None);
        }

        let response = ensure_success(response).await?;
        let body: RecordBody = response.json().await.map_err(|e| {
            warn!(section_id = %id, "malformed section response: {e}");
            ContentError::InvalidContent(format!("failed to parse section {id}: {e}"))
        })?;

        Ok(Some(body.into_record(id.clone())?))
    }

    async fn update(&self, id: &SectionId, content: &Content) -> Result<WriteOutcome> {
        let response = self
            .client
            .patch(self.section_url(id))
            .json(&ContentBody { content })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(WriteOutcome::Missing);
        }
        ensure_success(response).await?;
        Ok(WriteOutcome::Written)
    }

    async fn create(&self, id: &SectionId, content: &Content) -> Result<()> {
        let response = self
            .client
            .post(self.section_url(id))
            .json(&ContentBody { content })
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn delete(&self, id: &SectionId) -> Result<WriteOutcome> {
        let response = self.client.delete(self.section_url(id)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(WriteOutcome::Missing);
        }
        ensure_success(response).await?;
        Ok(WriteOutcome::Written)
    }

    async fn list(&self) -> Result<Vec<SectionRecord>> {
        let response = self.client.get(self.list_url()).send().await?;
        let response = ensure_success(response).await?;
        let records = response.json().await.map_err(|e| {
            ContentError::InvalidContent(format!("failed to parse section list: {e}"))
        })?;
        Ok(records)
    }

    fn store_id(&self) -> &str {
        "http"
    }
}

#[derive(Debug, Serialize)]
struct ContentBody<'a> {
    content: &'a Content,
}

#[derive(Debug, Deserialize)]
struct RecordBody {
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl RecordBody {
    fn into_record(self, section_id: SectionId) -> Result<SectionRecord> {
        let content = match self.content {
            serde_json::Value::Null => Content::new(),
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(ContentError::InvalidContent(format!(
                    "content of section {section_id} is not a JSON object"
                )))
            }
        };
        Ok(SectionRecord {
            section_id,
            content,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
