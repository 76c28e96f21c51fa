use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DocumentGateway, DocumentSnapshot, Resolution, ResponseResolver};
use crate::error::BackendError;
use crate::state::{Document, DocumentStatus, Source};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    response_text: String,
    #[serde(default)]
    sources: Vec<SourceReply>,
}

#[derive(Deserialize)]
struct SourceReply {
    title: String,
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize)]
struct StatusReply {
    indexed_count: usize,
}

#[derive(Deserialize)]
struct DocumentReply {
    id: serde_json::Value,
    name: String,
    status: String,
}

impl DocumentReply {
    fn into_document(self) -> Document {
        // Services differ on numeric vs string ids.
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Document {
            id,
            name: self.name,
            status: DocumentStatus::from_wire(&self.status),
        }
    }
}

/// HTTP client for the document service.
#[derive(Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
}

impl RemoteBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    async fn check(response: Response) -> Result<Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }

    /// Read the whole body first so a malformed reply surfaces as `Decode`
    /// rather than as a transport error.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn fetch_status(&self) -> Result<usize, BackendError> {
        let response = self.client.get(self.url("status")).send().await?;
        let status: StatusReply = Self::decode(response).await?;
        Ok(status.indexed_count)
    }

    pub async fn fetch_documents(&self) -> Result<Vec<Document>, BackendError> {
        let response = self.client.get(self.url("documents")).send().await?;
        let documents: Vec<DocumentReply> = Self::decode(response).await?;
        Ok(documents
            .into_iter()
            .map(DocumentReply::into_document)
            .collect())
    }
}

#[async_trait]
impl ResponseResolver for RemoteBackend {
    async fn resolve(&self, query: &str) -> Result<Resolution, BackendError> {
        let response = self
            .client
            .post(self.url("chat"))
            .json(&ChatRequest { query })
            .send()
            .await?;

        let reply: ChatReply = Self::decode(response).await?;
        Ok(Resolution {
            content: reply.response_text,
            sources: reply
                .sources
                .into_iter()
                .map(|s| Source::new(s.title, s.uri))
                .collect(),
        })
    }
}

#[async_trait]
impl DocumentGateway for RemoteBackend {
    async fn refresh(&self) -> Result<DocumentSnapshot, BackendError> {
        let indexed_count = self.fetch_status().await?;
        let documents = self.fetch_documents().await?;
        Ok(DocumentSnapshot {
            documents,
            indexed_count,
        })
    }

    async fn ingest(&self, file: &Path) -> Result<(), BackendError> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let size = bytes.len();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.clone()));

        let response = self
            .client
            .post(self.url("upload-document"))
            .multipart(form)
            .send()
            .await?;
        let ack = Self::check(response).await?.text().await.unwrap_or_default();

        tracing::debug!(file = %file_name, size, ack = %ack, "Upload acknowledged");
        Ok(())
    }
}
