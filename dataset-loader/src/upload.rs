#![doc = "Repository integration for the CLI: implements the core `RepositoryClient` against the Dataverse native API."]
//
//! # Dataverse Client (CLI <-> Core)
//!
//! This module provides the bridge between the CLI workflow and the repository abstraction in
//! [`dataset_loader_core::contract`]. It wires up the `RepositoryClient` trait for real use against
//! a Dataverse installation, authenticating every call with the `X-Dataverse-key` header.
//!
//! | Operation        | Endpoint                                                                |
//! |------------------|-------------------------------------------------------------------------|
//! | `create_dataset` | `POST /api/dataverses/{alias}/datasets`                                 |
//! | `list_files`     | `GET /api/datasets/:persistentId/versions/{version}/files?persistentId=` |
//! | `delete_file`    | `DELETE /api/files/{id}`                                                |
//! | `upload_file`    | `POST /api/datasets/:persistentId/add?persistentId=` (multipart `file`) |
//!
//! Non-2xx responses are returned as statuses, not errors; the reconciliation engine decides
//! what counts as success. Only transport failures surface as `Err`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use dataset_loader_core::config::ProviderSession;
use dataset_loader_core::contract::{
    ClientError, CreateResponse, FileDescriptor, FileListing, RepositoryClient, StatusResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde_json::Value;

pub const API_KEY_HEADER: &str = "X-Dataverse-key";

pub struct DataverseClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl DataverseClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(base_url = %base_url, "Initialized DataverseClient");
        Ok(Self {
            client,
            base_url,
            api_token: api_token.into(),
        })
    }

    pub fn from_session(session: &ProviderSession) -> Result<Self, ClientError> {
        Self::new(&session.base_url, &session.api_token, session.timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorised(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_token)
    }
}

/// Status plus body, parsed as JSON when possible and kept as a string otherwise.
async fn read_response(response: Response) -> Result<(u16, Value), ClientError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

fn descriptor(entry: &Value) -> FileDescriptor {
    let id = match &entry["dataFile"]["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    };
    FileDescriptor {
        id,
        label: entry["label"].as_str().map(str::to_owned),
    }
}

#[async_trait]
impl RepositoryClient for DataverseClient {
    async fn create_dataset(
        &self,
        collection_alias: &str,
        metadata: &Value,
    ) -> Result<CreateResponse, ClientError> {
        tracing::info!(collection_alias, "[UPLOAD] Creating dataset");
        let request = self
            .client
            .post(self.url(&format!("/api/dataverses/{collection_alias}/datasets")))
            .json(metadata);
        let response = self.authorised(request).send().await.map_err(|e| {
            tracing::error!(error = ?e, "[UPLOAD] Create dataset request failed");
            e
        })?;
        let (status, body) = read_response(response).await?;
        let persistent_id = body["data"]["persistentId"].as_str().map(str::to_owned);
        tracing::info!(status, persistent_id = ?persistent_id, "[UPLOAD] Create dataset responded");
        Ok(CreateResponse {
            status,
            persistent_id,
            body,
        })
    }

    async fn list_files(&self, handle: &str, version: &str) -> Result<FileListing, ClientError> {
        let request = self
            .client
            .get(self.url(&format!(
                "/api/datasets/:persistentId/versions/{version}/files"
            )))
            .query(&[("persistentId", handle)]);
        let response = self.authorised(request).send().await?;
        let (status, body) = read_response(response).await?;
        let files = body["data"]
            .as_array()
            .map(|entries| entries.iter().map(descriptor).collect())
            .unwrap_or_default();
        tracing::debug!(handle, status, "[UPLOAD] Listed dataset files");
        Ok(FileListing { status, files })
    }

    async fn delete_file(&self, file_id: &str) -> Result<StatusResponse, ClientError> {
        let request = self.client.delete(self.url(&format!("/api/files/{file_id}")));
        let response = self.authorised(request).send().await?;
        let (status, body) = read_response(response).await?;
        tracing::debug!(file_id, status, "[UPLOAD] Delete file responded");
        Ok(StatusResponse { status, body })
    }

    async fn upload_file(&self, handle: &str, path: &Path) -> Result<StatusResponse, ClientError> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.dat".to_string());
        tracing::info!(handle, file_name = %file_name, bytes = length, "[UPLOAD] Uploading file");

        let part = Part::stream_with_length(Body::from(file), length).file_name(file_name);
        let form = Form::new().part("file", part);
        let request = self
            .client
            .post(self.url("/api/datasets/:persistentId/add"))
            .query(&[("persistentId", handle)])
            .multipart(form);
        let response = self.authorised(request).send().await.map_err(|e| {
            tracing::error!(error = ?e, handle, "[UPLOAD] Upload request failed");
            e
        })?;
        let (status, body) = read_response(response).await?;
        tracing::info!(handle, status, "[UPLOAD] Upload responded");
        Ok(StatusResponse { status, body })
    }
}
