//! Google Drive folders via the Drive v3 REST API.
//!
//! Immediate children of the folder are listed (all pages). Each `.json` child
//! becomes a unit of its own; each `.zip` child becomes a unit with placeholder
//! metadata, because the listing carries no pairing between the two.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::EntryKind;
use crate::contract::{
    DatasetUnit, Fetch, ListingProvider, Locator, MetadataSource, ProviderKind, RemoteTarget,
    UnitStream,
};
use crate::error::{LoaderError, TransportError};
use crate::metadata::synthetic_metadata;

const PROVIDER: &str = "Google Drive";

static FOLDER_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/folders/([a-zA-Z0-9_-]+)").expect("folder pattern is valid"));
static FOLDER_QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([a-zA-Z0-9_-]+)").expect("id pattern is valid"));

/// Folder id from `/folders/{id}` or an `id={id}` query parameter.
pub fn folder_id_from_url(url: &str) -> Option<String> {
    FOLDER_PATH_RE
        .captures(url)
        .or_else(|| FOLDER_QUERY_RE.captures(url))
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_owned())
}

/// Drive API file resource, trimmed to the fields requested.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilesListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct GoogleDriveFolder {
    folder_id: String,
    access_token: String,
    api_base: String,
    fetcher: Arc<dyn Fetch>,
}

impl GoogleDriveFolder {
    pub fn new(
        folder_id: impl Into<String>,
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            folder_id: folder_id.into(),
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            fetcher,
        }
    }

    pub fn folder_id(&self) -> &str {
        &self.folder_id
    }

    fn list_url(&self, page_token: Option<&str>) -> Result<Url, TransportError> {
        let endpoint = format!("{}/files", self.api_base);
        let query = format!("'{}' in parents and trashed=false", self.folder_id);
        let mut params = vec![
            ("q", query.as_str()),
            ("fields", "nextPageToken,files(id,name,mimeType)"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        Url::parse_with_params(&endpoint, &params).map_err(|e| TransportError::Decode {
            url: endpoint.clone(),
            detail: e.to_string(),
        })
    }

    fn media_target(&self, file_id: &str) -> RemoteTarget {
        RemoteTarget::with_bearer(
            format!("{}/files/{}?alt=media", self.api_base, file_id),
            Some(self.access_token.clone()),
        )
    }

    /// Every child of the folder, following `nextPageToken`.
    pub async fn list_children(&self) -> Result<Vec<DriveFile>, LoaderError> {
        let listing_error = |source| LoaderError::ListingUnavailable {
            locator: format!("Google Drive folder {}", self.folder_id),
            source,
        };

        let mut children = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url(page_token.as_deref()).map_err(listing_error)?;
            let target = RemoteTarget::with_bearer(url.as_str(), Some(self.access_token.clone()));
            let page = self.fetcher.fetch_page(&target).await.map_err(listing_error)?;
            if matches!(page.status, 401 | 403) {
                warn!(status = page.status, folder_id = %self.folder_id, "[DISCOVER] Drive API rejected token");
                return Err(LoaderError::InvalidCredential {
                    provider: PROVIDER,
                    status: page.status,
                });
            }
            let page = page.ensure_success().map_err(listing_error)?;
            let response: FilesListResponse =
                serde_json::from_str(&page.body).map_err(|e| {
                    listing_error(TransportError::Decode {
                        url: page.url.clone(),
                        detail: e.to_string(),
                    })
                })?;

            debug!(count = response.files.len(), "[DISCOVER] Drive listing page received");
            children.extend(response.files);
            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(children)
    }

    fn unit_for(&self, file: DriveFile) -> Option<DatasetUnit> {
        match EntryKind::of(&file.name) {
            EntryKind::Metadata => Some(DatasetUnit {
                metadata: MetadataSource::Locator(Locator::Url(self.media_target(&file.id))),
                file: None,
                marker_dir: None,
                label: file.name,
            }),
            EntryKind::Archive => Some(DatasetUnit {
                metadata: MetadataSource::Inline(synthetic_metadata()),
                file: Some(Locator::Url(self.media_target(&file.id))),
                marker_dir: None,
                label: file.name,
            }),
            EntryKind::Other => {
                debug!(name = %file.name, mime_type = ?file.mime_type, "[DISCOVER] Ignoring Drive file");
                None
            }
        }
    }
}

#[async_trait]
impl ListingProvider for GoogleDriveFolder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleDriveFolder
    }

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError> {
        let children = self.list_children().await?;
        if children.is_empty() {
            info!(folder_id = %self.folder_id, "[DISCOVER] No files found in Google Drive folder (or insufficient permissions)");
        }
        for child in &children {
            info!(name = %child.name, "[DISCOVER] Found Drive file");
        }

        let stream = futures::stream::iter(children)
            .filter_map(move |child| futures::future::ready(self.unit_for(child).map(Ok)));
        Ok(stream.boxed())
    }
}
