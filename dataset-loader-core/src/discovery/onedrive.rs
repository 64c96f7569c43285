//! OneDrive / SharePoint shares via Microsoft Graph.
//!
//! The share URL is encoded into Graph's `u!{base64url}` share id and the children
//! of the shared item are listed. JSON and ZIP children are handled exactly as in
//! the Google Drive provider.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::EntryKind;
use crate::contract::{
    DatasetUnit, Fetch, ListingProvider, Locator, MetadataSource, ProviderKind, RemoteTarget,
    UnitStream,
};
use crate::error::{DiscoveryError, LoaderError, TransportError};
use crate::metadata::synthetic_metadata;

const PROVIDER: &str = "OneDrive";

/// Graph share id for a sharing URL.
pub fn share_id(share_url: &str) -> String {
    format!("u!{}", URL_SAFE_NO_PAD.encode(share_url.as_bytes()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "@microsoft.graph.downloadUrl", default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

pub struct OneDriveShare {
    share_url: String,
    share_id: String,
    access_token: String,
    api_base: String,
    fetcher: Arc<dyn Fetch>,
}

impl OneDriveShare {
    pub fn new(
        share_url: impl Into<String>,
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        let share_url = share_url.into();
        Self {
            share_id: share_id(&share_url),
            share_url,
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            fetcher,
        }
    }

    /// Graph-hosted URLs get the bearer token; pre-authenticated download URLs do not.
    fn target(&self, url: String) -> RemoteTarget {
        let bearer = url
            .starts_with(&self.api_base)
            .then(|| self.access_token.clone());
        RemoteTarget::with_bearer(url, bearer)
    }

    /// Every child of the shared item, following `@odata.nextLink`.
    pub async fn list_children(&self) -> Result<Vec<DriveItem>, LoaderError> {
        let listing_error = |source| LoaderError::ListingUnavailable {
            locator: self.share_url.clone(),
            source,
        };

        let mut children = Vec::new();
        let mut next = Some(format!(
            "{}/shares/{}/driveItem/children",
            self.api_base, self.share_id
        ));
        while let Some(url) = next.take() {
            let target = self.target(url);
            let page = self.fetcher.fetch_page(&target).await.map_err(listing_error)?;
            if matches!(page.status, 401 | 403) {
                warn!(status = page.status, "[DISCOVER] Graph rejected OneDrive token");
                return Err(LoaderError::InvalidCredential {
                    provider: PROVIDER,
                    status: page.status,
                });
            }
            let page = page.ensure_success().map_err(listing_error)?;
            let response: ChildrenResponse = serde_json::from_str(&page.body).map_err(|e| {
                listing_error(TransportError::Decode {
                    url: page.url.clone(),
                    detail: e.to_string(),
                })
            })?;

            debug!(count = response.value.len(), "[DISCOVER] Graph children page received");
            children.extend(response.value);
            next = response.next_link.filter(|link| !link.is_empty());
        }
        Ok(children)
    }

    fn download_url(&self, item: &DriveItem) -> Option<String> {
        item.download_url.clone().or_else(|| {
            item.id.as_ref().map(|id| {
                format!(
                    "{}/shares/{}/driveItem/items/{}/content",
                    self.api_base, self.share_id, id
                )
            })
        })
    }

    fn unit_for(&self, item: DriveItem) -> Option<Result<DatasetUnit, DiscoveryError>> {
        let name = item.name.clone().unwrap_or_default();
        let kind = EntryKind::of(&name);
        if kind == EntryKind::Other {
            debug!(name = %name, "[DISCOVER] Ignoring OneDrive item");
            return None;
        }
        let Some(url) = self.download_url(&item) else {
            warn!(name = %name, "[DISCOVER] No download URL for OneDrive item");
            return Some(Err(DiscoveryError::NoDownloadUrl(name)));
        };
        let locator = Locator::Url(self.target(url));

        let unit = if kind == EntryKind::Metadata {
            DatasetUnit {
                label: name,
                metadata: MetadataSource::Locator(locator),
                file: None,
                marker_dir: None,
            }
        } else {
            DatasetUnit {
                label: name,
                metadata: MetadataSource::Inline(synthetic_metadata()),
                file: Some(locator),
                marker_dir: None,
            }
        };
        Some(Ok(unit))
    }
}

#[async_trait]
impl ListingProvider for OneDriveShare {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneDriveShare
    }

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError> {
        let children = self.list_children().await?;
        if children.is_empty() {
            info!(share = %self.share_url, "[DISCOVER] No items found in OneDrive share (or insufficient permissions)");
        }
        for child in &children {
            info!(name = child.name.as_deref().unwrap_or("<unnamed>"), "[DISCOVER] Found OneDrive item");
        }

        let stream = futures::stream::iter(children)
            .filter_map(move |item| futures::future::ready(self.unit_for(item)));
        Ok(stream.boxed())
    }
}
