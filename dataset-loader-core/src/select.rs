//! Choosing a [`ListingProvider`] for a root locator.
//!
//! Rules, first match wins:
//! 1. OneDrive/SharePoint URL → [`OneDriveShare`] (token required up front)
//! 2. Google Drive URL → [`GoogleDriveFolder`] (token required up front)
//! 3. URL serving HTML → [`HtmlIndex`]
//! 4. URL serving a JSON array → [`ExplicitManifest`]
//! 5. Local directory → [`LocalDirectory`]; local file → [`ExplicitManifest`]
//! 6. Anything else → `UnrecognizedSource`
//!
//! Credential checks happen before any network call.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::config::ProviderSession;
use crate::contract::{is_url, Fetch, FetchedPage, ListingProvider, RemoteTarget};
use crate::discovery::gdrive::folder_id_from_url;
use crate::discovery::{ExplicitManifest, GoogleDriveFolder, HtmlIndex, LocalDirectory, OneDriveShare};
use crate::error::{LoaderError, TransportError};

pub fn is_onedrive_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("sharepoint") || lower.contains("1drv.ms") || lower.contains("onedrive")
}

pub fn is_google_drive_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains("drive.google.com")
}

/// Content type says HTML, or the body contains an `<html` tag.
pub fn looks_like_html(page: &FetchedPage) -> bool {
    let html_type = page
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false);
    html_type || page.body.to_ascii_lowercase().contains("<html")
}

pub async fn select(
    root: &str,
    session: &ProviderSession,
    fetcher: Arc<dyn Fetch>,
) -> Result<Box<dyn ListingProvider>, LoaderError> {
    if is_url(root) {
        select_remote(root, session, fetcher).await
    } else {
        select_local(root)
    }
}

async fn select_remote(
    root: &str,
    session: &ProviderSession,
    fetcher: Arc<dyn Fetch>,
) -> Result<Box<dyn ListingProvider>, LoaderError> {
    if is_onedrive_url(root) {
        let token = session
            .onedrive_token
            .clone()
            .ok_or(LoaderError::MissingCredential { provider: "OneDrive" })?;
        info!(root, "[SELECT] Detected OneDrive/SharePoint URL: processing via Microsoft Graph");
        return Ok(Box::new(OneDriveShare::new(
            root,
            token,
            session.graph_api_base.clone(),
            fetcher,
        )));
    }

    if is_google_drive_url(root) {
        let token = session
            .gdrive_token
            .clone()
            .ok_or(LoaderError::MissingCredential {
                provider: "Google Drive",
            })?;
        let folder_id = folder_id_from_url(root).ok_or_else(|| {
            LoaderError::UnrecognizedSource(format!(
                "could not determine Google Drive folder id from {root}"
            ))
        })?;
        info!(root, folder_id = %folder_id, "[SELECT] Detected Google Drive URL: processing via Drive API");
        return Ok(Box::new(GoogleDriveFolder::new(
            folder_id,
            token,
            session.drive_api_base.clone(),
            fetcher,
        )));
    }

    let probe_error = |source| LoaderError::ListingUnavailable {
        locator: root.to_string(),
        source,
    };
    let page = fetcher
        .fetch_page(&RemoteTarget::new(root))
        .await
        .map_err(probe_error)?
        .ensure_success()
        .map_err(probe_error)?;

    if looks_like_html(&page) {
        info!(root, "[SELECT] Detected HTML index; processing as folder listing");
        return Ok(Box::new(HtmlIndex::new(root, fetcher)));
    }

    match serde_json::from_str::<Value>(&page.body) {
        Ok(value @ Value::Array(_)) => {
            info!(root, "[SELECT] Detected JSON manifest");
            Ok(Box::new(ExplicitManifest::from_value(root, value)?))
        }
        Ok(_) => Err(LoaderError::MalformedManifest(format!(
            "{root}: manifest JSON must be an array of entries"
        ))),
        Err(_) => Err(LoaderError::UnrecognizedSource(format!(
            "{root} is neither an HTML index nor a JSON manifest"
        ))),
    }
}

fn select_local(root: &str) -> Result<Box<dyn ListingProvider>, LoaderError> {
    let path = Path::new(root);
    if path.is_dir() {
        info!(root, "[SELECT] Detected local datasets folder");
        return Ok(Box::new(LocalDirectory::new(path)));
    }
    if path.is_file() {
        let text = std::fs::read_to_string(path).map_err(|e| LoaderError::ListingUnavailable {
            locator: root.to_string(),
            source: TransportError::Io(e),
        })?;
        info!(root, "[SELECT] Detected local manifest file");
        return Ok(Box::new(ExplicitManifest::from_json(root, &text)?));
    }
    Err(LoaderError::UnrecognizedSource(format!(
        "{root} is not a URL or an existing local path"
    )))
}
