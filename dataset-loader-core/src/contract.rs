//! # contract: seams between discovery, reconciliation and the outside world
//!
//! This module defines the traits and plain data types that every other module
//! in the crate is written against:
//!
//! - [`RepositoryClient`]: the four repository publish operations the engine needs
//!   (create a dataset, list its files, delete a file, upload a file).
//! - [`Fetch`]: the transport capability (fetch a page, stream a URL to disk).
//! - [`ListingProvider`]: a source-specific discovery strategy yielding [`DatasetUnit`]s.
//!
//! ## Mocking & Testing
//! - `RepositoryClient` and `Fetch` are annotated for `mockall`; the generated
//!   `MockRepositoryClient` and `MockFetch` are exported behind the
//!   `test-export-mocks` feature so downstream crates can use them in tests.
//!
//! ## Status codes
//! Repository responses carry the raw HTTP status. The engine, not the client,
//! decides what counts as success, so clients only return `Err` when no response
//! was obtained at all.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::BoxStream;
use mockall::automock;

use crate::error::{DiscoveryError, LoaderError, TransportError};

/// Boxed error for repository transport failures.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Response to a dataset creation request.
#[derive(Debug, Clone)]
pub struct CreateResponse {
    pub status: u16,
    /// Persistent identifier assigned by the repository, when creation succeeded.
    pub persistent_id: Option<String>,
    /// Raw response body, kept for diagnostics.
    pub body: serde_json::Value,
}

/// A file currently attached to a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Opaque repository file identifier.
    pub id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileListing {
    pub status: u16,
    pub files: Vec<FileDescriptor>,
}

/// Response carrying only a status and a diagnostic body.
#[derive(Debug, Clone)]
pub struct StatusResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

/// The repository publish API as consumed by the reconciliation engine.
///
/// Implemented by the real Dataverse client in the CLI crate and by mocks in tests.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Create a dataset under `collection_alias` from a metadata payload.
    async fn create_dataset(
        &self,
        collection_alias: &str,
        metadata: &serde_json::Value,
    ) -> Result<CreateResponse, ClientError>;

    /// List the files of dataset `handle` in the given version (e.g. `:latest`).
    async fn list_files(&self, handle: &str, version: &str) -> Result<FileListing, ClientError>;

    /// Delete a single file by its repository identifier.
    async fn delete_file(&self, file_id: &str) -> Result<StatusResponse, ClientError>;

    /// Upload a local file into dataset `handle`.
    async fn upload_file(&self, handle: &str, path: &Path) -> Result<StatusResponse, ClientError>;
}

/// A URL plus the bearer token to present when fetching it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub url: String,
    pub bearer: Option<String>,
}

impl RemoteTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer: None,
        }
    }

    pub fn with_bearer(url: impl Into<String>, bearer: Option<String>) -> Self {
        Self {
            url: url.into(),
            bearer,
        }
    }
}

/// Where a metadata document or archive lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Url(RemoteTarget),
    Path(PathBuf),
}

impl Locator {
    /// `http://` and `https://` strings are URLs, anything else is a local path.
    pub fn parse(raw: &str) -> Self {
        if is_url(raw) {
            Locator::Url(RemoteTarget::new(raw))
        } else {
            Locator::Path(PathBuf::from(raw))
        }
    }

    /// File extension of the locator including the leading dot, if it has one.
    pub fn suffix(&self) -> Option<String> {
        let path = match self {
            Locator::Url(target) => match url::Url::parse(&target.url) {
                Ok(parsed) => PathBuf::from(parsed.path()),
                Err(_) => PathBuf::from(&target.url),
            },
            Locator::Path(path) => path.clone(),
        };
        path.extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!(".{ext}"))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Url(target) => write!(f, "{}", target.url),
            Locator::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

pub fn is_url(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

/// The metadata half of a dataset unit.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataSource {
    Inline(serde_json::Value),
    Locator(Locator),
}

/// One (metadata, optional archive) pair slated for one create/replace cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetUnit {
    /// Human-readable identity used in logs and report lines.
    pub label: String,
    pub metadata: MetadataSource,
    pub file: Option<Locator>,
    /// Directory that receives the "processed" marker once the unit fully succeeds.
    pub marker_dir: Option<PathBuf>,
}

/// A page fetched by [`Fetch::fetch_page`]. Non-2xx responses are returned, not raised.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx page into a [`TransportError::Status`].
    pub fn ensure_success(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                url: self.url,
                status: self.status,
            })
        }
    }
}

/// Transport capability used by providers and temporary resources.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET a URL and return status, content type and body text.
    async fn fetch_page(&self, target: &RemoteTarget) -> Result<FetchedPage, TransportError>;

    /// Stream a URL into `dest`, returning the number of bytes written.
    /// A non-2xx response is an error.
    async fn download_to(&self, target: &RemoteTarget, dest: &Path) -> Result<u64, TransportError>;
}

/// Source kinds a root locator can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    LocalDirectory,
    HtmlIndex,
    GoogleDriveFolder,
    OneDriveShare,
    ExplicitManifest,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::LocalDirectory => "local directory",
            ProviderKind::HtmlIndex => "HTML index",
            ProviderKind::GoogleDriveFolder => "Google Drive folder",
            ProviderKind::OneDriveShare => "OneDrive share",
            ProviderKind::ExplicitManifest => "manifest",
        };
        f.write_str(name)
    }
}

/// Lazy sequence of discovered units. Per-entry problems are `Err` items, not stream ends.
pub type UnitStream<'a> = BoxStream<'a, Result<DatasetUnit, DiscoveryError>>;

/// A discovery strategy for one kind of source.
///
/// `units` performs the root listing, so errors that must stop the run surface
/// there; everything after it is produced lazily. Calling `units` again starts a
/// fresh enumeration.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError>;
}
