//! Error taxonomy for discovery and reconciliation.
//!
//! Errors are split by how far they reach:
//! - [`LoaderError`] stops the whole run before any unit is processed.
//! - [`DiscoveryError`] skips a single listing entry; the run continues.
//! - [`FailureReason`] explains why a single unit failed or only partially succeeded.
//! - [`TransportError`] is raised at network and filesystem boundaries and is always
//!   mapped onto one of the above before it leaves a unit.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal, run-level errors.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// A provider was detected but the token it needs was not supplied.
    #[error("{provider} source detected but no {provider} token was provided")]
    MissingCredential { provider: &'static str },

    /// The provider rejected the supplied token.
    #[error("{provider} rejected the supplied token (status {status})")]
    InvalidCredential { provider: &'static str, status: u16 },

    #[error("Unrecognized source: {0}")]
    UnrecognizedSource(String),

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    /// The root listing could not be fetched.
    #[error("Could not list {locator}: {source}")]
    ListingUnavailable {
        locator: String,
        #[source]
        source: TransportError,
    },
}

/// A listing entry that could not be turned into a dataset unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No metadata (.json) found in {0}")]
    MissingMetadata(String),

    #[error("Ambiguous dataset unit in {location}: {detail}")]
    AmbiguousUnit { location: String, detail: String },

    #[error("Archive {0} has no metadata with a matching name")]
    UnpairedArchive(String),

    #[error("Invalid manifest entry {index}: {detail}")]
    InvalidEntry { index: usize, detail: String },

    #[error("Could not read sub-listing {location}: {detail}")]
    SubListingUnavailable { location: String, detail: String },

    #[error("No download URL for {0}")]
    NoDownloadUrl(String),
}

/// Why a unit did not reach `Done` cleanly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("create rejected: {0}")]
    CreateRejected(String),

    #[error("upload rejected: {0}")]
    UploadRejected(String),
}

/// Network or filesystem failure at a fetch boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Local file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unexpected response from {url}: {detail}")]
    Decode { url: String, detail: String },
}
