//! Scoped local copies of remote or local resources.
//!
//! A [`TemporaryResource`] owns a `tempfile::NamedTempFile`. The file is removed
//! exactly once: when the guard is dropped, or earlier via [`TemporaryResource::close`].
//! If acquisition fails halfway through a download, the partially written file is
//! dropped (and removed) before the error is returned.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::contract::{Fetch, Locator};
use crate::error::TransportError;

#[derive(Debug)]
pub struct TemporaryResource {
    file: NamedTempFile,
    origin: String,
    bytes: u64,
}

impl TemporaryResource {
    /// Materialise `locator` as a local temporary file.
    ///
    /// `suffix_hint` wins over the locator's own extension; with neither, the file has no suffix.
    /// URLs go through `fetcher` (streamed); local paths are copied so the caller
    /// never holds the original.
    pub async fn acquire<F>(
        fetcher: &F,
        locator: &Locator,
        suffix_hint: Option<&str>,
    ) -> Result<Self, TransportError>
    where
        F: Fetch + ?Sized,
    {
        let suffix = suffix_hint
            .map(str::to_owned)
            .or_else(|| locator.suffix())
            .unwrap_or_default();
        let file = tempfile::Builder::new()
            .prefix("dataset-loader-")
            .suffix(&suffix)
            .tempfile()?;

        let bytes = match locator {
            Locator::Url(target) => fetcher.download_to(target, file.path()).await?,
            Locator::Path(source) => match tokio::fs::copy(source, file.path()).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(TransportError::NotFound(source.clone()))
                }
                Err(e) => return Err(TransportError::Io(e)),
            },
        };

        debug!(origin = %locator, temp = %file.path().display(), bytes, "[FETCH] Acquired temporary resource");
        Ok(Self {
            file,
            origin: locator.to_string(),
            bytes,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Where the content came from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Release the storage now and surface any removal error.
    pub fn close(self) -> io::Result<()> {
        let origin = self.origin;
        self.file.close().map_err(|e| {
            warn!(error = ?e, origin = %origin, "[FETCH] Failed to remove temporary resource");
            e
        })
    }
}
