//! Dataset folders on the local filesystem.
//!
//! The root holds one subdirectory per dataset. Each holds exactly one metadata
//! document (`*.json`) and at most one archive (`*.zip`). A folder that already
//! contains a `.uploaded_*` marker was handled by an earlier run and is skipped.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use super::EntryKind;
use crate::contract::{DatasetUnit, ListingProvider, Locator, MetadataSource, ProviderKind, UnitStream};
use crate::error::{DiscoveryError, LoaderError, TransportError};

pub const MARKER_PREFIX: &str = ".uploaded_";

/// Name of the marker the engine writes into a fully processed folder.
pub fn marker_file_name(label: &str) -> String {
    let safe: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{MARKER_PREFIX}{safe}")
}

pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ListingProvider for LocalDirectory {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LocalDirectory
    }

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError> {
        let entries = fs::read_dir(&self.root).map_err(|e| LoaderError::ListingUnavailable {
            locator: self.root.display().to_string(),
            source: TransportError::Io(e),
        })?;

        let mut folders: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();
        info!(root = %self.root.display(), folders = folders.len(), "[DISCOVER] Found dataset folders");

        let stream = futures::stream::iter(folders)
            .filter_map(|folder| futures::future::ready(scan_folder(&folder)));
        Ok(stream.boxed())
    }
}

/// `None` means the folder was already processed.
fn scan_folder(folder: &Path) -> Option<Result<DatasetUnit, DiscoveryError>> {
    let label = folder
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string());

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            return Some(Err(DiscoveryError::SubListingUnavailable {
                location: folder.display().to_string(),
                detail: e.to_string(),
            }))
        }
    };

    let mut names: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    names.sort();

    if let Some((marker, _)) = names.iter().find(|(name, _)| name.starts_with(MARKER_PREFIX)) {
        info!(folder = %label, marker = %marker, "[DISCOVER] Skipping folder: marker found");
        return None;
    }

    let mut metadata = Vec::new();
    let mut archives = Vec::new();
    for (name, path) in names {
        if !path.is_file() {
            continue;
        }
        match EntryKind::of(&name) {
            EntryKind::Metadata => metadata.push(path),
            EntryKind::Archive => archives.push(path),
            EntryKind::Other => debug!(folder = %label, file = %name, "[DISCOVER] Ignoring file"),
        }
    }

    if metadata.len() > 1 {
        return Some(Err(DiscoveryError::AmbiguousUnit {
            location: label,
            detail: format!("{} metadata files", metadata.len()),
        }));
    }
    if archives.len() > 1 {
        return Some(Err(DiscoveryError::AmbiguousUnit {
            location: label,
            detail: format!("{} archives", archives.len()),
        }));
    }
    let Some(metadata_path) = metadata.pop() else {
        return Some(Err(DiscoveryError::MissingMetadata(label)));
    };
    if archives.is_empty() {
        info!(folder = %label, "[DISCOVER] No archive in folder; dataset will be created without files");
    }

    Some(Ok(DatasetUnit {
        label,
        metadata: MetadataSource::Locator(Locator::Path(metadata_path)),
        file: archives.pop().map(Locator::Path),
        marker_dir: Some(folder.to_path_buf()),
    }))
}
