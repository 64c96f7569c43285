//! Explicit JSON manifests.
//!
//! ```json
//! [
//!   { "metadata_url": "https://example.com/datasets/foo.json", "file_url": "https://example.com/files/foo.zip" },
//!   { "metadata": { "datasetVersion": {} }, "file_url": "/local/path/to/bar.zip" }
//! ]
//! ```
//!
//! Each entry carries exactly one of `metadata` (inline object) or `metadata_url`
//! (URL or local path), and optionally `file_url`.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::info;

use crate::contract::{DatasetUnit, ListingProvider, Locator, MetadataSource, ProviderKind, UnitStream};
use crate::error::{DiscoveryError, LoaderError};

pub struct ExplicitManifest {
    origin: String,
    entries: Vec<Value>,
}

impl ExplicitManifest {
    /// Parse manifest text; anything but a JSON array is `MalformedManifest`.
    pub fn from_json(origin: impl Into<String>, text: &str) -> Result<Self, LoaderError> {
        let origin = origin.into();
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LoaderError::MalformedManifest(format!("{origin}: {e}")))?;
        Self::from_value(origin, value)
    }

    pub fn from_value(origin: impl Into<String>, value: Value) -> Result<Self, LoaderError> {
        let origin = origin.into();
        match value {
            Value::Array(entries) => {
                info!(origin = %origin, entries = entries.len(), "[DISCOVER] Loaded manifest");
                Ok(Self { origin, entries })
            }
            _ => Err(LoaderError::MalformedManifest(format!(
                "{origin}: manifest JSON must be an array of entries"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn present<'a>(entry: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    entry.get(key).filter(|value| !value.is_null())
}

/// Turn manifest entry `index` (zero-based) into a unit.
pub fn entry_to_unit(index: usize, entry: &Value) -> Result<DatasetUnit, DiscoveryError> {
    let invalid = |detail: &str| DiscoveryError::InvalidEntry {
        index: index + 1,
        detail: detail.to_string(),
    };
    let Value::Object(entry) = entry else {
        return Err(invalid("entry is not an object"));
    };

    let metadata = match (present(entry, "metadata"), present(entry, "metadata_url")) {
        (Some(_), Some(_)) => {
            return Err(invalid("entry has both \"metadata\" and \"metadata_url\""))
        }
        (Some(inline @ Value::Object(_)), None) => MetadataSource::Inline(inline.clone()),
        (Some(_), None) => return Err(invalid("\"metadata\" must be an object")),
        (None, Some(Value::String(url))) if !url.trim().is_empty() => {
            MetadataSource::Locator(Locator::parse(url.trim()))
        }
        (None, Some(_)) => return Err(invalid("\"metadata_url\" must be a non-empty string")),
        (None, None) => {
            return Err(invalid(
                "entry must include either \"metadata\" or \"metadata_url\"",
            ))
        }
    };

    let file = match present(entry, "file_url") {
        None => None,
        Some(Value::String(url)) if url.trim().is_empty() => None,
        Some(Value::String(url)) => Some(Locator::parse(url.trim())),
        Some(_) => return Err(invalid("\"file_url\" must be a string")),
    };

    let label = match &metadata {
        MetadataSource::Locator(locator) => format!("entry {} ({locator})", index + 1),
        MetadataSource::Inline(_) => format!("entry {}", index + 1),
    };
    Ok(DatasetUnit {
        label,
        metadata,
        file,
        marker_dir: None,
    })
}

#[async_trait]
impl ListingProvider for ExplicitManifest {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ExplicitManifest
    }

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError> {
        info!(origin = %self.origin, entries = self.entries.len(), "[DISCOVER] Enumerating manifest entries");
        let stream = futures::stream::iter(self.entries.iter().enumerate())
            .map(|(index, entry)| entry_to_unit(index, entry));
        Ok(stream.boxed())
    }
}
