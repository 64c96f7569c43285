//! Metadata documents: loading them from a [`MetadataSource`] and shaping the
//! payload submitted to `create_dataset`.
//!
//! The repository rejects inline file declarations from non-superusers, so
//! `files` and `dataFiles` never reach the create call; files are uploaded
//! separately once the dataset exists.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::contract::{Fetch, MetadataSource};
use crate::error::FailureReason;
use crate::temporary::TemporaryResource;

pub const DATASET_VERSION_KEY: &str = "datasetVersion";
pub const FILE_LIST_FIELDS: [&str; 2] = ["files", "dataFiles"];

/// Placeholder metadata for archives found without a paired metadata document.
pub fn synthetic_metadata() -> Value {
    json!({ "datasetVersion": { "metadataBlocks": {} } })
}

/// Build the create payload: keep only `datasetVersion` when present, then strip
/// every file-list field from it and from the top level.
pub fn prepare_payload(metadata: Value) -> Value {
    let mut payload = match metadata {
        Value::Object(mut document) => match document.remove(DATASET_VERSION_KEY) {
            Some(version) => {
                let mut only_version = Map::new();
                only_version.insert(DATASET_VERSION_KEY.to_string(), version);
                only_version
            }
            None => {
                warn!("Metadata has no datasetVersion section; submitting document as-is");
                document
            }
        },
        other => return other,
    };

    strip_file_lists(&mut payload, "top level");
    if let Some(Value::Object(version)) = payload.get_mut(DATASET_VERSION_KEY) {
        strip_file_lists(version, DATASET_VERSION_KEY);
    }
    Value::Object(payload)
}

fn strip_file_lists(object: &mut Map<String, Value>, scope: &str) {
    for field in FILE_LIST_FIELDS {
        if object.remove(field).is_some() {
            info!(field, scope, "Removed file list from dataset payload");
        }
    }
}

/// Resolve a metadata source to a JSON object.
pub async fn load_metadata<F>(fetcher: &F, source: &MetadataSource) -> Result<Value, FailureReason>
where
    F: Fetch + ?Sized,
{
    let document = match source {
        MetadataSource::Inline(document) => document.clone(),
        MetadataSource::Locator(locator) => {
            let resource = TemporaryResource::acquire(fetcher, locator, Some(".json"))
                .await
                .map_err(|e| FailureReason::MetadataUnavailable(format!("{locator}: {e}")))?;
            let bytes = tokio::fs::read(resource.path())
                .await
                .map_err(|e| FailureReason::MetadataUnavailable(format!("{locator}: {e}")))?;
            // Dropping `resource` releases the temporary copy on every path below.
            serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                FailureReason::MetadataUnavailable(format!("{locator}: invalid JSON: {e}"))
            })?
        }
    };

    if document.is_object() {
        Ok(document)
    } else {
        Err(FailureReason::MetadataUnavailable(
            "metadata document is not a JSON object".to_string(),
        ))
    }
}
