//! High-level pipeline: orchestrates discover → create → clear → upload for one source.
//!
//! This module provides the top-level reconciliation logic for "synchronising" every dataset
//! unit yielded by a [`ListingProvider`] into the repository. For each unit, in discovery order:
//!   - Resolves the metadata document (inline, or via a [`TemporaryResource`])
//!   - Strips file-list fields and creates a fresh dataset under the session's collection
//!   - Clears whatever files the new dataset already lists
//!   - Uploads the unit's archive, when it has one
//!   - Records a [`UnitReport`] and pauses before the next unit
//!
//! # Major Types
//! - [`Reconciler`]: Drives a single unit through the state machine
//! - [`UnitResult`] / [`UnitState`]: Outcome and furthest state of one unit
//! - [`SynchroniseReport`]: Output report with every processed unit and every discovery skip
//!
//! # Responsibilities
//! - Unit failures never abort the run: only the root listing is fatal
//! - Strictly sequential: one unit at a time, steps in fixed order, no retries
//! - Temporary copies are released on every path, success or failure
//!
//! # Error Handling
//! Each failed step is mapped to a [`FailureReason`] on the unit's result. Delete problems are
//! warnings on the report. Only [`LoaderError`] from the provider escapes [`synchronise`].
//!
//! # Navigation
//! - Main entrypoint: [`synchronise`]
//! - Supporting types: [`Reconciler`], [`SynchroniseReport`].

use std::path::Path;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ProviderSession;
use crate::contract::{
    DatasetUnit, Fetch, ListingProvider, Locator, ProviderKind, RepositoryClient, UnitStream,
};
use crate::discovery::local::marker_file_name;
use crate::error::{DiscoveryError, FailureReason, LoaderError};
use crate::metadata::{load_metadata, prepare_payload};
use crate::temporary::TemporaryResource;

/// Version selector used when clearing a freshly created dataset.
pub const LATEST_VERSION: &str = ":latest";
/// Temporary-file suffix for archives whose locator has no extension.
pub const FALLBACK_SUFFIX: &str = ".dat";

/// Outcome of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitResult {
    /// Dataset created and, when requested, its file uploaded.
    Success(String),
    /// Dataset created but the upload step failed.
    PartialFailure(String, FailureReason),
    /// No dataset was created.
    Failure(FailureReason),
}

impl UnitResult {
    pub fn handle(&self) -> Option<&str> {
        match self {
            UnitResult::Success(handle) | UnitResult::PartialFailure(handle, _) => Some(handle),
            UnitResult::Failure(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitResult::Success(_))
    }
}

/// Per-unit states, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnitState {
    Pending,
    MetadataLoaded,
    Created,
    FilesCleared,
    Uploaded,
    UploadFailed,
    NoFileProvided,
    Done,
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub label: String,
    pub result: UnitResult,
    /// Non-fatal problems, e.g. files that could not be deleted.
    pub warnings: Vec<String>,
    /// States passed through, `Pending` first.
    pub states: Vec<UnitState>,
}

impl UnitReport {
    /// The furthest state the unit reached.
    pub fn reached(&self) -> UnitState {
        self.states.last().copied().unwrap_or(UnitState::Pending)
    }
}

#[derive(Debug)]
pub struct SynchroniseReport {
    pub provider: ProviderKind,
    /// One entry per processed unit, in discovery order.
    pub units: Vec<UnitReport>,
    /// Listing entries that never became units.
    pub skipped: Vec<DiscoveryError>,
}

impl SynchroniseReport {
    pub fn succeeded(&self) -> usize {
        self.units.iter().filter(|u| u.result.is_success()).count()
    }

    pub fn partially_failed(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.result, UnitResult::PartialFailure(..)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.units
            .iter()
            .filter(|u| matches!(u.result, UnitResult::Failure(_)))
            .count()
    }
}

/// Runs units against one repository with one fetcher.
pub struct Reconciler<'a, C: ?Sized, F: ?Sized> {
    session: &'a ProviderSession,
    client: &'a C,
    fetcher: &'a F,
}

impl<'a, C, F> Reconciler<'a, C, F>
where
    C: RepositoryClient + ?Sized,
    F: Fetch + ?Sized,
{
    pub fn new(session: &'a ProviderSession, client: &'a C, fetcher: &'a F) -> Self {
        Self {
            session,
            client,
            fetcher,
        }
    }

    /// Drive one unit from `Pending` to a final result.
    pub async fn process(&self, unit: &DatasetUnit) -> UnitReport {
        let mut states = vec![UnitState::Pending];
        let mut warnings = Vec::new();
        let result = self.reconcile(unit, &mut states, &mut warnings).await;

        if let (UnitResult::Success(handle), Some(dir)) = (&result, &unit.marker_dir) {
            if let Err(warning) = write_marker(dir, &unit.label, handle).await {
                warn!(unit = %unit.label, warning = %warning, "[SYNC] Could not write processed marker");
                warnings.push(warning);
            }
        }
        if result.handle().is_some() {
            states.push(UnitState::Done);
        }

        UnitReport {
            label: unit.label.clone(),
            result,
            warnings,
            states,
        }
    }

    async fn reconcile(
        &self,
        unit: &DatasetUnit,
        states: &mut Vec<UnitState>,
        warnings: &mut Vec<String>,
    ) -> UnitResult {
        info!(unit = %unit.label, "[SYNC] Processing dataset unit");

        let metadata = match load_metadata(self.fetcher, &unit.metadata).await {
            Ok(metadata) => metadata,
            Err(reason) => {
                error!(unit = %unit.label, error = %reason, "[SYNC][ERROR] Could not load metadata");
                return UnitResult::Failure(reason);
            }
        };
        states.push(UnitState::MetadataLoaded);

        let payload = prepare_payload(metadata);
        let handle = match self.create(&payload).await {
            Ok(handle) => handle,
            Err(reason) => {
                error!(unit = %unit.label, error = %reason, "[SYNC][ERROR] create_dataset failed");
                return UnitResult::Failure(reason);
            }
        };
        info!(unit = %unit.label, handle = %handle, "[SYNC][UPLOAD] Dataset created");
        states.push(UnitState::Created);

        self.clear_files(&handle, warnings).await;
        states.push(UnitState::FilesCleared);

        let Some(locator) = &unit.file else {
            info!(unit = %unit.label, handle = %handle, "[SYNC] No file provided; dataset has metadata only");
            states.push(UnitState::NoFileProvided);
            return UnitResult::Success(handle);
        };
        match self.upload(&handle, locator).await {
            Ok(()) => {
                info!(unit = %unit.label, handle = %handle, "[SYNC][UPLOAD] File uploaded");
                states.push(UnitState::Uploaded);
                UnitResult::Success(handle)
            }
            Err(reason) => {
                error!(unit = %unit.label, handle = %handle, error = %reason, "[SYNC][ERROR][UPLOAD] File upload failed");
                states.push(UnitState::UploadFailed);
                UnitResult::PartialFailure(handle, reason)
            }
        }
    }

    async fn create(&self, payload: &Value) -> Result<String, FailureReason> {
        let response = self
            .client
            .create_dataset(&self.session.collection_alias, payload)
            .await
            .map_err(|e| FailureReason::CreateRejected(e.to_string()))?;
        match (response.status, response.persistent_id) {
            (201, Some(handle)) if !handle.is_empty() => Ok(handle),
            (201, _) => Err(FailureReason::CreateRejected(format!(
                "status 201 without a persistent id: {}",
                response.body
            ))),
            (status, _) => Err(FailureReason::CreateRejected(format!(
                "status {status}: {}",
                response.body
            ))),
        }
    }

    /// Delete every file the dataset currently lists. Problems become warnings.
    async fn clear_files(&self, handle: &str, warnings: &mut Vec<String>) {
        let listing = match self.client.list_files(handle, LATEST_VERSION).await {
            Ok(listing) if (200..300).contains(&listing.status) => listing,
            Ok(listing) => {
                let warning = format!("could not list files of {handle}: status {}", listing.status);
                warn!(handle, status = listing.status, "[SYNC] File listing rejected; skipping clear");
                warnings.push(warning);
                return;
            }
            Err(e) => {
                warn!(handle, error = %e, "[SYNC] File listing failed; skipping clear");
                warnings.push(format!("could not list files of {handle}: {e}"));
                return;
            }
        };

        debug!(handle, count = listing.files.len(), "[SYNC] Clearing existing files");
        for file in &listing.files {
            if file.id.is_empty() {
                warn!(handle, label = ?file.label, "[SYNC] File descriptor without id");
                warnings.push(format!(
                    "file {} has no id and was not deleted",
                    file.label.as_deref().unwrap_or("<unnamed>")
                ));
                continue;
            }
            match self.client.delete_file(&file.id).await {
                Ok(response) if matches!(response.status, 200 | 204) => {
                    debug!(handle, file_id = %file.id, "[SYNC] Deleted file");
                }
                Ok(response) => {
                    warn!(handle, file_id = %file.id, status = response.status, "[SYNC] File delete rejected");
                    warnings.push(format!(
                        "delete of file {} returned status {}",
                        file.id, response.status
                    ));
                }
                Err(e) => {
                    warn!(handle, file_id = %file.id, error = %e, "[SYNC] File delete failed");
                    warnings.push(format!("delete of file {} failed: {e}", file.id));
                }
            }
        }
    }

    async fn upload(&self, handle: &str, locator: &Locator) -> Result<(), FailureReason> {
        let suffix = locator
            .suffix()
            .unwrap_or_else(|| FALLBACK_SUFFIX.to_string());
        let resource = TemporaryResource::acquire(self.fetcher, locator, Some(&suffix))
            .await
            .map_err(|e| FailureReason::UploadRejected(format!("archive unavailable: {locator}: {e}")))?;
        info!(handle, origin = %resource.origin(), bytes = resource.len(), "[SYNC][UPLOAD] Uploading file");

        let outcome = self.client.upload_file(handle, resource.path()).await;
        let _ = resource.close();

        match outcome {
            Ok(response) if matches!(response.status, 200 | 201) => Ok(()),
            Ok(response) => Err(FailureReason::UploadRejected(format!(
                "status {}: {}",
                response.status, response.body
            ))),
            Err(e) => Err(FailureReason::UploadRejected(e.to_string())),
        }
    }

    /// Process every unit of `units` in order, pausing after each one.
    pub async fn run(&self, provider: ProviderKind, mut units: UnitStream<'_>) -> SynchroniseReport {
        let mut report = SynchroniseReport {
            provider,
            units: Vec::new(),
            skipped: Vec::new(),
        };

        while let Some(item) = units.next().await {
            match item {
                Ok(unit) => {
                    let unit_report = self.process(&unit).await;
                    report.units.push(unit_report);
                    if !self.session.inter_unit_pause.is_zero() {
                        tokio::time::sleep(self.session.inter_unit_pause).await;
                    }
                }
                Err(skip) => {
                    warn!(error = %skip, "[SYNC] Skipping listing entry");
                    report.skipped.push(skip);
                }
            }
        }
        report
    }
}

async fn write_marker(dir: &Path, label: &str, handle: &str) -> Result<(), String> {
    let path = dir.join(marker_file_name(label));
    tokio::fs::write(&path, handle)
        .await
        .map_err(|e| format!("could not write marker {}: {e}", path.display()))?;
    debug!(marker = %path.display(), "[SYNC] Wrote processed marker");
    Ok(())
}

/// Entrypoint: reconcile every unit `provider` yields into the repository.
pub async fn synchronise<C, F>(
    session: &ProviderSession,
    client: &C,
    fetcher: &F,
    provider: &dyn ListingProvider,
) -> Result<SynchroniseReport, LoaderError>
where
    C: RepositoryClient + ?Sized,
    F: Fetch + ?Sized,
{
    info!(provider = %provider.kind(), collection = %session.collection_alias, "[SYNC] Starting synchronisation");
    let units = provider.units().await.map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Root listing failed");
        e
    })?;

    let report = Reconciler::new(session, client, fetcher)
        .run(provider.kind(), units)
        .await;
    info!(
        processed = report.units.len(),
        succeeded = report.succeeded(),
        partial = report.partially_failed(),
        failed = report.failed(),
        skipped = report.skipped.len(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}
