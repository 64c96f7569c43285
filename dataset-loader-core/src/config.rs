use std::time::Duration;

use tracing::{debug, info};

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_INTER_UNIT_PAUSE: Duration = Duration::from_secs(1);

/// Per-run configuration shared read-only by every component.
#[derive(Clone)]
pub struct ProviderSession {
    /// Repository base URL, e.g. `https://demo.borealisdata.ca`.
    pub base_url: String,
    /// Collection under which new datasets are filed.
    pub collection_alias: String,
    pub api_token: String,
    /// Microsoft Graph bearer token for OneDrive/SharePoint shares.
    pub onedrive_token: Option<String>,
    /// OAuth2 bearer token for Google Drive folders.
    pub gdrive_token: Option<String>,
    /// Per-call HTTP timeout.
    pub timeout: Duration,
    /// Fixed pause after each unit.
    pub inter_unit_pause: Duration,
    pub drive_api_base: String,
    pub graph_api_base: String,
}

impl ProviderSession {
    pub fn new(
        base_url: impl Into<String>,
        collection_alias: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            collection_alias: collection_alias.into(),
            api_token: api_token.into(),
            onedrive_token: None,
            gdrive_token: None,
            timeout: DEFAULT_TIMEOUT,
            inter_unit_pause: DEFAULT_INTER_UNIT_PAUSE,
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            graph_api_base: DEFAULT_GRAPH_API_BASE.to_string(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            collection_alias = %self.collection_alias,
            onedrive_token_set = self.onedrive_token.is_some(),
            gdrive_token_set = self.gdrive_token.is_some(),
            timeout_secs = self.timeout.as_secs(),
            "Loaded ProviderSession"
        );
        debug!(?self, "ProviderSession loaded (full debug)");
    }
}

// Tokens never reach the logs.
impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("base_url", &self.base_url)
            .field("collection_alias", &self.collection_alias)
            .field("api_token", &"<redacted>")
            .field("onedrive_token", &self.onedrive_token.as_ref().map(|_| "<redacted>"))
            .field("gdrive_token", &self.gdrive_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("inter_unit_pause", &self.inter_unit_pause)
            .field("drive_api_base", &self.drive_api_base)
            .field("graph_api_base", &self.graph_api_base)
            .finish()
    }
}
