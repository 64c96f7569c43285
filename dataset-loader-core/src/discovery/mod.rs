//! Listing providers: one discovery strategy per source kind.
//!
//! Every provider implements [`crate::contract::ListingProvider`]. The variant
//! for a root locator is chosen once by [`crate::select::select`].

pub mod gdrive;
pub mod html;
pub mod local;
pub mod manifest;
pub mod onedrive;

pub use gdrive::GoogleDriveFolder;
pub use html::HtmlIndex;
pub use local::LocalDirectory;
pub use manifest::ExplicitManifest;
pub use onedrive::OneDriveShare;

/// What a listing entry holds, judged by its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Metadata,
    Archive,
    Other,
}

impl EntryKind {
    pub(crate) fn of(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".json") {
            EntryKind::Metadata
        } else if lower.ends_with(".zip") {
            EntryKind::Archive
        } else {
            EntryKind::Other
        }
    }
}
