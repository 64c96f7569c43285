//! HTML directory-index pages (Apache/nginx autoindex and similar).
//!
//! Subdirectory links under the root are dataset folders: each is fetched and its
//! first `.json` and first `.zip` link form one unit. A flat listing with no
//! subdirectories pairs root-level `.json` and `.zip` links by filename stem.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use tracing::{info, warn};
use url::Url;

use super::EntryKind;
use crate::contract::{
    DatasetUnit, Fetch, ListingProvider, Locator, MetadataSource, ProviderKind, RemoteTarget,
    UnitStream,
};
use crate::error::{DiscoveryError, LoaderError, TransportError};

static ANCHOR_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("anchor pattern is valid")
});

/// Absolute http(s) targets of every anchor in `html`, fragments dropped,
/// deduplicated in first-seen order.
pub fn extract_links(base: &Url, html: &str) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for captures in ANCHOR_HREF_RE.captures_iter(html) {
        let Some(raw) = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))
        else {
            continue;
        };
        let href = raw.as_str().trim().replace("&amp;", "&");
        if href.is_empty() {
            continue;
        }
        let Ok(mut link) = base.join(&href) else {
            continue;
        };
        if !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        link.set_fragment(None);
        if seen.insert(link.as_str().to_owned()) {
            links.push(link);
        }
    }
    links
}

/// Links that look like subdirectories strictly beneath `root`.
/// Parent, self and sort-order links of index pages are excluded.
fn directory_links(root: &Url, links: &[Url]) -> Vec<Url> {
    let root_dir = as_directory(root);
    links
        .iter()
        .filter(|link| {
            link.path().ends_with('/')
                && link.origin() == root_dir.origin()
                && link.path().starts_with(root_dir.path())
                && link.path() != root_dir.path()
        })
        .cloned()
        .collect()
}

/// `root` with query and fragment dropped and a trailing `/` on its path.
fn as_directory(root: &Url) -> Url {
    let mut dir = root.clone();
    dir.set_query(None);
    dir.set_fragment(None);
    if !dir.path().ends_with('/') {
        let path = format!("{}/", dir.path());
        dir.set_path(&path);
    }
    dir
}

fn url_stem(link: &Url) -> Option<String> {
    Path::new(link.path())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}

fn first_of(kind: EntryKind, links: &[Url]) -> Option<Url> {
    links
        .iter()
        .find(|link| EntryKind::of(link.path()) == kind)
        .cloned()
}

/// Flat-listing pairing: each `.json` takes the `.zip` with the same stem.
/// Archives nobody claimed are reported, since a unit always needs metadata.
pub fn pair_flat_listing(links: &[Url]) -> Vec<Result<DatasetUnit, DiscoveryError>> {
    let metadata: Vec<&Url> = links
        .iter()
        .filter(|link| EntryKind::of(link.path()) == EntryKind::Metadata)
        .collect();
    let archives: Vec<&Url> = links
        .iter()
        .filter(|link| EntryKind::of(link.path()) == EntryKind::Archive)
        .collect();

    let mut claimed = HashSet::new();
    let mut items = Vec::new();
    for json in metadata {
        let stem = url_stem(json);
        let matched = archives
            .iter()
            .find(|zip| stem.is_some() && url_stem(zip) == stem)
            .copied();
        if let Some(zip) = matched {
            claimed.insert(zip.as_str().to_owned());
        }
        items.push(Ok(DatasetUnit {
            label: json.to_string(),
            metadata: MetadataSource::Locator(Locator::Url(RemoteTarget::new(json.as_str()))),
            file: matched.map(|zip| Locator::Url(RemoteTarget::new(zip.as_str()))),
            marker_dir: None,
        }));
    }
    for zip in archives {
        if !claimed.contains(zip.as_str()) {
            items.push(Err(DiscoveryError::UnpairedArchive(zip.to_string())));
        }
    }
    items
}

pub struct HtmlIndex {
    root: String,
    fetcher: Arc<dyn Fetch>,
}

impl HtmlIndex {
    pub fn new(root: impl Into<String>, fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }
}

async fn fetch_links(fetcher: &dyn Fetch, url: &str) -> Result<(Url, Vec<Url>), TransportError> {
    let page = fetcher
        .fetch_page(&RemoteTarget::new(url))
        .await?
        .ensure_success()?;
    let base = Url::parse(&page.url).map_err(|e| TransportError::Decode {
        url: page.url.clone(),
        detail: e.to_string(),
    })?;
    let links = extract_links(&base, &page.body);
    Ok((base, links))
}

async fn folder_unit(fetcher: &dyn Fetch, folder: Url) -> Result<DatasetUnit, DiscoveryError> {
    info!(folder = %folder, "[DISCOVER] Reading remote folder");
    let (_, links) = fetch_links(fetcher, folder.as_str()).await.map_err(|e| {
        warn!(folder = %folder, error = %e, "[DISCOVER] Could not read remote folder");
        DiscoveryError::SubListingUnavailable {
            location: folder.to_string(),
            detail: e.to_string(),
        }
    })?;

    let metadata = first_of(EntryKind::Metadata, &links)
        .ok_or_else(|| DiscoveryError::MissingMetadata(folder.to_string()))?;
    let archive = first_of(EntryKind::Archive, &links);
    if archive.is_none() {
        info!(folder = %folder, "[DISCOVER] No archive in remote folder; dataset will be created without files");
    }

    Ok(DatasetUnit {
        label: folder.to_string(),
        metadata: MetadataSource::Locator(Locator::Url(RemoteTarget::new(metadata.as_str()))),
        file: archive.map(|zip| Locator::Url(RemoteTarget::new(zip.as_str()))),
        marker_dir: None,
    })
}

#[async_trait]
impl ListingProvider for HtmlIndex {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HtmlIndex
    }

    async fn units(&self) -> Result<UnitStream<'_>, LoaderError> {
        let (base, links) = fetch_links(self.fetcher.as_ref(), &self.root)
            .await
            .map_err(|source| LoaderError::ListingUnavailable {
                locator: self.root.clone(),
                source,
            })?;

        let folders = directory_links(&base, &links);
        if folders.is_empty() {
            info!(root = %self.root, links = links.len(), "[DISCOVER] Flat listing; pairing files by name");
            return Ok(futures::stream::iter(pair_flat_listing(&links)).boxed());
        }

        info!(root = %self.root, folders = folders.len(), "[DISCOVER] Found remote dataset folders");
        let fetcher = Arc::clone(&self.fetcher);
        let stream = futures::stream::iter(folders).then(move |folder| {
            let fetcher = Arc::clone(&fetcher);
            async move { folder_unit(fetcher.as_ref(), folder).await }
        });
        Ok(stream.boxed())
    }
}
