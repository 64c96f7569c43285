use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dataset_loader_core::contract::{
    DatasetUnit, Fetch, ListingProvider, Locator, MetadataSource, RemoteTarget,
};
use dataset_loader_core::discovery::onedrive::share_id;
use dataset_loader_core::discovery::{GoogleDriveFolder, HtmlIndex, OneDriveShare};
use dataset_loader_core::download::HttpFetcher;
use dataset_loader_core::error::{DiscoveryError, LoaderError};

fn fetcher() -> Arc<dyn Fetch> {
    Arc::new(HttpFetcher::new(Duration::from_secs(5)).expect("client should build"))
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_string(format!("<html><body>{body}</body></html>"))
}

async fn collect(provider: &dyn ListingProvider) -> Vec<Result<DatasetUnit, DiscoveryError>> {
    provider.units().await.expect("root listing").collect().await
}

#[tokio::test]
async fn test_html_index_reads_each_subfolder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/datasets/"))
        .respond_with(html(
            r#"<a href="../">Parent Directory</a>
               <a href="?C=M;O=A">Last modified</a>
               <a href="alpha/">alpha/</a>
               <a href="beta/">beta/</a>
               <a href="gamma/">gamma/</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/alpha/"))
        .respond_with(html(
            r#"<a href="meta.json">meta.json</a><a href="data.zip">data.zip</a><a href="other.zip">other.zip</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/beta/"))
        .respond_with(html(r#"<a href="readme.txt">readme.txt</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/gamma/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let root = format!("{}/datasets/", server.uri());
    let items = collect(&HtmlIndex::new(root.clone(), fetcher())).await;

    assert_eq!(items.len(), 3);
    let alpha = items[0].as_ref().unwrap();
    assert_eq!(
        alpha.metadata,
        MetadataSource::Locator(Locator::Url(RemoteTarget::new(format!("{root}alpha/meta.json"))))
    );
    assert_eq!(
        alpha.file,
        Some(Locator::Url(RemoteTarget::new(format!("{root}alpha/data.zip"))))
    );
    assert!(matches!(&items[1], Err(DiscoveryError::MissingMetadata(location)) if location.ends_with("beta/")));
    assert!(matches!(&items[2], Err(DiscoveryError::SubListingUnavailable { .. })));
}

#[tokio::test]
async fn test_html_flat_listing_pairs_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flat/"))
        .respond_with(html(
            r#"<a href="a.json">a.json</a><a href="a.zip">a.zip</a><a href="b.json">b.json</a><a href="c.zip">c.zip</a>"#,
        ))
        .mount(&server)
        .await;

    let root = format!("{}/flat/", server.uri());
    let items = collect(&HtmlIndex::new(root.clone(), fetcher())).await;

    let units: Vec<(String, bool)> = items
        .iter()
        .filter_map(|item| item.as_ref().ok())
        .map(|unit| (unit.label.clone(), unit.file.is_some()))
        .collect();
    assert_eq!(
        units,
        [(format!("{root}a.json"), true), (format!("{root}b.json"), false)]
    );
    assert_eq!(
        items.last().unwrap(),
        &Err(DiscoveryError::UnpairedArchive(format!("{root}c.zip")))
    );
}

#[tokio::test]
async fn test_html_links_resolve_against_redirected_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/datasets"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/datasets/", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/datasets/"))
        .respond_with(html(r#"<a href="a.json">a.json</a><a href="a.zip">a.zip</a>"#))
        .mount(&server)
        .await;

    let page = fetcher()
        .fetch_page(&RemoteTarget::new(format!("{}/datasets", server.uri())))
        .await
        .unwrap();
    assert_eq!(page.url, format!("{}/datasets/", server.uri()));

    let items = collect(&HtmlIndex::new(format!("{}/datasets", server.uri()), fetcher())).await;
    let unit = items[0].as_ref().unwrap();
    assert_eq!(unit.label, format!("{}/datasets/a.json", server.uri()));
    assert_eq!(
        unit.file,
        Some(Locator::Url(RemoteTarget::new(format!("{}/datasets/a.zip", server.uri()))))
    );
}

#[tokio::test]
async fn test_html_root_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let provider = HtmlIndex::new(format!("{}/missing/", server.uri()), fetcher());
    let err = provider.units().await.err().unwrap();
    assert!(matches!(err, LoaderError::ListingUnavailable { .. }));
}

#[tokio::test]
async fn test_drive_folder_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(header("authorization", "Bearer drive-token"))
        .and(query_param("q", "'folder1' in parents and trashed=false"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [
                {"id": "m1", "name": "meta.json", "mimeType": "application/json"},
                {"id": "n1", "name": "notes.txt", "mimeType": "text/plain"}
            ],
            "nextPageToken": "p2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "z1", "name": "DATA.ZIP", "mimeType": "application/zip"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let folder = GoogleDriveFolder::new("folder1", "drive-token", server.uri(), fetcher());
    let items = collect(&folder).await;

    assert_eq!(items.len(), 2);
    let meta = items[0].as_ref().unwrap();
    assert_eq!(meta.label, "meta.json");
    assert_eq!(
        meta.metadata,
        MetadataSource::Locator(Locator::Url(RemoteTarget::with_bearer(
            format!("{}/files/m1?alt=media", server.uri()),
            Some("drive-token".into())
        )))
    );
    let archive = items[1].as_ref().unwrap();
    assert!(matches!(archive.metadata, MetadataSource::Inline(_)));
    assert!(archive.file.is_some());
}

#[tokio::test]
async fn test_drive_rejected_token_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let folder = GoogleDriveFolder::new("folder1", "stale", server.uri(), fetcher());
    let err = folder.units().await.err().unwrap();
    assert!(matches!(
        err,
        LoaderError::InvalidCredential { provider: "Google Drive", status: 401 }
    ));
}

#[tokio::test]
async fn test_onedrive_share_follows_next_link() {
    let server = MockServer::start().await;
    let share_url = "https://contoso.sharepoint.com/:f:/g/personal/data/EgdcQ";
    let children_path = format!("/shares/{}/driveItem/children", share_id(share_url));

    Mock::given(method("GET"))
        .and(path(children_path.as_str()))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "1", "name": "meta.json", "@microsoft.graph.downloadUrl": "https://cdn.example/meta.json"}
            ],
            "@odata.nextLink": format!("{}/page2", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .and(header("authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"id": "2", "name": "data.zip"},
                {"id": "3", "name": "photo.png"}
            ]
        })))
        .mount(&server)
        .await;

    let share = OneDriveShare::new(share_url, "graph-token", server.uri(), fetcher());
    let items = collect(&share).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().label, "meta.json");
    let archive = items[1].as_ref().unwrap();
    assert_eq!(
        archive.file,
        Some(Locator::Url(RemoteTarget::with_bearer(
            format!("{}/shares/{}/driveItem/items/2/content", server.uri(), share_id(share_url)),
            Some("graph-token".into())
        )))
    );
}

#[tokio::test]
async fn test_download_streams_archive_to_disk() {
    let server = MockServer::start().await;
    let payload = vec![7u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/files/big.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("big.zip");
    let written = fetcher()
        .download_to(&RemoteTarget::new(format!("{}/files/big.zip", server.uri())), &dest)
        .await
        .unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}
