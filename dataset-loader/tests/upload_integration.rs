use dataset_loader::upload::DataverseClient;
use dataset_loader_core::contract::{FileDescriptor, RepositoryClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> DataverseClient {
    DataverseClient::new(server.uri(), "dv-token", Duration::from_secs(5))
        .expect("Failed to create client")
}

#[tokio::test]
async fn test_create_dataset_returns_persistent_id() {
    let server = MockServer::start().await;
    let metadata = json!({"datasetVersion": {"metadataBlocks": {}}});
    Mock::given(method("POST"))
        .and(path("/api/dataverses/field-data/datasets"))
        .and(header("X-Dataverse-key", "dv-token"))
        .and(body_json(&metadata))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "OK",
            "data": {"id": 7, "persistentId": "doi:10.5072/FK2/NEW"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .create_dataset("field-data", &metadata)
        .await
        .expect("request should complete");

    assert_eq!(response.status, 201);
    assert_eq!(response.persistent_id.as_deref(), Some("doi:10.5072/FK2/NEW"));
}

#[tokio::test]
async fn test_rejected_create_is_a_status_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let response = client(&server)
        .create_dataset("root", &json!({}))
        .await
        .expect("a 403 is still a response");

    assert_eq!(response.status, 403);
    assert_eq!(response.persistent_id, None);
    assert_eq!(response.body, json!("forbidden"));
}

#[tokio::test]
async fn test_list_and_delete_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/datasets/:persistentId/versions/:latest/files"))
        .and(query_param("persistentId", "doi:10.5072/FK2/ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "data": [
                {"label": "a.zip", "dataFile": {"id": 11}},
                {"label": "b.csv", "dataFile": {"id": 12}}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/files/11"))
        .and(header("X-Dataverse-key", "dv-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let listing = client
        .list_files("doi:10.5072/FK2/ABC", ":latest")
        .await
        .unwrap();
    assert_eq!(listing.status, 200);
    assert_eq!(
        listing.files[0],
        FileDescriptor {
            id: "11".into(),
            label: Some("a.zip".into())
        }
    );
    assert_eq!(listing.files.len(), 2);

    let deleted = client.delete_file("11").await.unwrap();
    assert_eq!(deleted.status, 204);
}

#[tokio::test]
async fn test_upload_sends_multipart_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/datasets/:persistentId/add"))
        .and(query_param("persistentId", "doi:10.5072/FK2/UP"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"archive.zip\""))
        .and(body_string_contains("zip-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("archive.zip");
    std::fs::write(&archive, b"zip-bytes").unwrap();

    let response = client(&server)
        .upload_file("doi:10.5072/FK2/UP", &archive)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let client = DataverseClient::new("http://127.0.0.1:9", "dv-token", Duration::from_secs(2)).unwrap();
    assert!(client.create_dataset("root", &json!({})).await.is_err());
}
