use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tracing_subscriber::prelude::*; // needed for .with()
use tracing_subscriber::{layer::Context, Layer, Registry};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A binary invocation isolated from any `.env` or token in the developer's shell.
fn loader() -> Command {
    let mut cmd = Command::cargo_bin("dataset-loader").expect("Binary exists");
    cmd.env_remove("DATAVERSE_API_TOKEN");
    cmd
}

#[test]
fn sync_without_api_token_fails_before_any_work() {
    let workdir = tempdir().unwrap();
    loader()
        .current_dir(workdir.path())
        .args(["sync", "--source", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing Dataverse API token"));
}

#[test]
fn sync_sharepoint_without_onedrive_token_is_fatal() {
    let workdir = tempdir().unwrap();
    loader()
        .current_dir(workdir.path())
        .env("DATAVERSE_API_TOKEN", "dummy")
        .args([
            "sync",
            "--source",
            "https://contoso.sharepoint.com/:f:/g/personal/someone/EgdcQ",
            "--base-url",
            // Nothing listens here; reaching the network would surface a different error.
            "http://127.0.0.1:9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no OneDrive token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_local_folder_against_mock_dataverse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/dataverses/root/datasets"))
        .and(header("X-Dataverse-key", "e2e-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "OK",
            "data": {"id": 1, "persistentId": "doi:10.5072/FK2/E2E"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/datasets/:persistentId/versions/:latest/files"))
        .and(query_param("persistentId", "doi:10.5072/FK2/E2E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "data": [{"label": "stale.zip", "dataFile": {"id": 9}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/files/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/datasets/:persistentId/add"))
        .and(query_param("persistentId", "doi:10.5072/FK2/E2E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let datasets = tempdir().unwrap();
    let folder = datasets.path().join("alpha");
    fs::create_dir_all(&folder).unwrap();
    fs::write(
        folder.join("dataset.json"),
        json!({"datasetVersion": {"files": [], "metadataBlocks": {}}}).to_string(),
    )
    .unwrap();
    fs::write(folder.join("payload.zip"), b"PK\x03\x04").unwrap();

    loader()
        .current_dir(datasets.path())
        .env("DATAVERSE_API_TOKEN", "e2e-token")
        .args(["sync", "--source"])
        .arg(datasets.path())
        .args(["--base-url", server.uri().as_str(), "--pause-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] alpha: created doi:10.5072/FK2/E2E"))
        .stdout(predicate::str::contains("1 succeeded"));

    assert_eq!(
        fs::read_to_string(folder.join(".uploaded_alpha")).unwrap(),
        "doi:10.5072/FK2/E2E"
    );
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use dataset_loader::cli::{run, Cli, Commands};

    // No API token: run fails right after emitting the event.
    let cli = Cli {
        command: Commands::Sync {
            source: "dummy".into(),
            config: None,
            base_url: None,
            dataverse_alias: None,
            api_token: None,
            onedrive_token: None,
            gdrive_token: None,
            timeout: None,
            pause_ms: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
