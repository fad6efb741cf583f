//! Test helpers: build AppState and router for integration tests.
//!
//! Run from the workspace root: `cargo test -p transmute-api`.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use std::sync::Arc;
use tempfile::TempDir;
use transmute_api::setup::{routes, services};
use transmute_api::AppState;
use transmute_core::{Config, Namespace};

/// Test application: server, shared state and the storage root it owns.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub config: Config,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Number of files currently present in `namespace`
    pub fn file_count(&self, namespace: Namespace) -> usize {
        std::fs::read_dir(self.config.storage_root.join(namespace.dir_name()))
            .expect("Failed to read namespace directory")
            .count()
    }
}

/// Setup test app with an isolated storage root and default settings.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app, letting the caller adjust the configuration first.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut config = Config {
        storage_root: temp_dir.path().join("data"),
        early_input_cleanup: false,
        ..Config::default()
    };
    customize(&mut config);

    let state = services::initialize_services(&config)
        .await
        .expect("Failed to initialize services");
    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

/// Multipart form holding one file part per `(file name, mime type, bytes)`
pub fn files_form(files: Vec<(&str, &str, Vec<u8>)>) -> MultipartForm {
    files
        .into_iter()
        .fold(MultipartForm::new(), |form, (name, mime, data)| {
            form.add_part(
                "file",
                Part::bytes(data).file_name(name.to_string()).mime_type(mime.to_string()),
            )
        })
}

/// Path portion of a resolved reference, e.g. `/files/1700000000000-0-3f2a9c1e5b7d4a60-a.png`
pub fn file_path(file_url: &str) -> String {
    let start = file_url
        .find("/files/")
        .unwrap_or_else(|| panic!("Unexpected fileUrl: {}", file_url));
    file_url[start..].to_string()
}

/// POST a form and return the JSON body, asserting 200
pub async fn process_ok(client: &TestServer, operation: &str, form: MultipartForm) -> serde_json::Value {
    let response = client.post(&format!("/api/{}", operation)).multipart(form).await;
    assert_eq!(
        response.status_code(),
        200,
        "{} failed: {}",
        operation,
        response.text()
    );
    response.json()
}

/// Fetch the artifact behind a reference and return its bytes
pub async fn fetch_output(client: &TestServer, body: &serde_json::Value) -> Vec<u8> {
    let url = body["fileUrl"].as_str().expect("Expected 'fileUrl' in response");
    let response = client.get(&file_path(url)).await;
    assert_eq!(response.status_code(), 200);
    response.as_bytes().to_vec()
}
