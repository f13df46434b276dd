//! Shared setup for the integration test binaries.
#![allow(dead_code)]

use sardia_cms::{
    AppConfig, AppState, InMemoryRepository, LocalDiskStorage, MockStorageService,
    create_router,
    repository::RepositoryState,
    storage::StorageState,
};
use std::{collections::HashMap, sync::Arc};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "integration-access-secret";
pub const TEST_REFRESH_SECRET: &str = "integration-refresh-secret";
pub const ADMIN_USERNAME: &str = "editor";
pub const ADMIN_PASSWORD: &str = "correct horse battery";

/// Configuration built from a fixed lookup; never touches the process env.
pub fn test_config() -> AppConfig {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> AppConfig {
    let mut vars: HashMap<String, String> = [
        ("DATABASE_URL", "postgres://unused/sardia"),
        ("JWT_SECRET", TEST_SECRET),
        ("JWT_REFRESH_SECRET", TEST_REFRESH_SECRET),
        ("MAX_UPLOAD_BYTES", "65536"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    AppConfig::from_lookup(|key| vars.get(key).cloned()).expect("test config must be valid")
}

/// State over an in-memory repository and a recording mock storage.
pub fn mock_state() -> (AppState, Arc<InMemoryRepository>, Arc<MockStorageService>) {
    let repo = Arc::new(InMemoryRepository::new());
    let storage = Arc::new(MockStorageService::new());
    let state = AppState::new(
        repo.clone() as RepositoryState,
        storage.clone() as StorageState,
        test_config(),
    );
    (state, repo, storage)
}

/// A running server on an ephemeral port, backed by an in-memory repository and
/// real on-disk storage in a temporary directory.
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub upload_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

pub async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
    let upload_path = upload_dir.path().to_string_lossy().to_string();

    let mut all_overrides = vec![("UPLOAD_DIR", upload_path.as_str())];
    all_overrides.extend_from_slice(overrides);
    let config = test_config_with(&all_overrides);

    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let storage = Arc::new(LocalDiskStorage::new(&config.upload_dir)) as StorageState;
    let router = create_router(AppState::new(repo, storage, config));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        client: reqwest::Client::new(),
        upload_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers the standard admin and logs in. Returns the session token.
    pub async fn login_admin(&self) -> String {
        let register = self
            .client
            .post(self.url("/api/admin/register"))
            .json(&serde_json::json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(register.status(), 201);

        let login: serde_json::Value = self
            .client
            .post(self.url("/api/admin/login"))
            .json(&serde_json::json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
            .send()
            .await
            .expect("login request failed")
            .json()
            .await
            .expect("login body was not JSON");

        login["token"].as_str().expect("token missing").to_string()
    }
}

/// A tiny but well-formed PNG header; storage never decodes images.
pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0]
}
