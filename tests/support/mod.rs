//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::TcpListener;
use std::panic::Location;
use std::path::Path;

use harvester_core::config::{ApiConfig, KindSettings};
use harvester_core::{CatalogClient, ContentKind, RateGovernor};
use serde_json::{Value, json};
use wiremock::MockServer;

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var("HARVESTER_REQUIRE_SOCKET_TESTS")
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[socket-bound-test] cannot bind localhost socket at {}:{}; wiremock-based test cannot run in this environment",
        location.file(),
        location.line()
    );
    if socket_tests_required() {
        panic!("{message}. Set HARVESTER_REQUIRE_SOCKET_TESTS=0 to allow local skip behavior.");
    }

    eprintln!(
        "{message}. Skipping test. Set HARVESTER_REQUIRE_SOCKET_TESTS=1 to fail-fast instead."
    );
    true
}

pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}

/// API settings pointing at `server` with governing disabled.
pub fn api_config(server: &MockServer, page_size: u32) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        requests_per_minute: 0,
        page_size,
        ..ApiConfig::default()
    }
}

pub fn catalog_client(api: &ApiConfig) -> CatalogClient {
    CatalogClient::new(api, std::sync::Arc::new(RateGovernor::disabled()))
        .expect("catalog client should build")
}

/// Kind defaults with progress and output files inside `dir`.
pub fn kind_settings(kind: ContentKind, dir: &Path) -> KindSettings {
    let mut settings = KindSettings::defaults(kind);
    settings.progress_file = dir.join(format!("{}_progress.json", kind.as_str()));
    settings.output_file = dir.join(format!("{}_output.json", kind.as_str()));
    settings
}

/// One search hit.
pub fn hit(project_id: &str, title: &str, categories: &[&str]) -> Value {
    json!({
        "title": title,
        "project_id": project_id,
        "categories": categories,
        "versions": ["1.20.1"],
        "description": "",
        "icon_url": format!("https://cdn.example.com/{project_id}/icon.png"),
    })
}

/// One texture pack search hit.
pub fn texture_hit(project_id: &str, versions: &[&str], description: &str) -> Value {
    json!({
        "title": format!("Pack {project_id}"),
        "project_id": project_id,
        "categories": [],
        "versions": versions,
        "description": description,
        "icon_url": null,
    })
}

pub fn search_body(hits: Vec<Value>) -> Value {
    let limit = hits.len();
    json!({ "hits": hits, "offset": 0, "limit": limit, "total_hits": 1000 })
}

/// Version list whose head has `files`.
pub fn versions_body(version_number: &str, files: &[&str]) -> Value {
    let files: Vec<Value> = files
        .iter()
        .map(|url| json!({ "url": url, "filename": url.rsplit('/').next() }))
        .collect();
    json!([
        {
            "version_number": version_number,
            "files": files,
            "date_published": "2024-05-01T12:00:00Z",
        },
        {
            "version_number": "0.0.1",
            "files": [],
            "date_published": "2023-01-01T12:00:00Z",
        }
    ])
}
