//! End-to-end: the real HTTP client and orchestrator against fake cameras
//! served by axum on loopback.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;

use thermal_agent::client::{HttpRecordingClient, RecordingApi};
use thermal_agent::indicator::{Indicator, SysfsTrigger};
use thermal_agent::sync::{CycleReport, Orchestrator};
use thermal_common::discovery::{Device, Resolver};
use thermal_common::SyncError;

// ── fake camera ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Camera {
    recordings: Vec<(String, Vec<u8>)>,
    /// Raw body served by the listing endpoint instead of the real list.
    listing_override: Option<&'static str>,
    failing_fetches: Vec<String>,
    fetched: Vec<String>,
    deleted: Vec<String>,
}

type Shared = Arc<Mutex<Camera>>;

fn camera(ids: &[&str]) -> Shared {
    Arc::new(Mutex::new(Camera {
        recordings: ids
            .iter()
            .map(|id| (id.to_string(), format!("cptv:{id}").into_bytes()))
            .collect(),
        ..Camera::default()
    }))
}

/// Serve `state` on an ephemeral loopback port from a background runtime.
fn serve(state: Shared) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let app = Router::new()
                .route("/api/recordings", get(list_recordings))
                .route(
                    "/api/recording/{id}",
                    get(download_recording).delete(delete_recording),
                )
                .with_state(state);
            axum::serve(listener, app).await.unwrap();
        });
    });
    addr
}

async fn list_recordings(State(state): State<Shared>) -> Response {
    let cam = state.lock().unwrap();
    if let Some(body) = cam.listing_override {
        return body.into_response();
    }
    let ids: Vec<String> = cam.recordings.iter().map(|(id, _)| id.clone()).collect();
    Json(ids).into_response()
}

async fn download_recording(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut cam = state.lock().unwrap();
    cam.fetched.push(id.clone());
    if cam.failing_fetches.contains(&id) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    match cam.recordings.iter().find(|(r, _)| *r == id) {
        Some((_, bytes)) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_recording(State(state): State<Shared>, Path(id): Path<String>) -> StatusCode {
    let mut cam = state.lock().unwrap();
    let before = cam.recordings.len();
    cam.recordings.retain(|(r, _)| *r != id);
    if cam.recordings.len() == before {
        return StatusCode::NOT_FOUND;
    }
    cam.deleted.push(id);
    StatusCode::OK
}

// ── harness ──────────────────────────────────────────────────────────────

struct FixedResolver(Vec<Device>);

impl Resolver for FixedResolver {
    fn discover(&mut self, _timeout: Duration) -> Result<Vec<Device>, SyncError> {
        Ok(self.0.clone())
    }
}

fn client() -> HttpRecordingClient {
    HttpRecordingClient::new(Duration::from_secs(2), Duration::from_secs(10)).unwrap()
}

fn device(name: &str, addr: SocketAddr) -> Device {
    Device::new(name, addr.ip().to_string(), addr.port())
}

fn test_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("thermal_sync_it").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Orchestrator over `devices` with a file-backed LED that starts at `none`.
fn orchestrator(
    devices: Vec<Device>,
    dir: &std::path::Path,
) -> Orchestrator<FixedResolver, HttpRecordingClient, SysfsTrigger> {
    let led = dir.join("trigger");
    std::fs::write(&led, "[none] timer default-on\n").unwrap();
    Orchestrator::new(
        FixedResolver(devices),
        client(),
        Indicator::new(SysfsTrigger::new(led)),
        dir.join("downloaded"),
        Duration::from_millis(1),
    )
}

/// A loopback port nothing listens on.
fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

// ── tests ────────────────────────────────────────────────────────────────

#[test]
fn test_cycle_downloads_and_deletes() {
    let cam = camera(&["a", "b"]);
    let addr = serve(cam.clone());
    let dir = test_dir("download_delete");
    let mut orch = orchestrator(vec![device("cam1", addr)], &dir);

    let report = orch.run_cycle().unwrap();

    assert_eq!(
        report,
        CycleReport {
            devices_found: 1,
            devices_failed: 0,
            recordings_transferred: 2,
        }
    );
    let out = dir.join("downloaded");
    assert_eq!(std::fs::read(out.join("cam1_a")).unwrap(), b"cptv:a");
    assert_eq!(std::fs::read(out.join("cam1_b")).unwrap(), b"cptv:b");

    let cam = cam.lock().unwrap();
    assert_eq!(cam.deleted, vec!["a", "b"]);
    assert!(cam.recordings.is_empty());
    assert_eq!(
        std::fs::read_to_string(dir.join("trigger")).unwrap(),
        "default-on"
    );
}

#[test]
fn test_failed_fetch_aborts_queue_and_moves_on() {
    let broken = camera(&["a", "b"]);
    broken.lock().unwrap().failing_fetches.push("a".into());
    let healthy = camera(&["x"]);
    let dir = test_dir("fetch_fails");
    let mut orch = orchestrator(
        vec![
            device("broken", serve(broken.clone())),
            device("healthy", serve(healthy.clone())),
        ],
        &dir,
    );

    let report = orch.run_cycle().unwrap();

    assert_eq!(report.devices_failed, 1);
    assert_eq!(report.recordings_transferred, 1);

    let out = dir.join("downloaded");
    assert!(!out.join("broken_a").exists());
    assert!(!out.join("broken_b").exists());
    assert!(out.join("healthy_x").exists());

    let broken = broken.lock().unwrap();
    assert_eq!(broken.fetched, vec!["a"]);
    assert!(broken.deleted.is_empty());
    assert_eq!(healthy.lock().unwrap().deleted, vec!["x"]);
}

#[test]
fn test_empty_discovery_sets_idle() {
    let dir = test_dir("no_devices");
    let mut orch = orchestrator(vec![], &dir);
    std::fs::write(dir.join("trigger"), "none timer [default-on]\n").unwrap();

    let report = orch.run_cycle().unwrap();

    assert_eq!(report, CycleReport::default());
    assert_eq!(std::fs::read_to_string(dir.join("trigger")).unwrap(), "none");
    assert!(!dir.join("downloaded").exists());
}

#[test]
fn test_malformed_listing_is_protocol_error() {
    let cam = camera(&["a"]);
    cam.lock().unwrap().listing_override = Some(r#"{"recordings": ["a"]}"#);
    let addr = serve(cam.clone());

    let err = client().list_recordings(&device("cam1", addr)).unwrap_err();

    assert!(matches!(err, SyncError::Protocol { .. }), "{err}");
    assert!(cam.lock().unwrap().fetched.is_empty());
}

#[test]
fn test_missing_recording_is_protocol_error() {
    let addr = serve(camera(&[]));
    let err = client().open_recording(&device("cam1", addr), "nope").err().unwrap();
    assert!(matches!(err, SyncError::Protocol { .. }), "{err}");

    let err = client().delete_recording(&device("cam1", addr), "nope").unwrap_err();
    assert!(matches!(err, SyncError::Protocol { .. }), "{err}");
}

#[test]
fn test_unreachable_device_is_transport_error() {
    let addr = closed_port();
    let err = client().list_recordings(&device("gone", addr)).unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }), "{err}");

    let dir = test_dir("unreachable");
    let mut orch = orchestrator(vec![device("gone", addr)], &dir);
    let report = orch.run_cycle().unwrap();
    assert_eq!(report.devices_failed, 1);
    assert_eq!(
        std::fs::read_to_string(dir.join("trigger")).unwrap(),
        "default-on"
    );
}

#[test]
fn test_reserved_characters_in_ids_reach_the_right_recording() {
    let ids = ["a#b", "a", "x?y", "50%", "two words"];
    let cam = camera(&ids);
    let addr = serve(cam.clone());
    let dir = test_dir("reserved_ids");
    let mut orch = orchestrator(vec![device("cam1", addr)], &dir);

    let report = orch.run_cycle().unwrap();

    assert_eq!(report.recordings_transferred, ids.len());
    let cam = cam.lock().unwrap();
    assert_eq!(cam.fetched, ids);
    assert_eq!(cam.deleted, ids);
    assert!(cam.recordings.is_empty());

    let out = dir.join("downloaded");
    for id in ids {
        assert_eq!(
            std::fs::read_to_string(out.join(format!("cam1_{id}"))).unwrap(),
            format!("cptv:{id}")
        );
    }
}
