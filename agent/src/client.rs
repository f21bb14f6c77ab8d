//! HTTP client for a camera's recording API.
//!
//! [`RecordingApi`] is the list / fetch / delete surface of one camera;
//! [`fetch_and_store`] streams a single recording to disk.  Deleting the
//! recording from the camera is left to the caller, which only does so
//! after `fetch_and_store` has returned the finished file.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{debug, info};

use thermal_common::config::Config;
use thermal_common::discovery::Device;
use thermal_common::protocol;
use thermal_common::SyncError;

use crate::indicator::{ActivityState, Indicator, TriggerDevice};

/// Chunk size used when streaming a recording to disk.
const CHUNK_SIZE: usize = 256 * 1024;

/// Remote recording store of one device.
pub trait RecordingApi {
    /// Ids of the recordings waiting on `device`, in device order.
    fn list_recordings(&self, device: &Device) -> Result<Vec<String>, SyncError>;

    /// Start downloading recording `id`; the reader yields the raw body.
    fn open_recording(&self, device: &Device, id: &str) -> Result<Box<dyn Read>, SyncError>;

    /// Remove recording `id` from `device`.
    fn delete_recording(&self, device: &Device, id: &str) -> Result<(), SyncError>;
}

/// [`RecordingApi`] over HTTP, sharing one connection pool across devices.
pub struct HttpRecordingClient {
    http: reqwest::blocking::Client,
}

impl HttpRecordingClient {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .context("Cannot build HTTP client")?;
        Ok(Self { http })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.http_connect_timeout, config.http_timeout)
    }
}

impl RecordingApi for HttpRecordingClient {
    fn list_recordings(&self, device: &Device) -> Result<Vec<String>, SyncError> {
        let url = protocol::recordings_url(&device.base_url());
        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| SyncError::transport(&url, e))?;
        check_status(&url, resp.status())?;

        let body = resp.bytes().map_err(|e| SyncError::transport(&url, e))?;
        parse_recording_list(&url, &body)
    }

    fn open_recording(&self, device: &Device, id: &str) -> Result<Box<dyn Read>, SyncError> {
        let url = recording_url(device, id)?;
        let resp = self
            .http
            .get(url.clone())
            .send()
            .map_err(|e| SyncError::transport(url.as_str(), e))?;
        check_status(url.as_str(), resp.status())?;
        Ok(Box::new(resp))
    }

    fn delete_recording(&self, device: &Device, id: &str) -> Result<(), SyncError> {
        let url = recording_url(device, id)?;
        let resp = self
            .http
            .delete(url.clone())
            .send()
            .map_err(|e| SyncError::transport(url.as_str(), e))?;
        check_status(url.as_str(), resp.status())?;
        debug!("Deleted {id} from {}", device.name);
        Ok(())
    }
}

fn check_status(url: &str, status: reqwest::StatusCode) -> Result<(), SyncError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SyncError::protocol(url, format!("returned {status}")))
    }
}

/// URL of recording `id` on `device`, with the id encoded as one path
/// segment.
pub fn recording_url(device: &Device, id: &str) -> Result<Url, SyncError> {
    let base = device.base_url();
    let mut url = Url::parse(&base)
        .map_err(|e| SyncError::protocol(&base, format!("invalid device address: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| SyncError::protocol(&base, "device address cannot carry a path"))?
        .pop_if_empty()
        .extend(protocol::RECORDING_SEGMENTS)
        .push(id);
    Ok(url)
}

/// Decode the listing body: a JSON array of strings.
fn parse_recording_list(url: &str, body: &[u8]) -> Result<Vec<String>, SyncError> {
    serde_json::from_slice(body)
        .map_err(|e| SyncError::protocol(url, format!("malformed recordings list: {e}")))
}

// ── fetch & store ────────────────────────────────────────────────────────

/// Local file name for recording `id` of `device`: `{deviceName}_{id}`.
///
/// Ids are opaque.  The name always carries the device prefix, so only a
/// path separator or NUL could take it outside `output_dir`.
pub fn local_file_name(device: &Device, id: &str) -> Result<String, SyncError> {
    if id.is_empty() || id.contains(['/', '\\', '\0']) {
        return Err(SyncError::protocol(
            recording_url(device, id)?.as_str(),
            format!("unsafe recording id {id:?}"),
        ));
    }
    Ok(format!("{}_{}", device.name, id))
}

/// Download recording `id` from `device` into `output_dir`.
///
/// The LED shows busy for the transfer.  Data is streamed into a `.part`
/// file that is renamed to its final name only once every byte is flushed
/// to disk; on failure the partial file is removed.  Returns the final path.
pub fn fetch_and_store<A, D>(
    api: &A,
    device: &Device,
    id: &str,
    output_dir: &Path,
    indicator: &mut Indicator<D>,
) -> Result<PathBuf, SyncError>
where
    A: RecordingApi + ?Sized,
    D: TriggerDevice,
{
    let file_name = local_file_name(device, id)?;
    indicator.set_state(ActivityState::Busy);

    let url = recording_url(device, id)?;
    let body = api.open_recording(device, id)?;

    std::fs::create_dir_all(output_dir).map_err(|e| SyncError::io(output_dir, e))?;
    let final_path = output_dir.join(&file_name);
    let part_path = output_dir.join(format!("{file_name}.part"));

    let written = match write_part(body, url.as_str(), &part_path) {
        Ok(n) => n,
        Err(e) => {
            let _ = std::fs::remove_file(&part_path);
            return Err(e);
        }
    };

    if let Err(e) = std::fs::rename(&part_path, &final_path) {
        let _ = std::fs::remove_file(&part_path);
        return Err(SyncError::io(&final_path, e));
    }

    info!("Downloaded {} ({} bytes) → {}", id, written, final_path.display());
    Ok(final_path)
}

/// Stream `body` into `part_path`, chunk by chunk.  Returns bytes written.
fn write_part(mut body: Box<dyn Read>, url: &str, part_path: &Path) -> Result<u64, SyncError> {
    let mut file = File::create(part_path).map_err(|e| SyncError::io(part_path, e))?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SyncError::transport(url, e)),
        };
        file.write_all(&buf[..n])
            .map_err(|e| SyncError::io(part_path, e))?;
        written += n as u64;
    }
    file.flush().map_err(|e| SyncError::io(part_path, e))?;
    file.sync_all().map_err(|e| SyncError::io(part_path, e))?;
    Ok(written)
}
