//! Configuration parsing – reads a KEY=VALUE file (`thermal-sync.conf`).
//!
//! Every key has a default, so a device with no config file on disk runs
//! with the stock camera-side settings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// Agent configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // ── storage ──────────────────────────────────────────────────────
    /// Directory completed recordings are written into.
    pub output_dir: PathBuf,

    // ── discovery ────────────────────────────────────────────────────
    /// mDNS service type without the domain, e.g. `_cacophonator-management._tcp`.
    pub service_type: String,
    /// mDNS browse domain, e.g. `local.`
    pub service_domain: String,
    pub discovery_timeout: Duration,

    // ── indicator ────────────────────────────────────────────────────
    /// sysfs LED trigger file.
    pub led_trigger_file: PathBuf,

    // ── HTTP ─────────────────────────────────────────────────────────
    pub http_connect_timeout: Duration,
    /// Whole-request timeout, response body included.
    pub http_timeout: Duration,

    // ── scheduling ───────────────────────────────────────────────────
    /// Pause between the end of one cycle and the next discovery.
    pub cycle_interval: Duration,
}

impl Config {
    /// Default config path.
    pub fn default_path() -> &'static str {
        "/etc/thermal-sync/thermal-sync.conf"
    }

    /// Full mDNS service type to browse, e.g.
    /// `_cacophonator-management._tcp.local.`
    pub fn browse_type(&self) -> String {
        let domain = self.service_domain.trim_start_matches('.');
        let domain = if domain.ends_with('.') {
            domain.to_string()
        } else {
            format!("{domain}.")
        };
        format!("{}.{}", self.service_type.trim_end_matches('.'), domain)
    }
}

impl Default for Config {
    fn default() -> Self {
        from_map(&HashMap::new())
    }
}

/// Load the configuration at `path`.
///
/// A missing file yields [`Config::default`]; a file that exists but cannot
/// be read is an error.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config: {}", path.display()))?;

    let map = parse_conf(&text);
    info!("Loaded config from {}", path.display());
    Ok(from_map(&map))
}

fn from_map(map: &HashMap<String, String>) -> Config {
    let get = |key: &str| -> Option<String> { map.get(key).cloned().filter(|v| !v.is_empty()) };
    let get_secs = |key: &str, default: u64| -> Duration {
        Duration::from_secs(get(key).and_then(|v| v.parse().ok()).unwrap_or(default))
    };

    Config {
        output_dir: PathBuf::from(
            get("OUTPUT_DIR").unwrap_or_else(|| "/var/spool/cptv/downloaded".into()),
        ),
        service_type: get("SERVICE_TYPE")
            .unwrap_or_else(|| "_cacophonator-management._tcp".into()),
        service_domain: get("SERVICE_DOMAIN").unwrap_or_else(|| "local.".into()),
        discovery_timeout: get_secs("DISCOVERY_TIMEOUT_SECS", 10),
        led_trigger_file: PathBuf::from(
            get("LED_TRIGGER_FILE").unwrap_or_else(|| "/sys/class/leds/led0/trigger".into()),
        ),
        http_connect_timeout: get_secs("HTTP_CONNECT_TIMEOUT_SECS", 10),
        http_timeout: get_secs("HTTP_TIMEOUT_SECS", 300),
        cycle_interval: get_secs("CYCLE_INTERVAL_SECS", 0),
    }
}

/// Parse `KEY=VALUE` lines into a map, stripping optional double-quotes.
fn parse_conf(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = line.split_once('=') {
            let key = key.trim();
            let val = val.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }
    map
}

// ─── tests ───────────────────────────────────────────────────────────────
