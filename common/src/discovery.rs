//! mDNS-SD (multicast DNS Service Discovery) for thermal cameras.
//!
//! Each camera advertises its management API under a fixed service type.
//! A scan browses that type for a bounded window, drains every resolved
//! announcement, and hands back a finished list: nothing is streamed to
//! the caller and nothing is cached between scans.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent};
use tracing::{debug, info};

use crate::error::SyncError;

/// Suffix mDNS appends to advertised host names.
const HOST_SUFFIX: &str = ".local.";

// ── Device ───────────────────────────────────────────────────────────────────

/// A camera discovered on the network.
///
/// Only valid for the cycle that discovered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    /// Host name with the `.local.` suffix removed, e.g. `camera-3`.
    pub name: String,
    /// IP literal or resolvable host name.
    pub address: String,
    pub port: u16,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// HTTP base URL, e.g. `http://192.168.1.20:80`.
    pub fn base_url(&self) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("http://[{}]:{}", v6, self.port),
            _ => format!("http://{}:{}", self.address, self.port),
        }
    }
}

// ── Resolver ─────────────────────────────────────────────────────────────────

/// Something that can produce the set of currently reachable devices.
pub trait Resolver {
    /// Scan for up to `timeout` and return every device seen.
    ///
    /// Zero devices is a valid result.  An error means the backend itself
    /// is unusable.
    fn discover(&mut self, timeout: Duration) -> Result<Vec<Device>, SyncError>;
}

/// [`Resolver`] backed by an `mdns-sd` daemon.
pub struct MdnsResolver {
    daemon: ServiceDaemon,
    service_type: String,
}

impl MdnsResolver {
    /// Start the mDNS daemon that will browse `service_type`
    /// (e.g. `_cacophonator-management._tcp.local.`).
    pub fn new(service_type: impl Into<String>) -> Result<Self, SyncError> {
        let daemon = ServiceDaemon::new().map_err(SyncError::discovery_init)?;
        Ok(Self {
            daemon,
            service_type: service_type.into(),
        })
    }

    /// Shut down the mDNS daemon.
    pub fn shutdown(self) {
        let _ = self.daemon.shutdown();
    }
}

impl Resolver for MdnsResolver {
    fn discover(&mut self, timeout: Duration) -> Result<Vec<Device>, SyncError> {
        info!("starting search for devices...");
        let receiver = self
            .daemon
            .browse(&self.service_type)
            .map_err(SyncError::discovery_init)?;

        debug!(
            "mDNS: browsing for {} (timeout={}s)",
            self.service_type,
            timeout.as_secs()
        );
        let mut devices = Vec::new();
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match receiver.recv_timeout(remaining) {
                Ok(ServiceEvent::ServiceResolved(info)) => {
                    let addrs: Vec<IpAddr> =
                        info.get_addresses().iter().map(|a| a.to_ip_addr()).collect();
                    if let Some(device) =
                        device_from_entry(info.get_hostname(), &addrs, info.get_port())
                    {
                        debug!("mDNS: resolved {} at {}", device.name, device.base_url());
                        push_unique(&mut devices, info.get_fullname(), device);
                    } else {
                        debug!(
                            "mDNS: skipping {} (no usable address or port)",
                            info.get_fullname()
                        );
                    }
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }

        let _ = self.daemon.stop_browse(&self.service_type);
        info!("found {} devices", devices.len());
        Ok(devices.into_iter().map(|(_, device)| device).collect())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Build a [`Device`] from one resolved announcement.
///
/// Returns `None` when the entry has no address or advertises port 0.
fn device_from_entry(hostname: &str, addresses: &[IpAddr], port: u16) -> Option<Device> {
    if port == 0 {
        return None;
    }
    let address = pick_address(addresses)?;
    Some(Device::new(device_name(hostname), address.to_string(), port))
}

/// Strip the mDNS host suffix, e.g. `camera-3.local.` → `camera-3`.
fn device_name(hostname: &str) -> &str {
    hostname
        .strip_suffix(HOST_SUFFIX)
        .or_else(|| hostname.strip_suffix(".local"))
        .unwrap_or(hostname)
}

/// Prefer non-loopback IPv4, then any IPv4, then whatever is left.
///
/// mDNS hands addresses over as an unordered set, so ties go to the
/// numerically lowest address to keep the choice stable between scans.
fn pick_address(addresses: &[IpAddr]) -> Option<IpAddr> {
    addresses
        .iter()
        .copied()
        .min_by_key(|a| (!a.is_ipv4(), a.is_loopback(), *a))
}

/// mDNS re-announces an instance as more of its addresses resolve.  One
/// entry per instance full name: it keeps its first-seen position and takes
/// the latest resolution.
fn push_unique(devices: &mut Vec<(String, Device)>, fullname: &str, device: Device) {
    match devices.iter_mut().find(|(seen, _)| seen == fullname) {
        Some((_, existing)) => *existing = device,
        None => devices.push((fullname.to_string(), device)),
    }
}
