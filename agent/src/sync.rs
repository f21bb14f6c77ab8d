//! Discovery → transfer → report loop.
//!
//! One cycle discovers the cameras currently on the network, drains each
//! one's recordings in turn (fetch, store, then delete from the camera),
//! and finally sets the LED to reflect whether any camera was seen.
//! Cameras are handled strictly one after another.  The first failure on
//! a camera abandons the rest of that camera's queue for this cycle; the
//! next cycle lists it again from scratch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

use thermal_common::config::Config;
use thermal_common::discovery::{Device, Resolver};
use thermal_common::SyncError;

use crate::client::{self, RecordingApi};
use crate::indicator::{ActivityState, Indicator, TriggerDevice};

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub devices_found: usize,
    pub devices_failed: usize,
    pub recordings_transferred: usize,
}

pub struct Orchestrator<R, A, D> {
    resolver: R,
    api: A,
    indicator: Indicator<D>,
    output_dir: PathBuf,
    discovery_timeout: Duration,
    cycle_interval: Duration,
}

impl<R, A, D> Orchestrator<R, A, D>
where
    R: Resolver,
    A: RecordingApi,
    D: TriggerDevice,
{
    pub fn new(
        resolver: R,
        api: A,
        indicator: Indicator<D>,
        output_dir: impl Into<PathBuf>,
        discovery_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            api,
            indicator,
            output_dir: output_dir.into(),
            discovery_timeout,
            cycle_interval: Duration::ZERO,
        }
    }

    /// Build from the loaded configuration.
    pub fn from_config(resolver: R, api: A, indicator: Indicator<D>, config: &Config) -> Self {
        Self::new(
            resolver,
            api,
            indicator,
            &config.output_dir,
            config.discovery_timeout,
        )
        .with_cycle_interval(config.cycle_interval)
    }

    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    pub fn indicator(&self) -> &Indicator<D> {
        &self.indicator
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Give back the resolver, e.g. to shut its backend down.
    pub fn into_resolver(self) -> R {
        self.resolver
    }

    /// Run cycles until `shutdown` is set.
    ///
    /// Returns only on shutdown or a fatal discovery error.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), SyncError> {
        info!(
            "Syncing recordings into {} (cycle interval {}s)",
            self.output_dir.display(),
            self.cycle_interval.as_secs()
        );

        while !shutdown.load(Ordering::Relaxed) {
            self.run_cycle_until(shutdown)?;

            if !self.cycle_interval.is_zero() && !shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(self.cycle_interval);
            }
        }

        info!("Sync loop stopped");
        Ok(())
    }

    /// One discovery → transfer → report pass.
    ///
    /// Device and recording failures are logged and counted; only a
    /// discovery backend failure is returned.
    pub fn run_cycle(&mut self) -> Result<CycleReport, SyncError> {
        self.run_cycle_until(&AtomicBool::new(false))
    }

    fn run_cycle_until(&mut self, shutdown: &AtomicBool) -> Result<CycleReport, SyncError> {
        // ── discovering ──────────────────────────────────────────────
        let devices = self.resolver.discover(self.discovery_timeout)?;

        // ── processing devices ───────────────────────────────────────
        let mut report = CycleReport {
            devices_found: devices.len(),
            ..CycleReport::default()
        };
        for device in &devices {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            match self.sync_device(device) {
                Ok(n) => report.recordings_transferred += n,
                Err(e) => {
                    report.devices_failed += 1;
                    error!("error with getting recordings from '{}': {e}", device.name);
                }
            }
        }

        // ── reporting ────────────────────────────────────────────────
        let state = if devices.is_empty() {
            ActivityState::Idle
        } else {
            ActivityState::Active
        };
        self.indicator.set_state(state);

        info!(
            "Cycle done: {} device(s), {} failed, {} recording(s) transferred",
            report.devices_found, report.devices_failed, report.recordings_transferred
        );
        Ok(report)
    }

    /// Transfer every recording `device` lists, in listing order.
    ///
    /// Stops at the first failure.  Returns the number transferred.
    pub fn sync_device(&mut self, device: &Device) -> Result<usize, SyncError> {
        info!("searching for recordings on '{}'", device.name);
        let ids = self.api.list_recordings(device)?;
        if ids.is_empty() {
            return Ok(0);
        }
        info!("'{}' has {} recording(s)", device.name, ids.len());

        let mut transferred = 0;
        for id in &ids {
            info!("getting recording '{id}'");
            client::fetch_and_store(&self.api, device, id, &self.output_dir, &mut self.indicator)?;

            if let Err(e) = self.api.delete_recording(device, id) {
                warn!("'{}': stored {id} but could not delete it from the device", device.name);
                return Err(e);
            }
            transferred += 1;
        }
        Ok(transferred)
    }
}
