//! Status LED driven through a sysfs trigger file.
//!
//! The kernel exposes the LED trigger as a line like
//! `none [timer] default-on heartbeat`, with the active trigger in brackets.
//! Writing a trigger name selects it.  Re-selecting `timer` restarts the
//! blink pattern, so a busy loop of transfers would look like a steady
//! light; every write is therefore skipped when the requested trigger is
//! already the bracketed one.

use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

/// Logical activity the agent wants to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    /// Last cycle found no devices.
    Idle,
    /// A transfer is in flight.
    Busy,
    /// Last cycle found at least one device, nothing in flight.
    Active,
}

impl ActivityState {
    /// Kernel trigger name that represents this state.
    pub fn trigger(self) -> &'static str {
        match self {
            Self::Idle => "none",
            Self::Busy => "timer",
            Self::Active => "default-on",
        }
    }
}

/// Low-level access to an LED trigger.
pub trait TriggerDevice {
    /// Raw trigger listing, bracket-marked.
    fn read_triggers(&mut self) -> io::Result<String>;
    fn write_trigger(&mut self, name: &str) -> io::Result<()>;
}

/// [`TriggerDevice`] over a sysfs file such as `/sys/class/leds/led0/trigger`.
pub struct SysfsTrigger {
    path: PathBuf,
}

impl SysfsTrigger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TriggerDevice for SysfsTrigger {
    fn read_triggers(&mut self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    fn write_trigger(&mut self, name: &str) -> io::Result<()> {
        std::fs::write(&self.path, name)
    }
}

/// Owns the LED and the last requested [`ActivityState`].
pub struct Indicator<D> {
    device: D,
    state: Option<ActivityState>,
    reported_absent: bool,
}

impl<D: TriggerDevice> Indicator<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: None,
            reported_absent: false,
        }
    }

    /// Last state requested through [`Indicator::set_state`].
    pub fn state(&self) -> Option<ActivityState> {
        self.state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Show `state`, writing the trigger only if it is not already active.
    ///
    /// A missing LED (any board without one) makes this a no-op.
    pub fn set_state(&mut self, state: ActivityState) {
        self.state = Some(state);
        let wanted = state.trigger();

        let listing = match self.device.read_triggers() {
            Ok(text) => text,
            Err(e) => {
                if !self.reported_absent {
                    info!("status LED unavailable ({e}), indicator disabled");
                    self.reported_absent = true;
                }
                return;
            }
        };

        if current_trigger(&listing) == Some(wanted) {
            return;
        }

        if let Err(e) = self.device.write_trigger(wanted) {
            warn!("cannot set LED trigger to '{wanted}': {e}");
        }
    }
}

/// The bracketed entry of a trigger listing.
fn current_trigger(listing: &str) -> Option<&str> {
    let start = listing.find('[')? + 1;
    let len = listing[start..].find(']')?;
    Some(&listing[start..start + len])
}
