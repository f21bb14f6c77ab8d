//! Error taxonomy shared by discovery, the recording client and the
//! orchestrator.
//!
//! Only [`SyncError::DiscoveryInit`] is fatal.  Everything else is scoped
//! to one device or one recording and is logged by the orchestrator before
//! it moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed source error, so fakes and real backends can share variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The service-discovery backend cannot be started or has stopped working.
    #[error("service discovery unavailable: {source}")]
    DiscoveryInit {
        #[source]
        source: BoxError,
    },

    /// Network-level failure on an HTTP call (connect, timeout, body read).
    #[error("transport error on {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The device answered, but not with what the API promises.
    #[error("protocol error on {url}: {reason}")]
    Protocol { url: String, reason: String },

    /// Local file creation or write failure.
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn discovery_init(source: impl Into<BoxError>) -> Self {
        Self::DiscoveryInit {
            source: source.into(),
        }
    }

    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    pub fn protocol(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the process cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DiscoveryInit { .. })
    }
}
