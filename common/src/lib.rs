//! Shared building blocks for the thermal-camera sync agent: configuration,
//! device discovery, the device HTTP API surface, and the error taxonomy.

pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;

pub use error::SyncError;
