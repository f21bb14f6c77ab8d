//! Thermal-camera sync agent: discovers cameras over mDNS, pulls their
//! pending recordings, deletes them from the camera once stored, and drives
//! a status LED.

pub mod client;
pub mod indicator;
pub mod sync;
