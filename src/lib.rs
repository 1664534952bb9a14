//! Hue temperature delta sensors.
//!
//! Synthesizes virtual temperature sensors whose value is the difference
//! between two physical Hue temperature sensors, refreshed on a fixed
//! polling interval and exposed through a host accessory framework.

pub mod config;
pub mod delta;
pub mod error;
pub mod host;
pub mod hue;
pub mod platform;
pub mod sensors;

#[cfg(test)]
mod testing;
