//! Virtual delta sensors.
//!
//! All temperatures and deltas are hundredths of a degree Celsius, the unit
//! the Hue bridge reports (2150 = 21.50°C).

pub mod device;
pub mod registry;
pub mod sampler;
pub mod value;

pub use device::{DeltaDevice, persistent_id};
pub use registry::{DeltaRegistry, DiscoveryReport};
pub use sampler::DeltaSampler;
pub use value::DeltaValue;

/// Signed difference between two readings.
///
/// `a - b`, or `b - a` when `inverse` is set.
pub fn compute_delta(a: i32, b: i32, inverse: bool) -> i32 {
    if inverse {
        b.saturating_sub(a)
    } else {
        a.saturating_sub(b)
    }
}
