use super::compute_delta;
use super::value::DeltaValue;
use crate::sensors::SensorId;
use std::sync::Arc;
use uuid::Uuid;

/// Namespace for accessory identities derived from delta ids.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_93b7_5d20_8e41_c0a9_17d3_54be);

/// Persistent accessory identity for a configured delta id.
///
/// Name-based (v5) so the same id yields the same identity on every run.
pub fn persistent_id(delta_id: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, delta_id.as_bytes())
}

/// One active virtual delta sensor.
pub struct DeltaDevice {
    pub persistent_id: Uuid,
    /// Id of the configuration entry this device was built from
    pub delta_id: String,
    pub display_name: String,
    pub sensor_a: SensorId,
    pub sensor_b: SensorId,
    pub inverse: bool,
    pub value: Arc<DeltaValue>,
}

impl DeltaDevice {
    pub fn compute(&self, a: i32, b: i32) -> i32 {
        compute_delta(a, b, self.inverse)
    }

    /// Latest delta in hundredths of a degree Celsius.
    pub fn current_delta(&self) -> i32 {
        self.value.read()
    }
}

impl std::fmt::Debug for DeltaDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeltaDevice")
            .field("persistent_id", &self.persistent_id)
            .field("delta_id", &self.delta_id)
            .field("display_name", &self.display_name)
            .field("sensor_a", &self.sensor_a)
            .field("sensor_b", &self.sensor_b)
            .field("inverse", &self.inverse)
            .field("current_delta", &self.current_delta())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistent_id_is_stable() {
        assert_eq!(persistent_id("d1"), persistent_id("d1"));
        assert_ne!(persistent_id("d1"), persistent_id("d2"));
        assert_eq!(persistent_id("d1").get_version_num(), 5);
    }

    #[test]
    fn test_compute_honours_inverse() {
        let mut device = DeltaDevice {
            persistent_id: persistent_id("d1"),
            delta_id: "d1".to_string(),
            display_name: "Window delta".to_string(),
            sensor_a: SensorId::from(1),
            sensor_b: SensorId::from(2),
            inverse: false,
            value: Arc::new(DeltaValue::new()),
        };
        assert_eq!(device.compute(2150, 1980), 170);

        device.inverse = true;
        assert_eq!(device.compute(2150, 1980), -170);
    }
}
