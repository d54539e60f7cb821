//! Simulated multimodal sensor snapshots.
//!
//! The mobile client polls this for device-side context. Readings within a
//! snapshot share one timestamp so downstream consumers can align streams.

use rand::Rng;

use vista_types::SensorReading;

struct SensorSpec {
    sensor_id: &'static str,
    sensor_type: &'static str,
    /// Baseline values; a snapshot perturbs each slightly.
    baseline: &'static [f64],
}

const SENSORS: &[SensorSpec] = &[
    SensorSpec {
        sensor_id: "accel-0",
        sensor_type: "accelerometer",
        baseline: &[0.0, 0.0, 9.81],
    },
    SensorSpec {
        sensor_id: "gyro-0",
        sensor_type: "gyroscope",
        baseline: &[0.0, 0.0, 0.0],
    },
    SensorSpec {
        sensor_id: "light-0",
        sensor_type: "light",
        baseline: &[320.0],
    },
    SensorSpec {
        sensor_id: "proximity-0",
        sensor_type: "proximity",
        baseline: &[1.0],
    },
];

/// Produces aligned snapshots across the fixed sensor set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorHub;

impl SensorHub {
    pub fn snapshot(&self) -> Vec<SensorReading> {
        let timestamp = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
        let mut rng = rand::thread_rng();
        SENSORS
            .iter()
            .map(|spec| SensorReading {
                sensor_id: spec.sensor_id.to_string(),
                sensor_type: spec.sensor_type.to_string(),
                timestamp,
                values: spec
                    .baseline
                    .iter()
                    .map(|v| v + rng.gen_range(-0.05..0.05))
                    .collect(),
                quality: 1.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_aligned() {
        let snapshot = SensorHub.snapshot();
        assert_eq!(snapshot.len(), SENSORS.len());
        let ts = snapshot[0].timestamp;
        assert!(snapshot.iter().all(|r| r.timestamp == ts));
        assert!(snapshot.iter().all(|r| (0.0..=1.0).contains(&r.quality)));
    }

    #[test]
    fn test_snapshot_value_arity_matches_sensor() {
        let snapshot = SensorHub.snapshot();
        let accel = snapshot
            .iter()
            .find(|r| r.sensor_type == "accelerometer")
            .unwrap();
        assert_eq!(accel.values.len(), 3);
        let light = snapshot.iter().find(|r| r.sensor_type == "light").unwrap();
        assert_eq!(light.values.len(), 1);
    }
}
