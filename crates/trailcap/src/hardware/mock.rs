//! Simulated board for development and tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};
use trailconf::SystemConfig;
use uuid::Uuid;

use super::{KeypadCallback, Platform, PlatformError, Sensor};

/// Type id reported by [`MockAccelerometer`] unless configured otherwise.
pub const MOCK_ACCELEROMETER_TYPE: Uuid = Uuid::from_u128(0x3906c164_82c8_48f8_a154_a39a9d0269fa);

/// Something the mock board was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    SyncLight(bool),
    Buzzer(bool),
}

pub struct MockPlatform {
    sensors: Vec<Arc<dyn Sensor>>,
    events: Mutex<Vec<MockEvent>>,
    keypad: Mutex<Option<KeypadCallback>>,
}

impl MockPlatform {
    /// Board with no sensors.
    pub fn new() -> Self {
        Self::with_sensors(Vec::new())
    }

    pub fn with_sensors(sensors: Vec<Arc<dyn Sensor>>) -> Self {
        Self {
            sensors,
            events: Mutex::new(Vec::new()),
            keypad: Mutex::new(None),
        }
    }

    /// Board with `count` accelerometers with fresh serials.
    pub fn with_accelerometers(count: usize) -> Self {
        Self::with_sensors(
            (0..count)
                .map(|_| {
                    Arc::new(MockAccelerometer::new(Uuid::new_v4(), MOCK_ACCELEROMETER_TYPE))
                        as Arc<dyn Sensor>
                })
                .collect(),
        )
    }

    /// Board carrying one accelerometer per configured sensor, so every
    /// binding resolves.
    pub fn from_config(config: &SystemConfig) -> Self {
        Self::with_sensors(
            config
                .sensors
                .values()
                .map(|sensor| {
                    Arc::new(MockAccelerometer::new(sensor.binding, sensor.type_id)) as Arc<dyn Sensor>
                })
                .collect(),
        )
    }

    /// Everything the board has been asked to do, oldest first.
    pub fn events(&self) -> Vec<MockEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Simulate a key press.
    pub fn press(&self, key: char) {
        let keypad = self.keypad.lock().unwrap_or_else(PoisonError::into_inner);
        match keypad.as_ref() {
            Some(callback) => callback(key),
            None => debug!("key {:?} pressed with no keypad handler", key),
        }
    }

    fn record(&self, event: MockEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    fn set_sync_light(&self, on: bool) -> Result<(), PlatformError> {
        info!("sync light {}", if on { "on" } else { "off" });
        self.record(MockEvent::SyncLight(on));
        Ok(())
    }

    fn set_buzzer(&self, on: bool) -> Result<(), PlatformError> {
        info!("buzzer {}", if on { "on" } else { "off" });
        self.record(MockEvent::Buzzer(on));
        Ok(())
    }

    fn sensors(&self) -> Vec<Arc<dyn Sensor>> {
        self.sensors.clone()
    }

    fn set_keypad_callback(&self, callback: KeypadCallback) {
        *self.keypad.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }
}

/// Three-axis accelerometer producing a slow deterministic wobble.
pub struct MockAccelerometer {
    serial: Uuid,
    type_id: Uuid,
    reads: AtomicU64,
}

impl MockAccelerometer {
    pub fn new(serial: Uuid, type_id: Uuid) -> Self {
        Self {
            serial,
            type_id,
            reads: AtomicU64::new(0),
        }
    }
}

impl Sensor for MockAccelerometer {
    fn serial(&self) -> Uuid {
        self.serial
    }

    fn type_id(&self) -> Uuid {
        self.type_id
    }

    fn read_sample(&self) -> Result<String, PlatformError> {
        let n = self.reads.fetch_add(1, Ordering::Relaxed) as f64;
        let x = (n * 0.1).sin() * 0.05;
        let y = 0.98 + (n * 0.07).cos() * 0.02;
        let z = (n * 0.13).sin() * 0.03;
        Ok(format!("({:.3},{:.3},{:.3})", x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_from_config_matches_bindings() {
        let config = SystemConfig::from_toml_str(
            r#"
[sensors.fork]
binding = "0b8c7e4a-0f1d-4c53-8d0e-2d0f5b2e8a61"
type = "fe3c4af2-feb4-4c9b-a717-2d0db3052293"
"#,
        )
        .unwrap();

        let platform = MockPlatform::from_config(&config);
        let sensors = platform.sensors();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].serial(), config.sensors["fork"].binding);
        assert_eq!(sensors[0].type_id(), config.sensors["fork"].type_id);
    }

    #[test]
    fn test_accelerometer_readings_look_like_vectors() {
        let sensor = MockAccelerometer::new(Uuid::new_v4(), MOCK_ACCELEROMETER_TYPE);
        let first = sensor.read_sample().unwrap();
        let second = sensor.read_sample().unwrap();

        assert!(first.starts_with('(') && first.ends_with(')'));
        assert_eq!(first.split(',').count(), 3);
        assert_ne!(first, second);
    }

    #[test]
    fn test_press_without_handler_is_ignored() {
        let platform = MockPlatform::new();
        platform.press('1');

        let pressed = Arc::new(AtomicUsize::new(0));
        let counter = pressed.clone();
        platform.set_keypad_callback(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        platform.press('1');
        assert_eq!(pressed.load(Ordering::SeqCst), 1);
    }
}
