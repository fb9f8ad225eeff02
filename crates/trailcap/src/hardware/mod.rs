//! Hardware context: the platform, its bound sensors, and side effects.
//!
//! ```text
//! Keypad ──▶ keypad callback ──▶ SignalSender ──▶ SessionController
//!                                                       │
//!             ┌─────────────────────────────────────────┤
//!             ▼                                         ▼
//!   flash_sync_light / sound_buzzer              Sampler reads sensors
//!   (short-lived named threads)                  through `Hardware::read_all`
//! ```

pub mod board;
pub mod mock;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use trailconf::SystemConfig;
use uuid::Uuid;

use crate::signal::{Reply, Signal, SignalSender};

pub use board::{BoardError, BoardKind, BoardRegistry};

/// Errors raised by platform implementations.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("I/O error on {target}: {source}")]
    Io {
        target: String,
        source: std::io::Error,
    },

    #[error("sensor {serial} unavailable: {message}")]
    Sensor { serial: Uuid, message: String },

    #[error("platform initialization failed: {0}")]
    Init(String),
}

/// Callback invoked with each key pressed on the device keypad.
pub type KeypadCallback = Box<dyn Fn(char) + Send + Sync>;

/// Capabilities a system board exposes.
pub trait Platform: Send + Sync {
    fn set_sync_light(&self, on: bool) -> Result<(), PlatformError>;

    fn set_buzzer(&self, on: bool) -> Result<(), PlatformError>;

    /// Every sensor attached to the board.
    fn sensors(&self) -> Vec<Arc<dyn Sensor>>;

    /// Replace the keypad handler.
    fn set_keypad_callback(&self, callback: KeypadCallback);
}

/// One physical sensor.
pub trait Sensor: Send + Sync {
    /// Serial UUID; configuration binds sensor names to it.
    fn serial(&self) -> Uuid;

    /// UUID of the sensor type, which fixes the raw reading encoding.
    fn type_id(&self) -> Uuid;

    /// Take one raw reading.
    fn read_sample(&self) -> Result<String, PlatformError>;
}

/// The platform plus the sensors bound to configured names.
pub struct Hardware {
    platform: Arc<dyn Platform>,
    sensors: BTreeMap<String, Arc<dyn Sensor>>,
}

impl Hardware {
    /// Resolve sensor bindings from config against the platform's sensors.
    ///
    /// Names whose serial is not present on the board are left unbound and
    /// logged; their samples read as empty strings.
    pub fn new(platform: Arc<dyn Platform>, config: &SystemConfig) -> Self {
        let attached: HashMap<Uuid, Arc<dyn Sensor>> = platform
            .sensors()
            .into_iter()
            .map(|sensor| (sensor.serial(), sensor))
            .collect();

        for (serial, sensor) in &attached {
            info!("found sensor {} of type {}", serial, sensor.type_id());
        }

        let mut sensors = BTreeMap::new();
        for (name, serial) in config.sensor_bindings() {
            match attached.get(&serial) {
                Some(sensor) => {
                    debug!("bound sensor {:?} to {}", name, serial);
                    sensors.insert(name, Arc::clone(sensor));
                }
                None => warn!("sensor {:?} is bound to {}, which is not attached", name, serial),
            }
        }

        Self { platform, sensors }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Bound sensors by configured name.
    pub fn sensors(&self) -> &BTreeMap<String, Arc<dyn Sensor>> {
        &self.sensors
    }

    /// Read every named sensor once. Unbound or failing sensors read as `""`.
    pub fn read_all<'a, I>(&self, names: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .map(|name| {
                let value = match self.sensors.get(name) {
                    Some(sensor) => sensor.read_sample().unwrap_or_else(|e| {
                        warn!("reading {:?} failed: {}", name, e);
                        String::new()
                    }),
                    None => String::new(),
                };
                (name.to_string(), value)
            })
            .collect()
    }

    /// Toggle the sync light through `durations` (ms), starting from off.
    ///
    /// Runs on its own thread; the light is always left off.
    pub fn flash_sync_light(&self, durations: Vec<u64>) {
        let platform = Arc::clone(&self.platform);
        let spawned = thread::Builder::new()
            .name("sync-light".to_string())
            .spawn(move || {
                let run = || -> Result<(), PlatformError> {
                    let mut state = false;
                    platform.set_sync_light(state)?;
                    for wait in durations {
                        state = !state;
                        platform.set_sync_light(state)?;
                        thread::sleep(Duration::from_millis(wait));
                    }
                    platform.set_sync_light(false)
                };
                if let Err(e) = run() {
                    error!("flashing sync light failed: {}", e);
                }
            });
        if let Err(e) = spawned {
            error!("could not start sync light thread: {}", e);
        }
    }

    /// Sound the buzzer for `duration_ms` on its own thread.
    pub fn sound_buzzer(&self, duration_ms: u64) {
        let platform = Arc::clone(&self.platform);
        let spawned = thread::Builder::new()
            .name("buzzer".to_string())
            .spawn(move || {
                let run = || -> Result<(), PlatformError> {
                    platform.set_buzzer(true)?;
                    thread::sleep(Duration::from_millis(duration_ms));
                    platform.set_buzzer(false)
                };
                if let Err(e) = run() {
                    error!("sounding buzzer failed: {}", e);
                }
            });
        if let Err(e) = spawned {
            error!("could not start buzzer thread: {}", e);
        }
    }

    /// Route keypad presses into `sender`.
    pub fn connect_keypad(&self, sender: SignalSender) {
        self.platform.set_keypad_callback(Box::new(move |key| {
            let Some(signal) = signal_for_key(key) else {
                debug!("ignoring key {:?}", key);
                return;
            };
            if sender.enqueue(signal).is_err() {
                warn!("key {:?} pressed after the controller stopped", key);
            }
        }));
    }
}

/// Keypad mapping: `1` starts a capture, `4` ends it.
///
/// Replies are logged at debug level.
pub fn signal_for_key(key: char) -> Option<Signal> {
    let reply = move |message: String| {
        debug!("Result of \"{}\" key pressed: {}", key, message);
    };
    match key {
        '1' => Some(Signal::StartCapture(Reply::new(reply))),
        '4' => Some(Signal::EndCapture(Reply::new(reply))),
        _ => None,
    }
}
