//! Field capture recorder.
//!
//! A capture session is driven by signals:
//! - **[`signal`]**: the queue producers push start/end signals into
//! - **[`controller`]**: the state machine consuming them
//! - **[`session`]**: the sampler thread filling the live capture
//! - **[`hardware`]**: platform, sensor bindings, keypad and side effects
//!
//! Captures are persisted through [`capstore`]; configuration comes from
//! [`trailconf`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trailcap::controller::{CaptureContext, SessionController};
//! use trailcap::hardware::{BoardRegistry, Hardware};
//! use trailcap::signal::{signal_queue, Reply, Signal};
//!
//! let config = trailconf::SystemConfig::load().unwrap();
//! let platform = BoardRegistry::with_defaults().build_configured(&config).unwrap();
//! let store = capstore::open(&config.store, config.system.id).unwrap();
//!
//! let context = CaptureContext {
//!     hardware: Arc::new(Hardware::new(platform, &config)),
//!     config: Arc::new(config),
//!     store,
//! };
//! let (sender, queue) = signal_queue();
//! let controller = std::thread::spawn(move || SessionController::new(context, queue).run());
//!
//! sender.enqueue(Signal::StartCapture(Reply::new(|m| println!("{}", m)))).unwrap();
//! sender.enqueue(Signal::EndCapture(Reply::new(|m| println!("{}", m)))).unwrap();
//! sender.interrupt();
//! controller.join().unwrap();
//! ```

pub mod controller;
pub mod hardware;
pub mod session;
pub mod signal;
pub mod telemetry;

pub use controller::{CaptureContext, SessionController};
pub use signal::{signal_queue, Reply, Signal, SignalQueue, SignalSender};
