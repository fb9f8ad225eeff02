//! SessionController: the capture-session state machine.
//!
//! ```text
//!            StartCapture                       EndCapture
//! WaitForStart ─────────▶ Capturing ───────────────────────▶ WaitForEnd
//!      ▲   │ EndCapture       │ StartCapture                    │
//!      │   └─▶ "no capture"   └─▶ "capture running"             │ save
//!      └────────────────────────────────────────────────────────┘
//!
//! interrupt (any waiting state) ──▶ Shutdown
//! ```

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use capstore::{Capture, CaptureStore};
use tracing::{debug, error, info, warn};
use trailconf::SystemConfig;

use crate::hardware::Hardware;
use crate::session::Sampler;
use crate::signal::{Reply, Signal, SignalQueue};

pub const CAPTURE_STARTED: &str = "Capture started.";
pub const NO_CAPTURE_RUNNING: &str = "Error, no capture running.";
pub const CAPTURE_RUNNING: &str = "Error, capture running.";
pub const CAPTURE_SAVED: &str = "Capture saved.";

/// Sync light pattern (ms) flashed when a capture starts, for lining up video.
const START_SYNC_PATTERN: [u64; 6] = [250, 250, 250, 250, 750, 250];
const START_BUZZ_MS: u64 = 150;
const SAVED_BUZZ_MS: u64 = 500;

/// Everything a controller works with.
#[derive(Clone)]
pub struct CaptureContext {
    pub config: Arc<SystemConfig>,
    pub hardware: Arc<Hardware>,
    pub store: Arc<dyn CaptureStore>,
}

/// The capture being recorded and the thread filling it.
pub struct ActiveSession {
    capture: Arc<Mutex<Capture>>,
    sampler: Sampler,
}

pub enum ControllerState {
    WaitForStart,
    Capturing(ActiveSession),
    /// Finalizing, holding the reply of the end signal.
    WaitForEnd(ActiveSession, Reply),
    Shutdown,
}

impl ControllerState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WaitForStart => "WaitForStart",
            Self::Capturing(_) => "Capturing",
            Self::WaitForEnd(..) => "WaitForEnd",
            Self::Shutdown => "Shutdown",
        }
    }
}

pub struct SessionController {
    context: CaptureContext,
    queue: SignalQueue,
    state: ControllerState,
}

impl SessionController {
    pub fn new(context: CaptureContext, queue: SignalQueue) -> Self {
        Self {
            context,
            queue,
            state: ControllerState::WaitForStart,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Process signals until interrupted.
    pub fn run(mut self) {
        info!("session controller running");
        while !matches!(self.state, ControllerState::Shutdown) {
            self.step();
        }
        info!("session controller stopped");
    }

    /// Dequeue and handle one signal, or shut down if interrupted.
    pub fn step(&mut self) {
        match self.queue.dequeue_blocking() {
            Ok(signal) => self.handle(signal),
            Err(_) => self.interrupt(),
        }
    }

    /// Apply one signal, finishing any save it triggers before returning.
    pub fn handle(&mut self, signal: Signal) {
        let state = mem::replace(&mut self.state, ControllerState::Shutdown);
        debug!("{} received {:?}", state.name(), signal.kind());

        self.state = match (state, signal) {
            (ControllerState::WaitForStart, Signal::StartCapture(reply)) => {
                self.start_capture(reply)
            }
            (ControllerState::WaitForStart, Signal::EndCapture(reply)) => {
                reply.send(NO_CAPTURE_RUNNING);
                ControllerState::WaitForStart
            }
            (ControllerState::Capturing(session), Signal::EndCapture(reply)) => {
                ControllerState::WaitForEnd(session, reply)
            }
            (ControllerState::Capturing(session), other) => {
                other.into_reply().send(CAPTURE_RUNNING);
                ControllerState::Capturing(session)
            }
            (ControllerState::WaitForEnd(session, pending), other) => {
                other.into_reply().send(CAPTURE_RUNNING);
                ControllerState::WaitForEnd(session, pending)
            }
            (ControllerState::Shutdown, other) => {
                // Reply drops with the shutdown message
                drop(other);
                ControllerState::Shutdown
            }
        };

        if matches!(self.state, ControllerState::WaitForEnd(..)) {
            self.end_capture();
        }
    }

    /// Leave the loop. A capture in progress is not saved.
    pub fn interrupt(&mut self) {
        match mem::replace(&mut self.state, ControllerState::Shutdown) {
            ControllerState::Capturing(mut session) | ControllerState::WaitForEnd(mut session, _) => {
                session.sampler.stop();
                let capture = session.capture.lock().unwrap_or_else(PoisonError::into_inner);
                warn!(
                    "interrupted during capture {}; {} samples left unsaved",
                    capture.id(),
                    capture.samples().len()
                );
            }
            ControllerState::WaitForStart => info!("interrupted while waiting for start"),
            ControllerState::Shutdown => {}
        }
    }

    fn start_capture(&self, reply: Reply) -> ControllerState {
        let config = &self.context.config;
        let capture = match Capture::new(config.system.frequency, config.sensor_types()) {
            Ok(capture) => capture,
            Err(e) => {
                error!("could not create capture: {}", e);
                reply.send(format!("Error, capture could not be started: {}", e));
                return ControllerState::WaitForStart;
            }
        };
        let id = capture.id();
        let capture = Arc::new(Mutex::new(capture));

        let sampler = match Sampler::start(Arc::clone(&capture), Arc::clone(&self.context.hardware)) {
            Ok(sampler) => sampler,
            Err(e) => {
                error!("could not start sampler: {}", e);
                reply.send(format!("Error, capture could not be started: {}", e));
                return ControllerState::WaitForStart;
            }
        };

        self.context.hardware.sound_buzzer(START_BUZZ_MS);
        self.context.hardware.flash_sync_light(START_SYNC_PATTERN.to_vec());

        info!("started capture {}", id);
        reply.send(CAPTURE_STARTED);
        ControllerState::Capturing(ActiveSession { capture, sampler })
    }

    fn end_capture(&mut self) {
        let ControllerState::WaitForEnd(mut session, reply) =
            mem::replace(&mut self.state, ControllerState::WaitForStart)
        else {
            return;
        };

        session.sampler.stop();
        let mut capture = session.capture.lock().unwrap_or_else(PoisonError::into_inner);

        match capture.save(&*self.context.store) {
            Ok(()) => {
                self.context.hardware.sound_buzzer(SAVED_BUZZ_MS);
                reply.send(CAPTURE_SAVED);
            }
            Err(e) => {
                error!("saving capture {} failed: {}", capture.id(), e);
                reply.send(format!("Error, capture could not be saved: {}", e));
            }
        }
    }
}
