//! Sampler: fills the live capture at its frequency until stopped.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use capstore::{Capture, CaptureError};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::hardware::Hardware;

/// Handle to a running sampler thread.
pub struct Sampler {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Sampler {
    /// Spawn a thread appending one sample per interval to `capture`.
    ///
    /// Sample `i` is taken at `created_time + i * interval`. Slots missed
    /// because a read ran long are recorded with empty values at their slot
    /// time, so sample indices keep matching the schedule.
    pub fn start(capture: Arc<Mutex<Capture>>, hardware: Arc<Hardware>) -> io::Result<Self> {
        let (id, schedule, names) = {
            let capture = capture.lock().unwrap_or_else(PoisonError::into_inner);
            let interval = capture
                .sample_interval()
                .to_std()
                .unwrap_or(Duration::from_millis(1));
            // Anchor the monotonic schedule at the capture's creation time
            let lead = (Utc::now() - capture.created_time())
                .to_std()
                .unwrap_or_default();
            let anchor = Instant::now().checked_sub(lead).unwrap_or_else(Instant::now);
            let names: Vec<String> = capture.sensor_names().into_iter().map(str::to_string).collect();
            (capture.id(), Schedule { anchor, interval }, names)
        };

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        info!("sampling capture {} every {:?}", id, schedule.interval);
        let thread_handle = thread::Builder::new()
            .name(format!("sampler-{}", id.simple()))
            .spawn(move || run_sampling_loop(capture, hardware, names, schedule, running_clone))?;

        Ok(Self {
            running,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop sampling and wait for the thread to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                error!("sampler thread panicked");
            }
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Fixed sampling grid on the monotonic clock.
#[derive(Debug, Clone, Copy)]
struct Schedule {
    anchor: Instant,
    interval: Duration,
}

impl Schedule {
    /// When slot `index` is due, or `None` past the clock's range.
    fn due(&self, index: usize) -> Option<Instant> {
        let nanos = self.interval.as_nanos().checked_mul(index as u128)?;
        let offset = Duration::from_nanos(u64::try_from(nanos).ok()?);
        self.anchor.checked_add(offset)
    }

    /// The slot `now` falls in.
    fn slot_at(&self, now: Instant) -> usize {
        let elapsed = now.saturating_duration_since(self.anchor).as_nanos();
        let slot = elapsed / self.interval.as_nanos().max(1);
        usize::try_from(slot).unwrap_or(usize::MAX)
    }
}

/// Sleep until `deadline`. Returns false if stopped first.
fn wait_until(deadline: Instant, running: &AtomicBool) -> bool {
    // Woken early by stop()
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
    false
}

fn run_sampling_loop(
    capture: Arc<Mutex<Capture>>,
    hardware: Arc<Hardware>,
    names: Vec<String>,
    schedule: Schedule,
    running: Arc<AtomicBool>,
) {
    let missing: HashMap<String, String> =
        names.iter().map(|name| (name.clone(), String::new())).collect();
    let mut next = 0usize;

    loop {
        let Some(due) = schedule.due(next) else {
            warn!("sample {} is past the schedule's range, sampler exiting", next);
            break;
        };
        if !wait_until(due, &running) {
            break;
        }

        let values = hardware.read_all(names.iter().map(String::as_str));

        let mut capture = capture.lock().unwrap_or_else(PoisonError::into_inner);
        let id = capture.id();
        let slot = schedule.slot_at(Instant::now()).max(next);
        if slot > next {
            warn!("capture {} missed {} samples", id, slot - next);
        }

        let mut result = Ok(());
        while next < slot && result.is_ok() {
            result = capture
                .slot_time(next)
                .and_then(|at| capture.add_sample_at(missing.clone(), at).map(|_| ()));
            next += 1;
        }
        let result = result.and_then(|()| capture.add_sample(values).map(|sample| sample.index()));

        match result {
            Ok(index) => {
                if index % 100 == 0 {
                    debug!("capture {} reached sample {}", id, index);
                }
                next = index + 1;
            }
            Err(CaptureError::Finalized(id)) => {
                debug!("capture {} finalized, sampler exiting", id);
                break;
            }
            Err(e) => {
                error!("adding sample failed: {}", e);
                break;
            }
        }
    }
}
