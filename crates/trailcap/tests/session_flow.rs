//! End-to-end session runs on a controller thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use capstore::{Capture, CaptureStore, MemoryStore};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio::sync::oneshot;
use trailcap::controller::{
    CaptureContext, SessionController, CAPTURE_RUNNING, CAPTURE_SAVED, CAPTURE_STARTED,
    NO_CAPTURE_RUNNING,
};
use trailcap::hardware::mock::MockPlatform;
use trailcap::hardware::Hardware;
use trailcap::signal::{signal_queue, Reply, Signal, SignalSender, SHUTDOWN_REPLY};
use trailconf::{StoreKind, SystemConfig};

const CONFIG: &str = r#"
[system]
id = "6f1c2f0e-31a4-4f7e-9d55-0d6a3b1f9c11"
board = "mock"
frequency = 50.0

[sensors."Front Fork"]
binding = "0b8c7e4a-0f1d-4c53-8d0e-2d0f5b2e8a61"
type = "3906c164-82c8-48f8-a154-a39a9d0269fa"

[sensors."Rear Shock"]
binding = "1c9d8f5b-1a2e-4d64-9e1f-3e1a6c3f9b72"
type = "3906c164-82c8-48f8-a154-a39a9d0269fa"
"#;

struct Harness {
    sender: SignalSender,
    controller: JoinHandle<()>,
    store: Arc<dyn CaptureStore>,
    platform: Arc<MockPlatform>,
}

fn start(config: SystemConfig, store: Arc<dyn CaptureStore>) -> Harness {
    let platform = Arc::new(MockPlatform::from_config(&config));
    let hardware = Arc::new(Hardware::new(platform.clone(), &config));
    let context = CaptureContext {
        config: Arc::new(config),
        hardware: hardware.clone(),
        store: store.clone(),
    };

    let (sender, queue) = signal_queue();
    hardware.connect_keypad(sender.clone());
    let controller = thread::Builder::new()
        .name("session-controller".to_string())
        .spawn(move || SessionController::new(context, queue).run())
        .expect("spawn controller");

    Harness {
        sender,
        controller,
        store,
        platform,
    }
}

fn memory_harness() -> Harness {
    let config = SystemConfig::from_toml_str(CONFIG).expect("config");
    start(config, Arc::new(MemoryStore::new()))
}

fn send(sender: &SignalSender, make: fn(Reply) -> Signal) -> String {
    let (reply, rx): (Reply, oneshot::Receiver<String>) = Reply::channel();
    sender.enqueue(make(reply)).expect("queue open");
    rx.blocking_recv().expect("reply")
}

fn shutdown(harness: Harness) {
    harness.sender.interrupt();
    harness.controller.join().expect("controller panicked");
}

#[test]
fn start_then_end_saves_capture() {
    let harness = memory_harness();

    assert_eq!(send(&harness.sender, Signal::StartCapture), CAPTURE_STARTED);
    thread::sleep(Duration::from_millis(120));
    assert_eq!(send(&harness.sender, Signal::EndCapture), CAPTURE_SAVED);

    let locations = harness.store.capture_locations().unwrap();
    assert_eq!(locations.len(), 1);

    let capture = Capture::load(&*harness.store, locations[0]).unwrap();
    assert_eq!(
        capture.sensor_names().into_iter().collect::<Vec<_>>(),
        vec!["Front Fork", "Rear Shock"]
    );
    assert_eq!(capture.frequency(), 50.0);
    assert!(capture.samples().len() >= 2);
    for (i, sample) in capture.samples().iter().enumerate() {
        assert_eq!(sample.index(), i);
        assert_eq!(sample.values().len(), 2);
    }
    let last = capture.samples().last().unwrap();
    assert!(!last.values()["Front Fork"].is_empty());
    assert!(!last.values()["Rear Shock"].is_empty());

    shutdown(harness);
}

#[test]
fn end_without_start_is_rejected() {
    let harness = memory_harness();

    assert_eq!(send(&harness.sender, Signal::EndCapture), NO_CAPTURE_RUNNING);
    assert!(harness.store.capture_locations().unwrap().is_empty());

    shutdown(harness);
}

#[test]
fn second_start_does_not_disturb_session() {
    let harness = memory_harness();

    assert_eq!(send(&harness.sender, Signal::StartCapture), CAPTURE_STARTED);
    assert_eq!(send(&harness.sender, Signal::StartCapture), CAPTURE_RUNNING);
    assert_eq!(send(&harness.sender, Signal::EndCapture), CAPTURE_SAVED);

    // One session, one capture
    assert_eq!(harness.store.capture_locations().unwrap().len(), 1);
    shutdown(harness);
}

#[test]
fn interrupt_mid_session_saves_nothing() {
    let harness = memory_harness();

    assert_eq!(send(&harness.sender, Signal::StartCapture), CAPTURE_STARTED);
    thread::sleep(Duration::from_millis(40));
    let store = harness.store.clone();
    let sender = harness.sender.clone();
    shutdown(harness);

    assert!(store.capture_locations().unwrap().is_empty());
    assert_eq!(store.keys().count(), 0);

    // The queue is gone; late signals still get an answer
    assert_eq!(send_after_shutdown(&sender), SHUTDOWN_REPLY);
}

fn send_after_shutdown(sender: &SignalSender) -> String {
    let (reply, rx) = Reply::channel();
    let _ = sender.enqueue(Signal::StartCapture(reply));
    rx.blocking_recv().expect("reply")
}

#[test]
fn keypad_drives_a_session() {
    let harness = memory_harness();

    harness.platform.press('1');
    thread::sleep(Duration::from_millis(80));
    harness.platform.press('4');

    // Keypad replies are only logged; wait for the save to land
    let mut saved = false;
    for _ in 0..100 {
        if !harness.store.capture_locations().unwrap().is_empty() {
            saved = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(saved, "keypad session was not saved");
    shutdown(harness);
}

#[test]
fn session_persists_to_compressed_file_store() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = SystemConfig::from_toml_str(CONFIG).unwrap();
    config.store.kind = StoreKind::File;
    config.store.compress = true;
    config.store.path = temp_dir.path().to_path_buf();

    let store = capstore::open(&config.store, config.system.id).unwrap();
    let harness = start(config.clone(), store);

    assert_eq!(send(&harness.sender, Signal::StartCapture), CAPTURE_STARTED);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(send(&harness.sender, Signal::EndCapture), CAPTURE_SAVED);
    shutdown(harness);

    // A fresh store over the same directory sees the capture
    let reopened = capstore::open(&config.store, config.system.id).unwrap();
    let locations = reopened.capture_locations().unwrap();
    assert_eq!(locations.len(), 1);
    let capture = Capture::load(&*reopened, locations[0]).unwrap();
    assert_eq!(capture.sensor_types(), &config.sensor_types());
}
