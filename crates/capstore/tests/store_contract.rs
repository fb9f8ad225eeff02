//! Every backend, with and without compression, honours the same contract.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use capstore::table::{CAPTURES_TABLE, DATA_TABLE};
use capstore::{
    Capture, CaptureError, CaptureStore, CompressedStore, FileStore, MemoryStore, MemoryTable,
    StoreError, TableStore,
};
use tempfile::TempDir;
use uuid::Uuid;

fn memory_table(page_size: usize) -> MemoryTable {
    let table = MemoryTable::with_page_size(page_size);
    table.create_table(DATA_TABLE, "ID");
    table.create_table(CAPTURES_TABLE, "LOCATION");
    table
}

/// Each backend paired with a name for assertion messages. The TempDir must
/// outlive the file-backed stores.
fn backends() -> (TempDir, Vec<(&'static str, Arc<dyn CaptureStore>)>) {
    let temp_dir = TempDir::new().expect("temp dir");
    let file_plain = FileStore::at_path(temp_dir.path().join("plain")).expect("file store");
    let file_packed = FileStore::at_path(temp_dir.path().join("packed")).expect("file store");

    let stores: Vec<(&'static str, Arc<dyn CaptureStore>)> = vec![
        ("memory", Arc::new(MemoryStore::new())),
        ("memory+zstd", Arc::new(CompressedStore::new(MemoryStore::new()))),
        ("file", Arc::new(file_plain)),
        ("file+zstd", Arc::new(CompressedStore::new(file_packed))),
        ("table", Arc::new(TableStore::new(memory_table(3), Uuid::new_v4()))),
        (
            "table+zstd",
            Arc::new(CompressedStore::new(TableStore::new(
                memory_table(3),
                Uuid::new_v4(),
            ))),
        ),
    ];
    (temp_dir, stores)
}

#[test]
fn write_read_delete_hash_scenario() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        let k1 = Uuid::new_v4();
        store.write(&k1, "hello").unwrap();
        assert_eq!(store.read(&k1).unwrap().as_deref(), Some("hello"), "{}", name);

        store.delete(&k1).unwrap();
        assert_eq!(store.read(&k1).unwrap(), None, "{}", name);
        assert_eq!(store.hashes(&[k1]).unwrap()[&k1], "", "{}", name);
    }
}

#[test]
fn hashes_are_stable_until_written() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        let key = Uuid::new_v4();
        store.write(&key, "one").unwrap();

        let first = store.hashes(&[key]).unwrap()[&key].clone();
        let again = store.hashes(&[key]).unwrap()[&key].clone();
        assert_eq!(first, again, "{}", name);
        assert!(first.parse::<i32>().is_ok(), "{}: {}", name, first);

        store.write(&key, "two").unwrap();
        let changed = store.hashes(&[key]).unwrap()[&key].clone();
        assert_ne!(first, changed, "{}", name);
    }
}

#[test]
fn keys_are_complete_and_unique_across_pages() {
    let (_dir, stores) = backends();
    for (name, store) in stores {
        let written: HashSet<Uuid> = (0..20).map(|_| Uuid::new_v4()).collect();
        for key in &written {
            store.write(key, "x").unwrap();
        }

        let listed: Vec<Uuid> = store.keys().collect::<Result<_, _>>().unwrap();
        let unique: HashSet<Uuid> = listed.iter().copied().collect();
        assert_eq!(listed.len(), unique.len(), "{} yielded duplicates", name);
        assert_eq!(unique, written, "{}", name);
    }
}

#[test]
fn compression_round_trips_byte_for_byte() {
    let (_dir, stores) = backends();
    let values = [
        String::new(),
        "ascii only".to_string(),
        "Ünïcödé ✓ 多字节 🚵".to_string(),
        "(0.01,0.98,0.02)\n".repeat(500),
    ];
    for (name, store) in stores {
        for value in &values {
            let key = Uuid::new_v4();
            store.write(&key, value).unwrap();
            assert_eq!(store.read(&key).unwrap().as_ref(), Some(value), "{}", name);
        }
    }
}

#[test]
fn capture_round_trips_through_every_backend() {
    let (_dir, stores) = backends();
    let types: BTreeMap<String, Uuid> = [
        ("Front Fork".to_string(), Uuid::new_v4()),
        ("Rear Shock".to_string(), Uuid::new_v4()),
    ]
    .into();

    for (name, store) in stores {
        let mut capture = Capture::new(29.97, types.clone()).unwrap();
        for i in 0..10 {
            let values: HashMap<String, String> = [
                ("Front Fork".to_string(), format!("{}", i)),
                ("Rear Shock".to_string(), format!("-{}", i)),
            ]
            .into();
            capture.add_sample(values).unwrap();
        }
        capture.save(&*store).unwrap();

        let loaded = Capture::load(&*store, capture.id()).unwrap();
        assert_eq!(loaded.sensor_types(), &types, "{}", name);
        assert_eq!(loaded.frequency(), 29.97, "{}", name);
        assert_eq!(loaded.created_time(), capture.created_time(), "{}", name);

        let interval = capture.sample_interval();
        for (live, stored) in capture.samples().iter().zip(loaded.samples()) {
            assert_eq!(live.values(), stored.values(), "{}", name);
            let expected = capture.created_time() + interval * live.index() as i32;
            let drift = (stored.timestamp() - expected).abs();
            // Derived times are exact; the last keeps its wall clock
            if live.index() + 1 < capture.samples().len() {
                assert_eq!(drift, chrono::Duration::zero(), "{}", name);
            }
        }

        assert!(store.capture_locations().unwrap().contains(&capture.id()), "{}", name);
        let description = store.capture_description(&capture.id()).unwrap().unwrap();
        assert_eq!(description.frequency, 29.97, "{}", name);
    }
}

#[test]
fn table_outage_surfaces_from_save() {
    let store = TableStore::new(memory_table(10), Uuid::new_v4());
    store.client().set_unavailable(true);

    let mut capture = Capture::new(10.0, BTreeMap::new()).unwrap();
    let err = capture.save(&store).unwrap_err();
    assert!(matches!(err, CaptureError::Store(StoreError::Service { .. })));
}
