//! Integration tests for the update sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use mumble_link_bridge::link::record::{LinkRecord, RECORD_SIZE, TICK_OFFSET};
use mumble_link_bridge::link::region::{LinkRegion, MappedRegion};
use mumble_link_bridge::link::{LinkLocation, PositionMessage, RecordEncoder};
use mumble_link_bridge::sink::{ApplyOutcome, UpdateSink};
use mumble_link_bridge::BridgeError;

use super::test_helpers::{create_link_file, linked_sink, read_link_file};

fn seed_tick(path: &std::path::Path, tick: u32) {
    let mut raw = std::fs::read(path).expect("read link file");
    raw[TICK_OFFSET..TICK_OFFSET + 4].copy_from_slice(&tick.to_le_bytes());
    std::fs::write(path, raw).expect("write link file");
}

/// In-memory region whose next `failing_flushes` flushes fail.
struct FlakyFlushRegion {
    bytes: Arc<Mutex<[u8; RECORD_SIZE]>>,
    failing_flushes: Arc<AtomicUsize>,
    location: LinkLocation,
}

impl LinkRegion for FlakyFlushRegion {
    fn location(&self) -> &LinkLocation {
        &self.location
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> mumble_link_bridge::Result<()> {
        let bytes = self.bytes.lock().expect("region lock");
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> mumble_link_bridge::Result<()> {
        let mut bytes = self.bytes.lock().expect("region lock");
        bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> mumble_link_bridge::Result<()> {
        let pending = self.failing_flushes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_flushes.store(pending - 1, Ordering::SeqCst);
            return Err(BridgeError::Region("flush refused".into()));
        }
        Ok(())
    }
}

#[test]
fn apply_writes_record_to_region() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (sink, path) = linked_sink(temp.path());

    let message =
        PositionMessage::from_json(r#"{"name":"Alice","fAvatarPosition":[1,2,3]}"#).expect("valid");
    sink.apply(&message);

    let snapshot = read_link_file(&path).decode();
    assert_eq!(snapshot.tick, 1);
    assert_eq!(snapshot.name, "Alice");
    assert_eq!(snapshot.avatar_position, [1.0, 2.0, 3.0]);
    assert_eq!(snapshot.camera_position, [1.0, 2.0, 3.0]);
    assert_eq!(sink.tick(), 1);
}

#[test]
fn tick_is_seeded_from_existing_region() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = create_link_file(temp.path(), RECORD_SIZE);
    seed_tick(&path, 41);

    let region = MappedRegion::open(&path).expect("map");
    let sink = UpdateSink::with_region(Box::new(region), RecordEncoder::default());
    assert_eq!(sink.tick(), 41);

    let outcome = sink
        .try_apply(&PositionMessage::default())
        .expect("apply succeeds");
    assert_eq!(outcome, ApplyOutcome::Written(42));
    assert_eq!(read_link_file(&path).tick(), 42);
}

#[test]
fn tick_after_n_updates_wraps_modulo_u32() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = create_link_file(temp.path(), RECORD_SIZE);
    seed_tick(&path, u32::MAX - 2);

    let region = MappedRegion::open(&path).expect("map");
    let sink = UpdateSink::with_region(Box::new(region), RecordEncoder::default());

    for _ in 0..5 {
        sink.apply(&PositionMessage::default());
    }

    assert_eq!(sink.tick(), 2);
    assert_eq!(read_link_file(&path).tick(), 2);
}

#[test]
fn missing_region_makes_apply_a_no_op() {
    let temp = tempfile::tempdir().expect("tempdir");
    let location = LinkLocation::Path(temp.path().join("MumbleLink.absent"));

    let sink = UpdateSink::open(location, RecordEncoder::default(), None);
    assert!(!sink.is_linked());

    let outcome = sink
        .try_apply(&PositionMessage::default())
        .expect("no-op is not an error");
    assert_eq!(outcome, ApplyOutcome::Detached);
    sink.apply(&PositionMessage::default());
    assert_eq!(sink.tick(), 0);
}

#[test]
fn sink_links_once_region_appears() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("MumbleLink.late");
    let sink = UpdateSink::open(
        LinkLocation::Path(path.clone()),
        RecordEncoder::default(),
        Some(Duration::from_millis(50)),
    );
    assert!(!sink.is_linked());

    std::fs::write(&path, vec![0u8; RECORD_SIZE]).expect("create region");
    thread::sleep(Duration::from_millis(100));

    let outcome = sink
        .try_apply(&PositionMessage::default())
        .expect("apply succeeds");
    assert_eq!(outcome, ApplyOutcome::Written(1));
    assert!(sink.is_linked());
    assert_eq!(read_link_file(&path).tick(), 1);
}

#[test]
fn disabled_relink_never_attaches() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("MumbleLink.late");
    let sink = UpdateSink::open(LinkLocation::Path(path.clone()), RecordEncoder::default(), None);

    std::fs::write(&path, vec![0u8; RECORD_SIZE]).expect("create region");

    let outcome = sink
        .try_apply(&PositionMessage::default())
        .expect("apply succeeds");
    assert_eq!(outcome, ApplyOutcome::Detached);
}

#[test]
fn close_releases_region() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (sink, path) = linked_sink(temp.path());
    sink.apply(&PositionMessage::default());

    sink.close();
    assert!(!sink.is_linked());

    let outcome = sink
        .try_apply(&PositionMessage::default())
        .expect("no-op is not an error");
    assert_eq!(outcome, ApplyOutcome::Detached);
    assert_eq!(read_link_file(&path).tick(), 1);
}

#[test]
fn concurrent_updates_are_all_counted() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = create_link_file(temp.path(), RECORD_SIZE);
    seed_tick(&path, 500);

    let region = MappedRegion::open(&path).expect("map");
    let sink = Arc::new(UpdateSink::with_region(
        Box::new(region),
        RecordEncoder::default(),
    ));

    let handles: Vec<_> = ["Alice", "Bob"]
        .into_iter()
        .map(|name| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let message = PositionMessage {
                    name: Some(name.into()),
                    ..PositionMessage::default()
                };
                for _ in 0..1000 {
                    sink.apply(&message);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread");
    }

    let snapshot = read_link_file(&path).decode();
    assert_eq!(sink.tick(), 2500);
    assert_eq!(snapshot.tick, 2500);
    assert!(snapshot.name == "Alice" || snapshot.name == "Bob");
}

#[test]
fn failed_flush_still_advances_tick() {
    let bytes = Arc::new(Mutex::new([0u8; RECORD_SIZE]));
    let failing_flushes = Arc::new(AtomicUsize::new(0));
    let region = FlakyFlushRegion {
        bytes: Arc::clone(&bytes),
        failing_flushes: Arc::clone(&failing_flushes),
        location: LinkLocation::Path("in-memory".into()),
    };
    let sink = UpdateSink::with_region(Box::new(region), RecordEncoder::default());
    let read_back = || LinkRecord::from_bytes(*bytes.lock().expect("region lock"));

    let first = sink
        .try_apply(&PositionMessage::default())
        .expect("apply succeeds");
    assert_eq!(first, ApplyOutcome::Written(1));

    failing_flushes.store(1, Ordering::SeqCst);
    let err = sink
        .try_apply(&PositionMessage::default())
        .expect_err("flush fails");
    assert!(matches!(err, BridgeError::Region(_)));
    assert_eq!(read_back().tick(), 2);
    assert_eq!(sink.tick(), 2);
    assert!(sink.is_linked());

    let third = sink
        .try_apply(&PositionMessage::default())
        .expect("apply succeeds");
    assert_eq!(third, ApplyOutcome::Written(3));
    assert_eq!(read_back().tick(), 3);
}
