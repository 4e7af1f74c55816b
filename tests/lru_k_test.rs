//! Integration tests for the LRU-K replacer

use tarn::buffer::{AccessType, LruKReplacer};
use tarn::common::FrameId;

#[test]
fn test_lru_k_eviction_order() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..5 {
        replacer.record_access(FrameId::new(i), AccessType::Unknown);
        replacer.set_evictable(FrameId::new(i), true);
    }

    assert_eq!(replacer.size(), 5);

    // All frames have one access (< k=2), so all have infinite distance
    // and go out in order of first access.
    for i in 0..5 {
        assert_eq!(replacer.evict(), Some(FrameId::new(i)));
    }

    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_distance_scenario() {
    // K = 2; frame 1 accessed once, frame 2 at t=2,3, frame 3 at t=4,5,6.
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(1), AccessType::Unknown);
    replacer.record_access(FrameId::new(2), AccessType::Unknown);
    replacer.record_access(FrameId::new(2), AccessType::Unknown);
    for _ in 0..3 {
        replacer.record_access(FrameId::new(3), AccessType::Unknown);
    }

    for i in 1..=3 {
        replacer.set_evictable(FrameId::new(i), true);
    }

    // Frame 1 is the only one with fewer than k accesses.
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));

    // Frames 2 and 3 both have two recorded accesses; frame 2's k-th most
    // recent is older, so it loses the tie.
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), Some(FrameId::new(3)));
}

#[test]
fn test_lru_k_pinned_frames_not_evicted() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..3 {
        replacer.record_access(FrameId::new(i), AccessType::Unknown);
    }
    replacer.set_evictable(FrameId::new(1), true);
    replacer.set_evictable(FrameId::new(2), true);

    assert_eq!(replacer.size(), 2);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(2)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_toggle_evictable() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0), AccessType::Unknown);
    replacer.set_evictable(FrameId::new(0), true);
    assert_eq!(replacer.size(), 1);

    replacer.set_evictable(FrameId::new(0), false);
    assert_eq!(replacer.size(), 0);
    assert_eq!(replacer.evict(), None);

    replacer.set_evictable(FrameId::new(0), true);
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_remove() {
    let replacer = LruKReplacer::new(2, 10);

    replacer.record_access(FrameId::new(0), AccessType::Unknown);
    replacer.record_access(FrameId::new(1), AccessType::Unknown);
    replacer.set_evictable(FrameId::new(0), true);
    replacer.set_evictable(FrameId::new(1), true);

    assert_eq!(replacer.size(), 2);

    replacer.remove(FrameId::new(0));
    assert_eq!(replacer.size(), 1);
    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), None);
}

#[test]
fn test_lru_k_reaccess_reorders() {
    let replacer = LruKReplacer::new(2, 10);

    for i in 0..2 {
        replacer.record_access(FrameId::new(i), AccessType::Unknown);
        replacer.record_access(FrameId::new(i), AccessType::Unknown);
        replacer.set_evictable(FrameId::new(i), true);
    }

    // Two more touches push frame 0's k-th most recent access past both
    // of frame 1's, flipping the eviction order.
    replacer.record_access(FrameId::new(0), AccessType::Lookup);
    replacer.record_access(FrameId::new(0), AccessType::Lookup);

    assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    assert_eq!(replacer.evict(), Some(FrameId::new(0)));
}

#[test]
fn test_lru_k_concurrent_access() {
    use std::sync::Arc;
    use std::thread;

    let replacer = Arc::new(LruKReplacer::new(2, 100));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let replacer = Arc::clone(&replacer);
            thread::spawn(move || {
                for i in 0..25 {
                    let frame_id = FrameId::new((t * 25 + i) as u32);
                    replacer.record_access(frame_id, AccessType::Unknown);
                    replacer.set_evictable(frame_id, true);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(replacer.size(), 100);

    for _ in 0..100 {
        assert!(replacer.evict().is_some());
    }
    assert_eq!(replacer.size(), 0);
}
