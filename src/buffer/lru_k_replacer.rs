use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// What kind of access touched a frame. Recorded uniformly; kept on the
/// signature so callers can annotate scans versus point lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Unknown,
    Lookup,
    Scan,
    Index,
}

/// Eviction priority of a frame. Smaller orders first, i.e. is evicted
/// first: frames with fewer than k accesses (infinite backward k-distance)
/// come before all others, oldest first access winning; frames with a full
/// history are ordered by their k-th most recent access, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum KDistance {
    Infinite { first_access: Timestamp },
    Finite { kth_recent: Timestamp },
}

/// Tracks access history for a single frame
#[derive(Debug)]
struct FrameAccessInfo {
    /// Last k access timestamps, most recent at the back
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    fn k_distance(&self, k: usize) -> KDistance {
        if self.history.len() < k {
            KDistance::Infinite {
                first_access: self.history.front().copied().unwrap_or(0),
            }
        } else {
            // With exactly k timestamps retained, the k-th most recent
            // access is the oldest one in the history.
            KDistance::Finite {
                kth_recent: self.history[self.history.len() - k],
            }
        }
    }
}

struct ReplacerState {
    /// Access information for each tracked frame
    frame_info: HashMap<FrameId, FrameAccessInfo>,
    /// Evictable frames ordered by eviction priority; the first element
    /// is the next victim
    eviction_order: BTreeSet<(KDistance, FrameId)>,
    /// Logical clock, bumped on every recorded access
    current_timestamp: Timestamp,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame with the largest backward k-distance, i.e.
/// the one whose k-th most recent access lies furthest in the past. A
/// frame with fewer than k recorded accesses has infinite backward
/// k-distance and is preferred over any frame with a full history; ties
/// between such frames go to the one with the earliest first access.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum
    /// frame count.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                frame_info: HashMap::new(),
                eviction_order: BTreeSet::new(),
                current_timestamp: 0,
            }),
        }
    }

    /// Evicts the frame with the largest backward k-distance and drops its
    /// access history. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let &(key, frame_id) = state.eviction_order.first()?;
        state.eviction_order.remove(&(key, frame_id));
        state.frame_info.remove(&frame_id);

        Some(frame_id)
    }

    /// Records that the given frame was accessed now.
    pub fn record_access(&self, frame_id: FrameId, _access_type: AccessType) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let state = &mut *state;
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let info = state
            .frame_info
            .entry(frame_id)
            .or_insert_with(FrameAccessInfo::new);

        let old_key = info.is_evictable.then(|| info.k_distance(self.k));
        info.record_access(timestamp, self.k);
        let new_key = info.is_evictable.then(|| info.k_distance(self.k));

        if let Some(old_key) = old_key {
            state.eviction_order.remove(&(old_key, frame_id));
        }
        if let Some(new_key) = new_key {
            state.eviction_order.insert((new_key, frame_id));
        }
    }

    /// Sets whether a frame may be chosen as an eviction victim. Frames
    /// with a nonzero pin count must not be evictable.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let state = &mut *state;
        let Some(info) = state.frame_info.get_mut(&frame_id) else {
            return;
        };
        if info.is_evictable == is_evictable {
            return;
        }
        info.is_evictable = is_evictable;
        let key = info.k_distance(self.k);

        if is_evictable {
            state.eviction_order.insert((key, frame_id));
        } else {
            state.eviction_order.remove(&(key, frame_id));
        }
    }

    /// Removes a frame from the replacer entirely. The frame must be
    /// evictable; called when a page is deleted from the buffer pool.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let state = &mut *state;
        let Some(info) = state.frame_info.get(&frame_id) else {
            return;
        };
        debug_assert!(info.is_evictable, "removing a non-evictable frame");
        let key = info.k_distance(self.k);
        state.eviction_order.remove(&(key, frame_id));
        state.frame_info.remove(&frame_id);
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().eviction_order.len()
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
