use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Ordering key in the evictable set. The first element is the next victim.
///
/// Frames with fewer than k accesses (+inf backward k-distance) sort before all
/// others and among themselves by most recent access. The rest sort by their
/// k-th most recent access: the earliest one has the largest k-distance.
type EvictKey = (u8, Timestamp, FrameId);

const TIER_INFINITE: u8 = 0;
const TIER_FINITE: u8 = 1;

/// Tracks access history for a single frame
#[derive(Debug)]
struct LruKNode {
    /// Last k access timestamps, most recent at back
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

impl LruKNode {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k + 1),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    fn evict_key(&self, frame_id: FrameId, k: usize) -> EvictKey {
        if self.history.len() < k {
            let last = self.history.back().copied().unwrap_or(0);
            (TIER_INFINITE, last, frame_id)
        } else {
            (TIER_FINITE, self.history[self.history.len() - k], frame_id)
        }
    }
}

struct ReplacerState {
    nodes: HashMap<FrameId, LruKNode>,
    /// Contains exactly the frames whose node is evictable
    evictable: BTreeSet<EvictKey>,
    current_timestamp: Timestamp,
}

/// LRU-K Replacement Policy
///
/// Evicts the evictable frame with the largest backward k-distance, the time
/// since its k-th most recent access. Frames with fewer than k recorded
/// accesses have +inf distance; ties among them go to the frame whose most
/// recent access is oldest (classic LRU).
///
/// All state lives behind one mutex, so operations are mutually exclusive.
pub struct LruKReplacer {
    k: usize,
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a replacer for frame ids `0..max_frames`.
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k > 0, "LRU-K requires k >= 1");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                nodes: HashMap::new(),
                evictable: BTreeSet::new(),
                current_timestamp: 0,
            }),
        }
    }

    fn check_frame(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "frame id {} out of range (max {})",
            frame_id.as_u32(),
            self.max_frames
        );
    }

    /// Removes and returns the frame with the largest backward k-distance.
    /// Its access history is discarded. Returns None if nothing is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let (_, _, frame_id) = state.evictable.pop_first()?;
        state.nodes.remove(&frame_id);
        Some(frame_id)
    }

    /// Records an access to `frame_id` at the next logical timestamp.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let k = self.k;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let timestamp = state.current_timestamp;
        state.current_timestamp += 1;

        let node = state
            .nodes
            .entry(frame_id)
            .or_insert_with(|| LruKNode::new(k));

        if node.is_evictable {
            // Sort key changes with the access: reinsert
            state.evictable.remove(&node.evict_key(frame_id, k));
            node.record_access(timestamp, k);
            state.evictable.insert(node.evict_key(frame_id, k));
        } else {
            node.record_access(timestamp, k);
        }
    }

    /// Moves a frame into or out of the evictable set. Idempotent; unknown
    /// frames are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        self.check_frame(frame_id);
        let k = self.k;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(node) = state.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.is_evictable == is_evictable {
            return;
        }

        node.is_evictable = is_evictable;
        let key = node.evict_key(frame_id, k);
        if is_evictable {
            state.evictable.insert(key);
        } else {
            state.evictable.remove(&key);
        }
    }

    /// Discards a frame's history entirely. Unknown frames are ignored.
    ///
    /// # Panics
    ///
    /// If the frame is tracked but not evictable.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame(frame_id);
        let k = self.k;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let Some(node) = state.nodes.get(&frame_id) else {
            return;
        };
        assert!(
            node.is_evictable,
            "cannot remove non-evictable frame {}",
            frame_id.as_u32()
        );

        state.evictable.remove(&node.evict_key(frame_id, k));
        state.nodes.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().evictable.len()
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
