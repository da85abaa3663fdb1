//! Least-recently-used victim tracking for unpinned frames.

use std::sync::Mutex;

use hashlink::LinkedHashMap;

use common::api::FrameId;

/// Tracks the frames whose resident page has pin count zero and picks the
/// least recently used one as the eviction victim.
///
/// Recency is the time of the most recent [`unpin`](LruReplacer::unpin): a
/// frame that is unpinned, pinned, and unpinned again becomes the most
/// recently used at the second unpin. The linked hash map is the doubly
/// linked list plus id-to-node index in one structure, making every
/// operation O(1).
#[derive(Debug, Default)]
pub struct LruReplacer {
    // Front = least recently used, back = most recently used.
    frames: Mutex<LinkedHashMap<FrameId, ()>>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the least recently used frame, or `None` when
    /// nothing is evictable.
    pub fn victim(&self) -> Option<FrameId> {
        self.frames
            .lock()
            .unwrap()
            .pop_front()
            .map(|(frame_id, ())| frame_id)
    }

    /// Stops tracking `frame_id`. No-op when it is not tracked.
    pub fn pin(&self, frame_id: FrameId) {
        self.frames.lock().unwrap().remove(&frame_id);
    }

    /// Starts tracking `frame_id` as the most recently used frame. No-op
    /// when it is already tracked.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut frames = self.frames.lock().unwrap();
        if !frames.contains_key(&frame_id) {
            frames.insert(frame_id, ());
        }
    }

    /// Number of frames currently evictable.
    pub fn size(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}
