// SPDX-License-Identifier: GPL-3.0-only

//! Shared visualization state
//!
//! A CPU-visible snapshot of the most recently published normals frame,
//! shared between the processing thread (writer) and the visualization
//! thread (reader) under a single mutex. Publication is overwrite-on-write:
//! a slow reader may skip frames but never observes a torn one.

use std::sync::Mutex;

/// Compressed normals snapshot: opaque encoding plus the element count the
/// engine reported (a diagnostic counter, not used for control flow)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompressedNormals {
    pub data: Vec<u8>,
    pub reported_count: u32,
}

/// CPU-visible copy of one completed frame's normal-extraction output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalsSnapshot {
    /// Normals image: 3 x f32 per pixel, unit vectors in [-1, 1], row-major
    pub normals: Vec<f32>,
    /// Validity mask: one byte per pixel, nonzero = usable normal
    pub validity: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Present only when compression is enabled
    pub compressed: Option<CompressedNormals>,
}

impl NormalsSnapshot {
    /// True before the first publish or for degenerate geometry
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.normals.is_empty()
    }
}

#[derive(Debug, Default)]
struct Slot {
    snapshot: NormalsSnapshot,
    updated: bool,
}

/// Snapshot plus dirty flag behind the one lock both threads share
#[derive(Debug, Default)]
pub struct SharedNormalsState {
    slot: Mutex<Slot>,
}

impl SharedNormalsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot and raise the dirty flag.
    ///
    /// The snapshot is fully materialized before the lock is taken, so the
    /// critical section is a swap plus a flag store.
    pub fn publish(&self, snapshot: NormalsSnapshot) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.snapshot = snapshot;
        slot.updated = true;
    }

    /// Read the current snapshot under the lock without consuming the flag.
    /// Returns `None` before the first publish.
    pub fn read<R>(&self, f: impl FnOnce(&NormalsSnapshot) -> R) -> Option<R> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.snapshot.is_empty() {
            None
        } else {
            Some(f(&slot.snapshot))
        }
    }

    /// Read the snapshot and lower the dirty flag, for readers that only
    /// want to redraw on new frames. Returns `None` when nothing changed
    /// since the last call.
    pub fn read_fresh<R>(&self, f: impl FnOnce(&NormalsSnapshot) -> R) -> Option<R> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if !slot.updated || slot.snapshot.is_empty() {
            return None;
        }
        slot.updated = false;
        Some(f(&slot.snapshot))
    }

    /// Whether a publish happened since the last `read_fresh`
    pub fn is_dirty(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_2x1(z: f32) -> NormalsSnapshot {
        NormalsSnapshot {
            normals: vec![0.0, 0.0, z, 0.0, 0.0, z],
            validity: vec![1, 1],
            width: 2,
            height: 1,
            compressed: None,
        }
    }

    #[test]
    fn test_empty_state_reads_none() {
        let state = SharedNormalsState::new();
        assert!(!state.is_dirty());
        assert!(state.read(|_| ()).is_none());
        assert!(state.read_fresh(|_| ()).is_none());
    }

    #[test]
    fn test_publish_sets_dirty_and_read_fresh_clears_it() {
        let state = SharedNormalsState::new();
        state.publish(snapshot_2x1(1.0));
        assert!(state.is_dirty());

        let z = state.read_fresh(|s| s.normals[2]).unwrap();
        assert_eq!(z, 1.0);
        assert!(!state.is_dirty());
        assert!(state.read_fresh(|_| ()).is_none());

        // Plain read still sees the stale snapshot
        assert!(state.read(|_| ()).is_some());
    }

    #[test]
    fn test_latest_frame_wins() {
        let state = SharedNormalsState::new();
        state.publish(snapshot_2x1(1.0));
        state.publish(snapshot_2x1(-1.0));
        let z = state.read_fresh(|s| s.normals[2]).unwrap();
        assert_eq!(z, -1.0);
    }
}
