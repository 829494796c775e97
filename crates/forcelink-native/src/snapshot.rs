//! Lock-free handoff of loop state to renderers.
//!
//! The control thread is the only writer. Readers (render loop, status
//! logger, telemetry subscriber) load the latest [`RenderSnapshot`] without
//! ever blocking the writer.

use std::sync::Arc;

use arc_swap::ArcSwap;

use forcelink_core::types::RenderSnapshot;

/// Writing side, owned by the control loop.
#[derive(Debug)]
pub struct SnapshotPublisher {
    slot: Arc<ArcSwap<RenderSnapshot>>,
}

/// Reading side; cheap to clone.
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    slot: Arc<ArcSwap<RenderSnapshot>>,
}

/// Create a connected publisher/reader pair holding the default snapshot.
pub fn snapshot_channel() -> (SnapshotPublisher, SnapshotReader) {
    let slot = Arc::new(ArcSwap::from_pointee(RenderSnapshot::default()));
    (
        SnapshotPublisher {
            slot: Arc::clone(&slot),
        },
        SnapshotReader { slot },
    )
}

impl SnapshotPublisher {
    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: RenderSnapshot) {
        self.slot.store(Arc::new(snapshot));
    }

    /// Another reader for the same slot.
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl SnapshotReader {
    /// Latest published snapshot.
    pub fn load(&self) -> Arc<RenderSnapshot> {
        self.slot.load_full()
    }

    /// Iteration of the latest snapshot.
    pub fn iteration(&self) -> u64 {
        self.slot.load().iteration
    }
}
