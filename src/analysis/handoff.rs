use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::frame::AnalysisFrame;

/// Latest published frame, shared between the producer and its readers.
///
/// The lock is held only across a fixed-size copy in either direction, so
/// a reader always sees one whole frame from a single analysis cycle.
#[derive(Clone)]
pub struct FrameBuffer {
    shared: Arc<Shared>,
}

struct Shared {
    slot: Mutex<AnalysisFrame>,
    sequence: AtomicU64,
}

impl FrameBuffer {
    pub fn new(notes: usize, bins: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(AnalysisFrame::new(notes, bins)),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Copy `frame` into the shared slot. No allocation.
    pub fn publish(&self, frame: &AnalysisFrame) {
        let mut slot = self.lock();
        slot.copy_from(frame);
        self.shared.sequence.fetch_add(1, Ordering::Release);
    }

    /// Owned copy of the latest frame.
    pub fn snapshot(&self) -> AnalysisFrame {
        self.lock().clone()
    }

    /// Copy the latest frame into `out` and return its sequence number.
    pub fn snapshot_into(&self, out: &mut AnalysisFrame) -> u64 {
        let slot = self.lock();
        out.copy_from(&slot);
        self.shared.sequence.load(Ordering::Acquire)
    }

    /// Number of frames published so far.
    pub fn sequence(&self) -> u64 {
        self.shared.sequence.load(Ordering::Acquire)
    }

    #[allow(dead_code)]
    pub fn is_frame_ready(&self) -> bool {
        self.lock().frame_ready
    }

    fn lock(&self) -> MutexGuard<'_, AnalysisFrame> {
        // A panic mid-copy leaves a frame the next publish overwrites whole.
        self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
