// src/gate.rs - admission control for detection passes
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Bounds detection work to one in-flight pass. Frames arriving while a pass
/// runs are dropped, never queued. `try_admit` is a constant-time atomic
/// operation so it is safe to call from the frame-delivery thread at sensor
/// rate without ever blocking it.
#[derive(Debug, Default)]
pub struct DetectionGate {
    busy: AtomicBool,
    seen: AtomicU64,
    admitted: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of the gate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateSnapshot {
    pub seen: u64,
    pub admitted: u64,
    pub dropped: u64,
}

impl DetectionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admission check for one frame. Returns true if the caller now owns
    /// the single detection slot and must later call `release`.
    pub fn try_admit(&self) -> bool {
        self.seen.fetch_add(1, Ordering::Relaxed);
        let admitted = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if admitted {
            self.admitted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    /// Frees the detection slot. Called on the worker once the detector
    /// returns, before the result is projected or published, so the gate is
    /// closed strictly for the duration of the detector call.
    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            seen: self.seen.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
