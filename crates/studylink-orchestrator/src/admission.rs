//! Concurrency admission control.

/// Default number of sessions allowed to stream at once.
pub const DEFAULT_SESSION_CAP: usize = 4;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Capacity available; the session may start.
    Admitted,
    /// All slots taken. Rejection is an expected outcome, not an error.
    AtCapacity {
        /// Sessions currently holding the slots.
        running: usize,
        /// The fixed capacity.
        cap: usize,
    },
}

/// Enforces the cap on concurrently streaming sessions.
///
/// Consulted inside the store's start transaction, so a decision is atomic
/// with the status transition it gates. A session that never terminates
/// permanently occupies one slot; that is an accepted trade-off, not a
/// leak.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionController {
    cap: usize,
}

impl AdmissionController {
    /// Create a controller with the given capacity.
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    /// The fixed capacity.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Check whether another session may enter `streaming`.
    pub fn check(&self, running: usize) -> AdmissionDecision {
        if running < self.cap {
            AdmissionDecision::Admitted
        } else {
            AdmissionDecision::AtCapacity {
                running,
                cap: self.cap,
            }
        }
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAP)
    }
}
