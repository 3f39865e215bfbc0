//! One-shot initialization guard.
//!
//! Side-effectful setup steps (seeding a draft, kicking off a first
//! generation) must run exactly once per key even when the caller's
//! lifecycle invokes them twice. The guard records completed keys and
//! skips repeats; `reset` re-arms a key explicitly, which is the only
//! way a step runs again.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Whether `run_once` executed its step or skipped a repeat
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitOutcome {
    Ran,
    AlreadyRan,
}

impl InitOutcome {
    pub fn ran(self) -> bool {
        self == InitOutcome::Ran
    }
}

#[derive(Default)]
pub struct InitGuard {
    completed: Mutex<HashSet<String>>,
}

impl InitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `step` if `key` has never completed; otherwise skip it.
    ///
    /// The key is marked completed before the step runs, so a step that
    /// panics does not re-arm itself.
    pub fn run_once(&self, key: &str, step: impl FnOnce()) -> InitOutcome {
        let first = {
            let mut completed = self
                .completed
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            completed.insert(key.to_string())
        };

        if first {
            tracing::debug!("Running one-shot init step '{}'", key);
            step();
            InitOutcome::Ran
        } else {
            tracing::debug!("Skipping repeated init step '{}'", key);
            InitOutcome::AlreadyRan
        }
    }

    pub fn has_run(&self, key: &str) -> bool {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Re-arm a key so its step may run again
    pub fn reset(&self, key: &str) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn reset_all(&self) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
