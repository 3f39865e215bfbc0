//! Generation lock service: mutex-by-key with timeout.
//!
//! This is not OS-level concurrency control. Expensive external
//! generations (prescriptions, illustrations) can be triggered from
//! several call sites for the same logical operation; the lock map makes
//! sure only one fires. Keys are deterministic strings derived from the
//! correlation params, so unrelated operations never collide and identical
//! logical operations always collide.
//!
//! The service holds its own state and is passed by reference to call
//! sites; tests construct a fresh instance per test.

use crate::BackoffPolicy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Kind of generation guarded by a lock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockType {
    Prescription,
    Illustration,
}

impl LockType {
    fn as_str(self) -> &'static str {
        match self {
            LockType::Prescription => "prescription",
            LockType::Illustration => "illustration",
        }
    }
}

/// Correlation params identifying one logical generation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockRequest {
    Prescription { session_id: String, user_id: String },
    Illustration { exercise_name: String, discipline: String },
}

impl LockRequest {
    pub fn lock_type(&self) -> LockType {
        match self {
            LockRequest::Prescription { .. } => LockType::Prescription,
            LockRequest::Illustration { .. } => LockType::Illustration,
        }
    }

    /// Deterministic composite key for the lock map
    pub fn key(&self) -> String {
        match self {
            LockRequest::Prescription {
                session_id,
                user_id,
            } => format!("prescription:{}:{}", session_id, user_id),
            LockRequest::Illustration {
                exercise_name,
                discipline,
            } => format!("illustration:{}:{}", exercise_name, discipline),
        }
    }
}

/// A held lock, ephemeral and never persisted
#[derive(Clone, Debug)]
pub struct LockEntry {
    pub lock_id: String,
    pub lock_type: LockType,
    pub request: LockRequest,
    acquired_at: Instant,
}

impl LockEntry {
    pub fn age(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Outcome of a single acquisition attempt
#[derive(Clone, Debug)]
pub enum AcquireOutcome {
    Acquired { lock_id: String },
    /// An unexpired lock already covers this key
    Held { existing: LockEntry },
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired { .. })
    }
}

/// Outcome of an acquisition with retries
#[derive(Clone, Debug)]
pub enum RetryOutcome {
    Acquired { lock_id: String },
    /// All attempts failed. `should_wait` is true when the surviving lock
    /// is young enough that its holder is likely still working, so the
    /// caller should poll the result cache instead of retrying the lock.
    Exhausted {
        existing: Option<LockEntry>,
        should_wait: bool,
    },
}

/// Timing configuration for the lock service
#[derive(Clone, Debug)]
pub struct LockConfig {
    /// Locks expire after this long; exceeds the external generation
    /// call's own timeout so a crashed holder cannot wedge the key forever
    pub timeout: Duration,
    /// Background sweep period
    pub sweep_interval: Duration,
    /// A surviving lock younger than this is assumed still active
    /// (external service timeout plus margin)
    pub likely_active_window: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            likely_active_window: Duration::from_secs(140),
        }
    }
}

/// Summary counters for diagnostics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockStats {
    pub total: usize,
    pub prescription: usize,
    pub illustration: usize,
}

pub struct GenerationLockService {
    locks: Mutex<HashMap<String, LockEntry>>,
    config: LockConfig,
}

impl GenerationLockService {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn with_locks<R>(&self, f: impl FnOnce(&mut HashMap<String, LockEntry>) -> R) -> R {
        let mut guard = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Try to acquire the lock for one logical operation.
    ///
    /// Fails with the existing entry when an unexpired lock covers the
    /// key; expired entries are reclaimed inline.
    pub fn acquire(&self, request: &LockRequest) -> AcquireOutcome {
        let key = request.key();
        let timeout = self.config.timeout;

        self.with_locks(|locks| {
            if let Some(existing) = locks.get(&key) {
                if existing.age() < timeout {
                    tracing::warn!(
                        "Lock already held for {} (age {:?}, id {})",
                        key,
                        existing.age(),
                        existing.lock_id
                    );
                    return AcquireOutcome::Held {
                        existing: existing.clone(),
                    };
                }
                tracing::info!("Reclaiming expired lock for {}", key);
                locks.remove(&key);
            }

            let lock_id = format!("{}-{}", request.lock_type().as_str(), Uuid::new_v4());
            locks.insert(
                key.clone(),
                LockEntry {
                    lock_id: lock_id.clone(),
                    lock_type: request.lock_type(),
                    request: request.clone(),
                    acquired_at: Instant::now(),
                },
            );

            tracing::info!("Lock acquired for {} (id {})", key, lock_id);
            AcquireOutcome::Acquired { lock_id }
        })
    }

    /// Acquire with exponential backoff between attempts.
    ///
    /// Delays follow the policy (base 500ms, x1.5 per attempt, capped at
    /// 8s) plus 0-30% jitter so competing callers do not retry in step.
    pub async fn acquire_with_retry(
        &self,
        request: &LockRequest,
        policy: &BackoffPolicy,
        max_attempts: u32,
    ) -> RetryOutcome {
        let mut last_existing = None;

        for attempt in 0..max_attempts {
            match self.acquire(request) {
                AcquireOutcome::Acquired { lock_id } => {
                    return RetryOutcome::Acquired { lock_id };
                }
                AcquireOutcome::Held { existing } => {
                    last_existing = Some(existing);
                }
            }

            if attempt + 1 < max_attempts {
                let delay = policy.jittered_delay(attempt);
                tracing::debug!(
                    "Lock busy for {}, retrying in {:?} (attempt {}/{})",
                    request.key(),
                    delay,
                    attempt + 1,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
            }
        }

        let should_wait = last_existing
            .as_ref()
            .map_or(false, |e| e.age() < self.config.likely_active_window);

        tracing::warn!(
            "Lock acquisition exhausted for {} after {} attempts (should_wait: {})",
            request.key(),
            max_attempts,
            should_wait
        );

        RetryOutcome::Exhausted {
            existing: last_existing,
            should_wait,
        }
    }

    /// Release the lock for one logical operation; true if one existed
    pub fn release(&self, request: &LockRequest) -> bool {
        let key = request.key();
        self.with_locks(|locks| {
            let existed = locks.remove(&key).is_some();
            if existed {
                tracing::info!("Lock released for {}", key);
            } else {
                tracing::debug!("No lock to release for {}", key);
            }
            existed
        })
    }

    /// Recovery path: drop a lock regardless of holder
    pub fn force_release(&self, request: &LockRequest) -> bool {
        tracing::warn!("Force-releasing lock for {}", request.key());
        self.release(request)
    }

    /// True when an unexpired lock covers the key (expired entries are
    /// reclaimed inline)
    pub fn is_locked(&self, request: &LockRequest) -> bool {
        self.lock_info(request).is_some()
    }

    /// The unexpired entry for the key, if any
    pub fn lock_info(&self, request: &LockRequest) -> Option<LockEntry> {
        let key = request.key();
        let timeout = self.config.timeout;

        self.with_locks(|locks| match locks.get(&key) {
            Some(entry) if entry.age() < timeout => Some(entry.clone()),
            Some(_) => {
                locks.remove(&key);
                None
            }
            None => None,
        })
    }

    /// Remove every expired entry; returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let timeout = self.config.timeout;

        let removed = self.with_locks(|locks| {
            let before = locks.len();
            locks.retain(|_, entry| entry.age() < timeout);
            before - locks.len()
        });

        if removed > 0 {
            tracing::info!("Lock cleanup removed {} expired entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> LockStats {
        self.with_locks(|locks| LockStats {
            total: locks.len(),
            prescription: locks
                .values()
                .filter(|e| e.lock_type == LockType::Prescription)
                .count(),
            illustration: locks
                .values()
                .filter(|e| e.lock_type == LockType::Illustration)
                .count(),
        })
    }

    /// Spawn the periodic expiry sweep; the returned handle stops it
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> CleanupHandle {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        let service = Arc::clone(self);
        let sweep_interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        service.cleanup_expired();
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Lock cleanup task received shutdown signal");
                        break;
                    }
                }
            }
        });

        CleanupHandle { shutdown_tx }
    }
}

/// Handle stopping a background cleanup task
pub struct CleanupHandle {
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl CleanupHandle {
    pub(crate) fn new(shutdown_tx: tokio::sync::mpsc::Sender<()>) -> Self {
        Self { shutdown_tx }
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
