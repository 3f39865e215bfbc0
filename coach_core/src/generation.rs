//! Generation orchestration: backend calls guarded by locks and cache.
//!
//! The backend is the opaque external generation service, reached through
//! the [`GenerationBackend`] trait. This module owns the coordination
//! around it:
//!
//! - prescription generation takes the per-session lock, applies a
//!   client-side timeout and releases the lock on every exit path;
//! - illustration resolution walks cache → pending registry → lock with
//!   retry, writes a placeholder synchronously before dispatch, and
//!   settles the cache and lock together with the request.
//!
//! A duplicate in-flight operation is a normal outcome
//! ([`GenerationOutcome::InFlight`]), never an error.

use crate::cache::{IllustrationCache, IllustrationResult};
use crate::config::{BackoffPolicy, GenerationConfig};
use crate::lock::{AcquireOutcome, GenerationLockService, LockRequest, RetryOutcome};
use crate::normalizer::normalize_prescription;
use crate::{CanonicalPrescription, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Lock-acquisition attempts before reporting the operation in flight
const MAX_LOCK_ATTEMPTS: u32 = 3;

/// Parameters for one prescription generation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    pub session_id: String,
    pub user_id: String,
    /// Opaque coach/preparer context forwarded to the backend verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparer_context: Option<Value>,
    /// Cache keys the backend must not reuse for this generation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_cache_keys: Vec<String>,
}

/// Parameters for one illustration generation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IllustrationRequest {
    pub exercise_name: String,
    pub discipline: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub muscle_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipment: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_angle: Option<String>,
}

/// The external generation service
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce a raw prescription document (any of the known shapes)
    async fn generate_prescription(&self, request: &PrescriptionRequest) -> Result<Value>;

    /// Produce an illustration for one exercise
    async fn generate_illustration(&self, request: &IllustrationRequest)
        -> Result<IllustrationResult>;
}

/// Result of an orchestrated operation
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationOutcome<T> {
    Completed(T),
    /// Another caller holds the operation; its result will land in the
    /// usual place (draft store, cache)
    InFlight,
}

impl<T> GenerationOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            GenerationOutcome::Completed(value) => Some(value),
            GenerationOutcome::InFlight => None,
        }
    }
}

/// Releases the lock when dropped, so every exit path releases exactly once
struct LockGuard {
    locks: Arc<GenerationLockService>,
    request: LockRequest,
}

impl LockGuard {
    fn new(locks: Arc<GenerationLockService>, request: LockRequest) -> Self {
        Self { locks, request }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.locks.release(&self.request);
    }
}

pub struct GenerationService {
    backend: Arc<dyn GenerationBackend>,
    locks: Arc<GenerationLockService>,
    cache: Arc<IllustrationCache>,
    backoff: BackoffPolicy,
    prescription_timeout: Duration,
    illustration_timeout: Duration,
}

impl GenerationService {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        locks: Arc<GenerationLockService>,
        cache: Arc<IllustrationCache>,
        config: &GenerationConfig,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            backend,
            locks,
            cache,
            backoff,
            prescription_timeout: Duration::from_secs(config.prescription_timeout_secs),
            illustration_timeout: Duration::from_secs(config.illustration_timeout_secs),
        }
    }

    /// Generate and normalize a prescription for one session.
    ///
    /// At most one generation runs per session+user; a second caller gets
    /// `InFlight`. Backend errors and timeouts surface as `Err` with the
    /// lock released.
    pub async fn generate_prescription(
        &self,
        request: &PrescriptionRequest,
    ) -> Result<GenerationOutcome<CanonicalPrescription>> {
        let lock_request = LockRequest::Prescription {
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
        };

        match self.locks.acquire(&lock_request) {
            AcquireOutcome::Acquired { .. } => {}
            AcquireOutcome::Held { existing } => {
                tracing::info!(
                    "Prescription generation already running for {} (age {:?})",
                    lock_request.key(),
                    existing.age()
                );
                return Ok(GenerationOutcome::InFlight);
            }
        }
        let _guard = LockGuard::new(Arc::clone(&self.locks), lock_request);

        let raw = tokio::time::timeout(
            self.prescription_timeout,
            self.backend.generate_prescription(request),
        )
        .await
        .map_err(|_| Error::Timeout(self.prescription_timeout))??;

        Ok(GenerationOutcome::Completed(normalize_prescription(&raw)))
    }

    /// Resolve an illustration: cached result, in-flight result, or a
    /// fresh generation.
    ///
    /// A fresh generation writes a placeholder before dispatching so
    /// concurrent callers see the work in progress, and settles cache,
    /// pending registry and lock together whether it succeeds, fails or
    /// times out.
    pub async fn resolve_illustration(
        &self,
        request: &IllustrationRequest,
    ) -> Result<GenerationOutcome<IllustrationResult>> {
        let name = &request.exercise_name;
        let discipline = &request.discipline;

        if let Some(hit) = self.cache.get(name, discipline) {
            return Ok(GenerationOutcome::Completed(hit));
        }

        if let Some(handle) = self.cache.pending(name, discipline) {
            return self.settle_from_pending(handle, name, discipline).await;
        }

        let lock_request = LockRequest::Illustration {
            exercise_name: name.clone(),
            discipline: discipline.clone(),
        };
        let lock_id = match self
            .locks
            .acquire_with_retry(&lock_request, &self.backoff, MAX_LOCK_ATTEMPTS)
            .await
        {
            RetryOutcome::Acquired { lock_id } => lock_id,
            RetryOutcome::Exhausted { should_wait, .. } => {
                // The holder registered (or will register) the pending
                // entry; join it if it appeared while we were retrying
                if let Some(handle) = self.cache.pending(name, discipline) {
                    return self.settle_from_pending(handle, name, discipline).await;
                }
                tracing::info!(
                    "Illustration generation busy for {} (holder active: {})",
                    lock_request.key(),
                    should_wait
                );
                return Ok(GenerationOutcome::InFlight);
            }
        };

        self.cache.set_placeholder(name, discipline, &lock_id);

        let guard = LockGuard::new(Arc::clone(&self.locks), lock_request);
        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let backend_request = request.clone();
        let timeout = self.illustration_timeout;

        self.cache.register_pending(name, discipline, async move {
            let _guard = guard;
            let outcome = tokio::time::timeout(
                timeout,
                backend.generate_illustration(&backend_request),
            )
            .await
            .map_err(|_| Error::Timeout(timeout))
            .and_then(|r| r);

            match outcome {
                Ok(result) => {
                    cache.set(
                        &backend_request.exercise_name,
                        &backend_request.discipline,
                        result.clone(),
                    );
                    Ok(result)
                }
                Err(e) => {
                    cache.remove_placeholder(
                        &backend_request.exercise_name,
                        &backend_request.discipline,
                    );
                    Err(e)
                }
            }
        });

        match self.cache.pending(name, discipline) {
            Some(handle) => self.settle_from_pending(handle, name, discipline).await,
            // Settled between registration and subscription; the cache
            // holds the verdict
            None => self.read_settled(name, discipline),
        }
    }

    async fn settle_from_pending(
        &self,
        handle: crate::cache::PendingHandle,
        name: &str,
        discipline: &str,
    ) -> Result<GenerationOutcome<IllustrationResult>> {
        match handle.wait().await {
            Some(result) => Ok(GenerationOutcome::Completed(result)),
            // None covers both upstream failure and a settle that beat our
            // subscription; the cache disambiguates
            None => self.read_settled(name, discipline),
        }
    }

    fn read_settled(
        &self,
        name: &str,
        discipline: &str,
    ) -> Result<GenerationOutcome<IllustrationResult>> {
        match self.cache.get(name, discipline) {
            Some(result) => Ok(GenerationOutcome::Completed(result)),
            None => Err(Error::Generation(format!(
                "illustration generation failed for '{}' ({})",
                name, discipline
            ))),
        }
    }
}
