//! Illustration cache with a pending-request registry.
//!
//! Two maps, keyed identically: a TTL cache for resolved illustration
//! lookups, and a registry of in-flight generations so concurrent callers
//! await the same result instead of issuing duplicate requests. A
//! placeholder entry is written synchronously the instant a generation is
//! dispatched, closing the window between "decided to generate" and
//! "registered as pending": a second caller arriving in that window sees
//! either the placeholder (miss-but-busy) or the pending registry, never
//! a reason to re-trigger generation.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// A resolved illustration lookup
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IllustrationResult {
    pub illustration_id: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_diptych: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

#[derive(Clone, Debug)]
struct Slot {
    result: IllustrationResult,
    is_placeholder: bool,
    cached_at: Instant,
}

struct Pending {
    started_at: Instant,
    tx: broadcast::Sender<Option<IllustrationResult>>,
}

/// Timing configuration for the cache
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Resolved entries live this long
    pub entry_ttl: Duration,
    /// Pending entries expire after the external service timeout plus
    /// margin
    pub pending_ttl: Duration,
    /// Background sweep period
    pub sweep_interval: Duration,
    /// Resolved-entry cap; oldest entries are evicted past it
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(3600),
            pending_ttl: Duration::from_secs(140),
            sweep_interval: Duration::from_secs(30),
            max_entries: 200,
        }
    }
}

/// Summary counters for diagnostics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub pending: usize,
}

/// Subscription to an in-flight generation; resolves to the same value
/// the original request settles with (None on failure)
pub struct PendingHandle {
    rx: broadcast::Receiver<Option<IllustrationResult>>,
}

impl PendingHandle {
    /// Wait for the in-flight generation to settle.
    ///
    /// Returns None both when the generation failed and when it settled
    /// just before this subscription; callers should re-read the cache
    /// after a None.
    pub async fn wait(mut self) -> Option<IllustrationResult> {
        self.rx.recv().await.ok().flatten()
    }
}

pub struct IllustrationCache {
    entries: Mutex<HashMap<String, Slot>>,
    pending: Mutex<HashMap<String, Pending>>,
    config: CacheConfig,
}

/// Strip accents and non-alphanumerics so "Développé couché" and
/// "developpe couche" key identically
fn normalize_name(exercise_name: &str) -> String {
    exercise_name
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'à' | 'â' | 'ä' | 'á' | 'ã' => Some('a'),
            'é' | 'è' | 'ê' | 'ë' => Some('e'),
            'î' | 'ï' | 'í' | 'ì' => Some('i'),
            'ô' | 'ö' | 'ó' | 'ò' => Some('o'),
            'ù' | 'û' | 'ü' | 'ú' => Some('u'),
            'ç' => Some('c'),
            'ñ' => Some('n'),
            c if c.is_ascii_alphanumeric() || c == ' ' => Some(c),
            _ => None,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

impl IllustrationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Cache key for one exercise within one discipline
    pub fn cache_key(exercise_name: &str, discipline: &str) -> String {
        format!("{}::{}", discipline, normalize_name(exercise_name))
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Slot>) -> R) -> R {
        let mut guard = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    fn with_pending<R>(&self, f: impl FnOnce(&mut HashMap<String, Pending>) -> R) -> R {
        let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Resolved entry for the exercise, if fresh.
    ///
    /// Placeholders and expired entries read as a miss; expired entries
    /// are removed inline.
    pub fn get(&self, exercise_name: &str, discipline: &str) -> Option<IllustrationResult> {
        let key = Self::cache_key(exercise_name, discipline);
        let ttl = self.config.entry_ttl;

        self.with_entries(|entries| match entries.get(&key) {
            Some(slot) if slot.is_placeholder => {
                tracing::debug!("Placeholder hit for {} - generation in progress", key);
                None
            }
            Some(slot) if slot.cached_at.elapsed() < ttl => Some(slot.result.clone()),
            Some(_) => {
                entries.remove(&key);
                tracing::debug!("Cache entry expired for {}", key);
                None
            }
            None => None,
        })
    }

    /// Store a resolved result, evicting the oldest entry past the cap
    pub fn set(&self, exercise_name: &str, discipline: &str, result: IllustrationResult) {
        let key = Self::cache_key(exercise_name, discipline);
        let max_entries = self.config.max_entries;

        self.with_entries(|entries| {
            entries.insert(
                key.clone(),
                Slot {
                    result,
                    is_placeholder: false,
                    cached_at: Instant::now(),
                },
            );

            if entries.len() > max_entries {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, slot)| slot.cached_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        });

        tracing::debug!("Cache set for {}::{}", discipline, exercise_name);
    }

    /// Mark a generation as in progress, synchronously, before dispatch
    pub fn set_placeholder(&self, exercise_name: &str, discipline: &str, lock_id: &str) {
        let key = Self::cache_key(exercise_name, discipline);

        self.with_entries(|entries| {
            entries.insert(
                key.clone(),
                Slot {
                    result: IllustrationResult {
                        illustration_id: lock_id.into(),
                        image_url: String::new(),
                        thumbnail_url: None,
                        source: "generating".into(),
                        is_diptych: None,
                        aspect_ratio: None,
                    },
                    is_placeholder: true,
                    cached_at: Instant::now(),
                },
            );
        });

        tracing::info!("Placeholder set for {} (lock {})", key, lock_id);
    }

    /// Drop the placeholder, leaving resolved entries untouched
    pub fn remove_placeholder(&self, exercise_name: &str, discipline: &str) {
        let key = Self::cache_key(exercise_name, discipline);

        self.with_entries(|entries| {
            if entries.get(&key).is_some_and(|slot| slot.is_placeholder) {
                entries.remove(&key);
                tracing::debug!("Placeholder removed for {}", key);
            }
        });
    }

    /// Register an in-flight generation.
    ///
    /// The future is driven to completion on a background task; its
    /// settled value (None on failure) is broadcast to every subscriber
    /// and the pending entry is removed afterwards.
    pub fn register_pending<F>(self: &Arc<Self>, exercise_name: &str, discipline: &str, fut: F)
    where
        F: Future<Output = Result<IllustrationResult>> + Send + 'static,
    {
        let key = Self::cache_key(exercise_name, discipline);
        let (tx, _) = broadcast::channel(4);
        let started_at = Instant::now();

        self.with_pending(|pending| {
            pending.insert(
                key.clone(),
                Pending {
                    started_at,
                    tx: tx.clone(),
                },
            );
        });

        tracing::info!("Registered pending generation for {}", key);

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match fut.await {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("Pending generation for {} failed: {}", key, e);
                    None
                }
            };

            // Notify before removal so subscribers never observe a gap
            let _ = tx.send(outcome);
            cache.with_pending(|pending| {
                pending.remove(&key);
            });

            tracing::info!(
                "Cleared pending request for {} after {:?}",
                key,
                started_at.elapsed()
            );
        });
    }

    /// Subscribe to an in-flight generation for this exercise, if one
    /// exists and has not timed out. Late joiners are supported; each
    /// handle resolves to the same settled value.
    pub fn pending(&self, exercise_name: &str, discipline: &str) -> Option<PendingHandle> {
        let key = Self::cache_key(exercise_name, discipline);
        let ttl = self.config.pending_ttl;

        self.with_pending(|pending| match pending.get(&key) {
            Some(entry) if entry.started_at.elapsed() < ttl => {
                tracing::info!(
                    "Found pending request for {} (age {:?}) - reusing",
                    key,
                    entry.started_at.elapsed()
                );
                Some(PendingHandle {
                    rx: entry.tx.subscribe(),
                })
            }
            Some(_) => {
                pending.remove(&key);
                tracing::warn!("Pending request expired for {}", key);
                None
            }
            None => None,
        })
    }

    /// Remove pending entries older than the pending TTL
    pub fn cleanup_stale_pending(&self) -> usize {
        let ttl = self.config.pending_ttl;

        let removed = self.with_pending(|pending| {
            let before = pending.len();
            pending.retain(|_, entry| entry.started_at.elapsed() < ttl);
            before - pending.len()
        });

        if removed > 0 {
            tracing::info!("Cleaned up {} stale pending requests", removed);
        }
        removed
    }

    pub fn clear(&self) {
        self.with_entries(HashMap::clear);
        self.with_pending(HashMap::clear);
        tracing::info!("Illustration cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.with_entries(|e| e.len()),
            pending: self.with_pending(|p| p.len()),
        }
    }

    /// Spawn the periodic stale-pending sweep; the returned handle stops it
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> crate::lock::CleanupHandle {
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
        let cache = Arc::clone(self);
        let sweep_interval = self.config.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cache.cleanup_stale_pending();
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Cache cleanup task received shutdown signal");
                        break;
                    }
                }
            }
        });

        crate::lock::CleanupHandle::new(shutdown_tx)
    }
}
