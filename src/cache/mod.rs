//! Bounded image cache with usage-count eviction
//!
//! Decoded slot images are kept in memory so that a slot transition never
//! waits on the network:
//! - `prefetch`: reserve an entry and decode in the background (fire-and-forget)
//! - `get`: return decoded pixels, waiting a bounded time for a pending decode
//! - `clear`: drop everything when a new schedule supersedes the old one
//!
//! Entries are keyed by the full `(url, width, height)` triple. When the cache
//! is full, the entry with the lowest usage count is evicted; ties go to the
//! oldest insertion. Usage counts only grow, one per successful `get`. A failed
//! decode removes its entry, so the next request retries instead of caching
//! the failure.
//!
//! A lookahead prefetch carries the time its image is due on screen
//! ([`ImageCache::prefetch_for`]). Such a prefetch never evicts an entry that
//! has not been shown yet and is due no later than itself; if nothing else
//! can make room, the prefetch is declined. Far-ahead images therefore never
//! push out the ones about to be displayed.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcast::cache::{CacheConfig, ImageCache};
//!
//! let cache = ImageCache::new(CacheConfig::default(), decoder);
//! cache.prefetch(&slot.top_image).await;
//! let pixels = cache.get(&slot.top_image).await?;
//! ```

pub mod decoder;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex, Semaphore};

use crate::clock::EpochMillis;
use crate::models::ImageRef;

pub use decoder::{DecodeError, DecodedImage, HttpImageDecoder, ImageDecoder};

/// Why a `get` came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The entry was still pending when the wait elapsed
    Timeout,
    /// Decoding failed, or the entry was evicted or cleared while pending
    Unavailable,
}

/// Errors returned by cache lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Missing url or dimensions
    #[error("Incomplete image reference: {url:?} ({width}x{height})")]
    IncompleteRef { url: String, width: u32, height: u32 },

    /// No decoded data could be produced in time
    #[error("Cache miss for {url}: {reason:?}")]
    Miss { url: String, reason: MissReason },
}

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of distinct images held
    pub capacity: usize,

    /// How long `get` waits for a pending decode
    pub wait_timeout: Duration,

    /// Decodes allowed to run at the same time
    pub max_concurrent_decodes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            wait_timeout: Duration::from_millis(1000),
            max_concurrent_decodes: 4,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Successful `get` calls
    pub hits: u64,
    /// `get` calls that returned a miss
    pub misses: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Decodes that failed and were dropped
    pub decode_failures: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone)]
enum EntryState {
    Pending,
    Ready(Arc<DecodedImage>),
}

impl EntryState {
    fn ready(&self) -> Option<Arc<DecodedImage>> {
        match self {
            Self::Ready(data) => Some(Arc::clone(data)),
            Self::Pending => None,
        }
    }
}

struct CacheEntry {
    /// Dropping the sender wakes waiters with a miss
    state: watch::Sender<EntryState>,
    usage: u64,
    /// Insertion order; also identifies this entry to its decode task
    seq: u64,
    /// Earliest display time a lookahead prefetch asked for
    due: Option<EpochMillis>,
}

impl CacheEntry {
    /// Whether a prefetch due at `due` must leave this entry alone
    fn protected_from(&self, due: Option<EpochMillis>) -> bool {
        match (self.due, due) {
            (Some(mine), Some(theirs)) => self.usage == 0 && mine <= theirs,
            _ => false,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<ImageRef, CacheEntry>,
    next_seq: u64,
    stats: CacheStats,
}

impl CacheInner {
    /// Insert a pending entry, evicting the least-used one when full
    ///
    /// Returns `None` when the cache is full of entries a prefetch due at
    /// `due` may not evict.
    fn reserve(
        &mut self,
        image: ImageRef,
        capacity: usize,
        due: Option<EpochMillis>,
    ) -> Option<(u64, watch::Receiver<EntryState>)> {
        while self.entries.len() >= capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(_, entry)| !entry.protected_from(due))
                .min_by_key(|(_, entry)| (entry.usage, entry.seq))
                .map(|(key, _)| key.clone())?;

            if let Some(evicted) = self.entries.remove(&victim) {
                self.stats.evictions += 1;
                tracing::debug!(url = %victim.url, usage = evicted.usage, "Evicted cached image");
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let (state, receiver) = watch::channel(EntryState::Pending);
        self.entries.insert(
            image,
            CacheEntry {
                state,
                usage: 0,
                seq,
                due,
            },
        );

        Some((seq, receiver))
    }

    /// Whether `image` still maps to the entry inserted as `seq`
    fn is_current(&self, image: &ImageRef, seq: u64) -> bool {
        self.entries.get(image).is_some_and(|entry| entry.seq == seq)
    }
}

/// Capacity-bounded store of decoded images
pub struct ImageCache {
    inner: Arc<Mutex<CacheInner>>,
    decoder: Arc<dyn ImageDecoder>,
    decode_permits: Arc<Semaphore>,
    config: CacheConfig,
}

impl ImageCache {
    /// Create an empty cache; a zero capacity is raised to one
    pub fn new(mut config: CacheConfig, decoder: Arc<dyn ImageDecoder>) -> Self {
        if config.capacity == 0 {
            tracing::warn!("Image cache capacity of 0 raised to 1");
            config.capacity = 1;
        }

        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            decoder,
            decode_permits: Arc::new(Semaphore::new(config.max_concurrent_decodes.max(1))),
            config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Start decoding `image` in the background
    ///
    /// No-op for incomplete references and for keys already cached or
    /// pending. Returns whether a new decode was started.
    pub async fn prefetch(&self, image: &ImageRef) -> bool {
        self.prefetch_inner(image, None).await
    }

    /// Start decoding `image` for display at `due`
    ///
    /// Like [`prefetch`](Self::prefetch), but never evicts an unshown entry
    /// due at or before `due`. Returns `false` when no room could be made.
    pub async fn prefetch_for(&self, image: &ImageRef, due: EpochMillis) -> bool {
        self.prefetch_inner(image, Some(due)).await
    }

    async fn prefetch_inner(&self, image: &ImageRef, due: Option<EpochMillis>) -> bool {
        if !image.is_complete() {
            return false;
        }

        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.entries.get_mut(image) {
            if let Some(due) = due {
                entry.due = Some(entry.due.map_or(due, |mine| mine.min(due)));
            }
            return false;
        }

        self.start_decode(&mut inner, image, due).is_some()
    }

    /// Decoded pixels for `image`
    ///
    /// A populated entry is returned immediately. A pending entry (or an
    /// absent one, which is prefetched first) is awaited for at most the
    /// configured wait timeout. Every successful call counts one usage.
    ///
    /// # Errors
    ///
    /// - `CacheError::IncompleteRef` for references without url or size
    /// - `CacheError::Miss` when the wait elapses or the decode fails
    pub async fn get(&self, image: &ImageRef) -> Result<Arc<DecodedImage>, CacheError> {
        if !image.is_complete() {
            return Err(CacheError::IncompleteRef {
                url: image.url.clone(),
                width: image.width,
                height: image.height,
            });
        }

        let mut receiver = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;

            match inner.entries.get_mut(image) {
                Some(entry) => {
                    let ready = entry.state.borrow().ready();
                    if let Some(data) = ready {
                        entry.usage += 1;
                        inner.stats.hits += 1;
                        return Ok(data);
                    }
                    entry.state.subscribe()
                }
                None => match self.start_decode(inner, image, None) {
                    Some(receiver) => receiver,
                    None => {
                        inner.stats.misses += 1;
                        return Err(CacheError::Miss {
                            url: image.url.clone(),
                            reason: MissReason::Unavailable,
                        });
                    }
                },
            }
        };

        let (data, reason) = match tokio::time::timeout(
            self.config.wait_timeout,
            receiver.wait_for(|state| matches!(state, EntryState::Ready(_))),
        )
        .await
        {
            Ok(Ok(state)) => (state.ready(), MissReason::Unavailable),
            Ok(Err(_)) => (None, MissReason::Unavailable),
            Err(_) => (None, MissReason::Timeout),
        };

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match data {
            Some(data) => {
                if let Some(entry) = inner.entries.get_mut(image) {
                    entry.usage += 1;
                }
                inner.stats.hits += 1;
                Ok(data)
            }
            None => {
                inner.stats.misses += 1;
                tracing::debug!(url = %image.url, reason = ?reason, "Image cache miss");
                Err(CacheError::Miss {
                    url: image.url.clone(),
                    reason,
                })
            }
        }
    }

    /// Drop every entry; pending waiters see a miss
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let dropped = inner.entries.len();
        inner.entries.clear();
        tracing::debug!(dropped, "Cleared image cache");
    }

    /// Number of entries, pending ones included
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `image` has an entry, pending or ready
    pub async fn contains(&self, image: &ImageRef) -> bool {
        self.inner.lock().await.entries.contains_key(image)
    }

    /// Whether `image` is decoded and ready
    pub async fn is_ready(&self, image: &ImageRef) -> bool {
        self.inner
            .lock()
            .await
            .entries
            .get(image)
            .is_some_and(|entry| entry.state.borrow().ready().is_some())
    }

    /// Usage count of `image`, if cached
    pub async fn usage(&self, image: &ImageRef) -> Option<u64> {
        self.inner.lock().await.entries.get(image).map(|entry| entry.usage)
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats.clone()
    }

    /// Reserve an entry and spawn its decode; caller holds the lock
    fn start_decode(
        &self,
        inner: &mut CacheInner,
        image: &ImageRef,
        due: Option<EpochMillis>,
    ) -> Option<watch::Receiver<EntryState>> {
        let (seq, receiver) = inner.reserve(image.clone(), self.config.capacity, due)?;

        let entries = Arc::clone(&self.inner);
        let decoder = Arc::clone(&self.decoder);
        let permits = Arc::clone(&self.decode_permits);
        let image = image.clone();

        tokio::spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => {
                    // Evicted or cleared while queued for a permit
                    if !entries.lock().await.is_current(&image, seq) {
                        tracing::debug!(url = %image.url, "Skipping decode for evicted entry");
                        return;
                    }
                    decoder.decode(&image.url, image.width, image.height).await
                }
                Err(e) => Err(DecodeError::Task(e.to_string())),
            };

            let mut guard = entries.lock().await;
            let inner = &mut *guard;

            if !inner.is_current(&image, seq) {
                tracing::debug!(url = %image.url, "Dropping decode for evicted entry");
                return;
            }

            match result {
                Ok(data) => {
                    if let Some(entry) = inner.entries.get(&image) {
                        entry.state.send_replace(EntryState::Ready(Arc::new(data)));
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %image.url, error = %e, "Image decode failed");
                    inner.entries.remove(&image);
                    inner.stats.decode_failures += 1;
                }
            }
        });

        Some(receiver)
    }
}
