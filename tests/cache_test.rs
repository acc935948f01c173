//! Integration tests for the bounded image cache
//!
//! These tests verify:
//! - Capacity-bounded eviction by usage count
//! - Hits that never re-decode
//! - Failed decodes that are retried instead of cached

mod common;

use common::CountingDecoder;
use proptest::prelude::*;
use slotcast::cache::{CacheConfig, CacheError, ImageCache, MissReason};
use slotcast::models::ImageRef;
use std::sync::Arc;
use std::time::Duration;

fn image(name: &str) -> ImageRef {
    ImageRef::new(format!("https://cdn.test/{name}.png"), 8, 4)
}

fn cache_with(capacity: usize, decoder: Arc<CountingDecoder>) -> ImageCache {
    let config = CacheConfig {
        capacity,
        ..CacheConfig::default()
    };
    ImageCache::new(config, decoder)
}

/// Usage-count eviction with a capacity of three
#[tokio::test]
async fn test_least_used_entry_is_evicted() {
    let decoder = Arc::new(CountingDecoder::default());
    let cache = cache_with(3, decoder.clone());
    let (x, y, z, w) = (image("x"), image("y"), image("z"), image("w"));

    for key in [&x, &y, &z] {
        cache.prefetch(key).await;
    }

    cache.get(&x).await.unwrap();
    cache.get(&x).await.unwrap();
    cache.get(&y).await.unwrap();

    cache.prefetch(&w).await;

    assert_eq!(cache.len().await, 3);
    assert!(!cache.contains(&z).await);
    assert!(cache.contains(&x).await);
    assert!(cache.contains(&y).await);
    assert!(cache.contains(&w).await);
    assert_eq!(cache.usage(&x).await, Some(2));
    assert_eq!(cache.stats().await.evictions, 1);
}

#[tokio::test]
async fn test_populated_get_does_not_redecode() {
    let decoder = Arc::new(CountingDecoder::default());
    let cache = cache_with(10, decoder.clone());
    let key = image("a");

    cache.prefetch(&key).await;
    let first = cache.get(&key).await.unwrap();
    let second = cache.get(&key).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!((first.width, first.height), (8, 4));
    assert_eq!(decoder.calls_for(&key.url), 1);
    assert_eq!(cache.usage(&key).await, Some(2));
}

#[tokio::test]
async fn test_repeated_prefetch_is_deduplicated() {
    let decoder = Arc::new(CountingDecoder::default());
    let cache = cache_with(10, decoder.clone());
    let key = image("a");

    assert!(cache.prefetch(&key).await);
    assert!(!cache.prefetch(&key).await);
    assert!(!cache.prefetch(&key).await);

    cache.get(&key).await.unwrap();
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_failed_decode_is_retried_on_next_request() {
    let decoder = Arc::new(CountingDecoder::default());
    let cache = cache_with(10, decoder.clone());
    let key = image("flaky");

    decoder.fail(&key.url);
    let err = cache.get(&key).await.unwrap_err();
    assert_eq!(
        err,
        CacheError::Miss {
            url: key.url.clone(),
            reason: MissReason::Unavailable,
        }
    );
    assert!(!cache.contains(&key).await);

    decoder.heal(&key.url);
    let data = cache.get(&key).await.unwrap();
    assert_eq!(data.byte_len(), 8 * 4 * 4);
    assert_eq!(decoder.calls_for(&key.url), 2);

    let stats = cache.stats().await;
    assert_eq!(stats.decode_failures, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_decode_misses_then_hits() {
    let decoder = Arc::new(CountingDecoder::with_delay(Duration::from_secs(3)));
    let cache = cache_with(10, decoder.clone());
    let key = image("slow");

    let err = cache.get(&key).await.unwrap_err();
    assert!(matches!(err, CacheError::Miss { reason: MissReason::Timeout, .. }));
    assert!(cache.contains(&key).await);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(cache.is_ready(&key).await);
    cache.get(&key).await.unwrap();
    assert_eq!(decoder.calls(), 1);
}

#[tokio::test]
async fn test_incomplete_reference_is_rejected() {
    let decoder = Arc::new(CountingDecoder::default());
    let cache = cache_with(10, decoder.clone());

    let err = cache
        .get(&ImageRef::new("https://cdn.test/a.png", 0, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::IncompleteRef { width: 0, .. }));
    assert_eq!(decoder.calls(), 0);
    assert!(cache.is_empty().await);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_capacity_never_exceeded(
        capacity in 1usize..8,
        ops in prop::collection::vec((0u8..16, any::<bool>()), 1..60),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let cache = cache_with(capacity, Arc::new(CountingDecoder::default()));
            for (name, is_get) in ops {
                let key = image(&format!("img-{name}"));
                if is_get {
                    let _ = cache.get(&key).await;
                } else {
                    cache.prefetch(&key).await;
                }
                prop_assert!(cache.len().await <= capacity);
            }
            Ok(())
        })?;
    }
}
