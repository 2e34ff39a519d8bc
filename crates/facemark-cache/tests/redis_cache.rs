//! Redis result cache integration tests.

use facemark_cache::{decode_result, encode_result, CacheConfig, RedisResultCache, ResultCache};
use facemark_models::{BoundingRegion, Detection, Fingerprint, PipelineResult, Point};

fn redis_cache() -> RedisResultCache {
    dotenvy::dotenv().ok();
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    RedisResultCache::new(&url, "facemark:test:").expect("Failed to create Redis cache")
}

/// Test Redis connection.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_health_check() {
    let cache = redis_cache();
    cache.health_check().await.expect("Redis should answer PING");
}

/// Test a full result survives a store/load cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_result_roundtrip() {
    let cache = redis_cache();
    let key = Fingerprint::parse("0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f").unwrap();
    let result = PipelineResult::new(
        vec![Detection::face_only(BoundingRegion::square(909, 298, 705))
            .with_eyes(Some(Point::new(856, 174)), None)
            .with_mouth(vec![Point::new(1100, 300), Point::NOT_FOUND])],
        format!("{}.jpg", key),
    );

    cache
        .set(&key, &encode_result(&result).unwrap())
        .await
        .expect("Failed to store result");
    let stored = cache.get(&key).await.expect("Failed to load result");

    assert_eq!(decode_result(&key, &stored.unwrap()), Some(result));
}

/// Test that a fingerprint never written is absent.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_unknown_key_is_absent() {
    let cache = redis_cache();
    let key = Fingerprint::parse("deadbeefdeadbeefdeadbeefdeadbeef").unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

/// Test config defaults without a Redis URL.
#[test]
fn test_config_default_prefix() {
    assert_eq!(CacheConfig::default().key_prefix, "facemark:result:");
}
