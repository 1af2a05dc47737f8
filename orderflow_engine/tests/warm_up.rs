mod support;

use orderflow_engine::{warm_up_cache, OrderCache, OrderStore, WarmUpError};
use support::{prepare_env::*, sample_order};

#[tokio::test]
async fn warm_up_loads_every_stored_order() {
    let db = prepare_test_env(&random_db_path()).await;
    const N: i64 = 25;
    for i in 0..N {
        db.persist(&sample_order(&format!("warm-{i}"), i % 4)).await.unwrap();
    }

    let cache = OrderCache::new();
    let loaded = warm_up_cache(&db, &cache).await.expect("warm-up failed");
    assert_eq!(loaded, N as usize);
    assert_eq!(cache.len().await, N as usize);
    for i in 0..N {
        let uid = format!("warm-{i}");
        let cached = cache.get(&uid).await.unwrap_or_else(|| panic!("{uid} is missing from the cache"));
        assert_eq!(*cached, sample_order(&uid, i % 4));
    }
    assert!(cache.get("never-persisted").await.is_none());
}

#[tokio::test]
async fn warm_up_of_an_empty_store() {
    let db = prepare_test_env(&random_db_path()).await;
    let cache = OrderCache::new();
    assert_eq!(warm_up_cache(&db, &cache).await.unwrap(), 0);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn warm_up_fails_if_the_store_is_unreachable() {
    let db = prepare_test_env(&random_db_path()).await;
    db.close().await;
    let cache = OrderCache::new();
    let err = warm_up_cache(&db, &cache).await.expect_err("warm-up must fail");
    assert!(matches!(err, WarmUpError::StoreUnavailable(_)));
    assert!(cache.is_empty().await);
}
