use forum_votes::redis::RedisClient;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires REDIS_URL and a local Redis"]
async fn rate_limit_window_resets_for_steady_voter() {
    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        eprintln!("skipping rate_limit_window_resets_for_steady_voter: REDIS_URL not set");
        return;
    };
    let redis = RedisClient::new(&redis_url).await.unwrap();
    let key = format!("vote_forum_post:{}", Uuid::new_v4());

    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
    assert!(!redis.check_rate_limit(&key, 2, 1).await.unwrap());

    // Hits inside the window must not push its expiry out
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;
    assert!(!redis.check_rate_limit(&key, 2, 1).await.unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(600)).await;

    assert!(redis.check_rate_limit(&key, 2, 1).await.unwrap());
    redis.cache_delete(&key).await.unwrap();
}
