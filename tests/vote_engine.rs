use std::sync::Arc;
use std::time::Duration;

use forum_votes::models::{VoteCounts, VoteDirection};
use forum_votes::services::invalidation::NoopNotifier;
use forum_votes::services::memory_vote_store::MemoryVoteStore;
use forum_votes::services::reconcile::VoteWidget;
use forum_votes::services::vote_engine::{RetryPolicy, TallyError, VoteEngine};
use forum_votes::services::vote_store::VoteStore;
use futures::future::join_all;
use rand::{Rng, SeedableRng, rngs::StdRng};
use uuid::Uuid;

use VoteDirection::{Down, Up};

async fn engine_with_post(counts: VoteCounts) -> (VoteEngine, Arc<MemoryVoteStore>, Uuid) {
    let store = Arc::new(MemoryVoteStore::new());
    let post_id = Uuid::new_v4();
    store.insert_post(post_id, counts).await;

    let engine = VoteEngine::new(
        store.clone(),
        Arc::new(NoopNotifier),
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::ZERO,
        },
    );
    (engine, store, post_id)
}

#[tokio::test]
async fn upvote_switch_and_retract_scenario() {
    let (engine, _, post_id) = engine_with_post(VoteCounts::new(5, 2)).await;
    let alice = Some(Uuid::new_v4());

    let outcome = engine.apply_vote(alice, post_id, Up).await.unwrap();
    assert_eq!((outcome.upvote_count, outcome.downvote_count), (6, 2));
    assert_eq!(outcome.vote, Some(Up));

    let outcome = engine.apply_vote(alice, post_id, Down).await.unwrap();
    assert_eq!((outcome.upvote_count, outcome.downvote_count), (5, 3));
    assert_eq!(outcome.vote, Some(Down));

    let outcome = engine.apply_vote(alice, post_id, Down).await.unwrap();
    assert_eq!((outcome.upvote_count, outcome.downvote_count), (5, 2));
    assert_eq!(outcome.vote, None);
}

#[tokio::test]
async fn same_direction_twice_restores_original_counts() {
    for direction in [Up, Down] {
        let (engine, store, post_id) = engine_with_post(VoteCounts::new(3, 4)).await;
        let user = Uuid::new_v4();

        engine.apply_vote(Some(user), post_id, direction).await.unwrap();
        let outcome = engine.apply_vote(Some(user), post_id, direction).await.unwrap();

        assert_eq!(outcome.counts(), VoteCounts::new(3, 4));
        assert_eq!(outcome.vote, None);
        assert_eq!(store.current_vote(user, post_id).await.unwrap(), None);
    }
}

#[tokio::test]
async fn unauthenticated_vote_changes_nothing() {
    let (engine, store, post_id) = engine_with_post(VoteCounts::new(5, 2)).await;

    let result = engine.apply_vote(None, post_id, Up).await;

    assert!(matches!(result, Err(TallyError::Unauthenticated)));
    assert_eq!(
        store.counts(post_id).await.unwrap(),
        Some(VoteCounts::new(5, 2))
    );
    assert!(store.vote_rows(post_id).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_users_all_count() {
    let (engine, store, post_id) = engine_with_post(VoteCounts::new(5, 2)).await;
    let engine = Arc::new(engine);

    let tasks = (0..32).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.upvote(Some(Uuid::new_v4()), post_id).await })
    });

    for result in join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(
        store.counts(post_id).await.unwrap(),
        Some(VoteCounts::new(37, 2))
    );
    assert_eq!(store.recount(post_id).await.unwrap(), Some(VoteCounts::new(32, 0)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_clicks_from_one_user_land_in_a_valid_state() {
    let (engine, store, post_id) = engine_with_post(VoteCounts::default()).await;
    let engine = Arc::new(engine);
    let user = Uuid::new_v4();

    let up = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.upvote(Some(user), post_id).await })
    };
    let down = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.downvote(Some(user), post_id).await })
    };
    up.await.unwrap().unwrap();
    down.await.unwrap().unwrap();

    let counts = store.counts(post_id).await.unwrap().unwrap();
    let vote = store.current_vote(user, post_id).await.unwrap();
    match vote {
        Some(Up) => assert_eq!(counts, VoteCounts::new(1, 0)),
        Some(Down) => assert_eq!(counts, VoteCounts::new(0, 1)),
        None => panic!("a switch can never end in no vote"),
    }
    assert_eq!(store.recount(post_id).await.unwrap(), Some(counts));
}

#[tokio::test]
async fn random_sequences_keep_aggregate_exact() {
    let store = Arc::new(MemoryVoteStore::new());
    let posts: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for post_id in &posts {
        store.insert_post(*post_id, VoteCounts::default()).await;
    }
    let users: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
    let engine = VoteEngine::new(store.clone(), Arc::new(NoopNotifier), RetryPolicy::default());
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..500 {
        let user = users[rng.random_range(0..users.len())];
        let post_id = posts[rng.random_range(0..posts.len())];
        let direction = if rng.random_bool(0.5) { Up } else { Down };

        let outcome = engine.apply_vote(Some(user), post_id, direction).await.unwrap();

        assert!(outcome.upvote_count >= 0 && outcome.downvote_count >= 0);
        assert_eq!(store.recount(post_id).await.unwrap(), Some(outcome.counts()));
        assert!(engine.audit(post_id).await.unwrap().consistent);
    }
}

#[tokio::test]
async fn widget_adopts_server_counts_after_concurrent_vote() {
    let (engine, _, post_id) = engine_with_post(VoteCounts::new(5, 2)).await;
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let initial = engine.vote_state(Some(alice), post_id).await.unwrap();
    let mut widget = VoteWidget::from_outcome(post_id, &initial);

    let pending = widget.click(Up).unwrap();
    assert_eq!(widget.counts(), VoteCounts::new(6, 2));

    // Bob's vote commits before Alice's request is processed
    engine.upvote(Some(bob), post_id).await.unwrap();

    let result = engine
        .apply_vote(Some(alice), pending.post_id, pending.direction)
        .await;
    widget.resolve(result);

    assert_eq!(widget.counts(), VoteCounts::new(7, 2));
    assert_eq!(widget.vote(), Some(Up));
}

#[tokio::test]
async fn widget_rolls_back_when_post_is_gone() {
    let (engine, _, _) = engine_with_post(VoteCounts::default()).await;
    let missing = Uuid::new_v4();
    let mut widget = VoteWidget::new(missing, VoteCounts::new(1, 1), Some(Up));

    let pending = widget.click(Down).unwrap();
    let result = engine
        .apply_vote(Some(Uuid::new_v4()), pending.post_id, pending.direction)
        .await;
    assert!(matches!(result, Err(TallyError::NotFound(_))));
    widget.resolve(result);

    assert_eq!(widget.counts(), VoteCounts::new(1, 1));
    assert_eq!(widget.vote(), Some(Up));
    assert!(widget.last_error().is_some());
}
