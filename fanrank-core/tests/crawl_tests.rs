// Tests for the crawl-and-rank pipeline

use fanrank_core::EngineConfig;
use fanrank_core::crawl::{
    MAX_DEPTH, RankOptions, Ranking, clamp_depth, execute_rank, rank_follower_graph, resolve_user,
};
use fanrank_crawler::{CancellationToken, CrawlError, SourceError, StaticSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn alice_graph() -> StaticSource {
    StaticSource::from_graph(&[
        ("alice", &["bob", "carol", "dave"]),
        ("bob", &["erin"]),
        ("carol", &["erin", "bob"]),
        ("dave", &[]),
        ("erin", &["frank"]),
        ("frank", &[]),
    ])
}

fn count(ranking: &Ranking, login: &str) -> usize {
    ranking
        .get(login)
        .unwrap_or_else(|| panic!("{} missing", login))
        .followers_count
}

// ============================================================================
// Depth Clamping Tests
// ============================================================================

#[test]
fn test_clamp_depth() {
    assert_eq!(clamp_depth(0), 1);
    assert_eq!(clamp_depth(1), 1);
    assert_eq!(clamp_depth(4), 4);
    assert_eq!(clamp_depth(MAX_DEPTH), MAX_DEPTH);
    assert_eq!(clamp_depth(99), MAX_DEPTH);
}

#[test]
fn test_options_from_config() {
    let config = EngineConfig {
        page_size: 7,
        workers: 2,
        request_timeout: Duration::from_secs(1),
        ..EngineConfig::default()
    }
    .with_max_depth(3);

    let options = RankOptions::from_config("alice", &config);
    assert_eq!(options.root, "alice");
    assert_eq!(options.max_depth, 3);
    assert_eq!(options.page_size, 7);
    assert_eq!(options.workers, 2);
    assert_eq!(options.request_timeout, Duration::from_secs(1));
    assert!(!options.show_progress_bars);
    assert!(options.cancel.is_none());
}

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_depth_one_ranks_root_only() {
    let users = rank_follower_graph(alice_graph(), "alice", 1).await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].login(), "alice");
    assert_eq!(users[0].followers_count, 3);
}

#[tokio::test]
async fn test_depth_two_ranks_root_and_followers() {
    let ranking = execute_rank(alice_graph(), RankOptions::new("alice", 2), None)
        .await
        .unwrap();

    assert_eq!(ranking.root, "alice");
    assert_eq!(ranking.max_depth, 2);
    assert!(ranking.is_complete());
    assert_eq!(ranking.users.len(), 4);
    // bob and carol's followers are edges past the depth bound, counted as leaves.
    assert_eq!(count(&ranking, "alice"), 4);
    assert_eq!(count(&ranking, "bob"), 1);
    assert_eq!(count(&ranking, "carol"), 2);
    assert_eq!(count(&ranking, "dave"), 0);
}

#[tokio::test]
async fn test_deep_crawl_counts_transitive_followers() {
    let ranking = execute_rank(alice_graph(), RankOptions::new("alice", 4), None)
        .await
        .unwrap();

    assert_eq!(ranking.users.len(), 6);
    assert_eq!(count(&ranking, "alice"), 5);
    assert_eq!(count(&ranking, "bob"), 2);
    assert_eq!(count(&ranking, "carol"), 3);
    assert_eq!(count(&ranking, "erin"), 1);
    assert_eq!(ranking.get("erin").unwrap().depth, 3);
    assert_eq!(ranking.get("frank").unwrap().depth, 4);
}

#[tokio::test]
async fn test_out_of_range_depth_is_clamped() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let callback: fanrank_core::RankProgressCallback = Arc::new(move |msg: String| {
        sink.lock().unwrap().push(msg);
    });

    let ranking = execute_rank(alice_graph(), RankOptions::new("alice", 0), Some(callback))
        .await
        .unwrap();
    assert_eq!(ranking.max_depth, 1);
    assert_eq!(ranking.users.len(), 1);

    let messages = messages.lock().unwrap();
    assert!(messages.iter().any(|m| m.contains("out of range")));
    assert!(messages.iter().any(|m| m == "depth 1: alice"));
}

#[tokio::test]
async fn test_repeated_runs_agree() {
    let source = Arc::new(alice_graph());
    let first = rank_follower_graph(source.clone(), "alice", 3).await.unwrap();
    let second = rank_follower_graph(source.clone(), "alice", 3).await.unwrap();

    let mut first_counts: Vec<(String, usize)> = first
        .iter()
        .map(|u| (u.login().to_string(), u.followers_count))
        .collect();
    let mut second_counts: Vec<(String, usize)> = second
        .iter()
        .map(|u| (u.login().to_string(), u.followers_count))
        .collect();
    first_counts.sort();
    second_counts.sort();
    assert_eq!(first_counts, second_counts);
}

#[tokio::test]
async fn test_workers_do_not_change_counts() {
    let mut serial = RankOptions::new("alice", 4);
    serial.workers = 1;
    let mut parallel = RankOptions::new("alice", 4);
    parallel.workers = 16;

    let serial = execute_rank(alice_graph(), serial, None).await.unwrap();
    let parallel = execute_rank(alice_graph(), parallel, None).await.unwrap();

    for user in &serial.users {
        assert_eq!(count(&parallel, user.login()), user.followers_count);
    }
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_root_fails() {
    let result = rank_follower_graph(alice_graph(), "nobody", 2).await;
    assert!(matches!(result, Err(CrawlError::NotFound(login)) if login == "nobody"));
}

#[tokio::test]
async fn test_rate_limited_followers_are_reported() {
    let source = alice_graph().fail_followers(
        "bob",
        SourceError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        },
    );

    let ranking = execute_rank(source, RankOptions::new("alice", 3), None)
        .await
        .unwrap();

    assert!(!ranking.is_complete());
    assert!(ranking.rate_limited());
    assert_eq!(ranking.retry_after, Some(Duration::from_secs(30)));
    assert_eq!(count(&ranking, "bob"), 0);
    // carol still reaches erin and bob through her own edges.
    assert!(count(&ranking, "carol") >= 2);
}

#[tokio::test]
async fn test_cancelled_run_returns_error() {
    let token = CancellationToken::new();
    token.cancel();
    let mut options = RankOptions::new("alice", 3);
    options.cancel = Some(token);

    let result = execute_rank(alice_graph(), options, None).await;
    assert!(matches!(result, Err(CrawlError::Cancelled)));
}

// ============================================================================
// Single User Lookup Tests
// ============================================================================

#[tokio::test]
async fn test_resolve_user() {
    let source = alice_graph();
    let user = resolve_user(&source, "carol", Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(user.login, "carol");
    assert!(user.created_at.is_some());

    let missing = resolve_user(&source, "nobody", Duration::from_secs(10)).await;
    assert!(matches!(missing, Err(SourceError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_resolve_user_waits_for_configured_timeout() {
    let source = alice_graph().delay_profile("carol", Duration::from_secs(15));

    let user = resolve_user(&source, "carol", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(user.login, "carol");
}

#[tokio::test(start_paused = true)]
async fn test_resolve_user_gives_up_after_configured_timeout() {
    let source = alice_graph().delay_profile("carol", Duration::from_secs(15));

    let started = tokio::time::Instant::now();
    let result = resolve_user(&source, "carol", Duration::from_secs(5)).await;

    assert!(matches!(result, Err(SourceError::RemoteUnavailable(_))));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(15));
}
