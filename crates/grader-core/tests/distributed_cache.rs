//! Integration tests for the distributed cache tier behind GradingEngine.
//!
//! Uses wiremock as the key/value store. Covers write-through, remote hits
//! promoted into memory, and an unreachable store never failing a judge call.

use std::sync::Arc;
use std::time::Duration;

use grader_core::{
    cache_key, CacheEntry, CacheTier, CodeSubmission, EngineConfig, GradingEngine, GradingRequest,
    MemoryTier, ReferenceBackend, RemoteTier, ResultCache, Rubric, SubmissionFile, TierKind,
};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn submission() -> CodeSubmission {
    CodeSubmission {
        user_id: "learner-2".into(),
        session_id: "s-remote".into(),
        milestone: 2,
        files: vec![SubmissionFile::new(
            "src/sum.js",
            "export const sum = (xs) => xs.reduce((a, b) => a + b, 0);",
            "javascript",
        )],
    }
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_miss_writes_through_to_remote() {
    let server = MockServer::start().await;
    mount_health(&server).await;

    let key = cache_key(&submission(), &Rubric::default());
    Mock::given(method("GET"))
        .and(path(format!("/entries/{}", key)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/entries/{}", key)))
        .and(query_param("ttl", "600"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = EngineConfig {
        remote_ttl_secs: 600,
        ..EngineConfig::default()
            .with_remote_url(server.uri())
            .with_heuristic_templates(false)
    };
    let engine = GradingEngine::from_config(config).await.expect("engine");

    let first = engine
        .judge(GradingRequest::new(submission()).with_seed(11))
        .await
        .expect("judge");
    assert!(!first.cached);

    // Second call is answered by memory; the remote sees no second GET.
    let second = engine
        .judge(GradingRequest::new(submission()).with_seed(11))
        .await
        .expect("judge");
    assert!(second.cached);
}

#[tokio::test]
async fn test_remote_hit_is_promoted_into_memory() {
    let server = MockServer::start().await;
    mount_health(&server).await;

    // Grade once with a memory-only engine to obtain a real result to serve.
    let seed_engine = GradingEngine::with_components(
        Arc::new(ReferenceBackend::new()),
        ResultCache::memory_only(10),
        EngineConfig::default().with_heuristic_templates(false),
    );
    let graded = seed_engine
        .judge(GradingRequest::new(submission()).with_seed(3))
        .await
        .expect("judge");

    let key = cache_key(&submission(), &Rubric::default());
    Mock::given(method("GET"))
        .and(path(format!("/entries/{}", key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(CacheEntry::new(graded.clone())))
        .expect(1)
        .mount(&server)
        .await;

    let memory = Arc::new(MemoryTier::new(10));
    let remote = RemoteTier::connect(&server.uri(), 60, 2).await.expect("remote");
    assert!(remote.is_connected());
    let cache = ResultCache::new(vec![memory.clone(), Arc::new(remote)]);
    assert_eq!(cache.tier_kinds(), vec![TierKind::Memory, TierKind::Remote]);

    let engine = GradingEngine::with_components(
        Arc::new(ReferenceBackend::new()),
        cache,
        EngineConfig::default().with_heuristic_templates(false),
    );

    let hit = engine
        .judge(GradingRequest::new(submission()).with_seed(3))
        .await
        .expect("judge");
    assert!(hit.cached);
    assert_eq!(hit.overall_score, graded.overall_score);
    assert_eq!(memory.len(), 1);

    // Served from memory now; the remote expectation of exactly one GET holds.
    let again = engine
        .judge(GradingRequest::new(submission()).with_seed(3))
        .await
        .expect("judge");
    assert!(again.cached);
    assert_eq!(engine.cache_stats().remote_hits, 1);
    assert_eq!(engine.cache_stats().memory_hits, 1);
}

#[tokio::test]
async fn test_failing_remote_never_fails_judge() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(path_regex(r"^/entries"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let remote = RemoteTier::new(&server.uri(), 60, 2)
        .expect("remote")
        .with_reconnect_backoff(Duration::from_secs(60));
    let cache = ResultCache::new(vec![Arc::new(MemoryTier::new(10)), Arc::new(remote)]);
    let engine = GradingEngine::with_components(
        Arc::new(ReferenceBackend::new()),
        cache,
        EngineConfig::default().with_heuristic_templates(false),
    );

    let first = engine
        .judge(GradingRequest::new(submission()).with_seed(8))
        .await
        .expect("judge survives remote failure");
    assert!(!first.cached);

    let second = engine
        .judge(GradingRequest::new(submission()).with_seed(8))
        .await
        .expect("judge");
    assert!(second.cached);

    engine.clear_cache().await;
}

#[tokio::test]
async fn test_unreachable_remote_at_startup() {
    let config = EngineConfig::default()
        .with_remote_url("http://127.0.0.1:9")
        .with_heuristic_templates(false);
    let engine = GradingEngine::from_config(config).await.expect("engine");

    let result = engine
        .judge(GradingRequest::new(submission()).with_seed(1))
        .await
        .expect("judge");
    assert!(!result.cached);
}

#[tokio::test]
async fn test_remote_tier_direct_invalidate_and_clear() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/entries/k1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/entries"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteTier::new(&server.uri(), 60, 2).expect("remote");
    remote.del("k1").await.expect("del");
    remote.clear().await.expect("clear");
    assert!(remote.is_connected());
}
