//! Distributed tier: HTTP key/value store.
//!
//! Protocol (all paths relative to the configured base URL):
//!
//! | Request | Meaning |
//! |---------|---------|
//! | `GET /entries/{key}` | 200 with a JSON [`CacheEntry`], 404 on miss |
//! | `PUT /entries/{key}?ttl=<secs>` | store a JSON [`CacheEntry`] |
//! | `DELETE /entries/{key}` | remove one entry |
//! | `DELETE /entries` | remove all entries |
//! | `GET /health` | any 2xx means reachable |
//!
//! A transport error or 5xx marks the tier disconnected. While disconnected,
//! reads miss and writes are skipped without touching the network, and one
//! background task probes `/health` until the store answers again.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use super::{CacheLookup, CacheTier, TierKind};
use crate::error::{GraderError, GraderResult};
use crate::model::CacheEntry;

const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(30);

struct RemoteShared {
    client: reqwest::Client,
    base_url: String,
    connected: AtomicBool,
    reconnecting: AtomicBool,
    /// First reconnect delay in milliseconds, read at every attempt.
    backoff_ms: AtomicU64,
}

impl RemoteShared {
    fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms.load(Ordering::Relaxed))
    }

    async fn healthy(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "distributed cache health probe failed");
                false
            }
        }
    }
}

/// Mark the store unreachable and start a reconnect task if none is running.
fn mark_disconnected(shared: &Arc<RemoteShared>, reason: &str) {
    if shared.connected.swap(false, Ordering::SeqCst) {
        warn!(url = %shared.base_url, reason, "distributed cache disconnected");
    }
    if shared.reconnecting.swap(true, Ordering::SeqCst) {
        return;
    }
    tokio::spawn(reconnect(Arc::downgrade(shared)));
}

async fn reconnect(weak: Weak<RemoteShared>) {
    use rand::Rng;

    let mut attempt: u32 = 0;
    loop {
        let Some(base) = weak.upgrade().map(|shared| shared.backoff()) else {
            return;
        };
        let ceiling = base
            .saturating_mul(1u32 << attempt.min(16))
            .min(MAX_RECONNECT_BACKOFF);
        let jittered_ms = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
        tokio::time::sleep(Duration::from_millis(jittered_ms.max(10))).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        if shared.healthy().await {
            shared.connected.store(true, Ordering::SeqCst);
            shared.reconnecting.store(false, Ordering::SeqCst);
            info!(url = %shared.base_url, attempts = attempt + 1, "distributed cache reconnected");
            return;
        }
        attempt = attempt.saturating_add(1);
        debug!(url = %shared.base_url, attempt, "distributed cache still unreachable");
    }
}

/// HTTP-backed keyed tier.
pub struct RemoteTier {
    shared: Arc<RemoteShared>,
    ttl_secs: u64,
}

impl RemoteTier {
    /// Tier for `base_url`, assumed reachable until a request says otherwise.
    pub fn new(base_url: &str, ttl_secs: u64, timeout_secs: u64) -> GraderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .map_err(|e| GraderError::Config {
                message: format!("failed to build distributed cache client: {}", e),
            })?;

        Ok(Self {
            shared: Arc::new(RemoteShared {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                connected: AtomicBool::new(true),
                reconnecting: AtomicBool::new(false),
                backoff_ms: AtomicU64::new(DEFAULT_RECONNECT_BACKOFF.as_millis() as u64),
            }),
            ttl_secs,
        })
    }

    /// Build the tier and probe `/health` once. An unreachable store is not an
    /// error: the tier starts disconnected and keeps retrying in the background.
    pub async fn connect(base_url: &str, ttl_secs: u64, timeout_secs: u64) -> GraderResult<Self> {
        let tier = Self::new(base_url, ttl_secs, timeout_secs)?;
        tier.probe().await;
        Ok(tier)
    }

    /// Set the first reconnect delay. Takes effect from the next reconnect
    /// attempt, including one already scheduled by a failed [`connect`](Self::connect).
    pub fn with_reconnect_backoff(self, base: Duration) -> Self {
        let ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.shared.backoff_ms.store(ms, Ordering::Relaxed);
        self
    }

    pub fn reconnect_backoff(&self) -> Duration {
        self.shared.backoff()
    }

    /// Check `/health` now, updating the connection state.
    pub async fn probe(&self) -> bool {
        if self.shared.healthy().await {
            self.shared.connected.store(true, Ordering::SeqCst);
            debug!(url = %self.shared.base_url, "distributed cache reachable");
            true
        } else {
            mark_disconnected(&self.shared, "health probe failed");
            false
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn base_url(&self) -> &str {
        &self.shared.base_url
    }

    fn entry_url(&self, key: &str) -> String {
        format!("{}/entries/{}", self.shared.base_url, key)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> GraderResult<reqwest::Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                mark_disconnected(&self.shared, "transport error");
                return Err(e.into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            mark_disconnected(&self.shared, "server error");
            return Err(GraderError::Cache {
                message: format!("distributed cache returned {}", status),
            });
        }
        Ok(response)
    }
}

fn unexpected(status: StatusCode) -> GraderError {
    GraderError::Cache {
        message: format!("unexpected distributed cache status {}", status),
    }
}

#[async_trait]
impl CacheTier for RemoteTier {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    async fn get(&self, lookup: &CacheLookup<'_>) -> GraderResult<Option<CacheEntry>> {
        if !self.is_connected() {
            return Ok(None);
        }
        let response = self
            .send(self.shared.client.get(self.entry_url(lookup.key)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json::<CacheEntry>().await?)),
            s => Err(unexpected(s)),
        }
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> GraderResult<()> {
        if !self.is_connected() {
            debug!(key, "distributed cache disconnected, skipping write");
            return Ok(());
        }
        let url = format!("{}?ttl={}", self.entry_url(key), self.ttl_secs);
        let response = self.send(self.shared.client.put(url).json(entry)).await?;
        if !response.status().is_success() {
            return Err(unexpected(response.status()));
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> GraderResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let response = self
            .send(self.shared.client.delete(self.entry_url(key)))
            .await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(unexpected(status))
        }
    }

    async fn clear(&self) -> GraderResult<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let url = format!("{}/entries", self.shared.base_url);
        let response = self.send(self.shared.client.delete(url)).await?;
        if !response.status().is_success() {
            return Err(unexpected(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeSubmission, GradingResult, Layer1Result, Layer2Result, Rubric};
    use chrono::Utc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry() -> CacheEntry {
        CacheEntry::new(GradingResult {
            session_id: "s".into(),
            milestone: 1,
            passed: true,
            overall_score: 72,
            layer1: Layer1Result {
                passed: true,
                syntax_errors: vec![],
                structural_issues: vec![],
                security_violations: vec![],
                file_count: 1,
                total_lines: 4,
                fingerprint: "fp".into(),
            },
            layer2: Layer2Result {
                functionality_score: 72,
                quality_score: 72,
                best_practices_score: 72,
                innovation_score: 72,
                weighted_score: 72,
                feedback: "ok".into(),
                suggestions: vec![],
            },
            rubric: Rubric::default(),
            timestamp: Utc::now(),
            cached: false,
        })
    }

    async fn lookup_get(tier: &RemoteTier, key: &str) -> GraderResult<Option<CacheEntry>> {
        let submission = CodeSubmission {
            user_id: "u".into(),
            session_id: "s".into(),
            milestone: 1,
            files: vec![],
        };
        let rubric = Rubric::default();
        tier.get(&CacheLookup {
            key,
            submission: &submission,
            rubric: &rubric,
        })
        .await
    }

    #[tokio::test]
    async fn hit_and_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entries/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entry()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/entries/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tier = RemoteTier::new(&server.uri(), 60, 2).unwrap();
        let hit = lookup_get(&tier, "abc").await.unwrap().unwrap();
        assert_eq!(hit.result.overall_score, 72);
        assert!(lookup_get(&tier, "nope").await.unwrap().is_none());
        assert!(tier.is_connected());
    }

    #[tokio::test]
    async fn put_sends_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/entries/abc"))
            .and(query_param("ttl", "120"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tier = RemoteTier::new(&format!("{}/", server.uri()), 120, 2).unwrap();
        tier.set("abc", &entry()).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_disconnects_and_skips_later_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entries/abc"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tier = RemoteTier::new(&server.uri(), 60, 2)
            .unwrap()
            .with_reconnect_backoff(Duration::from_secs(60));

        let err = lookup_get(&tier, "abc").await.unwrap_err();
        assert!(matches!(err, GraderError::Cache { .. }));
        assert!(!tier.is_connected());

        // No further requests while disconnected.
        assert!(lookup_get(&tier, "abc").await.unwrap().is_none());
        tier.set("abc", &entry()).await.unwrap();
        tier.del("abc").await.unwrap();
    }

    #[tokio::test]
    async fn reconnects_when_health_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/entries/abc"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let tier = RemoteTier::new(&server.uri(), 60, 2)
            .unwrap()
            .with_reconnect_backoff(Duration::from_millis(10));

        assert!(lookup_get(&tier, "abc").await.is_err());

        let mut waited = Duration::ZERO;
        while !tier.is_connected() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert!(tier.is_connected());
    }

    #[tokio::test]
    async fn unreachable_store_starts_disconnected() {
        let tier = RemoteTier::connect("http://127.0.0.1:9", 60, 1)
            .await
            .unwrap()
            .with_reconnect_backoff(Duration::from_secs(60));
        assert_eq!(tier.reconnect_backoff(), Duration::from_secs(60));
        assert!(!tier.is_connected());
        assert!(lookup_get(&tier, "abc").await.unwrap().is_none());
        tier.clear().await.unwrap();
    }

    #[tokio::test]
    async fn backoff_set_after_failed_connect_drives_reconnect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // The reconnect task is already spawned when the backoff is set.
        let tier = RemoteTier::connect(&server.uri(), 60, 2)
            .await
            .unwrap()
            .with_reconnect_backoff(Duration::from_millis(10));
        assert!(!tier.is_connected());
        assert_eq!(tier.reconnect_backoff(), Duration::from_millis(10));

        let mut waited = Duration::ZERO;
        while !tier.is_connected() && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert!(tier.is_connected());
    }
}
