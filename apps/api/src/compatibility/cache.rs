//! Analysis cache: optional key-value collaborator consulted before the
//! cascade and written after a successful analysis.
//!
//! Cache trouble never fails an analysis: errors are logged and read as a miss.
//! Eviction and TTL are the backend's policy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tokio::sync::{OnceCell, RwLock};
use tokio::time::timeout;
use tracing::warn;

use crate::compatibility::models::{CompatibilityAnalysis, CompatibilityRequest};

const KEY_PREFIX: &str = "compat:v1:";

#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CompatibilityAnalysis>;
    async fn put(&self, key: &str, analysis: &CompatibilityAnalysis);
}

/// Stable key over (job id, profile version). Without an explicit version the
/// profile's canonical JSON is fingerprinted instead.
pub fn cache_key(request: &CompatibilityRequest) -> String {
    let version = match request.candidate.profile_version.as_deref() {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => profile_fingerprint(request),
    };

    let mut hasher = Sha256::new();
    hasher.update(request.job.id.as_bytes());
    hasher.update([0u8]);
    hasher.update(request.candidate.id.as_bytes());
    hasher.update([0u8]);
    hasher.update(version.as_bytes());
    format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

fn profile_fingerprint(request: &CompatibilityRequest) -> String {
    // Struct serialization is field-ordered, so this is stable for equal profiles.
    let canonical = serde_json::to_vec(&request.candidate).unwrap_or_default();
    format!("fp:{}", hex::encode(Sha256::digest(&canonical)))
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

/// Default bound on each cache round trip, connection setup included.
pub const DEFAULT_CACHE_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// One multiplexed connection, opened on first use and cloned per operation.
/// A failed or timed-out connect leaves the cell empty so the next call retries.
pub struct RedisAnalysisCache {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    ttl: Duration,
    op_timeout: Duration,
}

impl RedisAnalysisCache {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
            ttl,
            op_timeout: DEFAULT_CACHE_OP_TIMEOUT,
        }
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        let connect = self
            .conn
            .get_or_try_init(|| self.client.get_multiplexed_async_connection());
        match timeout(self.op_timeout, connect).await {
            Ok(Ok(conn)) => Some(conn.clone()),
            Ok(Err(e)) => {
                warn!("Analysis cache unavailable: {e}");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Analysis cache connect timed out"
                );
                None
            }
        }
    }
}

#[async_trait]
impl AnalysisCache for RedisAnalysisCache {
    async fn get(&self, key: &str) -> Option<CompatibilityAnalysis> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match timeout(self.op_timeout, conn.get(key)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(key, "Analysis cache read failed: {e}");
                return None;
            }
            Err(_) => {
                warn!(key, "Analysis cache read timed out, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!(key, "Discarding undecodable cached analysis: {e}");
                None
            }
        }
    }

    async fn put(&self, key: &str, analysis: &CompatibilityAnalysis) {
        let value = match serde_json::to_string(analysis) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, "Failed to encode analysis for cache: {e}");
                return;
            }
        };
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let write = conn.set_ex::<_, _, ()>(key, value, self.ttl.as_secs());
        match timeout(self.op_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(key, "Analysis cache write failed: {e}"),
            Err(_) => warn!(key, "Analysis cache write timed out"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local cache with no eviction. For tests and single-node setups.
#[derive(Debug, Default)]
pub struct InMemoryAnalysisCache {
    entries: RwLock<HashMap<String, CompatibilityAnalysis>>,
}

impl InMemoryAnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl AnalysisCache for InMemoryAnalysisCache {
    async fn get(&self, key: &str) -> Option<CompatibilityAnalysis> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, analysis: &CompatibilityAnalysis) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), analysis.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::aggregator::build_analysis;
    use crate::compatibility::test_support::{senior_backend_request, uniform_output};
    use crate::compatibility::validator::validate;

    #[test]
    fn test_key_is_stable_and_prefixed() {
        let request = senior_backend_request();
        let key = cache_key(&request);
        assert!(key.starts_with(KEY_PREFIX));
        assert_eq!(key.len(), KEY_PREFIX.len() + 64);
        assert_eq!(key, cache_key(&request.clone()));
    }

    #[test]
    fn test_key_changes_with_job_or_version() {
        let request = senior_backend_request();
        let mut other_job = request.clone();
        other_job.job.id = "job-other".into();
        let mut other_version = request.clone();
        other_version.candidate.profile_version = Some("v99".into());

        assert_ne!(cache_key(&request), cache_key(&other_job));
        assert_ne!(cache_key(&request), cache_key(&other_version));
    }

    #[test]
    fn test_explicit_version_ignores_profile_content() {
        let request = senior_backend_request();
        let mut edited = request.clone();
        edited.candidate.summary = Some("Edited summary".into());
        assert_eq!(cache_key(&request), cache_key(&edited));
    }

    #[test]
    fn test_fingerprint_tracks_profile_content_without_version() {
        let mut request = senior_backend_request();
        request.candidate.profile_version = None;
        let mut edited = request.clone();
        edited.candidate.summary = Some("Edited summary".into());

        assert_eq!(cache_key(&request), cache_key(&request.clone()));
        assert_ne!(cache_key(&request), cache_key(&edited));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let cache = InMemoryAnalysisCache::new();
        let analysis = build_analysis(validate(&uniform_output(7).to_string()).unwrap());

        assert!(cache.get("k").await.is_none());
        cache.put("k", &analysis).await;
        assert_eq!(cache.get("k").await, Some(analysis));
        assert_eq!(cache.len().await, 1);
    }

    #[test]
    fn test_analysis_json_round_trip_for_cache_values() {
        let analysis = build_analysis(validate(&uniform_output(9).to_string()).unwrap());
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("\"overallScore\":90"));
        assert!(json.contains("\"recommendation\":\"Strong Match\""));
        let decoded: CompatibilityAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, analysis);
    }

    /// Accepts TCP connections and never writes a byte back.
    async fn silent_redis() -> redis::Client {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        redis::Client::open(format!("redis://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn test_silent_redis_reads_as_miss_within_bound() {
        let cache = RedisAnalysisCache::new(silent_redis().await, Duration::from_secs(60))
            .with_op_timeout(Duration::from_millis(100));
        let analysis = build_analysis(validate(&uniform_output(7).to_string()).unwrap());

        let outcome = tokio::time::timeout(Duration::from_secs(3), async {
            let hit = cache.get("k").await;
            cache.put("k", &analysis).await;
            hit
        })
        .await;
        assert_eq!(outcome, Ok(None));
    }

    #[tokio::test]
    async fn test_silent_redis_does_not_block_analysis() {
        use std::sync::Arc;

        use crate::compatibility::cascade::{Cascade, CompatibilityEngine};
        use crate::compatibility::test_support::{Reply, ScriptedInvoker};
        use crate::llm_client::ModelTier;

        let cache = RedisAnalysisCache::new(silent_redis().await, Duration::from_secs(60))
            .with_op_timeout(Duration::from_millis(100));
        let invoker = Arc::new(
            ScriptedInvoker::new().script("cheap", vec![Reply::Text(uniform_output(8).to_string())]),
        );
        let tier = ModelTier::new("cheap")
            .with_max_retries(1)
            .with_timeout_ms(1_000);
        let engine = CompatibilityEngine::new(Cascade::single(tier).unwrap(), invoker.clone())
            .unwrap()
            .with_cache(Arc::new(cache));

        let analysis = tokio::time::timeout(
            Duration::from_secs(5),
            engine.analyze(&senior_backend_request()),
        )
        .await
        .expect("analysis blocked on the cache")
        .unwrap();
        assert_eq!(analysis.overall_score(), 80);
        assert_eq!(invoker.calls("cheap"), 1);
    }

    #[tokio::test]
    async fn test_unreachable_redis_reads_as_miss() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let cache = RedisAnalysisCache::new(client, Duration::from_secs(60));
        assert!(cache.get("anything").await.is_none());
        let analysis = build_analysis(validate(&uniform_output(7).to_string()).unwrap());
        cache.put("anything", &analysis).await;
    }
}
