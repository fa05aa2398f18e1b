use crate::config::CacheConfig;
use crate::error::AppError;
use crate::models::RowSet;
use crate::services::cache::CacheLayer;
use crate::services::database::StoreGateway;
use crate::services::table_renderer::TableRenderer;
use std::time::Duration;

/// How the service treats the cache around a store query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Expiration applied to every write-back
    pub ttl: Duration,
    /// Fail the request when the write-back fails, instead of logging it
    pub strict_writes: bool,
    /// Fail the request on an undecodable cached payload, instead of
    /// treating it as a miss
    pub strict_payloads: bool,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl(),
            strict_writes: config.strict_writes,
            strict_payloads: config.strict_payloads,
        }
    }
}

impl Default for CachePolicy {
    /// 5 minute TTL, best-effort writes, corrupt payloads re-queried
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            strict_writes: false,
            strict_payloads: false,
        }
    }
}

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Store,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub row_set: RowSet,
    pub source: ResultSource,
}

/// Cache-or-compute query path
///
/// The raw query text is the cache key. On a hit the cached payload is
/// decoded and rendered; on a miss the store is queried, the result written
/// back with the policy's TTL, and rendered.
pub struct CachedQueryService {
    store: Box<dyn StoreGateway>,
    cache: Box<dyn CacheLayer>,
    policy: CachePolicy,
}

impl CachedQueryService {
    pub fn new(
        store: Box<dyn StoreGateway>,
        cache: Box<dyn CacheLayer>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    /// Resolve a query and render it as a table
    pub async fn execute(&self, query: &str) -> Result<String, AppError> {
        let outcome = self.resolve(query).await?;
        Ok(TableRenderer::render(&outcome.row_set))
    }

    /// Resolve a query to a row set, from the cache when possible
    pub async fn resolve(&self, query: &str) -> Result<QueryOutcome, AppError> {
        if let Some(row_set) = self.lookup(query).await? {
            return Ok(QueryOutcome {
                row_set,
                source: ResultSource::Cache,
            });
        }

        tracing::debug!("Cache miss for query: {}", query);
        let row_set = self.store.execute(query).await?;

        let payload = row_set.to_payload()?;
        self.write_back(query, &payload).await?;

        Ok(QueryOutcome {
            row_set,
            source: ResultSource::Store,
        })
    }

    /// Column names for a query, without executing it
    pub async fn columns(&self, query: &str) -> Result<Vec<String>, AppError> {
        self.store.columns(query).await
    }

    /// Probe the cache. `Ok(None)` means the store must be queried.
    async fn lookup(&self, query: &str) -> Result<Option<RowSet>, AppError> {
        let payload = match self.cache.get(query).await? {
            Some(payload) => payload,
            None => return Ok(None),
        };

        match RowSet::from_payload(&payload) {
            Ok(row_set) => {
                tracing::debug!("Cache hit for query: {} ({} rows)", query, row_set.len());
                Ok(Some(row_set))
            }
            Err(e) if self.policy.strict_payloads => Err(e),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cache entry for query {}: {}", query, e);
                Ok(None)
            }
        }
    }

    async fn write_back(&self, query: &str, payload: &str) -> Result<(), AppError> {
        match self.cache.set(query, payload, self.policy.ttl).await {
            Ok(()) => {
                tracing::debug!(
                    "Cached result for query: {} (ttl: {}s)",
                    query,
                    self.policy.ttl.as_secs()
                );
                Ok(())
            }
            Err(e) if self.policy.strict_writes => Err(e),
            Err(e) => {
                tracing::warn!("Returning uncached result for query {}: {}", query, e);
                Ok(())
            }
        }
    }

    /// Release the store and cache connections
    pub async fn close(&self) {
        self.store.close().await;
        self.cache.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use crate::services::cache::MemoryCache;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Store double returning a fixed row set and counting executions
    struct CountingGateway {
        row_set: RowSet,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl StoreGateway for CountingGateway {
        async fn execute(&self, _sql: &str) -> Result<RowSet, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.row_set.clone())
        }

        async fn columns(&self, _sql: &str) -> Result<Vec<String>, AppError> {
            Ok(self.row_set.columns.clone())
        }

        async fn ping(&self) -> Result<(), AppError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    struct FailingGateway;

    #[async_trait::async_trait]
    impl StoreGateway for FailingGateway {
        async fn execute(&self, _sql: &str) -> Result<RowSet, AppError> {
            Err(AppError::Query("syntax error at or near \"SELEC\"".to_string()))
        }

        async fn columns(&self, _sql: &str) -> Result<Vec<String>, AppError> {
            Err(AppError::Query("syntax error".to_string()))
        }

        async fn ping(&self) -> Result<(), AppError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    /// Cache double whose reads or writes fail as if the server were down
    struct BrokenCache {
        fail_reads: bool,
        fail_writes: bool,
        stored: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CacheLayer for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
            if self.fail_reads {
                Err(AppError::Cache("Connection refused".to_string()))
            } else {
                Ok(None)
            }
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), AppError> {
            if self.fail_writes {
                Err(AppError::Cache("READONLY You can't write against a read only replica".to_string()))
            } else {
                self.stored.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        async fn close(&self) {}
    }

    fn single_x_row_set() -> RowSet {
        let row: Record = json!({"x": 1}).as_object().cloned().unwrap();
        RowSet::new(vec!["x".to_string()], vec![row])
    }

    fn counting_service(
        row_set: RowSet,
        cache: Box<dyn CacheLayer>,
        policy: CachePolicy,
    ) -> (CachedQueryService, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let gateway = CountingGateway {
            row_set,
            calls: calls.clone(),
        };
        (
            CachedQueryService::new(Box::new(gateway), cache, policy),
            calls,
        )
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let (service, calls) = counting_service(
            single_x_row_set(),
            Box::new(MemoryCache::default()),
            CachePolicy::default(),
        );

        let first = service.execute("SELECT 1 AS x").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let lines: Vec<&str> = first.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].trim(), "x");
        assert_eq!(lines[2].trim(), "1");

        let second = service.execute("SELECT 1 AS x").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resolve_reports_source() {
        let (service, _calls) = counting_service(
            single_x_row_set(),
            Box::new(MemoryCache::default()),
            CachePolicy::default(),
        );

        let first = service.resolve("SELECT 1 AS x").await.unwrap();
        assert_eq!(first.source, ResultSource::Store);

        let second = service.resolve("SELECT 1 AS x").await.unwrap();
        assert_eq!(second.source, ResultSource::Cache);
        assert_eq!(second.row_set, first.row_set);
    }

    #[tokio::test]
    async fn test_expired_entry_requeries_store() {
        let policy = CachePolicy {
            ttl: Duration::from_millis(100),
            ..CachePolicy::default()
        };
        let (service, calls) =
            counting_service(single_x_row_set(), Box::new(MemoryCache::default()), policy);

        service.execute("SELECT 1 AS x").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        service.execute("SELECT 1 AS x").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_query_text_is_a_distinct_entry() {
        let (service, calls) = counting_service(
            single_x_row_set(),
            Box::new(MemoryCache::default()),
            CachePolicy::default(),
        );

        service.execute("SELECT 1 AS x").await.unwrap();
        service.execute("select 1 as x").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_result_renders_marker() {
        let (service, _calls) = counting_service(
            RowSet::new(vec!["id".to_string()], vec![]),
            Box::new(MemoryCache::default()),
            CachePolicy::default(),
        );

        let table = service.execute("SELECT id FROM users WHERE false").await.unwrap();
        assert_eq!(table, "No results");

        // Served from cache the second time, still the marker
        let table = service.execute("SELECT id FROM users WHERE false").await.unwrap();
        assert_eq!(table, "No results");
    }

    #[tokio::test]
    async fn test_unreachable_cache_skips_store() {
        let cache = BrokenCache {
            fail_reads: true,
            fail_writes: false,
            stored: Arc::new(AtomicUsize::new(0)),
        };
        let (service, calls) =
            counting_service(single_x_row_set(), Box::new(cache), CachePolicy::default());

        let err = service.execute("SELECT 1 AS x").await.unwrap_err();
        assert!(matches!(err, AppError::Cache(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_query_error_and_not_cached() {
        let stored = Arc::new(AtomicUsize::new(0));
        let cache = BrokenCache {
            fail_reads: false,
            fail_writes: false,
            stored: stored.clone(),
        };
        let service = CachedQueryService::new(
            Box::new(FailingGateway),
            Box::new(cache),
            CachePolicy::default(),
        );

        let err = service.execute("SELEC 1").await.unwrap_err();
        assert!(matches!(err, AppError::Query(_)));
        assert_eq!(stored.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_write_back_still_returns_result() {
        let cache = BrokenCache {
            fail_reads: false,
            fail_writes: true,
            stored: Arc::new(AtomicUsize::new(0)),
        };
        let (service, calls) =
            counting_service(single_x_row_set(), Box::new(cache), CachePolicy::default());

        let table = service.execute("SELECT 1 AS x").await.unwrap();
        assert_eq!(table.lines().count(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_write_back_with_strict_writes() {
        let cache = BrokenCache {
            fail_reads: false,
            fail_writes: true,
            stored: Arc::new(AtomicUsize::new(0)),
        };
        let policy = CachePolicy {
            strict_writes: true,
            ..CachePolicy::default()
        };
        let (service, _calls) = counting_service(single_x_row_set(), Box::new(cache), policy);

        let err = service.execute("SELECT 1 AS x").await.unwrap_err();
        assert!(matches!(err, AppError::Cache(_)));
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_treated_as_miss() {
        let cache = MemoryCache::default();
        cache
            .set("SELECT 1 AS x", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        let (service, calls) =
            counting_service(single_x_row_set(), Box::new(cache), CachePolicy::default());

        let first = service.resolve("SELECT 1 AS x").await.unwrap();
        assert_eq!(first.source, ResultSource::Store);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The entry was overwritten with a readable payload
        let second = service.resolve("SELECT 1 AS x").await.unwrap();
        assert_eq!(second.source, ResultSource::Cache);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_with_strict_payloads() {
        let cache = MemoryCache::default();
        cache
            .set("SELECT 1 AS x", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        let policy = CachePolicy {
            strict_payloads: true,
            ..CachePolicy::default()
        };
        let (service, calls) = counting_service(single_x_row_set(), Box::new(cache), policy);

        let err = service.execute("SELECT 1 AS x").await.unwrap_err();
        assert!(matches!(err, AppError::Render(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_legacy_array_payload_is_readable() {
        let cache = MemoryCache::default();
        cache
            .set("SELECT 1 AS x", r#"[{"x": 1}]"#, Duration::from_secs(60))
            .await
            .unwrap();
        let (service, calls) =
            counting_service(single_x_row_set(), Box::new(cache), CachePolicy::default());

        let table = service.execute("SELECT 1 AS x").await.unwrap();
        assert_eq!(table.lines().next().unwrap().trim(), "x");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_columns_come_from_store() {
        let (service, calls) = counting_service(
            single_x_row_set(),
            Box::new(MemoryCache::default()),
            CachePolicy::default(),
        );

        assert_eq!(service.columns("SELECT 1 AS x").await.unwrap(), vec!["x"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = CacheConfig {
            addr: "localhost:6379".to_string(),
            password: None,
            db: 0,
            ttl_secs: 60,
            strict_writes: true,
            strict_payloads: false,
        };
        let policy = CachePolicy::from_config(&config);
        assert_eq!(policy.ttl, Duration::from_secs(60));
        assert!(policy.strict_writes);
        assert!(!policy.strict_payloads);
    }
}
