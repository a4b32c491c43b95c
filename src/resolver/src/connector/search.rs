//! Search-backed data connector with an optional results cache
//!
//! Searches are described by three collaborators:
//!
//! 1. An [`ExecutableSearchBuilder`] turns the request and dependency values
//!    into an [`ExecutableSearch`]
//! 2. The search runs against the external source (directory, database, ...)
//! 3. A [`MappingStrategy`] turns the raw rows into attributes
//!
//! Mapped results can be cached across requests, keyed by a BLAKE3 hash of
//! the search's result cache key.

use super::ConnectorStrategy;
use crate::context::{AttributeResolutionContext, ConnectorOutput};
use crate::dependency::DependencyValues;
use crate::error::{BoxError, ResolutionError, Result};
use blake3::Hasher;
use dashmap::DashMap;
use idp_core::{AttributeValue, IdPAttribute};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// One raw result entry: source column/attribute name → values
pub type SearchRow = BTreeMap<String, Vec<AttributeValue>>;

/// Raw rows returned by a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    rows: Vec<SearchRow>,
}

impl SearchResult {
    pub fn new(rows: Vec<SearchRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SearchRow] {
        &self.rows
    }

    pub fn push_row(&mut self, row: SearchRow) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A search ready to run against the external source
pub trait ExecutableSearch: Send + Sync {
    /// Key identifying the result of this search for caching
    fn result_cache_key(&self) -> String;

    /// Run the search
    fn execute(&self) -> std::result::Result<SearchResult, BoxError>;
}

/// Builds a search from the request and dependency values
pub trait ExecutableSearchBuilder: Send + Sync {
    fn build(
        &self,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> std::result::Result<Box<dyn ExecutableSearch>, BoxError>;
}

/// Turns raw search rows into attributes
pub trait MappingStrategy: Send + Sync {
    fn map(&self, results: &SearchResult) -> std::result::Result<Option<ConnectorOutput>, BoxError>;
}

/// Maps each source name to an attribute of the same (or renamed) id,
/// merging values across rows
#[derive(Debug, Clone, Default)]
pub struct DefaultMappingStrategy {
    renames: BTreeMap<String, String>,
    multiple_results_is_error: bool,
}

impl DefaultMappingStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish source name `from` as attribute `to`
    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    /// Treat more than one row as an error
    pub fn with_multiple_results_is_error(mut self, multiple_results_is_error: bool) -> Self {
        self.multiple_results_is_error = multiple_results_is_error;
        self
    }
}

impl MappingStrategy for DefaultMappingStrategy {
    fn map(&self, results: &SearchResult) -> std::result::Result<Option<ConnectorOutput>, BoxError> {
        if self.multiple_results_is_error && results.rows().len() > 1 {
            return Err(format!("search returned {} rows, expected one", results.rows().len()).into());
        }

        let mut output = ConnectorOutput::new();
        for row in results.rows() {
            for (name, values) in row {
                let id = self.renames.get(name).unwrap_or(name);
                let attribute = output
                    .entry(id.clone())
                    .or_insert_with(|| IdPAttribute::new(id.clone()));
                for value in values {
                    attribute.add_value(value.clone());
                }
            }
        }

        if output.is_empty() {
            return Ok(None);
        }
        Ok(Some(output))
    }
}

/// Results cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub capacity: usize,

    /// Time-to-live for cached results
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: Duration::from_secs(60),
        }
    }
}

/// Cache key type (BLAKE3 hash)
type CacheKey = [u8; 32];

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    output: ConnectorOutput,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(output: ConnectorOutput) -> Self {
        Self {
            output,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Cross-request cache of mapped search results
///
/// Thread-safe (DashMap), TTL-based expiration, bounded capacity.
pub struct ResultsCache {
    entries: DashMap<CacheKey, CachedEntry>,
    config: CacheConfig,
    stats: DashMap<&'static str, usize>,
}

impl ResultsCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: DashMap::new(),
        }
    }

    /// Get a cached result
    pub fn get(&self, result_cache_key: &str) -> Option<ConnectorOutput> {
        let key = Self::compute_key(result_cache_key);

        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired(self.config.ttl) {
                drop(entry);
                self.entries.remove(&key);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                return None;
            }

            self.increment_stat("hits");
            return Some(entry.output.clone());
        }

        self.increment_stat("misses");
        None
    }

    /// Store a result
    pub fn put(&self, result_cache_key: &str, output: ConnectorOutput) {
        if self.config.capacity == 0 {
            return;
        }
        let key = Self::compute_key(result_cache_key);

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.capacity {
            self.evict();
        }

        self.entries.insert(key, CachedEntry::new(output));
    }

    /// Clear all entries and statistics
    pub fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.entries.len(),
            max_entries: self.config.capacity,
        }
    }

    fn compute_key(result_cache_key: &str) -> CacheKey {
        let mut hasher = Hasher::new();
        hasher.update(result_cache_key.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Drop expired entries; if still full, drop about 10% of the rest
    fn evict(&self) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, entry| !entry.is_expired(ttl));

        if self.entries.len() < self.config.capacity {
            return;
        }

        let to_remove = (self.config.capacity / 10).max(1);
        let mut removed = 0;
        self.entries.retain(|_, _| {
            if removed < to_remove {
                removed += 1;
                false
            } else {
                true
            }
        });
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Connector running an external search per request
pub struct SearchDataConnector {
    builder: Box<dyn ExecutableSearchBuilder>,
    mapping: Box<dyn MappingStrategy>,
    cache: Option<Arc<ResultsCache>>,
    no_result_is_error: bool,
}

impl SearchDataConnector {
    pub fn new<B, M>(builder: B, mapping: M) -> Self
    where
        B: ExecutableSearchBuilder + 'static,
        M: MappingStrategy + 'static,
    {
        Self {
            builder: Box::new(builder),
            mapping: Box::new(mapping),
            cache: None,
            no_result_is_error: false,
        }
    }

    /// Cache mapped results across requests
    pub fn with_results_cache(mut self, config: CacheConfig) -> Self {
        self.cache = Some(Arc::new(ResultsCache::new(config)));
        self
    }

    /// Fail when a search returns no rows
    pub fn with_no_result_is_error(mut self, no_result_is_error: bool) -> Self {
        self.no_result_is_error = no_result_is_error;
        self
    }

    /// Shared handle to the results cache, if enabled
    pub fn results_cache(&self) -> Option<Arc<ResultsCache>> {
        self.cache.clone()
    }
}

impl ConnectorStrategy for SearchDataConnector {
    fn fetch(
        &self,
        id: &str,
        context: &AttributeResolutionContext,
        dependencies: &DependencyValues,
    ) -> Result<Option<ConnectorOutput>> {
        let search = self
            .builder
            .build(context, dependencies)
            .map_err(|e| ResolutionError::search(id, format!("unable to build search: {}", e)))?;
        let cache_key = search.result_cache_key();

        if let Some(cache) = &self.cache {
            if let Some(output) = cache.get(&cache_key) {
                debug!("Data connector '{}': results cache hit", id);
                return Ok(Some(output));
            }
        }

        let results = search
            .execute()
            .map_err(|e| ResolutionError::search(id, e.to_string()))?;

        if results.is_empty() {
            if self.no_result_is_error {
                return Err(ResolutionError::NoResult {
                    plugin_id: id.to_string(),
                });
            }
            debug!("Data connector '{}': search returned no results", id);
            return Ok(None);
        }

        let output = self
            .mapping
            .map(&results)
            .map_err(|e| ResolutionError::search(id, format!("unable to map results: {}", e)))?;

        if let (Some(cache), Some(output)) = (&self.cache, &output) {
            cache.put(&cache_key, output.clone());
        }

        Ok(output)
    }

    fn teardown(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSearch {
        key: String,
        result: SearchResult,
        executions: Arc<AtomicUsize>,
    }

    impl ExecutableSearch for FixedSearch {
        fn result_cache_key(&self) -> String {
            self.key.clone()
        }

        fn execute(&self) -> std::result::Result<SearchResult, BoxError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    /// Returns one row per principal, keyed by principal
    struct PrincipalSearchBuilder {
        rows: usize,
        executions: Arc<AtomicUsize>,
    }

    impl ExecutableSearchBuilder for PrincipalSearchBuilder {
        fn build(
            &self,
            context: &AttributeResolutionContext,
            _dependencies: &DependencyValues,
        ) -> std::result::Result<Box<dyn ExecutableSearch>, BoxError> {
            let principal = context.principal().ok_or("no principal")?.to_string();
            let row: SearchRow = [(
                "mail".to_string(),
                vec![AttributeValue::string(format!("{}@example.org", principal))],
            )]
            .into_iter()
            .collect();
            Ok(Box::new(FixedSearch {
                key: principal,
                result: SearchResult::new(vec![row; self.rows]),
                executions: Arc::clone(&self.executions),
            }))
        }
    }

    fn connector(rows: usize) -> (SearchDataConnector, Arc<AtomicUsize>) {
        let executions = Arc::new(AtomicUsize::new(0));
        let strategy = SearchDataConnector::new(
            PrincipalSearchBuilder {
                rows,
                executions: Arc::clone(&executions),
            },
            DefaultMappingStrategy::new().with_rename("mail", "email"),
        );
        (strategy, executions)
    }

    #[test]
    fn test_search_and_map() {
        let (strategy, _) = connector(1);
        let ctx = AttributeResolutionContext::for_principal("jdoe");
        let output = strategy
            .fetch("db", &ctx, &DependencyValues::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            output["email"].values(),
            &[AttributeValue::string("jdoe@example.org")]
        );
    }

    #[test]
    fn test_build_failure_is_search_error() {
        let (strategy, _) = connector(1);
        let result = strategy.fetch("db", &AttributeResolutionContext::new(), &DependencyValues::default());
        assert!(matches!(result, Err(ResolutionError::Search { .. })));
    }

    #[test]
    fn test_no_result() {
        let (strategy, _) = connector(0);
        let ctx = AttributeResolutionContext::for_principal("jdoe");
        assert!(strategy
            .fetch("db", &ctx, &DependencyValues::default())
            .unwrap()
            .is_none());

        let (strategy, _) = connector(0);
        let strategy = strategy.with_no_result_is_error(true);
        assert!(matches!(
            strategy.fetch("db", &ctx, &DependencyValues::default()),
            Err(ResolutionError::NoResult { .. })
        ));
    }

    #[test]
    fn test_results_cache() {
        let (strategy, executions) = connector(1);
        let strategy = strategy.with_results_cache(CacheConfig::default());
        let cache = strategy.results_cache().unwrap();

        let jdoe = AttributeResolutionContext::for_principal("jdoe");
        let asmith = AttributeResolutionContext::for_principal("asmith");
        let deps = DependencyValues::default();

        strategy.fetch("db", &jdoe, &deps).unwrap();
        strategy.fetch("db", &jdoe, &deps).unwrap();
        strategy.fetch("db", &asmith, &deps).unwrap();

        assert_eq!(executions.load(Ordering::SeqCst), 2);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        assert!(stats.hit_rate() > 0.3);

        strategy.teardown();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cache_expiry_and_capacity() {
        let cache = ResultsCache::new(CacheConfig {
            capacity: 2,
            ttl: Duration::from_millis(0),
        });
        let output: ConnectorOutput = [("a".to_string(), IdPAttribute::new("a").with_values(["1"]))]
            .into_iter()
            .collect();

        cache.put("k1", output.clone());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
        assert_eq!(cache.stats().expirations, 1);

        let cache = ResultsCache::new(CacheConfig {
            capacity: 2,
            ttl: Duration::from_secs(60),
        });
        cache.put("k1", output.clone());
        cache.put("k2", output.clone());
        cache.put("k3", output);
        assert!(cache.stats().entries <= 2);
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn test_multiple_results_is_error() {
        let mapping = DefaultMappingStrategy::new().with_multiple_results_is_error(true);
        let row: SearchRow = [("uid".to_string(), vec![AttributeValue::string("a")])]
            .into_iter()
            .collect();
        assert!(mapping.map(&SearchResult::new(vec![row.clone()])).is_ok());
        assert!(mapping.map(&SearchResult::new(vec![row.clone(), row])).is_err());
    }
}
