//! The multi-layer cache subsystem shared by the matching components.
//!
//! All cache storage is owned by a single [`CacheManager`]; the fuzzy
//! engine, the boolean evaluator, and the proximity evaluator hold a
//! reference and go through `get_or_compute` rather than touching entries
//! directly. Entries are evicted by bounded size (least recently used
//! first) or by an explicit clear, never by TTL, and nothing is persisted
//! across process restarts.

mod store;

pub use store::{BoundedCache, CacheStats, FrequencyCache};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::{MatchError, MatchResult};
use crate::results::FuzzyOutcome;

/// Stable key for a content string, so large contents are not copied into
/// cache keys.
pub(crate) fn content_key(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Snapshot of every named cache's counters, suitable for host diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsReport {
    pub result_cache: CacheStats,
    pub normalized_string_cache: CacheStats,
    /// The distance cache; named after the comparison it memoizes
    pub levenshtein_cache: CacheStats,
    /// The compiled-pattern cache
    pub regex_cache: CacheStats,
    pub search_pattern_cache: CacheStats,
    pub frequent_terms_cache_size: usize,
    pub frequent_content_cache_size: usize,
}

/// Owns the named caches used across the engine.
///
/// Construct one per process or per search session and share it via `Arc`;
/// there is intentionally no hidden global instance.
pub struct CacheManager {
    results: BoundedCache<(u64, String, String), FuzzyOutcome>,
    normalized: BoundedCache<String, Arc<str>>,
    distance: BoundedCache<(String, String), f64>,
    patterns: BoundedCache<String, Arc<Regex>>,
    search_patterns: BoundedCache<(u64, String, String), Arc<Vec<usize>>>,
    frequent_terms: FrequencyCache,
    frequent_content: FrequencyCache,
}

impl CacheManager {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            results: BoundedCache::new("results", config.result_cache_size),
            normalized: BoundedCache::new("normalized", config.normalized_cache_size),
            distance: BoundedCache::new("distance", config.distance_cache_size),
            patterns: BoundedCache::new("patterns", config.pattern_cache_size),
            search_patterns: BoundedCache::new(
                "search_patterns",
                config.search_pattern_cache_size,
            ),
            frequent_terms: FrequencyCache::new(config.frequency_cache_size),
            frequent_content: FrequencyCache::new(config.frequency_cache_size),
        }
    }

    /// Whole-query fuzzy results, keyed by (content key, normalized term,
    /// options key). A structured key rather than a joined string, so no
    /// term can collide with another pair.
    pub fn results(&self) -> &BoundedCache<(u64, String, String), FuzzyOutcome> {
        &self.results
    }

    /// Case-normalized strings
    pub fn normalized(&self) -> &BoundedCache<String, Arc<str>> {
        &self.normalized
    }

    /// Pairwise similarity ratios
    pub fn distance(&self) -> &BoundedCache<(String, String), f64> {
        &self.distance
    }

    /// Position lists produced by `find_match_positions`, keyed like the
    /// result cache
    pub fn search_patterns(&self) -> &BoundedCache<(u64, String, String), Arc<Vec<usize>>> {
        &self.search_patterns
    }

    pub fn frequent_terms(&self) -> &FrequencyCache {
        &self.frequent_terms
    }

    pub fn frequent_content(&self) -> &FrequencyCache {
        &self.frequent_content
    }

    /// Compiles `pattern` through the compiled-pattern cache. Invalid
    /// patterns are reported as [`MatchError::InvalidPattern`] and never
    /// cached.
    pub fn compile_pattern(&self, pattern: &str) -> MatchResult<Arc<Regex>> {
        self.patterns.try_get_or_compute(pattern.to_string(), || {
            Regex::new(pattern)
                .map(Arc::new)
                .map_err(|_| MatchError::invalid_pattern(pattern))
        })
    }

    pub fn pattern_stats(&self) -> CacheStats {
        self.patterns.stats()
    }

    /// Empties every named cache and zeroes all hit/miss counters.
    pub fn clear_all(&self) {
        self.results.clear();
        self.normalized.clear();
        self.distance.clear();
        self.patterns.clear();
        self.search_patterns.clear();
        self.frequent_terms.clear();
        self.frequent_content.clear();
        debug!("all caches cleared");
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            result_cache: self.results.stats(),
            normalized_string_cache: self.normalized.stats(),
            levenshtein_cache: self.distance.stats(),
            regex_cache: self.patterns.stats(),
            search_pattern_cache: self.search_patterns.stats(),
            frequent_terms_cache_size: self.frequent_terms.len(),
            frequent_content_cache_size: self.frequent_content.len(),
        }
    }

    /// The stats report as a JSON string, for hosts that log diagnostics
    /// as structured text.
    pub fn stats_json(&self) -> String {
        serde_json::to_string(&self.stats()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}
