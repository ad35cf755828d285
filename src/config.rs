use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::MatchResult;

/// How a query term should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Literal substring or whole-word containment
    Term,
    /// The term is a regular expression
    Regex,
    /// The term is a boolean expression (AND/OR/NOT/NEAR)
    Boolean,
}

/// Per-call matching options. Immutable for the duration of one match call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Match case exactly instead of folding
    #[serde(default)]
    pub case_sensitive: bool,

    /// Accept a match only when not adjacent to a word character
    #[serde(default)]
    pub whole_word: bool,

    /// Allow approximate fallback for boolean literals
    #[serde(default = "default_true")]
    pub fuzzy_enabled: bool,

    /// Allow approximate fallback when locating NEAR operands
    #[serde(default = "default_true")]
    pub fuzzy_near_enabled: bool,

    /// Contents longer than this many bytes are rejected outright.
    /// `None` means unbounded.
    #[serde(default)]
    pub max_content_size: Option<usize>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            whole_word: false,
            fuzzy_enabled: true,
            fuzzy_near_enabled: true,
            max_content_size: None,
        }
    }
}

impl MatchOptions {
    /// Compact key fragment so cached results are partitioned by the
    /// options that affect them.
    pub(crate) fn cache_key(&self) -> String {
        format!(
            "c{}w{}f{}n{}",
            self.case_sensitive as u8,
            self.whole_word as u8,
            self.fuzzy_enabled as u8,
            self.fuzzy_near_enabled as u8
        )
    }
}

fn default_true() -> bool {
    true
}

fn default_fuzzy_threshold() -> f64 {
    0.6
}

fn default_min_fuzzy_term_len() -> usize {
    3
}

fn default_result_cache_size() -> usize {
    1000
}

fn default_normalized_cache_size() -> usize {
    2000
}

fn default_distance_cache_size() -> usize {
    5000
}

fn default_pattern_cache_size() -> usize {
    100
}

fn default_search_pattern_cache_size() -> usize {
    500
}

fn default_frequency_cache_size() -> usize {
    500
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Engine-wide tunables, loadable from layered YAML files.
///
/// Configuration is read from, in order of precedence:
/// 1. An explicit path passed to [`EngineConfig::load_from`]
/// 2. A local `.matchkit.yaml` in the current directory
/// 3. The global `$CONFIG_DIR/matchkit/config.yaml`
///
/// Every field has a default, so a missing file simply yields
/// `EngineConfig::default()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Similarity ratio a candidate word must reach to fuzzy-match
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Terms shorter than this never fuzzy-match
    #[serde(default = "default_min_fuzzy_term_len")]
    pub min_fuzzy_term_len: usize,

    /// Default content-size guard applied when the caller sets none
    #[serde(default)]
    pub max_content_size: Option<usize>,

    #[serde(default = "default_result_cache_size")]
    pub result_cache_size: usize,

    #[serde(default = "default_normalized_cache_size")]
    pub normalized_cache_size: usize,

    #[serde(default = "default_distance_cache_size")]
    pub distance_cache_size: usize,

    #[serde(default = "default_pattern_cache_size")]
    pub pattern_cache_size: usize,

    #[serde(default = "default_search_pattern_cache_size")]
    pub search_pattern_cache_size: usize,

    #[serde(default = "default_frequency_cache_size")]
    pub frequency_cache_size: usize,

    /// Log level hint for the host (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            min_fuzzy_term_len: default_min_fuzzy_term_len(),
            max_content_size: None,
            result_cache_size: default_result_cache_size(),
            normalized_cache_size: default_normalized_cache_size(),
            distance_cache_size: default_distance_cache_size(),
            pattern_cache_size: default_pattern_cache_size(),
            search_pattern_cache_size: default_search_pattern_cache_size(),
            frequency_cache_size: default_frequency_cache_size(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the default locations
    pub fn load() -> MatchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally adding an explicit file with the
    /// highest precedence
    pub fn load_from(config_path: Option<&Path>) -> MatchResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("matchkit/config.yaml")),
            // Local config
            Some(PathBuf::from(".matchkit.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            fuzzy_threshold: 0.75
            min_fuzzy_term_len: 4
            max_content_size: 1048576
            result_cache_size: 64
            log_level: "debug"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = EngineConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.fuzzy_threshold, 0.75);
        assert_eq!(config.min_fuzzy_term_len, 4);
        assert_eq!(config.max_content_size, Some(1048576));
        assert_eq!(config.result_cache_size, 64);
        assert_eq!(config.log_level, "debug");
        // Unspecified fields keep their defaults
        assert_eq!(config.distance_cache_size, 5000);
    }

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.fuzzy_threshold, 0.6);
        assert_eq!(config.min_fuzzy_term_len, 3);
        assert_eq!(config.max_content_size, None);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            fuzzy_threshold: "not a number"
            result_cache_size: []
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = EngineConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_options_defaults() {
        let options = MatchOptions::default();
        assert!(!options.case_sensitive);
        assert!(!options.whole_word);
        assert!(options.fuzzy_enabled);
        assert!(options.fuzzy_near_enabled);
        assert_eq!(options.max_content_size, None);
    }

    #[test]
    fn test_options_cache_key_partitions() {
        let a = MatchOptions::default();
        let b = MatchOptions {
            case_sensitive: true,
            ..MatchOptions::default()
        };
        assert_ne!(a.cache_key(), b.cache_key());
    }
}
