use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cache::{content_key, CacheManager, CacheStatsReport};
use crate::config::{EngineConfig, MatchOptions};
use crate::results::FuzzyOutcome;

/// Approximate matching against a content string. Injected into the
/// boolean evaluator and the proximity evaluator so tests can substitute.
pub trait ApproximateMatching: Send + Sync {
    /// Scores `term` against the candidate words of `content`
    fn search(&self, content: &str, term: &str, options: &MatchOptions) -> FuzzyOutcome;

    /// Word start offsets of the candidates that clear the threshold
    fn find_positions(&self, content: &str, term: &str, options: &MatchOptions) -> Vec<usize>;
}

/// Yields each whitespace-delimited word with its byte offset in `content`.
pub(crate) fn word_offsets(content: &str) -> impl Iterator<Item = (usize, &str)> + '_ {
    content.split_whitespace().map(move |word| {
        let offset = word.as_ptr() as usize - content.as_ptr() as usize;
        (offset, word)
    })
}

/// Ratio of positions where the two strings agree, over the longer length.
/// Equal strings score 1.0.
fn positional_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let agreeing = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    agreeing as f64 / longest as f64
}

/// The fuzzy engine: scores a query term against the candidate words of a
/// content string and memoizes every layer of the work.
///
/// Whole-query results, case-normalized strings, and pairwise similarity
/// ratios are each cached separately, so repeated terms against the same
/// content reuse the verdict, and the same content probed with varying
/// terms reuses the normalized forms.
pub struct ApproximateMatcher {
    caches: Arc<CacheManager>,
    threshold: f64,
    min_term_len: usize,
}

impl ApproximateMatcher {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self::with_config(caches, &EngineConfig::default())
    }

    pub fn with_config(caches: Arc<CacheManager>, config: &EngineConfig) -> Self {
        Self {
            caches,
            threshold: config.fuzzy_threshold,
            min_term_len: config.min_fuzzy_term_len,
        }
    }

    /// Acceptance threshold for the similarity ratio
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn normalize(&self, s: &str, case_sensitive: bool) -> Arc<str> {
        if case_sensitive {
            return Arc::from(s);
        }
        self.caches
            .normalized()
            .get_or_compute(s.to_string(), || Arc::from(s.to_lowercase()))
    }

    fn pair_similarity(&self, term: &str, candidate: &str) -> f64 {
        self.caches.distance().get_or_compute(
            (term.to_string(), candidate.to_string()),
            || positional_similarity(term, candidate),
        )
    }

    fn scan(&self, content: &str, term: &str, options: &MatchOptions) -> FuzzyOutcome {
        let term_norm = self.normalize(term, options.case_sensitive);
        let mut best = 0.0_f64;
        for (_, word) in word_offsets(content) {
            if word.chars().count() < self.min_term_len {
                continue;
            }
            let word_norm = self.normalize(word, options.case_sensitive);
            let score = self.pair_similarity(&term_norm, &word_norm);
            if score > best {
                best = score;
            }
            if best >= 1.0 {
                break;
            }
        }
        trace!("fuzzy scan best score {:.3} for {:?}", best, term);
        FuzzyOutcome {
            is_match: best >= self.threshold,
            score: best,
        }
    }

    /// Same scoring as [`search`](Self::search), restricted to a
    /// caller-selected byte window of the content. A window that is out of
    /// bounds or splits a character never matches.
    pub fn search_window(
        &self,
        content: &str,
        window: Range<usize>,
        term: &str,
        options: &MatchOptions,
    ) -> FuzzyOutcome {
        match content.get(window.clone()) {
            Some(slice) => self.search(slice, term, options),
            None => {
                debug!("fuzzy window {:?} out of bounds, no match", window);
                FuzzyOutcome::miss()
            }
        }
    }

    /// Empties every named cache and zeroes all counters
    pub fn clear_caches(&self) {
        self.caches.clear_all();
    }

    /// Snapshot of every named cache's counters
    pub fn cache_stats(&self) -> CacheStatsReport {
        self.caches.stats()
    }
}

impl ApproximateMatching for ApproximateMatcher {
    fn search(&self, content: &str, term: &str, options: &MatchOptions) -> FuzzyOutcome {
        // Short tokens fuzzy-match almost anything; refuse them outright
        if term.chars().count() < self.min_term_len {
            return FuzzyOutcome::miss();
        }

        self.caches.frequent_terms().record(term);
        self.caches
            .frequent_content()
            .record(&format!("{:x}", content_key(content)));

        let term_norm = self.normalize(term, options.case_sensitive);
        let key = (
            content_key(content),
            term_norm.to_string(),
            options.cache_key(),
        );
        self.caches
            .results()
            .get_or_compute(key, || self.scan(content, term, options))
    }

    fn find_positions(&self, content: &str, term: &str, options: &MatchOptions) -> Vec<usize> {
        if term.chars().count() < self.min_term_len {
            return Vec::new();
        }
        let term_norm = self.normalize(term, options.case_sensitive);
        word_offsets(content)
            .filter(|(_, word)| {
                word.chars().count() >= self.min_term_len && {
                    let word_norm = self.normalize(word, options.case_sensitive);
                    self.pair_similarity(&term_norm, &word_norm) >= self.threshold
                }
            })
            .map(|(offset, _)| offset)
            .collect()
    }
}
