use std::sync::Arc;

use tracing::trace;

use crate::cache::CacheManager;
use crate::config::MatchOptions;
use crate::search::boundary::{find_occurrence_spans, WordBoundaryLookup};
use crate::search::fuzzy::ApproximateMatching;

/// Proximity checks between two terms. Injected into the boolean
/// evaluator so tests can substitute.
pub trait ProximityEvaluation: Send + Sync {
    fn evaluate_near(
        &self,
        content: &str,
        term1: &str,
        term2: &str,
        max_distance: usize,
        options: &MatchOptions,
    ) -> bool;
}

/// Evaluates the NEAR operator: whether two terms occur within a maximum
/// separation of each other, in the byte-offset units the rest of the
/// engine searches in.
pub struct NearOperatorEvaluator {
    caches: Arc<CacheManager>,
    fuzzy: Arc<dyn ApproximateMatching>,
    boundaries: Arc<dyn WordBoundaryLookup>,
}

impl NearOperatorEvaluator {
    pub fn new(
        caches: Arc<CacheManager>,
        fuzzy: Arc<dyn ApproximateMatching>,
        boundaries: Arc<dyn WordBoundaryLookup>,
    ) -> Self {
        Self {
            caches,
            fuzzy,
            boundaries,
        }
    }

    /// Occurrence positions of one NEAR operand. Exact containment (or
    /// whole-word scan) first; when that yields nothing and fuzzy is
    /// enabled, approximate occurrences stand in.
    fn term_positions(&self, content: &str, term: &str, options: &MatchOptions) -> Vec<usize> {
        let exact = if options.whole_word {
            self.boundaries
                .find_whole_word_positions(content, term, options.case_sensitive)
        } else {
            find_occurrence_spans(&self.caches, content, term, options.case_sensitive)
                .into_iter()
                .map(|(start, _)| start)
                .collect()
        };

        if !exact.is_empty() || !options.fuzzy_enabled {
            return exact;
        }

        let approximate = self.fuzzy.find_positions(content, term, options);
        trace!(
            "NEAR fuzzy fallback for {:?}: {} occurrence(s)",
            term,
            approximate.len()
        );
        approximate
    }
}

impl ProximityEvaluation for NearOperatorEvaluator {
    fn evaluate_near(
        &self,
        content: &str,
        term1: &str,
        term2: &str,
        max_distance: usize,
        options: &MatchOptions,
    ) -> bool {
        let first = self.term_positions(content, term1, options);
        if first.is_empty() {
            return false;
        }
        let second = self.term_positions(content, term2, options);
        if second.is_empty() {
            return false;
        }

        first.iter().any(|&p1| {
            second
                .iter()
                .any(|&p2| p1.abs_diff(p2) <= max_distance)
        })
    }
}
