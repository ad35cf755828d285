use serde::{Deserialize, Serialize};

use crate::errors::MatchError;

/// Verdict of one content-matching call.
///
/// Produced fresh per evaluation and never shared. An `error` with
/// `matched == false` signals a failure the host should surface; no error
/// with `matched == false` is a normal non-match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Whether the content satisfied the query
    pub matched: bool,
    /// Similarity score, when the verdict came from the fuzzy engine
    pub score: Option<f64>,
    /// Byte offsets of the matches, when the query mode yields positions
    pub positions: Option<Vec<usize>>,
    /// Set when compilation or evaluation failed
    pub error: Option<MatchError>,
}

impl MatchOutcome {
    /// A plain positive verdict with no positions
    pub fn matched() -> Self {
        Self {
            matched: true,
            score: None,
            positions: None,
            error: None,
        }
    }

    /// A plain negative verdict
    pub fn not_matched() -> Self {
        Self {
            matched: false,
            score: None,
            positions: None,
            error: None,
        }
    }

    /// A failed evaluation; always reports `matched = false`
    pub fn from_error(error: MatchError) -> Self {
        Self {
            matched: false,
            score: None,
            positions: None,
            error: Some(error),
        }
    }

    pub fn with_positions(mut self, positions: Vec<usize>) -> Self {
        self.positions = Some(positions);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// Result of one approximate-matching pass over a content string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyOutcome {
    /// Whether any candidate word cleared the acceptance threshold
    pub is_match: bool,
    /// Best similarity ratio observed, 1.0 for an exact match
    pub score: f64,
}

impl FuzzyOutcome {
    pub fn miss() -> Self {
        Self {
            is_match: false,
            score: 0.0,
        }
    }
}
