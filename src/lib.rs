//! matchkit decides whether a unit of text content satisfies a user
//! query: a literal term, a regular expression, or a boolean expression
//! combining terms with AND/OR/NOT and a NEAR proximity operator. Exact,
//! case-(in)sensitive, whole-word, and approximate matching are all
//! supported, and a multi-layer cache subsystem keeps repeated evaluation
//! fast across thousands of contents and re-edited queries.

pub mod cache;
pub mod config;
pub mod errors;
pub mod results;
pub mod search;

pub use cache::{CacheManager, CacheStats, CacheStatsReport};
pub use config::{EngineConfig, MatchMode, MatchOptions};
pub use errors::{MatchError, MatchResult};
pub use results::{FuzzyOutcome, MatchOutcome};
pub use search::{
    ApproximateMatcher, ApproximateMatching, BinaryOp, BooleanExpressionEvaluator, BooleanNode,
    CompiledMatcher, ContentMatcher, NearOperatorEvaluator, ProximityEvaluation, QueryParser,
    WordBoundaryLookup, WordBoundaryService,
};
