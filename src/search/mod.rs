//! The matching pipeline.
//!
//! A call flows top-down: [`ContentMatcher`] dispatches on the query mode,
//! boolean queries recurse through [`BooleanExpressionEvaluator`], which
//! consults [`NearOperatorEvaluator`] and [`ApproximateMatcher`] for NEAR
//! calls and literal fallbacks, and those lean on
//! [`WordBoundaryService`] and the shared cache manager.
//!
//! The engine performs no I/O and spawns no threads; it is called
//! synchronously per content item and is safe to drive from multiple
//! evaluation threads because all shared state lives in the concurrent
//! caches.

pub mod boundary;
pub mod expr;
pub mod fuzzy;
pub mod matcher;
pub mod near;
mod pattern;

pub use boundary::{WordBoundaryLookup, WordBoundaryService};
pub use expr::{BinaryOp, BooleanExpressionEvaluator, BooleanNode, QueryParser};
pub use fuzzy::{ApproximateMatcher, ApproximateMatching};
pub use matcher::{CompiledMatcher, ContentMatcher};
pub use near::{NearOperatorEvaluator, ProximityEvaluation};
