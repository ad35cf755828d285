//! The boolean query AST and its evaluator.
//!
//! The expression parser lives in the host application; this module
//! consumes the tree it produces. Evaluation is a pure function of
//! (node, content, case sensitivity) apart from cache population, and a
//! top-level `evaluate` call always yields a definite verdict: any
//! internal failure is logged and reduced to `false` rather than
//! propagated.

use std::sync::Arc;

use tracing::warn;

use crate::cache::CacheManager;
use crate::config::{EngineConfig, MatchOptions};
use crate::errors::{MatchError, MatchResult};
use crate::search::boundary::{WordBoundaryLookup, WordBoundaryService};
use crate::search::fuzzy::{ApproximateMatcher, ApproximateMatching};
use crate::search::near::{NearOperatorEvaluator, ProximityEvaluation};
use crate::search::pattern::parse_regex_literal;

/// Binary boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

/// A node of the pre-parsed boolean query tree.
///
/// Produced by the host's expression parser and consumed read-only. The
/// tree is finite and acyclic by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum BooleanNode {
    /// A quoted or bare search term; may carry a `/pattern/flags` regex
    Literal(String),
    /// A numeric literal; only meaningful as a NEAR distance argument
    Number(f64),
    /// A literal truth value
    Bool(bool),
    /// AND/OR over two subtrees
    Binary {
        op: BinaryOp,
        left: Box<BooleanNode>,
        right: Box<BooleanNode>,
    },
    /// Logical negation
    Not(Box<BooleanNode>),
    /// A function-style call; only `NEAR(term, term, distance)` is
    /// recognized
    Call {
        name: String,
        args: Vec<BooleanNode>,
    },
    /// A sequence of sub-expressions. Every child is evaluated, in order,
    /// and the value of the last child is the value of the node.
    Compound(Vec<BooleanNode>),
}

/// The host-supplied front end that turns a boolean query string into a
/// [`BooleanNode`] tree.
pub trait QueryParser: Send + Sync {
    fn parse(&self, input: &str) -> Result<BooleanNode, String>;
}

/// Strips one layer of matching single or double quotes.
fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

/// Walks a boolean query tree and produces a verdict for one content
/// string.
pub struct BooleanExpressionEvaluator {
    caches: Arc<CacheManager>,
    fuzzy: Arc<dyn ApproximateMatching>,
    proximity: Arc<dyn ProximityEvaluation>,
    boundaries: Arc<dyn WordBoundaryLookup>,
    options: MatchOptions,
    min_fuzzy_term_len: usize,
}

impl BooleanExpressionEvaluator {
    /// Wires the evaluator to the default concrete services with default
    /// tunables, all sharing `caches`.
    pub fn new(caches: Arc<CacheManager>, options: MatchOptions) -> Self {
        Self::with_config(caches, options, &EngineConfig::default())
    }

    /// Like [`new`](Self::new), with the fuzzy threshold and minimum
    /// fuzzy term length taken from `config`.
    pub fn with_config(
        caches: Arc<CacheManager>,
        options: MatchOptions,
        config: &EngineConfig,
    ) -> Self {
        let fuzzy = Arc::new(ApproximateMatcher::with_config(caches.clone(), config));
        let boundaries = Arc::new(WordBoundaryService::new(caches.clone()));
        let proximity = Arc::new(NearOperatorEvaluator::new(
            caches.clone(),
            fuzzy.clone(),
            boundaries.clone(),
        ));
        Self {
            caches,
            fuzzy,
            proximity,
            boundaries,
            options,
            min_fuzzy_term_len: config.min_fuzzy_term_len,
        }
    }

    /// Full dependency injection, for hosts and tests that substitute one
    /// of the services. `config` should be the same tunables the injected
    /// fuzzy service was built with.
    pub fn with_services(
        caches: Arc<CacheManager>,
        fuzzy: Arc<dyn ApproximateMatching>,
        proximity: Arc<dyn ProximityEvaluation>,
        boundaries: Arc<dyn WordBoundaryLookup>,
        options: MatchOptions,
        config: &EngineConfig,
    ) -> Self {
        Self {
            caches,
            fuzzy,
            proximity,
            boundaries,
            options,
            min_fuzzy_term_len: config.min_fuzzy_term_len,
        }
    }

    /// Evaluates `node` against `content`. Never fails: an internal error
    /// is logged, the content's cached boundary data is evicted, and the
    /// verdict is `false`.
    pub fn evaluate(&self, node: &BooleanNode, content: &str, case_sensitive: bool) -> bool {
        match self.eval_node(node, content, case_sensitive) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("boolean evaluation failed, reporting no match: {}", e);
                self.boundaries.remove_from_cache(content);
                false
            }
        }
    }

    fn eval_node(
        &self,
        node: &BooleanNode,
        content: &str,
        case_sensitive: bool,
    ) -> MatchResult<bool> {
        match node {
            BooleanNode::Literal(text) => self.eval_literal(text, content, case_sensitive),
            BooleanNode::Bool(value) => Ok(*value),
            BooleanNode::Binary { op, left, right } => {
                // Both sides are always evaluated before combining. This
                // is a contract, not an optimization miss: cache
                // population on both branches must happen regardless of
                // the first operand's value.
                let l = self.eval_node(left, content, case_sensitive)?;
                let r = self.eval_node(right, content, case_sensitive)?;
                Ok(match op {
                    BinaryOp::And => l && r,
                    BinaryOp::Or => l || r,
                })
            }
            BooleanNode::Not(operand) => {
                Ok(!self.eval_node(operand, content, case_sensitive)?)
            }
            BooleanNode::Call { name, args } => {
                if name.eq_ignore_ascii_case("near") {
                    Ok(self.eval_near_call(args, content, case_sensitive))
                } else {
                    // Fail closed: an unrecognized operator is a non-match,
                    // never a crash or a false positive
                    let err = MatchError::unsupported_node(format!("call {:?}", name));
                    warn!("{} in boolean expression, treating as no match", err);
                    Ok(false)
                }
            }
            BooleanNode::Compound(body) => {
                // Last child wins; earlier children are still evaluated
                // for their cache side effects.
                let mut last = false;
                for child in body {
                    last = self.eval_node(child, content, case_sensitive)?;
                }
                Ok(last)
            }
            BooleanNode::Number(value) => {
                let err = MatchError::unsupported_node(format!("bare number {}", value));
                warn!("{} in boolean expression, treating as no match", err);
                Ok(false)
            }
        }
    }

    /// A malformed NEAR call (wrong arity, non-literal terms, non-numeric
    /// distance) evaluates to `false` rather than failing the whole query.
    fn eval_near_call(&self, args: &[BooleanNode], content: &str, case_sensitive: bool) -> bool {
        let (term1, term2, distance) = match (args.first(), args.get(1), args.get(2)) {
            (
                Some(BooleanNode::Literal(t1)),
                Some(BooleanNode::Literal(t2)),
                Some(distance_arg),
            ) => {
                let distance = match distance_arg {
                    BooleanNode::Number(n) if *n >= 0.0 => *n as usize,
                    BooleanNode::Literal(s) => match unquote(s).trim().parse::<usize>() {
                        Ok(n) => n,
                        Err(_) => {
                            warn!("NEAR distance {:?} is not numeric", s);
                            return false;
                        }
                    },
                    other => {
                        warn!("NEAR distance argument {:?} is not numeric", other);
                        return false;
                    }
                };
                (unquote(t1), unquote(t2), distance)
            }
            _ => {
                warn!("NEAR requires (term, term, distance) arguments");
                return false;
            }
        };

        let near_options = MatchOptions {
            case_sensitive,
            whole_word: self.options.whole_word,
            // NEAR's fuzzy fallback has its own switch
            fuzzy_enabled: self.options.fuzzy_near_enabled,
            ..self.options.clone()
        };
        self.proximity
            .evaluate_near(content, term1, term2, distance, &near_options)
    }

    fn eval_literal(
        &self,
        text: &str,
        content: &str,
        case_sensitive: bool,
    ) -> MatchResult<bool> {
        let term = unquote(text);
        if term.is_empty() {
            return Ok(false);
        }

        // An explicit /pattern/flags literal is a regex test
        if let Some(pattern) = parse_regex_literal(term, case_sensitive) {
            return Ok(match self.caches.compile_pattern(&pattern) {
                Ok(re) => re.is_match(content),
                Err(e) => {
                    warn!("invalid regex literal in boolean expression: {}", e);
                    false
                }
            });
        }

        let exact = if self.options.whole_word {
            self.boundaries
                .is_whole_word_match(content, term, case_sensitive)
        } else if case_sensitive {
            content.contains(term)
        } else {
            content.to_lowercase().contains(&term.to_lowercase())
        };
        if exact {
            return Ok(true);
        }

        if self.options.fuzzy_enabled && term.chars().count() >= self.min_fuzzy_term_len {
            let fuzzy_options = MatchOptions {
                case_sensitive,
                ..self.options.clone()
            };
            return Ok(self.fuzzy.search(content, term, &fuzzy_options).is_match);
        }
        Ok(false)
    }
}
