use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{content_key, CacheManager};
use crate::config::{EngineConfig, MatchMode, MatchOptions};
use crate::errors::{MatchError, MatchResult};
use crate::results::MatchOutcome;
use crate::search::boundary::{find_occurrence_spans, WordBoundaryLookup, WordBoundaryService};
use crate::search::expr::{BooleanExpressionEvaluator, QueryParser};
use crate::search::fuzzy::ApproximateMatcher;
use crate::search::near::NearOperatorEvaluator;
use crate::search::pattern::{parse_regex_literal, regex_positions};

/// A compiled, reusable matcher for one query.
///
/// Compile once per query, then run against many contents; the closure is
/// `Send + Sync` so evaluation threads can share it.
#[derive(Clone)]
pub struct CompiledMatcher {
    func: Arc<dyn Fn(&str) -> bool + Send + Sync>,
}

impl CompiledMatcher {
    /// Wraps an arbitrary predicate. Hosts composing their own matchers
    /// should run them through [`ContentMatcher::run_matcher`] so a
    /// panicking closure cannot unwind out of the engine.
    pub fn from_fn(func: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    pub fn is_match(&self, content: &str) -> bool {
        (self.func)(content)
    }
}

impl fmt::Debug for CompiledMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledMatcher")
    }
}

/// Strips one layer of surrounding double quotes from a term.
fn strip_double_quotes(term: &str) -> &str {
    let bytes = term.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"' {
        &term[1..term.len() - 1]
    } else {
        term
    }
}

/// The public entry point of the engine: compiles query terms into
/// matchers, evaluates content directly, and locates match positions.
///
/// Holds the shared services and cache manager; construct one per process
/// or search session and reuse it across files.
pub struct ContentMatcher {
    caches: Arc<CacheManager>,
    fuzzy: Arc<ApproximateMatcher>,
    proximity: Arc<NearOperatorEvaluator>,
    boundaries: Arc<WordBoundaryService>,
    parser: Option<Arc<dyn QueryParser>>,
    config: EngineConfig,
}

impl ContentMatcher {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self::with_config(caches, &EngineConfig::default())
    }

    /// Builds the engine with loaded tunables. The fuzzy threshold,
    /// minimum fuzzy term length, and fallback content-size guard all
    /// come from `config`; [`new`](Self::new) uses the defaults.
    pub fn with_config(caches: Arc<CacheManager>, config: &EngineConfig) -> Self {
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
            parser: None,
            config: config.clone(),
        }
    }

    /// Plugs in the host's boolean-expression parser. Without one,
    /// boolean-mode queries are rejected as invalid expressions.
    pub fn with_parser(mut self, parser: Arc<dyn QueryParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn caches(&self) -> &Arc<CacheManager> {
        &self.caches
    }

    /// Compiles `term` into a reusable matcher. An empty term compiles to
    /// no matcher at all (`Ok(None)`): empty queries filter nothing.
    pub fn create_matcher(
        &self,
        term: &str,
        mode: MatchMode,
        options: &MatchOptions,
    ) -> MatchResult<Option<CompiledMatcher>> {
        if term.is_empty() {
            return Ok(None);
        }
        match mode {
            MatchMode::Term => Ok(Some(self.compile_term(term, options))),
            MatchMode::Regex => Ok(Some(self.compile_regex(term, options)?)),
            MatchMode::Boolean => Ok(Some(self.compile_boolean(term, options)?)),
        }
    }

    fn compile_term(&self, term: &str, options: &MatchOptions) -> CompiledMatcher {
        let needle = strip_double_quotes(term).to_string();
        if options.whole_word {
            let boundaries = self.boundaries.clone();
            let case_sensitive = options.case_sensitive;
            CompiledMatcher::from_fn(move |content| {
                boundaries.is_whole_word_match(content, &needle, case_sensitive)
            })
        } else if options.case_sensitive {
            CompiledMatcher::from_fn(move |content| content.contains(&needle))
        } else {
            let folded = needle.to_lowercase();
            CompiledMatcher::from_fn(move |content| content.to_lowercase().contains(&folded))
        }
    }

    fn compile_regex(&self, term: &str, options: &MatchOptions) -> MatchResult<CompiledMatcher> {
        let pattern = if options.case_sensitive {
            term.to_string()
        } else {
            format!("(?i){}", term)
        };
        let regex = self
            .caches
            .compile_pattern(&pattern)
            .map_err(|_| MatchError::invalid_pattern(term))?;
        Ok(CompiledMatcher::from_fn(move |content| regex.is_match(content)))
    }

    fn compile_boolean(&self, term: &str, options: &MatchOptions) -> MatchResult<CompiledMatcher> {
        let parser = self
            .parser
            .as_ref()
            .ok_or_else(|| MatchError::invalid_expression("no expression parser configured"))?;
        let ast = parser.parse(term).map_err(MatchError::invalid_expression)?;

        let evaluator = BooleanExpressionEvaluator::with_services(
            self.caches.clone(),
            self.fuzzy.clone(),
            self.proximity.clone(),
            self.boundaries.clone(),
            options.clone(),
            &self.config,
        );
        let boundaries = self.boundaries.clone();
        let case_sensitive = options.case_sensitive;
        Ok(CompiledMatcher::from_fn(move |content| {
            // Boolean queries carry state-dependent options; start each
            // evaluation from fresh boundary data and keep transient
            // contents out of the cache.
            boundaries.remove_from_cache(content);
            evaluator.evaluate(&ast, content, case_sensitive)
        }))
    }

    /// Evaluates one content string directly. Never fails: compilation
    /// and runtime problems come back inside the outcome.
    pub fn match_content(
        &self,
        content: &str,
        term: &str,
        mode: MatchMode,
        options: &MatchOptions,
    ) -> MatchOutcome {
        // An empty query matches everything
        if term.is_empty() {
            return MatchOutcome::matched();
        }

        // The per-call limit wins; the configured limit backstops callers
        // that set none
        if let Some(limit) = options.max_content_size.or(self.config.max_content_size) {
            if content.len() > limit {
                debug!(
                    "content of {} bytes exceeds limit of {} bytes, skipping",
                    content.len(),
                    limit
                );
                return MatchOutcome::from_error(MatchError::content_too_large(
                    content.len(),
                    limit,
                ));
            }
        }

        let matcher = match self.create_matcher(term, mode, options) {
            Ok(Some(matcher)) => matcher,
            Ok(None) => return MatchOutcome::matched(),
            Err(e) => return MatchOutcome::from_error(e),
        };

        let outcome = self.run_matcher(&matcher, content);
        if !outcome.matched {
            return outcome;
        }
        if mode == MatchMode::Term {
            let positions = self.find_match_positions(content, strip_double_quotes(term), options);
            outcome.with_positions(positions)
        } else {
            outcome
        }
    }

    /// Runs a compiled matcher against one content string at the engine's
    /// call boundary. A panic inside the matcher closure is caught and
    /// reported as a [`MatchError::MatcherRuntime`] outcome instead of
    /// unwinding into the host.
    pub fn run_matcher(&self, matcher: &CompiledMatcher, content: &str) -> MatchOutcome {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            matcher.is_match(content)
        }));
        match result {
            Ok(true) => MatchOutcome::matched(),
            Ok(false) => MatchOutcome::not_matched(),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "matcher panicked".to_string());
                warn!("matcher closure panicked: {}", msg);
                MatchOutcome::from_error(MatchError::matcher_runtime(msg))
            }
        }
    }

    /// Locates every match position of `term` in `content`, in strictly
    /// increasing byte offsets. The scan sub-mode follows the term's
    /// shape: an explicit `/pattern/flags` literal scans as a regex,
    /// otherwise whole-word or plain substring scanning applies.
    pub fn find_match_positions(
        &self,
        content: &str,
        term: &str,
        options: &MatchOptions,
    ) -> Vec<usize> {
        if term.is_empty() {
            return Vec::new();
        }

        let key = (content_key(content), term.to_string(), options.cache_key());
        let positions = self
            .caches
            .search_patterns()
            .get_or_compute(key, || Arc::new(self.scan_positions(content, term, options)));
        positions.as_ref().clone()
    }

    fn scan_positions(&self, content: &str, term: &str, options: &MatchOptions) -> Vec<usize> {
        if let Some(pattern) = parse_regex_literal(term, options.case_sensitive) {
            return match self.caches.compile_pattern(&pattern) {
                Ok(regex) => regex_positions(&regex, content),
                Err(e) => {
                    warn!("position scan skipped: {}", e);
                    Vec::new()
                }
            };
        }

        if options.whole_word {
            return self
                .boundaries
                .find_whole_word_positions(content, term, options.case_sensitive);
        }

        find_occurrence_spans(&self.caches, content, term, options.case_sensitive)
            .into_iter()
            .map(|(start, _)| start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::expr::{BinaryOp, BooleanNode};

    fn matcher() -> ContentMatcher {
        ContentMatcher::new(Arc::new(CacheManager::new()))
    }

    #[test]
    fn test_term_mode_substring() {
        let m = matcher();
        let outcome = m.match_content(
            "This is a test string",
            "test",
            MatchMode::Term,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);
        assert_eq!(outcome.positions, Some(vec![10]));
    }

    #[test]
    fn test_term_mode_case_sensitivity() {
        let m = matcher();
        let sensitive = MatchOptions {
            case_sensitive: true,
            ..MatchOptions::default()
        };
        assert!(
            !m.match_content("This is a Test string", "test", MatchMode::Term, &sensitive)
                .matched
        );
        assert!(
            m.match_content(
                "This is a Test string",
                "test",
                MatchMode::Term,
                &MatchOptions::default()
            )
            .matched
        );
    }

    #[test]
    fn test_term_mode_strips_quotes() {
        let m = matcher();
        let outcome = m.match_content(
            "This is a test string",
            "\"test\"",
            MatchMode::Term,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);
    }

    #[test]
    fn test_empty_term_matches_everything() {
        let m = matcher();
        for mode in [MatchMode::Term, MatchMode::Regex, MatchMode::Boolean] {
            let outcome = m.match_content("anything at all", "", mode, &MatchOptions::default());
            assert!(outcome.matched);
            assert!(outcome.error.is_none());
        }
        assert!(m
            .create_matcher("", MatchMode::Term, &MatchOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_content_size_guard() {
        let m = matcher();
        let options = MatchOptions {
            max_content_size: Some(8),
            ..MatchOptions::default()
        };
        let outcome = m.match_content("far too long for that", "long", MatchMode::Term, &options);
        assert!(!outcome.matched);
        assert!(matches!(
            outcome.error,
            Some(MatchError::ContentTooLarge { size: 21, limit: 8 })
        ));
    }

    #[test]
    fn test_whole_word_term() {
        let m = matcher();
        let options = MatchOptions {
            whole_word: true,
            ..MatchOptions::default()
        };
        assert!(
            m.match_content("a test here", "test", MatchMode::Term, &options)
                .matched
        );
        assert!(
            !m.match_content("attested here", "test", MatchMode::Term, &options)
                .matched
        );
    }

    #[test]
    fn test_whole_word_matched_agrees_with_positions() {
        let m = matcher();
        let options = MatchOptions {
            whole_word: true,
            ..MatchOptions::default()
        };
        // A term with a non-word character is still whole-word when its
        // flanks are clear, and the verdict and positions must agree
        let outcome = m.match_content("foo-bar baz", "foo-bar", MatchMode::Term, &options);
        assert!(outcome.matched);
        assert_eq!(outcome.positions, Some(vec![0]));

        let outcome = m.match_content("xfoo-bar baz", "foo-bar", MatchMode::Term, &options);
        assert!(!outcome.matched);
        assert!(m
            .find_match_positions("xfoo-bar baz", "foo-bar", &options)
            .is_empty());
    }

    #[test]
    fn test_regex_mode() {
        let m = matcher();
        let outcome = m.match_content(
            "Error: code 42",
            r"code \d+",
            MatchMode::Regex,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);

        let sensitive = MatchOptions {
            case_sensitive: true,
            ..MatchOptions::default()
        };
        let outcome = m.match_content("error: code 42", "ERROR", MatchMode::Regex, &sensitive);
        assert!(!outcome.matched);
        let outcome = m.match_content(
            "error: code 42",
            "ERROR",
            MatchMode::Regex,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);
    }

    #[test]
    fn test_invalid_regex_is_an_error_value() {
        let m = matcher();
        let result = m.create_matcher("[unclosed", MatchMode::Regex, &MatchOptions::default());
        let err = result.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid regular expression pattern: [unclosed"
        );

        let outcome = m.match_content(
            "content",
            "[unclosed",
            MatchMode::Regex,
            &MatchOptions::default(),
        );
        assert!(!outcome.matched);
        assert!(matches!(outcome.error, Some(MatchError::InvalidPattern(_))));
    }

    #[test]
    fn test_boolean_mode_requires_parser() {
        let m = matcher();
        let result = m.create_matcher("a AND b", MatchMode::Boolean, &MatchOptions::default());
        assert!(matches!(result, Err(MatchError::InvalidExpression(_))));
    }

    struct StubParser;

    impl QueryParser for StubParser {
        fn parse(&self, input: &str) -> Result<BooleanNode, String> {
            match input {
                "disk AND failure" => Ok(BooleanNode::Binary {
                    op: BinaryOp::And,
                    left: Box::new(BooleanNode::Literal("disk".to_string())),
                    right: Box::new(BooleanNode::Literal("failure".to_string())),
                }),
                other => Err(format!("unexpected token in {:?}", other)),
            }
        }
    }

    #[test]
    fn test_boolean_mode_with_parser() {
        let m = matcher().with_parser(Arc::new(StubParser));
        let outcome = m.match_content(
            "the disk failure was logged",
            "disk AND failure",
            MatchMode::Boolean,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);

        let result = m.create_matcher("%%%", MatchMode::Boolean, &MatchOptions::default());
        assert!(matches!(result, Err(MatchError::InvalidExpression(_))));
    }

    /// Turns any query string into a single literal node.
    struct PassthroughParser;

    impl QueryParser for PassthroughParser {
        fn parse(&self, input: &str) -> Result<BooleanNode, String> {
            Ok(BooleanNode::Literal(input.to_string()))
        }
    }

    #[test]
    fn test_config_threshold_reaches_fuzzy_engine() {
        // "failre" agrees with "failure" on 4 of 7 positions: under the
        // default 0.6 threshold but over a configured 0.5
        let lenient = EngineConfig {
            fuzzy_threshold: 0.5,
            ..EngineConfig::default()
        };
        let m = ContentMatcher::with_config(Arc::new(CacheManager::new()), &lenient)
            .with_parser(Arc::new(PassthroughParser));
        let outcome = m.match_content(
            "total failure",
            "failre",
            MatchMode::Boolean,
            &MatchOptions::default(),
        );
        assert!(outcome.matched);

        let strict = matcher().with_parser(Arc::new(PassthroughParser));
        let outcome = strict.match_content(
            "total failure",
            "failre",
            MatchMode::Boolean,
            &MatchOptions::default(),
        );
        assert!(!outcome.matched);
    }

    #[test]
    fn test_config_size_guard_backstops_options() {
        let config = EngineConfig {
            max_content_size: Some(8),
            ..EngineConfig::default()
        };
        let m = ContentMatcher::with_config(Arc::new(CacheManager::new()), &config);
        let outcome = m.match_content(
            "far too long for that",
            "long",
            MatchMode::Term,
            &MatchOptions::default(),
        );
        assert!(matches!(
            outcome.error,
            Some(MatchError::ContentTooLarge { size: 21, limit: 8 })
        ));

        // An explicit per-call limit takes precedence over the configured one
        let options = MatchOptions {
            max_content_size: Some(64),
            ..MatchOptions::default()
        };
        assert!(m
            .match_content("far too long for that", "long", MatchMode::Term, &options)
            .matched);
    }

    #[test]
    fn test_find_match_positions_substring() {
        let m = matcher();
        let content = "This is a test string with test word";
        let positions = m.find_match_positions(content, "test", &MatchOptions::default());
        assert_eq!(positions, vec![10, 27]);

        // Idempotent: the second call reads the cached positions
        let again = m.find_match_positions(content, "test", &MatchOptions::default());
        assert_eq!(again, positions);
        assert!(m.caches().stats().search_pattern_cache.hits >= 1);
    }

    #[test]
    fn test_find_match_positions_whole_word() {
        let m = matcher();
        let options = MatchOptions {
            whole_word: true,
            ..MatchOptions::default()
        };
        let positions = m.find_match_positions("test attest testing test", "test", &options);
        assert_eq!(positions, vec![0, 20]);
    }

    #[test]
    fn test_find_match_positions_regex_literal() {
        let m = matcher();
        let positions =
            m.find_match_positions("ab1 cd2 ef3", r"/[a-z]+\d/", &MatchOptions::default());
        assert_eq!(positions, vec![0, 4, 8]);
    }

    #[test]
    fn test_find_match_positions_zero_width() {
        let m = matcher();
        // A zero-width pattern must not loop forever
        let positions = m.find_match_positions("abc", "/x?/", &MatchOptions::default());
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_position_cache_keys_terms_with_separators() {
        // Pipes in a term stay inside the key's term component
        let m = matcher();
        let content = "a|b and a";
        let piped = m.find_match_positions(content, "a|b", &MatchOptions::default());
        assert_eq!(piped, vec![0]);
        let plain = m.find_match_positions(content, "a", &MatchOptions::default());
        assert_eq!(plain, vec![0, 4, 8]);
    }

    #[test]
    fn test_positions_strictly_increasing() {
        let m = matcher();
        let positions = m.find_match_positions("aaa aaa aaa", "aa", &MatchOptions::default());
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_panicking_matcher_is_contained() {
        let m = matcher();
        let bad = CompiledMatcher::from_fn(|_| panic!("boom"));
        let outcome = m.run_matcher(&bad, "content");
        assert!(!outcome.matched);
        assert!(matches!(
            outcome.error,
            Some(MatchError::MatcherRuntime(ref msg)) if msg == "boom"
        ));
    }

    #[test]
    fn test_compiled_matcher_is_reusable() {
        let m = matcher();
        let compiled = m
            .create_matcher("test", MatchMode::Term, &MatchOptions::default())
            .unwrap()
            .unwrap();
        assert!(compiled.is_match("a test"));
        assert!(!compiled.is_match("nothing here"));
        assert!(compiled.is_match("test again"));
    }
}
