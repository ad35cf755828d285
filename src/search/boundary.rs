use std::sync::Arc;

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::cache::{content_key, CacheManager};

/// Whole-word checks against a content string, backed by cached boundary
/// data. Injected into the boolean evaluator so tests can substitute.
pub trait WordBoundaryLookup: Send + Sync {
    fn is_whole_word_match(&self, content: &str, term: &str, case_sensitive: bool) -> bool;
    fn find_whole_word_positions(&self, content: &str, term: &str, case_sensitive: bool)
        -> Vec<usize>;
    fn remove_from_cache(&self, content: &str);
}

/// A word character in the `\w` sense: alphanumeric or underscore.
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the byte span `start..end` has a word character immediately
/// before or after it, judged against the word runs of the content.
/// `spans` must be sorted by start, as [`WordBoundaryService::word_spans`]
/// produces them.
fn span_is_flanked(spans: &[(usize, usize)], start: usize, end: usize) -> bool {
    // A run covering the byte just before `start` must begin before it
    // and extend at least up to it
    let before = spans.partition_point(|&(s, _)| s < start);
    if before > 0 && spans[before - 1].1 >= start {
        return true;
    }
    // A run covering the byte at `end` must begin at or before it and
    // extend past it
    let after = spans.partition_point(|&(s, _)| s <= end);
    after > 0 && spans[after - 1].1 > end
}

/// Locates every occurrence of `term` in `content` as `(start, end)` byte
/// spans. Case-insensitive scans go through the compiled-pattern cache so
/// repeated terms reuse the compiled form. Occurrences never overlap.
pub(crate) fn find_occurrence_spans(
    caches: &CacheManager,
    content: &str,
    term: &str,
    case_sensitive: bool,
) -> Vec<(usize, usize)> {
    if term.is_empty() {
        return Vec::new();
    }

    if case_sensitive {
        let mut spans = Vec::new();
        let mut from = 0;
        while let Some(idx) = content[from..].find(term) {
            let start = from + idx;
            spans.push((start, start + term.len()));
            // Advance at least one byte so zero-width matches cannot loop
            from = start + term.len().max(1);
        }
        return spans;
    }

    let pattern = format!("(?i){}", regex::escape(term));
    match caches.compile_pattern(&pattern) {
        Ok(re) => re.find_iter(content).map(|m| (m.start(), m.end())).collect(),
        Err(e) => {
            // Escaped literals always compile; keep the scan fail-closed anyway
            warn!("occurrence scan failed for {:?}: {}", term, e);
            Vec::new()
        }
    }
}

/// Computes and caches word-boundary spans for content strings, and
/// answers whole-word containment queries against them.
///
/// Boundary data is derived once per distinct content (keyed by content
/// hash) and reused by every whole-word check until it is evicted with
/// [`remove_from_cache`](WordBoundaryService::remove_from_cache).
pub struct WordBoundaryService {
    caches: Arc<CacheManager>,
    spans: DashMap<u64, Arc<Vec<(usize, usize)>>>,
}

impl WordBoundaryService {
    pub fn new(caches: Arc<CacheManager>) -> Self {
        Self {
            caches,
            spans: DashMap::new(),
        }
    }

    /// Returns the `(start, end)` byte spans of every word run in
    /// `content`, computing them on first sight.
    pub fn word_spans(&self, content: &str) -> Arc<Vec<(usize, usize)>> {
        let key = content_key(content);
        if let Some(cached) = self.spans.get(&key) {
            trace!("word boundary cache hit");
            return cached.clone();
        }

        let mut spans = Vec::new();
        let mut run_start: Option<usize> = None;
        for (idx, c) in content.char_indices() {
            if is_word_char(c) {
                if run_start.is_none() {
                    run_start = Some(idx);
                }
            } else if let Some(start) = run_start.take() {
                spans.push((start, idx));
            }
        }
        if let Some(start) = run_start {
            spans.push((start, content.len()));
        }

        let spans = Arc::new(spans);
        self.spans.insert(key, spans.clone());
        spans
    }

    /// Number of contents with cached boundary data
    pub fn cached_contents(&self) -> usize {
        self.spans.len()
    }

    pub fn clear(&self) {
        self.spans.clear();
    }
}

impl WordBoundaryLookup for WordBoundaryService {
    /// True when some occurrence of `term` is not flanked by a word
    /// character on either side. The term itself may contain non-word
    /// characters; only the characters adjacent to the occurrence decide.
    fn is_whole_word_match(&self, content: &str, term: &str, case_sensitive: bool) -> bool {
        if term.is_empty() {
            return false;
        }
        let spans = self.word_spans(content);
        find_occurrence_spans(&self.caches, content, term, case_sensitive)
            .into_iter()
            .any(|(start, end)| !span_is_flanked(&spans, start, end))
    }

    /// Occurrence positions of `term` that are not flanked by word
    /// characters on either side. Positions are strictly increasing, and
    /// the same flank test as
    /// [`is_whole_word_match`](WordBoundaryLookup::is_whole_word_match)
    /// decides each occurrence.
    fn find_whole_word_positions(
        &self,
        content: &str,
        term: &str,
        case_sensitive: bool,
    ) -> Vec<usize> {
        let spans = self.word_spans(content);
        find_occurrence_spans(&self.caches, content, term, case_sensitive)
            .into_iter()
            .filter(|&(start, end)| !span_is_flanked(&spans, start, end))
            .map(|(start, _)| start)
            .collect()
    }

    /// Evicts the cached boundary data for one content string. Called
    /// defensively around boolean evaluation so transient contents do not
    /// accumulate.
    fn remove_from_cache(&self, content: &str) {
        self.spans.remove(&content_key(content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> WordBoundaryService {
        WordBoundaryService::new(Arc::new(CacheManager::new()))
    }

    #[test]
    fn test_word_spans() {
        let svc = service();
        let spans = svc.word_spans("foo bar_baz, qux!");
        let words: Vec<&str> = spans.iter().map(|&(s, e)| &"foo bar_baz, qux!"[s..e]).collect();
        assert_eq!(words, vec!["foo", "bar_baz", "qux"]);
    }

    #[test]
    fn test_spans_cached_and_evicted() {
        let svc = service();
        let content = "some content here";
        svc.word_spans(content);
        assert_eq!(svc.cached_contents(), 1);
        svc.remove_from_cache(content);
        assert_eq!(svc.cached_contents(), 0);
    }

    #[test]
    fn test_is_whole_word_match() {
        let svc = service();
        assert!(svc.is_whole_word_match("a test here", "test", true));
        assert!(!svc.is_whole_word_match("attested here", "test", true));
        assert!(svc.is_whole_word_match("a Test here", "test", false));
        assert!(!svc.is_whole_word_match("a Test here", "test", true));
    }

    #[test]
    fn test_whole_word_term_with_non_word_chars() {
        let svc = service();
        // A hyphenated term is whole-word when its flanks are clear
        assert!(svc.is_whole_word_match("foo-bar baz", "foo-bar", true));
        assert!(!svc.is_whole_word_match("xfoo-bar baz", "foo-bar", true));
        assert!(!svc.is_whole_word_match("foo-bars baz", "foo-bar", true));
        assert_eq!(
            svc.find_whole_word_positions("foo-bar baz", "foo-bar", true),
            vec![0]
        );
    }

    #[test]
    fn test_whole_word_check_agrees_with_positions() {
        let svc = service();
        let cases = [
            ("foo-bar baz", "foo-bar"),
            ("a test here", "test"),
            ("attested here", "test"),
            ("end.", "end."),
        ];
        for (content, term) in cases {
            let positions = svc.find_whole_word_positions(content, term, true);
            assert_eq!(
                svc.is_whole_word_match(content, term, true),
                !positions.is_empty(),
                "disagreement for {:?} in {:?}",
                term,
                content
            );
        }
    }

    #[test]
    fn test_whole_word_positions_never_flanked() {
        let svc = service();
        let content = "test attest testing, test.";
        let positions = svc.find_whole_word_positions(content, "test", true);
        assert_eq!(positions, vec![0, 21]);
        for &pos in &positions {
            let before = content[..pos].chars().next_back();
            let after = content[pos + 4..].chars().next();
            assert!(before.map_or(true, |c| !is_word_char(c)));
            assert!(after.map_or(true, |c| !is_word_char(c)));
        }
    }

    #[test]
    fn test_occurrence_spans_case_insensitive() {
        let caches = CacheManager::new();
        let spans = find_occurrence_spans(&caches, "Test and TEST and test", "test", false);
        assert_eq!(spans, vec![(0, 4), (9, 13), (18, 22)]);

        let spans = find_occurrence_spans(&caches, "Test and TEST and test", "test", true);
        assert_eq!(spans, vec![(18, 22)]);
    }

    #[test]
    fn test_occurrence_spans_empty_term() {
        let caches = CacheManager::new();
        assert!(find_occurrence_spans(&caches, "anything", "", true).is_empty());
    }
}
