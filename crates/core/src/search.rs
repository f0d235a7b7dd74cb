//! Cross-page substring search over recognized words
//!
//! Each page's words are joined with single spaces and searched
//! case-insensitively for every occurrence of the query, overlapping ones
//! included. A match is projected back onto the words it covers: each covered
//! word contributes the slice of its box proportional to the covered
//! characters, assuming every character in a word has the same width. That
//! interpolation is an approximation of glyph geometry and is kept as such.

use crate::geometry::NormalizedRect;
use crate::selection::merge_highlight_rects;
use crate::word_index::{PageWords, Word, WordIndex};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One occurrence of the query on one page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub page_index: usize,

    /// Highlight geometry, one band per visual line
    pub rects: Vec<NormalizedRect>,
}

/// Lowercase a character while keeping a one-to-one character mapping
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Find every occurrence of `query` in one page's words
pub fn search_page(page_index: usize, words: &[Word], query: &str) -> Vec<SearchMatch> {
    if query.trim().is_empty() || words.is_empty() {
        return Vec::new();
    }
    let needle: Vec<char> = query.chars().map(fold).collect();

    // Folded page text plus (start, length) of each word, in chars
    let mut text: Vec<char> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        let start = text.len();
        text.extend(word.text.chars().map(fold));
        spans.push((start, text.len() - start));
    }

    if needle.len() > text.len() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for start in 0..=text.len() - needle.len() {
        if text[start..start + needle.len()] != needle[..] {
            continue;
        }
        let end = start + needle.len();

        let pieces: Vec<NormalizedRect> = words
            .iter()
            .zip(&spans)
            .filter_map(|(word, &(word_start, word_len))| {
                let from = start.max(word_start);
                let to = end.min(word_start + word_len);
                (from < to).then(|| {
                    let rect = word.rect;
                    let per_char = rect.width() / word_len as f32;
                    NormalizedRect::new(
                        rect.left + per_char * (from - word_start) as f32,
                        rect.top,
                        rect.left + per_char * (to - word_start) as f32,
                        rect.bottom,
                    )
                })
            })
            .collect();

        let rects = merge_highlight_rects(&pieces);
        if rects.is_empty() {
            continue;
        }
        matches.push(SearchMatch { page_index, rects });
    }
    matches
}

/// Search every extracted page, ordered by page then by offset
pub fn search_pages(pages: &BTreeMap<usize, PageWords>, query: &str) -> Vec<SearchMatch> {
    pages
        .iter()
        .flat_map(|(&page, words)| search_page(page, words, query))
        .collect()
}

/// Active query, its matches, and the match cursor
///
/// Matches are recomputed by [`refresh`](Self::refresh) whenever the query
/// changed or new pages were published to the word index since the last
/// computation.
pub struct SearchIndex {
    index: Arc<WordIndex>,
    query: String,
    matches: Vec<SearchMatch>,
    computed_generation: Option<u64>,
    current: Option<usize>,
}

impl SearchIndex {
    pub fn new(index: Arc<WordIndex>) -> Self {
        Self {
            index,
            query: String::new(),
            matches: Vec::new(),
            computed_generation: None,
            current: None,
        }
    }

    /// Replace the query and reset the cursor
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.current = None;
        self.computed_generation = None;
        self.refresh();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Recompute matches if the word index changed
    ///
    /// Returns `true` if the match list was recomputed. The cursor jumps to the
    /// first match once one exists and is clamped if matches disappeared.
    pub fn refresh(&mut self) -> bool {
        let generation = self.index.generation();
        if self.computed_generation == Some(generation) {
            return false;
        }

        self.matches = search_pages(&self.index.snapshot(), &self.query);
        self.computed_generation = Some(generation);

        let count = self.matches.len();
        self.current = match self.current {
            _ if count == 0 => None,
            None => Some(0),
            Some(i) => Some(i.min(count - 1)),
        };
        tracing::debug!(matches = count, "search results recomputed");
        true
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Cursor position, `None` while unset
    pub fn current_match_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_match(&self) -> Option<&SearchMatch> {
        self.current.and_then(|i| self.matches.get(i))
    }

    /// Advance the cursor, wrapping past the last match
    pub fn next(&mut self) -> Option<usize> {
        let count = self.matches.len();
        if count == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(0, |i| (i + 1) % count));
        self.current
    }

    /// Move the cursor back, wrapping before the first match
    pub fn previous(&mut self) -> Option<usize> {
        let count = self.matches.len();
        if count == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(count - 1, |i| (i + count - 1) % count));
        self.current
    }

    /// Drop the query and all matches
    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.current = None;
        self.computed_generation = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    /// Equal-width words on one line starting at the left edge
    fn line(texts: &[&str], top: f32) -> Vec<Word> {
        let width = 1.0 / texts.len() as f32;
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let left = i as f32 * width;
                Word::new(*t, Rect::new(left, top, left + width, top + 0.05))
            })
            .collect()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_match_spanning_two_words_is_one_band() {
        let words = line(&["the", "quick", "brown", "fox"], 0.1);
        let matches = search_page(0, &words, "quick brown");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].rects.len(), 1);
        let rect = matches[0].rects[0];
        assert!(approx(rect.left, 0.25));
        assert!(approx(rect.right, 0.75));
    }

    #[test]
    fn test_match_wrapping_lines_gives_two_bands() {
        let mut words = line(&["the", "quick"], 0.1);
        words.extend(line(&["brown", "fox"], 0.3));

        let matches = search_page(2, &words, "quick brown");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].page_index, 2);
        assert_eq!(matches[0].rects.len(), 2);
    }

    #[test]
    fn test_partial_word_interpolates_by_character() {
        let words = vec![Word::new("abcd", Rect::new(0.0, 0.0, 0.4, 0.1))];
        let matches = search_page(0, &words, "BC");

        let rect = matches[0].rects[0];
        assert!(approx(rect.left, 0.1));
        assert!(approx(rect.right, 0.3));
    }

    #[test]
    fn test_overlapping_occurrences_are_all_found() {
        let words = vec![Word::new("aaa", Rect::new(0.0, 0.0, 0.3, 0.1))];
        assert_eq!(search_page(0, &words, "aa").len(), 2);
    }

    #[test]
    fn test_blank_query_finds_nothing() {
        let words = line(&["a", " "], 0.1);
        assert!(search_page(0, &words, "").is_empty());
        assert!(search_page(0, &words, "   ").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let words = line(&["Hello", "WORLD"], 0.1);
        assert_eq!(search_page(0, &words, "hello world").len(), 1);
    }

    #[test]
    fn test_pages_ordered_then_offsets() {
        let mut pages: BTreeMap<usize, PageWords> = BTreeMap::new();
        pages.insert(5, line(&["cat", "cat"], 0.1).into());
        pages.insert(1, line(&["cat"], 0.1).into());

        let matches = search_pages(&pages, "cat");
        let order: Vec<_> = matches
            .iter()
            .map(|m| (m.page_index, m.rects[0].left))
            .collect();
        assert_eq!(order, vec![(1, 0.0), (5, 0.0), (5, 0.5)]);
    }

    #[test]
    fn test_cursor_starts_unset_then_auto_selects() {
        let index = Arc::new(WordIndex::new());
        let mut search = SearchIndex::new(index.clone());

        search.set_query("fox");
        assert_eq!(search.current_match_index(), None);

        index.publish(0, line(&["the", "fox"], 0.1));
        assert!(search.refresh());
        assert_eq!(search.current_match_index(), Some(0));
        assert!(!search.refresh());
    }

    #[test]
    fn test_next_wraps_back_to_start() {
        let index = Arc::new(WordIndex::new());
        index.publish(0, line(&["ab", "ab", "ab"], 0.1));
        let mut search = SearchIndex::new(index);
        search.set_query("ab");

        let start = search.current_match_index();
        for _ in 0..search.match_count() {
            search.next();
        }
        assert_eq!(search.current_match_index(), start);
    }

    #[test]
    fn test_previous_wraps_to_last() {
        let index = Arc::new(WordIndex::new());
        index.publish(0, line(&["ab", "ab", "ab"], 0.1));
        let mut search = SearchIndex::new(index);
        search.set_query("ab");

        assert_eq!(search.previous(), Some(2));
        assert_eq!(search.previous(), Some(1));
    }

    #[test]
    fn test_new_query_resets_cursor() {
        let index = Arc::new(WordIndex::new());
        index.publish(0, line(&["ab", "ab"], 0.1));
        let mut search = SearchIndex::new(index);

        search.set_query("ab");
        search.next();
        assert_eq!(search.current_match_index(), Some(1));

        search.set_query("zz");
        assert_eq!(search.current_match_index(), None);
        assert_eq!(search.next(), None);
    }
}
