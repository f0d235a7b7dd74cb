//! Word selection on a single page
//!
//! A selection is a contiguous run of word indices `start..=end` over one
//! page's word list, grown from the word first tapped (the anchor). Input
//! points are in screen pixels; word boxes are projected through the current
//! [`Viewport`] for hit-testing.
//!
//! Transitions: nothing selected, then a single word (tap on a word), then a
//! range (drag or handle move), then nothing again (tap elsewhere, scroll, or
//! a tool change, all handled by the caller dropping the state).

use crate::geometry::{NormalizedRect, Point, Rect, Viewport};
use crate::word_index::{PageWords, Word};
use std::cmp::Ordering;

/// Draggable end of a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Start,
    End,
}

/// Selected word range on one page
///
/// `start_index <= end_index` holds after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionState {
    /// Word the selection was started from
    pub anchor_index: usize,
    pub start_index: usize,
    pub end_index: usize,
}

impl SelectionState {
    pub fn single(index: usize) -> Self {
        Self {
            anchor_index: index,
            start_index: index,
            end_index: index,
        }
    }

    pub fn is_single(&self) -> bool {
        self.start_index == self.end_index
    }

    /// `(first, last)` selected index, whichever order the fields hold
    pub fn bounds(&self) -> (usize, usize) {
        (
            self.start_index.min(self.end_index),
            self.start_index.max(self.end_index),
        )
    }

    pub fn len(&self) -> usize {
        let (first, last) = self.bounds();
        last - first + 1
    }

    /// The selected words, clamped to the list
    pub fn selected_words<'a>(&self, words: &'a [Word]) -> &'a [Word] {
        if words.is_empty() {
            return &[];
        }
        let last = words.len() - 1;
        let (first, end) = self.bounds();
        &words[first.min(last)..=end.min(last)]
    }

    /// Normalized highlight bands for the selected words, one per line
    pub fn highlight_rects(&self, words: &[Word]) -> Vec<NormalizedRect> {
        let rects: Vec<NormalizedRect> = self
            .selected_words(words)
            .iter()
            .map(|word| word.rect)
            .collect();
        merge_highlight_rects(&rects)
    }

    /// Selected words joined with single spaces
    pub fn selected_text(&self, words: &[Word]) -> String {
        self.selected_words(words)
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Selection operations against one page's words at the current zoom
pub struct SelectionEngine {
    words: PageWords,
    viewport: Viewport,
    tolerance: f32,
}

impl SelectionEngine {
    /// `tolerance` is the hit-test margin in screen pixels
    pub fn new(words: PageWords, viewport: Viewport, tolerance: f32) -> Self {
        Self {
            words,
            viewport,
            tolerance,
        }
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn clamp_index(&self, index: usize) -> usize {
        index.min(self.words.len().saturating_sub(1))
    }

    fn clamp(&self, state: &SelectionState) -> SelectionState {
        let start = self.clamp_index(state.start_index);
        let end = self.clamp_index(state.end_index);
        SelectionState {
            anchor_index: self.clamp_index(state.anchor_index),
            start_index: start.min(end),
            end_index: start.max(end),
        }
    }

    /// First word whose inflated screen box contains `point`
    pub fn word_index_at(&self, point: Point) -> Option<usize> {
        self.words.iter().position(|word| {
            self.viewport
                .to_screen_rect(&word.rect)
                .inflate(self.tolerance)
                .contains(&point)
        })
    }

    /// Word whose screen centroid is nearest to `point`
    pub fn closest_word_index(&self, point: Point) -> Option<usize> {
        self.words
            .iter()
            .map(|word| self.viewport.to_screen_rect(&word.rect).center().distance_to(&point))
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
    }

    /// Select the word under a tap, if any
    pub fn select_at(&self, point: Point) -> Option<SelectionState> {
        self.word_index_at(point).map(SelectionState::single)
    }

    /// Grow the selection from its anchor to the word under a drag point
    ///
    /// Points between words fall back to the nearest word.
    pub fn extend_to(&self, point: Point, state: &SelectionState) -> SelectionState {
        let state = self.clamp(state);
        let Some(index) = self
            .word_index_at(point)
            .or_else(|| self.closest_word_index(point))
        else {
            return state;
        };

        SelectionState {
            anchor_index: state.anchor_index,
            start_index: state.anchor_index.min(index),
            end_index: state.anchor_index.max(index),
        }
    }

    /// Move one handle to the word nearest `point`
    ///
    /// Dragging a handle past the other one swaps their roles.
    pub fn move_handle(
        &self,
        handle: Handle,
        point: Point,
        state: &SelectionState,
    ) -> SelectionState {
        let state = self.clamp(state);
        let Some(index) = self.closest_word_index(point) else {
            return state;
        };

        let (a, b) = match handle {
            Handle::Start => (index, state.end_index),
            Handle::End => (state.start_index, index),
        };
        SelectionState {
            anchor_index: state.anchor_index,
            start_index: a.min(b),
            end_index: a.max(b),
        }
    }

    pub fn highlight_rects(&self, state: &SelectionState) -> Vec<NormalizedRect> {
        state.highlight_rects(&self.words)
    }

    /// Screen positions of the start handle (bottom-left of the first word)
    /// and the end handle (bottom-right of the last word)
    pub fn handle_positions(&self, state: &SelectionState) -> Option<(Point, Point)> {
        let selected = state.selected_words(&self.words);
        let first = selected.first()?;
        let last = selected.last()?;
        Some((
            self.viewport.to_screen_rect(&first.rect).bottom_left(),
            self.viewport.to_screen_rect(&last.rect).bottom_right(),
        ))
    }

    pub fn selected_text(&self, state: &SelectionState) -> String {
        state.selected_text(&self.words)
    }
}

/// Merge word boxes into one band per visual line
///
/// Boxes whose vertical centers differ by less than half their average height
/// are on the same line; each line becomes the bounding box of its words,
/// gaps included. Merging an already merged list returns it unchanged.
pub fn merge_highlight_rects(rects: &[Rect]) -> Vec<Rect> {
    let mut sorted = rects.to_vec();
    sorted.sort_by(|a, b| match a.top.total_cmp(&b.top) {
        Ordering::Equal => a.left.total_cmp(&b.left),
        other => other,
    });

    let mut lines: Vec<Rect> = Vec::new();
    for rect in sorted {
        match lines.last_mut() {
            Some(line) if same_line(line, &rect) => *line = line.union(&rect),
            _ => lines.push(rect),
        }
    }
    lines
}

fn same_line(a: &Rect, b: &Rect) -> bool {
    let average_height = (a.height() + b.height()) / 2.0;
    (a.center().y - b.center().y).abs() < average_height / 2.0
}

/// The one active selection across all pages of a document
///
/// Starting a selection on another page drops the previous page's selection.
#[derive(Debug, Default)]
pub struct PageSelection {
    active: Option<(usize, SelectionState)>,
}

impl PageSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, page_index: usize, state: SelectionState) {
        if let Some((previous, _)) = self.active {
            if previous != page_index {
                tracing::debug!(
                    from = previous,
                    to = page_index,
                    "selection moved to another page"
                );
            }
        }
        self.active = Some((page_index, state));
    }

    /// Selection on `page_index`, if that page holds the active selection
    pub fn get(&self, page_index: usize) -> Option<SelectionState> {
        self.active
            .filter(|(page, _)| *page == page_index)
            .map(|(_, state)| state)
    }

    pub fn active(&self) -> Option<(usize, SelectionState)> {
        self.active
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }
}
