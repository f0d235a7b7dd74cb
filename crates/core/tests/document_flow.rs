use notepdf_core::{
    Bitmap, Color, DocumentId, DocumentSession, Handle, MemoryRepository, OcrError, OcrService,
    PageStoreConfig, PixelBox, Point, RasterError, RasterResult, Rasterizer, RecognizedElement,
    ToolKind, ToolMode, ViewerConfig, Viewport,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

const PAGE_SIZE: u32 = 400;

/// Renders square pages; the page index is stored in the first pixel
struct StampRasterizer {
    pages: usize,
}

impl Rasterizer for StampRasterizer {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render(&mut self, page_index: usize, target_width: u32) -> RasterResult<Bitmap> {
        if page_index >= self.pages {
            return Err(RasterError::PageOutOfRange {
                index: page_index,
                count: self.pages,
            });
        }
        let mut pixels = vec![0xFF; (target_width * target_width * 4) as usize];
        pixels[0] = page_index as u8;
        Ok(Bitmap::new(target_width, target_width, pixels))
    }
}

/// One line of text per page, each word in an equal-width slot
struct LineOcr {
    lines: HashMap<usize, Vec<&'static str>>,
}

impl OcrService for LineOcr {
    fn recognize(&self, bitmap: &Bitmap) -> Result<Vec<RecognizedElement>, OcrError> {
        let page = bitmap.pixels()[0] as usize;
        let words = self.lines.get(&page).ok_or(OcrError::Unavailable)?;
        let slot = bitmap.width() as i32 / words.len() as i32;
        let height = bitmap.height() as i32 / 20;

        Ok(words
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let left = i as i32 * slot;
                RecognizedElement::new(*text, PixelBox::new(left, 0, left + slot, height))
            })
            .collect())
    }
}

fn open_session(lines: &[(usize, &[&'static str])], pages: usize) -> DocumentSession {
    let ocr = LineOcr {
        lines: lines.iter().map(|(p, w)| (*p, w.to_vec())).collect(),
    };
    let config = ViewerConfig::default().with_page_store(
        PageStoreConfig::default()
            .with_display_width(PAGE_SIZE)
            .with_upscale(1.0)
            .with_scan_width(PAGE_SIZE),
    );

    DocumentSession::open(
        DocumentId::new_v4(),
        StampRasterizer { pages },
        Arc::new(ocr),
        Arc::new(MemoryRepository::new()),
        config,
    )
    .expect("session should open")
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for extraction");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn search_finds_matches_across_pages_and_cycles() {
    let session = open_session(
        &[
            (0, &["the", "quick", "brown", "fox"]),
            (1, &["lazy", "dog"]),
            (2, &["quick", "brown", "cow"]),
        ],
        3,
    );

    session.set_search_query("quick brown").expect("scan should start");
    wait_until(|| session.search_matches().len() == 2);

    let matches = session.search_matches();
    assert_eq!(matches[0].page_index, 0);
    assert_eq!(matches[1].page_index, 2);
    assert_eq!(matches[0].rects.len(), 1);

    let start = session.current_match_index();
    assert_eq!(start, Some(0));
    session.next_match();
    session.next_match();
    assert_eq!(session.current_match_index(), start);
    assert_eq!(session.previous_match().map(|m| m.page_index), Some(2));

    session.close().expect("session should close");
}

#[test]
fn unreadable_page_is_searchable_as_empty() {
    // Page 1 has no script, so recognition fails for it
    let session = open_session(&[(0, &["needle"])], 2);

    session.set_search_query("needle").expect("scan should start");
    wait_until(|| session.words_for(1).is_some() && session.words_for(0).is_some());

    assert_eq!(session.words_for(1).map(|w| w.len()), Some(0));
    assert_eq!(session.search_matches().len(), 1);
    session.close().expect("session should close");
}

#[test]
fn visible_page_bitmap_is_cached_and_shared() {
    let session = open_session(&[(0, &["a"])], 1);

    let first = session.page(0).expect("page should render");
    let second = session.page(0).expect("page should render");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(session.cache_stats().hits, 1);
    assert!(session.page(5).is_none());

    session.close().expect("session should close");
}

#[test]
fn selection_handles_and_tool_switch() {
    let session = open_session(&[(0, &["one", "two", "three", "four"])], 1);
    session.page(0);
    wait_until(|| session.words_for(0).is_some());

    let viewport = Viewport::new(PAGE_SIZE as f32, PAGE_SIZE as f32);
    let tap = session.select_at(0, Point::new(150.0, 5.0), viewport).expect("word hit");
    assert_eq!(tap.start_index, 1);

    let moved = session
        .move_selection_handle(0, Handle::End, Point::new(350.0, 10.0), viewport)
        .expect("selection exists");
    assert_eq!((moved.start_index, moved.end_index), (1, 3));

    let swapped = session
        .move_selection_handle(0, Handle::End, Point::new(10.0, 10.0), viewport)
        .expect("selection exists");
    assert_eq!((swapped.start_index, swapped.end_index), (0, 1));

    assert!(session.select_at(1, Point::new(10.0, 10.0), viewport).is_none());
    assert!(session.selection().is_none());

    session.select_at(0, Point::new(10.0, 5.0), viewport);
    session.set_tool(ToolMode::Highlighter);
    assert!(session.selection().is_none());
    session.close().expect("session should close");
}

#[test]
fn ink_history_survives_undo_redo_cycles() {
    let session = open_session(&[], 1);
    let annotations = session.annotations();

    let stroke = annotations
        .add_default_stroke(
            0,
            vec![Point::new(0.2, 0.2), Point::new(0.4, 0.4)],
            Color::YELLOW,
            ToolKind::Highlighter,
        )
        .expect("stroke should commit");
    assert_eq!(stroke.alpha, 0.4);

    annotations.remove_stroke(&stroke).expect("stroke should delete");
    for _ in 0..3 {
        annotations.undo().expect("undo");
        annotations.undo().expect("undo");
        annotations.redo().expect("redo");
        annotations.redo().expect("redo");
    }
    assert!(annotations.strokes_for_page(0).expect("query").is_empty());

    annotations.undo().expect("undo");
    let restored = annotations.strokes_for_page(0).expect("query");
    assert_eq!(restored.len(), 1);
    assert!(restored[0].same_content(&stroke));

    session.close().expect("session should close");
}
