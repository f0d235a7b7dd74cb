//! OCR collaborator contract
//!
//! Text recognition runs on-device through an external engine that takes a
//! bitmap and returns recognized elements with pixel bounding boxes. The core
//! only normalizes those boxes against the bitmap they came from.

use crate::error::OcrError;
use crate::geometry::Rect;
use crate::word_index::Word;
use notepdf_render::Bitmap;

/// Bounding box in bitmap pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// One element (word) returned by the engine, in reading order
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedElement {
    pub text: String,

    /// Engines may omit geometry for some elements
    pub bounding_box: Option<PixelBox>,
}

impl RecognizedElement {
    pub fn new(text: impl Into<String>, bounding_box: PixelBox) -> Self {
        Self {
            text: text.into(),
            bounding_box: Some(bounding_box),
        }
    }
}

/// On-device text recognition engine
///
/// Called from the extraction worker thread only, one call at a time.
pub trait OcrService: Send + Sync {
    fn recognize(&self, bitmap: &Bitmap) -> Result<Vec<RecognizedElement>, OcrError>;
}

/// Convert engine output into normalized words
///
/// Elements without a bounding box are dropped. Boxes are divided by the
/// bitmap's own dimensions and clamped into the unit square.
pub fn normalize_elements(elements: Vec<RecognizedElement>, width: u32, height: u32) -> Vec<Word> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let (w, h) = (width as f32, height as f32);

    elements
        .into_iter()
        .filter_map(|element| {
            let bbox = element.bounding_box?;
            let rect = Rect::new(
                bbox.left as f32 / w,
                bbox.top as f32 / h,
                bbox.right as f32 / w,
                bbox.bottom as f32 / h,
            )
            .clamp_unit();
            Some(Word::new(element.text, rect))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_divides_by_bitmap_size() {
        let words = normalize_elements(
            vec![RecognizedElement::new("hello", PixelBox::new(100, 50, 300, 100))],
            1000,
            500,
        );

        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "hello");
        assert_eq!(words[0].rect, Rect::new(0.1, 0.1, 0.3, 0.2));
    }

    #[test]
    fn test_normalize_skips_elements_without_box() {
        let elements = vec![
            RecognizedElement {
                text: "ghost".to_string(),
                bounding_box: None,
            },
            RecognizedElement::new("kept", PixelBox::new(0, 0, 10, 10)),
        ];

        let words = normalize_elements(elements, 100, 100);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "kept");
    }

    #[test]
    fn test_normalize_clamps_out_of_bounds_boxes() {
        let words = normalize_elements(
            vec![RecognizedElement::new("edge", PixelBox::new(-5, -5, 120, 50))],
            100,
            100,
        );
        assert_eq!(words[0].rect, Rect::new(0.0, 0.0, 1.0, 0.5));
    }

    #[test]
    fn test_normalize_zero_sized_bitmap() {
        let words = normalize_elements(
            vec![RecognizedElement::new("x", PixelBox::new(0, 0, 1, 1))],
            0,
            10,
        );
        assert!(words.is_empty());
    }
}
