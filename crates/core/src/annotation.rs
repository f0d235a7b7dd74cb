//! Annotation data model
//!
//! Ink strokes, note boxes and anchored text notes. All geometry is stored in
//! normalized page coordinates so annotations survive zoom and device changes;
//! conversion to screen space happens only when drawing or hit-testing.

use crate::config::InkConfig;
use crate::geometry::{NormalizedPoint, NormalizedRect, Point, Rect, Viewport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the document annotations belong to
pub type DocumentId = uuid::Uuid;

/// Storage-assigned stroke id; changes when a stroke is re-inserted by undo/redo
pub type StrokeId = i64;

/// Storage-assigned note id
pub type NoteId = i64;

/// Ink tool a stroke was drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Pen,
    Highlighter,
}

impl ToolKind {
    /// Default normalized stroke width for this tool
    pub fn default_width(&self, config: &InkConfig) -> f32 {
        match self {
            ToolKind::Pen => config.pen_width,
            ToolKind::Highlighter => config.highlighter_width,
        }
    }

    /// Opacity applied to strokes drawn with this tool
    pub fn alpha(&self, config: &InkConfig) -> f32 {
        match self {
            ToolKind::Pen => 1.0,
            ToolKind::Highlighter => config.highlighter_alpha,
        }
    }
}

/// Active interaction mode of the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    /// Text selection and navigation
    #[default]
    Select,
    Pen,
    Highlighter,
    Eraser,
    BoxSelect,
}

impl ToolMode {
    /// Ink tool used when this mode draws strokes
    pub fn ink_kind(&self) -> Option<ToolKind> {
        match self {
            ToolMode::Pen => Some(ToolKind::Pen),
            ToolMode::Highlighter => Some(ToolKind::Highlighter),
            _ => None,
        }
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Packed `0xAARRGGBB`, the form colors are stored in
    pub fn to_argb(&self) -> u32 {
        u32::from_be_bytes([self.a, self.r, self.g, self.b])
    }

    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self { r, g, b, a }
    }
}

/// A committed freehand stroke
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkStroke {
    pub id: StrokeId,
    pub page_index: usize,
    pub color: Color,

    /// Width as a fraction of page width
    pub stroke_width: f32,
    pub alpha: f32,
    pub tool: ToolKind,
    pub points: Vec<NormalizedPoint>,
}

impl InkStroke {
    /// Same drawing, ignoring the storage id
    pub fn same_content(&self, other: &InkStroke) -> bool {
        self.page_index == other.page_index
            && self.color == other.color
            && self.stroke_width == other.stroke_width
            && self.alpha == other.alpha
            && self.tool == other.tool
            && self.points == other.points
    }

    /// True if any point lies within `radius` screen pixels of `screen_point`
    pub fn is_near(&self, screen_point: Point, viewport: Viewport, radius: f32) -> bool {
        self.points
            .iter()
            .any(|p| viewport.to_screen_point(p).distance_to(&screen_point) < radius)
    }
}

/// Rectangle in `x, y, width, height` form, normalized
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn to_rect(&self) -> NormalizedRect {
        Rect::from_xywh(self.x, self.y, self.width, self.height)
    }
}

impl From<NormalizedRect> for BoxRect {
    fn from(rect: NormalizedRect) -> Self {
        Self::new(rect.left, rect.top, rect.width(), rect.height())
    }
}

/// A captured page region with free-text commentary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteBox {
    pub id: NoteId,
    pub page_index: usize,
    pub rect: BoxRect,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A comment anchored to one or more runs of recognized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteText {
    pub id: NoteId,
    pub page_index: usize,

    /// One rectangle per highlighted line
    pub anchor_rects: Vec<NormalizedRect>,
    pub quoted_text: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Every note on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageNotes {
    pub boxes: Vec<NoteBox>,
    pub texts: Vec<NoteText>,
}

impl PageNotes {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.texts.is_empty()
    }
}

pub fn encode_points(points: &[NormalizedPoint]) -> String {
    serde_json::to_string(points).unwrap_or_default()
}

/// Decode a stored point list
///
/// Malformed payloads decode to an empty list so one corrupt stroke cannot
/// keep the rest of the page from rendering.
pub fn decode_points(payload: &str) -> Vec<NormalizedPoint> {
    decode_list(payload, "points")
}

pub fn encode_rects(rects: &[NormalizedRect]) -> String {
    serde_json::to_string(rects).unwrap_or_default()
}

/// Decode a stored rectangle list, empty on malformed input
pub fn decode_rects(payload: &str) -> Vec<NormalizedRect> {
    decode_list(payload, "rects")
}

fn decode_list<T: serde::de::DeserializeOwned>(payload: &str, what: &str) -> Vec<T> {
    if payload.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(payload).unwrap_or_else(|e| {
        tracing::warn!(error = %e, kind = what, "malformed annotation geometry");
        Vec::new()
    })
}
