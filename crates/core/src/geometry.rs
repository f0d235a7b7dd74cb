//! Page geometry
//!
//! Everything the core stores is expressed in normalized page coordinates:
//! fractions of the page width and height in `[0, 1]`, with the origin at the
//! top-left corner. Normalized values are invariant under zoom and device
//! density; conversion to screen pixels happens only against a [`Viewport`].

use serde::{Deserialize, Serialize};

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// An axis-aligned rectangle stored as edges, `left <= right` and `top <= bottom`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Point in normalized page coordinates
pub type NormalizedPoint = Point;

/// Rectangle in normalized page coordinates
pub type NormalizedRect = Rect;

impl Rect {
    /// Create a rectangle from its edges, reordering them if needed
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    /// Create a rectangle from an origin and size
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.left, self.bottom)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    /// Grow the rectangle by `delta` on every side
    pub fn inflate(&self, delta: f32) -> Rect {
        Rect {
            left: self.left - delta,
            top: self.top - delta,
            right: self.right + delta,
            bottom: self.bottom + delta,
        }
    }

    /// Edge-inclusive containment test
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.left
            && point.x <= self.right
            && point.y >= self.top
            && point.y <= self.bottom
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Clamp every edge into `[0, 1]`
    pub fn clamp_unit(&self) -> Rect {
        Rect {
            left: self.left.clamp(0.0, 1.0),
            top: self.top.clamp(0.0, 1.0),
            right: self.right.clamp(0.0, 1.0),
            bottom: self.bottom.clamp(0.0, 1.0),
        }
    }
}

/// Size of the on-screen area a page is currently drawn into, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// False until layout has produced a real size
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn to_screen_point(&self, point: &NormalizedPoint) -> Point {
        Point::new(point.x * self.width, point.y * self.height)
    }

    pub fn to_screen_rect(&self, rect: &NormalizedRect) -> Rect {
        Rect {
            left: rect.left * self.width,
            top: rect.top * self.height,
            right: rect.right * self.width,
            bottom: rect.bottom * self.height,
        }
    }

    /// Convert a screen point back to page fractions
    ///
    /// Returns the origin for an invalid viewport.
    pub fn to_normalized_point(&self, point: &Point) -> NormalizedPoint {
        if !self.is_valid() {
            return Point::default();
        }
        Point::new(point.x / self.width, point.y / self.height)
    }

    pub fn to_normalized_rect(&self, rect: &Rect) -> NormalizedRect {
        if !self.is_valid() {
            return Rect::default();
        }
        Rect {
            left: rect.left / self.width,
            top: rect.top / self.height,
            right: rect.right / self.width,
            bottom: rect.bottom / self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_edges() {
        let rect = Rect::new(0.8, 0.6, 0.2, 0.1);
        assert_eq!(rect, Rect { left: 0.2, top: 0.1, right: 0.8, bottom: 0.6 });
    }

    #[test]
    fn test_inflate_and_contains() {
        let rect = Rect::new(10.0, 10.0, 20.0, 20.0);
        let outside = Point::new(25.0, 15.0);

        assert!(!rect.contains(&outside));
        assert!(rect.inflate(10.0).contains(&outside));
    }

    #[test]
    fn test_viewport_round_trip_is_scale_invariant() {
        let viewport = Viewport::new(800.0, 1000.0);
        let normalized = Rect::new(0.25, 0.5, 0.5, 0.75);

        let screen = viewport.to_screen_rect(&normalized);
        assert_eq!(screen, Rect::new(200.0, 500.0, 400.0, 750.0));
        assert_eq!(viewport.to_normalized_rect(&screen), normalized);
    }

    #[test]
    fn test_invalid_viewport_normalizes_to_origin() {
        let viewport = Viewport::new(0.0, 0.0);
        assert_eq!(viewport.to_normalized_point(&Point::new(5.0, 5.0)), Point::default());
    }

    #[test]
    fn test_clamp_unit() {
        let rect = Rect::new(-0.1, 0.2, 1.3, 0.4).clamp_unit();
        assert_eq!(rect, Rect::new(0.0, 0.2, 1.0, 0.4));
    }
}
