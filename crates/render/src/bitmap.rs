//! Rendered page bitmaps

/// Bytes per RGBA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// A rendered page image in RGBA format
///
/// Bitmaps are produced by a [`Rasterizer`](crate::Rasterizer) and shared
/// behind an `Arc` by the page cache, so identity comparisons use
/// `Arc::ptr_eq` rather than pixel equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a bitmap from raw RGBA pixel data
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a white bitmap of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * BYTES_PER_PIXEL;
        Self::new(width, height, vec![0xFF; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory held by the pixel buffer in bytes
    pub fn memory_size(&self) -> usize {
        self.pixels.len()
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
