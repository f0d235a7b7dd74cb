//! Viewer configuration
//!
//! Every knob has a default tuned for a phone-sized display. Configuration can
//! be created programmatically, loaded from a JSON file, or overridden from
//! environment variables.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Page rendering and bitmap cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageStoreConfig {
    /// Maximum number of rendered pages kept in memory
    pub capacity: usize,

    /// Width of the display area in pixels
    pub display_width: u32,

    /// Extra upscaling applied on top of the display width so zoomed pages stay sharp
    pub upscale: f32,

    /// Pixel width of the throwaway renders made by the full-document scan
    pub scan_width: u32,
}

impl Default for PageStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            display_width: 1080,
            upscale: 2.0,
            scan_width: 1200,
        }
    }
}

impl PageStoreConfig {
    /// Pixel width used for cached page renders
    pub fn target_width(&self) -> u32 {
        ((self.display_width as f32) * self.upscale).round().max(1.0) as u32
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_display_width(mut self, width: u32) -> Self {
        self.display_width = width;
        self
    }

    pub fn with_upscale(mut self, upscale: f32) -> Self {
        self.upscale = upscale;
        self
    }

    pub fn with_scan_width(mut self, width: u32) -> Self {
        self.scan_width = width;
        self
    }
}

/// Text extraction pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// The full-document scan pauses while this many requests are queued
    pub max_scan_backlog: usize,

    /// How often a paused scan re-checks its cancellation token, in milliseconds
    pub scan_poll_interval_ms: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_scan_backlog: 2,
            scan_poll_interval_ms: 50,
        }
    }
}

impl ExtractionConfig {
    pub fn scan_poll_interval(&self) -> Duration {
        Duration::from_millis(self.scan_poll_interval_ms)
    }

    pub fn with_max_scan_backlog(mut self, backlog: usize) -> Self {
        self.max_scan_backlog = backlog.max(1);
        self
    }

    pub fn with_scan_poll_interval(mut self, interval: Duration) -> Self {
        self.scan_poll_interval_ms = interval.as_millis() as u64;
        self
    }
}

/// Word selection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Margin in screen pixels added around each word when hit-testing a tap
    pub hit_tolerance: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { hit_tolerance: 10.0 }
    }
}

impl SelectionConfig {
    pub fn with_hit_tolerance(mut self, tolerance: f32) -> Self {
        self.hit_tolerance = tolerance;
        self
    }
}

/// Ink tool defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InkConfig {
    /// Pen stroke width as a fraction of page width
    pub pen_width: f32,

    /// Highlighter stroke width as a fraction of page width
    pub highlighter_width: f32,

    /// Opacity applied to highlighter strokes
    pub highlighter_alpha: f32,

    /// Eraser touch radius in screen pixels
    pub eraser_radius: f32,
}

impl Default for InkConfig {
    fn default() -> Self {
        Self {
            pen_width: 0.005,
            highlighter_width: 0.03,
            highlighter_alpha: 0.4,
            eraser_radius: 50.0,
        }
    }
}

impl InkConfig {
    pub fn with_eraser_radius(mut self, radius: f32) -> Self {
        self.eraser_radius = radius;
        self
    }
}

/// Complete viewer configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub page_store: PageStoreConfig,
    pub extraction: ExtractionConfig,
    pub selection: SelectionConfig,
    pub ink: InkConfig,
}

impl ViewerConfig {
    pub fn with_page_store(mut self, config: PageStoreConfig) -> Self {
        self.page_store = config;
        self
    }

    pub fn with_extraction(mut self, config: ExtractionConfig) -> Self {
        self.extraction = config;
        self
    }

    pub fn with_selection(mut self, config: SelectionConfig) -> Self {
        self.selection = config;
        self
    }

    pub fn with_ink(mut self, config: InkConfig) -> Self {
        self.ink = config;
        self
    }

    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Defaults overridden by environment variables
    ///
    /// - `NOTEPDF_CACHE_PAGES`: bitmap cache capacity in pages
    /// - `NOTEPDF_DISPLAY_WIDTH`: display width in pixels
    /// - `NOTEPDF_UPSCALE`: render upscaling factor
    /// - `NOTEPDF_SCAN_WIDTH`: full-scan render width in pixels
    /// - `NOTEPDF_HIT_TOLERANCE`: tap tolerance in pixels
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_var("NOTEPDF_CACHE_PAGES")? {
            config.page_store.capacity = v;
        }
        if let Some(v) = env_var("NOTEPDF_DISPLAY_WIDTH")? {
            config.page_store.display_width = v;
        }
        if let Some(v) = env_var("NOTEPDF_UPSCALE")? {
            config.page_store.upscale = v;
        }
        if let Some(v) = env_var("NOTEPDF_SCAN_WIDTH")? {
            config.page_store.scan_width = v;
        }
        if let Some(v) = env_var("NOTEPDF_HIT_TOLERANCE")? {
            config.selection.hit_tolerance = v;
        }

        Ok(config)
    }
}

fn env_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}
