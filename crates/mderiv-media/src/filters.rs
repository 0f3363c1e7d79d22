//! FFmpeg video filter chains.

use std::fmt;

/// A comma-separated FFmpeg filter chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoFilter(String);

impl VideoFilter {
    /// An empty filter chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw filter to the chain.
    pub fn append(mut self, filter: impl AsRef<str>) -> Self {
        let filter = filter.as_ref();
        if filter.is_empty() {
            return self;
        }
        if !self.0.is_empty() {
            self.0.push(',');
        }
        self.0.push_str(filter);
        self
    }

    /// Scale to `width`, keeping aspect ratio with an even height.
    pub fn scale_width(self, width: u32) -> Self {
        self.append(filter_scale_width(width))
    }

    /// Resample to a fixed frame rate.
    pub fn fps(self, fps: u32) -> Self {
        self.append(format!("fps={}", fps))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build filter for width-bound scaling.
pub fn filter_scale_width(width: u32) -> String {
    format!("scale={}:-2", width)
}
