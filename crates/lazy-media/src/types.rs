//! Core data types for media resolution and deferred loading.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Quality used when a caller does not ask for one.
pub const DEFAULT_QUALITY: u8 = 80;

/// Class added by the resolver to any element it swapped to the fallback.
pub const ERROR_INDICATOR_CLASS: &str = "image-error";

/// Dimensions and quality encoded into a locator's query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResponsiveDescriptor {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl ResponsiveDescriptor {
    /// Descriptor at the default quality.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            quality: DEFAULT_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// The query string understood by the image host. Parameter order is fixed.
    pub fn query(&self) -> String {
        format!(
            "w={}&h={}&q={}&fit=crop&auto=format",
            self.width, self.height, self.quality
        )
    }
}

impl fmt::Display for ResponsiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query())
    }
}

/// One candidate of a width-described source set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrcsetEntry {
    pub url: String,
    pub descriptor: ResponsiveDescriptor,
}

impl fmt::Display for SrcsetEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}w", self.url, self.descriptor.width)
    }
}

/// Where a loader puts the resolved locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// `background-image` style of an arbitrary element.
    Background,
    /// `src` attribute of an image element.
    Primary,
}

/// Per-element load progress. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    Placeholder,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Error)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: LoadState) -> bool {
        !self.is_terminal() && next > self
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Idle => "idle",
            LoadState::Placeholder => "placeholder",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Presentation class names bound to load progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleHook {
    Loading,
    Loaded,
    Error,
}

impl StyleHook {
    pub fn class_name(self) -> &'static str {
        match self {
            StyleHook::Loading => "lazy-loading",
            StyleHook::Loaded => "lazy-loaded",
            StyleHook::Error => "lazy-error",
        }
    }
}

/// Errors raised by configuration loading and payload inspection.
///
/// Resolution and loading never surface these; they degrade to the fallback.
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(String),
}

/// Convenience result type.
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_grammar_order() {
        let d = ResponsiveDescriptor::new(800, 600);
        assert_eq!(d.query(), "w=800&h=600&q=80&fit=crop&auto=format");
        assert_eq!(
            d.with_quality(55).to_string(),
            "w=800&h=600&q=55&fit=crop&auto=format"
        );
    }

    #[test]
    fn test_state_forward_only() {
        assert!(LoadState::Idle.can_advance_to(LoadState::Placeholder));
        assert!(LoadState::Placeholder.can_advance_to(LoadState::Error));
        assert!(LoadState::Loading.can_advance_to(LoadState::Loaded));
        assert!(!LoadState::Loading.can_advance_to(LoadState::Placeholder));
        assert!(!LoadState::Loaded.can_advance_to(LoadState::Error));
        assert!(!LoadState::Error.can_advance_to(LoadState::Error));
    }

    #[test]
    fn test_style_hook_names() {
        assert_eq!(StyleHook::Loading.class_name(), "lazy-loading");
        assert_eq!(StyleHook::Loaded.class_name(), "lazy-loaded");
        assert_eq!(StyleHook::Error.class_name(), "lazy-error");
    }
}
