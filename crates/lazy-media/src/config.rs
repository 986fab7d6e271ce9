//! Media layer configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::notifier::ObserverOptions;
use crate::types::{MediaError, MediaResult, DEFAULT_QUALITY};

/// Image host every identifier is resolved against.
pub const DEFAULT_HOST: &str = "https://images.unsplash.com";

/// Lightweight inline image shown until the real locator resolves.
pub const LOADING_PLACEHOLDER: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 800 500'%3E%3Crect fill='%23f0f0f0' width='800' height='500'/%3E%3Ctext x='50%25' y='50%25' text-anchor='middle' fill='%23999' font-family='sans-serif' font-size='24'%3ELoading...%3C/text%3E%3C/svg%3E";

/// Permanent inline image shown after an irrecoverable load failure.
pub const FALLBACK_PLACEHOLDER: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' viewBox='0 0 800 500'%3E%3Crect fill='%23e0e0e0' width='800' height='500'/%3E%3Ctext x='50%25' y='50%25' text-anchor='middle' fill='%23666' font-family='sans-serif' font-size='24'%3EImage Unavailable%3C/text%3E%3C/svg%3E";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Scheme + authority of the image host, without a trailing slash.
    pub host: String,
    pub default_quality: u8,
    pub placeholder: String,
    pub fallback: String,
    pub observer: ObserverOptions,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            default_quality: DEFAULT_QUALITY,
            placeholder: LOADING_PLACEHOLDER.to_string(),
            fallback: FALLBACK_PLACEHOLDER.to_string(),
            observer: ObserverOptions::default(),
        }
    }
}

impl MediaConfig {
    /// Parse a (possibly partial) JSON document on top of the defaults.
    pub fn from_json_str(json: &str) -> MediaResult<Self> {
        let mut config: MediaConfig = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file(path: &Path) -> MediaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        tracing::debug!("Loaded media config from {}", path.display());
        Self::from_json_str(&text)
    }

    /// Replace the host, keeping every other setting.
    pub fn with_host(mut self, host: &str) -> MediaResult<Self> {
        self.host = host.to_string();
        self.normalize();
        self.validate()?;
        Ok(self)
    }

    fn normalize(&mut self) {
        self.host = self.host.trim().trim_end_matches('/').to_string();
    }

    pub fn validate(&self) -> MediaResult<()> {
        let parsed = url::Url::parse(&self.host)
            .map_err(|e| MediaError::InvalidConfig(format!("host '{}': {e}", self.host)))?;
        if parsed.host_str().is_none() {
            return Err(MediaError::InvalidConfig(format!(
                "host '{}' has no authority",
                self.host
            )));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(MediaError::InvalidConfig(format!(
                "host '{}' must not carry a query or fragment",
                self.host
            )));
        }
        if !(1..=100).contains(&self.default_quality) {
            return Err(MediaError::InvalidConfig(format!(
                "default_quality {} outside 1..=100",
                self.default_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.observer.threshold) {
            return Err(MediaError::InvalidConfig(format!(
                "observer threshold {} outside 0..=1",
                self.observer.threshold
            )));
        }
        if self.fallback.trim().is_empty() {
            return Err(MediaError::InvalidConfig("fallback must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MediaConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_quality, 80);
        assert_eq!(config.observer.root_margin_px, 50);
        assert!(config.placeholder.contains("Loading"));
        assert!(config.fallback.contains("Image Unavailable"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            MediaConfig::from_json_str(r#"{"host": "https://cdn.example.com/", "default_quality": 60}"#)
                .unwrap();
        assert_eq!(config.host, "https://cdn.example.com");
        assert_eq!(config.default_quality, 60);
        assert_eq!(config.fallback, FALLBACK_PLACEHOLDER);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(MediaConfig::from_json_str(r#"{"default_quality": 0}"#).is_err());
        assert!(MediaConfig::from_json_str(r#"{"host": "not a url"}"#).is_err());
        assert!(MediaConfig::from_json_str(r#"{"host": "https://cdn.example.com?x=1"}"#).is_err());
        assert!(MediaConfig::from_json_str(r#"{"fallback": "  "}"#).is_err());
        assert!(MediaConfig::from_json_str(r#"{"observer": {"threshold": 2.0}}"#).is_err());
        assert!(MediaConfig::from_json_str("{").is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.json");
        std::fs::write(&path, r#"{"observer": {"root_margin_px": 120}}"#).unwrap();

        let config = MediaConfig::from_json_file(&path).unwrap();
        assert_eq!(config.observer.root_margin_px, 120);
        assert!((config.observer.threshold - 0.01).abs() < f32::EPSILON);
    }
}
