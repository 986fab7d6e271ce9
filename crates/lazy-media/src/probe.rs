//! Out-of-band media loads and their single-shot completion channel.

use std::fmt;
use std::rc::Weak;

use base64::Engine;
use image::GenericImageView;
use serde::Serialize;

use crate::types::{LoadState, MediaError, MediaResult};

/// Result of fetching and decoding a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Network or decode failure, with a reason for the log.
    Failed(String),
}

/// What happened to a completion when it was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The loader transitioned to the given state.
    Applied(LoadState),
    /// The element fired while the loader was still assigning its source.
    /// The outcome is applied as soon as that assignment returns.
    Deferred,
    /// The loader was alive but no longer waiting for this load.
    Stale,
    /// The loader was torn down or its element left the page. Nothing was touched.
    Detached,
}

/// Receiving side of a completion. Implemented by loaders.
pub(crate) trait Settle {
    fn settle(&self, locator: &str, outcome: LoadOutcome) -> Delivery;
    fn is_live(&self) -> bool;
}

/// Single-shot completion handed to whatever performs a load.
///
/// Completing consumes the callback, so it fires at most once. The loader is
/// held weakly: once it is torn down, completion is a no-op that reports
/// [`Delivery::Detached`].
pub struct ProbeCallback {
    locator: String,
    target: Option<Weak<dyn Settle>>,
}

impl ProbeCallback {
    pub(crate) fn new(locator: &str, target: Weak<dyn Settle>) -> Self {
        Self {
            locator: locator.to_string(),
            target: Some(target),
        }
    }

    /// A callback nobody listens to. Used for warm-up loads.
    pub fn detached(locator: &str) -> Self {
        Self {
            locator: locator.to_string(),
            target: None,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether a completion would still reach a live loader.
    pub fn is_live(&self) -> bool {
        self.target
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|t| t.is_live())
    }

    pub fn complete(self, outcome: LoadOutcome) -> Delivery {
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(target) => target.settle(&self.locator, outcome),
            None => {
                tracing::debug!("Dropped completion for {} (no listener)", self.locator);
                Delivery::Detached
            }
        }
    }
}

impl fmt::Debug for ProbeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeCallback")
            .field("locator", &self.locator)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Starts a fire-and-forget load of a locator.
///
/// Implementations must eventually complete the callback, synchronously or
/// later from the same event loop. There is no cancellation.
pub trait MediaProbe {
    fn begin(&self, callback: ProbeCallback);
}

/// Probe for hosts without a network: resolves `data:` locators in place and
/// fails everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineProbe;

impl MediaProbe for InlineProbe {
    fn begin(&self, callback: ProbeCallback) {
        let outcome = if is_data_url(callback.locator()) {
            probe_data_url(callback.locator())
        } else {
            LoadOutcome::Failed(format!("No network transport for {}", callback.locator()))
        };
        callback.complete(outcome);
    }
}

/// Description of a payload that passed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadInfo {
    pub format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub fn is_data_url(locator: &str) -> bool {
    locator
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Decode and verify an inline `data:` locator.
pub fn probe_data_url(locator: &str) -> LoadOutcome {
    match decode_data_url(locator).and_then(|(mime, bytes)| verify_payload(Some(&mime), &bytes)) {
        Ok(_) => LoadOutcome::Loaded,
        Err(e) => LoadOutcome::Failed(e.to_string()),
    }
}

/// Split a `data:` URL into its media type and decoded bytes.
pub fn decode_data_url(locator: &str) -> MediaResult<(String, Vec<u8>)> {
    if !is_data_url(locator) {
        return Err(MediaError::InvalidDataUrl("missing data: scheme".to_string()));
    }
    let (meta, payload) = locator[5..]
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidDataUrl("missing ',' separator".to_string()))?;

    let (meta, is_base64) = match meta.strip_suffix(";base64") {
        Some(stripped) => (stripped, true),
        None => (meta, false),
    };
    let mime = meta
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_ascii_lowercase();

    let bytes = if is_base64 {
        let compact: String = percent_decode(payload.as_bytes())
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(char::from)
            .collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| MediaError::InvalidDataUrl(format!("bad base64 payload: {e}")))?
    } else {
        percent_decode(payload.as_bytes())
    };

    Ok((mime, bytes))
}

/// Check that a payload is a renderable image.
///
/// SVG is accepted by content type or sniffed markup as long as it contains
/// an `<svg` element; raster formats must fully decode.
pub fn verify_payload(content_type: Option<&str>, bytes: &[u8]) -> MediaResult<PayloadInfo> {
    if bytes.is_empty() {
        return Err(MediaError::UnsupportedPayload("empty body".to_string()));
    }

    let declared_svg = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("svg"));
    if declared_svg || looks_like_markup(bytes) {
        let text = String::from_utf8_lossy(bytes);
        if text.contains("<svg") {
            return Ok(PayloadInfo {
                format: "svg".to_string(),
                width: None,
                height: None,
            });
        }
        return Err(MediaError::UnsupportedPayload(
            "markup without an <svg> element".to_string(),
        ));
    }

    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;
    let (width, height) = img.dimensions();
    Ok(PayloadInfo {
        format: format!("{format:?}").to_ascii_lowercase(),
        width: Some(width),
        height: Some(height),
    })
}

fn looks_like_markup(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(0);
    bytes[start..].first() == Some(&b'<')
}

fn percent_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'%' && i + 2 < input.len() {
            let hex = std::str::from_utf8(&input[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(input[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FALLBACK_PLACEHOLDER, LOADING_PLACEHOLDER};

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(4, 3);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_placeholders_decode_as_svg() {
        for locator in [LOADING_PLACEHOLDER, FALLBACK_PLACEHOLDER] {
            let (mime, bytes) = decode_data_url(locator).unwrap();
            assert_eq!(mime, "image/svg+xml");
            assert_eq!(verify_payload(Some(&mime), &bytes).unwrap().format, "svg");
        }
    }

    #[test]
    fn test_base64_png_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes());
        let locator = format!("data:image/png;base64,{encoded}");
        assert_eq!(probe_data_url(&locator), LoadOutcome::Loaded);

        let (_, bytes) = decode_data_url(&locator).unwrap();
        let info = verify_payload(None, &bytes).unwrap();
        assert_eq!(info.format, "png");
        assert_eq!((info.width, info.height), (Some(4), Some(3)));
    }

    #[test]
    fn test_truncated_raster_fails() {
        let bytes = png_bytes();
        assert!(verify_payload(Some("image/png"), &bytes[..bytes.len() / 2]).is_err());
        assert!(verify_payload(None, b"").is_err());
        assert!(verify_payload(Some("text/html"), b"<html>nope</html>").is_err());
    }

    #[test]
    fn test_malformed_data_urls() {
        assert!(decode_data_url("https://x/a.jpg").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(matches!(probe_data_url("data:,hello"), LoadOutcome::Failed(_)));
    }

    #[test]
    fn test_percent_decode_keeps_stray_percent() {
        assert_eq!(percent_decode(b"50%25"), b"50%".to_vec());
        assert_eq!(percent_decode(b"100%"), b"100%".to_vec());
        assert_eq!(percent_decode(b"%zz"), b"%zz".to_vec());
    }

    #[test]
    fn test_detached_callback() {
        let cb = ProbeCallback::detached("https://x/a.jpg");
        assert!(!cb.is_live());
        assert_eq!(cb.complete(LoadOutcome::Loaded), Delivery::Detached);
    }

    #[test]
    fn test_inline_probe_fails_network_locators() {
        // completes synchronously without panicking
        InlineProbe.begin(ProbeCallback::detached("https://x/a.jpg"));
        InlineProbe.begin(ProbeCallback::detached(LOADING_PLACEHOLDER));
    }
}
