//! Boundary between full locators and host-relative photo identifiers.

use url::Url;

/// Classification of a caller-supplied media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoRef {
    /// Host-relative identifier such as `photo-123`.
    Identifier(String),
    /// Absolute URL on the configured host; carries the extracted identifier.
    Hosted(String),
    /// Absolute URL on some other host. Used as-is.
    Foreign(String),
    /// Empty or unusable input.
    Invalid,
}

impl PhotoRef {
    /// Classify `input` against `host` (scheme + authority).
    ///
    /// Hosts are compared on parsed scheme, host and port, so the host
    /// string appearing elsewhere in a URL (a query parameter, a path
    /// segment) does not count as a match.
    pub fn parse(input: &str, host: &str) -> PhotoRef {
        let input = input.trim();
        if input.is_empty() {
            return PhotoRef::Invalid;
        }

        match Url::parse(input) {
            Ok(url) => {
                if url.cannot_be_a_base() {
                    // data:, mailto: and friends
                    return PhotoRef::Foreign(input.to_string());
                }
                match hosted_path(&url, host) {
                    Some("") => PhotoRef::Invalid,
                    Some(id) => PhotoRef::Hosted(id.to_string()),
                    None => PhotoRef::Foreign(input.to_string()),
                }
            }
            Err(_) => normalize_identifier(input)
                .map(|id| PhotoRef::Identifier(id.to_string()))
                .unwrap_or(PhotoRef::Invalid),
        }
    }

    /// Identifier usable for responsive synthesis, if any.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            PhotoRef::Identifier(id) | PhotoRef::Hosted(id) => Some(id),
            PhotoRef::Foreign(_) | PhotoRef::Invalid => None,
        }
    }
}

/// Strip leading slashes; reject identifiers that are empty or contain
/// characters that would break out of the path segment.
pub fn normalize_identifier(id: &str) -> Option<&str> {
    let id = id.trim().trim_start_matches('/');
    if id.is_empty() || id.contains(['?', '#', ' ']) {
        return None;
    }
    Some(id)
}

/// Path of `url` below `host`, without leading slashes. `None` when the
/// origin differs or the path is outside the host's own path prefix.
fn hosted_path<'a>(url: &'a Url, host: &str) -> Option<&'a str> {
    let host_url = Url::parse(host).ok()?;
    let same_origin = url.scheme() == host_url.scheme()
        && url.host_str() == host_url.host_str()
        && url.port_or_known_default() == host_url.port_or_known_default();
    if !same_origin {
        return None;
    }
    let prefix = host_url.path().trim_end_matches('/');
    let rest = url.path().strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        // `/imgx/...` is not under `/img`
        return None;
    }
    Some(rest.trim_start_matches('/'))
}
