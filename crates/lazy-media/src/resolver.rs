//! Locator synthesis and the shared failure cache.

use std::collections::BTreeSet;

use crate::breakpoints;
use crate::catalog::{self, CatalogSection};
use crate::config::MediaConfig;
use crate::element::{css_url, MediaElement, BACKGROUND_IMAGE};
use crate::failures::FailureCache;
use crate::locator::{normalize_identifier, PhotoRef};
use crate::probe::{MediaProbe, ProbeCallback};
use crate::types::{ResponsiveDescriptor, SrcsetEntry, ERROR_INDICATOR_CLASS};

/// Widths offered in a generated source set.
pub const SRCSET_WIDTHS: [u32; 5] = [400, 800, 1200, 1600, 1920];

/// Width at which a source set's base height applies unscaled.
const SRCSET_REFERENCE_WIDTH: f64 = 800.0;

/// Default base height for [`UrlResolver::responsive_srcset`].
pub const DEFAULT_SRCSET_BASE_HEIGHT: u32 = 500;

/// Resolves categories and identifiers to locators and remembers which
/// locators failed to load.
///
/// Created once per application and shared (by `Rc`) with every loader.
/// Nothing here returns an error: unknown or malformed input resolves to
/// the fallback locator.
#[derive(Debug)]
pub struct UrlResolver {
    config: MediaConfig,
    failures: FailureCache,
}

impl UrlResolver {
    pub fn new(config: MediaConfig) -> Self {
        let failures = FailureCache::new(&config.fallback);
        tracing::debug!("Media resolver ready for host {}", config.host);
        Self { config, failures }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn placeholder(&self) -> &str {
        &self.config.placeholder
    }

    pub fn fallback(&self) -> &str {
        &self.config.fallback
    }

    pub fn failures(&self) -> &FailureCache {
        &self.failures
    }

    /// Internship category image by exact name.
    pub fn category_image(&self, category: &str) -> String {
        self.section_image(CatalogSection::Internships, category)
    }

    /// Course image chosen by the first keyword (`program`, `design`,
    /// `business`, `data`, `market`) found in the category, ignoring case.
    pub fn course_category_image(&self, category: &str) -> String {
        match catalog::course_key_for(category) {
            Some(key) => self.section_image(CatalogSection::Courses, key),
            None => self.fallback().to_string(),
        }
    }

    /// Image for an exact key in any catalog section.
    pub fn section_image(&self, section: CatalogSection, key: &str) -> String {
        match section.lookup(key) {
            Some((_, id, width, height)) => self.responsive_image(id, *width, *height),
            None => self.fallback().to_string(),
        }
    }

    /// `{host}/{id}?w=..&h=..&q=..&fit=crop&auto=format` at the default quality.
    pub fn responsive_image(&self, id: &str, width: u32, height: u32) -> String {
        self.responsive_image_with_quality(id, width, height, self.config.default_quality)
    }

    pub fn responsive_image_with_quality(
        &self,
        id: &str,
        width: u32,
        height: u32,
        quality: u8,
    ) -> String {
        let descriptor = ResponsiveDescriptor::new(width, height).with_quality(quality);
        self.locator_for(id, &descriptor)
    }

    fn locator_for(&self, id: &str, descriptor: &ResponsiveDescriptor) -> String {
        match normalize_identifier(id) {
            Some(id) => format!("{}/{}?{}", self.config.host, id, descriptor.query()),
            None => self.fallback().to_string(),
        }
    }

    /// One entry per width in [`SRCSET_WIDTHS`], heights scaled from
    /// `base_height` at an 800px reference width.
    pub fn responsive_descriptors(&self, id: &str, base_height: u32) -> Vec<SrcsetEntry> {
        if normalize_identifier(id).is_none() {
            return Vec::new();
        }
        SRCSET_WIDTHS
            .iter()
            .map(|&width| {
                let height =
                    (f64::from(base_height) / SRCSET_REFERENCE_WIDTH * f64::from(width)).round() as u32;
                let descriptor = ResponsiveDescriptor::new(width, height)
                    .with_quality(self.config.default_quality);
                SrcsetEntry {
                    url: self.locator_for(id, &descriptor),
                    descriptor,
                }
            })
            .collect()
    }

    /// Comma-separated `srcset` value. Malformed identifiers yield the fallback alone.
    pub fn responsive_srcset(&self, id: &str, base_height: u32) -> String {
        let entries = self.responsive_descriptors(id, base_height);
        if entries.is_empty() {
            return self.fallback().to_string();
        }
        entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Rendition sized for the breakpoint tier of `viewport_width`.
    pub fn optimized_url(&self, id: &str, viewport_width: u32) -> String {
        let tier = breakpoints::select(viewport_width);
        self.responsive_image(id, tier.width, tier.height)
    }

    pub fn photo_ref(&self, input: &str) -> PhotoRef {
        PhotoRef::parse(input, self.host())
    }

    /// Re-synthesize a locator at new dimensions.
    ///
    /// Identifiers and locators on the configured host are rebuilt; other
    /// absolute URLs pass through untouched; unusable input gives the fallback.
    pub fn reframe(&self, locator: &str, width: u32, height: u32) -> String {
        match self.photo_ref(locator) {
            PhotoRef::Identifier(id) | PhotoRef::Hosted(id) => {
                self.responsive_image(&id, width, height)
            }
            PhotoRef::Foreign(url) => url,
            PhotoRef::Invalid => self.fallback().to_string(),
        }
    }

    /// Swap a failed image element to the fallback.
    ///
    /// Records the element's current `src`, replaces it with the fallback and
    /// tags the element. Returns `false` (and does nothing) when the element
    /// already shows the fallback.
    pub fn handle_error(&self, element: &mut dyn MediaElement) -> bool {
        let current = element.attribute("src").map(str::to_string);
        if current.as_deref() == Some(self.fallback()) {
            return false;
        }
        if let Some(src) = current.as_deref() {
            self.failures.record(src);
        }
        element.set_attribute("src", self.fallback());
        element.add_class(ERROR_INDICATOR_CLASS);
        tracing::debug!("Element '{}' fell back after load failure", element.id());
        true
    }

    /// Background-style counterpart of [`UrlResolver::handle_error`]. The
    /// failed locator is passed explicitly because the element still shows
    /// its placeholder while the probe runs.
    pub fn handle_background_error(&self, element: &mut dyn MediaElement, failed: &str) -> bool {
        let fallback_css = css_url(self.fallback());
        if element.style(BACKGROUND_IMAGE) == Some(fallback_css.as_str()) {
            return false;
        }
        self.failures.record(failed);
        element.set_style(BACKGROUND_IMAGE, &fallback_css);
        element.add_class(ERROR_INDICATOR_CLASS);
        tracing::debug!("Element '{}' background fell back after load failure", element.id());
        true
    }

    pub fn has_failed(&self, locator: &str) -> bool {
        self.failures.contains(locator)
    }

    /// Forget every failure so those locators are attempted again.
    pub fn clear_failed_cache(&self) {
        self.failures.clear();
    }

    /// Warm up every locator not known to fail. Fire-and-forget.
    pub fn preload<S: AsRef<str>>(&self, locators: &[S], probe: &dyn MediaProbe) {
        let mut seen = BTreeSet::new();
        let mut started = 0usize;
        for locator in locators.iter().map(AsRef::as_ref) {
            if locator.trim().is_empty() || self.has_failed(locator) || !seen.insert(locator) {
                continue;
            }
            probe.begin(ProbeCallback::detached(locator));
            started += 1;
        }
        tracing::debug!("Preloading {started} of {} locators", locators.len());
    }
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(MediaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::element::VirtualElement;
    use crate::probe::LoadOutcome;

    const HOST: &str = "https://images.unsplash.com";

    #[derive(Default)]
    struct CountingProbe {
        started: RefCell<Vec<String>>,
    }

    impl MediaProbe for CountingProbe {
        fn begin(&self, callback: ProbeCallback) {
            self.started.borrow_mut().push(callback.locator().to_string());
            callback.complete(LoadOutcome::Loaded);
        }
    }

    #[test]
    fn test_unknown_categories_fall_back() {
        let resolver = UrlResolver::default();
        assert_eq!(resolver.category_image("Unknown Category"), resolver.fallback());
        assert_eq!(resolver.category_image(""), resolver.fallback());
        assert_eq!(resolver.course_category_image("Unknown Category"), resolver.fallback());
        assert_eq!(
            resolver.section_image(CatalogSection::Hero, "missing"),
            resolver.fallback()
        );
    }

    #[test]
    fn test_known_categories() {
        let resolver = UrlResolver::default();
        assert_eq!(
            resolver.category_image("Software Development"),
            format!("{HOST}/photo-1498050108023-c5249f4df085?w=800&h=500&q=80&fit=crop&auto=format")
        );
        assert_eq!(
            resolver.course_category_image("intro to PROGRAMMING"),
            format!("{HOST}/photo-1517694712202-14dd9538aa97?w=800&h=400&q=80&fit=crop&auto=format")
        );
        assert!(resolver
            .section_image(CatalogSection::Hero, "home")
            .ends_with("?w=1920&h=1080&q=80&fit=crop&auto=format"));
    }

    #[test]
    fn test_responsive_image_byte_exact() {
        let resolver = UrlResolver::default();
        assert_eq!(
            resolver.responsive_image_with_quality("photo-123", 800, 600, 80),
            format!("{HOST}/photo-123?w=800&h=600&q=80&fit=crop&auto=format")
        );
        assert_eq!(
            resolver.responsive_image("/photo-123", 800, 600),
            format!("{HOST}/photo-123?w=800&h=600&q=80&fit=crop&auto=format")
        );
        assert_eq!(resolver.responsive_image("", 800, 600), resolver.fallback());
    }

    #[test]
    fn test_srcset_heights() {
        let resolver = UrlResolver::default();
        let entries = resolver.responsive_descriptors("photo-123", 500);
        let dims: Vec<(u32, u32)> = entries
            .iter()
            .map(|e| (e.descriptor.width, e.descriptor.height))
            .collect();
        assert_eq!(
            dims,
            vec![(400, 250), (800, 500), (1200, 750), (1600, 1000), (1920, 1200)]
        );

        let srcset = resolver.responsive_srcset("photo-123", 500);
        assert!(srcset.starts_with(&format!(
            "{HOST}/photo-123?w=400&h=250&q=80&fit=crop&auto=format 400w, "
        )));
        assert!(srcset.contains("800w"));
        assert!(srcset.contains("1200w"));
        assert_eq!(srcset.matches(", ").count(), 4);
    }

    #[test]
    fn test_srcset_rounds_heights() {
        let resolver = UrlResolver::default();
        // 514 / 800 * 1920 = 1233.6
        let entries = resolver.responsive_descriptors("p", 514);
        assert_eq!(entries[0].descriptor.height, 257);
        assert_eq!(entries[4].descriptor.height, 1234);
        assert_eq!(resolver.responsive_srcset(" ", 500), resolver.fallback());
    }

    #[test]
    fn test_optimized_url_tiers() {
        let resolver = UrlResolver::default();
        assert!(resolver.optimized_url("p", 480).contains("w=480&h=300"));
        assert!(resolver.optimized_url("p", 768).contains("w=768&h=400"));
        assert!(resolver.optimized_url("p", 1920).contains("w=1920&h=1080"));
    }

    #[test]
    fn test_reframe() {
        let resolver = UrlResolver::default();
        let original = resolver.category_image("Data Science");
        assert_eq!(
            resolver.reframe(&original, 400, 250),
            format!("{HOST}/photo-1551288049-bebda4e38f71?w=400&h=250&q=80&fit=crop&auto=format")
        );
        assert_eq!(resolver.reframe("https://x/a.jpg", 1, 1), "https://x/a.jpg");
        assert_eq!(resolver.reframe("", 1, 1), resolver.fallback());
    }

    #[test]
    fn test_reframe_under_host_with_path() {
        let config = MediaConfig::default().with_host("https://cdn.example.com/img/").unwrap();
        let resolver = UrlResolver::new(config);
        let original = resolver.responsive_image("photo-1", 800, 500);
        assert_eq!(
            original,
            "https://cdn.example.com/img/photo-1?w=800&h=500&q=80&fit=crop&auto=format"
        );
        assert_eq!(
            resolver.reframe(&original, 400, 250),
            "https://cdn.example.com/img/photo-1?w=400&h=250&q=80&fit=crop&auto=format"
        );
    }

    #[test]
    fn test_handle_error_idempotent() {
        let resolver = UrlResolver::default();
        let mut img = VirtualElement::img("card");
        img.set_attribute("src", "https://example.com/test.jpg");

        assert!(resolver.handle_error(&mut img));
        assert!(!resolver.handle_error(&mut img));

        assert_eq!(img.attribute("src"), Some(resolver.fallback()));
        assert!(img.has_class(ERROR_INDICATOR_CLASS));
        assert_eq!(resolver.failures().snapshot(), vec!["https://example.com/test.jpg"]);
    }

    #[test]
    fn test_background_error_idempotent() {
        let resolver = UrlResolver::default();
        let mut div = VirtualElement::div("hero");
        assert!(resolver.handle_background_error(&mut div, "https://x/a.jpg"));
        assert!(!resolver.handle_background_error(&mut div, "https://x/a.jpg"));
        assert_eq!(div.background(), Some(css_url(resolver.fallback()).as_str()));
        assert_eq!(resolver.failures().len(), 1);
    }

    #[test]
    fn test_failed_until_cleared() {
        let resolver = UrlResolver::default();
        assert!(!resolver.has_failed("https://example.com/test.jpg"));

        let mut img = VirtualElement::img("card");
        img.set_attribute("src", "https://example.com/test.jpg");
        resolver.handle_error(&mut img);
        assert!(resolver.has_failed("https://example.com/test.jpg"));

        resolver.clear_failed_cache();
        assert!(!resolver.has_failed("https://example.com/test.jpg"));
    }

    #[test]
    fn test_fallback_src_is_not_recorded() {
        let resolver = UrlResolver::default();
        let mut img = VirtualElement::img("card");
        img.set_attribute("src", resolver.fallback());
        assert!(!resolver.handle_error(&mut img));
        assert!(!resolver.has_failed(resolver.fallback()));
    }

    #[test]
    fn test_preload_skips_failed_and_duplicates() {
        let resolver = UrlResolver::default();
        resolver.failures().record("https://x/bad.jpg");
        let probe = CountingProbe::default();

        resolver.preload(
            &["https://x/a.jpg", "https://x/bad.jpg", "https://x/a.jpg", "", "https://x/b.jpg"],
            &probe,
        );

        assert_eq!(
            *probe.started.borrow(),
            vec!["https://x/a.jpg".to_string(), "https://x/b.jpg".to_string()]
        );
    }
}
