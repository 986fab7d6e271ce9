//! Page simulator: attaches a loader per element of a JSON page description
//! and scrolls through it, letting the probe settle after every step.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use lazy_media::element::BACKGROUND_IMAGE;
use lazy_media::{
    CatalogSection, ElementBox, HostEnv, LazyImage, LazyImageOptions, ManualNotifier, MediaElement,
    MediaProbe, TargetKind, UrlResolver, Viewport, VirtualElement,
};

use crate::http_probe::{HttpProbe, ProbeStats};

/// Viewport the page is rendered at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PageViewport {
    pub width: u32,
    pub height: u32,
}

impl Default for PageViewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Where an element's media comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// A literal locator.
    Url(String),
    /// Internship category name.
    Category(String),
    /// Course category name, matched by keyword.
    Course(String),
    /// Any catalog entry.
    Catalog { section: String, key: String },
    /// Photo identifier sized for the page viewport.
    Photo(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementLayout {
    pub id: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default = "default_target")]
    pub target: TargetKind,
    #[serde(default)]
    pub source: Option<MediaSource>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default = "default_true")]
    pub placeholder: bool,
    pub top: i64,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Scroll step at which the element leaves the page.
    #[serde(default)]
    pub removed_at_step: Option<usize>,
}

fn default_tag() -> String {
    "div".to_string()
}

fn default_target() -> TargetKind {
    TargetKind::Background
}

fn default_true() -> bool {
    true
}

fn default_height() -> u32 {
    300
}

/// A whole page: viewport, elements, and the scroll offsets to visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    #[serde(default)]
    pub viewport: PageViewport,
    pub elements: Vec<ElementLayout>,
    #[serde(default)]
    pub scroll: Vec<i64>,
}

impl PageLayout {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let page: PageLayout = serde_json::from_str(json)?;
        page.check()?;
        Ok(page)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading page {}", path.display()))?;
        Self::from_json_str(&text)
    }

    fn check(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for element in &self.elements {
            if element.id.trim().is_empty() {
                return Err(anyhow!("element with empty id"));
            }
            if !seen.insert(element.id.as_str()) {
                return Err(anyhow!("duplicate element id '{}'", element.id));
            }
        }
        Ok(())
    }

    /// Scroll offsets to visit. A page without any starts at the top.
    pub fn steps(&self) -> Vec<i64> {
        if self.scroll.is_empty() {
            vec![0]
        } else {
            self.scroll.clone()
        }
    }
}

/// Resolve an element's source into a locator.
pub fn resolve_source(
    resolver: &UrlResolver,
    source: &MediaSource,
    viewport_width: u32,
) -> anyhow::Result<String> {
    Ok(match source {
        MediaSource::Url(url) => url.clone(),
        MediaSource::Category(name) => resolver.category_image(name),
        MediaSource::Course(name) => resolver.course_category_image(name),
        MediaSource::Catalog { section, key } => {
            let section: CatalogSection = section.parse().map_err(|e: String| anyhow!(e))?;
            resolver.section_image(section, key)
        }
        MediaSource::Photo(id) => resolver.optimized_url(id, viewport_width),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub offset: i64,
    pub revealed: usize,
    pub forwarded: usize,
    pub removed: Vec<String>,
    pub settled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementReport {
    pub id: String,
    pub tag: String,
    pub target: TargetKind,
    pub state: String,
    pub classes: Vec<String>,
    /// Current `src`, or `background-image` value for background targets.
    pub locator: Option<String>,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub viewport: PageViewport,
    pub eager: bool,
    pub steps: Vec<StepReport>,
    pub elements: Vec<ElementReport>,
    pub probes: ProbeStats,
    pub failures: Vec<String>,
}

struct Slot {
    layout: ElementLayout,
    element: Rc<RefCell<VirtualElement>>,
    loader: LazyImage<VirtualElement>,
    removed: bool,
}

/// Run a page through every scroll step.
///
/// With `eager` the host supplies no visibility notifier, so every loader
/// starts on attach.
pub async fn simulate(
    page: &PageLayout,
    resolver: Rc<UrlResolver>,
    probe: Rc<HttpProbe>,
    eager: bool,
) -> anyhow::Result<PageReport> {
    let notifier = Rc::new(ManualNotifier::new());
    let mut env = HostEnv::eager(resolver.clone(), probe.clone());
    if !eager {
        env = env.with_notifier(notifier.clone());
    }

    let boxes: BTreeMap<String, ElementBox> = page
        .elements
        .iter()
        .map(|e| {
            (
                e.id.clone(),
                ElementBox {
                    top: e.top,
                    height: e.height,
                },
            )
        })
        .collect();

    let mut slots = Vec::with_capacity(page.elements.len());
    for item in &page.elements {
        let mut options = match &item.source {
            Some(source) => {
                let locator = resolve_source(&resolver, source, page.viewport.width)
                    .with_context(|| format!("element '{}'", item.id))?;
                LazyImageOptions {
                    locator: Some(locator),
                    ..LazyImageOptions::unset(item.target)
                }
            }
            None => LazyImageOptions::unset(item.target),
        };
        if let Some(alt) = &item.alt {
            options = options.with_alt(alt.clone());
        }
        if !item.placeholder {
            options = options.without_placeholder();
        }

        let element = Rc::new(RefCell::new(VirtualElement::new(&item.id, &item.tag)));
        let loader = LazyImage::attach(&element, options, &env);
        slots.push(Slot {
            layout: item.clone(),
            element,
            loader,
            removed: false,
        });
    }
    tracing::info!("Attached {} loaders ({})", slots.len(), if eager { "eager" } else { "lazy" });

    let mut steps = Vec::new();
    for (index, offset) in page.steps().into_iter().enumerate() {
        let viewport = Viewport {
            top: offset,
            height: page.viewport.height,
        };
        let revealed = notifier.scroll(viewport, |id| boxes.get(id).copied());

        // <img> elements load themselves; hand their listeners to the probe
        let mut forwarded = 0;
        for slot in slots.iter().filter(|s| !s.removed) {
            let listener = slot.element.borrow_mut().take_listener();
            if let Some(listener) = listener {
                probe.begin(listener);
                forwarded += 1;
            }
        }

        let mut removed = Vec::new();
        for slot in slots.iter_mut() {
            if !slot.removed && slot.layout.removed_at_step == Some(index) {
                slot.loader.teardown();
                slot.removed = true;
                removed.push(slot.layout.id.clone());
            }
        }

        let settled = probe.settle_all().await;
        tracing::debug!("Step {index} at {offset}px: {revealed} revealed, {settled} settled");
        steps.push(StepReport {
            offset,
            revealed,
            forwarded,
            removed,
            settled,
        });
    }

    let elements = slots.iter().map(element_report).collect();
    Ok(PageReport {
        viewport: page.viewport,
        eager,
        steps,
        elements,
        probes: probe.stats(),
        failures: resolver.failures().snapshot(),
    })
}

fn element_report(slot: &Slot) -> ElementReport {
    let element = slot.element.borrow();
    let locator = match slot.layout.target {
        TargetKind::Background => element.style(BACKGROUND_IMAGE),
        TargetKind::Primary => element.attribute("src"),
    };
    ElementReport {
        id: slot.layout.id.clone(),
        tag: slot.layout.tag.clone(),
        target: slot.layout.target,
        state: slot.loader.state().to_string(),
        classes: element.classes().to_vec(),
        locator: locator.map(str::to_string),
        removed: slot.removed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_defaults() {
        let page = PageLayout::from_json_str(
            r#"{"elements": [{"id": "hero", "top": 0, "source": {"category": "Data Science"}}]}"#,
        )
        .unwrap();
        assert_eq!(page.viewport.width, 1280);
        assert_eq!(page.steps(), vec![0]);
        let hero = &page.elements[0];
        assert_eq!(hero.tag, "div");
        assert_eq!(hero.target, TargetKind::Background);
        assert!(hero.placeholder);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = PageLayout::from_json_str(
            r#"{"elements": [{"id": "a", "top": 0}, {"id": "a", "top": 10}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_resolve_sources() {
        let resolver = UrlResolver::default();
        let photo = resolve_source(&resolver, &MediaSource::Photo("photo-1".to_string()), 700).unwrap();
        assert_eq!(photo, resolver.responsive_image("photo-1", 768, 400));

        let catalog = MediaSource::Catalog {
            section: "about".to_string(),
            key: "team".to_string(),
        };
        assert_eq!(
            resolve_source(&resolver, &catalog, 1280).unwrap(),
            resolver.section_image(CatalogSection::About, "team")
        );

        let bad = MediaSource::Catalog {
            section: "footer".to_string(),
            key: "x".to_string(),
        };
        assert!(resolve_source(&resolver, &bad, 1280).is_err());
    }
}
