//! Visibility notification: the host capability that tells a loader its
//! element is about to scroll into view.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Weak;

use serde::{Deserialize, Serialize};

/// Observer tuning. The margin grows the viewport so loads start before the
/// element is actually on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverOptions {
    pub root_margin_px: u32,
    /// Minimum fraction of the element inside the grown viewport.
    pub threshold: f32,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            root_margin_px: 50,
            threshold: 0.01,
        }
    }
}

/// Vertical extent of the visible region, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub top: i64,
    pub height: u32,
}

/// Vertical extent of an element, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementBox {
    pub top: i64,
    pub height: u32,
}

/// One visibility observation for one element.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub target: String,
    pub is_intersecting: bool,
    pub ratio: f32,
}

impl IntersectionEntry {
    /// Fully visible.
    pub fn visible(target: &str) -> Self {
        Self {
            target: target.to_string(),
            is_intersecting: true,
            ratio: 1.0,
        }
    }

    /// Completely out of range.
    pub fn hidden(target: &str) -> Self {
        Self {
            target: target.to_string(),
            is_intersecting: false,
            ratio: 0.0,
        }
    }
}

impl ObserverOptions {
    /// Intersect an element with the viewport grown by the root margin.
    pub fn intersect(&self, target: &str, viewport: Viewport, element: ElementBox) -> IntersectionEntry {
        let margin = i64::from(self.root_margin_px);
        let root_top = viewport.top - margin;
        let root_bottom = viewport.top + i64::from(viewport.height) + margin;
        let el_top = element.top;
        let el_bottom = element.top + i64::from(element.height);

        if element.height == 0 {
            let inside = el_top >= root_top && el_top <= root_bottom;
            return IntersectionEntry {
                target: target.to_string(),
                is_intersecting: inside,
                ratio: if inside { 1.0 } else { 0.0 },
            };
        }

        let overlap = (el_bottom.min(root_bottom) - el_top.max(root_top)).max(0);
        IntersectionEntry {
            target: target.to_string(),
            is_intersecting: overlap > 0,
            ratio: overlap as f32 / element.height as f32,
        }
    }

    /// Whether an entry crosses this observer's threshold.
    pub fn admits(&self, entry: &IntersectionEntry) -> bool {
        entry.is_intersecting && entry.ratio >= self.threshold
    }
}

/// Receiving side of a visibility trigger. Implemented by loaders.
pub(crate) trait Reveal {
    fn reveal(&self);
    fn is_live(&self) -> bool;
}

/// Handle a notifier invokes when its element becomes visible.
///
/// Holds the loader weakly; firing after teardown does nothing.
#[derive(Clone)]
pub struct VisibilityTrigger {
    target: Weak<dyn Reveal>,
}

impl VisibilityTrigger {
    pub(crate) fn new(target: Weak<dyn Reveal>) -> Self {
        Self { target }
    }

    /// Deliver an observation. Returns `true` if it reached a live loader.
    pub fn fire(&self, entry: &IntersectionEntry) -> bool {
        if !entry.is_intersecting {
            return false;
        }
        match self.target.upgrade() {
            Some(target) if target.is_live() => {
                target.reveal();
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self) -> bool {
        self.target.upgrade().is_some_and(|t| t.is_live())
    }
}

impl fmt::Debug for VisibilityTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisibilityTrigger")
            .field("live", &self.is_live())
            .finish()
    }
}

/// Registration token returned by [`VisibilityNotifier::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchId(u64);

/// Host-provided visibility notification.
pub trait VisibilityNotifier {
    fn observe(&self, target: &str, options: ObserverOptions, trigger: VisibilityTrigger) -> WatchId;
    /// Cancel a registration. Unknown ids are ignored.
    fn unobserve(&self, id: WatchId);
}

struct Watch {
    target: String,
    options: ObserverOptions,
    trigger: VisibilityTrigger,
}

/// Notifier driven explicitly by its owner, synchronously.
///
/// Triggers are collected before any of them fires, so a loader may
/// unobserve from inside its own trigger.
#[derive(Default)]
pub struct ManualNotifier {
    next_id: Cell<u64>,
    watches: RefCell<BTreeMap<WatchId, Watch>>,
}

impl ManualNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observed_count(&self) -> usize {
        self.watches.borrow().len()
    }

    pub fn is_observing(&self, target: &str) -> bool {
        self.watches.borrow().values().any(|w| w.target == target)
    }

    /// Deliver a batch of observations. Returns how many triggers fired.
    pub fn deliver(&self, entries: &[IntersectionEntry]) -> usize {
        let due: Vec<(VisibilityTrigger, IntersectionEntry)> = {
            let mut watches = self.watches.borrow_mut();
            watches.retain(|_, w| w.trigger.is_live());
            let mut due = Vec::new();
            for entry in entries {
                for watch in watches.values() {
                    if watch.target == entry.target && watch.options.admits(entry) {
                        due.push((watch.trigger.clone(), entry.clone()));
                    }
                }
            }
            due
        };

        due.iter().filter(|(trigger, entry)| trigger.fire(entry)).count()
    }

    /// Report `target` as fully visible.
    pub fn reveal(&self, target: &str) -> usize {
        self.deliver(&[IntersectionEntry::visible(target)])
    }

    /// Report every observed element as fully visible.
    pub fn reveal_all(&self) -> usize {
        let targets: Vec<String> = self
            .watches
            .borrow()
            .values()
            .map(|w| w.target.clone())
            .collect();
        let entries: Vec<IntersectionEntry> =
            targets.iter().map(|t| IntersectionEntry::visible(t)).collect();
        self.deliver(&entries)
    }

    /// Compute intersections for every observed element at a scroll position.
    pub fn scroll<F>(&self, viewport: Viewport, layout: F) -> usize
    where
        F: Fn(&str) -> Option<ElementBox>,
    {
        let entries: Vec<IntersectionEntry> = self
            .watches
            .borrow()
            .values()
            .filter_map(|w| {
                layout(&w.target).map(|bounds| w.options.intersect(&w.target, viewport, bounds))
            })
            .collect();
        self.deliver(&entries)
    }
}

impl VisibilityNotifier for ManualNotifier {
    fn observe(&self, target: &str, options: ObserverOptions, trigger: VisibilityTrigger) -> WatchId {
        let id = WatchId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.watches.borrow_mut().insert(
            id,
            Watch {
                target: target.to_string(),
                options,
                trigger,
            },
        );
        tracing::debug!("Observing '{target}' as {id:?}");
        id
    }

    fn unobserve(&self, id: WatchId) {
        if self.watches.borrow_mut().remove(&id).is_some() {
            tracing::debug!("Unobserved {id:?}");
        }
    }
}

impl fmt::Debug for ManualNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualNotifier")
            .field("observed", &self.observed_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Viewport = Viewport { top: 0, height: 800 };

    #[test]
    fn test_margin_triggers_before_fold() {
        let options = ObserverOptions::default();
        // 30px below the fold: inside the 50px lead margin
        let near = options.intersect("a", VIEW, ElementBox { top: 830, height: 200 });
        assert!(near.is_intersecting);
        assert!(options.admits(&near));

        // 60px below the fold: outside it
        let far = options.intersect("b", VIEW, ElementBox { top: 860, height: 200 });
        assert!(!far.is_intersecting);
        assert!(!options.admits(&far));
    }

    #[test]
    fn test_threshold_filters_slivers() {
        let options = ObserverOptions {
            root_margin_px: 0,
            threshold: 0.5,
        };
        let sliver = options.intersect("a", VIEW, ElementBox { top: 700, height: 1000 });
        assert!(sliver.is_intersecting);
        assert!((sliver.ratio - 0.1).abs() < 1e-6);
        assert!(!options.admits(&sliver));
    }

    #[test]
    fn test_zero_height_element() {
        let options = ObserverOptions::default();
        assert!(options.intersect("a", VIEW, ElementBox { top: 10, height: 0 }).is_intersecting);
        assert!(!options.intersect("a", VIEW, ElementBox { top: 900, height: 0 }).is_intersecting);
    }

    #[test]
    fn test_hidden_entry_never_fires() {
        let notifier = ManualNotifier::new();
        assert_eq!(notifier.deliver(&[IntersectionEntry::hidden("a")]), 0);
        assert_eq!(notifier.reveal("nobody"), 0);
    }
}
