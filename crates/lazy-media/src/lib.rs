//! LazyMedia: responsive image URL synthesis, a shared failure cache, and
//! visibility-deferred media loading.

pub mod breakpoints;
pub mod catalog;
pub mod config;
pub mod element;
pub mod failures;
pub mod loader;
pub mod locator;
pub mod notifier;
pub mod probe;
pub mod resolver;
pub mod types;

pub use breakpoints::{Breakpoint, BREAKPOINTS};
pub use catalog::CatalogSection;
pub use config::MediaConfig;
pub use element::{css_url, MediaElement, VirtualElement};
pub use failures::FailureCache;
pub use loader::{HostEnv, LazyImage, LazyImageOptions};
pub use locator::PhotoRef;
pub use notifier::{
    ElementBox, IntersectionEntry, ManualNotifier, ObserverOptions, Viewport, VisibilityNotifier,
    VisibilityTrigger, WatchId,
};
pub use probe::{
    decode_data_url, verify_payload, Delivery, InlineProbe, LoadOutcome, MediaProbe,
    PayloadInfo, ProbeCallback,
};
pub use resolver::UrlResolver;
pub use types::*;
