//! Element handle abstraction and an in-memory element for hosts without a DOM.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::probe::ProbeCallback;

/// Style property holding a background-style target's locator.
pub const BACKGROUND_IMAGE: &str = "background-image";

/// The operations the media layer performs on a rendered element.
///
/// Mirrors a renderer API: attributes, inline styles and a class list, plus
/// a one-shot load listener for elements that load their own source.
pub trait MediaElement {
    /// Stable identity used when registering with a visibility notifier.
    fn id(&self) -> &str;
    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&str>;
    fn set_attribute(&mut self, name: &str, value: &str);

    fn style(&self, property: &str) -> Option<&str>;
    fn set_style(&mut self, property: &str, value: &str);

    fn has_class(&self, class: &str) -> bool;
    fn add_class(&mut self, class: &str);
    fn remove_class(&mut self, class: &str);

    /// Attach a handler fired once by the element's own load or error event.
    /// The handler is detached as it fires. It may fire from inside the
    /// `src` assignment that follows (a cached image); it must not fire
    /// from inside `listen_once` itself.
    fn listen_once(&mut self, callback: ProbeCallback);

    /// Whether the element carries a `src` attribute of its own.
    fn accepts_source(&self) -> bool {
        self.tag_name().eq_ignore_ascii_case("img")
    }
}

/// CSS `url(...)` value for a locator. Single quotes are percent-encoded so
/// they cannot terminate the quoted string.
pub fn css_url(locator: &str) -> String {
    format!("url('{}')", locator.replace('\'', "%27"))
}

/// Swap one class for another.
pub fn swap_class(element: &mut dyn MediaElement, from: &str, to: &str) {
    element.remove_class(from);
    element.add_class(to);
}

/// A plain in-memory element.
#[derive(Debug, Default, Serialize)]
pub struct VirtualElement {
    id: String,
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    classes: Vec<String>,
    #[serde(skip)]
    listener: Option<ProbeCallback>,
}

impl VirtualElement {
    pub fn new(id: &str, tag: &str) -> Self {
        Self {
            id: id.to_string(),
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// An `<img>` element.
    pub fn img(id: &str) -> Self {
        Self::new(id, "img")
    }

    /// A `<div>` element, usually a background-style target.
    pub fn div(id: &str) -> Self {
        Self::new(id, "div")
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Detach the pending load listener, if any, so the host can settle it.
    pub fn take_listener(&mut self) -> Option<ProbeCallback> {
        self.listener.take()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Current `background-image` value.
    pub fn background(&self) -> Option<&str> {
        self.style(BACKGROUND_IMAGE)
    }
}

impl MediaElement for VirtualElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn tag_name(&self) -> &str {
        &self.tag
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    fn set_style(&mut self, property: &str, value: &str) {
        self.styles.insert(property.to_string(), value.to_string());
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    fn listen_once(&mut self, callback: ProbeCallback) {
        if self.listener.replace(callback).is_some() {
            tracing::debug!("Replaced pending load listener on '{}'", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_url_quotes() {
        assert_eq!(css_url("https://x/a.jpg"), "url('https://x/a.jpg')");
        assert_eq!(css_url("a'b"), "url('a%27b')");
    }

    #[test]
    fn test_class_list_is_a_set() {
        let mut el = VirtualElement::div("hero");
        el.add_class("lazy-loading");
        el.add_class("lazy-loading");
        assert_eq!(el.classes().len(), 1);
        swap_class(&mut el, "lazy-loading", "lazy-loaded");
        assert!(!el.has_class("lazy-loading"));
        assert!(el.has_class("lazy-loaded"));
    }

    #[test]
    fn test_accepts_source_by_tag() {
        assert!(VirtualElement::new("a", "IMG").accepts_source());
        assert!(!VirtualElement::div("b").accepts_source());
    }
}
