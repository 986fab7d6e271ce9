//! Per-element deferred loading driven by visibility.
//!
//! A [`LazyImage`] walks `Idle → Placeholder → Loading → Loaded | Error`:
//!
//! - on attach it shows the placeholder, adds the `lazy-loading` hook and
//!   registers a one-shot trigger with the visibility notifier (or loads
//!   right away when the host has none);
//! - on the first visibility signal it unregisters, then either short-circuits
//!   to the fallback for a locator already known to fail, or starts a load;
//! - the load completes through a [`ProbeCallback`] that checks the loader is
//!   still attached before touching the element.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::element::{css_url, swap_class, MediaElement, BACKGROUND_IMAGE};
use crate::notifier::{Reveal, VisibilityNotifier, VisibilityTrigger, WatchId};
use crate::probe::{Delivery, LoadOutcome, MediaProbe, ProbeCallback, Settle};
use crate::resolver::UrlResolver;
use crate::types::{LoadState, StyleHook, TargetKind};

/// What a loader should show and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyImageOptions {
    pub locator: Option<String>,
    pub target: TargetKind,
    pub alt: Option<String>,
    pub use_placeholder: bool,
}

impl LazyImageOptions {
    /// Load `locator` as the element's background image.
    pub fn background(locator: impl Into<String>) -> Self {
        Self {
            locator: Some(locator.into()),
            target: TargetKind::Background,
            alt: None,
            use_placeholder: true,
        }
    }

    /// Load `locator` as the element's own source.
    pub fn image(locator: impl Into<String>) -> Self {
        Self {
            locator: Some(locator.into()),
            target: TargetKind::Primary,
            alt: None,
            use_placeholder: true,
        }
    }

    /// No locator at all. Loading such an element is a configuration error.
    pub fn unset(target: TargetKind) -> Self {
        Self {
            locator: None,
            target,
            alt: None,
            use_placeholder: true,
        }
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn without_placeholder(mut self) -> Self {
        self.use_placeholder = false;
        self
    }
}

/// Capabilities the host supplies to every loader.
#[derive(Clone)]
pub struct HostEnv {
    pub resolver: Rc<UrlResolver>,
    pub probe: Rc<dyn MediaProbe>,
    /// `None` when the host cannot report visibility; loaders then load eagerly.
    pub notifier: Option<Rc<dyn VisibilityNotifier>>,
}

impl HostEnv {
    /// Environment without visibility notification.
    pub fn eager(resolver: Rc<UrlResolver>, probe: Rc<dyn MediaProbe>) -> Self {
        Self {
            resolver,
            probe,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Rc<dyn VisibilityNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Deferred loader bound to one element. Dropping it tears it down.
pub struct LazyImage<E: MediaElement + 'static> {
    core: Rc<LoaderCore<E>>,
}

struct LoaderCore<E: MediaElement + 'static> {
    this: Weak<LoaderCore<E>>,
    element: Weak<RefCell<E>>,
    element_id: String,
    options: LazyImageOptions,
    env: HostEnv,
    state: Cell<LoadState>,
    watch: Cell<Option<WatchId>>,
    triggered: Cell<bool>,
    torn_down: Cell<bool>,
    /// Set while `begin_load` holds the element borrow.
    writing: Cell<bool>,
    /// Completion that fired while `writing`; applied once the borrow drops.
    deferred: RefCell<Option<(String, LoadOutcome)>>,
}

impl<E: MediaElement + 'static> LazyImage<E> {
    /// Bind a loader to `element`: show the placeholder and wait for visibility.
    pub fn attach(element: &Rc<RefCell<E>>, options: LazyImageOptions, env: &HostEnv) -> Self {
        let element_id = element.borrow().id().to_string();
        let core = Rc::new_cyclic(|this| LoaderCore {
            this: this.clone(),
            element: Rc::downgrade(element),
            element_id,
            options,
            env: env.clone(),
            state: Cell::new(LoadState::Idle),
            watch: Cell::new(None),
            triggered: Cell::new(false),
            torn_down: Cell::new(false),
            writing: Cell::new(false),
            deferred: RefCell::new(None),
        });

        if core.options.target == TargetKind::Primary && !element.borrow().accepts_source() {
            tracing::warn!(
                "Element '{}' <{}> cannot carry a source; lazy loading skipped",
                core.element_id,
                element.borrow().tag_name()
            );
            return Self { core };
        }

        core.show_placeholder(&mut *element.borrow_mut());
        core.watch_or_load();
        Self { core }
    }

    pub fn state(&self) -> LoadState {
        self.core.state.get()
    }

    /// Whether a visibility registration is still outstanding.
    pub fn is_observing(&self) -> bool {
        self.core.watch.get().is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.core.torn_down.get()
    }

    pub fn element_id(&self) -> &str {
        &self.core.element_id
    }

    pub fn options(&self) -> &LazyImageOptions {
        &self.core.options
    }

    /// Act as if the element just became visible.
    pub fn reveal(&self) {
        self.core.reveal();
    }

    /// Disconnect from the notifier. Loads already started keep running, but
    /// their completions no longer reach the element.
    pub fn teardown(&self) {
        self.core.teardown();
    }
}

impl<E: MediaElement + 'static> Drop for LazyImage<E> {
    fn drop(&mut self) {
        self.core.teardown();
    }
}

impl<E: MediaElement + 'static> LoaderCore<E> {
    fn advance(&self, next: LoadState) -> bool {
        let current = self.state.get();
        if !current.can_advance_to(next) {
            tracing::debug!("'{}' ignored {current} -> {next}", self.element_id);
            return false;
        }
        self.state.set(next);
        tracing::debug!("'{}' {current} -> {next}", self.element_id);
        true
    }

    fn show_placeholder(&self, element: &mut E) {
        if self.options.use_placeholder {
            let placeholder = self.env.resolver.placeholder();
            match self.options.target {
                TargetKind::Background => element.set_style(BACKGROUND_IMAGE, &css_url(placeholder)),
                TargetKind::Primary => element.set_attribute("src", placeholder),
            }
        }
        element.add_class(StyleHook::Loading.class_name());
        self.advance(LoadState::Placeholder);
    }

    fn watch_or_load(&self) {
        let Some(notifier) = self.env.notifier.clone() else {
            tracing::debug!("No visibility notifier; loading '{}' eagerly", self.element_id);
            self.reveal();
            return;
        };
        let this: Weak<dyn Reveal> = self.this.clone();
        let options = self.env.resolver.config().observer;
        let id = notifier.observe(&self.element_id, options, VisibilityTrigger::new(this));
        self.watch.set(Some(id));
    }

    fn unwatch(&self) {
        if let (Some(id), Some(notifier)) = (self.watch.take(), self.env.notifier.as_ref()) {
            notifier.unobserve(id);
        }
    }

    fn begin_load(&self) {
        if self.torn_down.get() || self.triggered.replace(true) {
            return;
        }
        // One-shot: unregister before anything else can happen.
        self.unwatch();

        let Some(locator) = self.options.locator.clone().filter(|l| !l.trim().is_empty()) else {
            tracing::warn!("No image URL provided for lazy loading of '{}'", self.element_id);
            return;
        };
        let Some(element) = self.element.upgrade() else {
            return;
        };

        let resolver = &self.env.resolver;
        if resolver.has_failed(&locator) {
            tracing::debug!("Skipping known-failed locator {locator}");
            let mut element = element.borrow_mut();
            let fallback = resolver.fallback();
            match self.options.target {
                TargetKind::Background => element.set_style(BACKGROUND_IMAGE, &css_url(fallback)),
                TargetKind::Primary => element.set_attribute("src", fallback),
            }
            swap_class(&mut *element, StyleHook::Loading.class_name(), StyleHook::Error.class_name());
            self.advance(LoadState::Error);
            return;
        }

        self.advance(LoadState::Loading);
        let this: Weak<dyn Settle> = self.this.clone();
        let callback = ProbeCallback::new(&locator, this);

        match self.options.target {
            TargetKind::Background => self.env.probe.begin(callback),
            TargetKind::Primary => {
                self.writing.set(true);
                {
                    let mut element = element.borrow_mut();
                    if let Some(alt) = &self.options.alt {
                        element.set_attribute("alt", alt);
                    }
                    element.set_attribute("loading", "lazy");
                    element.listen_once(callback);
                    element.set_attribute("src", &locator);
                }
                self.writing.set(false);
                self.apply_deferred(&element);
            }
        }
    }

    fn finish(&self, element: &mut E, locator: &str, outcome: LoadOutcome) -> LoadState {
        let resolver = &self.env.resolver;
        match outcome {
            LoadOutcome::Loaded => {
                if self.options.target == TargetKind::Background {
                    element.set_style(BACKGROUND_IMAGE, &css_url(locator));
                }
                swap_class(&mut *element, StyleHook::Loading.class_name(), StyleHook::Loaded.class_name());
                self.advance(LoadState::Loaded);
                LoadState::Loaded
            }
            LoadOutcome::Failed(reason) => {
                tracing::debug!("Load of {locator} failed: {reason}");
                match self.options.target {
                    TargetKind::Background => {
                        resolver.handle_background_error(&mut *element, locator);
                    }
                    TargetKind::Primary => {
                        resolver.handle_error(&mut *element);
                    }
                }
                swap_class(&mut *element, StyleHook::Loading.class_name(), StyleHook::Error.class_name());
                self.advance(LoadState::Error);
                LoadState::Error
            }
        }
    }

    /// Apply a completion the element fired synchronously while it was
    /// still borrowed for the `src` assignment.
    fn apply_deferred(&self, element: &RefCell<E>) {
        let Some((locator, outcome)) = self.deferred.borrow_mut().take() else {
            return;
        };
        tracing::debug!("Applying deferred completion for '{}'", self.element_id);
        self.finish(&mut element.borrow_mut(), &locator, outcome);
    }

    fn teardown(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        self.unwatch();
        tracing::debug!("Tore down loader for '{}'", self.element_id);
    }
}

impl<E: MediaElement + 'static> Reveal for LoaderCore<E> {
    fn reveal(&self) {
        self.begin_load();
    }

    /// Live until the first visibility signal has been taken.
    fn is_live(&self) -> bool {
        !self.triggered.get() && Settle::is_live(self)
    }
}

impl<E: MediaElement + 'static> Settle for LoaderCore<E> {
    fn settle(&self, locator: &str, outcome: LoadOutcome) -> Delivery {
        if self.torn_down.get() {
            tracing::debug!("Late completion for '{}' after teardown", self.element_id);
            return Delivery::Detached;
        }
        let Some(element) = self.element.upgrade() else {
            return Delivery::Detached;
        };
        if self.state.get() != LoadState::Loading {
            return Delivery::Stale;
        }
        let Ok(mut element) = element.try_borrow_mut() else {
            if self.writing.get() {
                *self.deferred.borrow_mut() = Some((locator.to_string(), outcome));
                return Delivery::Deferred;
            }
            tracing::warn!("Element '{}' busy during load completion", self.element_id);
            return Delivery::Stale;
        };
        Delivery::Applied(self.finish(&mut element, locator, outcome))
    }

    fn is_live(&self) -> bool {
        !self.torn_down.get() && self.element.strong_count() > 0
    }
}
