//! HTTP media probe.
//!
//! Each load is a GET spawned on the current `LocalSet`; the response is
//! status-checked and verified as an image before the loader's callback
//! completes. Probes are never aborted: a loader torn down mid-flight just
//! gets a detached completion.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use tokio::task::JoinSet;

use lazy_media::probe::{is_data_url, probe_data_url};
use lazy_media::{verify_payload, Delivery, LoadOutcome, MediaProbe, ProbeCallback};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Counters for completed probes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ProbeStats {
    pub started: usize,
    pub loaded: usize,
    pub failed: usize,
    /// Completions that arrived after their loader was gone.
    pub detached: usize,
}

/// [`MediaProbe`] backed by reqwest.
///
/// Must be used from inside a `tokio::task::LocalSet`.
pub struct HttpProbe {
    client: reqwest::Client,
    in_flight: RefCell<JoinSet<Delivery>>,
    stats: Cell<ProbeStats>,
}

impl HttpProbe {
    pub fn new(timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("lazy-media/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            in_flight: RefCell::new(JoinSet::new()),
            stats: Cell::new(ProbeStats::default()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.borrow().len()
    }

    pub fn stats(&self) -> ProbeStats {
        self.stats.get()
    }

    /// Wait for every probe started so far, including ones started while
    /// waiting. Returns how many were joined.
    pub async fn settle_all(&self) -> usize {
        let mut joined = 0;
        loop {
            let mut batch = std::mem::take(&mut *self.in_flight.borrow_mut());
            if batch.is_empty() {
                return joined;
            }
            while let Some(result) = batch.join_next().await {
                joined += 1;
                match result {
                    Ok(delivery) => self.count(delivery),
                    Err(e) => tracing::error!("Probe task failed: {e}"),
                }
            }
        }
    }

    fn count(&self, delivery: Delivery) {
        let mut stats = self.stats.get();
        match delivery {
            Delivery::Applied(lazy_media::LoadState::Error) => stats.failed += 1,
            Delivery::Applied(_) | Delivery::Deferred => stats.loaded += 1,
            Delivery::Stale | Delivery::Detached => stats.detached += 1,
        }
        self.stats.set(stats);
    }

    fn mark_started(&self) {
        let mut stats = self.stats.get();
        stats.started += 1;
        self.stats.set(stats);
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl MediaProbe for HttpProbe {
    fn begin(&self, callback: ProbeCallback) {
        self.mark_started();

        if is_data_url(callback.locator()) {
            let outcome = probe_data_url(callback.locator());
            let delivery = callback.complete(outcome);
            self.count(delivery);
            return;
        }

        let client = self.client.clone();
        self.in_flight.borrow_mut().spawn_local(async move {
            let outcome = fetch(&client, callback.locator()).await;
            tracing::debug!("Probe of {} finished: {outcome:?}", callback.locator());
            callback.complete(outcome)
        });
    }
}

/// GET a locator and decide whether it is a renderable image.
pub async fn fetch(client: &reqwest::Client, locator: &str) -> LoadOutcome {
    let response = match client.get(locator).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("GET {locator} failed: {e}");
            return LoadOutcome::Failed(format!("request failed: {e}"));
        }
    };

    let status = response.status();
    if !status.is_success() {
        return LoadOutcome::Failed(format!("HTTP {}", status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => return LoadOutcome::Failed(format!("body read failed: {e}")),
    };

    match verify_payload(content_type.as_deref(), &body) {
        Ok(info) => {
            tracing::debug!("Verified {locator} as {}", info.format);
            LoadOutcome::Loaded
        }
        Err(e) => LoadOutcome::Failed(e.to_string()),
    }
}
