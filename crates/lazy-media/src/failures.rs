//! Process-wide record of locators that failed to load.

use std::cell::RefCell;
use std::collections::BTreeSet;

/// Set of failed locators shared by every loader in the process.
///
/// Grows until [`FailureCache::clear`] is called. The fallback locator is
/// never admitted, so a failing fallback cannot trigger another fallback.
/// Single-threaded: interior mutability without locking.
#[derive(Debug)]
pub struct FailureCache {
    fallback: String,
    failed: RefCell<BTreeSet<String>>,
}

impl FailureCache {
    pub fn new(fallback: &str) -> Self {
        Self {
            fallback: fallback.to_string(),
            failed: RefCell::new(BTreeSet::new()),
        }
    }

    /// Record a failed locator. Returns `true` if it was newly inserted.
    pub fn record(&self, locator: &str) -> bool {
        if locator == self.fallback || locator.is_empty() {
            return false;
        }
        let inserted = self.failed.borrow_mut().insert(locator.to_string());
        if inserted {
            tracing::debug!("Recorded failed locator {locator}");
        }
        inserted
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.failed.borrow().contains(locator)
    }

    /// Forget every recorded failure.
    pub fn clear(&self) {
        let count = {
            let mut failed = self.failed.borrow_mut();
            let count = failed.len();
            failed.clear();
            count
        };
        tracing::debug!("Cleared {count} failed locators");
    }

    pub fn len(&self) -> usize {
        self.failed.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.failed.borrow().is_empty()
    }

    /// Sorted copy of the recorded locators.
    pub fn snapshot(&self) -> Vec<String> {
        self.failed.borrow().iter().cloned().collect()
    }
}
