//! Run-scoped ownership of the index store and the shutdown path.
//!
//! A [`PipelineContext`] owns the store for one invocation and is passed by reference to the
//! ingestor, matcher and exporter. Cleanup closes every registered resource in reverse
//! acquisition order, never stops at the first failure, and is safe to repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CorpusError, Result};
use crate::store::IndexStore;

/// A resource that must be flushed and released when a run ends.
pub trait Closeable {
    /// Human readable name used in cleanup reports.
    fn resource_name(&self) -> &str;

    /// Flushes and releases the resource. Calling it again after success is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Cancellation flag shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; safe to call from any thread, any number of times.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Outcome of a cleanup sweep.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub closed: Vec<String>,
    pub failures: Vec<CorpusError>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn close_one(&mut self, resource: &mut dyn Closeable) {
        let name = resource.resource_name().to_string();
        match resource.close() {
            Ok(()) => self.closed.push(name),
            Err(err) => {
                tracing::error!(
                    target = "geocorpus::context",
                    resource = %name,
                    error = %err,
                    "failed to close resource"
                );
                self.failures.push(CorpusError::ResourceCleanup {
                    resource: name,
                    reason: err.to_string(),
                });
            }
        }
    }
}

/// Owns the index store for the duration of one run.
pub struct PipelineContext<S: IndexStore> {
    store: S,
    shutdown: ShutdownSignal,
    closed: bool,
}

impl<S: IndexStore> PipelineContext<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_shutdown(store, ShutdownSignal::new())
    }

    #[must_use]
    pub fn with_shutdown(store: S, shutdown: ShutdownSignal) -> Self {
        Self {
            store,
            shutdown,
            closed: false,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_raised()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes `acquired` (in acquisition order) from last to first, then the store.
    ///
    /// Every resource is attempted even if an earlier one fails. Calling this again only
    /// re-closes the extra resources, which are expected to be idempotent themselves.
    pub fn close(&mut self, acquired: &mut [&mut dyn Closeable]) -> CleanupReport {
        let mut report = CleanupReport::default();
        for resource in acquired.iter_mut().rev() {
            report.close_one(&mut **resource);
        }
        if !self.closed {
            report.close_one(&mut self.store);
            self.closed = true;
        }
        tracing::info!(
            target = "geocorpus::context",
            closed = report.closed.len(),
            failures = report.failures.len(),
            "pipeline resources released"
        );
        report
    }
}

impl<S: IndexStore> Drop for PipelineContext<S> {
    fn drop(&mut self) {
        if !self.closed {
            let report = self.close(&mut []);
            if !report.is_clean() {
                tracing::warn!(
                    target = "geocorpus::context",
                    failures = report.failures.len(),
                    "context dropped with cleanup failures"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::store::TantivyStore;

    struct Probe {
        name: String,
        fail: bool,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Closeable for Probe {
        fn resource_name(&self) -> &str {
            &self.name
        }

        fn close(&mut self) -> Result<()> {
            self.log.borrow_mut().push(self.name.clone());
            if self.fail {
                Err(CorpusError::config("flush failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn cleanup_runs_in_reverse_order_past_failures() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let probe = |name: &str, fail| Probe {
            name: name.into(),
            fail,
            log: Rc::clone(&log),
        };
        let (mut first, mut second) = (probe("stream", false), probe("sink", true));
        let mut ctx = PipelineContext::new(TantivyStore::in_memory().unwrap());

        let report = ctx.close(&mut [&mut first as &mut dyn Closeable, &mut second]);
        assert_eq!(*log.borrow(), ["sink", "stream"]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0],
            CorpusError::ResourceCleanup { resource, .. } if resource == "sink"
        ));
        assert_eq!(report.closed.len(), 2);
        assert!(ctx.is_closed());

        let again = ctx.close(&mut []);
        assert!(again.is_clean());
        assert!(again.closed.is_empty());
    }

    #[test]
    fn raised_signal_is_seen_by_every_clone() {
        let signal = ShutdownSignal::new();
        let ctx = PipelineContext::with_shutdown(TantivyStore::in_memory().unwrap(), signal.clone());
        assert!(!ctx.is_cancelled());
        ctx.shutdown_signal().raise();
        assert!(signal.is_raised());
        assert!(ctx.is_cancelled());
    }
}
