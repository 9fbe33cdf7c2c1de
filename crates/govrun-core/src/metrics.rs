//! Global atomic counters for release-governance observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Convenience accessor for the process-wide singleton.
pub fn global() -> &'static Metrics {
    &METRICS
}

/// Lightweight atomic counters — no allocations, no locking.
pub struct Metrics {
    runs_planned: AtomicU64,
    runs_published: AtomicU64,
    runs_failed: AtomicU64,
    steps_executed: AtomicU64,
    steps_skipped_idempotently: AtomicU64,
    governance_escalations: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_planned: AtomicU64::new(0),
            runs_published: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            steps_executed: AtomicU64::new(0),
            steps_skipped_idempotently: AtomicU64::new(0),
            governance_escalations: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_planned(&self) {
        self.runs_planned.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_planned", "counter incremented");
    }

    pub fn inc_runs_published(&self) {
        self.runs_published.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_published", "counter incremented");
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    pub fn inc_steps_executed(&self) {
        self.steps_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "steps_executed", "counter incremented");
    }

    pub fn inc_steps_skipped_idempotently(&self) {
        self.steps_skipped_idempotently.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "steps_skipped_idempotently", "counter incremented");
    }

    pub fn inc_governance_escalations(&self) {
        self.governance_escalations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "governance_escalations", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run, daemon tick, etc.)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_planned = self.runs_planned(),
            runs_published = self.runs_published(),
            runs_failed = self.runs_failed(),
            steps_executed = self.steps_executed(),
            steps_skipped_idempotently = self.steps_skipped_idempotently(),
            governance_escalations = self.governance_escalations(),
        );
    }

    pub fn runs_planned(&self) -> u64 {
        self.runs_planned.load(Ordering::Relaxed)
    }

    pub fn runs_published(&self) -> u64 {
        self.runs_published.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn steps_executed(&self) -> u64 {
        self.steps_executed.load(Ordering::Relaxed)
    }

    pub fn steps_skipped_idempotently(&self) -> u64 {
        self.steps_skipped_idempotently.load(Ordering::Relaxed)
    }

    pub fn governance_escalations(&self) -> u64 {
        self.governance_escalations.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.runs_planned.store(0, Ordering::Relaxed);
        self.runs_published.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.steps_executed.store(0, Ordering::Relaxed);
        self.steps_skipped_idempotently.store(0, Ordering::Relaxed);
        self.governance_escalations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.runs_planned(), 0);
        m.inc_runs_planned();
        m.inc_runs_planned();
        assert_eq!(m.runs_planned(), 2);

        m.inc_steps_executed();
        assert_eq!(m.steps_executed(), 1);

        m.inc_governance_escalations();
        m.inc_governance_escalations();
        m.inc_governance_escalations();
        assert_eq!(m.governance_escalations(), 3);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_runs_planned();
        m.inc_runs_published();
        m.inc_runs_failed();
        m.reset();
        assert_eq!(m.runs_planned(), 0);
        assert_eq!(m.runs_published(), 0);
        assert_eq!(m.runs_failed(), 0);
    }
}
