//! Structured observability hooks for the release-governance run lifecycle.
//!
//! This module provides:
//! - Run-scoped tracing spans via the `RunSpan` RAII guard, entered by every
//!   use case and executor step for the duration of the call.
//! - Thin `emit_*` wrapper functions giving each significant domain event a
//!   single call site instead of scattering ad hoc log lines.
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`). For
//! JSON output, set `GOVRUN_LOG_FORMAT=json` (see [`crate::telemetry::init_tracing`]).

use tracing::info;

/// RAII guard that enters a run-scoped tracing span for the duration of a
/// use case or executor step.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("run-12345");
/// // Now all tracing calls are automatically associated with run_id = "run-12345"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("govrun.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a run was created by the Plan use case.
pub fn emit_run_created(run_id: &str, repo_id: &str, plan_hash: &str) {
    info!(event = "run.created", run_id = %run_id, repo_id = %repo_id, plan_hash = %plan_hash);
    crate::metrics::global().inc_runs_planned();
}

/// Emit event: a run transitioned from one state to another.
pub fn emit_state_transitioned(run_id: &str, from: &str, to: &str, trigger: &str) {
    info!(event = "run.state_transitioned", run_id = %run_id, from = %from, to = %to, trigger = %trigger);
}

/// Emit event: a publishing step reached a terminal (or skipped) state.
pub fn emit_step_completed(run_id: &str, step: &str, state: &str) {
    info!(event = "run.step_completed", run_id = %run_id, step = %step, state = %state);
    match state {
        "done" => crate::metrics::global().inc_steps_executed(),
        "skipped" => crate::metrics::global().inc_steps_skipped_idempotently(),
        _ => {}
    }
}

/// Emit event: the CGP evaluator rendered a decision.
pub fn emit_governance_decision(run_id: &str, decision: &str, risk_score: f64) {
    info!(event = "governance.decision", run_id = %run_id, decision = %decision, risk_score = risk_score);
    if decision == "approval_required" {
        crate::metrics::global().inc_governance_escalations();
    }
}

/// Emit event: a run reached `Published`.
pub fn emit_run_published(run_id: &str) {
    info!(event = "run.published", run_id = %run_id);
    crate::metrics::global().inc_runs_published();
}

/// Emit event: a run reached `Failed` (warning level).
pub fn emit_run_failed(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "run.failed", run_id = %run_id, error = %error);
    crate::metrics::global().inc_runs_failed();
}
