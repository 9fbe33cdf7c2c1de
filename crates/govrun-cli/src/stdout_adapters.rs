//! No-op/stdout `Publisher` and `NotesGenerator` adapters for local
//! smoke-testing. Neither performs any real external effect — each step
//! just announces itself on stdout, so the wiring shim can exercise the
//! library end-to-end without a real publishing target configured.

use async_trait::async_trait;
use govrun_core::digest::digest_concat;
use govrun_core::error::DomainError;
use govrun_core::ports::{NotesGenerator, NotesOptions, Publisher, StepOutcome};
use govrun_core::run::{ReleaseNotes, ReleaseRun, StepPlan};

pub struct StdoutPublisher;

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn check_idempotency(&self, _run: &ReleaseRun, _step: &StepPlan) -> Result<bool, DomainError> {
        Ok(false)
    }

    async fn execute_step(&self, run: &ReleaseRun, step: &StepPlan) -> Result<StepOutcome, DomainError> {
        println!("[govrun] {} :: executing step '{}' ({:?})", run.id, step.name, step.kind);
        Ok(StepOutcome::success(Some(serde_json::json!({
            "step": step.name,
            "kind": format!("{:?}", step.kind),
        }))))
    }
}

pub struct StdoutNotesGenerator;

#[async_trait]
impl NotesGenerator for StdoutNotesGenerator {
    async fn generate(&self, run: &ReleaseRun, options: &NotesOptions) -> Result<ReleaseNotes, DomainError> {
        let text = format!(
            "Release notes for {} ({} commits)",
            run.version_next
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unreleased".to_string()),
            run.commits.len()
        );
        println!("[govrun] {} :: generated notes:\n{text}", run.id);
        Ok(ReleaseNotes {
            text: text.clone(),
            audience: options.audience.clone(),
            tone: options.tone.clone(),
            provider: "stdout".to_string(),
            model: "none".to_string(),
            generated_at: chrono::Utc::now(),
            inputs_hash: self.compute_inputs_hash(run, options)?,
        })
    }

    fn compute_inputs_hash(&self, run: &ReleaseRun, options: &NotesOptions) -> Result<String, DomainError> {
        Ok(digest_concat(&[
            &run.commits.join(","),
            &options.audience,
            &options.tone,
        ]))
    }
}
