//! Idempotent step executor.
//!
//! Walks a run's `steps` strictly sequentially, consulting the publisher
//! port's `check_idempotency` before every `execute_step` call — even on the
//! first attempt — so a crash between an external effect and the status
//! update can never duplicate the effect on retry.

use std::sync::Arc;

use crate::error::{DomainError, Result};
use crate::obs::emit_step_completed;
use crate::ports::{Publisher, ReleaseRunRepository};
use crate::run::ReleaseRun;

/// Drives one run's publishing phase to completion (or failure).
///
/// `run` must already be in `Publishing` (the Publish use case performs the
/// `Approved -> Publishing` transition before handing the run here).
pub async fn execute_publishing(
    run: &mut ReleaseRun,
    publisher: &Arc<dyn Publisher>,
    repository: &Arc<dyn ReleaseRunRepository>,
    actor: &str,
) -> Result<()> {
    let step_names: Vec<String> = run.steps.iter().map(|s| s.name.clone()).collect();

    for name in &step_names {
        let status = run.step_status(name)?.clone_state();
        if status.is_terminal_success() {
            continue;
        }

        let step = run.step_plan(name)?.clone();
        let already_done = publisher.check_idempotency(run, &step).await?;
        if already_done {
            run.skip_step(name, "already-done")?;
            emit_step_completed(&run.id, name, "skipped");
            repository.save(run).await.map_err(persist_failure)?;
            continue;
        }

        run.start_step(name)?;
        repository.save(run).await.map_err(persist_failure)?;

        if let Some(plugin_name) = step.plugin_name.as_deref() {
            run.note_plugin_executed(name, plugin_name);
        }

        match publisher.execute_step(run, &step).await {
            Ok(outcome) if outcome.success => {
                run.complete_step(name, outcome.output)?;
                emit_step_completed(&run.id, name, "done");
                repository.save(run).await.map_err(persist_failure)?;
            }
            Ok(outcome) => {
                let error = outcome.error.unwrap_or_else(|| "step failed".to_string());
                run.fail_step(name, error.clone())?;
                emit_step_completed(&run.id, name, "failed");
                run.fail(format!("step {name} failed: {error}"), actor)?;
                repository.save(run).await.map_err(persist_failure)?;
                return Ok(());
            }
            Err(err) => {
                run.fail_step(name, err.to_string())?;
                run.fail(format!("step {name} failed: {err}"), actor)?;
                repository.save(run).await.map_err(persist_failure)?;
                return Ok(());
            }
        }
    }

    run.complete_publish(actor)?;
    repository.save(run).await.map_err(persist_failure)?;
    Ok(())
}

fn persist_failure(err: DomainError) -> DomainError {
    err
}

// Small helpers on the step-status value, kept here since they're only
// needed by the executor's "is this step already over" check.
impl crate::run::StepStatus {
    fn clone_state(&self) -> Self {
        self.clone()
    }

    fn is_terminal_success(&self) -> bool {
        matches!(
            self.state,
            crate::run::StepState::Done | crate::run::StepState::Skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{Actor, ActorType, PlanInputs, ReleaseNotes, StepKind, StepPlan, Thresholds};
    use crate::testkit::{FakePublisher, FakeReleaseRunRepository};
    use chrono::Utc;

    fn thresholds() -> Thresholds {
        Thresholds {
            auto_approve: 0.25,
            require_approval: 0.5,
            block_above: 0.9,
        }
    }

    fn actor() -> Actor {
        Actor {
            actor_type: ActorType::Human,
            id: "alice".to_string(),
        }
    }

    fn approved_run(step_count: usize) -> ReleaseRun {
        let commits = vec!["c1".to_string()];
        let inputs = PlanInputs {
            repo_id: "repo",
            base_ref: "main",
            head_sha: "sha",
            commits: &commits,
            version_next: "",
            config_hash: "cfg",
            plugin_plan_hash: "plugin",
        };
        let mut run = ReleaseRun::new_draft(&inputs, "/repo", thresholds(), actor(), None);
        run.mark_planned("alice").unwrap();
        run.bump(
            crate::value_types::Semver::new(1, 0, 0),
            crate::value_types::Semver::new(1, 1, 0),
            crate::value_types::BumpKind::Minor,
            crate::value_types::Categorization::default(),
            "v1.1.0",
            "alice",
        )
        .unwrap();
        run.set_notes(
            ReleaseNotes {
                text: "notes".to_string(),
                audience: "external".to_string(),
                tone: "neutral".to_string(),
                provider: "none".to_string(),
                model: "none".to_string(),
                generated_at: Utc::now(),
                inputs_hash: "h".to_string(),
            },
            0.1,
            vec![],
            "alice",
        )
        .unwrap();
        let plan_hash = run.plan_hash.clone();
        let steps = (0..step_count)
            .map(|i| StepPlan::new(&run.id, format!("step-{i}"), StepKind::Build, "cfg"))
            .collect();
        run.approve(&plan_hash, actor(), false, steps).unwrap();
        run.start_publish("alice").unwrap();
        run
    }

    #[tokio::test]
    async fn executes_every_step_and_reaches_published() {
        let mut run = approved_run(3);
        let publisher: Arc<dyn Publisher> = Arc::new(FakePublisher::always_succeeds());
        let repository: Arc<dyn ReleaseRunRepository> = Arc::new(FakeReleaseRunRepository::new());

        execute_publishing(&mut run, &publisher, &repository, "system").await.unwrap();
        assert_eq!(run.state, crate::run::RunState::Published);
        assert!(run.all_steps_terminal_success());
    }

    #[tokio::test]
    async fn already_done_step_is_skipped_not_reexecuted() {
        let mut run = approved_run(1);
        let step_name = run.steps[0].name.clone();
        let publisher = FakePublisher::new();
        publisher.mark_already_done(&step_name);
        let publisher: Arc<dyn Publisher> = Arc::new(publisher);
        let repository: Arc<dyn ReleaseRunRepository> = Arc::new(FakeReleaseRunRepository::new());

        execute_publishing(&mut run, &publisher, &repository, "system").await.unwrap();
        assert_eq!(
            run.step_status(&step_name).unwrap().state,
            crate::run::StepState::Skipped
        );
        assert_eq!(run.state, crate::run::RunState::Published);
    }

    #[tokio::test]
    async fn failing_step_fails_the_run_and_stops_walking() {
        let mut run = approved_run(2);
        let failing_step = run.steps[0].name.clone();
        let second_step = run.steps[1].name.clone();
        let publisher = FakePublisher::new();
        publisher.mark_failing(&failing_step, "boom");
        let publisher: Arc<dyn Publisher> = Arc::new(publisher);
        let repository: Arc<dyn ReleaseRunRepository> = Arc::new(FakeReleaseRunRepository::new());

        execute_publishing(&mut run, &publisher, &repository, "system").await.unwrap();
        assert_eq!(run.state, crate::run::RunState::Failed);
        assert_eq!(
            run.step_status(&failing_step).unwrap().state,
            crate::run::StepState::Failed
        );
        assert_eq!(
            run.step_status(&second_step).unwrap().state,
            crate::run::StepState::Pending
        );
    }
}
