//! Transaction-script use cases that load (or create), mutate, persist, and
//! fan out events for a `ReleaseRun`.
//!
//! Each function follows the same shape: `load/create -> validate
//! -> mutate -> persist -> fan-out events`. Every call is wrapped in a
//! [`crate::obs::RunSpan`] keyed by the run id (or, for `plan`, by the
//! repository's stable id before a run id exists).

use std::sync::Arc;

use crate::config::GovernanceConfig;
use crate::digest::digest_concat;
use crate::error::{DomainError, Result};
use crate::executor;
use crate::governance;
use crate::obs::{self, RunSpan};
use crate::ports::{
    EventPublisher, HistoryProvider, NotesGenerator, NotesOptions, Publisher, ReleaseRunRepository,
    RepoInspector, VersionCalculator,
};
use crate::risk::{ActorKind, ChangeAnalysis, ChangeProposal};
use crate::run::{Actor, ActorType, PlanInputs, ReleaseRun, StepPlan, Thresholds};
use crate::value_types::ChangeSet;

/// Shared port bundle every use case depends on. Grouping these avoids a
/// seven-argument function signature per use case while keeping each port
/// independently mockable in tests.
pub struct Deps {
    pub repository: Arc<dyn ReleaseRunRepository>,
    pub inspector: Arc<dyn RepoInspector>,
    pub publisher: Arc<dyn Publisher>,
    pub notes_generator: Arc<dyn NotesGenerator>,
    pub version_calculator: Arc<dyn VersionCalculator>,
    pub history: Option<Arc<dyn HistoryProvider>>,
    pub events: Arc<dyn EventPublisher>,
    pub config: GovernanceConfig,
}

async fn fan_out(deps: &Deps, run: &mut ReleaseRun) {
    let events = run.take_domain_events();
    if !events.is_empty() {
        deps.events.publish(events).await;
    }
}

fn default_thresholds(config: &GovernanceConfig) -> Thresholds {
    Thresholds {
        auto_approve: config.thresholds.auto_approve_threshold,
        require_approval: config.thresholds.max_auto_approve_risk,
        block_above: 1.0,
    }
}

/// **Plan**: reads HEAD and commits from the inspector, builds a `ChangeSet`,
/// creates the run in `Draft`, and transitions it to `Planned`.
pub async fn plan(
    deps: &Deps,
    repo_root: &str,
    base_ref: &str,
    actor: Actor,
) -> Result<ReleaseRun> {
    let repo_id = deps.inspector.stable_repo_id().await?;
    let _span = RunSpan::enter(&repo_id);

    let head_sha = deps.inspector.head_sha().await?;
    let commits = deps.inspector.commits(base_ref, &head_sha).await?;

    let changeset = ChangeSet::new("changeset-1", base_ref, &head_sha, commits);
    let commit_hashes = changeset.commit_hashes();
    let config_hash = deps.config.config_hash()?;

    let inputs = PlanInputs {
        repo_id: &repo_id,
        base_ref,
        head_sha: &head_sha,
        commits: &commit_hashes,
        version_next: "",
        config_hash: &config_hash,
        plugin_plan_hash: "none",
    };

    let mut run = ReleaseRun::new_draft(
        &inputs,
        repo_root,
        default_thresholds(&deps.config),
        actor.clone(),
        Some(changeset.id.clone()),
    );
    run.mark_planned(&actor.id)?;

    obs::emit_run_created(&run.id, &run.repo_id, &run.plan_hash);
    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

/// **Bump**: requires `Planned`; asks the version-calculator port for the
/// next version, recomputes the plan hash, transitions to `Versioned`.
pub async fn bump(deps: &Deps, run_id: &str, actor: &str) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;

    let decision = deps.version_calculator.calculate(&run).await?;
    run.bump(
        decision.version_current,
        decision.version_next,
        decision.bump_kind,
        decision.categorization,
        decision.tag_name,
        actor,
    )?;

    obs::emit_state_transitioned(&run.id, "planned", "versioned", "BUMP");
    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

/// **GenerateNotes**: requires `Versioned` (or `NotesReady` to regenerate).
/// Validates HEAD still equals the pinned `head_sha` unless `force` is set
///. Runs the governance evaluator and records the resulting risk
/// score/reasons on the run alongside the notes.
pub async fn generate_notes(
    deps: &Deps,
    run_id: &str,
    options: &NotesOptions,
    actor: &str,
) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;

    if !options.force {
        let current_head = deps.inspector.head_sha().await?;
        if current_head != run.head_sha {
            return Err(DomainError::HeadShaChanged {
                pinned: run.head_sha.clone(),
                current: current_head,
            });
        }
    }

    let notes = deps.notes_generator.generate(&run, options).await?;

    let rollback_rate = if let Some(history) = deps.history.as_ref() {
        Some(history.get_rollback_rate(&run.repo_id).await?)
    } else {
        None
    };

    let proposal = ChangeProposal {
        actor_kind: actor_kind_for(&run),
        actor_id: run.actor.id.clone(),
        scope: run.repo_id.clone(),
        intent: "release".to_string(),
        suggested_bump: run.bump_kind,
        confidence: run.confidence,
    };
    // Blast radius (files/lines changed, api_changes) is the job of the
    // external analysis collaborator this crate never implements (§1); the
    // commit-derived counts below are the ones this crate can compute itself.
    let analysis = ChangeAnalysis {
        features: run.categorization.features,
        fixes: run.categorization.fixes,
        breaking: run.categorization.breaking,
        security: run.categorization.security,
        files_changed: 0,
        lines_changed: 0,
        ..Default::default()
    };
    let historical = rollback_rate.map(|rate| crate::risk::HistoricalRisk { rollback_rate: rate });

    let (governance_decision, _, _) = governance::evaluate(
        &deps.config.risk_weights,
        &deps.config.policy,
        &deps.config.thresholds,
        &proposal,
        Some(&analysis),
        historical,
    );

    obs::emit_governance_decision(
        &run.id,
        &format!("{:?}", governance_decision.decision).to_lowercase(),
        governance_decision.risk_score,
    );

    run.set_notes(notes, governance_decision.risk_score, governance_decision.rationale, actor)?;

    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

fn actor_kind_for(run: &ReleaseRun) -> ActorKind {
    match run.actor.actor_type {
        ActorType::Human => ActorKind::Human,
        ActorType::Ci => ActorKind::Ci,
        ActorType::Agent => ActorKind::Agent,
    }
}

/// **Approve**: requires `NotesReady`. `caller_plan_hash` must equal the
/// run's current plan hash. Builds the step plan from the config's
/// step templates, each step's idempotency key derived from `run_id ∥ name ∥
/// config_hash`.
pub async fn approve(
    deps: &Deps,
    run_id: &str,
    caller_plan_hash: &str,
    actor: Actor,
    auto_approved: bool,
) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;

    let step_config_hash = deps.config.config_hash()?;
    let steps: Vec<StepPlan> = deps
        .config
        .step_templates
        .iter()
        .map(|template| {
            let mut step = StepPlan::new(&run.id, &template.name, template.kind, &step_config_hash);
            if let (Some(plugin_name), Some(hook)) = (&template.plugin_name, &template.hook) {
                step = step.with_plugin(plugin_name.clone(), hook.clone());
            }
            step.unsafe_step = template.unsafe_step;
            step
        })
        .collect();

    run.approve(caller_plan_hash, actor, auto_approved, steps)?;

    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

/// **Publish**: requires `Approved`. Transitions to `Publishing` and hands
/// the run to the idempotent step executor.
pub async fn publish(deps: &Deps, run_id: &str, actor: &str) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;

    run.start_publish(actor)?;
    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;

    executor::execute_publishing(&mut run, &deps.publisher, &deps.repository, actor).await?;
    fan_out(deps, &mut run).await;

    match run.state {
        crate::run::RunState::Published => obs::emit_run_published(&run.id),
        crate::run::RunState::Failed => {
            if let Some(err) = run.last_error.clone() {
                obs::emit_run_failed(&run.id, &err);
            }
        }
        _ => {}
    }

    Ok(run)
}

/// **Retry**: requires `Failed`. Rewinds failed steps to `pending`
/// (preserving attempts) and re-enters the executor.
pub async fn retry(deps: &Deps, run_id: &str, actor: &str) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;

    run.retry_publish(actor)?;
    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;

    executor::execute_publishing(&mut run, &deps.publisher, &deps.repository, actor).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

/// **Cancel**: legal from every pre-`Publishing`-success state.
pub async fn cancel(deps: &Deps, run_id: &str, actor: &str, reason: Option<String>) -> Result<ReleaseRun> {
    let _span = RunSpan::enter(run_id);
    let mut run = deps.repository.load(run_id).await?;
    run.cancel(actor, reason)?;
    deps.repository.save(&run).await?;
    fan_out(deps, &mut run).await;
    Ok(run)
}

/// Helper kept for symmetry with the digest module's `digest_concat`
/// re-export pattern used by plugin-step hashing in `crate::run`; exposed
/// here so wiring code (`govrun-cli`) can derive a `plugin_plan_hash` the
/// same way without reaching into `crate::digest` directly.
pub fn hash_plugin_plan(plugin_names: &[String]) -> String {
    let refs: Vec<&str> = plugin_names.iter().map(String::as_str).collect();
    digest_concat(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{
        FakeHistoryProvider, FakeNotesGenerator, FakePublisher, FakeReleaseRunRepository,
        FakeRepoInspector, FakeVersionCalculator,
    };

    fn human(id: &str) -> Actor {
        Actor {
            actor_type: ActorType::Human,
            id: id.to_string(),
        }
    }

    fn deps_with(inspector: Arc<FakeRepoInspector>) -> Deps {
        Deps {
            repository: Arc::new(FakeReleaseRunRepository::new()),
            inspector,
            publisher: Arc::new(FakePublisher::always_succeeds()),
            notes_generator: Arc::new(FakeNotesGenerator::default()),
            version_calculator: Arc::new(FakeVersionCalculator::default()),
            history: Some(Arc::new(FakeHistoryProvider::new(0.0))),
            events: Arc::new(crate::broadcaster::Broadcaster::new(16)),
            config: GovernanceConfig::default(),
        }
    }

    #[tokio::test]
    async fn plan_creates_a_run_in_planned_state() {
        let inspector = Arc::new(FakeRepoInspector::new("repo-1", "sha1", vec!["c1".to_string()]));
        let deps = deps_with(inspector);
        let run = plan(&deps, "/repo", "main", human("alice")).await.unwrap();
        assert_eq!(run.state, crate::run::RunState::Planned);
        assert_eq!(run.repo_id, "repo-1");
    }

    #[tokio::test]
    async fn full_happy_path_reaches_published() {
        let inspector = Arc::new(FakeRepoInspector::new("repo-1", "sha1", vec!["c1".to_string()]));
        let deps = deps_with(inspector);
        let run = plan(&deps, "/repo", "main", human("alice")).await.unwrap();
        let run = bump(&deps, &run.id, "alice").await.unwrap();
        assert_eq!(run.state, crate::run::RunState::Versioned);

        let run = generate_notes(&deps, &run.id, &NotesOptions::default(), "alice")
            .await
            .unwrap();
        assert_eq!(run.state, crate::run::RunState::NotesReady);

        let plan_hash = run.plan_hash.clone();
        let run = approve(&deps, &run.id, &plan_hash, human("alice"), false)
            .await
            .unwrap();
        assert_eq!(run.state, crate::run::RunState::Approved);
        assert!(!run.steps.is_empty());

        let run = publish(&deps, &run.id, "alice").await.unwrap();
        assert_eq!(run.state, crate::run::RunState::Published);
    }

    #[tokio::test]
    async fn generate_notes_rejects_changed_head_without_force() {
        let inspector = Arc::new(FakeRepoInspector::new("repo-1", "sha1", vec!["c1".to_string()]));
        let deps = deps_with(inspector.clone());
        let run = plan(&deps, "/repo", "main", human("alice")).await.unwrap();
        let run = bump(&deps, &run.id, "alice").await.unwrap();

        // Simulate HEAD moving after planning.
        inspector.set_head_sha("sha2");

        let result = generate_notes(&deps, &run.id, &NotesOptions::default(), "alice").await;
        assert!(matches!(result, Err(DomainError::HeadShaChanged { .. })));
    }

    #[tokio::test]
    async fn cancel_moves_run_to_cancelled() {
        let inspector = Arc::new(FakeRepoInspector::new("repo-1", "sha1", vec!["c1".to_string()]));
        let deps = deps_with(inspector);
        let run = plan(&deps, "/repo", "main", human("alice")).await.unwrap();
        let run = cancel(&deps, &run.id, "alice", Some("no longer needed".to_string()))
            .await
            .unwrap();
        assert_eq!(run.state, crate::run::RunState::Cancelled);
    }
}
