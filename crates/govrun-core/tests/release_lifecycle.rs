//! End-to-end lifecycle test against the real JSON-file repository adapter,
//! reloading the run from disk between every use case instead of holding it
//! in memory, the way a restarted process would.

use std::sync::Arc;

use govrun_core::config::GovernanceConfig;
use govrun_core::ports::NotesOptions;
use govrun_core::run::{Actor, ActorType, RunState};
use govrun_core::storage::JsonFileRepository;
use govrun_core::testkit::{
    FakeNotesGenerator, FakePublisher, FakeRepoInspector, FakeVersionCalculator,
};
use govrun_core::usecases::{self, Deps};

fn human(id: &str) -> Actor {
    Actor {
        actor_type: ActorType::Human,
        id: id.to_string(),
    }
}

fn deps(repo_root: &std::path::Path, inspector: Arc<FakeRepoInspector>) -> Deps {
    Deps {
        repository: Arc::new(JsonFileRepository::new(repo_root)),
        inspector,
        publisher: Arc::new(FakePublisher::always_succeeds()),
        notes_generator: Arc::new(FakeNotesGenerator::default()),
        version_calculator: Arc::new(FakeVersionCalculator::default()),
        history: None,
        events: Arc::new(govrun_core::broadcaster::Broadcaster::new(16)),
        config: GovernanceConfig::default(),
    }
}

#[tokio::test]
async fn full_lifecycle_persists_and_reloads_between_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let inspector = Arc::new(FakeRepoInspector::new(
        "repo-1",
        "sha1",
        vec!["c1".to_string(), "c2".to_string()],
    ));
    let deps = deps(dir.path(), inspector);

    let run = usecases::plan(&deps, &dir.path().display().to_string(), "main", human("alice"))
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Planned);

    let reloaded = deps.repository.load(&run.id).await.unwrap();
    assert_eq!(reloaded.state, RunState::Planned);

    let run = usecases::bump(&deps, &run.id, "alice").await.unwrap();
    assert_eq!(run.state, RunState::Versioned);

    let run = usecases::generate_notes(&deps, &run.id, &NotesOptions::default(), "alice")
        .await
        .unwrap();
    assert_eq!(run.state, RunState::NotesReady);
    assert!(run.notes.is_some());

    let plan_hash = run.plan_hash.clone();
    let run = usecases::approve(&deps, &run.id, &plan_hash, human("alice"), false)
        .await
        .unwrap();
    assert_eq!(run.state, RunState::Approved);

    let run = usecases::publish(&deps, &run.id, "alice").await.unwrap();
    assert_eq!(run.state, RunState::Published);
    assert!(run.published_at.is_some());
    assert!(run.all_steps_terminal_success());

    let on_disk = deps.repository.load(&run.id).await.unwrap();
    assert_eq!(on_disk.state, RunState::Published);
    assert_eq!(on_disk.history.len(), run.history.len());
}

#[tokio::test]
async fn failed_step_persists_failed_state_and_retry_reaches_published() {
    let dir = tempfile::tempdir().unwrap();
    let inspector = Arc::new(FakeRepoInspector::new("repo-1", "sha1", vec!["c1".to_string()]));

    let failing_publisher = FakePublisher::new();
    let deps = Deps {
        repository: Arc::new(JsonFileRepository::new(dir.path())),
        inspector,
        publisher: Arc::new(failing_publisher),
        notes_generator: Arc::new(FakeNotesGenerator::default()),
        version_calculator: Arc::new(FakeVersionCalculator::default()),
        history: None,
        events: Arc::new(govrun_core::broadcaster::Broadcaster::new(16)),
        config: GovernanceConfig::default(),
    };

    let run = usecases::plan(&deps, &dir.path().display().to_string(), "main", human("alice"))
        .await
        .unwrap();
    let run = usecases::bump(&deps, &run.id, "alice").await.unwrap();
    let run = usecases::generate_notes(&deps, &run.id, &NotesOptions::default(), "alice")
        .await
        .unwrap();
    let plan_hash = run.plan_hash.clone();
    let run = usecases::approve(&deps, &run.id, &plan_hash, human("alice"), false)
        .await
        .unwrap();
    let failing_step = run.steps[0].name.clone();

    // Swap in a publisher that fails the first step, exercising a reload
    // from disk rather than mutating the in-memory Deps.
    let deps_with_failure = Deps {
        repository: deps.repository.clone(),
        inspector: deps.inspector.clone(),
        publisher: {
            let publisher = FakePublisher::new();
            publisher.mark_failing(&failing_step, "boom");
            Arc::new(publisher)
        },
        notes_generator: deps.notes_generator.clone(),
        version_calculator: deps.version_calculator.clone(),
        history: None,
        events: deps.events.clone(),
        config: GovernanceConfig::default(),
    };

    let run = usecases::publish(&deps_with_failure, &run.id, "alice").await.unwrap();
    assert_eq!(run.state, RunState::Failed);

    let run = usecases::retry(&deps, &run.id, "alice").await.unwrap();
    assert_eq!(run.state, RunState::Published);
    assert_eq!(run.step_status(&failing_step).unwrap().attempts, 2);
}
