use kmcx_core::engine::{shared, EngineHandle, EngineSnapshot, OfflineEngine, SharedEngine};
use kmcx_core::job::JobConfiguration;
use kmcx_core::project::{ApplyOutcome, Project};
use kmcx_core::stages::Stage;
use kmcx_core::task::{FatalError, Progress, TaskResult};
use kmcx_executor::TaskExecutor;
use serde_json::json;

struct Workbench {
    project: Project,
    progress: Vec<u8>,
    outcomes: Vec<Result<ApplyOutcome, FatalError>>,
}

fn workbench(applied: usize) -> (Workbench, SharedEngine) {
    let engine = OfflineEngine::prepared(applied);
    let mut project = Project::new(100);
    project.load(&engine.snapshot().unwrap()).unwrap();
    let bench = Workbench {
        project,
        progress: Vec::new(),
        outcomes: Vec::new(),
    };
    (bench, shared(engine))
}

fn apply(
    executor: &mut TaskExecutor<Workbench, EngineSnapshot>,
    bench: &mut Workbench,
    stage: Stage,
    engine: SharedEngine,
) {
    let work = bench.project.apply_stage_work(stage, engine);
    executor
        .run(
            move |ctx| work.run(ctx),
            |bench: &mut Workbench, update: &Progress| bench.progress.push(update.percent),
            move |bench: &mut Workbench, result| {
                let outcome = bench.project.complete_apply(stage, result);
                bench.outcomes.push(outcome);
            },
        )
        .unwrap();
    executor.wait(bench);
}

#[test]
fn test_background_apply_synchronizes_the_stage() {
    let mut executor = TaskExecutor::<Workbench, EngineSnapshot>::new();
    let (mut bench, engine) = workbench(5);
    bench.project.jobs_mut().add(&JobConfiguration::draft()).unwrap();
    bench.project.edit_stage(Stage::Structure, json!({"cell": 4}));
    bench.project.edit_stage(Stage::UniqueJumps, json!({"edited": true}));

    apply(&mut executor, &mut bench, Stage::Structure, engine);

    assert_eq!(bench.outcomes.len(), 1);
    assert!(matches!(bench.outcomes[0], Ok(ApplyOutcome::Applied)));
    assert_eq!(bench.progress.last(), Some(&100));

    let tracker = bench.project.tracker();
    assert!(tracker.is_stage_synchronized(Stage::JobDesc));
    assert!(tracker.is_stage_synchronized(Stage::Structure));
    assert!(tracker.is_stage_synchronized(Stage::ShellCounts));
    assert!(tracker.is_stage_applicable(Stage::UniqueJumps));
    assert!(tracker.is_stage_synchronized(Stage::Energies));

    assert_eq!(
        bench.project.stage_view(Stage::Structure),
        Some(&json!({"cell": 4}))
    );
    assert_eq!(
        bench.project.stage_view(Stage::ShellCounts),
        Some(&json!({"revision": 6}))
    );
    assert_eq!(
        bench.project.stage_view(Stage::Energies),
        Some(&json!({"revision": 6}))
    );
    assert!(bench.project.jobs().is_empty());
    assert!(!executor.is_busy());
}

#[test]
fn test_background_rejection_leaves_the_project_untouched() {
    let mut executor = TaskExecutor::<Workbench, EngineSnapshot>::new();
    let (mut bench, engine) = workbench(5);
    bench.project.jobs_mut().add(&JobConfiguration::draft()).unwrap();
    bench.project.edit_stage(Stage::ShellCounts, json!([1, 2, 3]));
    let views_before = bench.project.stage_view(Stage::Energies).cloned();

    apply(&mut executor, &mut bench, Stage::ShellCounts, engine);

    assert!(matches!(bench.outcomes[0], Ok(ApplyOutcome::Rejected)));
    assert!(bench.project.tracker().is_stage_applicable(Stage::ShellCounts));
    assert_eq!(bench.project.stage_view(Stage::Energies).cloned(), views_before);
    assert_eq!(bench.project.jobs().len(), 1);
}

#[test]
fn test_stages_apply_one_after_another() {
    let mut executor = TaskExecutor::<Workbench, EngineSnapshot>::new();
    let (mut bench, engine) = workbench(2);
    assert!(bench.project.tracker().is_stage_applicable(Stage::ShellCounts));

    apply(&mut executor, &mut bench, Stage::ShellCounts, engine.clone());
    bench.project.edit_stage(Stage::UniqueJumps, json!({"jumps": []}));
    apply(&mut executor, &mut bench, Stage::UniqueJumps, engine);

    assert_eq!(bench.outcomes.len(), 2);
    assert!(bench
        .outcomes
        .iter()
        .all(|outcome| matches!(outcome, Ok(ApplyOutcome::Applied))));
    assert!(bench.project.tracker().is_stage_synchronized(Stage::ShellCounts));
    assert!(bench.project.tracker().is_stage_synchronized(Stage::UniqueJumps));
}
