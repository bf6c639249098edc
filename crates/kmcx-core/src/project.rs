//! Interactive-side project state: stage views, their synchronization
//! flags, the job list and the job draft.

use crate::engine::{self, EngineSnapshot, SharedEngine};
use crate::errors::DomainError;
use crate::job::JobConfiguration;
use crate::job_list::JobList;
use crate::stages::{self, Editability, Stage, StageTracker};
use crate::task::{FatalError, TaskContext, TaskResult, UserMessage};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Rejected,
    Cancelled,
}

#[derive(Debug)]
pub struct Project {
    tracker: StageTracker,
    views: BTreeMap<Stage, Value>,
    editable: Editability,
    jobs: JobList,
    draft: JobConfiguration,
    project_state: u8,
    compromised: bool,
}

impl Project {
    pub fn new(max_job_count: usize) -> Self {
        let mut project = Self {
            tracker: StageTracker::new(),
            views: BTreeMap::new(),
            editable: Editability::default(),
            jobs: JobList::new(max_job_count),
            draft: JobConfiguration::draft(),
            project_state: 0,
            compromised: false,
        };
        if let Ok(initial) = stages::initial_state(0) {
            project.tracker.reset_to(&initial);
        }
        project
    }

    /// Replaces every view with engine data and derives the stage flags
    /// from the engine's project state.
    pub fn load(&mut self, snapshot: &EngineSnapshot) -> Result<(), DomainError> {
        let initial = stages::initial_state(snapshot.project_state)?;
        self.views = snapshot.stages.clone();
        self.tracker.reset_to(&initial);
        self.editable = initial.editable;
        self.project_state = snapshot.project_state;
        self.jobs.clear();
        tracing::info!("Loaded project in state {}", snapshot.project_state);
        Ok(())
    }

    pub fn tracker(&self) -> &StageTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut StageTracker {
        &mut self.tracker
    }

    pub fn jobs(&self) -> &JobList {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobList {
        &mut self.jobs
    }

    pub fn draft(&self) -> &JobConfiguration {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut JobConfiguration {
        &mut self.draft
    }

    pub fn editability(&self) -> Editability {
        self.editable
    }

    pub fn project_state(&self) -> u8 {
        self.project_state
    }

    pub fn is_synchronized(&self) -> bool {
        self.tracker.is_synchronized()
    }

    pub fn is_compromised(&self) -> bool {
        self.compromised
    }

    pub fn stage_view(&self, stage: Stage) -> Option<&Value> {
        self.views.get(&stage)
    }

    /// Records a local edit. The stage becomes applicable.
    pub fn edit_stage(&mut self, stage: Stage, data: Value) {
        self.views.insert(stage, data);
        self.tracker.set_synchronized(stage, false);
    }

    /// Packages the work that pushes `stage`'s current view into the engine.
    pub fn apply_stage_work(&self, stage: Stage, engine: SharedEngine) -> ApplyStage {
        ApplyStage {
            stage,
            data: self.views.get(&stage).cloned().unwrap_or(Value::Null),
            engine,
        }
    }

    /// Folds the outcome of [`ApplyStage::run`] back into the project.
    ///
    /// On success the applied stage becomes synchronized, later views are
    /// refreshed from the engine without touching their flags, and the job
    /// list is cleared. Rejections and cancellations change nothing. A fatal
    /// result marks the project compromised and is returned as an error.
    pub fn complete_apply(
        &mut self,
        stage: Stage,
        result: TaskResult<EngineSnapshot>,
    ) -> Result<ApplyOutcome, FatalError> {
        match result {
            TaskResult::Snapshot(snapshot) => {
                self.tracker.set_synchronized(stage, true);
                for later in stage.later() {
                    if let Some(view) = snapshot.stage(later) {
                        self.views.insert(later, view.clone());
                    }
                }
                if let Ok(state) = stages::initial_state(snapshot.project_state) {
                    self.editable = state.editable;
                }
                self.project_state = snapshot.project_state;
                self.jobs.clear();
                tracing::info!("Applied stage '{}'", stage);
                Ok(ApplyOutcome::Applied)
            }
            TaskResult::UserMessage(msg) => {
                tracing::warn!("Stage '{}' was rejected: {}", stage, msg);
                Ok(ApplyOutcome::Rejected)
            }
            TaskResult::Cancelled => Ok(ApplyOutcome::Cancelled),
            TaskResult::Fatal(err) => {
                tracing::error!("Applying stage '{}' failed fatally: {}", stage, err);
                self.compromised = true;
                Err(err)
            }
        }
    }
}

/// Background work for one stage application.
pub struct ApplyStage {
    stage: Stage,
    data: Value,
    engine: SharedEngine,
}

impl std::fmt::Debug for ApplyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyStage")
            .field("stage", &self.stage)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

impl ApplyStage {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Cancellation is honored before the engine is touched. Once the
    /// engine accepted the data the resulting snapshot is always returned.
    pub fn run(self, ctx: &TaskContext) -> TaskResult<EngineSnapshot> {
        if ctx.is_cancelled() {
            return TaskResult::Cancelled;
        }
        let context = format!("Applying {}", self.stage);
        ctx.log(10, context.clone());

        let mut engine = match engine::lock(&self.engine) {
            Ok(guard) => guard,
            Err(err) => return TaskResult::from_engine_error(&context, err),
        };

        if let Err(err) = engine.apply_stage(self.stage, &self.data).check(self.stage.name()) {
            return match TaskResult::from_engine_error(&context, err) {
                TaskResult::UserMessage(msg) => TaskResult::UserMessage(UserMessage {
                    header: format!("Invalid {} data", self.stage),
                    ..msg
                }),
                other => other,
            };
        }
        ctx.report(80, None);

        match engine.snapshot() {
            Ok(snapshot) => {
                ctx.report(100, None);
                TaskResult::Snapshot(snapshot)
            }
            Err(code) => TaskResult::Fatal(FatalError::new(
                context,
                format!("engine snapshot failed with status {code}"),
            )),
        }
    }
}
