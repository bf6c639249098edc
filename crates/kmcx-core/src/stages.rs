//! Pipeline stages and their synchronization flags.
//!
//! A stage is *synchronized* when its locally edited data matches what the
//! engine holds. An unsynchronized stage is *applicable*: it can be pushed
//! to the engine. The two flags are always complements.

use crate::errors::DomainError;
use crate::observer::{Observers, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    JobDesc,
    Structure,
    ShellCounts,
    UniqueJumps,
    Energies,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::JobDesc,
        Stage::Structure,
        Stage::ShellCounts,
        Stage::UniqueJumps,
        Stage::Energies,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Stages strictly after this one in pipeline order.
    pub fn later(self) -> impl Iterator<Item = Stage> {
        Self::ALL.into_iter().skip(self.index() + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::JobDesc => "job description",
            Stage::Structure => "structure",
            Stage::ShellCounts => "shell counts",
            Stage::UniqueJumps => "unique jumps",
            Stage::Energies => "energies",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageFlag {
    synchronized: bool,
}

impl StageFlag {
    pub fn synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn applicable(&self) -> bool {
        !self.synchronized
    }
}

/// Which groups of settings the user may edit in the current project state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Editability {
    pub jumps: bool,
    pub energies: bool,
    pub settings: bool,
}

impl Editability {
    const NONE: Self = Self {
        jumps: false,
        energies: false,
        settings: false,
    };
    const JUMPS: Self = Self {
        jumps: true,
        energies: false,
        settings: false,
    };
    const ALL: Self = Self {
        jumps: true,
        energies: true,
        settings: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialStageState {
    pub synchronized: [bool; 5],
    pub editable: Editability,
}

impl InitialStageState {
    pub fn is_synchronized(&self, stage: Stage) -> bool {
        self.synchronized[stage.index()]
    }

    pub fn is_applicable(&self, stage: Stage) -> bool {
        !self.is_synchronized(stage)
    }
}

/// Maps the engine's reported project state (0-9) to initial stage flags
/// and editability. Job description and structure count as synchronized
/// once the engine has accepted a structure (state 2 and up). The later
/// stages are marked synchronized when they are not yet reachable, so
/// that only the next stage in line is applicable.
pub fn initial_state(project_state: u8) -> Result<InitialStageState, DomainError> {
    let (synchronized, editable) = match project_state {
        0 | 1 => ([false, false, true, true, true], Editability::NONE),
        2 | 3 => ([true, true, false, true, true], Editability::JUMPS),
        4 => ([true, true, true, false, true], Editability::JUMPS),
        5 => ([true, true, true, true, false], Editability::ALL),
        6..=9 => ([true; 5], Editability::ALL),
        other => return Err(DomainError::UnknownProjectState(other)),
    };
    Ok(InitialStageState {
        synchronized,
        editable,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    Changed {
        stage: Stage,
        synchronized: bool,
        applicable: bool,
    },
}

#[derive(Debug, Default)]
pub struct StageTracker {
    flags: [StageFlag; 5],
    observers: Observers<StageEvent>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&self, stage: Stage) -> StageFlag {
        self.flags[stage.index()]
    }

    pub fn is_stage_synchronized(&self, stage: Stage) -> bool {
        self.flag(stage).synchronized()
    }

    pub fn is_stage_applicable(&self, stage: Stage) -> bool {
        self.flag(stage).applicable()
    }

    /// True when every stage is synchronized.
    pub fn is_synchronized(&self) -> bool {
        self.flags.iter().all(StageFlag::synchronized)
    }

    /// Sets one stage's flag. Observers are told only when the value changes.
    pub fn set_synchronized(&mut self, stage: Stage, value: bool) {
        let flag = &mut self.flags[stage.index()];
        if flag.synchronized == value {
            return;
        }
        flag.synchronized = value;
        tracing::debug!("Stage '{}' synchronized={}", stage, value);
        self.observers.notify(&StageEvent::Changed {
            stage,
            synchronized: value,
            applicable: !value,
        });
    }

    pub fn reset_to(&mut self, state: &InitialStageState) {
        for stage in Stage::ALL {
            self.set_synchronized(stage, state.is_synchronized(stage));
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StageEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}
