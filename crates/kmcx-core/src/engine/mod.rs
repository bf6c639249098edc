//! Boundary to the computational engine that owns the physical model.
//!
//! Every engine call reports a [`StatusCode`]. Callers turn codes into
//! [`EngineError`]s with [`StatusCode::check`]: `InvalidInput` is a user
//! problem, anything else non-OK breaks the call contract.

mod offline;

pub use offline::OfflineEngine;

use crate::stages::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    InvalidInput,
    InvalidFileFormat,
    InvalidFileContent,
    ObjectNotReady,
    Other(i32),
}

impl StatusCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::InvalidInput,
            2 => StatusCode::InvalidFileFormat,
            3 => StatusCode::InvalidFileContent,
            4 => StatusCode::ObjectNotReady,
            other => StatusCode::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::InvalidInput => 1,
            StatusCode::InvalidFileFormat => 2,
            StatusCode::InvalidFileContent => 3,
            StatusCode::ObjectNotReady => 4,
            StatusCode::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// `field` names what was being set or run, for the error message.
    pub fn check(self, field: &str) -> Result<(), EngineError> {
        match self {
            StatusCode::Ok => Ok(()),
            StatusCode::InvalidInput => Err(EngineError::InvalidInput {
                field: field.to_string(),
            }),
            code => Err(EngineError::Contract {
                operation: field.to_string(),
                code,
            }),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => f.write_str("OK"),
            StatusCode::InvalidInput => f.write_str("INVALID_INPUT"),
            StatusCode::InvalidFileFormat => f.write_str("INVALID_FILE_FORMAT"),
            StatusCode::InvalidFileContent => f.write_str("INVALID_FILE_CONTENT"),
            StatusCode::ObjectNotReady => f.write_str("OBJECT_NOT_READY"),
            StatusCode::Other(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("The engine rejected the value for '{field}'.")]
    InvalidInput { field: String },

    #[error("Engine call '{operation}' failed with status {code}.")]
    Contract { operation: String, code: StatusCode },

    #[error("The engine lock is poisoned; a previous engine call panicked.")]
    Poisoned,
}

impl EngineError {
    /// Contract violations and poisoned locks leave the engine in an
    /// unknown state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::InvalidInput { .. })
    }
}

/// Scalar job settings the engine accepts. Doping concentrations are set
/// per index through [`EngineHandle::set_doping_concentration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EngineField {
    Temperature,
    AttemptFrequency,
    WriteCheckpoints,
    ResumeFromCheckpoint,
    EFieldMagnitude,
    EFieldDirX,
    EFieldDirY,
    EFieldDirZ,
    LatticeSize,
    AdditionalVacancyCount,
    PreRunMcsp,
    PreRunRecordCount,
    DynNormAttemptCount,
    DynNormRecordCount,
    DynNormEntryIndex,
    MainMcsp,
    MainRecordCount,
}

impl EngineField {
    pub fn name(self) -> &'static str {
        match self {
            EngineField::Temperature => "Temperature",
            EngineField::AttemptFrequency => "AttemptFrequency",
            EngineField::WriteCheckpoints => "WriteCheckpoints",
            EngineField::ResumeFromCheckpoint => "ResumeFromCheckpoint",
            EngineField::EFieldMagnitude => "EFieldMagnitude",
            EngineField::EFieldDirX => "EFieldDirX",
            EngineField::EFieldDirY => "EFieldDirY",
            EngineField::EFieldDirZ => "EFieldDirZ",
            EngineField::LatticeSize => "LatticeSize",
            EngineField::AdditionalVacancyCount => "AdditionalVacancyCount",
            EngineField::PreRunMcsp => "PreRunMCSP",
            EngineField::PreRunRecordCount => "PreRunRecordCount",
            EngineField::DynNormAttemptCount => "DynNormAttemptCount",
            EngineField::DynNormRecordCount => "DynNormRecordCount",
            EngineField::DynNormEntryIndex => "DynNormEntryIndex",
            EngineField::MainMcsp => "MainMCSP",
            EngineField::MainRecordCount => "MainRecordCount",
        }
    }
}

impl fmt::Display for EngineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Flag(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{v:e}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Flag(v) => write!(f, "{v}"),
        }
    }
}

/// The engine's view of the project after an operation: per-stage data
/// plus the coarse project state (0-9).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub project_state: u8,
    pub stages: BTreeMap<Stage, serde_json::Value>,
}

impl EngineSnapshot {
    pub fn stage(&self, stage: Stage) -> Option<&serde_json::Value> {
        self.stages.get(&stage)
    }
}

pub trait EngineHandle: Send {
    fn set_field(&mut self, field: EngineField, value: FieldValue) -> StatusCode;

    fn set_doping_concentration(&mut self, index: usize, value: f64) -> StatusCode;

    fn get_field(&self, field: EngineField) -> Result<FieldValue, StatusCode>;

    /// Finalizes the settings written since the last commit.
    fn commit(&mut self) -> StatusCode;

    fn apply_stage(&mut self, stage: Stage, data: &serde_json::Value) -> StatusCode;

    fn snapshot(&self) -> Result<EngineSnapshot, StatusCode>;

    fn project_state(&self) -> u8;

    /// Renders the committed settings as simulator input file content.
    fn serialize_settings(&self) -> Result<String, StatusCode>;
}

pub type SharedEngine = Arc<Mutex<dyn EngineHandle>>;

pub fn shared<E: EngineHandle + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

pub fn lock(engine: &SharedEngine) -> Result<MutexGuard<'_, dyn EngineHandle + 'static>, EngineError> {
    engine.lock().map_err(|_| EngineError::Poisoned)
}
