//! Validated simulation job settings.
//!
//! Every setter checks its value against [`ranges`] and leaves the job
//! untouched when the value is rejected, so a `JobConfiguration` is always
//! within range.

mod batch;
pub mod ranges;

pub use batch::{load_batch, JobBatch};

use crate::engine::{EngineError, EngineField, EngineHandle, FieldValue};
use crate::errors::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct JobId(u32);

impl JobId {
    pub const FIRST: JobId = JobId(1);

    pub fn new(value: u32) -> Result<Self, DomainError> {
        ranges::ID.check(value).map(JobId)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for JobId {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        JobId::new(value)
    }
}

impl From<JobId> for u32 {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDoping", into = "RawDoping")]
pub struct DopingEntry {
    concentration: f64,
    description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDoping {
    concentration: f64,
    #[serde(default)]
    description: String,
}

impl TryFrom<RawDoping> for DopingEntry {
    type Error = DomainError;

    fn try_from(raw: RawDoping) -> Result<Self, Self::Error> {
        DopingEntry::new(raw.concentration, raw.description)
    }
}

impl From<DopingEntry> for RawDoping {
    fn from(entry: DopingEntry) -> Self {
        RawDoping {
            concentration: entry.concentration,
            description: entry.description,
        }
    }
}

impl DopingEntry {
    pub fn new(concentration: f64, description: impl Into<String>) -> Result<Self, DomainError> {
        Ok(Self {
            concentration: ranges::DOPING_CONCENTRATION.check(concentration)?,
            description: description.into(),
        })
    }

    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_concentration(&mut self, value: f64) -> Result<(), DomainError> {
        self.concentration = ranges::DOPING_CONCENTRATION.check(value)?;
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }
}

/// One simulation job. Construct with [`JobConfiguration::draft`] or by
/// deserializing; both paths go through the range checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawJob", into = "RawJob")]
pub struct JobConfiguration {
    id: JobId,
    temperature: f64,
    attempt_frequency: f64,
    write_checkpoints: bool,
    resume_from_checkpoint: bool,
    efield_magnitude: f64,
    efield_direction: [f64; 3],
    lattice_size: u32,
    additional_vacancy_count: i32,
    pre_run_mcsp: u64,
    pre_run_record_count: u32,
    dyn_norm_attempt_count: u64,
    dyn_norm_record_count: u32,
    dyn_norm_entry_index: u32,
    main_mcsp: u64,
    main_record_count: u32,
    dopings: Vec<DopingEntry>,
}

impl Default for JobConfiguration {
    fn default() -> Self {
        Self::draft()
    }
}

impl JobConfiguration {
    /// Settings for a new job, before the user edits anything.
    pub fn draft() -> Self {
        Self {
            id: JobId::FIRST,
            temperature: 273.0,
            attempt_frequency: 1e13,
            write_checkpoints: false,
            resume_from_checkpoint: false,
            efield_magnitude: 0.0,
            efield_direction: [0.0, 0.0, 0.0],
            lattice_size: 10,
            additional_vacancy_count: 0,
            pre_run_mcsp: 0,
            pre_run_record_count: 0,
            dyn_norm_attempt_count: 0,
            dyn_norm_record_count: 0,
            dyn_norm_entry_index: 0,
            main_mcsp: 200,
            main_record_count: 0,
            dopings: Vec::new(),
        }
    }

    /// Independent deep copy, including every doping entry.
    pub fn get_copy(&self) -> Self {
        Self {
            dopings: self.dopings.iter().map(DopingEntry::clone).collect(),
            ..*self
        }
    }

    pub fn with_id(&self, id: JobId) -> Self {
        Self { id, ..self.get_copy() }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn set_id(&mut self, value: u32) -> Result<(), DomainError> {
        self.id = JobId::new(value)?;
        Ok(())
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, value: f64) -> Result<(), DomainError> {
        self.temperature = ranges::TEMPERATURE.check(value)?;
        Ok(())
    }

    pub fn attempt_frequency(&self) -> f64 {
        self.attempt_frequency
    }

    pub fn set_attempt_frequency(&mut self, value: f64) -> Result<(), DomainError> {
        self.attempt_frequency = ranges::ATTEMPT_FREQUENCY.check(value)?;
        Ok(())
    }

    pub fn write_checkpoints(&self) -> bool {
        self.write_checkpoints
    }

    pub fn set_write_checkpoints(&mut self, value: bool) {
        self.write_checkpoints = value;
    }

    pub fn resume_from_checkpoint(&self) -> bool {
        self.resume_from_checkpoint
    }

    pub fn set_resume_from_checkpoint(&mut self, value: bool) {
        self.resume_from_checkpoint = value;
    }

    pub fn efield_magnitude(&self) -> f64 {
        self.efield_magnitude
    }

    pub fn set_efield_magnitude(&mut self, value: f64) -> Result<(), DomainError> {
        self.efield_magnitude = ranges::EFIELD_MAGNITUDE.check(value)?;
        Ok(())
    }

    pub fn efield_direction(&self) -> [f64; 3] {
        self.efield_direction
    }

    /// All three components are checked before any is stored.
    pub fn set_efield_direction(&mut self, x: f64, y: f64, z: f64) -> Result<(), DomainError> {
        let checked = [
            ranges::EFIELD_DIR_X.check(x)?,
            ranges::EFIELD_DIR_Y.check(y)?,
            ranges::EFIELD_DIR_Z.check(z)?,
        ];
        self.efield_direction = checked;
        Ok(())
    }

    pub fn lattice_size(&self) -> u32 {
        self.lattice_size
    }

    pub fn set_lattice_size(&mut self, value: u32) -> Result<(), DomainError> {
        self.lattice_size = ranges::LATTICE_SIZE.check(value)?;
        Ok(())
    }

    pub fn additional_vacancy_count(&self) -> i32 {
        self.additional_vacancy_count
    }

    pub fn set_additional_vacancy_count(&mut self, value: i32) -> Result<(), DomainError> {
        self.additional_vacancy_count = ranges::ADDITIONAL_VACANCY_COUNT.check(value)?;
        Ok(())
    }

    pub fn pre_run_mcsp(&self) -> u64 {
        self.pre_run_mcsp
    }

    pub fn set_pre_run_mcsp(&mut self, value: u64) -> Result<(), DomainError> {
        self.pre_run_mcsp = ranges::PRE_RUN_MCSP.check(value)?;
        Ok(())
    }

    pub fn pre_run_record_count(&self) -> u32 {
        self.pre_run_record_count
    }

    pub fn set_pre_run_record_count(&mut self, value: u32) -> Result<(), DomainError> {
        self.pre_run_record_count = ranges::PRE_RUN_RECORD_COUNT.check(value)?;
        Ok(())
    }

    pub fn dyn_norm_attempt_count(&self) -> u64 {
        self.dyn_norm_attempt_count
    }

    pub fn set_dyn_norm_attempt_count(&mut self, value: u64) -> Result<(), DomainError> {
        self.dyn_norm_attempt_count = ranges::DYN_NORM_ATTEMPT_COUNT.check(value)?;
        Ok(())
    }

    pub fn dyn_norm_record_count(&self) -> u32 {
        self.dyn_norm_record_count
    }

    pub fn set_dyn_norm_record_count(&mut self, value: u32) -> Result<(), DomainError> {
        self.dyn_norm_record_count = ranges::DYN_NORM_RECORD_COUNT.check(value)?;
        Ok(())
    }

    pub fn dyn_norm_entry_index(&self) -> u32 {
        self.dyn_norm_entry_index
    }

    pub fn set_dyn_norm_entry_index(&mut self, value: u32) -> Result<(), DomainError> {
        self.dyn_norm_entry_index = ranges::DYN_NORM_ENTRY_INDEX.check(value)?;
        Ok(())
    }

    pub fn main_mcsp(&self) -> u64 {
        self.main_mcsp
    }

    pub fn set_main_mcsp(&mut self, value: u64) -> Result<(), DomainError> {
        self.main_mcsp = ranges::MAIN_MCSP.check(value)?;
        Ok(())
    }

    pub fn main_record_count(&self) -> u32 {
        self.main_record_count
    }

    pub fn set_main_record_count(&mut self, value: u32) -> Result<(), DomainError> {
        self.main_record_count = ranges::MAIN_RECORD_COUNT.check(value)?;
        Ok(())
    }

    pub fn dopings(&self) -> &[DopingEntry] {
        &self.dopings
    }

    pub fn push_doping(&mut self, entry: DopingEntry) {
        self.dopings.push(entry);
    }

    pub fn remove_doping(&mut self, index: usize) -> Result<DopingEntry, DomainError> {
        if index >= self.dopings.len() {
            return Err(DomainError::DopingIndex(index));
        }
        Ok(self.dopings.remove(index))
    }

    pub fn set_doping_concentration(&mut self, index: usize, value: f64) -> Result<(), DomainError> {
        self.dopings
            .get_mut(index)
            .ok_or(DomainError::DopingIndex(index))?
            .set_concentration(value)
    }

    fn leading_settings(&self) -> [(EngineField, FieldValue); 9] {
        let [x, y, z] = self.efield_direction;
        [
            (EngineField::Temperature, FieldValue::Float(self.temperature)),
            (
                EngineField::AttemptFrequency,
                FieldValue::Float(self.attempt_frequency),
            ),
            (
                EngineField::WriteCheckpoints,
                FieldValue::Flag(self.write_checkpoints),
            ),
            (
                EngineField::ResumeFromCheckpoint,
                FieldValue::Flag(self.resume_from_checkpoint),
            ),
            (
                EngineField::EFieldMagnitude,
                FieldValue::Float(self.efield_magnitude),
            ),
            (EngineField::EFieldDirX, FieldValue::Float(x)),
            (EngineField::EFieldDirY, FieldValue::Float(y)),
            (EngineField::EFieldDirZ, FieldValue::Float(z)),
            (
                EngineField::LatticeSize,
                FieldValue::Int(i64::from(self.lattice_size)),
            ),
        ]
    }

    fn trailing_settings(&self) -> [(EngineField, FieldValue); 7] {
        let int = |v: u64| FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX));
        [
            (EngineField::PreRunMcsp, int(self.pre_run_mcsp)),
            (
                EngineField::PreRunRecordCount,
                int(u64::from(self.pre_run_record_count)),
            ),
            (
                EngineField::DynNormAttemptCount,
                int(self.dyn_norm_attempt_count),
            ),
            (
                EngineField::DynNormRecordCount,
                int(u64::from(self.dyn_norm_record_count)),
            ),
            (
                EngineField::DynNormEntryIndex,
                int(u64::from(self.dyn_norm_entry_index)),
            ),
            (EngineField::MainMcsp, int(self.main_mcsp)),
            (
                EngineField::MainRecordCount,
                int(u64::from(self.main_record_count)),
            ),
        ]
    }

    /// Writes every setting into the engine and commits.
    ///
    /// Order: temperature, attempt frequency, checkpoint flags, E-field,
    /// lattice size, additional vacancies, each doping concentration in
    /// index order, pre-run, dynamic normalization, main run. Stops at the
    /// first non-OK status without committing.
    pub fn apply_data(&self, engine: &mut dyn EngineHandle) -> Result<(), EngineError> {
        for (field, value) in self.leading_settings() {
            engine.set_field(field, value).check(field.name())?;
        }

        let vacancies = EngineField::AdditionalVacancyCount;
        engine
            .set_field(
                vacancies,
                FieldValue::Int(i64::from(self.additional_vacancy_count)),
            )
            .check(vacancies.name())?;

        for (index, doping) in self.dopings.iter().enumerate() {
            engine
                .set_doping_concentration(index, doping.concentration)
                .check(&format!("DopingConcentration[{index}]"))?;
        }

        for (field, value) in self.trailing_settings() {
            engine.set_field(field, value).check(field.name())?;
        }

        engine.commit().check("Commit")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct RawJob {
    id: u32,
    temperature: f64,
    attempt_frequency: f64,
    write_checkpoints: bool,
    resume_from_checkpoint: bool,
    efield_magnitude: f64,
    efield_direction: [f64; 3],
    lattice_size: u32,
    additional_vacancy_count: i32,
    pre_run_mcsp: u64,
    pre_run_record_count: u32,
    dyn_norm_attempt_count: u64,
    dyn_norm_record_count: u32,
    dyn_norm_entry_index: u32,
    main_mcsp: u64,
    main_record_count: u32,
    dopings: Vec<DopingEntry>,
}

impl Default for RawJob {
    fn default() -> Self {
        JobConfiguration::draft().into()
    }
}

impl TryFrom<RawJob> for JobConfiguration {
    type Error = DomainError;

    fn try_from(raw: RawJob) -> Result<Self, Self::Error> {
        let mut job = JobConfiguration::draft();
        job.set_id(raw.id)?;
        job.set_temperature(raw.temperature)?;
        job.set_attempt_frequency(raw.attempt_frequency)?;
        job.set_write_checkpoints(raw.write_checkpoints);
        job.set_resume_from_checkpoint(raw.resume_from_checkpoint);
        job.set_efield_magnitude(raw.efield_magnitude)?;
        let [x, y, z] = raw.efield_direction;
        job.set_efield_direction(x, y, z)?;
        job.set_lattice_size(raw.lattice_size)?;
        job.set_additional_vacancy_count(raw.additional_vacancy_count)?;
        job.set_pre_run_mcsp(raw.pre_run_mcsp)?;
        job.set_pre_run_record_count(raw.pre_run_record_count)?;
        job.set_dyn_norm_attempt_count(raw.dyn_norm_attempt_count)?;
        job.set_dyn_norm_record_count(raw.dyn_norm_record_count)?;
        job.set_dyn_norm_entry_index(raw.dyn_norm_entry_index)?;
        job.set_main_mcsp(raw.main_mcsp)?;
        job.set_main_record_count(raw.main_record_count)?;
        job.dopings = raw.dopings;
        Ok(job)
    }
}

impl From<JobConfiguration> for RawJob {
    fn from(job: JobConfiguration) -> Self {
        RawJob {
            id: job.id.get(),
            temperature: job.temperature,
            attempt_frequency: job.attempt_frequency,
            write_checkpoints: job.write_checkpoints,
            resume_from_checkpoint: job.resume_from_checkpoint,
            efield_magnitude: job.efield_magnitude,
            efield_direction: job.efield_direction,
            lattice_size: job.lattice_size,
            additional_vacancy_count: job.additional_vacancy_count,
            pre_run_mcsp: job.pre_run_mcsp,
            pre_run_record_count: job.pre_run_record_count,
            dyn_norm_attempt_count: job.dyn_norm_attempt_count,
            dyn_norm_record_count: job.dyn_norm_record_count,
            dyn_norm_entry_index: job.dyn_norm_entry_index,
            main_mcsp: job.main_mcsp,
            main_record_count: job.main_record_count,
            dopings: job.dopings,
        }
    }
}
