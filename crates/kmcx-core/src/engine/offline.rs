use super::{EngineField, EngineHandle, EngineSnapshot, FieldValue, StatusCode};
use crate::job::ranges;
use crate::stages::Stage;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// In-process engine used when no native engine is linked.
///
/// Validates field values against the job ranges, keeps applied stage data
/// in pipeline order and renders committed settings as `key = value` lines.
#[derive(Debug, Default, Clone)]
pub struct OfflineEngine {
    pending_fields: BTreeMap<EngineField, FieldValue>,
    pending_dopings: BTreeMap<usize, f64>,
    committed: Option<Committed>,
    applied: Vec<Value>,
    revision: u64,
}

#[derive(Debug, Clone)]
struct Committed {
    fields: BTreeMap<EngineField, FieldValue>,
    dopings: BTreeMap<usize, f64>,
}

impl OfflineEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with the first `count` stages applied using empty data.
    pub fn prepared(count: usize) -> Self {
        let mut engine = Self::new();
        for stage in Stage::ALL.into_iter().take(count) {
            engine.apply_stage(stage, &json!({}));
        }
        engine
    }

    fn accepts(field: EngineField, value: FieldValue) -> bool {
        use EngineField as F;
        use FieldValue as V;

        let int_in = |v: i64, range: ranges::FieldRange<u32>| {
            u32::try_from(v).is_ok_and(|v| range.contains(v))
        };
        let long_in = |v: i64, range: ranges::FieldRange<u64>| {
            u64::try_from(v).is_ok_and(|v| range.contains(v))
        };

        match (field, value) {
            (F::Temperature, V::Float(v)) => ranges::TEMPERATURE.contains(v),
            (F::AttemptFrequency, V::Float(v)) => ranges::ATTEMPT_FREQUENCY.contains(v),
            (F::WriteCheckpoints | F::ResumeFromCheckpoint, V::Flag(_)) => true,
            (F::EFieldMagnitude, V::Float(v)) => ranges::EFIELD_MAGNITUDE.contains(v),
            (F::EFieldDirX, V::Float(v)) => ranges::EFIELD_DIR_X.contains(v),
            (F::EFieldDirY, V::Float(v)) => ranges::EFIELD_DIR_Y.contains(v),
            (F::EFieldDirZ, V::Float(v)) => ranges::EFIELD_DIR_Z.contains(v),
            (F::LatticeSize, V::Int(v)) => int_in(v, ranges::LATTICE_SIZE),
            (F::AdditionalVacancyCount, V::Int(v)) => {
                i32::try_from(v).is_ok_and(|v| ranges::ADDITIONAL_VACANCY_COUNT.contains(v))
            }
            (F::PreRunMcsp, V::Int(v)) => long_in(v, ranges::PRE_RUN_MCSP),
            (F::PreRunRecordCount, V::Int(v)) => int_in(v, ranges::PRE_RUN_RECORD_COUNT),
            (F::DynNormAttemptCount, V::Int(v)) => long_in(v, ranges::DYN_NORM_ATTEMPT_COUNT),
            (F::DynNormRecordCount, V::Int(v)) => int_in(v, ranges::DYN_NORM_RECORD_COUNT),
            (F::DynNormEntryIndex, V::Int(v)) => int_in(v, ranges::DYN_NORM_ENTRY_INDEX),
            (F::MainMcsp, V::Int(v)) => long_in(v, ranges::MAIN_MCSP),
            (F::MainRecordCount, V::Int(v)) => int_in(v, ranges::MAIN_RECORD_COUNT),
            _ => false,
        }
    }
}

impl EngineHandle for OfflineEngine {
    fn set_field(&mut self, field: EngineField, value: FieldValue) -> StatusCode {
        if !Self::accepts(field, value) {
            return StatusCode::InvalidInput;
        }
        self.pending_fields.insert(field, value);
        StatusCode::Ok
    }

    fn set_doping_concentration(&mut self, index: usize, value: f64) -> StatusCode {
        if !ranges::DOPING_CONCENTRATION.contains(value) {
            return StatusCode::InvalidInput;
        }
        self.pending_dopings.insert(index, value);
        StatusCode::Ok
    }

    fn get_field(&self, field: EngineField) -> Result<FieldValue, StatusCode> {
        self.pending_fields
            .get(&field)
            .or_else(|| self.committed.as_ref().and_then(|c| c.fields.get(&field)))
            .copied()
            .ok_or(StatusCode::ObjectNotReady)
    }

    fn commit(&mut self) -> StatusCode {
        if self.applied.is_empty() {
            return StatusCode::ObjectNotReady;
        }
        self.committed = Some(Committed {
            fields: std::mem::take(&mut self.pending_fields),
            dopings: std::mem::take(&mut self.pending_dopings),
        });
        StatusCode::Ok
    }

    fn apply_stage(&mut self, stage: Stage, data: &Value) -> StatusCode {
        if stage.index() > self.applied.len() {
            return StatusCode::ObjectNotReady;
        }
        if !(data.is_object() || data.is_null()) {
            return StatusCode::InvalidInput;
        }
        self.applied.truncate(stage.index());
        self.applied.push(data.clone());
        self.revision += 1;
        StatusCode::Ok
    }

    fn snapshot(&self) -> Result<EngineSnapshot, StatusCode> {
        let stages = Stage::ALL
            .into_iter()
            .map(|stage| {
                let data = self
                    .applied
                    .get(stage.index())
                    .cloned()
                    .unwrap_or_else(|| json!({ "revision": self.revision }));
                (stage, data)
            })
            .collect();
        Ok(EngineSnapshot {
            project_state: self.project_state(),
            stages,
        })
    }

    fn project_state(&self) -> u8 {
        match self.applied.len() {
            0 => 0,
            1 => 1,
            2 => 2,
            3 => 4,
            4 => 5,
            _ if self.committed.is_some() => 7,
            _ => 6,
        }
    }

    fn serialize_settings(&self) -> Result<String, StatusCode> {
        let committed = self.committed.as_ref().ok_or(StatusCode::ObjectNotReady)?;
        let mut out = String::new();
        for (field, value) in &committed.fields {
            let _ = writeln!(out, "{} = {}", field, value);
        }
        for (index, value) in &committed.dopings {
            let _ = writeln!(out, "DopingConcentration[{}] = {:e}", index, value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_fields() {
        let mut engine = OfflineEngine::new();
        assert_eq!(
            engine.set_field(EngineField::LatticeSize, FieldValue::Int(66)),
            StatusCode::InvalidInput
        );
        assert_eq!(
            engine.set_field(EngineField::Temperature, FieldValue::Int(300)),
            StatusCode::InvalidInput
        );
        assert_eq!(
            engine.set_field(EngineField::LatticeSize, FieldValue::Int(65)),
            StatusCode::Ok
        );
        assert_eq!(
            engine.set_doping_concentration(0, 1.5),
            StatusCode::InvalidInput
        );
    }

    #[test]
    fn test_stage_order_and_project_state() {
        let mut engine = OfflineEngine::new();
        assert_eq!(
            engine.apply_stage(Stage::ShellCounts, &json!({})),
            StatusCode::ObjectNotReady
        );
        assert_eq!(engine.apply_stage(Stage::JobDesc, &json!({})), StatusCode::Ok);
        assert_eq!(engine.project_state(), 1);

        let engine = OfflineEngine::prepared(3);
        assert_eq!(engine.project_state(), 4);
    }

    #[test]
    fn test_reapplying_stage_drops_later_data() {
        let mut engine = OfflineEngine::prepared(4);
        assert_eq!(
            engine.apply_stage(Stage::Structure, &json!({"cell": 2})),
            StatusCode::Ok
        );
        assert_eq!(engine.project_state(), 2);
        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.stage(Stage::Structure), Some(&json!({"cell": 2})));
        assert_eq!(
            snapshot.stage(Stage::ShellCounts),
            Some(&json!({"revision": 5}))
        );
    }

    #[test]
    fn test_serialize_requires_commit() {
        let mut engine = OfflineEngine::prepared(5);
        assert_eq!(engine.serialize_settings(), Err(StatusCode::ObjectNotReady));

        engine.set_field(EngineField::MainMcsp, FieldValue::Int(200));
        engine.set_doping_concentration(0, 0.25);
        assert_eq!(engine.commit(), StatusCode::Ok);
        assert_eq!(engine.project_state(), 7);

        let text = engine.serialize_settings().unwrap();
        assert!(text.contains("MainMCSP = 200"));
        assert!(text.contains("DopingConcentration[0] = 2.5e-1"));
        assert_eq!(
            engine.get_field(EngineField::MainMcsp),
            Ok(FieldValue::Int(200))
        );
    }
}
