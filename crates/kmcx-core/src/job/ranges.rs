//! Inclusive value ranges for every validated job field.

use crate::errors::DomainError;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange<T> {
    pub field: &'static str,
    pub min: T,
    pub max: T,
}

impl<T> FieldRange<T>
where
    T: PartialOrd + Copy + Display,
{
    pub const fn new(field: &'static str, min: T, max: T) -> Self {
        Self { field, min, max }
    }

    /// Returns the value if it lies in `[min, max]`. NaN never does.
    pub fn check(&self, value: T) -> Result<T, DomainError> {
        if value >= self.min && value <= self.max {
            Ok(value)
        } else {
            Err(DomainError::OutOfRange {
                field: self.field,
                value: value.to_string(),
                min: self.min.to_string(),
                max: self.max.to_string(),
            })
        }
    }

    pub fn contains(&self, value: T) -> bool {
        self.check(value).is_ok()
    }
}

pub const ID: FieldRange<u32> = FieldRange::new("ID", 1, 100_000);
pub const TEMPERATURE: FieldRange<f64> = FieldRange::new("Temperature", 0.001, 10_000.0);
pub const ATTEMPT_FREQUENCY: FieldRange<f64> = FieldRange::new("AttemptFrequency", 0.001, 1e34);
pub const EFIELD_MAGNITUDE: FieldRange<f64> = FieldRange::new("EFieldMagnitude", 0.0, 1000.0);
pub const EFIELD_DIR_X: FieldRange<f64> = FieldRange::new("EFieldDirX", -1e150, 1e150);
pub const EFIELD_DIR_Y: FieldRange<f64> = FieldRange::new("EFieldDirY", -1e150, 1e150);
pub const EFIELD_DIR_Z: FieldRange<f64> = FieldRange::new("EFieldDirZ", -1e150, 1e150);
pub const LATTICE_SIZE: FieldRange<u32> = FieldRange::new("LatticeSize", 1, 65);
pub const ADDITIONAL_VACANCY_COUNT: FieldRange<i32> =
    FieldRange::new("AdditionalVacancyCount", -1_000_000, 1_000_000);
pub const PRE_RUN_MCSP: FieldRange<u64> = FieldRange::new("PreRunMCSP", 0, 5_000_000);
pub const PRE_RUN_RECORD_COUNT: FieldRange<u32> = FieldRange::new("PreRunRecordCount", 0, 10_000);
pub const DYN_NORM_ATTEMPT_COUNT: FieldRange<u64> =
    FieldRange::new("DynNormAttemptCount", 0, 5_000_000_000);
pub const DYN_NORM_RECORD_COUNT: FieldRange<u32> =
    FieldRange::new("DynNormRecordCount", 0, 10_000);
pub const DYN_NORM_ENTRY_INDEX: FieldRange<u32> = FieldRange::new("DynNormEntryIndex", 0, 10_000);
pub const MAIN_MCSP: FieldRange<u64> = FieldRange::new("MainMCSP", 1, 5_000_000);
pub const MAIN_RECORD_COUNT: FieldRange<u32> = FieldRange::new("MainRecordCount", 0, 10_000);
pub const DOPING_CONCENTRATION: FieldRange<f64> =
    FieldRange::new("DopingConcentration", 0.0, 1.0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(LATTICE_SIZE.contains(1));
        assert!(LATTICE_SIZE.contains(65));
        assert!(!LATTICE_SIZE.contains(0));
        assert!(!LATTICE_SIZE.contains(66));
        assert!(TEMPERATURE.contains(0.001));
        assert!(!TEMPERATURE.contains(0.0));
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(!DOPING_CONCENTRATION.contains(f64::NAN));
        assert!(!EFIELD_DIR_X.contains(f64::NAN));
    }

    #[test]
    fn test_error_names_field() {
        let err = MAIN_MCSP.check(0).unwrap_err();
        match err {
            DomainError::OutOfRange {
                field, value, min, max,
            } => {
                assert_eq!(field, "MainMCSP");
                assert_eq!(value, "0");
                assert_eq!(min, "1");
                assert_eq!(max, "5000000");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
