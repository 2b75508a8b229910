use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{Record, Result};

/// Default off-target count range
pub const DEFAULT_OFF_TARGET_RANGE: (u64, u64) = (0, 99);
/// Default secondary structure free-energy range, relative to the hybridization dG
pub const DEFAULT_FREE_ENERGY_RANGE: (f64, f64) = (0.0, 0.5);

/// Parameters normalizing oligo metrics into a score
///
/// Scores are `0` for ideal oligos, grow linearly up to `1` within the
/// allowed ranges, and are `+inf` outside of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSettings {
    /// Off-target counts: at most `.0` is ideal, above `.1` is excluded
    pub off_target_range: (u64, u64),
    /// Secondary structure free energy bounds
    ///
    /// Non-negative values are fractions of the hybridization dG (`Tm_dG`),
    /// negative values are absolute kcal/mol.
    pub free_energy_range: (f64, f64),
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            off_target_range: DEFAULT_OFF_TARGET_RANGE,
            free_energy_range: DEFAULT_FREE_ENERGY_RANGE,
        }
    }
}

impl ScoreSettings {
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = self.off_target_range;
        if lo > hi {
            return Err(ConfigError::InvalidOffTargetRange(lo, hi).into());
        }
        let (g0, g1) = self.free_energy_range;
        let valid = if g0 >= 0.0 && g1 >= 0.0 {
            g0 <= 1.0 && g1 <= 1.0 && g1 >= g0
        } else if g0 < 0.0 && g1 < 0.0 {
            g1 <= g0
        } else {
            false
        };
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidFreeEnergyRange(g0, g1).into())
        }
    }

    /// Off-target term of the score
    #[must_use]
    pub fn off_target_score(&self, record: &Record) -> f64 {
        let (lo, hi) = self.off_target_range;
        if record.off_target_no <= lo {
            0.0
        } else if record.off_target_no > hi {
            f64::INFINITY
        } else {
            normalize(record.off_target_no as f64, lo as f64, hi as f64)
        }
    }

    /// Secondary structure term of the score
    #[must_use]
    pub fn structure_score(&self, record: &Record) -> f64 {
        let ss_dg = f64::from(record.ss_dg);
        let (g0, g1) = self.free_energy_range;
        let (most_stable, least_stable) = if g0 >= 0.0 {
            let tm_dg = f64::from(record.tm_dg);
            (tm_dg * g0.min(g1), tm_dg * g0.max(g1))
        } else {
            (g0, g1)
        };
        if ss_dg >= most_stable {
            0.0
        } else if ss_dg < least_stable {
            f64::INFINITY
        } else {
            normalize(ss_dg, most_stable, least_stable)
        }
    }

    /// Mean of the off-target and structure terms
    #[must_use]
    pub fn score(&self, record: &Record) -> f64 {
        let off_target = self.off_target_score(record);
        let structure = self.structure_score(record);
        if off_target.is_infinite() || structure.is_infinite() {
            return f64::INFINITY;
        }
        (off_target + structure) / 2.0
    }
}

fn normalize(value: f64, low: f64, high: f64) -> f64 {
    let span = high - low;
    if span == 0.0 {
        0.0
    } else {
        (value - low) / span
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn record(off_target_no: u64, tm_dg: f32, ss_dg: f32) -> Record {
        Record {
            off_target_no,
            tm_dg,
            ss_dg,
            ..Record::default()
        }
    }

    #[test]
    fn test_off_target_term() {
        let settings = ScoreSettings {
            off_target_range: (10, 20),
            ..ScoreSettings::default()
        };
        assert!(settings.off_target_score(&record(5, -40.0, 0.0)).abs() < 1e-12);
        assert!((settings.off_target_score(&record(15, -40.0, 0.0)) - 0.5).abs() < 1e-12);
        assert!(settings.off_target_score(&record(21, -40.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_relative_structure_term() {
        let settings = ScoreSettings::default();
        // bounds are 0 and -20 for a hybridization dG of -40
        assert!(settings.structure_score(&record(0, -40.0, 1.0)).abs() < 1e-12);
        assert!((settings.structure_score(&record(0, -40.0, -5.0)) - 0.25).abs() < 1e-12);
        assert!(settings.structure_score(&record(0, -40.0, -25.0)).is_infinite());
    }

    #[test]
    fn test_absolute_structure_term() {
        let settings = ScoreSettings {
            free_energy_range: (-2.0, -6.0),
            ..ScoreSettings::default()
        };
        assert!(settings.structure_score(&record(0, -40.0, -1.0)).abs() < 1e-12);
        assert!((settings.structure_score(&record(0, -40.0, -3.0)) - 0.25).abs() < 1e-12);
        assert!(settings.structure_score(&record(0, -40.0, -7.0)).is_infinite());
    }

    #[test]
    fn test_combined_score() {
        let settings = ScoreSettings::default();
        let score = settings.score(&record(99, -40.0, -10.0));
        assert!((score - 0.75).abs() < 1e-12);
        assert!(settings.score(&record(100, -40.0, 0.0)).is_infinite());
        assert!(settings.score(&record(0, -40.0, -30.0)).is_infinite());
        let score = settings.score(&record(0, -40.0, 0.0));
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_validation() {
        let mut settings = ScoreSettings::default();
        assert!(settings.validate().is_ok());
        settings.off_target_range = (5, 1);
        assert!(settings.validate().is_err());
        settings.off_target_range = (0, 1);
        settings.free_energy_range = (0.5, 0.1);
        assert!(settings.validate().is_err());
        settings.free_energy_range = (-1.0, 0.5);
        assert!(settings.validate().is_err());
        settings.free_energy_range = (0.0, 1.5);
        assert!(settings.validate().is_err());
        settings.free_energy_range = (-1.0, -3.0);
        assert!(settings.validate().is_ok());
    }
}
