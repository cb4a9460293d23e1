use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::db::models::AnalysisStatus;

/// Upper bounds (inclusive, in percent) for each inspection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CorrosionThresholds {
    pub approved: f64,
    pub inspection: f64,
    pub rejected: f64,
}

impl Default for CorrosionThresholds {
    fn default() -> Self {
        Self {
            approved: 30.0,
            inspection: 60.0,
            rejected: 100.0,
        }
    }
}

impl CorrosionThresholds {
    pub fn classify(&self, percentage: f64) -> AnalysisStatus {
        if percentage <= self.approved {
            AnalysisStatus::Approved
        } else if percentage <= self.inspection {
            AnalysisStatus::Inspection
        } else {
            AnalysisStatus::Rejected
        }
    }

    pub fn validate(&self) -> Result<()> {
        let values = [self.approved, self.inspection, self.rejected];
        if values.iter().any(|v| !v.is_finite()) {
            bail!("thresholds must be finite numbers");
        }
        if self.approved < 0.0 || self.rejected > 100.0 {
            bail!("thresholds must lie within 0..=100");
        }
        if self.approved > self.inspection || self.inspection > self.rejected {
            bail!(
                "thresholds must be ordered approved <= inspection <= rejected (got {} / {} / {})",
                self.approved,
                self.inspection,
                self.rejected
            );
        }
        Ok(())
    }
}

/// Clamp to 0..=100 and round to two decimals.
pub fn normalize_percentage(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn boundaries_are_inclusive() {
        let thresholds = CorrosionThresholds::default();
        assert_eq!(thresholds.classify(0.0), AnalysisStatus::Approved);
        assert_eq!(thresholds.classify(30.0), AnalysisStatus::Approved);
        assert_eq!(thresholds.classify(30.01), AnalysisStatus::Inspection);
        assert_eq!(thresholds.classify(60.0), AnalysisStatus::Inspection);
        assert_eq!(thresholds.classify(60.5), AnalysisStatus::Rejected);
        assert_eq!(thresholds.classify(100.0), AnalysisStatus::Rejected);
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let thresholds = CorrosionThresholds {
            approved: 70.0,
            inspection: 60.0,
            rejected: 100.0,
        };
        assert!(thresholds.validate().is_err());

        let out_of_range = CorrosionThresholds {
            approved: 30.0,
            inspection: 60.0,
            rejected: 120.0,
        };
        assert!(out_of_range.validate().is_err());
        assert!(CorrosionThresholds::default().validate().is_ok());
    }

    #[test]
    fn normalizes_percentages() {
        assert_eq!(normalize_percentage(12.3456), 12.35);
        assert_eq!(normalize_percentage(-4.0), 0.0);
        assert_eq!(normalize_percentage(140.0), 100.0);
        assert_eq!(normalize_percentage(f64::NAN), 0.0);
    }

    proptest! {
        #[test]
        fn classification_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
            let thresholds = CorrosionThresholds::default();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(thresholds.classify(low).severity() <= thresholds.classify(high).severity());
        }
    }
}
