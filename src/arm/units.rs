// Degree <-> encoder-step conversion
//
// Scale factors are fixed at startup from the gear train and encoder
// resolution. Conversions round to whole steps, so a round trip is only
// exact to within one step per joint.

use super::protocol::{ArmError, Result};

/// Highest supported joint count: per-joint wire labels are 'A' + index
/// and must stay below the 'Z' record terminator.
pub const MAX_JOINTS: usize = 25;

/// Per-joint steps-per-degree scale factors, strictly positive and
/// immutable after construction.
#[derive(Debug, Clone)]
pub struct EncoderCalibration {
    steps_per_deg: Vec<f64>,
}

impl EncoderCalibration {
    /// Derive scale factors from the gear train: one gear reduction per
    /// joint, encoder pulses-per-revolution, and quadrature multiplier.
    pub fn new(reductions: &[f64], encoder_ppr: f64, quadrature: f64) -> Result<Self> {
        let steps_per_deg = reductions
            .iter()
            .map(|r| r * encoder_ppr * quadrature / 360.0)
            .collect();
        Self::from_steps_per_degree(steps_per_deg)
    }

    /// Build directly from per-joint steps-per-degree factors.
    pub fn from_steps_per_degree(steps_per_deg: Vec<f64>) -> Result<Self> {
        if steps_per_deg.is_empty() || steps_per_deg.len() > MAX_JOINTS {
            return Err(ArmError::InvalidCalibration(format!(
                "joint count must be 1..={}, got {}",
                MAX_JOINTS,
                steps_per_deg.len()
            )));
        }
        if let Some(bad) = steps_per_deg.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(ArmError::InvalidCalibration(format!(
                "steps-per-degree must be strictly positive, got {bad}"
            )));
        }
        Ok(Self { steps_per_deg })
    }

    pub fn joints(&self) -> usize {
        self.steps_per_deg.len()
    }

    /// Convert joint angles (degrees) to encoder step counts, rounding to
    /// the nearest whole step.
    pub fn degrees_to_steps(&self, degrees: &[f64]) -> Result<Vec<i32>> {
        self.check_len(degrees.len())?;
        Ok(degrees
            .iter()
            .zip(&self.steps_per_deg)
            .map(|(deg, scale)| (deg * scale).round() as i32)
            .collect())
    }

    /// Convert encoder step counts back to joint angles (degrees).
    pub fn steps_to_degrees(&self, steps: &[i32]) -> Result<Vec<f64>> {
        self.check_len(steps.len())?;
        Ok(steps
            .iter()
            .zip(&self.steps_per_deg)
            .map(|(step, scale)| f64::from(*step) / scale)
            .collect())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.joints() {
            return Err(ArmError::DimensionMismatch {
                expected: self.joints(),
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_one_step() {
        let calib =
            EncoderCalibration::from_steps_per_degree(vec![10.0, 36.2, 145.6, 7.5]).unwrap();
        let degrees = [12.34, -87.1, 0.0, 359.99];

        let steps = calib.degrees_to_steps(&degrees).unwrap();
        let back = calib.steps_to_degrees(&steps).unwrap();

        // Rounding to whole steps bounds the error at 1/scale degrees per joint
        for (i, (orig, round_tripped)) in degrees.iter().zip(&back).enumerate() {
            let tolerance = 1.0 / [10.0, 36.2, 145.6, 7.5][i];
            assert!(
                (orig - round_tripped).abs() <= tolerance,
                "joint {}: {} -> {} exceeds tolerance {}",
                i,
                orig,
                round_tripped,
                tolerance
            );
        }
    }

    #[test]
    fn test_gear_train_scale_factor() {
        // reduction 50, ppr 2048, quadrature 5.12 -> 50 * 2048 * 5.12 / 360
        let calib = EncoderCalibration::new(&[50.0], 2048.0, 5.12).unwrap();
        let steps = calib.degrees_to_steps(&[1.0]).unwrap();
        assert_eq!(steps, vec![1456]); // 1456.35... rounded
    }

    #[test]
    fn test_dimension_mismatch() {
        let calib = EncoderCalibration::from_steps_per_degree(vec![10.0, 10.0]).unwrap();

        let err = calib.degrees_to_steps(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(
            err,
            ArmError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        let err = calib.steps_to_degrees(&[1]).unwrap_err();
        assert!(matches!(
            err,
            ArmError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_rejects_bad_calibration() {
        assert!(EncoderCalibration::from_steps_per_degree(vec![]).is_err());
        assert!(EncoderCalibration::from_steps_per_degree(vec![0.0]).is_err());
        assert!(EncoderCalibration::from_steps_per_degree(vec![10.0, -3.0]).is_err());
        assert!(EncoderCalibration::from_steps_per_degree(vec![f64::NAN]).is_err());
        assert!(EncoderCalibration::from_steps_per_degree(vec![1.0; MAX_JOINTS + 1]).is_err());
        assert!(EncoderCalibration::from_steps_per_degree(vec![1.0; MAX_JOINTS]).is_ok());
    }

    #[test]
    fn test_negative_angles() {
        let calib = EncoderCalibration::from_steps_per_degree(vec![10.0]).unwrap();
        assert_eq!(calib.degrees_to_steps(&[-4.5]).unwrap(), vec![-45]);
        assert_eq!(calib.steps_to_degrees(&[-45]).unwrap(), vec![-4.5]);
    }
}
