//! Segment control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::SegCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for segment control
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Maximum forward speed demand
    pub max_lin_vel_ms: f64,

    /// Maximum turn rate demand, in either direction
    pub max_ang_vel_rads: f64,

    /// Distance to a target under which the target is considered reached
    pub goal_radius_m: f64,

    /// Heading controller proportional gain
    pub k_p: f64,

    /// Heading controller integral gain
    pub k_i: f64,

    /// Heading controller derivative gain
    pub k_d: f64,

    /// Heading error at and above which the forward speed demand is zero. Below it the speed
    /// falls linearly from the maximum at zero error.
    pub head_threshold_rad: f64,

    /// Limit on the magnitude of the heading controller's integral accumulation
    pub integral_limit: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            max_lin_vel_ms: 0.8,
            max_ang_vel_rads: 1.0,
            goal_radius_m: 0.2,
            k_p: 5.0,
            k_i: 0.0,
            k_d: 1.0,
            head_threshold_rad: std::f64::consts::FRAC_PI_4,
            integral_limit: 1.0,
        }
    }
}

impl Params {
    /// Check that every parameter is finite and non-negative.
    pub fn validate(&self) -> Result<(), SegCtrlError> {
        let fields = [
            ("max_lin_vel_ms", self.max_lin_vel_ms),
            ("max_ang_vel_rads", self.max_ang_vel_rads),
            ("goal_radius_m", self.goal_radius_m),
            ("k_p", self.k_p),
            ("k_i", self.k_i),
            ("k_d", self.k_d),
            ("head_threshold_rad", self.head_threshold_rad),
            ("integral_limit", self.integral_limit),
        ];

        for (name, value) in fields.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(SegCtrlError::InvalidConfig(format!(
                    "{} must be finite and non-negative, found {}",
                    name, value
                )))
            }
        }

        Ok(())
    }
}
