//! # Segment control module
//!
//! Segment control drives one robot through its assigned path, one segment target at a time.
//! Each cycle it takes the robot's pose and produces a velocity command:
//!
//! - Away from the target, a PID controller on the heading error to the target produces the turn
//!   rate, and the forward speed is scaled down as the heading error grows so the robot doesn't
//!   drive away from the target while turning.
//! - Within the goal radius of the target, the target's preconditions are checked against the
//!   progress of the other robots. If they hold the controller advances to the next target,
//!   otherwise it holds in place until they do.
//!
//! The number of targets passed is the robot's step count, which is published to the rest of
//! the fleet by the coordinator.
//!
//! Execution is gated by the mode:
//!
//! - `Run` follows the path continuously.
//! - `Stop` commands zero velocity.
//! - `Step` follows the path until one target has been passed, then behaves as `Stop` until the
//!   mode is set again.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod pid;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
pub use params::Params;
pub use pid::PidController;
pub use state::*;
use crate::path::PathError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Planar pose of a robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Pose {
    /// Position in meters
    pub position_m: Vector2<f64>,

    /// Heading in radians from the +X axis, anticlockwise positive
    pub heading_rad: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Execution mode of a segment controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Mode {
    Run,
    Stop,
    Step,
}

/// Potential errors that can occur in segment control.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SegCtrlError {
    #[error("Invalid path: {0}")]
    InvalidPath(PathError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pose or timestamp contains a non-finite value")]
    InvalidPose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad,
        }
    }

    /// True if every component of the pose is finite.
    pub fn is_finite(&self) -> bool {
        self.position_m.iter().all(|v| v.is_finite()) && self.heading_rad.is_finite()
    }
}

impl Mode {
    /// Map a command token onto a mode.
    ///
    /// Recognised tokens are `"run"`, `"stop"` and `"step"`. Anything else maps to `Run`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "stop" => Mode::Stop,
            "step" => Mode::Step,
            _ => Mode::Run,
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Run
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mode_tokens() {
        assert_eq!(Mode::from_token("run"), Mode::Run);
        assert_eq!(Mode::from_token("stop"), Mode::Stop);
        assert_eq!(Mode::from_token("step"), Mode::Step);
        assert_eq!(Mode::from_token("STOP"), Mode::Run);
        assert_eq!(Mode::from_token(""), Mode::Run);
        assert_eq!(Mode::from_token("pause"), Mode::Run);
    }

    #[test]
    fn test_pose_finite() {
        assert!(Pose::new(1.0, 2.0, 0.1).is_finite());
        assert!(!Pose::new(std::f64::NAN, 2.0, 0.1).is_finite());
        assert!(!Pose::new(1.0, 2.0, std::f64::INFINITY).is_finite());
    }
}
