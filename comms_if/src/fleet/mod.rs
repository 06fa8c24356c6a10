//! # Fleet messages
//!
//! Messages exchanged between the fleet controller and its transport collaborators. Each robot
//! has its own set of topics, named `"<robot>/<topic>"`, see [`topic`].

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod topic;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An odometry sample for one robot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OdomMsg {
    /// Position along the X axis in meters.
    pub x_m: f64,

    /// Position along the Y axis in meters.
    pub y_m: f64,

    /// Orientation of the robot.
    pub orientation: Orientation,

    /// Time the sample was taken in seconds. If `None` the time of receipt is used instead.
    #[serde(default)]
    pub timestamp_s: Option<f64>,
}

/// A path made of segments, each of which must be completed in order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SegmentPathMsg {
    pub segments: Vec<PathSegmentMsg>,
}

/// One segment of a [`SegmentPathMsg`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSegmentMsg {
    /// Start of the segment in meters. Informational only, the controller targets `end`.
    #[serde(default)]
    pub start: Option<[f64; 2]>,

    /// End of the segment in meters.
    pub end: [f64; 2],

    /// Conditions on other robots' progress which must hold before this segment may be left.
    #[serde(default)]
    pub preconditions: Vec<PathPreconditionMsg>,
}

/// A requirement that another robot has completed at least `step_condition` segments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathPreconditionMsg {
    pub robot_id: String,
    pub step_condition: u32,
}

/// A velocity demand for one robot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct VelCmdMsg {
    /// Forward speed in meters/second.
    pub linear_ms: f64,

    /// Turn rate in radians/second, positive is anticlockwise.
    pub angular_rads: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The orientation of a robot, as sent by the localisation source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Orientation {
    /// Planar heading in radians from the +X axis.
    Heading(f64),

    /// Full attitude quaternion in `[x, y, z, w]` order.
    Quaternion([f64; 4]),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Orientation {
    /// Reduce the orientation to a planar heading (yaw) in radians.
    ///
    /// Quaternions are normalised first. A zero quaternion gives `NaN`, which the controller
    /// rejects as an invalid pose.
    pub fn heading_rad(&self) -> f64 {
        match *self {
            Orientation::Heading(h) => h,
            Orientation::Quaternion([x, y, z, w]) => {
                let q = Quaternion::new(w, x, y, z);
                if q.norm() == 0.0 {
                    return std::f64::NAN
                }
                UnitQuaternion::from_quaternion(q).euler_angles().2
            }
        }
    }
}

impl VelCmdMsg {
    /// A command with zero linear and angular velocity.
    pub fn zero() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_quaternion_heading() {
        // Rotation of pi/2 about Z
        let s = (FRAC_PI_2 / 2.0).sin();
        let c = (FRAC_PI_2 / 2.0).cos();
        let o = Orientation::Quaternion([0.0, 0.0, s, c]);
        assert!((o.heading_rad() - FRAC_PI_2).abs() < 1e-9);

        assert_eq!(Orientation::Heading(0.3).heading_rad(), 0.3);
        assert!(Orientation::Quaternion([0.0; 4]).heading_rad().is_nan());
    }

    #[test]
    fn test_path_msg_defaults() {
        let msg: SegmentPathMsg = serde_json::from_str(
            r#"{"segments": [{"end": [1.0, 2.0]}, {"end": [3.0, 2.0], "preconditions": [{"robot_id": "robot1", "step_condition": 1}]}]}"#
        ).unwrap();

        assert_eq!(msg.segments.len(), 2);
        assert!(msg.segments[0].preconditions.is_empty());
        assert_eq!(msg.segments[1].preconditions[0].robot_id, "robot1");
        assert_eq!(msg.segments[1].preconditions[0].step_condition, 1);
    }

    #[test]
    fn test_odom_without_timestamp() {
        let msg: OdomMsg = serde_json::from_str(
            r#"{"x_m": 1.0, "y_m": -1.0, "orientation": {"Heading": 0.5}}"#
        ).unwrap();

        assert_eq!(msg.timestamp_s, None);
        assert_eq!(msg.orientation, Orientation::Heading(0.5));
    }
}
