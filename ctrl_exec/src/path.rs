//! # Path
//!
//! This module defines the segment path followed by each robot. A path is an ordered list of
//! target points, each carrying the preconditions which gate leaving it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use comms_if::fleet::SegmentPathMsg;
use crate::progress::{ProgressTable, RobotId, StepCount};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A requirement on another robot's progress.
///
/// Satisfied when the robot `robot_id` has completed at least `required_steps` segments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Precondition {
    pub robot_id: RobotId,
    pub required_steps: StepCount,
}

/// One segment target.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathPoint {
    /// Goal position in meters
    pub x_m: f64,
    pub y_m: f64,

    /// Goal heading in radians. Unused while following, the heading is taken from the direction
    /// of travel.
    pub theta_rad: f64,

    /// Conditions which must all hold before the robot may advance past this point.
    pub preconditions: Vec<Precondition>,
}

/// An ordered, non-empty sequence of segment targets.
///
/// Paths are immutable once built, a controller never modifies its path in place.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Path {
    points: Vec<PathPoint>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PathError {
    #[error("Attempted to create a path from an empty sequence")]
    Empty,

    #[error("Path point {0} has a non-finite coordinate")]
    NonFinitePoint(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Precondition {
    pub fn new<S: Into<RobotId>>(robot_id: S, required_steps: StepCount) -> Self {
        Self {
            robot_id: robot_id.into(),
            required_steps,
        }
    }

    /// Evaluate the precondition.
    ///
    /// The robot's progress is looked up in `snapshot` first, then in `cache`. A robot in
    /// neither table has made no progress.
    pub fn is_satisfied(&self, snapshot: &ProgressTable, cache: &ProgressTable) -> bool {
        let steps = snapshot.get(&self.robot_id)
            .or_else(|| cache.get(&self.robot_id))
            .unwrap_or(0);

        steps >= self.required_steps
    }
}

impl PathPoint {
    /// A point with no preconditions.
    pub fn new(x_m: f64, y_m: f64) -> Self {
        Self {
            x_m,
            y_m,
            theta_rad: 0.0,
            preconditions: Vec::new(),
        }
    }

    /// Add a precondition to this point.
    pub fn with_precondition<S: Into<RobotId>>(
        mut self, 
        robot_id: S, 
        required_steps: StepCount
    ) -> Self {
        self.preconditions.push(Precondition::new(robot_id, required_steps));
        self
    }

    /// Position of the point.
    pub fn position_m(&self) -> Vector2<f64> {
        Vector2::new(self.x_m, self.y_m)
    }

    /// True if every precondition of this point holds.
    pub fn preconditions_met(&self, snapshot: &ProgressTable, cache: &ProgressTable) -> bool {
        self.preconditions
            .iter()
            .all(|p| p.is_satisfied(snapshot, cache))
    }
}

impl Path {
    /// Build a path from a list of points.
    ///
    /// The list must be non-empty and every point must have finite coordinates.
    pub fn new(points: Vec<PathPoint>) -> Result<Self, PathError> {
        let path = Self { points };
        path.validate()?;

        Ok(path)
    }

    /// Check the path is non-empty and every point has finite coordinates.
    ///
    /// Paths built with [`Path::new`] are always valid, deserialised paths may not be.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.points.is_empty() {
            return Err(PathError::Empty)
        }

        match self.points
            .iter()
            .position(|p| !(p.x_m.is_finite() && p.y_m.is_finite() && p.theta_rad.is_finite()))
        {
            Some(i) => Err(PathError::NonFinitePoint(i)),
            None => Ok(())
        }
    }

    /// Build a path from a segment path message, targeting the end of each segment.
    pub fn from_msg(msg: &SegmentPathMsg) -> Result<Self, PathError> {
        let points = msg.segments
            .iter()
            .map(|seg| PathPoint {
                x_m: seg.end[0],
                y_m: seg.end[1],
                theta_rad: 0.0,
                preconditions: seg.preconditions
                    .iter()
                    .map(|pc| Precondition::new(pc.robot_id.clone(), pc.step_condition))
                    .collect(),
            })
            .collect();

        Self::new(points)
    }

    /// Number of points in the path.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// False for any validated path.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get the point at the given index, or `None` if the index is past the end.
    pub fn get(&self, index: usize) -> Option<&PathPoint> {
        self.points.get(index)
    }

    pub fn points(&self) -> &[PathPoint] {
        &self.points
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::fleet::{PathPreconditionMsg, PathSegmentMsg};

    #[test]
    fn test_empty_path_rejected() {
        assert_eq!(Path::new(vec![]), Err(PathError::Empty));
        assert_eq!(
            Path::from_msg(&SegmentPathMsg::default()), 
            Err(PathError::Empty)
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let r = Path::new(vec![PathPoint::new(0.0, 0.0), PathPoint::new(std::f64::NAN, 1.0)]);
        assert_eq!(r, Err(PathError::NonFinitePoint(1)));
    }

    #[test]
    fn test_from_msg_targets_segment_end() {
        let msg = SegmentPathMsg {
            segments: vec![
                PathSegmentMsg {
                    start: Some([0.0, 0.0]),
                    end: [1.0, 0.0],
                    preconditions: vec![],
                },
                PathSegmentMsg {
                    start: Some([1.0, 0.0]),
                    end: [1.0, 2.0],
                    preconditions: vec![PathPreconditionMsg {
                        robot_id: "robot1".into(),
                        step_condition: 3,
                    }],
                },
            ],
        };

        let path = Path::from_msg(&msg).unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.get(1).unwrap().position_m(), Vector2::new(1.0, 2.0));
        assert_eq!(
            path.get(1).unwrap().preconditions, 
            vec![Precondition::new("robot1", 3)]
        );
        assert!(path.get(2).is_none());
    }

    #[test]
    fn test_precondition_lookup_order() {
        let mut snapshot = ProgressTable::new();
        let mut cache = ProgressTable::new();
        let pc = Precondition::new("robot1", 2);

        // Unknown robots have made no progress
        assert!(!pc.is_satisfied(&snapshot, &cache));
        assert!(Precondition::new("robot1", 0).is_satisfied(&snapshot, &cache));

        // Falls back to the cache
        cache.set("robot1", 2);
        assert!(pc.is_satisfied(&snapshot, &cache));

        // Snapshot wins over the cache
        snapshot.set("robot1", 1);
        assert!(!pc.is_satisfied(&snapshot, &cache));
    }

    #[test]
    fn test_all_preconditions_required() {
        let mut table = ProgressTable::new();
        table.set("robot1", 1);
        let empty = ProgressTable::new();

        let point = PathPoint::new(0.0, 0.0)
            .with_precondition("robot1", 1)
            .with_precondition("robot2", 1);

        assert!(!point.preconditions_met(&table, &empty));

        table.set("robot2", 4);
        assert!(point.preconditions_met(&table, &empty));
        assert!(PathPoint::new(0.0, 0.0).preconditions_met(&empty, &empty));
    }
}
