//! # Progress table
//!
//! Maps each robot to the number of segments it has completed on its current path. The
//! coordinator keeps the authoritative table, and each segment controller keeps a cached copy
//! which is updated by `notify_progress` broadcasts.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::{hash_map, HashMap};
use serde::Serialize;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Identifier of a robot, its name in the fleet (e.g. `"robot0"`).
pub type RobotId = String;

/// Number of segments a robot has completed.
pub type StepCount = u32;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Table of robot progress.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProgressTable {
    steps: HashMap<RobotId, StepCount>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProgressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry for the robot with no progress.
    ///
    /// Registering an already known robot leaves its entry untouched. Returns `true` if the
    /// robot was newly added.
    pub fn register(&mut self, robot_id: &str) -> bool {
        match self.steps.entry(robot_id.to_string()) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(e) => {
                e.insert(0);
                true
            }
        }
    }

    /// Progress of the given robot, or `None` if the robot isn't in the table.
    pub fn get(&self, robot_id: &str) -> Option<StepCount> {
        self.steps.get(robot_id).copied()
    }

    /// Set the progress of the given robot, returning the previous value.
    pub fn set<S: Into<RobotId>>(&mut self, robot_id: S, steps: StepCount) -> Option<StepCount> {
        self.steps.insert(robot_id.into(), steps)
    }

    pub fn contains(&self, robot_id: &str) -> bool {
        self.steps.contains_key(robot_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, StepCount)> {
        self.steps.iter().map(|(k, v)| (k.as_str(), *v))
    }
}
