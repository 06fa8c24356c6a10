//! # Fleet coordinator
//!
//! Owns one segment controller per robot and the master progress table, and routes pose samples,
//! path assignments and mode commands to the right controller. Whenever a robot's step count
//! changes the new count is written to the master table and broadcast to every controller.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::collections::BTreeMap;

// Internal
use crate::{
    path::Path,
    progress::{ProgressTable, RobotId, StepCount},
    seg_ctrl::{Mode, Params, Pose, SegCtrlError, SegmentController, StatusReport},
};
use comms_if::fleet::VelCmdMsg;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination of the velocity commands produced by the coordinator.
pub trait CmdSink {
    type Error: std::error::Error;

    /// Deliver a command to the given robot.
    fn send_vel_cmd(&mut self, robot_id: &str, cmd: &VelCmdMsg) -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Coordinates the segment controllers of the whole fleet.
#[derive(Debug, Clone)]
pub struct FleetCoordinator {
    /// Default parameters given to newly registered robots
    params: Params,

    controllers: BTreeMap<RobotId, SegmentController>,

    /// Master copy of every robot's step count
    progress: ProgressTable,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FleetError {
    #[error("No robot named {0:?} is registered")]
    UnknownRobot(String),

    #[error("Segment control error for {0}: {1}")]
    Ctrl(String, SegCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FleetCoordinator {
    /// Create an empty coordinator. Robots registered later start with `params`.
    pub fn new(params: Params) -> Result<Self, FleetError> {
        params.validate().map_err(|e| FleetError::Ctrl("*".into(), e))?;

        Ok(Self {
            params,
            controllers: BTreeMap::new(),
            progress: ProgressTable::new(),
        })
    }

    /// Register a robot, creating its controller and a zero entry in the progress table.
    ///
    /// Registering an already known robot has no effect. Returns true if the robot was new.
    pub fn register_robot(&mut self, robot_id: &str) -> bool {
        if self.controllers.contains_key(robot_id) {
            return false
        }

        // Params were validated on construction or configure, so creation can't fail
        let ctrl = match SegmentController::new(robot_id, self.params.clone()) {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not create a controller for {}: {}", robot_id, e);
                return false
            }
        };

        self.controllers.insert(robot_id.into(), ctrl);
        self.progress.register(robot_id);

        // Existing controllers learn the new robot's count and vice versa
        self.broadcast(robot_id, 0);
        let known: Vec<(RobotId, StepCount)> = self.progress
            .iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect();
        if let Some(c) = self.controllers.get_mut(robot_id) {
            for (id, n) in known {
                c.notify_progress(&id, n);
            }
        }

        info!("Registered robot {}", robot_id);

        true
    }

    /// Apply parameters to every controller and to robots registered later.
    ///
    /// Invalid parameters are rejected and no controller is changed.
    pub fn configure_all(&mut self, params: Params) -> Result<(), FleetError> {
        params.validate().map_err(|e| FleetError::Ctrl("*".into(), e))?;

        for (id, ctrl) in self.controllers.iter_mut() {
            ctrl.configure(params.clone())
                .map_err(|e| FleetError::Ctrl(id.clone(), e))?;
        }
        self.params = params;

        Ok(())
    }

    /// Apply parameters to a single robot's controller.
    pub fn configure(&mut self, robot_id: &str, params: Params) -> Result<(), FleetError> {
        self.controller_mut(robot_id)?
            .configure(params)
            .map_err(|e| FleetError::Ctrl(robot_id.into(), e))
    }

    /// Process a pose sample for one robot and send the resulting command through the sink.
    ///
    /// An invalid pose produces a zero command and the error is returned once the command has
    /// been sent. If the robot's step count changes, the new count is broadcast to all
    /// controllers before returning.
    pub fn on_pose_sample<K: CmdSink>(
        &mut self,
        robot_id: &str,
        pose: &Pose,
        timestamp_s: f64,
        sink: &mut K
    ) -> Result<StatusReport, FleetError> {
        let progress = &self.progress;
        let ctrl = self.controllers
            .get_mut(robot_id)
            .ok_or_else(|| FleetError::UnknownRobot(robot_id.into()))?;

        let prev_steps = ctrl.step_count();

        let (cmd, result) = match ctrl.update(pose, timestamp_s, progress) {
            Ok(cmd) => (cmd, Ok(ctrl.report())),
            Err(e) => (VelCmdMsg::zero(), Err(FleetError::Ctrl(robot_id.into(), e)))
        };
        let steps = ctrl.step_count();

        if let Err(e) = sink.send_vel_cmd(robot_id, &cmd) {
            warn!("Could not send velocity command to {}: {}", robot_id, e);
        }

        if steps != prev_steps {
            self.publish_progress(robot_id, steps);
        }

        result
    }

    /// Assign a new path to a robot, resetting its progress to zero.
    ///
    /// The reset count is broadcast so that other robots don't see stale progress from the
    /// previous path.
    pub fn on_path_assignment(&mut self, robot_id: &str, path: Path) -> Result<(), FleetError> {
        let num_segments = path.len();

        self.controller_mut(robot_id)?
            .assign_path(path)
            .map_err(|e| FleetError::Ctrl(robot_id.into(), e))?;

        info!("{} assigned a path of {} segments", robot_id, num_segments);

        self.publish_progress(robot_id, 0);

        Ok(())
    }

    /// Set a robot's mode from a command token.
    pub fn on_mode_command(&mut self, robot_id: &str, token: &str) -> Result<Mode, FleetError> {
        let mode = Mode::from_token(token);

        self.controller_mut(robot_id)?.set_mode(mode);

        info!("{} mode set to {:?} (token {:?})", robot_id, mode, token);

        Ok(mode)
    }

    /// The master progress table.
    pub fn progress(&self) -> &ProgressTable {
        &self.progress
    }

    pub fn controller(&self, robot_id: &str) -> Option<&SegmentController> {
        self.controllers.get(robot_id)
    }

    /// Names of the registered robots, in sorted order.
    pub fn robot_ids(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(|k| k.as_str())
    }

    /// True if every registered robot has completed its path.
    pub fn all_complete(&self) -> bool {
        self.controllers.values().all(|c| c.is_path_complete())
    }

    // ---- PRIVATE ----

    fn controller_mut(&mut self, robot_id: &str) -> Result<&mut SegmentController, FleetError> {
        self.controllers
            .get_mut(robot_id)
            .ok_or_else(|| FleetError::UnknownRobot(robot_id.into()))
    }

    /// Write a robot's step count into the master table and tell every controller.
    fn publish_progress(&mut self, robot_id: &str, steps: StepCount) {
        self.progress.set(robot_id, steps);
        self.broadcast(robot_id, steps);
    }

    fn broadcast(&mut self, robot_id: &str, steps: StepCount) {
        debug!("Broadcasting progress {} = {}", robot_id, steps);

        for ctrl in self.controllers.values_mut() {
            ctrl.notify_progress(robot_id, steps);
        }
    }
}
