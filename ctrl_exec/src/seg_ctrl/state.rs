//! Segment control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::*;
use crate::{
    path::{Path, PathPoint},
    progress::{ProgressTable, RobotId, StepCount},
};
use comms_if::fleet::VelCmdMsg;
use util::maths::{clamp_sym, wrap_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Segment controller for a single robot.
#[derive(Debug, Clone)]
pub struct SegmentController {
    robot_id: RobotId,

    params: Params,

    /// Executing mode
    mode: Mode,

    /// True if a `Step` command has been given and the step hasn't yet been taken
    step_armed: bool,

    /// The path being followed, `None` until one is assigned.
    path: Option<Path>,

    /// Index of the current target point within the path. Equal to the path length once the
    /// path is complete.
    segment_index: usize,

    /// Most recent valid pose
    pose: Option<Pose>,

    /// Timestamp of the last driving update, `None` after a reset.
    last_update_s: Option<f64>,

    /// Heading controller
    head_ctrl: PidController,

    /// Last known progress of the other robots, updated by `notify_progress`.
    progress_cache: ProgressTable,

    report: StatusReport,
}

/// The status report containing the monitoring quantities of the last update.
#[derive(Debug, Default, Copy, Clone, Serialize, PartialEq)]
pub struct StatusReport {
    /// Index of the target point at the end of the update
    pub segment_index: usize,

    /// Step count at the end of the update
    pub step_count: StepCount,

    /// Distance from the robot to the target it was driven against
    pub dist_to_target_m: f64,

    /// Heading error to that target
    pub head_error_rad: f64,

    /// True if the target was reached but its preconditions were not met
    pub barrier_hold: bool,

    /// True if the controller advanced to the next target in this update
    pub advanced: bool,

    /// True if the controller was stopped, either by mode or because the path is complete
    pub stopped: bool,

    /// True if the path has been completed
    pub path_complete: bool,

    /// Commanded forward speed
    pub linear_ms: f64,

    /// Commanded turn rate
    pub angular_rads: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SegmentController {
    /// Create a new controller for the given robot, with no path assigned.
    pub fn new<S: Into<RobotId>>(robot_id: S, params: Params) -> Result<Self, SegCtrlError> {
        params.validate()?;

        let head_ctrl = PidController::new(
            params.k_p, params.k_i, params.k_d, params.integral_limit
        );

        Ok(Self {
            robot_id: robot_id.into(),
            params,
            mode: Mode::default(),
            step_armed: false,
            path: None,
            segment_index: 0,
            pose: None,
            last_update_s: None,
            head_ctrl,
            progress_cache: ProgressTable::new(),
            report: StatusReport::default(),
        })
    }

    /// Set the tunable parameters, which take effect on the next update.
    ///
    /// Invalid parameters are rejected and the previous parameters kept.
    pub fn configure(&mut self, params: Params) -> Result<(), SegCtrlError> {
        params.validate()?;

        self.head_ctrl.set_gains(params.k_p, params.k_i, params.k_d, params.integral_limit);
        self.params = params;

        Ok(())
    }

    /// Replace the current path and restart from its first target.
    ///
    /// An invalid path is rejected and the previous path kept.
    pub fn assign_path(&mut self, path: Path) -> Result<(), SegCtrlError> {
        path.validate().map_err(SegCtrlError::InvalidPath)?;

        debug!(
            "{}: new path with {} segments",
            self.robot_id,
            path.len()
        );

        self.path = Some(path);
        self.segment_index = 0;
        self.reset_ctrl();
        self.report = StatusReport::default();

        Ok(())
    }

    /// Set the mode, which takes effect on the next update.
    ///
    /// Setting `Step` permits exactly one advance, setting it again permits another.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.step_armed = mode == Mode::Step;
    }

    /// Record the latest progress of another robot.
    pub fn notify_progress(&mut self, robot_id: &str, steps: StepCount) {
        self.progress_cache.set(robot_id, steps);
    }

    /// Process one pose sample, producing the velocity command for the robot.
    ///
    /// Preconditions are evaluated against `snapshot`, falling back to the progress recorded by
    /// `notify_progress` for robots not in the snapshot.
    ///
    /// A non-finite pose or timestamp is rejected without modifying the controller, the caller
    /// should command zero velocity for that cycle.
    pub fn update(
        &mut self,
        pose: &Pose,
        timestamp_s: f64,
        snapshot: &ProgressTable
    ) -> Result<VelCmdMsg, SegCtrlError> {

        if !pose.is_finite() || !timestamp_s.is_finite() {
            return Err(SegCtrlError::InvalidPose)
        }

        self.pose = Some(*pose);
        self.report = StatusReport::default();

        // ---- IDLE ----

        if self.is_stopped() || self.is_path_complete() {
            self.reset_ctrl();
            self.report.stopped = true;
            return Ok(self.finish(VelCmdMsg::zero()))
        }

        // ---- TIMING ----

        let first_update = self.last_update_s.is_none();
        let dt = match self.last_update_s {
            Some(t0) => (timestamp_s - t0).max(0f64),
            None => 0f64
        };
        self.last_update_s = Some(timestamp_s);

        // ---- TARGET MANAGEMENT ----

        if self.target_reached(pose) {
            if !self.current_preconditions_met(snapshot) {
                trace!(
                    "{}: holding at segment {} for preconditions",
                    self.robot_id,
                    self.segment_index
                );
                self.report.barrier_hold = true;
                return Ok(self.finish(VelCmdMsg::zero()))
            }

            self.advance();

            if self.is_path_complete() {
                debug!("{}: path complete", self.robot_id);
                self.reset_ctrl();
                self.report.stopped = true;
                return Ok(self.finish(VelCmdMsg::zero()))
            }

            // A step has been taken, hold here until the next step command
            if self.mode == Mode::Step {
                self.reset_ctrl();
                self.report.stopped = true;
                return Ok(self.finish(VelCmdMsg::zero()))
            }

            // Otherwise drive against the new target within this update
            if self.target_reached(pose) {
                return Ok(self.finish(VelCmdMsg::zero()))
            }
        }

        // ---- COMMAND GENERATION ----

        let (dist_m, head_err_rad) = match self.current_target() {
            Some(t) => errors_to(pose, t),
            None => return Ok(self.finish(VelCmdMsg::zero()))
        };
        self.report.dist_to_target_m = dist_m;
        self.report.head_error_rad = head_err_rad;

        if first_update {
            self.head_ctrl.observe(head_err_rad);
            return Ok(self.finish(VelCmdMsg::zero()))
        }

        let cmd = self.drive_cmd(head_err_rad, dt);

        Ok(self.finish(cmd))
    }

    /// Number of segments completed on the current path.
    pub fn step_count(&self) -> StepCount {
        self.segment_index as StepCount
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// The most recent valid pose.
    pub fn pose(&self) -> Option<Pose> {
        self.pose
    }

    /// Status report of the last update.
    pub fn report(&self) -> StatusReport {
        self.report
    }

    /// The current target, or `None` if there is no path or it is complete.
    pub fn current_target(&self) -> Option<&PathPoint> {
        self.path.as_ref().and_then(|p| p.get(self.segment_index))
    }

    /// True if there is no path or every target of the path has been passed.
    pub fn is_path_complete(&self) -> bool {
        match self.path {
            Some(ref p) => self.segment_index >= p.len(),
            None => true
        }
    }

    /// True if the mode prevents motion.
    pub fn is_stopped(&self) -> bool {
        match self.mode {
            Mode::Run => false,
            Mode::Stop => true,
            Mode::Step => !self.step_armed
        }
    }

    // ---- PRIVATE ----

    fn target_reached(&self, pose: &Pose) -> bool {
        match self.current_target() {
            Some(t) => (t.position_m() - pose.position_m).norm() <= self.params.goal_radius_m,
            None => false
        }
    }

    fn current_preconditions_met(&self, snapshot: &ProgressTable) -> bool {
        match self.current_target() {
            Some(t) => t.preconditions_met(snapshot, &self.progress_cache),
            None => false
        }
    }

    /// Move on to the next target with a fresh error history. The update time is kept so that
    /// the new target can be driven against straight away.
    ///
    /// Any pending step is used up, including the one which completes the path.
    fn advance(&mut self) {
        self.segment_index += 1;
        self.step_armed = false;
        self.head_ctrl.reset();
        self.report.advanced = true;

        debug!(
            "{}: advanced to step {}",
            self.robot_id,
            self.step_count()
        );
    }

    /// Clear the heading controller and the update time.
    fn reset_ctrl(&mut self) {
        self.head_ctrl.reset();
        self.last_update_s = None;
    }

    /// Calculate the velocity command for the given heading error.
    fn drive_cmd(&mut self, head_err_rad: f64, dt: f64) -> VelCmdMsg {
        let angular_rads = clamp_sym(
            self.head_ctrl.get(head_err_rad, dt),
            self.params.max_ang_vel_rads
        );

        // Slow down as the heading error grows, stopping entirely at the threshold
        let abs_err = head_err_rad.abs();
        let linear_ms = if abs_err < self.params.head_threshold_rad {
            self.params.max_lin_vel_ms * (1f64 - abs_err / self.params.head_threshold_rad)
        }
        else {
            0f64
        };

        VelCmdMsg {
            linear_ms: clamp_sym(linear_ms, self.params.max_lin_vel_ms),
            angular_rads
        }
    }

    /// Fill in the end-of-update fields of the report and return the command.
    fn finish(&mut self, cmd: VelCmdMsg) -> VelCmdMsg {
        self.report.segment_index = self.segment_index;
        self.report.step_count = self.step_count();
        self.report.path_complete = self.is_path_complete();
        self.report.linear_ms = cmd.linear_ms;
        self.report.angular_rads = cmd.angular_rads;

        cmd
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Distance and heading error from the pose to the target.
///
/// The heading error is the angle from the robot's heading to the bearing of the target, in the
/// range `[-pi, pi]`. Positive errors require an anticlockwise turn.
fn errors_to(pose: &Pose, target: &PathPoint) -> (f64, f64) {
    let delta = target.position_m() - pose.position_m;
    let bearing_rad = delta[1].atan2(delta[0]);

    (delta.norm(), wrap_pi(bearing_rad - pose.heading_rad))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::PathPoint;

    const DT: f64 = 0.05;

    fn ctrl() -> SegmentController {
        SegmentController::new("robot0", Params::default()).unwrap()
    }

    fn path(points: Vec<PathPoint>) -> Path {
        Path::new(points).unwrap()
    }

    fn is_zero(cmd: &VelCmdMsg) -> bool {
        cmd.linear_ms == 0.0 && cmd.angular_rads == 0.0
    }

    #[test]
    fn test_single_segment_at_goal_completes() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(0.0, 0.0)])).unwrap();

        let cmd = c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &ProgressTable::new()).unwrap();

        assert_eq!(c.step_count(), 1);
        assert!(c.is_path_complete());
        assert!(is_zero(&cmd));

        // Stays complete
        let cmd = c.update(&Pose::new(3.0, 3.0, 0.0), DT, &ProgressTable::new()).unwrap();
        assert_eq!(c.step_count(), 1);
        assert!(is_zero(&cmd));
    }

    #[test]
    fn test_barrier_holds_until_notified() {
        let mut c = ctrl();
        c.assign_path(path(vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(1.0, 0.0).with_precondition("robot1", 1),
        ])).unwrap();
        let empty = ProgressTable::new();

        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &empty).unwrap();
        assert_eq!(c.step_count(), 1);

        // Sat on the second target, but robot1 hasn't made progress
        let at_goal = Pose::new(1.0, 0.0, 0.0);
        for i in 1..10 {
            let cmd = c.update(&at_goal, i as f64 * DT, &empty).unwrap();
            assert_eq!(c.step_count(), 1);
            assert!(is_zero(&cmd));
            assert!(c.report().barrier_hold);
        }

        c.notify_progress("robot1", 1);
        let cmd = c.update(&at_goal, 10.0 * DT, &empty).unwrap();
        assert_eq!(c.step_count(), 2);
        assert!(c.is_path_complete());
        assert!(is_zero(&cmd));
    }

    #[test]
    fn test_snapshot_satisfies_barrier() {
        let mut c = ctrl();
        c.assign_path(path(vec![
            PathPoint::new(0.0, 0.0).with_precondition("robot1", 2),
            PathPoint::new(1.0, 0.0),
        ])).unwrap();

        let mut snapshot = ProgressTable::new();
        snapshot.set("robot1", 1);
        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &snapshot).unwrap();
        assert_eq!(c.step_count(), 0);

        snapshot.set("robot1", 2);
        c.update(&Pose::new(0.0, 0.0, 0.0), DT, &snapshot).unwrap();
        assert_eq!(c.step_count(), 1);
    }

    #[test]
    fn test_stop_mode_zero_velocity() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(5.0, 5.0)])).unwrap();
        c.set_mode(Mode::Stop);

        for i in 0..20 {
            let pose = Pose::new(i as f64 * 0.1, -1.0, i as f64);
            let cmd = c.update(&pose, i as f64 * DT, &ProgressTable::new()).unwrap();
            assert!(is_zero(&cmd));
        }

        // Stop at the goal doesn't advance either
        let cmd = c.update(&Pose::new(5.0, 5.0, 0.0), 2.0, &ProgressTable::new()).unwrap();
        assert!(is_zero(&cmd));
        assert_eq!(c.step_count(), 0);
    }

    #[test]
    fn test_step_mode_one_advance_per_command() {
        let mut c = ctrl();
        c.assign_path(path(vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(0.0, 0.0),
            PathPoint::new(0.0, 0.0),
        ])).unwrap();
        let empty = ProgressTable::new();
        let pose = Pose::new(0.0, 0.0, 0.0);
        let mut t = 0.0;

        for expected in 1..=3 {
            c.set_mode(Mode::Step);
            for _ in 0..5 {
                let cmd = c.update(&pose, t, &empty).unwrap();
                assert!(is_zero(&cmd));
                assert_eq!(c.step_count(), expected);
                t += DT;
            }
        }

        assert!(c.is_path_complete());
    }

    #[test]
    fn test_step_completing_path_is_used_up() {
        let mut c = ctrl();
        let empty = ProgressTable::new();

        c.assign_path(path(vec![PathPoint::new(0.0, 0.0)])).unwrap();
        c.set_mode(Mode::Step);
        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &empty).unwrap();
        assert_eq!(c.step_count(), 1);
        assert!(c.is_path_complete());

        // A new path must not advance until another step is commanded
        c.assign_path(path(vec![PathPoint::new(0.0, 0.0), PathPoint::new(5.0, 0.0)])).unwrap();
        for i in 1..5 {
            let cmd = c.update(&Pose::new(0.0, 0.0, 0.0), i as f64, &empty).unwrap();
            assert!(is_zero(&cmd));
            assert_eq!(c.step_count(), 0);
            assert!(c.report().stopped);
        }

        c.set_mode(Mode::Step);
        c.update(&Pose::new(0.0, 0.0, 0.0), 5.0, &empty).unwrap();
        assert_eq!(c.step_count(), 1);
    }

    #[test]
    fn test_step_mode_drives_until_step_taken() {
        let mut c = ctrl();
        c.assign_path(path(vec![
            PathPoint::new(1.0, 0.0),
            PathPoint::new(2.0, 0.0),
        ])).unwrap();
        c.set_mode(Mode::Step);
        let empty = ProgressTable::new();

        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &empty).unwrap();
        let cmd = c.update(&Pose::new(0.1, 0.0, 0.0), DT, &empty).unwrap();
        assert!(cmd.linear_ms > 0.0);

        // Reach the first target and take the step
        c.update(&Pose::new(1.0, 0.0, 0.0), 2.0 * DT, &empty).unwrap();
        assert_eq!(c.step_count(), 1);

        // Now held
        let cmd = c.update(&Pose::new(1.0, 0.0, 0.0), 3.0 * DT, &empty).unwrap();
        assert!(is_zero(&cmd));
        assert!(c.report().stopped);

        // Run resumes motion
        c.set_mode(Mode::Run);
        c.update(&Pose::new(1.0, 0.0, 0.0), 4.0 * DT, &empty).unwrap();
        let cmd = c.update(&Pose::new(1.0, 0.0, 0.0), 5.0 * DT, &empty).unwrap();
        assert!(cmd.linear_ms > 0.0);
    }

    #[test]
    fn test_first_update_zero_velocity() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(10.0, 0.0)])).unwrap();

        let cmd = c.update(&Pose::new(0.0, 0.0, 0.5), 0.0, &ProgressTable::new()).unwrap();
        assert!(is_zero(&cmd));

        let cmd = c.update(&Pose::new(0.0, 0.0, 0.5), DT, &ProgressTable::new()).unwrap();
        assert!(!is_zero(&cmd));

        // Target is to the right of the heading, so turn clockwise
        assert!(cmd.angular_rads < 0.0);
    }

    #[test]
    fn test_velocity_limits() {
        let params = Params {
            max_lin_vel_ms: 0.5,
            max_ang_vel_rads: 0.3,
            k_p: 100.0,
            k_i: 10.0,
            k_d: 10.0,
            ..Default::default()
        };
        let mut c = SegmentController::new("robot0", params).unwrap();
        c.assign_path(path(vec![PathPoint::new(10.0, 10.0)])).unwrap();

        for i in 0..200 {
            let heading = (i as f64 * 0.7).sin() * 3.0;
            let pose = Pose::new((i as f64 * 0.13).cos(), (i as f64 * 0.31).sin(), heading);
            let cmd = c.update(&pose, i as f64 * DT, &ProgressTable::new()).unwrap();

            assert!(cmd.linear_ms.abs() <= 0.5);
            assert!(cmd.angular_rads.abs() <= 0.3);
        }
    }

    #[test]
    fn test_facing_target_full_speed_no_turn() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(10.0, 0.0)])).unwrap();

        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &ProgressTable::new()).unwrap();
        let cmd = c.update(&Pose::new(0.1, 0.0, 0.0), DT, &ProgressTable::new()).unwrap();

        assert_eq!(cmd.angular_rads, 0.0);
        assert_eq!(cmd.linear_ms, c.params().max_lin_vel_ms);
    }

    #[test]
    fn test_large_heading_error_no_forward_speed() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(-10.0, 0.0)])).unwrap();

        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &ProgressTable::new()).unwrap();
        let cmd = c.update(&Pose::new(0.0, 0.0, 0.0), DT, &ProgressTable::new()).unwrap();

        assert_eq!(cmd.linear_ms, 0.0);
        assert!(cmd.angular_rads.abs() > 0.0);
    }

    #[test]
    fn test_advance_recomputes_against_new_target() {
        let mut c = ctrl();
        c.assign_path(path(vec![
            PathPoint::new(1.0, 0.0),
            PathPoint::new(1.0, 5.0),
        ])).unwrap();
        let empty = ProgressTable::new();

        c.update(&Pose::new(0.0, 0.0, 0.0), 0.0, &empty).unwrap();
        let cmd = c.update(&Pose::new(1.0, 0.0, 0.0), DT, &empty).unwrap();

        assert_eq!(c.step_count(), 1);
        assert!(c.report().advanced);

        // New target is straight to the left
        assert!(cmd.angular_rads > 0.0);
        assert_eq!(cmd.linear_ms, 0.0);
        assert!((c.report().head_error_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_step_count_monotonic_and_single_increments() {
        let mut c = ctrl();
        let points = (0..6).map(|i| PathPoint::new(i as f64 * 0.05, 0.0)).collect();
        c.assign_path(path(points)).unwrap();

        let mut prev = c.step_count();
        for i in 0..20 {
            c.update(&Pose::new(0.1, 0.0, 0.0), i as f64 * DT, &ProgressTable::new()).unwrap();
            let now = c.step_count();
            assert!(now >= prev);
            assert!(now - prev <= 1);
            prev = now;
        }
        assert!(c.is_path_complete());
    }

    #[test]
    fn test_invalid_pose_leaves_state() {
        let mut c = ctrl();
        c.assign_path(path(vec![PathPoint::new(0.0, 0.0), PathPoint::new(1.0, 0.0)])).unwrap();

        let r = c.update(&Pose::new(std::f64::NAN, 0.0, 0.0), 0.0, &ProgressTable::new());
        assert_eq!(r, Err(SegCtrlError::InvalidPose));
        assert_eq!(c.step_count(), 0);
        assert!(c.pose().is_none());

        let r = c.update(&Pose::new(0.0, 0.0, 0.0), std::f64::NAN, &ProgressTable::new());
        assert_eq!(r, Err(SegCtrlError::InvalidPose));
        assert_eq!(c.step_count(), 0);
    }

    #[test]
    fn test_invalid_config_keeps_previous() {
        let mut c = ctrl();
        let bad = Params {
            max_ang_vel_rads: -1.0,
            ..Default::default()
        };

        assert!(matches!(c.configure(bad), Err(SegCtrlError::InvalidConfig(_))));
        assert_eq!(c.params(), &Params::default());

        let good = Params {
            goal_radius_m: 0.5,
            ..Default::default()
        };
        c.configure(good.clone()).unwrap();
        assert_eq!(c.params(), &good);
    }

    #[test]
    fn test_invalid_path_keeps_previous() {
        let mut c = ctrl();
        let p = path(vec![PathPoint::new(2.0, 0.0)]);
        c.assign_path(p.clone()).unwrap();

        let empty: Path = serde_json::from_str(r#"{"points": []}"#).unwrap();
        assert!(matches!(c.assign_path(empty), Err(SegCtrlError::InvalidPath(_))));
        assert_eq!(c.path(), Some(&p));
    }

    #[test]
    fn test_reassign_resets_identically() {
        let p = path(vec![
            PathPoint::new(0.0, 0.0),
            PathPoint::new(3.0, 1.0),
        ]);
        let poses = [
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(0.2, 0.1, 0.1),
            Pose::new(0.5, 0.1, 0.2),
            Pose::new(0.9, 0.2, 0.2),
        ];

        let mut c = ctrl();
        let mut runs = Vec::new();

        for _ in 0..2 {
            c.assign_path(p.clone()).unwrap();
            assert_eq!(c.step_count(), 0);

            let cmds: Vec<VelCmdMsg> = poses
                .iter()
                .enumerate()
                .map(|(i, pose)| {
                    c.update(pose, 100.0 + i as f64 * DT, &ProgressTable::new()).unwrap()
                })
                .collect();
            runs.push((cmds, c.step_count()));
        }

        assert_eq!(runs[0], runs[1]);
    }

    #[test]
    fn test_no_path_zero_velocity() {
        let mut c = ctrl();
        let cmd = c.update(&Pose::new(1.0, 1.0, 0.0), 0.0, &ProgressTable::new()).unwrap();

        assert!(is_zero(&cmd));
        assert_eq!(c.step_count(), 0);
        assert!(c.report().stopped);
    }
}
