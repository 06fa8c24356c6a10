//! # Fleet Simulation
//!
//! This binary runs the fleet coordinator against simulated robots, without requiring the
//! network or physical robots. It is designed to allow quick checking of paths and their
//! preconditions before they are sent to a real fleet.
//!
//! Usage: `fleet_sim <scenario.json>`

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{collections::BTreeMap, env, fs};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use comms_if::fleet::{SegmentPathMsg, VelCmdMsg};
use ctrl_lib::{
    coordinator::{CmdSink, FleetCoordinator},
    params::ExecParams,
    path::Path,
    seg_ctrl::Pose,
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    maths::wrap_pi,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A simulation scenario
#[derive(Debug, Deserialize)]
struct Scenario {
    /// Simulation step in seconds
    #[serde(default = "default_period_s")]
    period_s: f64,

    /// Number of cycles after which the simulation stops, even if paths are incomplete
    #[serde(default = "default_max_cycles")]
    max_cycles: u64,

    robots: Vec<SimRobotSpec>,
}

#[derive(Debug, Deserialize)]
struct SimRobotSpec {
    name: String,

    /// Initial `[x, y, heading]`
    pose: [f64; 3],

    path: SegmentPathMsg,
}

/// Unicycle state of one simulated robot
#[derive(Debug, Clone, Copy)]
struct SimState {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
}

/// One archived simulation sample
#[derive(Debug, Serialize)]
struct SimRecord {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    step_count: u32,
    barrier_hold: bool,
    linear_ms: f64,
    angular_rads: f64,
}

/// Command sink which stores the latest command for each robot
#[derive(Default)]
struct SimCmds {
    latest: BTreeMap<String, VelCmdMsg>,
}

#[derive(Debug, thiserror::Error)]
#[error("Simulated command sink error")]
struct SimCmdsError;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdSink for SimCmds {
    type Error = SimCmdsError;

    fn send_vel_cmd(&mut self, robot_id: &str, cmd: &VelCmdMsg) -> Result<(), SimCmdsError> {
        self.latest.insert(robot_id.into(), *cmd);
        Ok(())
    }
}

impl SimState {
    fn pose(&self) -> Pose {
        Pose::new(self.x_m, self.y_m, self.heading_rad)
    }

    /// Integrate the unicycle model over one step.
    fn step(&mut self, cmd: &VelCmdMsg, dt: f64) {
        self.x_m += cmd.linear_ms * self.heading_rad.cos() * dt;
        self.y_m += cmd.linear_ms * self.heading_rad.sin() * dt;
        self.heading_rad = wrap_pi(self.heading_rad + cmd.angular_rads * dt);
    }
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("fleet_sim", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Info, &session).wrap_err("Failed to initialise logging")?;

    info!("Fleet Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD SCENARIO ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!("Expected path to the scenario file as only argument"));
    }

    let scenario_str = fs::read_to_string(&args[1])
        .wrap_err_with(|| format!("Could not read scenario {}", args[1]))?;
    let scenario: Scenario = serde_json::from_str(&scenario_str)
        .wrap_err("Could not parse the scenario")?;

    if !(scenario.period_s > 0.0) {
        return Err(eyre!("Scenario period must be positive, found {}", scenario.period_s));
    }

    info!(
        "Loaded scenario with {} robots, period {} s",
        scenario.robots.len(),
        scenario.period_s
    );

    let exec_params: ExecParams = util::params::load("ctrl_exec.toml")
        .wrap_err("Could not load exec params")?;

    // ---- INITIALISE COORDINATOR ----

    let mut coordinator = FleetCoordinator::new(exec_params.seg_ctrl)
        .wrap_err("Invalid segment control parameters")?;
    let mut states = BTreeMap::new();
    let mut archivers = BTreeMap::new();

    for robot in scenario.robots.iter() {
        coordinator.register_robot(&robot.name);
    }

    for robot in scenario.robots.iter() {
        let path = Path::from_msg(&robot.path)
            .wrap_err_with(|| format!("Invalid path for {}", robot.name))?;
        coordinator.on_path_assignment(&robot.name, path)?;

        states.insert(robot.name.clone(), SimState {
            x_m: robot.pose[0],
            y_m: robot.pose[1],
            heading_rad: robot.pose[2],
        });

        let arch = Archiver::from_path(&session, format!("sim_{}.csv", robot.name))
            .wrap_err_with(|| format!("Failed to create the archive for {}", robot.name))?;
        archivers.insert(robot.name.clone(), arch);
    }

    // ---- MAIN LOOP ----

    let mut cmds = SimCmds::default();
    let mut cycle = 0u64;

    while !coordinator.all_complete() && cycle < scenario.max_cycles {
        let time_s = cycle as f64 * scenario.period_s;

        for (name, state) in states.iter_mut() {
            let steps_before = coordinator.progress().get(name);

            let report = match coordinator.on_pose_sample(name, &state.pose(), time_s, &mut cmds) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Could not process {}: {}", name, e);
                    continue
                }
            };

            if coordinator.progress().get(name) != steps_before {
                info!(
                    "[{:8.2} s] {} completed step {}",
                    time_s, name, report.step_count
                );
            }

            if let Some(arch) = archivers.get_mut(name) {
                let record = SimRecord {
                    x_m: state.x_m,
                    y_m: state.y_m,
                    heading_rad: state.heading_rad,
                    step_count: report.step_count,
                    barrier_hold: report.barrier_hold,
                    linear_ms: report.linear_ms,
                    angular_rads: report.angular_rads,
                };
                arch.serialise(time_s, &record)
                    .unwrap_or_else(|e| warn!("Could not archive {}: {}", name, e));
            }

            let cmd = cmds.latest.get(name.as_str()).copied().unwrap_or_default();
            state.step(&cmd, scenario.period_s);
        }

        cycle += 1;
    }

    // ---- SHUTDOWN ----

    if coordinator.all_complete() {
        info!(
            "All paths complete after {} cycles ({:.2} s)",
            cycle,
            cycle as f64 * scenario.period_s
        );
    }
    else {
        warn!("Cycle limit of {} reached before all paths completed", scenario.max_cycles);
    }

    for (name, steps) in coordinator.progress().iter() {
        info!("{}: {} steps", name, steps);
    }

    Ok(())
}

fn default_period_s() -> f64 {
    0.05
}

fn default_max_cycles() -> u64 {
    20_000
}
