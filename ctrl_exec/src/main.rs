//! Main fleet controller executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session, logging and parameters
//!     - Create the coordinator with a controller for every robot
//!     - Open the fleet network bridge
//!     - Main loop, until the process is stopped:
//!         - Receive the next fleet event
//!         - Dispatch paths and mode tokens to the coordinator
//!         - Process odometry through the coordinator, publishing the velocity command
//!         - Archive the robot's status report

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{info, trace, warn};
use std::collections::HashMap;

// Internal
use comms_if::net::{zmq, NetParams};
use ctrl_lib::{
    coordinator::{FleetCoordinator, FleetError},
    fleet_net::{FleetEvent, FleetNet, FleetNetError},
    params::ExecParams,
    path::Path,
    seg_ctrl::{Pose, SegCtrlError},
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "ctrl_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Fleet Controller Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| "unknown".into())
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams = util::params::load(
        "ctrl_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let net_params: NetParams = util::params::load(
        "net.toml"
    ).wrap_err("Could not load net params")?;

    let robot_names = exec_params.robot_names();
    if robot_names.is_empty() {
        return Err(eyre!("No robot names were given in ctrl_exec.toml"));
    }

    info!("Exec parameters loaded, robots: {:?}", robot_names);

    // ---- INITIALISE COORDINATOR ----

    let mut coordinator = FleetCoordinator::new(exec_params.seg_ctrl.clone())
        .wrap_err("Invalid segment control parameters")?;

    let mut archivers = HashMap::new();

    for name in robot_names.iter() {
        coordinator.register_robot(name);

        let arch = Archiver::from_path(&session, format!("seg_ctrl_{}.csv", name))
            .wrap_err_with(|| format!("Failed to create the archive for {}", name))?;
        archivers.insert(name.clone(), arch);
    }

    info!("Coordinator initialised with {} robots", robot_names.len());

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = zmq::Context::new();

    let mut fleet_net = FleetNet::new(
        &zmq_ctx,
        &net_params,
        exec_params.topics.clone(),
        &robot_names
    ).wrap_err("Failed to initialise the fleet network")?;

    info!(
        "Fleet network initialised, in: {}, out: {}",
        net_params.fleet_in_endpoint,
        net_params.fleet_out_endpoint
    );

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        let event = match fleet_net.recv_event() {
            Ok(Some(e)) => e,
            Ok(None) => continue,
            Err(FleetNetError::NetError(e)) => return Err(e)
                .wrap_err("An error occured while receiving fleet messages"),
            Err(e) => {
                warn!("Dropping fleet message: {}", e);
                continue
            }
        };

        match event {
            FleetEvent::Odom(robot_id, msg) => {
                let pose = Pose::new(msg.x_m, msg.y_m, msg.orientation.heading_rad());
                let time_s = msg.timestamp_s.unwrap_or_else(session::get_elapsed_seconds);

                match coordinator.on_pose_sample(&robot_id, &pose, time_s, &mut fleet_net) {
                    Ok(report) => {
                        if let Some(arch) = archivers.get_mut(&robot_id) {
                            arch.serialise(time_s, &report)
                                .unwrap_or_else(|e| warn!("Could not archive {}: {}", robot_id, e));
                        }
                    },
                    Err(FleetError::Ctrl(_, SegCtrlError::InvalidPose)) => warn!(
                        "Invalid pose for {}, commanding zero velocity", robot_id
                    ),
                    Err(e) => warn!("Could not process odometry: {}", e)
                }
            },
            FleetEvent::Path(robot_id, msg) => {
                let result = Path::from_msg(&msg)
                    .map_err(|e| FleetError::Ctrl(robot_id.clone(), SegCtrlError::InvalidPath(e)))
                    .and_then(|p| coordinator.on_path_assignment(&robot_id, p));

                if let Err(e) = result {
                    warn!("Rejected path for {}: {}", robot_id, e);
                }
            },
            FleetEvent::Ctrl(robot_id, token) => {
                if let Err(e) = coordinator.on_mode_command(&robot_id, &token) {
                    warn!("Rejected mode command: {}", e);
                }
            }
        }

        trace!("Progress: {:?}", coordinator.progress());
    }
}
