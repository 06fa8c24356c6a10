//! # Fleet Command
//!
//! Publishes mode tokens and segment paths to a running fleet controller.
//!
//! ```text
//! fleet_cmd mode robot0 stop
//! fleet_cmd path robot1 paths/robot1.json
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs, path::PathBuf, thread, time::Duration};

use color_eyre::{eyre::WrapErr, Result};
use structopt::StructOpt;

use comms_if::{
    fleet::{
        SegmentPathMsg,
        topic::{TopicKind, TopicNames},
    },
    net::{self, zmq, NetParams, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time to wait after connecting before publishing, so the subscriber sees the first message.
const CONNECT_DELAY_MS: u64 = 250;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "fleet_cmd", about = "Send commands to the fleet controller")]
struct Opts {
    /// Endpoint of the controller's inbound socket. Read from `net.toml` if not given.
    #[structopt(short, long)]
    endpoint: Option<String>,

    /// Name of the mode topic. Read from `ctrl_exec.toml` if not given.
    #[structopt(long)]
    ctrl_topic: Option<String>,

    /// Name of the path topic. Read from `ctrl_exec.toml` if not given.
    #[structopt(long)]
    path_topic: Option<String>,

    #[structopt(subcommand)]
    cmd: FleetCmd,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
enum FleetCmd {
    /// Set a robot's mode.
    ///
    /// The token is one of `run`, `stop` or `step`. Any other token is treated as `run`.
    #[structopt(name = "mode")]
    Mode {
        robot: String,
        token: String,
    },

    /// Send a segment path to a robot from a JSON file.
    #[structopt(name = "path")]
    Path {
        robot: String,

        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let endpoint = match opts.endpoint {
        Some(e) => e,
        None => {
            let net_params: NetParams = util::params::load("net.toml")
                .wrap_err("Could not load net params, set FLEET_SW_ROOT or pass --endpoint")?;
            net_params.fleet_in_endpoint
        }
    };

    let topics = resolve_topics(
        util::params::load("ctrl_exec.toml").ok(),
        opts.ctrl_topic,
        opts.path_topic
    );

    // Build the message before connecting so that bad input fails fast
    let (topic, payload) = match opts.cmd {
        FleetCmd::Mode { robot, token } => mode_message(&topics, &robot, &token),
        FleetCmd::Path { robot, file } => {
            let path_str = fs::read_to_string(&file)
                .wrap_err_with(|| format!("Could not read {:?}", file))?;
            let msg: SegmentPathMsg = serde_json::from_str(&path_str)
                .wrap_err("Could not parse the segment path")?;

            println!("Path for {} has {} segments", robot, msg.segments.len());

            path_message(&topics, &robot, &msg)?
        }
    };

    let ctx = zmq::Context::new();
    let socket = net::open_socket(
        &ctx,
        zmq::PUB,
        &SocketOptions::default(),
        &endpoint
    ).wrap_err("Could not connect to the controller")?;

    thread::sleep(Duration::from_millis(CONNECT_DELAY_MS));

    net::send_frame(&socket, &topic, &payload)
        .wrap_err("Could not send the command")?;

    println!("Sent {} bytes on {} to {}", payload.len(), topic, endpoint);

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Pick the topic names the controller is listening on.
///
/// Explicit names take priority over the controller's parameters, which take priority over the
/// default names.
fn resolve_topics(
    exec_topics: Option<TopicNames>,
    ctrl_topic: Option<String>,
    path_topic: Option<String>
) -> TopicNames {
    let mut topics = exec_topics.unwrap_or_else(|| {
        eprintln!("Could not load topic names from ctrl_exec.toml, using the defaults");
        TopicNames::default()
    });

    if let Some(t) = ctrl_topic {
        topics.ctrl_topic = t;
    }
    if let Some(t) = path_topic {
        topics.path_topic = t;
    }

    topics
}

fn mode_message(topics: &TopicNames, robot: &str, token: &str) -> (String, Vec<u8>) {
    (topics.topic(robot, TopicKind::Ctrl), token.as_bytes().to_vec())
}

fn path_message(
    topics: &TopicNames,
    robot: &str,
    msg: &SegmentPathMsg
) -> Result<(String, Vec<u8>)> {
    let payload = serde_json::to_vec(msg).wrap_err("Could not serialise the segment path")?;

    Ok((topics.topic(robot, TopicKind::Path), payload))
}

#[cfg(test)]
mod test {
    use super::*;

    const EXEC_PARAMS: &str = r#"
robot_names = ["robot0"]
path_topic = "fleet/path"
ctrl_topic = "fleet/mode"

[seg_ctrl]
k_p = 5.0
"#;

    #[test]
    fn test_topics_from_exec_params() {
        let exec: TopicNames = util::params::from_str(EXEC_PARAMS).unwrap();
        let topics = resolve_topics(Some(exec), None, None);

        assert_eq!(topics.ctrl_topic, "fleet/mode");
        assert_eq!(topics.path_topic, "fleet/path");
        assert_eq!(topics.odom_topic, TopicNames::default().odom_topic);

        let (topic, payload) = mode_message(&topics, "robot0", "step");
        assert_eq!(topic, topics.topic("robot0", TopicKind::Ctrl));
        assert_ne!(topic, TopicNames::default().topic("robot0", TopicKind::Ctrl));
        assert_eq!(payload, b"step".to_vec());
    }

    #[test]
    fn test_cli_topics_override() {
        let exec: TopicNames = util::params::from_str(EXEC_PARAMS).unwrap();
        let topics = resolve_topics(Some(exec), Some("mode".into()), None);
        assert_eq!(topics.ctrl_topic, "mode");
        assert_eq!(topics.path_topic, "fleet/path");

        let topics = resolve_topics(None, None, Some("p".into()));
        assert_eq!(topics.ctrl_topic, TopicNames::default().ctrl_topic);
        assert_eq!(topics.path_topic, "p");
    }

    #[test]
    fn test_path_message_on_path_topic() {
        let msg: SegmentPathMsg = serde_json::from_str(
            r#"{"segments": [{"end": [1.0, 0.0]}, {"end": [2.0, 0.0],
                "preconditions": [{"robot_id": "robot1", "step_condition": 1}]}]}"#
        ).unwrap();
        let topics = resolve_topics(Some(TopicNames::default()), None, Some("fleet/path".into()));

        let (topic, payload) = path_message(&topics, "robot0", &msg).unwrap();
        assert_eq!(topic, topics.topic("robot0", TopicKind::Path));

        let sent: SegmentPathMsg = serde_json::from_slice(&payload).unwrap();
        assert_eq!(sent, msg);
    }
}
