//! # Fleet network bridge
//!
//! Connects the coordinator to the transport. Odometry, paths and control tokens for every
//! robot arrive on a single SUB socket, and velocity commands leave on a single PUB socket. Both
//! carry `[topic, payload]` messages with topics of the form `<robot>/<name>`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use comms_if::{
    fleet::{
        OdomMsg, SegmentPathMsg, VelCmdMsg,
        topic::{TopicKind, TopicNames},
    },
    net::{self, zmq, NetError, NetParams, SocketOptions},
};

use crate::coordinator::CmdSink;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network bridge for the whole fleet
pub struct FleetNet {
    topics: TopicNames,

    /// Incoming odometry, paths and control tokens
    in_socket: zmq::Socket,

    /// Outgoing velocity commands
    out_socket: zmq::Socket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A message received for one robot.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetEvent {
    Odom(String, OdomMsg),
    Path(String, SegmentPathMsg),
    Ctrl(String, String),
}

#[derive(Debug, thiserror::Error)]
pub enum FleetNetError {
    #[error("Network error: {0}")]
    NetError(#[from] NetError),

    #[error("Could not subscribe to {0}: {1}")]
    SubscribeError(String, zmq::Error),

    #[error("Received a message on an unexpected topic: {0}")]
    UnexpectedTopic(String),

    #[error("Could not parse the message on {0}: {1}")]
    ParseError(String, serde_json::Error),

    #[error("The control token on {0} is not valid UTF-8")]
    NonUtf8Token(String),

    #[error("Could not serialise the velocity command: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FleetNet {
    /// Bind the fleet sockets and subscribe to the input topics of each robot.
    pub fn new<S: AsRef<str>>(
        ctx: &zmq::Context,
        params: &NetParams,
        topics: TopicNames,
        robot_ids: &[S]
    ) -> Result<Self, FleetNetError> {
        let in_options = SocketOptions {
            bind: true,
            recv_timeout: params.recv_timeout_ms,
            ..Default::default()
        };
        let out_options = SocketOptions {
            bind: true,
            ..Default::default()
        };

        let in_socket = net::open_socket(
            ctx, zmq::SUB, &in_options, &params.fleet_in_endpoint
        )?;
        let out_socket = net::open_socket(
            ctx, zmq::PUB, &out_options, &params.fleet_out_endpoint
        )?;

        for id in robot_ids {
            for kind in [TopicKind::Odom, TopicKind::Path, TopicKind::Ctrl].iter() {
                let topic = topics.topic(id.as_ref(), *kind);
                in_socket.set_subscribe(topic.as_bytes())
                    .map_err(|e| FleetNetError::SubscribeError(topic.clone(), e))?;
            }
        }

        Ok(Self {
            topics,
            in_socket,
            out_socket,
        })
    }

    /// Receive a single event.
    ///
    /// Call in a loop until `Ok(None)` is returned, meaning there are no pending messages.
    pub fn recv_event(&self) -> Result<Option<FleetEvent>, FleetNetError> {
        let (topic, payload) = match net::recv_frame(&self.in_socket)? {
            Some(f) => f,
            None => return Ok(None)
        };

        trace!("Received {} bytes on {}", payload.len(), topic);

        parse_event(&self.topics, &topic, &payload).map(Some)
    }

    /// Publish a velocity command to a robot.
    pub fn send_vel_cmd(&self, robot_id: &str, cmd: &VelCmdMsg) -> Result<(), FleetNetError> {
        let payload = serde_json::to_vec(cmd)
            .map_err(FleetNetError::SerializationError)?;

        net::send_frame(
            &self.out_socket,
            &self.topics.topic(robot_id, TopicKind::CmdVel),
            &payload
        )?;

        Ok(())
    }
}

impl CmdSink for FleetNet {
    type Error = FleetNetError;

    fn send_vel_cmd(&mut self, robot_id: &str, cmd: &VelCmdMsg) -> Result<(), FleetNetError> {
        FleetNet::send_vel_cmd(self, robot_id, cmd)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode a received message into an event.
///
/// Control tokens are the raw payload text, all other payloads are JSON.
pub fn parse_event(
    topics: &TopicNames,
    topic: &str,
    payload: &[u8]
) -> Result<FleetEvent, FleetNetError> {
    let (robot_id, kind) = topics.parse(topic)
        .ok_or_else(|| FleetNetError::UnexpectedTopic(topic.into()))?;
    let robot_id = robot_id.to_string();

    match kind {
        TopicKind::Odom => serde_json::from_slice(payload)
            .map(|m| FleetEvent::Odom(robot_id, m))
            .map_err(|e| FleetNetError::ParseError(topic.into(), e)),
        TopicKind::Path => serde_json::from_slice(payload)
            .map(|m| FleetEvent::Path(robot_id, m))
            .map_err(|e| FleetNetError::ParseError(topic.into(), e)),
        TopicKind::Ctrl => std::str::from_utf8(payload)
            .map(|s| FleetEvent::Ctrl(robot_id, s.trim().to_string()))
            .map_err(|_| FleetNetError::NonUtf8Token(topic.into())),
        TopicKind::CmdVel => Err(FleetNetError::UnexpectedTopic(topic.into())),
    }
}
