//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, the networking library chosen for the 
//! software.
//!
//! All fleet traffic is carried as two-part messages, `[topic, payload]`, over PUB/SUB sockets.
//! Subscribers filter on the topic frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use zmq::{Context, Socket, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($socket:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $socket.$opt($val)
                .map_err(|e| NetError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Endpoint on which the controller receives odometry, paths and control tokens. The
    /// controller binds a SUB socket here and collaborators connect their publishers to it.
    pub fleet_in_endpoint: String,

    /// Endpoint on which the controller publishes velocity commands.
    pub fleet_out_endpoint: String,

    /// Maximum time a receive will wait for a message before giving up, in milliseconds.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: i32,
}

/// Represents options which can be set on a socket.
///
/// Most options here correspond to those found in the 
/// [`zmq_setsockopt`](http://api.zeromq.org/4-2:zmq-setsockopt) documentation.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    /// Indicates if the socket should bind itself to the endpoint. Servers should have this value
    /// set as `true`, clients should have it set as `false`.
    ///
    /// The default value is `false`.
    pub bind: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_SNDHWM`: High water mark for outbound messages
    pub send_hwm: i32,

    /// `ZMQ_RCVHWM`: High water mark for inbound messages
    pub recv_hwm: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Could not connect the socket to {0}: {1}")]
    CouldNotConnect(String, zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, zmq::Error),

    #[error("Could not send a message: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a message: {0}")]
    RecvError(zmq::Error),

    #[error("Expected a two part [topic, payload] message, found {0} parts")]
    MalformedFrame(usize),

    #[error("The message topic is not valid UTF-8")]
    NonUtf8Topic,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), NetError> {
        set_sockopts!(
            socket,
            (set_linger, self.linger),
            (set_reconnect_ivl, self.reconnect_ivl),
            (set_rcvtimeo, self.recv_timeout),
            (set_sndtimeo, self.send_timeout),
            (set_sndhwm, self.send_hwm),
            (set_rcvhwm, self.recv_hwm)
        );

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/4-2:zmq-setsockopt
        Self {
            bind: false,
            linger: 30_000,
            reconnect_ivl: 100,
            recv_timeout: -1,
            send_timeout: -1,
            send_hwm: 1000,
            recv_hwm: 1000,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a socket of the given type, set its options and bind or connect it to the endpoint.
pub fn open_socket(
    ctx: &Context,
    socket_type: SocketType,
    socket_options: &SocketOptions,
    endpoint: &str
) -> Result<Socket, NetError> {
    let socket = ctx.socket(socket_type)
        .map_err(NetError::CreateSocketError)?;

    socket_options.set(&socket)?;

    match socket_options.bind {
        false => socket.connect(endpoint),
        true => socket.bind(endpoint)
    }.map_err(|e| NetError::CouldNotConnect(endpoint.into(), e))?;

    Ok(socket)
}

/// Send a two part `[topic, payload]` message.
pub fn send_frame(socket: &Socket, topic: &str, payload: &[u8]) -> Result<(), NetError> {
    socket.send(topic, zmq::SNDMORE).map_err(NetError::SendError)?;
    socket.send(payload, 0).map_err(NetError::SendError)
}

/// Receive a two part `[topic, payload]` message.
///
/// Returns `Ok(None)` if the receive timed out.
pub fn recv_frame(socket: &Socket) -> Result<Option<(String, Vec<u8>)>, NetError> {
    let mut parts = match socket.recv_multipart(0) {
        Ok(p) => p,
        Err(zmq::Error::EAGAIN) => return Ok(None),
        Err(e) => return Err(NetError::RecvError(e))
    };

    if parts.len() != 2 {
        return Err(NetError::MalformedFrame(parts.len()))
    }

    let payload = parts.pop().unwrap_or_default();
    let topic = parts.pop().unwrap_or_default();
    let topic = String::from_utf8(topic).map_err(|_| NetError::NonUtf8Topic)?;

    Ok(Some((topic, payload)))
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_recv_timeout_ms() -> i32 {
    10
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inproc_frame_roundtrip() {
        let ctx = Context::new();

        let pair_opts = SocketOptions {
            bind: true,
            recv_timeout: 1000,
            ..Default::default()
        };
        let a = open_socket(&ctx, zmq::PAIR, &pair_opts, "inproc://net_test").unwrap();
        let b = open_socket(
            &ctx, 
            zmq::PAIR, 
            &SocketOptions { bind: false, ..pair_opts }, 
            "inproc://net_test"
        ).unwrap();

        send_frame(&b, "robot0/ctrl", b"stop").unwrap();

        let (topic, payload) = recv_frame(&a).unwrap().unwrap();
        assert_eq!(topic, "robot0/ctrl");
        assert_eq!(payload, b"stop".to_vec());
    }

    #[test]
    fn test_recv_timeout_is_none() {
        let ctx = Context::new();
        let opts = SocketOptions {
            bind: true,
            recv_timeout: 1,
            ..Default::default()
        };
        let a = open_socket(&ctx, zmq::PAIR, &opts, "inproc://net_timeout_test").unwrap();

        assert!(recv_frame(&a).unwrap().is_none());
    }
}
