//! # Fleet topics
//!
//! Every robot publishes and receives on topics prefixed by its name, for example
//! `robot0/odom` or `robot0/cmd_vel`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The names of the per-robot topics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopicNames {
    pub odom_topic: String,
    pub cmd_vel_topic: String,
    pub path_topic: String,
    pub ctrl_topic: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The kind of message a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Odom,
    CmdVel,
    Path,
    Ctrl,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            odom_topic: "odom".into(),
            cmd_vel_topic: "cmd_vel".into(),
            path_topic: "seg_path".into(),
            ctrl_topic: "ctrl".into(),
        }
    }
}

impl TopicNames {
    /// Name of the topic of the given kind.
    pub fn name(&self, kind: TopicKind) -> &str {
        match kind {
            TopicKind::Odom => &self.odom_topic,
            TopicKind::CmdVel => &self.cmd_vel_topic,
            TopicKind::Path => &self.path_topic,
            TopicKind::Ctrl => &self.ctrl_topic,
        }
    }

    /// Full topic string for a robot, e.g. `robot0/odom`.
    pub fn topic(&self, robot_id: &str, kind: TopicKind) -> String {
        join(robot_id, self.name(kind))
    }

    /// Split a full topic string back into the robot name and the topic kind.
    ///
    /// Returns `None` if the topic does not match any of the configured names.
    pub fn parse<'a>(&self, topic: &'a str) -> Option<(&'a str, TopicKind)> {
        let kinds = [TopicKind::Odom, TopicKind::CmdVel, TopicKind::Path, TopicKind::Ctrl];

        for kind in kinds.iter() {
            let name = self.name(*kind).trim_start_matches('/');
            let suffix_len = name.len() + 1;

            if topic.len() > suffix_len
                && topic.ends_with(name)
                && topic[..topic.len() - name.len()].ends_with('/')
            {
                return Some((&topic[..topic.len() - suffix_len], *kind))
            }
        }

        None
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Join a robot name and a topic name, ignoring any leading `/` on the topic name.
pub fn join(robot_id: &str, topic_name: &str) -> String {
    format!("{}/{}", robot_id, topic_name.trim_start_matches('/'))
}
