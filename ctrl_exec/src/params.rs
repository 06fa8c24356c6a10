//! # Controller Executable Parameters
//!
//! This module provides parameters for the controller executable, loaded from `ctrl_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

use comms_if::fleet::topic::TopicNames;
use crate::seg_ctrl;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExecParams {

    /// Names of the robots in the fleet
    pub robot_names: Vec<String>,

    /// Comma separated list of robot names. When not empty this replaces `robot_names`.
    pub robot_names_str: String,

    /// Names of the per-robot topics
    #[serde(flatten)]
    pub topics: TopicNames,

    /// Segment control parameters, shared by every robot
    pub seg_ctrl: seg_ctrl::Params,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecParams {
    /// The robot names to use, from `robot_names_str` if it is set, otherwise `robot_names`.
    ///
    /// All spaces are removed from names, and empty names dropped.
    pub fn robot_names(&self) -> Vec<String> {
        let names: Vec<String> = if self.robot_names_str.trim().is_empty() {
            self.robot_names
                .iter()
                .map(|n| n.replace(' ', ""))
                .collect()
        }
        else {
            self.robot_names_str
                .replace(' ', "")
                .split(',')
                .map(String::from)
                .collect()
        };

        names.into_iter().filter(|n| !n.is_empty()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_names_from_list() {
        let p: ExecParams = util::params::from_str(
            "robot_names = [\"robot0\", \"robot1\"]"
        ).unwrap();

        assert_eq!(p.robot_names(), vec!["robot0", "robot1"]);
        assert_eq!(p.topics, TopicNames::default());
        assert_eq!(p.seg_ctrl, seg_ctrl::Params::default());
    }

    #[test]
    fn test_names_str_overrides() {
        let p: ExecParams = util::params::from_str(
            "robot_names = [\"robot0\"]\n\
             robot_names_str = \" a, b ,,c \"\n\
             odom_topic = \"pose\"\n\
             [seg_ctrl]\n\
             goal_radius_m = 0.4\n"
        ).unwrap();

        assert_eq!(p.robot_names(), vec!["a", "b", "c"]);
        assert_eq!(p.topics.odom_topic, "pose");
        assert_eq!(p.topics.ctrl_topic, "ctrl");
        assert_eq!(p.seg_ctrl.goal_radius_m, 0.4);
    }
}
