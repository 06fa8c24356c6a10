//! # Fleet controller library.
//!
//! This library allows the executables and benchmarks in this crate to access the segment
//! following core of the fleet controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Fleet coordinator - routes inputs to the segment controllers and broadcasts progress
pub mod coordinator;

/// Fleet network bridge - receives fleet inputs and publishes velocity commands
pub mod fleet_net;

/// Executable parameters
pub mod params;

/// Segment paths and their preconditions
pub mod path;

/// Progress table - the number of segments each robot has completed
pub mod progress;

/// Segment control module - drives a single robot along its path
pub mod seg_ctrl;
