//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the fleet software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Messages exchanged with the fleet transport, and the topics they travel on
pub mod fleet;

/// Network module
pub mod net;
