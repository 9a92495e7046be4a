//! Command-line interface
//!
//! Argument parsing for the node binary. Every command except `startnode`
//! works directly on the node's store, so the node must not be running.

pub mod commands;

pub use commands::{Command, Opt};
