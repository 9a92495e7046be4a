//! Configuration management
//!
//! Node address, name, data directory, peers and mining address. Defaults are
//! overridden by an optional TOML file and then by the environment.
//! Consensus constants live in `core::monetary` and are not configurable.

pub mod settings;

pub use settings::{Config, GLOBAL_CONFIG};
