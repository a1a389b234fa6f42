//! Configuration module
//!
//! Handles loading server settings from a TOML file and merging overrides.

mod settings;

pub use settings::*;
