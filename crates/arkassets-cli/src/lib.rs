//! Command-line front end for `arkassets-protocol`.
//!
//! The `arkassets` binary parses [`config::CliConfig`], sets up logging, and runs
//! one pipeline while [`render::ProgressView`] draws the batch counters.

pub mod config;
pub mod logging;
pub mod render;

pub use config::CliConfig;
