//! CLI module
//!
//! Command-line interface for the proxy binary.

pub mod args;
pub mod config;

pub use args::CliArgs;
pub use config::Config;
