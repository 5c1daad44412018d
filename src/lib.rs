// ABOUTME: Library root for deployer - exposes the pipeline and its components for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod inspect;
pub mod output;
pub mod ports;
pub mod process;
pub mod registry;
pub mod topology;
pub mod tunnel;
pub mod types;
pub mod workers;
