//! Time and attendance CLI library.
//!
//! This crate provides the CLI interface for the session engine and the
//! coverage reports.

mod cli;
pub mod commands;
mod config;

pub use cli::{AtArgs, BreakArg, Cli, Commands, EmployeeArgs, ScheduleAction};
pub use config::Config;
