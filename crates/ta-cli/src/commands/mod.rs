//! CLI subcommand implementations.

pub mod clock;
pub mod close_stale;
pub mod coverage;
pub mod schedule;
pub mod status;
pub mod summary;
pub mod util;
pub mod watch;
