//! Command-line argument definitions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ta_core::{BreakKind, EmployeeContext, EmployeeId, OrganizationId, TeamId};

use crate::Config;
use crate::config::MAX_SESSION_HOURS;
use crate::commands::util::parse_clock_time;

/// Time and attendance tracker.
///
/// Records clock-ins, breaks and clock-outs, checks break compliance, and
/// compares planned shifts with actual presence.
#[derive(Debug, Parser)]
#[command(name = "ta", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a work session.
    ClockIn {
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Pause work for a break.
    Break {
        /// Kind of break.
        #[arg(value_enum)]
        kind: BreakArg,
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Return to work from a break.
    Resume {
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// End the current session.
    ClockOut {
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Show the current session and break entitlement.
    Status {
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Close sessions left open longer than the configured limit.
    CloseStale {
        /// Override `max_session_hours` from the config.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_SESSION_HOURS))]
        max_hours: Option<i64>,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Manage planned shifts.
    #[command(subcommand)]
    Schedule(ScheduleAction),

    /// Show planned versus actual coverage for a week.
    Coverage {
        /// Any date in the week to show (defaults to this week).
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Only include this team.
        #[arg(long)]
        team: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Show daily and weekly attendance totals.
    Summary {
        /// Any date in the week to show (defaults to this week).
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        who: EmployeeArgs,
        #[command(flatten)]
        at: AtArgs,
    },

    /// Continuously show the current session, refreshing on changes.
    Watch {
        /// Stop after this many refreshes.
        #[arg(long)]
        count: Option<u64>,
        #[command(flatten)]
        who: EmployeeArgs,
    },
}

/// Schedule subcommands.
#[derive(Debug, Subcommand)]
pub enum ScheduleAction {
    /// Plan a shift. An end at or before the start runs past midnight.
    Add {
        /// Date of the shift (YYYY-MM-DD).
        #[arg(long)]
        date: NaiveDate,
        /// Start time (HH:MM).
        #[arg(long, value_parser = parse_clock_time)]
        start: NaiveTime,
        /// End time (HH:MM).
        #[arg(long, value_parser = parse_clock_time)]
        end: NaiveTime,
        #[command(flatten)]
        who: EmployeeArgs,
    },

    /// List planned shifts for a week.
    List {
        /// Any date in the week to list (defaults to this week).
        #[arg(long)]
        week: Option<NaiveDate>,
        /// Only include this team.
        #[arg(long)]
        team: Option<String>,
    },
}

/// Break kinds accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BreakArg {
    Coffee,
    Lunch,
    Rest,
}

impl From<BreakArg> for BreakKind {
    fn from(arg: BreakArg) -> Self {
        match arg {
            BreakArg::Coffee => Self::Coffee,
            BreakArg::Lunch => Self::Lunch,
            BreakArg::Rest => Self::Rest,
        }
    }
}

/// Identifies the employee a command is for.
#[derive(Debug, Clone, Args)]
pub struct EmployeeArgs {
    /// Employee ID (defaults to `employee_id` from the config).
    #[arg(long)]
    pub employee: Option<String>,

    /// Organization ID (defaults to `organization_id` from the config).
    #[arg(long)]
    pub org: Option<String>,

    /// Team ID (defaults to `team_id` from the config).
    #[arg(long)]
    pub team: Option<String>,
}

impl EmployeeArgs {
    /// Fills in missing values from the config.
    pub fn resolve(&self, config: &Config) -> Result<EmployeeContext> {
        let employee = self
            .employee
            .clone()
            .or_else(|| config.employee_id.clone())
            .context("no employee given; pass --employee or set employee_id in the config")?;
        let org = self
            .org
            .clone()
            .unwrap_or_else(|| config.organization_id.clone());
        let team = self.team.clone().or_else(|| config.team_id.clone());

        Ok(EmployeeContext {
            employee_id: EmployeeId::new(employee).context("invalid employee ID")?,
            organization_id: OrganizationId::new(org).context("invalid organization ID")?,
            team_id: team
                .map(TeamId::new)
                .transpose()
                .context("invalid team ID")?,
        })
    }
}

/// When a command takes effect.
#[derive(Debug, Clone, Args)]
pub struct AtArgs {
    /// Time of the command: ISO 8601 or relative (e.g., '10 minutes ago').
    /// Defaults to now.
    #[arg(long)]
    pub at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn break_parses_kind_and_time() {
        let cli = Cli::parse_from(["ta", "break", "lunch", "--employee", "emp-a", "--at", "1 hour ago"]);
        let Some(Commands::Break { kind, who, at }) = cli.command else {
            panic!("expected break command");
        };
        assert_eq!(kind, BreakArg::Lunch);
        assert_eq!(who.employee.as_deref(), Some("emp-a"));
        assert_eq!(at.at.as_deref(), Some("1 hour ago"));
    }

    #[test]
    fn schedule_add_parses_clock_times() {
        let cli = Cli::parse_from([
            "ta", "schedule", "add", "--date", "2025-03-10", "--start", "22:00", "--end", "06:00",
        ]);
        let Some(Commands::Schedule(ScheduleAction::Add { date, start, end, .. })) = cli.command else {
            panic!("expected schedule add");
        };
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(start, NaiveTime::from_hms_opt(22, 0, 0).unwrap());
        assert_eq!(end, NaiveTime::from_hms_opt(6, 0, 0).unwrap());
    }

    #[test]
    fn employee_falls_back_to_config() {
        let config = Config {
            employee_id: Some("emp-cfg".to_string()),
            team_id: Some("team-1".to_string()),
            ..Config::default()
        };
        let args = EmployeeArgs {
            employee: None,
            org: Some("org-x".to_string()),
            team: None,
        };
        let who = args.resolve(&config).unwrap();
        assert_eq!(who.employee_id.as_str(), "emp-cfg");
        assert_eq!(who.organization_id.as_str(), "org-x");
        assert_eq!(who.team_id.map(|t| t.to_string()).as_deref(), Some("team-1"));
    }

    #[test]
    fn missing_employee_is_an_error() {
        let args = EmployeeArgs {
            employee: None,
            org: None,
            team: None,
        };
        let err = args.resolve(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("--employee"));
    }

    #[test]
    fn close_stale_rejects_non_positive_hours() {
        for hours in ["0", "-3", "9000"] {
            let result = Cli::try_parse_from(["ta", "close-stale", "--max-hours", hours]);
            assert!(result.is_err(), "--max-hours {hours} should be rejected");
        }

        let cli = Cli::parse_from(["ta", "close-stale", "--max-hours", "12"]);
        let Some(Commands::CloseStale { max_hours, .. }) = cli.command else {
            panic!("expected close-stale command");
        };
        assert_eq!(max_hours, Some(12));
    }
}
