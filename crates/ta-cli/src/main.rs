use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ta_cli::commands::util::command_time;
use ta_cli::commands::watch::WatchSettings;
use ta_cli::commands::{clock, close_stale, coverage, schedule, status, summary, watch};
use ta_cli::{AtArgs, Cli, Commands, Config, EmployeeArgs, ScheduleAction};
use ta_core::calendar::local_date;
use ta_core::{Command, SessionEngine, TeamId};
use ta_db::{Database, NewSchedule, Store};

/// Load config and open the store, ensuring the parent directory exists.
fn open_store(config_path: Option<&Path>) -> Result<(Store, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    db.set_busy_timeout(config.busy_timeout())
        .context("failed to set busy timeout")?;
    let store = Store::new(db).context("failed to initialize store")?;
    Ok((store, config))
}

fn parse_team(team: Option<&str>) -> Result<Option<TeamId>> {
    team.map(TeamId::new)
        .transpose()
        .context("invalid team ID")
}

/// The week shown when `--week` is absent: the local week containing the
/// command time.
fn anchor_date(week: Option<NaiveDate>, at: Option<&str>) -> Result<(NaiveDate, chrono::DateTime<chrono::Utc>)> {
    let now = command_time(at)?;
    Ok((week.unwrap_or_else(|| local_date(&Local, now)), now))
}

fn run_clock<W: Write>(
    writer: &mut W,
    config_path: Option<&Path>,
    who: &EmployeeArgs,
    at: &AtArgs,
    command: Command,
) -> Result<()> {
    let (store, config) = open_store(config_path)?;
    let who = who.resolve(&config)?;
    let engine = SessionEngine::new(store, Local);
    clock::run(writer, &engine, &who, command, command_time(at.at.as_deref())?)
}

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so report output stays parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::ClockIn { who, at }) => {
            run_clock(&mut stdout, cli.config.as_deref(), who, at, Command::ClockIn)?;
        }
        Some(Commands::Break { kind, who, at }) => {
            let command = Command::StartBreak((*kind).into());
            run_clock(&mut stdout, cli.config.as_deref(), who, at, command)?;
        }
        Some(Commands::Resume { who, at }) => {
            run_clock(&mut stdout, cli.config.as_deref(), who, at, Command::ResumeWork)?;
        }
        Some(Commands::ClockOut { who, at }) => {
            run_clock(&mut stdout, cli.config.as_deref(), who, at, Command::ClockOut)?;
        }
        Some(Commands::Status { who, at }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let who = who.resolve(&config)?;
            let engine = SessionEngine::new(store, Local);
            status::run(&mut stdout, &engine, &who.employee_id, command_time(at.at.as_deref())?)?;
        }
        Some(Commands::CloseStale { max_hours, at }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let max_open = match max_hours {
                Some(hours) => chrono::Duration::hours(*hours),
                None => config.max_session()?,
            };
            let engine = SessionEngine::new(store, Local);
            close_stale::run(&mut stdout, &engine, command_time(at.at.as_deref())?, max_open)?;
        }
        Some(Commands::Schedule(action)) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            match action {
                ScheduleAction::Add {
                    date,
                    start,
                    end,
                    who,
                } => {
                    let who = who.resolve(&config)?;
                    let shift = NewSchedule {
                        employee_id: who.employee_id,
                        organization_id: who.organization_id,
                        team_id: who.team_id,
                        scheduled_date: *date,
                        scheduled_start: *start,
                        scheduled_end: *end,
                    };
                    schedule::add(&mut stdout, &store, &shift)?;
                }
                ScheduleAction::List { week, team } => {
                    let (anchor, _) = anchor_date(*week, None)?;
                    let team = parse_team(team.as_deref())?;
                    schedule::list(&mut stdout, &store, anchor, team.as_ref())?;
                }
            }
        }
        Some(Commands::Coverage {
            week,
            team,
            json,
            at,
        }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let (anchor, now) = anchor_date(*week, at.at.as_deref())?;
            let team = parse_team(team.as_deref())?;
            coverage::run(
                &mut stdout,
                &store,
                anchor,
                now,
                &Local,
                &config.coverage,
                team.as_ref(),
                *json,
            )?;
        }
        Some(Commands::Summary {
            week,
            json,
            who,
            at,
        }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let who = who.resolve(&config)?;
            let (anchor, now) = anchor_date(*week, at.at.as_deref())?;
            summary::run(&mut stdout, &store, &who.employee_id, anchor, now, &Local, *json)?;
        }
        Some(Commands::Watch { count, who }) => {
            let (store, config) = open_store(cli.config.as_deref())?;
            let who = who.resolve(&config)?;
            let settings = WatchSettings {
                tick: config.tick(),
                debounce: config.debounce(),
                count: *count,
            };
            let engine = SessionEngine::new(store, Local);
            watch::run(&mut stdout, &engine, &who.employee_id, settings, chrono::Utc::now)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
