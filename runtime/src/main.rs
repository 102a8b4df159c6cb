// Copyright 2026 Pillar Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Parser, Subcommand};
use pillar_runtime::agent::form::Sex;
use pillar_runtime::calendar::DEFAULT_UTC_OFFSET_MINUTES;
use pillar_runtime::cli;
use pillar_runtime::orchestrator::{Strategy, SubjectRequest};

#[derive(Parser)]
#[command(
    name = "pillar",
    about = "Pillar — four-pillar chart acquisition",
    version,
    after_help = "Run 'pillar <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the chart of one moment locally
    Chart {
        /// "YYYY-MM-DD", "YYYY-MM-DD HH" or "YYYY-MM-DD HH:MM"
        datetime: String,
        /// Offset of the given time from UTC, in minutes
        #[arg(long, default_value_t = DEFAULT_UTC_OFFSET_MINUTES, allow_hyphen_values = true)]
        utc_offset: i32,
    },
    /// Acquire the subject chart and today's reference chart
    Acquire {
        /// Subject name shown on the external service
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = Sex::Male)]
        sex: Sex,
        /// Birth year, common era or Republic era (e.g. 76)
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        day: u32,
        #[arg(long, default_value = "12")]
        hour: u32,
        #[arg(long, default_value = "0")]
        minute: u32,
        /// Where charts come from
        #[arg(long, value_enum, default_value_t = Strategy::Local)]
        strategy: Strategy,
    },
    /// Check configuration and browser availability
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("PILLAR_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("PILLAR_QUIET", "1");
    }

    let directive: tracing_subscriber::filter::Directive =
        pillar_runtime::config::log_directive(cli.verbose).parse()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    let result = match cli.command {
        Commands::Chart {
            datetime,
            utc_offset,
        } => cli::chart_cmd::run(&datetime, utc_offset).await,
        Commands::Acquire {
            name,
            sex,
            year,
            month,
            day,
            hour,
            minute,
            strategy,
        } => {
            let subject = SubjectRequest {
                name,
                sex,
                year,
                month,
                day,
                hour,
                minute,
            };
            cli::acquire_cmd::run(subject, strategy).await
        }
        Commands::Doctor => cli::doctor::run().await,
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
