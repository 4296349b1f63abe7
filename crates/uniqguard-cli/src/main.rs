//! uniqguard discovery command.
//!
//! Lists, checks and renders the unique constraints declared by a schema.

mod commands;
mod formatter;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::Context;
use formatter::OutputFormat;
use uniqguard_core::SqlDialect;

/// uniqguard discovery command
#[derive(Parser, Debug)]
#[command(name = "uniqguard")]
#[command(version, about = "Inspect application-level unique constraints")]
pub struct Args {
    /// Schema JSON file
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Settings JSON file
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Database alias whose settings apply
    #[arg(short, long, default_value = "default")]
    pub database: String,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List extracted constraint descriptors
    List {
        /// Only this entity
        entity: Option<String>,
    },
    /// Extract every entity and report invalid metadata
    Check,
    /// Render existence queries for a SQL dialect
    Sql {
        /// Target dialect (postgres, mysql, sqlite)
        #[arg(long, default_value = "postgres")]
        dialect: SqlDialect,

        /// Filter out the candidate's own row, as on update
        #[arg(long)]
        update: bool,

        /// Only this entity
        entity: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("uniqguard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let ctx = Context::load(&args.schema, args.settings.as_deref(), &args.database)?;
    let formatter = formatter::create_formatter(args.format);

    match args.command {
        Command::List { entity } => {
            let rows = commands::list(&ctx, entity.as_deref())?;
            println!("{}", formatter.format_descriptors(&rows));
        }
        Command::Check => {
            let report = commands::check(&ctx);
            println!("{}", formatter.format_check(&report));
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Sql {
            dialect,
            update,
            entity,
        } => {
            let rows = commands::sql(&ctx, dialect, entity.as_deref(), update)?;
            println!("{}", formatter.format_queries(&rows));
        }
    }

    Ok(ExitCode::SUCCESS)
}
