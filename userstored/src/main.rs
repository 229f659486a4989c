use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;
use mimalloc::MiMalloc;
use serde::Serialize;

use userstored::{
    params,
    repo::FacadeRecords,
    types::{BackendKind, Record},
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Store and migrate user records on MongoDB, HCD or Astra DB.
#[derive(Parser, Debug)]
#[command(name = "userstored")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend to use, overrides `DATABASE_TYPE`
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the selected backend
    Info,
    /// Create a record from a JSON object, a key is generated if missing
    Create { json: String },
    /// List all records
    List,
    /// Show the record with the given key
    Get { key: String },
    /// Delete the record with the given key
    Delete { key: String },
    /// Copy all records from one backend to another
    Migrate {
        #[arg(long, default_value = "mongodb")]
        from: BackendKind,
        #[arg(long, default_value = "hcd")]
        to: BackendKind,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] params::ConfigError),
    #[error(transparent)]
    Facade(#[from] userstored::repo::FacadeError),
    #[error("invalid record :: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Record(#[from] userstored::types::RecordError),
    #[error("record `{0}` not found")]
    NotFound(String),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    debug!("{:?}", cli);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut settings = params::Settings::from_env()?;
    if let Some(backend) = cli.backend {
        settings = settings.with_backend(backend);
    }

    let store = FacadeRecords::new(settings).await?;

    match cli.command {
        Command::Info => print_json(&store.get_database_info())?,
        Command::Create { json } => {
            let record = Record::try_from(serde_json::from_str::<serde_json::Value>(&json)?)?;
            print_json(&store.create_record(record).await?)?;
        }
        Command::List => print_json(&store.get_all_records().await?)?,
        Command::Get { key } => match store.get_record_by_key(&key).await? {
            Some(record) => print_json(&record)?,
            None => return Err(CliError::NotFound(key)),
        },
        Command::Delete { key } => {
            if !store.delete_record_by_key(&key).await? {
                return Err(CliError::NotFound(key));
            }
            eprintln!("{} record `{}` deleted", "ok:".green().bold(), key);
        }
        Command::Migrate { from, to } => {
            let report = store.migrate(from, to).await;
            print_json(&report)?;
            if !report.success {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
