use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod auth;
pub mod extract;
pub mod init;
pub mod job;
pub mod schedule;

use auth::ServiceKind;
use job::JobId;

#[derive(Subcommand)]
enum Command {
    /// Create the storage directory and db schema
    Init {},
    /// Perform OAuth authentication and store the refresh token
    Auth {
        #[arg(long, value_enum)]
        service: ServiceKind,
    },
    /// Run a job once
    Job {
        #[arg(long, value_enum)]
        id: JobId,
    },
    /// Run all periodic jobs on their interval until interrupted
    Schedule {},
    /// Print the reservation extracted from a saved email body
    Extract {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run().await?;
        }
        Some(Command::Auth { service }) => {
            auth::run(service).await?;
        }
        Some(Command::Job { id }) => {
            job::run(id).await?;
        }
        Some(Command::Schedule {}) => {
            schedule::run().await?;
        }
        Some(Command::Extract { file }) => {
            extract::run(&file)?;
        }
        None => {}
    }

    Ok(())
}
