//! Jot CLI - offline-first notes from the terminal
//!
//! Captures notes into the local store and pushes queued changes to the
//! remote store when it is reachable.

mod cli;
mod commands;
mod error;
mod local_only;
#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands};
use crate::commands::add::{run_add, AddRequest};
use crate::commands::common::GlobalOptions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::status::{run_conflicts, run_queue, run_status};
use crate::commands::sync::{run_pull, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "jot=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        db_path: cli.db_path,
        config_path: cli.config,
        user: cli.user,
        offline: cli.offline,
    };

    match cli.command {
        Some(Commands::Add {
            content,
            title,
            kind,
            media_url,
        }) => {
            let request = AddRequest {
                content: &content,
                title,
                kind: kind.into(),
                media_url,
            };
            run_add(request, &options).await?;
        }
        Some(Commands::List { limit, json }) => run_list(limit, json, &options).await?,
        Some(Commands::Delete { id }) => run_delete(&id, &options).await?,
        Some(Commands::Sync) => run_sync(&options).await?,
        Some(Commands::Pull) => run_pull(&options).await?,
        Some(Commands::Status { json }) => run_status(json, &options).await?,
        Some(Commands::Queue { json }) => run_queue(json, &options).await?,
        Some(Commands::Conflicts { limit, json }) => run_conflicts(limit, json, &options).await?,
        None => {
            // Quick capture mode: jot "my thought"
            if cli.note.is_empty() {
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                let request = AddRequest {
                    content: &cli.note,
                    title: None,
                    kind: jot_core::NoteKind::Text,
                    media_url: None,
                };
                run_add(request, &options).await?;
            }
        }
    }

    Ok(())
}
