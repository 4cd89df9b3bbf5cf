use jot_core::models::{Conversation, Event, Task};
use jot_core::sync::PullReport;
use jot_core::Note;

use crate::commands::common::{open_context, GlobalOptions};
use crate::error::CliError;

pub async fn run_sync(options: &GlobalOptions) -> Result<(), CliError> {
    let context = open_context(options).await?;
    context.require_remote()?;

    let Some(report) = context.engine().sync_now().await else {
        println!("Sync already running");
        return Ok(());
    };
    if let Some(error) = report.error {
        return Err(CliError::SyncFailed(error));
    }

    println!(
        "Sync completed: {} applied, {} failed, {} deferred",
        report.applied, report.failed, report.skipped
    );
    Ok(())
}

pub async fn run_pull(options: &GlobalOptions) -> Result<(), CliError> {
    let context = open_context(options).await?;
    context.require_remote()?;

    let engine = context.engine();
    let user_id = context.user_id.as_str();
    let reports = [
        ("notes", engine.pull::<Note>(user_id).await?),
        ("tasks", engine.pull::<Task>(user_id).await?),
        ("events", engine.pull::<Event>(user_id).await?),
        ("conversations", engine.pull::<Conversation>(user_id).await?),
    ];

    for (collection, report) in &reports {
        println!("{}", format_pull_line(collection, report));
    }
    Ok(())
}

pub fn format_pull_line(collection: &str, report: &PullReport) -> String {
    format!(
        "{collection:<14} fetched={} applied={} kept_local={}",
        report.fetched, report.applied, report.kept_local
    )
}
