use serde::Serialize;

use crate::commands::common::{
    format_conflict_lines, format_queue_lines, operation_to_queue_item, open_context,
    GlobalOptions, QueueItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub user_id: String,
    pub remote_configured: bool,
    pub is_online: bool,
    pub pending_count: usize,
    pub label: String,
}

pub async fn run_status(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let context = open_context(options).await?;
    let status = context.engine().status();
    let report = StatusReport {
        user_id: context.user_id.clone(),
        remote_configured: context.remote_configured,
        is_online: status.is_online,
        pending_count: status.pending_count,
        label: status.label(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.label);
        if !report.remote_configured {
            println!("Remote store not configured; running local-only");
        }
    }
    Ok(())
}

pub async fn run_queue(as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let context = open_context(options).await?;
    let operations = context.engine().store().list_pending().await?;

    if as_json {
        let items = operations
            .iter()
            .map(operation_to_queue_item)
            .collect::<Vec<QueueItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if operations.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }
    for line in format_queue_lines(&operations) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts(
    limit: usize,
    as_json: bool,
    options: &GlobalOptions,
) -> Result<(), CliError> {
    let context = open_context(options).await?;
    let conflicts = context.engine().store().list_conflicts(limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }
    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
