use jot_core::sync::Delivery;

use crate::commands::common::{normalize_note_identifier, open_context, GlobalOptions};
use crate::error::CliError;

pub async fn run_delete(id: &str, options: &GlobalOptions) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let context = open_context(options).await?;
    let note_id = context
        .notes
        .resolve_id(&context.user_id, &normalized_id)
        .await?;

    let delivery = context.notes.delete_note(&note_id).await?;
    println!("{note_id}");
    if let Delivery::Queued { .. } = delivery {
        eprintln!("Deletion queued for sync");
    }
    Ok(())
}
