use jot_core::models::NewNote;
use jot_core::sync::Delivery;
use jot_core::NoteKind;

use crate::commands::common::{open_context, resolve_note_content, GlobalOptions};
use crate::error::CliError;

pub struct AddRequest<'a> {
    pub content: &'a [String],
    pub title: Option<String>,
    pub kind: NoteKind,
    pub media_url: Option<String>,
}

pub async fn run_add(request: AddRequest<'_>, options: &GlobalOptions) -> Result<(), CliError> {
    let has_media = request.media_url.is_some();
    let content = match resolve_note_content(request.content) {
        Ok(content) => content,
        Err(CliError::EmptyContent) if has_media || request.title.is_some() => String::new(),
        Err(error) => return Err(error),
    };

    let context = open_context(options).await?;
    let outcome = context
        .notes
        .create_note(
            &context.user_id,
            NewNote {
                kind: request.kind,
                title: request.title.unwrap_or_default(),
                content,
                media_url: request.media_url,
                pillar: None,
            },
        )
        .await?;
    context.notes.wait_for_enrichment().await;

    match outcome.delivery {
        Delivery::Synced => println!("{}", outcome.record.meta.id),
        Delivery::Queued { reason, .. } => {
            println!("{}", outcome.record.meta.id);
            match reason {
                Some(failure) => eprintln!("Queued for sync ({failure})"),
                None => eprintln!("Queued for sync"),
            }
        }
    }
    Ok(())
}
