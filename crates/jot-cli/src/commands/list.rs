use crate::commands::common::{
    format_note_lines, note_to_list_item, open_context, GlobalOptions, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, options: &GlobalOptions) -> Result<(), CliError> {
    let context = open_context(options).await?;
    let mut notes = context.notes.list_notes(&context.user_id).await?;
    notes.truncate(limit);

    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(&notes) {
            println!("{line}");
        }
    }

    Ok(())
}
