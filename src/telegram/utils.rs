use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use teloxide::{
    net::Download,
    prelude::*,
    types::{BotCommand, Document},
    utils::command::BotCommands,
};

use crate::telegram::types::GeneralCommand;

pub const CREDENTIAL_FORMAT_HINT: &str = "email:password:refresh_token:client_id";

/// Commands shown only in the owner's chat.
pub fn owner_command_list() -> Vec<BotCommand> {
    let mut commands = GeneralCommand::bot_commands();
    commands.extend([
        BotCommand::new("load", "add mailboxes (paste or upload .txt)"),
        BotCommand::new("remove", "remove mailboxes (paste or upload .txt)"),
        BotCommand::new("clear", "remove ALL saved mailboxes"),
    ]);
    commands
}

/// Downloads an uploaded credential list. Only `.txt` uploads are accepted.
pub async fn read_txt_document(bot: &Bot, doc: &Document) -> Result<String> {
    if let Some(name) = &doc.file_name {
        if !name.to_lowercase().ends_with(".txt") {
            return Err(anyhow!("only .txt uploads are accepted"));
        }
    }
    let file = bot
        .get_file(doc.file.id.clone())
        .await
        .context("could not resolve the uploaded file")?;

    let mut buffer = Cursor::new(Vec::new());
    bot.download_file(&file.path, &mut buffer)
        .await
        .context("could not download the uploaded file")?;

    String::from_utf8(buffer.into_inner()).map_err(|_| anyhow!("uploaded file is not valid UTF-8"))
}
