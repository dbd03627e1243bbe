use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use teloxide::utils::command::BotCommands;

use crate::{
    config::AppConfig, db::mailboxes::MailboxRepository, mail::MailApiClient,
    tasks::watch::WatchHandle,
};

pub type BotResult<T> = Result<T, teloxide::RequestError>;

/// What the owner's next non-command message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    Load,
    Remove,
}

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub mailboxes: Arc<MailboxRepository>,
    pub mail: Arc<MailApiClient>,
    pub watch: Arc<WatchHandle>,
    /// chat id → armed input mode, for /load and /remove follow-ups.
    pub pending: Mutex<HashMap<i64, PendingAction>>,
}

impl AppState {
    pub fn is_owner(&self, chat_id: i64) -> bool {
        self.config.owner_chat_id == chat_id
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum GeneralCommand {
    #[command(description = "what this bot does")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "list saved mailboxes")]
    List,
    #[command(description = "latest mail for an address (inbox + junk)")]
    Latest(String),
    #[command(description = "watcher status")]
    Status,
}
