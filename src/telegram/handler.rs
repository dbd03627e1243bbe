use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use teloxide::{
    dispatching::Dispatcher,
    error_handlers::ErrorHandler,
    prelude::*,
    types::{BotCommandScope, ChatId, Message, Recipient},
    update_listeners,
    utils::command::BotCommands,
};
use tokio::time::Instant;

use crate::{
    config::AppConfig,
    db::mailboxes::MailboxRepository,
    domain::mailbox::parse_credential_lines,
    infrastructure::{notifier::format_mail_summary, shutdown::ShutdownListener},
    mail::MailApiClient,
    tasks::watch::WatchHandle,
};

use super::{
    types::{AppState, BotResult, GeneralCommand, PendingAction},
    utils::{owner_command_list, read_txt_document, CREDENTIAL_FORMAT_HINT},
};

pub struct TelegramService {
    bot: Bot,
    state: Arc<AppState>,
}

/// Logs update-listener failures with enough context to tell a flaky network
/// from a broken one. Long-poll errors otherwise surface as a bare Display
/// with no URL or streak information.
struct ListenerErrorLog {
    window: std::time::Duration,
    state: Mutex<ErrorStreak>,
}

#[derive(Default)]
struct ErrorStreak {
    first_error_at: Option<Instant>,
    consecutive: u32,
}

#[derive(Clone, Copy, Debug)]
enum NetworkIssueKind {
    Timeout,
    Connection,
    Other,
}

impl NetworkIssueKind {
    fn label(self) -> &'static str {
        match self {
            NetworkIssueKind::Timeout => "request timeout",
            NetworkIssueKind::Connection => "TCP connect failure",
            NetworkIssueKind::Other => "network error",
        }
    }
}

impl ListenerErrorLog {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            window: std::time::Duration::from_secs(60),
            state: Mutex::new(ErrorStreak::default()),
        })
    }

    fn classify(error: &teloxide::RequestError) -> Option<(NetworkIssueKind, Option<String>)> {
        match error {
            teloxide::RequestError::Network(source) => {
                let req_err = source.as_ref();
                let kind = if req_err.is_timeout() {
                    NetworkIssueKind::Timeout
                } else if req_err.is_connect() {
                    NetworkIssueKind::Connection
                } else {
                    NetworkIssueKind::Other
                };
                Some((kind, req_err.url().map(|u| u.to_string())))
            }
            _ => None,
        }
    }
}

impl ErrorHandler<teloxide::RequestError> for ListenerErrorLog {
    fn handle_error(self: Arc<Self>, error: teloxide::RequestError) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let Some((kind, url)) = Self::classify(&error) else {
                tracing::error!(target: "telegram", error = %error, "update listener error");
                return;
            };

            let consecutive = {
                let now = Instant::now();
                let mut streak = self.state.lock();
                if streak
                    .first_error_at
                    .map(|ts| now.duration_since(ts) > self.window)
                    .unwrap_or(true)
                {
                    streak.first_error_at = Some(now);
                    streak.consecutive = 0;
                }
                streak.consecutive = streak.consecutive.saturating_add(1);
                streak.consecutive
            };

            tracing::error!(
                target: "telegram",
                issue = kind.label(),
                url = url.as_deref(),
                consecutive,
                error = %error,
                "Telegram polling network failure"
            );
        })
    }
}

impl TelegramService {
    pub fn new(
        bot: Bot,
        config: Arc<AppConfig>,
        mailboxes: Arc<MailboxRepository>,
        mail: Arc<MailApiClient>,
        watch: Arc<WatchHandle>,
    ) -> Self {
        let state = Arc::new(AppState {
            config,
            mailboxes,
            mail,
            watch,
            pending: Mutex::new(Default::default()),
        });
        Self { bot, state }
    }

    pub async fn run(&self, mut shutdown: ShutdownListener) -> Result<()> {
        self.sync_commands().await?;
        let me = self.bot.get_me().await?;
        tracing::info!(
            target: "telegram",
            bot_id = me.id.0,
            username = ?me.username,
            "Telegram bot connected"
        );

        let handler = Update::filter_message()
            .branch(
                dptree::entry()
                    .filter_command::<GeneralCommand>()
                    .endpoint(Self::on_command),
            )
            .branch(dptree::endpoint(Self::on_plain_message));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.state.clone()])
            .default_handler(|update| async move {
                tracing::debug!(target: "telegram", ?update, "unhandled update");
            })
            .build();

        let listener = update_listeners::polling_default(self.bot.clone()).await;
        let error_log = ListenerErrorLog::new();

        let shutdown_token = dispatcher.shutdown_token();
        let mut dispatcher_future = Box::pin(dispatcher.dispatch_with_listener(listener, error_log));
        let mut dispatcher_finished = false;

        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!(target: "telegram", "dispatcher shutdown requested");
                if let Ok(wait) = shutdown_token.shutdown() {
                    wait.await;
                }
            }
            _ = &mut dispatcher_future => {
                dispatcher_finished = true;
                tracing::info!(target: "telegram", "dispatcher finished");
            }
        }

        if !dispatcher_finished {
            dispatcher_future.await;
        }

        Ok(())
    }

    async fn on_command(
        bot: Bot,
        msg: Message,
        cmd: GeneralCommand,
        state: Arc<AppState>,
    ) -> BotResult<()> {
        match cmd {
            GeneralCommand::Start => {
                bot.send_message(
                    msg.chat.id,
                    "Mailbox watcher: polls saved mailboxes and pushes new mail \
                     (with any one-time code) to the owner. /help for commands.",
                )
                .await?
            }
            GeneralCommand::Help => {
                let text = format!(
                    "{}\n\nOwner:\n/load – add mailboxes (paste or upload .txt)\n\
                     /remove – remove mailboxes (paste or upload .txt)\n\
                     /clear – remove ALL saved mailboxes\n\nFormat:\n{}",
                    GeneralCommand::descriptions(),
                    CREDENTIAL_FORMAT_HINT
                );
                bot.send_message(msg.chat.id, text).await?
            }
            GeneralCommand::List => {
                let text = match state.mailboxes.list().await {
                    Ok(records) if records.is_empty() => "📭 No mailboxes saved.".to_string(),
                    Ok(records) => {
                        let names: Vec<String> =
                            records.iter().map(|r| format!("• {}", r.name)).collect();
                        format!("📧 Mailboxes:\n{}", names.join("\n"))
                    }
                    Err(err) => {
                        tracing::error!(target: "admin", error = %err, "failed to list mailboxes");
                        "⚠️ Storage error.".to_string()
                    }
                };
                bot.send_message(msg.chat.id, text).await?
            }
            GeneralCommand::Latest(raw) => {
                let text = Self::latest_reply(&state, raw.trim()).await;
                bot.send_message(msg.chat.id, text).await?
            }
            GeneralCommand::Status => {
                let snapshot = state.watch.snapshot();
                let saved = match state.mailboxes.list().await {
                    Ok(records) => records.len().to_string(),
                    Err(_) => "?".to_string(),
                };
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "Watcher status\n- saved mailboxes: {}\n- tracked fingerprints: {}\n- warm-up: {}",
                        saved,
                        snapshot.tracked,
                        if snapshot.warmed_up { "done" } else { "in progress" }
                    ),
                )
                .await?
            }
        };
        Ok(())
    }

    async fn latest_reply(state: &Arc<AppState>, name: &str) -> String {
        if name.is_empty() {
            return "Usage: /latest <email>".to_string();
        }
        let record = match state.mailboxes.find(name).await {
            Ok(Some(record)) => record,
            Ok(None) => return "❌ Not found. Use /list".to_string(),
            Err(err) => {
                tracing::error!(target: "admin", error = %err, "failed to look up mailbox");
                return "⚠️ Storage error.".to_string();
            }
        };
        match state
            .mail
            .fetch_with_fallback(&record.name, &record.account)
            .await
        {
            Some(message) => format_mail_summary(&record.name, &message),
            None => "📭 No mail / API error.".to_string(),
        }
    }

    async fn on_plain_message(bot: Bot, msg: Message, state: Arc<AppState>) -> BotResult<()> {
        let chat_id = msg.chat.id.0;

        if let Some(text) = msg.text() {
            if matches!(text.split_whitespace().next(), Some("/load" | "/remove" | "/clear")) {
                if !state.is_owner(chat_id) {
                    bot.send_message(msg.chat.id, "❌ Not allowed.").await?;
                    return Ok(());
                }
                return Self::on_owner_command(&bot, &msg, text, state).await;
            }
        }

        if !state.is_owner(chat_id) {
            return Ok(());
        }
        if msg.text().is_some_and(|text| text.starts_with('/')) {
            return Ok(());
        }

        let Some(action) = state.pending.lock().remove(&chat_id) else {
            return Ok(());
        };

        let content = if let Some(doc) = msg.document() {
            match read_txt_document(&bot, doc).await {
                Ok(content) => content,
                Err(err) => {
                    bot.send_message(msg.chat.id, format!("⚠️ {err}")).await?;
                    return Ok(());
                }
            }
        } else if let Some(text) = msg.text() {
            text.to_string()
        } else {
            // Neither text nor a document: keep waiting for usable input.
            state.pending.lock().insert(chat_id, action);
            return Ok(());
        };

        let entries = parse_credential_lines(&content);
        if entries.is_empty() {
            bot.send_message(msg.chat.id, "❌ No valid lines found.").await?;
            return Ok(());
        }

        match action {
            PendingAction::Load => {
                let mut added = 0usize;
                let mut skipped = 0usize;
                for entry in &entries {
                    match state.mailboxes.add(entry).await {
                        Ok(true) => added += 1,
                        Ok(false) => skipped += 1,
                        Err(err) => {
                            tracing::error!(
                                target: "admin",
                                error = %err,
                                mailbox = %entry.name,
                                "failed to add mailbox"
                            );
                            skipped += 1;
                        }
                    }
                }
                tracing::info!(target: "admin", added, skipped, "mailboxes loaded");
                bot.send_message(msg.chat.id, format!("✅ Added {added}, skipped {skipped}"))
                    .await?;
            }
            PendingAction::Remove => {
                let mut removed = Vec::new();
                for entry in &entries {
                    match state.mailboxes.remove(&entry.name).await {
                        Ok(true) => removed.push(entry.name.as_str()),
                        Ok(false) => {}
                        Err(err) => {
                            tracing::error!(
                                target: "admin",
                                error = %err,
                                mailbox = %entry.name,
                                "failed to remove mailbox"
                            );
                        }
                    }
                }
                // Stale fingerprints must go with the mailboxes, or a re-add
                // would silently swallow its first notification.
                state.watch.forget(removed.iter().copied());
                tracing::info!(target: "admin", removed = removed.len(), "mailboxes removed");
                bot.send_message(msg.chat.id, format!("🗑️ Removed {}", removed.len()))
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_owner_command(
        bot: &Bot,
        msg: &Message,
        text: &str,
        state: Arc<AppState>,
    ) -> BotResult<()> {
        let command = text.split_whitespace().next().unwrap_or("");
        match command {
            "/load" => {
                state.pending.lock().insert(msg.chat.id.0, PendingAction::Load);
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "Send lines now OR upload a .txt (each line: {}).",
                        CREDENTIAL_FORMAT_HINT
                    ),
                )
                .await?;
            }
            "/remove" => {
                state
                    .pending
                    .lock()
                    .insert(msg.chat.id.0, PendingAction::Remove);
                bot.send_message(msg.chat.id, "Send lines now OR upload a .txt to remove.")
                    .await?;
            }
            "/clear" => match state.mailboxes.clear().await {
                Ok(count) => {
                    state.watch.clear();
                    tracing::info!(target: "admin", count, "all mailboxes cleared");
                    bot.send_message(msg.chat.id, format!("✅ Cleared {count} mailboxes."))
                        .await?;
                }
                Err(err) => {
                    tracing::error!(target: "admin", error = %err, "failed to clear mailboxes");
                    bot.send_message(msg.chat.id, "⚠️ Storage error.").await?;
                }
            },
            _ => {}
        }
        Ok(())
    }

    async fn sync_commands(&self) -> BotResult<()> {
        self.bot
            .set_my_commands(GeneralCommand::bot_commands())
            .await?;
        self.bot
            .set_my_commands(owner_command_list())
            .scope(BotCommandScope::Chat {
                chat_id: Recipient::Id(ChatId(self.state.config.owner_chat_id)),
            })
            .await?;
        tracing::info!(target: "telegram", "bot commands synced");
        Ok(())
    }
}
