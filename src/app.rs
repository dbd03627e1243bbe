use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use teloxide::prelude::*;
use tokio::{task::JoinHandle, time::timeout};

use crate::{
    config::AppConfig,
    db::{self, mailboxes::MailboxRepository},
    infrastructure::{
        directories::ResolvedPaths,
        notifier::notify_owner,
        shutdown::Shutdown,
    },
    mail::MailApiClient,
    tasks::{poller::MailboxPoller, seen_store::SeenStore, watch::WatchHandle},
    telegram::TelegramService,
};

pub struct MailwatchApp {
    _paths: ResolvedPaths,
    poller_handle: JoinHandle<()>,
    telegram: TelegramService,
    mailboxes: Arc<MailboxRepository>,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
    bot: Bot,
}

impl MailwatchApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let pool = db::init_pool(&paths.db_path).await?;
        let mailboxes = Arc::new(MailboxRepository::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("mailwatch/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mail = Arc::new(MailApiClient::new(http_client, config.mail.clone()));

        let watch = Arc::new(WatchHandle::new(SeenStore::new(paths.state_path.clone())));

        let bot = Bot::new(&config.telegram_bot_token);

        let telegram = TelegramService::new(
            bot.clone(),
            config.clone(),
            mailboxes.clone(),
            mail.clone(),
            watch.clone(),
        );

        let poller = Arc::new(MailboxPoller::new(
            mailboxes.clone(),
            mail,
            watch,
            bot.clone(),
            config.clone(),
        ));
        let poller_handle = poller.spawn(shutdown.subscribe());

        Ok(Self {
            _paths: paths,
            poller_handle,
            telegram,
            mailboxes,
            shutdown,
            config,
            bot,
        })
    }

    pub async fn run(self) -> Result<()> {
        let MailwatchApp {
            _paths: _,
            mut poller_handle,
            telegram,
            mailboxes,
            shutdown,
            config,
            bot,
        } = self;

        tracing::info!(target: "lifecycle", "mailbox watcher starting");
        notify_owner(&bot, config.as_ref(), "Mailbox watcher started.").await;

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);
        let mut telegram_future = Box::pin(telegram.run(shutdown.subscribe()));
        let mut telegram_completed = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "lifecycle", "shutdown signal received (CTRL+C / SIGTERM)");
            }
            res = &mut telegram_future => {
                telegram_completed = true;
                if let Err(err) = res {
                    tracing::error!(target: "telegram", ?err, "Telegram dispatcher exited with error");
                } else {
                    tracing::info!(target: "telegram", "Telegram dispatcher exited");
                }
            }
        }

        shutdown.trigger();

        if !telegram_completed {
            let wait = tokio::time::sleep(shutdown_timeout);
            tokio::pin!(wait);
            tokio::select! {
                res = &mut telegram_future => {
                    if let Err(err) = res {
                        tracing::error!(target: "telegram", ?err, "Telegram dispatcher exited with error");
                    }
                }
                _ = &mut wait => {
                    tracing::warn!(
                        target: "telegram",
                        "Telegram dispatcher did not stop within {:?}; forcing exit",
                        shutdown_timeout
                    );
                }
            }
        }

        match timeout(shutdown_timeout, &mut poller_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if err.is_panic() {
                    tracing::error!(target: "poller", "mailbox poller task panicked");
                }
            }
            Err(_) => {
                tracing::warn!(
                    target: "poller",
                    "mailbox poller did not stop within {:?}; aborting task",
                    shutdown_timeout
                );
                poller_handle.abort();
            }
        }

        if timeout(shutdown_timeout, mailboxes.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "mailbox directory did not close within {:?}",
                shutdown_timeout
            );
        }

        notify_owner(&bot, config.as_ref(), "Mailbox watcher stopped.").await;
        tracing::info!(target: "lifecycle", "mailbox watcher stopped");
        Ok(())
    }
}
