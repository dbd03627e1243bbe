use std::{sync::Arc, time::Instant};

use chrono::Utc;
use chrono_tz::Tz;
use teloxide::Bot;
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{
    config::AppConfig,
    db::mailboxes::MailboxRepository,
    domain::{Fingerprint, MailboxRecord, NormalizedMessage},
    infrastructure::{
        notifier::{format_mail_summary, notify_owner},
        shutdown::ShutdownListener,
    },
    mail::MailApiClient,
    tasks::{detector::Decision, watch::WatchHandle},
};

/// Fixed-period driver over the mailbox directory.
///
/// Each tick re-reads the directory and walks it sequentially, so at most one
/// upstream request is in flight at any instant. Ticks cannot overlap: the
/// tick body is awaited inline and `MissedTickBehavior::Delay` pushes the
/// schedule back instead of queueing catch-up ticks when a pass runs long.
pub struct MailboxPoller {
    mailboxes: Arc<MailboxRepository>,
    mail: Arc<MailApiClient>,
    watch: Arc<WatchHandle>,
    bot: Bot,
    config: Arc<AppConfig>,
}

impl MailboxPoller {
    pub fn new(
        mailboxes: Arc<MailboxRepository>,
        mail: Arc<MailApiClient>,
        watch: Arc<WatchHandle>,
        bot: Bot,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            mailboxes,
            mail,
            watch,
            bot,
            config,
        }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(&mut shutdown).await;
            tracing::info!(target: "poller", "mailbox poller stopped");
        })
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) {
        let mut ticker = interval(self.config.poller.poll_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            target: "poller",
            period_ms = self.config.poller.poll_period.as_millis() as u64,
            cooldown_ms = self.config.poller.cooldown.as_millis() as u64,
            "mailbox poller started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.notified() => break,
            }
            self.tick(shutdown).await;
        }
    }

    /// One full pass over the directory.
    async fn tick(&self, shutdown: &mut ShutdownListener) {
        let records = match self.mailboxes.list().await {
            Ok(records) => records,
            Err(err) => {
                tracing::error!(
                    target: "poller",
                    error = %err,
                    "could not read mailbox directory; skipping tick"
                );
                return;
            }
        };

        for record in &records {
            if shutdown.is_triggered() {
                tracing::info!(target: "poller", "shutdown requested mid-tick; stopping early");
                return;
            }
            self.visit(record).await;
        }

        let first_pass = { self.watch.state().mark_warmed_up() };
        if first_pass {
            // Record the warm-up baseline durably before notifications arm.
            self.watch.persist();
            tracing::info!(
                target: "poller",
                mailboxes = records.len(),
                "warm-up pass complete; notifications armed"
            );
        }
    }

    async fn visit(&self, record: &MailboxRecord) {
        let Some(message) = self
            .mail
            .fetch_with_fallback(&record.name, &record.account)
            .await
        else {
            // Absence writes nothing; the next tick retries naturally.
            return;
        };

        let fingerprint = Fingerprint::of(&message);
        let decision = {
            self.watch.state().observe(
                &record.name,
                &fingerprint,
                self.config.poller.cooldown,
                Instant::now(),
            )
        };

        match decision {
            Decision::Unchanged => {}
            Decision::Seed => {
                tracing::debug!(target: "detector", mailbox = %record.name, "baseline recorded");
                self.watch.persist();
            }
            Decision::RecordOnly => {
                tracing::info!(
                    target: "detector",
                    mailbox = %record.name,
                    "change inside cooldown window; recorded without notifying"
                );
                self.watch.persist();
            }
            Decision::Notify => {
                // Persist before delivery: a crash after the send at worst
                // drops one message, it never repeats it forever.
                self.watch.persist();
                let text = format_notification(&record.name, &message, &self.config.timezone);
                notify_owner(&self.bot, self.config.as_ref(), &text).await;
                tracing::info!(target: "detector", mailbox = %record.name, "change notified");
            }
        }
    }
}

fn format_notification(name: &str, message: &NormalizedMessage, timezone: &Tz) -> String {
    let observed_at = Utc::now().with_timezone(timezone).format("%Y-%m-%d %H:%M:%S");
    format!("{}\nAt: {}", format_mail_summary(name, message), observed_at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_carries_summary_and_timestamp() {
        let message = NormalizedMessage {
            from: "b@y.com".to_string(),
            subject: "Code".to_string(),
            text: "Your code is 482913".to_string(),
        };
        let text = format_notification("a@x.com", &message, &chrono_tz::UTC);
        assert!(text.contains("📬 a@x.com"));
        assert!(text.contains("OTP: 482913"));
        assert!(text.contains("At: "));
    }
}
