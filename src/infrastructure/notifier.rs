use teloxide::prelude::*;

use crate::{
    config::AppConfig,
    domain::{otp, NormalizedMessage},
};

/// Delivers a message to the operator. Fire and forget: a failed delivery is
/// logged and dropped; it never blocks the tick or rolls back seen-state.
pub async fn notify_owner(bot: &Bot, config: &AppConfig, text: &str) {
    if let Err(err) = bot
        .send_message(ChatId(config.owner_chat_id), text)
        .await
    {
        tracing::warn!(
            target: "telegram",
            error = %err,
            owner_chat_id = config.owner_chat_id,
            "failed to deliver owner notification"
        );
    }
}

/// Shared reply body for change notifications and /latest.
pub fn format_mail_summary(name: &str, message: &NormalizedMessage) -> String {
    let otp = otp::extract_otp(&format!("{} {}", message.subject, message.text));
    format!(
        "📬 {}\nFrom: {}\nSubject: {}\nOTP: {}",
        name,
        fallback(&message.from),
        fallback(&message.subject),
        otp.as_deref().unwrap_or("N/A"),
    )
}

fn fallback(value: &str) -> &str {
    if value.trim().is_empty() {
        "?"
    } else {
        value
    }
}
