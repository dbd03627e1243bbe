use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use crate::{
    config::MailApiConfig,
    domain::{Folder, NormalizedMessage},
};

/// Client for the upstream "first mail" HTTP API.
pub struct MailApiClient {
    http: Client,
    config: MailApiConfig,
}

impl MailApiClient {
    pub fn new(http: Client, config: MailApiConfig) -> Self {
        Self { http, config }
    }

    /// Fetches the newest message for an account from one folder. `Ok(None)`
    /// means the folder had nothing usable; `Err` is a transport or upstream
    /// failure the caller may fold into absence.
    pub async fn fetch_latest(
        &self,
        account: &str,
        folder: Folder,
    ) -> Result<Option<NormalizedMessage>> {
        let response = self
            .http
            .get(self.config.api_base.clone())
            .query(&[
                ("clientKey", self.config.client_key.as_str()),
                ("account", account),
                ("folder", folder.as_query()),
            ])
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .with_context(|| format!("mail API request failed for folder {}", folder.as_query()))?
            .error_for_status()?;

        let payload: Value = response
            .json()
            .await
            .context("mail API returned a non-JSON body")?;
        Ok(NormalizedMessage::from_payload(&payload))
    }

    /// Inbox first, then junk. Transport errors and empty folders both fall
    /// through to the next folder; absence is not an error and the next tick
    /// retries naturally.
    pub async fn fetch_with_fallback(&self, name: &str, account: &str) -> Option<NormalizedMessage> {
        for folder in Folder::FALLBACK_ORDER {
            match self.fetch_latest(account, folder).await {
                Ok(Some(message)) => return Some(message),
                Ok(None) => {
                    tracing::debug!(
                        target: "mail",
                        mailbox = name,
                        folder = folder.as_query(),
                        "no message in folder"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target: "mail",
                        mailbox = name,
                        folder = folder.as_query(),
                        error = %err,
                        "fetch failed; treating as absent"
                    );
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use parking_lot::Mutex;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use url::Url;

    use super::*;

    const MESSAGE_BODY: &str =
        r#"{"from": "svc@y.com", "subject": "Code", "text": "Your code is 482913"}"#;
    const EMPTY_BODY: &str = "[]";

    /// One canned response per folder; records which folders were queried.
    async fn spawn_mail_api(
        inbox: (&'static str, &'static str),
        junk: (&'static str, &'static str),
    ) -> (MailApiClient, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let queried = Arc::new(Mutex::new(Vec::new()));

        let log = queried.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).into_owned();

                let (status, body) = if request.contains("folder=junkemail") {
                    log.lock().push("junkemail".to_string());
                    junk
                } else {
                    log.lock().push("inbox".to_string());
                    inbox
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        let config = MailApiConfig {
            api_base: Url::parse(&format!("http://{addr}/v1/mail/getFirstMail")).unwrap(),
            client_key: "test-key".to_string(),
            fetch_timeout: Duration::from_secs(2),
        };
        (MailApiClient::new(Client::new(), config), queried)
    }

    #[tokio::test]
    async fn inbox_hit_skips_junk() {
        let (client, queried) = spawn_mail_api(("200 OK", MESSAGE_BODY), ("200 OK", EMPTY_BODY)).await;

        let message = client.fetch_with_fallback("a@x.com", "a@x.com").await.unwrap();
        assert_eq!(message.subject, "Code");
        assert_eq!(*queried.lock(), ["inbox"]);
    }

    #[tokio::test]
    async fn empty_inbox_falls_back_to_junk() {
        let (client, queried) = spawn_mail_api(("200 OK", EMPTY_BODY), ("200 OK", MESSAGE_BODY)).await;

        let message = client.fetch_with_fallback("a@x.com", "a@x.com").await.unwrap();
        assert_eq!(message.text, "Your code is 482913");
        assert_eq!(*queried.lock(), ["inbox", "junkemail"]);
    }

    #[tokio::test]
    async fn inbox_error_falls_back_to_junk() {
        let (client, queried) = spawn_mail_api(
            ("500 Internal Server Error", "{}"),
            ("200 OK", MESSAGE_BODY),
        )
        .await;

        let message = client.fetch_with_fallback("a@x.com", "a@x.com").await.unwrap();
        assert_eq!(message.from, "svc@y.com");
        assert_eq!(*queried.lock(), ["inbox", "junkemail"]);
    }

    #[tokio::test]
    async fn both_folders_failing_is_absence() {
        let (client, queried) =
            spawn_mail_api(("500 Internal Server Error", "{}"), ("200 OK", EMPTY_BODY)).await;

        assert!(client.fetch_with_fallback("a@x.com", "a@x.com").await.is_none());
        assert_eq!(*queried.lock(), ["inbox", "junkemail"]);
    }
}
