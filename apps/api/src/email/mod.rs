/// Email client — thin proxy to the transactional-email provider (SendGrid v3).
///
/// The caller's JSON body is forwarded verbatim as the message; this service
/// neither builds nor validates messages.
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod handlers;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Email delivery is not configured")]
    NotConfigured,
}

/// Sends one message through a provider. Carried in `AppState` as
/// `Arc<dyn Mailer>` so tests can stand in for the provider.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &Value) -> Result<Value, EmailError>;
}

#[derive(Clone)]
pub struct SendGridClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl SendGridClient {
    pub fn new(api_key: String, api_url: String) -> Result<Self, EmailError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            api_key,
            api_url,
        })
    }
}

#[async_trait]
impl Mailer for SendGridClient {
    async fn send(&self, message: &Value) -> Result<Value, EmailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Email provider returned {status}: {body}");
            return Err(EmailError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        debug!("Email accepted by provider ({status})");
        Ok(provider_reply(&body))
    }
}

/// SendGrid answers 202 with an empty body; keep any JSON it does send.
fn provider_reply(body: &str) -> Value {
    if body.trim().is_empty() {
        return json!({ "message": "success" });
    }
    serde_json::from_str(body).unwrap_or_else(|_| json!({ "message": body }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_provider_reply_for_empty_body() {
        assert_eq!(provider_reply(""), json!({"message": "success"}));
    }

    #[test]
    fn test_provider_reply_keeps_json() {
        assert_eq!(provider_reply(r#"{"id": "abc"}"#), json!({"id": "abc"}));
    }

    #[test]
    fn test_provider_reply_wraps_plain_text() {
        assert_eq!(provider_reply("queued"), json!({"message": "queued"}));
    }

    #[tokio::test]
    async fn test_truncated_provider_body_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 8192];
            let _ = socket.read(&mut request).await;
            // Promise more bytes than are sent, then hang up.
            socket
                .write_all(b"HTTP/1.1 202 Accepted\r\ncontent-length: 64\r\n\r\n{\"id\"")
                .await
                .unwrap();
        });

        let client =
            SendGridClient::new("key".into(), format!("http://{addr}/v3/mail/send")).unwrap();
        let err = client.send(&json!({"subject": "hi"})).await.unwrap_err();
        assert!(matches!(err, EmailError::Http(_)));
    }
}
