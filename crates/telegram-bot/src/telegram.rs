use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracker_core::{Dispatcher, TrackerError, UserId};

/// Slack added on top of the long-poll timeout before the HTTP request gives up.
const HTTP_TIMEOUT_SLACK_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    /// The user who sent the message. Tracking state and notifications are keyed by
    /// this, never by the chat, so members of a group keep separate records. Anonymous
    /// posts without a sender fall back to the chat id.
    pub fn sender(&self) -> UserId {
        UserId(self.from.as_ref().map_or(self.chat.id, |user| user.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

/// Minimal Telegram Bot API client: long polling in, plain text messages out.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, api_url: &str, poll_timeout: Duration) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(HTTP_TIMEOUT_SLACK_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let url = format!("{}/{}", self.base_url, method);
        let response: ApiResponse<T> = self.client.post(&url).json(&payload).send().await?.json().await?;

        match response {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::Api(
                description.unwrap_or_else(|| format!("{} failed", method)),
            )),
        }
    }

    /// Drop any configured webhook (long polling is refused while one is set).
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteWebhook",
                json!({ "drop_pending_updates": drop_pending_updates }),
            )
            .await?;
        Ok(())
    }

    /// Long-poll for updates with id >= `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if let Some(message_id) = reply_to {
            payload["reply_to_message_id"] = json!(message_id);
        }

        let _: Message = self.call("sendMessage", payload).await?;
        Ok(())
    }
}

#[async_trait]
impl Dispatcher for TelegramClient {
    async fn send(&self, user: UserId, text: &str) -> Result<(), TrackerError> {
        self.send_message(user.0, text, None)
            .await
            .map_err(|e| TrackerError::Delivery(e.to_string()))
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
