use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use basketbot_core::{DeliveryError, Messenger, Outbound};

use crate::markup::{AnswerCallbackQuery, GetUpdates, SendMessage};
use crate::polling::{TransportError, UpdateTransport};
use crate::updates::{ApiResponse, Update};

/// Headroom over the long-poll timeout before the HTTP request itself gives up.
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bot api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bot api returned {code}: {description}")]
    Api { code: i64, description: String },
    #[error("bot api response had no result for `{method}`")]
    MissingResult { method: &'static str },
}

impl ApiError {
    /// Errors Telegram returns when a chat is gone or has blocked the bot.
    fn is_unreachable(&self) -> bool {
        match self {
            Self::Api { code: 403, .. } => true,
            Self::Api { code: 400, description } => description.contains("chat not found"),
            _ => false,
        }
    }
}

pub struct BotApiClient {
    http: Client,
    api_base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
}

impl BotApiClient {
    pub fn new(
        api_base_url: &str,
        token: SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()?;
        Ok(Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_owned(),
            token,
            poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.token.expose_secret())
    }

    async fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R, ApiError>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        debug!(event_name = "telegram.api.request", method, "calling bot api");
        let response: ApiResponse<R> = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(|error| ApiError::Http(error.without_url()))?
            .json()
            .await
            .map_err(|error| ApiError::Http(error.without_url()))?;
        into_result(method, response)
    }

    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError> {
        self.call("getUpdates", &GetUpdates::new(offset, self.poll_timeout_secs)).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<(), ApiError> {
        let _sent: serde_json::Value = self.call("sendMessage", message).await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), ApiError> {
        let _answered: bool =
            self.call("answerCallbackQuery", &AnswerCallbackQuery { callback_query_id }).await?;
        Ok(())
    }
}

fn into_result<R>(method: &'static str, response: ApiResponse<R>) -> Result<R, ApiError> {
    if !response.ok {
        return Err(ApiError::Api {
            code: response.error_code.unwrap_or_default(),
            description: response.description.unwrap_or_else(|| "no description".to_owned()),
        });
    }
    response.result.ok_or(ApiError::MissingResult { method })
}

#[async_trait]
impl UpdateTransport for BotApiClient {
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        self.get_updates(offset)
            .await
            .map(Some)
            .map_err(|error| TransportError::Receive(error.to_string()))
    }

    async fn acknowledge(&self, callback_query_id: &str) -> Result<(), TransportError> {
        self.answer_callback_query(callback_query_id)
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }
}

#[async_trait]
impl Messenger for BotApiClient {
    async fn deliver(&self, message: &Outbound) -> Result<(), DeliveryError> {
        self.send_message(&SendMessage::from(message)).await.map_err(|error| {
            if error.is_unreachable() {
                DeliveryError::Unreachable(message.target)
            } else {
                match error {
                    ApiError::Api { .. } | ApiError::MissingResult { .. } => {
                        DeliveryError::Rejected(error.to_string())
                    }
                    ApiError::Http(_) => DeliveryError::Transport(error.to_string()),
                }
            }
        })
    }
}
