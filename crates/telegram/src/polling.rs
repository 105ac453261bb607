use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::UserDispatcher;
use crate::updates::{normalize, Update};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed polls tolerated before the runner gives up.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 250, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Long-polls for updates with `update_id >= offset`. `Ok(None)` means the source is closed.
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
    /// Answers a button press so the client stops showing progress.
    async fn acknowledge(&self, callback_query_id: &str) -> Result<(), TransportError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    StreamClosed,
    Shutdown,
    RetriesExhausted,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollingSummary {
    pub updates_seen: u64,
    pub events_dispatched: u64,
    pub next_offset: Option<i64>,
    pub stop_reason: StopReason,
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: UserDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: UserDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub fn dispatcher(&self) -> &UserDispatcher {
        &self.dispatcher
    }

    pub async fn start(&self) -> Result<PollingSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Polls until the transport closes, retries are exhausted or `shutdown` resolves, then
    /// drains the per-user workers. Transport failures never escape as errors.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<PollingSummary>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut summary = PollingSummary::default();
        let mut consecutive_failures: u32 = 0;

        info!(event_name = "ingress.telegram.polling_started", "telegram long polling started");
        loop {
            let batch = tokio::select! {
                _ = &mut shutdown => {
                    info!(
                        event_name = "ingress.telegram.shutdown_requested",
                        "stopping telegram polling"
                    );
                    summary.stop_reason = StopReason::Shutdown;
                    break;
                }
                batch = self.transport.next_batch(summary.next_offset) => batch,
            };

            match batch {
                Ok(Some(updates)) => {
                    consecutive_failures = 0;
                    for update in updates {
                        self.route(update, &mut summary).await;
                    }
                }
                Ok(None) => {
                    info!(event_name = "ingress.telegram.stream_closed", "update source closed");
                    summary.stop_reason = StopReason::StreamClosed;
                    break;
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        attempt = consecutive_failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "telegram poll failed"
                    );
                    if consecutive_failures >= self.reconnect_policy.max_retries {
                        warn!(
                            event_name = "ingress.telegram.retries_exhausted",
                            max_retries = self.reconnect_policy.max_retries,
                            "telegram polling retries exhausted; continuing process without crash"
                        );
                        summary.stop_reason = StopReason::RetriesExhausted;
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(consecutive_failures);
                    consecutive_failures += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = &mut shutdown => {
                                summary.stop_reason = StopReason::Shutdown;
                                break;
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.dispatcher.shutdown().await;
        Ok(summary)
    }

    async fn route(&self, update: Update, summary: &mut PollingSummary) {
        summary.updates_seen += 1;
        summary.next_offset = Some(update.update_id + 1);

        let Some(envelope) = normalize(&update) else {
            debug!(
                event_name = "ingress.telegram.update_skipped",
                update_id = update.update_id,
                update_kind = update.kind(),
                "update carries nothing the bot acts on"
            );
            return;
        };

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = envelope.update_id,
            correlation_id = %envelope.event.correlation_id,
            user_id = %envelope.event.user_id,
            kind = ?envelope.event.kind,
            "received telegram update"
        );

        if let Some(callback_id) = &envelope.callback_query_id {
            if let Err(error) = self.transport.acknowledge(callback_id).await {
                warn!(
                    event_name = "ingress.telegram.ack_failed",
                    correlation_id = %envelope.event.correlation_id,
                    error = %error,
                    "failed to answer callback query"
                );
            }
        }

        if self.dispatcher.dispatch(envelope.event) {
            summary.events_dispatched += 1;
        }
    }
}
