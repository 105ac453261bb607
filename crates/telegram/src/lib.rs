//! Telegram Bot API transport for basketbot.
//!
//! - **Updates** (`updates`) - `getUpdates` wire types normalized into core `InboundEvent`s
//! - **Markup** (`markup`) - `sendMessage` bodies and reply markup built from core `Outbound`s
//! - **Polling** (`polling`) - long-polling loop with offset tracking and reconnect backoff
//! - **Dispatch** (`dispatch`) - per-user ordered workers in front of the conversation runtime
//! - **Client** (`client`) - `reqwest` client implementing the transport and the core `Messenger`
//!
//! ```text
//! getUpdates → PollingRunner → UserDispatcher → worker(user) → ConversationRuntime
//!                                                                   ↓
//!                                       sendMessage ← BotApiClient (Messenger)
//! ```

pub mod client;
pub mod dispatch;
pub mod markup;
pub mod polling;
pub mod updates;

pub use client::{ApiError, BotApiClient};
pub use dispatch::{DispatcherSettings, UpdateHandler, UserDispatcher};
pub use polling::{
    PollingRunner, PollingSummary, ReconnectPolicy, StopReason, TransportError, UpdateTransport,
};
pub use updates::{normalize, Update, UpdateEnvelope};
