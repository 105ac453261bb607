//! Inbound events and their classification into [`FlowEvent`]s.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::domain::cart::UserId;
use crate::domain::product::{Category, ProductCode};
use crate::flows::states::{EntryCommand, FlowEvent};

/// Button payloads the bot renders besides category names and product codes.
pub mod payload {
    pub const BACK: &str = "back";
    pub const ORDER: &str = "order";
    pub const DELETE: &str = "delete";
    pub const CLEAR: &str = "clear";
    pub const YES: &str = "yes";
    pub const NO: &str = "no";
}

/// Labels of the persistent reply keyboard. Pressing one sends the label as text.
pub mod labels {
    pub const MENU: &str = "📋 Menu";
    pub const HELP: &str = "ℹ️ Help";
    pub const FEEDBACK: &str = "✍️ Feedback";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Text,
    ButtonPress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: UserId,
    pub username: Option<String>,
    pub kind: EventKind,
    pub payload: String,
    pub correlation_id: String,
}

impl InboundEvent {
    pub fn text(user_id: UserId, text: impl Into<String>) -> Self {
        Self::new(user_id, EventKind::Text, text)
    }

    pub fn button(user_id: UserId, payload: impl Into<String>) -> Self {
        Self::new(user_id, EventKind::ButtonPress, payload)
    }

    fn new(user_id: UserId, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            user_id,
            username: None,
            kind,
            payload: payload.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

/// Recognizes slash commands (with an optional `@botname` suffix) and keyboard labels.
pub fn parse_command(text: &str) -> Option<Result<EntryCommand, String>> {
    let trimmed = text.trim();
    match trimmed {
        labels::MENU => return Some(Ok(EntryCommand::OpenMenu)),
        labels::HELP => return Some(Ok(EntryCommand::Help)),
        labels::FEEDBACK => return Some(Ok(EntryCommand::LeaveFeedback)),
        _ => {}
    }

    let command = trimmed.strip_prefix('/')?;
    let name = command.split_whitespace().next().unwrap_or_default();
    let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
    let parsed = match name.as_str() {
        "start" => EntryCommand::Start,
        "menu" => EntryCommand::OpenMenu,
        "help" => EntryCommand::Help,
        "feedback" => EntryCommand::LeaveFeedback,
        "cancel" => EntryCommand::Cancel,
        _ => return Some(Err(trimmed.to_owned())),
    };
    Some(Ok(parsed))
}

/// Turns a raw inbound event into the event the flow understands. Button payloads that
/// decode to a code outside the catalog are reported as malformed rather than selected.
pub fn classify(event: &InboundEvent, catalog: &Catalog) -> FlowEvent {
    match event.kind {
        EventKind::Text => match parse_command(&event.payload) {
            Some(Ok(command)) => FlowEvent::Command(command),
            Some(Err(command)) => FlowEvent::UnknownCommand(command),
            None => FlowEvent::Text(event.payload.clone()),
        },
        EventKind::ButtonPress => classify_button(&event.payload, catalog),
    }
}

fn classify_button(raw: &str, catalog: &Catalog) -> FlowEvent {
    if let Some(category) = Category::from_payload(raw) {
        return FlowEvent::CategorySelected(category);
    }
    match raw {
        payload::BACK => return FlowEvent::Back,
        payload::ORDER => return FlowEvent::Order,
        payload::DELETE => return FlowEvent::Delete,
        payload::CLEAR => return FlowEvent::Clear,
        payload::YES => return FlowEvent::Confirm(true),
        payload::NO => return FlowEvent::Confirm(false),
        _ => {}
    }

    let malformed = |reason: String| FlowEvent::MalformedButton { payload: raw.to_owned(), reason };
    match ProductCode::decode(raw) {
        Ok(code) => match catalog.resolve(code) {
            Ok(_) => FlowEvent::ProductSelected(code),
            Err(error) => malformed(error.to_string()),
        },
        Err(error) => malformed(error.to_string()),
    }
}
