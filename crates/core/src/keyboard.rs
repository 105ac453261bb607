//! Transport-neutral keyboards attached to outbound messages.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self { label: label.into(), payload: payload.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum Keyboard {
    /// Buttons attached to the message; presses come back as payloads.
    Inline(Vec<Vec<InlineButton>>),
    /// Persistent keyboard replacing the text input; presses come back as typed text.
    Reply(Vec<Vec<String>>),
}

impl Keyboard {
    /// One button per row, the layout every inline menu uses.
    pub fn column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self::Inline(buttons.into_iter().map(|button| vec![button]).collect())
    }

    pub fn payloads(&self) -> Vec<&str> {
        match self {
            Self::Inline(rows) => {
                rows.iter().flatten().map(|button| button.payload.as_str()).collect()
            }
            Self::Reply(_) => Vec::new(),
        }
    }

    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::Inline(rows) => {
                rows.iter().flatten().map(|button| button.label.as_str()).collect()
            }
            Self::Reply(rows) => rows.iter().flatten().map(String::as_str).collect(),
        }
    }
}
