use serde::Serialize;

use basketbot_core::{Keyboard, Outbound};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
}

impl GetUpdates {
    pub fn new(offset: Option<i64>, timeout: u64) -> Self {
        Self { offset, timeout, allowed_updates: &["message", "callback_query"] }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<ReplyMarkup>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline { inline_keyboard: Vec<Vec<InlineKeyboardButton>> },
    Reply { keyboard: Vec<Vec<KeyboardButton>>, resize_keyboard: bool, is_persistent: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
}

impl From<&Keyboard> for ReplyMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        match keyboard {
            Keyboard::Inline(rows) => ReplyMarkup::Inline {
                inline_keyboard: rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|button| InlineKeyboardButton {
                                text: button.label.clone(),
                                callback_data: button.payload.clone(),
                            })
                            .collect()
                    })
                    .collect(),
            },
            Keyboard::Reply(rows) => ReplyMarkup::Reply {
                keyboard: rows
                    .iter()
                    .map(|row| {
                        row.iter().map(|label| KeyboardButton { text: label.clone() }).collect()
                    })
                    .collect(),
                resize_keyboard: true,
                is_persistent: true,
            },
        }
    }
}

impl From<&Outbound> for SendMessage {
    fn from(outbound: &Outbound) -> Self {
        Self {
            chat_id: outbound.target.0,
            text: outbound.text.clone(),
            reply_markup: outbound.keyboard.as_ref().map(ReplyMarkup::from),
        }
    }
}
