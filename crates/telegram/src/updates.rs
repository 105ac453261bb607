use serde::Deserialize;

use basketbot_core::{InboundEvent, UserId};

/// Envelope every Bot API method answers with.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub data: Option<String>,
}

/// An update the bot acts on, already translated into a core event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    /// Present for button presses; the callback must be answered so the client stops its spinner.
    pub callback_query_id: Option<String>,
    pub event: InboundEvent,
}

impl Update {
    pub fn kind(&self) -> &'static str {
        match (&self.message, &self.callback_query) {
            (Some(_), _) => "message",
            (None, Some(_)) => "callback_query",
            (None, None) => "unsupported",
        }
    }
}

/// Turns a raw update into an event. Updates from bots, group chats, non-text messages and
/// callbacks without data yield `None`; their offset still advances.
pub fn normalize(update: &Update) -> Option<UpdateEnvelope> {
    let correlation_id = format!("tg-{}", update.update_id);

    if let Some(message) = &update.message {
        let from = message.from.as_ref().filter(|user| !user.is_bot)?;
        if message.chat.kind != "private" {
            return None;
        }
        let text = message.text.as_deref()?;
        let event = with_username(InboundEvent::text(UserId(from.id), text), from)
            .with_correlation_id(correlation_id);
        return Some(UpdateEnvelope { update_id: update.update_id, callback_query_id: None, event });
    }

    if let Some(callback) = &update.callback_query {
        if callback.from.is_bot {
            return None;
        }
        let data = callback.data.as_deref()?;
        let button = InboundEvent::button(UserId(callback.from.id), data);
        let event = with_username(button, &callback.from).with_correlation_id(correlation_id);
        return Some(UpdateEnvelope {
            update_id: update.update_id,
            callback_query_id: Some(callback.id.clone()),
            event,
        });
    }

    None
}

fn with_username(event: InboundEvent, user: &User) -> InboundEvent {
    match &user.username {
        Some(username) => event.with_username(username.clone()),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use basketbot_core::flows::EventKind;
    use basketbot_core::UserId;

    use super::{normalize, ApiResponse, Update};

    fn parse(raw: &str) -> Update {
        serde_json::from_str(raw).expect("valid update json")
    }

    #[test]
    fn private_text_message_becomes_text_event() {
        let update = parse(
            r#"{"update_id": 101, "message": {"message_id": 5, "date": 1700000000,
                "from": {"id": 42, "is_bot": false, "first_name": "Jane", "username": "jane_doe"},
                "chat": {"id": 42, "type": "private"}, "text": "/menu"}}"#,
        );

        let envelope = normalize(&update).expect("text is handled");
        assert_eq!(envelope.update_id, 101);
        assert_eq!(envelope.callback_query_id, None);
        assert_eq!(envelope.event.user_id, UserId(42));
        assert_eq!(envelope.event.kind, EventKind::Text);
        assert_eq!(envelope.event.payload, "/menu");
        assert_eq!(envelope.event.username.as_deref(), Some("jane_doe"));
        assert_eq!(envelope.event.correlation_id, "tg-101");
    }

    #[test]
    fn callback_query_becomes_button_event_with_ack_id() {
        let update = parse(
            r#"{"update_id": 102, "callback_query": {"id": "cb-7", "chat_instance": "x",
                "from": {"id": 42, "is_bot": false, "first_name": "Jane"},
                "message": {"message_id": 9, "chat": {"id": 42, "type": "private"}},
                "data": "v1"}}"#,
        );

        let envelope = normalize(&update).expect("button is handled");
        assert_eq!(envelope.callback_query_id.as_deref(), Some("cb-7"));
        assert_eq!(envelope.event.kind, EventKind::ButtonPress);
        assert_eq!(envelope.event.payload, "v1");
        assert_eq!(envelope.event.username, None);
    }

    #[test]
    fn group_bot_and_non_text_updates_are_skipped() {
        let group = parse(
            r#"{"update_id": 1, "message": {"message_id": 1,
                "from": {"id": 42, "is_bot": false}, "chat": {"id": -100, "type": "group"},
                "text": "/menu"}}"#,
        );
        let from_bot = parse(
            r#"{"update_id": 2, "message": {"message_id": 1,
                "from": {"id": 7, "is_bot": true}, "chat": {"id": 7, "type": "private"},
                "text": "hello"}}"#,
        );
        let sticker = parse(
            r#"{"update_id": 3, "message": {"message_id": 1,
                "from": {"id": 42, "is_bot": false}, "chat": {"id": 42, "type": "private"}}}"#,
        );
        let edited = parse(r#"{"update_id": 4, "edited_message": {"message_id": 1}}"#);

        for update in [group, from_bot, sticker, edited] {
            assert_eq!(normalize(&update), None, "update {} should be skipped", update.update_id);
        }
    }

    #[test]
    fn api_error_envelope_parses_without_result() {
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok": false, "error_code": 409, "description": "Conflict: terminated by other getUpdates request"}"#,
        )
        .expect("valid error json");
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(409));
    }
}
