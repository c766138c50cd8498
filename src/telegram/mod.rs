use serde::Deserialize;
use serde_json::Value;

/// Subset of Telegram's update envelope that the pipeline cares about.
///
/// Every field is optional so that an unexpected update shape degrades to a
/// soft "invalid format" reply instead of a deserialization error reaching
/// the transport layer.
#[derive(Debug, Default, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<MessagePayload>,
    #[serde(default)]
    pub edited_message: Option<MessagePayload>,
    #[serde(default)]
    pub channel_post: Option<MessagePayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<Sender>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sender {
    #[serde(default)]
    pub id: Option<i64>,
}

/// A normalized inbound chat message.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    pub sender_id: Option<i64>,
    /// Absent for media-only messages.
    pub text: Option<String>,
}

/// Extract the first message-like object carrying a chat id.
///
/// Telegram delivers exactly one of `message`, `edited_message`, or
/// `channel_post` per update; edited messages are treated like fresh ones.
pub fn extract_incoming(update: Value) -> Option<Incoming> {
    let update: Update = serde_json::from_value(update).ok()?;

    [update.message, update.edited_message, update.channel_post]
        .into_iter()
        .flatten()
        .find_map(|payload| {
            let chat_id = payload.chat.as_ref()?.id?;
            Some(Incoming {
                chat_id,
                sender_id: payload.from.as_ref().and_then(|s| s.id),
                text: payload.text,
            })
        })
}
