//! Shared types for reactmail-core

use serde::{Deserialize, Serialize};

use crate::error::ForwardError;

const URL_VERIFICATION: &str = "url_verification";
const REACTION_ADDED: &str = "reaction_added";
const CHANNEL_CREATED: &str = "channel_created";
const CHANNEL_RENAME: &str = "channel_rename";

/// Raw webhook body as the workspace delivers it.
///
/// Every field is optional: which ones are required depends on how far the
/// pipeline gets before it short-circuits.
#[derive(Debug, Clone, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    api_app_id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    challenge: Option<String>,
    #[serde(default)]
    event: Option<EventPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EventPayload {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    reaction: Option<String>,
    #[serde(default)]
    item: Option<ReactionItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ReactionItem {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Inbound webhook event with its credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub token: Option<String>,
    pub app_id: Option<String>,
    pub kind: EventKind,
}

/// What happened in the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    UrlVerification { challenge: String },
    ReactionAdded(ReactionEvent),
    ChannelCreated,
    ChannelRename,
    /// Any event type we don't act on (kept for logging)
    Other(Option<String>),
}

/// A `reaction_added` event. Fields stay optional until the emoji is known
/// to be one we forward on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionEvent {
    pub emoji: Option<String>,
    /// False when the event carried no `item` object at all
    pub has_item: bool,
    pub channel: Option<String>,
    pub ts: Option<String>,
}

impl ReactionEvent {
    /// Channel and timestamp of the reacted-to message, if both are present
    /// and non-empty.
    pub fn target(&self) -> Option<(&str, &str)> {
        if !self.has_item {
            return None;
        }
        let channel = self.channel.as_deref().filter(|c| !c.is_empty())?;
        let ts = self.ts.as_deref().filter(|t| !t.is_empty())?;
        Some((channel, ts))
    }
}

impl WebhookEvent {
    /// Decode a webhook body. Anything that is not UTF-8 JSON of the expected
    /// shape is the caller's fault.
    pub fn parse(body: &[u8]) -> Result<Self, ForwardError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| ForwardError::BadRequest(format!("body is not UTF-8: {}", e)))?;
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| ForwardError::BadRequest(format!("bad json data: {}", e)))?;
        Ok(envelope.into())
    }
}

impl From<Envelope> for WebhookEvent {
    fn from(envelope: Envelope) -> Self {
        let kind = if envelope.kind.as_deref() == Some(URL_VERIFICATION) {
            EventKind::UrlVerification {
                challenge: envelope.challenge.unwrap_or_default(),
            }
        } else {
            let event = envelope.event.unwrap_or_default();
            match event.kind.as_deref() {
                Some(REACTION_ADDED) => EventKind::ReactionAdded(ReactionEvent {
                    emoji: event.reaction,
                    has_item: event.item.is_some(),
                    channel: event.item.as_ref().and_then(|i| i.channel.clone()),
                    ts: event.item.and_then(|i| i.ts),
                }),
                Some(CHANNEL_CREATED) => EventKind::ChannelCreated,
                Some(CHANNEL_RENAME) => EventKind::ChannelRename,
                other => EventKind::Other(other.map(str::to_string)),
            }
        };

        Self {
            token: envelope.token,
            app_id: envelope.api_app_id,
            kind,
        }
    }
}

/// Link preview the platform attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The chat message a reaction points at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<LinkPreview>,
}

/// One email ready for the mail dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailJob {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub recipient: String,
}

/// A channel as reported by the channel listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

/// Result of the mail send, reported back as a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionOutcome {
    Success,
    Failure,
}

impl ReactionOutcome {
    /// Map a mail command exit code onto an outcome. Only `0` is success.
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 { Self::Success } else { Self::Failure }
    }
}

impl std::fmt::Display for ReactionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}
