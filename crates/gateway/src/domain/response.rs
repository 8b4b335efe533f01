//! Interaction response envelopes.
//!
//! The initial HTTP response to an interaction is always a callback object
//! `{"type": <n>, "data": {...}}`. Which callback type is legal depends on the
//! interaction kind, and once a deferred callback is chosen the real payload
//! travels out-of-band as a follow-up instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::interaction::InteractionKind;

/// Interaction callback types per Discord's interaction-response schema.
pub mod callback {
    /// PONG: only valid answer to a handshake.
    pub const PONG: u8 = 1;
    /// CHANNEL_MESSAGE_WITH_SOURCE: immediate message response.
    pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
    /// DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: ack now, message later.
    pub const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;
    /// DEFERRED_UPDATE_MESSAGE: component ack, edit later.
    pub const DEFERRED_UPDATE_MESSAGE: u8 = 6;
    /// UPDATE_MESSAGE: immediate edit of the component's message.
    pub const UPDATE_MESSAGE: u8 = 7;
    /// APPLICATION_COMMAND_AUTOCOMPLETE_RESULT: choice list.
    pub const AUTOCOMPLETE_RESULT: u8 = 8;
}

/// Message flag marking a response visible only to the invoking user.
pub const EPHEMERAL: u64 = 1 << 6;

/// A message body, used both in initial responses and follow-ups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Plain-text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Message flags (`EPHEMERAL` is the only one this gateway sets itself).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    /// Embeds, components, attachments: passed through untouched.
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl MessagePayload {
    /// A plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            flags: None,
            rest: serde_json::Map::new(),
        }
    }

    /// A text message visible only to the invoking user.
    pub fn ephemeral_text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            flags: Some(EPHEMERAL),
            rest: serde_json::Map::new(),
        }
    }
}

/// A single autocomplete choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteChoice {
    /// Display name shown to the user.
    pub name: String,
    /// Value submitted if chosen.
    pub value: Value,
}

/// What a handler produces on success. The coordinator maps this to the
/// kind-appropriate callback type (or to a follow-up after deferral).
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// A new message (callback 4, or a webhook POST after deferral).
    Message(MessagePayload),
    /// An edit of the component's source message (callback 7, or a PATCH of
    /// `@original` after a deferred update).
    Update(MessagePayload),
    /// Autocomplete choices (callback 8; cannot be deferred on the wire).
    Choices(Vec<AutocompleteChoice>),
}

/// The wire-level initial response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionResponse {
    /// Callback type.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Callback data, absent for bare acks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl InteractionResponse {
    /// The fixed handshake reply, `{"type": 1}`.
    pub fn pong() -> Self {
        Self {
            kind: callback::PONG,
            data: None,
        }
    }

    /// Immediate message response.
    pub fn message(payload: &MessagePayload) -> Self {
        Self {
            kind: callback::CHANNEL_MESSAGE_WITH_SOURCE,
            data: serde_json::to_value(payload).ok(),
        }
    }

    /// Immediate ephemeral text, used for fallbacks and handler errors.
    pub fn ephemeral_text(content: impl Into<String>) -> Self {
        Self::message(&MessagePayload::ephemeral_text(content))
    }

    /// Immediate edit of the component's source message.
    pub fn update(payload: &MessagePayload) -> Self {
        Self {
            kind: callback::UPDATE_MESSAGE,
            data: serde_json::to_value(payload).ok(),
        }
    }

    /// Autocomplete choice list.
    pub fn choices(choices: &[AutocompleteChoice]) -> Self {
        Self {
            kind: callback::AUTOCOMPLETE_RESULT,
            data: serde_json::to_value(serde_json::json!({ "choices": choices })).ok(),
        }
    }

    /// The deferred acknowledgment appropriate for a kind, sent when the
    /// handler misses the response cutoff.
    ///
    /// Commands defer to a visible "thinking" message; components defer the
    /// message edit; modals defer to an ephemeral message. Autocomplete has no
    /// deferred form on the wire, so it degrades to an empty choice list.
    pub fn deferred_for(kind: InteractionKind) -> Self {
        match kind {
            InteractionKind::Component => Self {
                kind: callback::DEFERRED_UPDATE_MESSAGE,
                data: None,
            },
            InteractionKind::ModalSubmit => Self {
                kind: callback::DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
                data: Some(serde_json::json!({ "flags": EPHEMERAL })),
            },
            InteractionKind::Autocomplete => Self::choices(&[]),
            // Command is the common case; unknown/ping never reach deferral.
            _ => Self {
                kind: callback::DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
                data: None,
            },
        }
    }

    /// Map a completed handler output to its immediate callback.
    pub fn from_output(output: &HandlerOutput) -> Self {
        match output {
            HandlerOutput::Message(payload) => Self::message(payload),
            HandlerOutput::Update(payload) => Self::update(payload),
            HandlerOutput::Choices(choices) => Self::choices(choices),
        }
    }
}
