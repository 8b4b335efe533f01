//! Interaction payload classification.
//!
//! Turns a verified JSON body into the canonical [`Interaction`] value the
//! router dispatches on. Exactly one `Interaction` is produced per verified
//! payload; downstream components never re-derive trust from the raw request.
//!
//! Discord's wire `type` values: 1=PING, 2=APPLICATION_COMMAND,
//! 3=MESSAGE_COMPONENT, 4=APPLICATION_COMMAND_AUTOCOMPLETE, 5=MODAL_SUBMIT.
//! Unknown integers classify as [`InteractionKind::Unknown`] so the front can
//! answer with a safe generic response instead of failing.

use std::fmt;
use std::time::Instant;

use serde_json::Value;

use super::error::ClassificationError;

/// The five interaction kinds Discord delivers over HTTP, plus a catch-all
/// for wire values this gateway does not know about yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// Endpoint-validation handshake (`type: 1`). Never routed.
    Ping,
    /// Slash command invocation (`type: 2`), routed by `data.name`.
    Command,
    /// Button or select-menu action (`type: 3`), routed by `data.custom_id`.
    Component,
    /// Autocomplete query (`type: 4`), routed by `data.name`.
    Autocomplete,
    /// Modal submission (`type: 5`), routed by `data.custom_id`.
    ModalSubmit,
    /// Any other wire value; answered with a generic fallback.
    Unknown(u64),
}

impl InteractionKind {
    /// Map a wire `type` integer to a kind. Total: unknown values are data,
    /// not errors.
    pub fn from_wire(raw: u64) -> Self {
        match raw {
            1 => InteractionKind::Ping,
            2 => InteractionKind::Command,
            3 => InteractionKind::Component,
            4 => InteractionKind::Autocomplete,
            5 => InteractionKind::ModalSubmit,
            other => InteractionKind::Unknown(other),
        }
    }

    /// Short label for logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            InteractionKind::Ping => "ping",
            InteractionKind::Command => "command",
            InteractionKind::Component => "component",
            InteractionKind::Autocomplete => "autocomplete",
            InteractionKind::ModalSubmit => "modal",
            InteractionKind::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionKind::Unknown(raw) => write!(f, "unknown({})", raw),
            other => f.write_str(other.label()),
        }
    }
}

/// The interaction follow-up token.
///
/// This is a capability credential: anyone holding it can post messages on the
/// interaction's behalf for ~15 minutes. It must never appear in logs, so the
/// `Debug` and `Display` impls redact it; the only way to read the value is
/// [`InteractionToken::expose`], called at the single point a follow-up URL is
/// built.
#[derive(Clone, PartialEq, Eq)]
pub struct InteractionToken(String);

impl InteractionToken {
    /// Wrap a raw token received from Discord.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read the raw token. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for InteractionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InteractionToken([redacted])")
    }
}

impl fmt::Display for InteractionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Canonical typed interaction, produced once per verified payload.
#[derive(Debug, Clone)]
pub struct Interaction {
    /// Discord-issued interaction id; unique per delivery, used as the
    /// idempotency key for follow-up tracking.
    pub id: String,
    /// Classified kind.
    pub kind: InteractionKind,
    /// Follow-up capability token (redacted in logs).
    pub token: InteractionToken,
    /// Monotonic receipt time; anchors the 3-second response budget.
    pub received_at: Instant,
    /// Command name or component/modal custom id used for routing. Empty for
    /// ping and unknown kinds, which are never routed.
    pub route_key: String,
    /// For autocomplete, the name of the currently focused option.
    pub focused_option: Option<String>,
    /// Kind-specific `data` payload, opaque to the router.
    pub data: Value,
}

/// Classify a verified JSON payload into an [`Interaction`].
///
/// `received_at` is the monotonic receipt timestamp captured by the endpoint
/// front before verification, so queueing delays count against the budget.
pub fn classify(
    payload: &Value,
    received_at: Instant,
) -> Result<Interaction, ClassificationError> {
    let raw_type = payload
        .get("type")
        .and_then(Value::as_u64)
        .ok_or(ClassificationError::MissingType)?;
    let kind = InteractionKind::from_wire(raw_type);

    let data = payload.get("data").cloned().unwrap_or(Value::Null);

    // The handshake carries no credentials and is never routed.
    if kind == InteractionKind::Ping {
        return Ok(Interaction {
            id: payload
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            kind,
            token: InteractionToken::new(""),
            received_at,
            route_key: String::new(),
            focused_option: None,
            data,
        });
    }

    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ClassificationError::MissingCredential("id"))?
        .to_string();
    let token = payload
        .get("token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ClassificationError::MissingCredential("token"))?
        .to_string();

    let route_key = match kind {
        InteractionKind::Command | InteractionKind::Autocomplete => data
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(ClassificationError::MissingRoutingKey("data.name"))?
            .to_string(),
        InteractionKind::Component | InteractionKind::ModalSubmit => data
            .get("custom_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(ClassificationError::MissingRoutingKey("data.custom_id"))?
            .to_string(),
        // Unknown kinds are answered with a generic fallback, not routed.
        InteractionKind::Unknown(_) => String::new(),
        InteractionKind::Ping => unreachable!("handled above"),
    };

    let focused_option = if kind == InteractionKind::Autocomplete {
        data.get("options")
            .and_then(Value::as_array)
            .and_then(|opts| {
                opts.iter().find(|opt| {
                    opt.get("focused").and_then(Value::as_bool).unwrap_or(false)
                })
            })
            .and_then(|opt| opt.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    } else {
        None
    };

    Ok(Interaction {
        id,
        kind,
        token: InteractionToken::new(token),
        received_at,
        route_key,
        focused_option,
        data,
    })
}
