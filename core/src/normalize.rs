//! Best-effort normalization of raw language-model output.
//!
//! The model is asked for a JSON object with exactly `message` and `actions`,
//! but its output is untrusted: it may be fenced in markdown, be a bare array
//! or scalar, or not parse at all. `normalize_reply` absorbs every one of
//! those shapes into a `{message, actions}` pair. It never fails, and no
//! malformed output ever surfaces to the caller as an error.

use std::borrow::Cow;

use serde_json::Value;

/// Reply used when the model output does not parse as JSON at all.
pub const UNPARSEABLE_MESSAGE: &str = "I couldn't understand the AI output.";

/// Synthetic message when the model returns a bare actions array.
const BARE_ACTIONS_MESSAGE: &str = "I've prepared the actions you requested:";

/// Default when a parsed object carries no usable `message` field.
const DEFAULT_MESSAGE: &str = "Done.";

/// Model output reduced to the fixed reply shape. `actions` entries are raw
/// JSON values; the mapper decodes and canonicalizes them downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReply {
    pub message: String,
    pub actions: Vec<Value>,
}

impl NormalizedReply {
    fn message_only(message: impl Into<String>) -> NormalizedReply {
        NormalizedReply {
            message: message.into(),
            actions: Vec::new(),
        }
    }
}

/// Turn raw model output into a `{message, actions}` pair.
pub fn normalize_reply(raw: &str) -> NormalizedReply {
    let text = strip_code_fence(raw.trim());

    let parsed: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) => return NormalizedReply::message_only(UNPARSEABLE_MESSAGE),
    };

    match parsed {
        Value::Object(map) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_MESSAGE)
                .to_string();
            let actions = map
                .get("actions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            NormalizedReply { message, actions }
        }
        // Some models return just the actions list.
        Value::Array(actions) => NormalizedReply {
            message: BARE_ACTIONS_MESSAGE.to_string(),
            actions,
        },
        Value::String(message) => NormalizedReply::message_only(message),
        other => NormalizedReply::message_only(other.to_string()),
    }
}

/// Strip a surrounding markdown code fence: drop the first and last line when
/// the fenced text splits into at least three lines. Shorter fenced content
/// passes through unmodified so a lone ``` can't eat the whole reply.
fn strip_code_fence(text: &str) -> Cow<'_, str> {
    if !text.starts_with("```") {
        return Cow::Borrowed(text);
    }
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() > 2 {
        Cow::Owned(lines[1..lines.len() - 1].join("\n"))
    } else {
        Cow::Borrowed(text)
    }
}
