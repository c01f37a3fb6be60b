use alloc::string::{String, ToString};

use serde_json::{Map, Value};

use crate::error::{Error, ErrorKind, Result};

/// A structured message body.
pub type Object = Map<String, Value>;

/// An inbound message.
///
/// Payloads that parse as a structured object are [`Message::Structured`].
/// Everything else, including documents whose root is not an object, is
/// delivered as [`Message::Text`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A structured object.
    Structured(Object),
    /// A plain text payload.
    Text(String),
}

impl Message {
    /// Parses a raw payload.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Self {
        match parse_object(payload) {
            Ok(object) => Self::Structured(object),
            Err(e) => {
                log::debug!("Treating payload as text: {e}");
                Self::Text(String::from_utf8_lossy(payload).into_owned())
            }
        }
    }

    /// Returns the structured object, if any.
    #[must_use]
    pub const fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Structured(object) => Some(object),
            Self::Text(_) => None,
        }
    }

    /// Checks whether the message is structured.
    #[must_use]
    pub const fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }
}

/// Parses a raw payload as a structured object.
///
/// # Errors
///
/// Returns [`ErrorKind::MalformedMessage`] when the payload is not a valid
/// document or its root is not an object.
pub fn parse_object(payload: &[u8]) -> Result<Object> {
    match serde_json::from_slice(payload)? {
        Value::Object(object) => Ok(object),
        _ => Err(Error::new(
            ErrorKind::MalformedMessage,
            "the document root is not an object",
        )),
    }
}

/// Coerces a scalar value to text.
///
/// Strings are returned without quotes, other values in their serialized
/// form.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Coerces a scalar value to a number of milliseconds.
///
/// Accepts non-negative integers and numeric strings.
#[must_use]
pub fn value_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Coerces a scalar value to a boolean switch.
///
/// Recognizes booleans, `on`/`off`, `true`/`false` and `1`/`0`, ignoring
/// case.
#[must_use]
pub fn value_to_switch(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_u64().map(|n| n != 0),
        Value::String(text) => {
            let text = text.trim();
            if text.eq_ignore_ascii_case("on")
                || text.eq_ignore_ascii_case("true")
                || text == "1"
            {
                Some(true)
            } else if text.eq_ignore_ascii_case("off")
                || text.eq_ignore_ascii_case("false")
                || text == "0"
            {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}
