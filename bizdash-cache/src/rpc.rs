//! The RPC collaborator and response interpretation.

use async_trait::async_trait;
use bizdash_core::{DashboardError, DashboardResult, ModuleKey, ModulePayload, TransportError};
use serde_json::Value;

/// Remote procedure call transport.
///
/// Implementations resolve with the raw response body. Application-level
/// failures embedded in a successful response are detected by the manager,
/// not by the transport.
#[async_trait]
pub trait RpcInvoker: Send + Sync {
    /// Invoke `method` with `args` and return the response body.
    async fn invoke(&self, method: &str, args: Value) -> Result<Value, TransportError>;
}

/// Turn a raw RPC response for `key` into a typed payload.
///
/// The body must be an object carrying the data under `message`. Error flags
/// make the response a logical failure: a non-empty `exc_type`, `exc`,
/// `exception` or `error`, `success: false`, or a `_server_messages` entry
/// marked as raised (`raise_exception`) or red (`indicator: "red"`). The same
/// flags inside the message itself count too. Informational server messages
/// are ignored.
pub fn interpret_response(key: ModuleKey, response: Value) -> DashboardResult<ModulePayload> {
    let Value::Object(mut body) = response else {
        return Err(DashboardError::FetchLogical {
            key,
            reason: "response is not an object".to_string(),
        });
    };

    if let Some(reason) = error_flag(&body) {
        return Err(DashboardError::FetchLogical { key, reason });
    }

    let message = body.remove("message").unwrap_or(Value::Null);
    match &message {
        Value::Null => {
            return Err(DashboardError::FetchLogical {
                key,
                reason: "response has no message".to_string(),
            })
        }
        Value::Object(inner) => {
            if let Some(reason) = error_flag(inner) {
                return Err(DashboardError::FetchLogical { key, reason });
            }
        }
        _ => {}
    }

    ModulePayload::decode(key, message)
}

fn error_flag(body: &serde_json::Map<String, Value>) -> Option<String> {
    let server_messages = server_messages(body);

    if let Some(exc_type) = flag_text(body.get("exc_type")) {
        return Some(match server_messages.first() {
            Some(message) => format!("{}: {}", exc_type, message.text),
            None => exc_type,
        });
    }
    for field in ["exc", "exception", "error"] {
        if let Some(reason) = flag_text(body.get(field)) {
            return Some(reason);
        }
    }
    if body.get("success") == Some(&Value::Bool(false)) {
        let reason = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("request was not successful");
        return Some(reason.to_string());
    }
    server_messages
        .into_iter()
        .find(|message| message.is_error)
        .map(|message| message.text)
}

/// Text of a set error field; `null`, `false` and `""` mean unset.
fn flag_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

struct ServerMessage {
    text: String,
    is_error: bool,
}

/// Entries of `_server_messages`.
///
/// The field is a JSON-encoded list whose entries are either plain text or
/// JSON-encoded objects with `message`, `indicator` and `raise_exception`.
fn server_messages(body: &serde_json::Map<String, Value>) -> Vec<ServerMessage> {
    let entries = match body.get("_server_messages") {
        Some(Value::String(raw)) => match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(entries) => entries,
            Err(_) => vec![Value::String(raw.clone())],
        },
        Some(Value::Array(entries)) => entries.clone(),
        _ => return Vec::new(),
    };
    entries.into_iter().map(ServerMessage::from_entry).collect()
}

impl ServerMessage {
    fn from_entry(entry: Value) -> Self {
        let entry = match entry {
            Value::String(raw) => serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)),
            other => other,
        };
        match entry {
            Value::Object(fields) => {
                let raised = flag_text(fields.get("raise_exception")).is_some_and(|v| v != "0");
                let red = fields.get("indicator").and_then(Value::as_str) == Some("red");
                let text = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| fields.get("title").and_then(Value::as_str))
                    .unwrap_or("server error")
                    .to_string();
                Self {
                    text,
                    is_error: raised || red,
                }
            }
            Value::String(text) => Self {
                text,
                is_error: false,
            },
            other => Self {
                text: other.to_string(),
                is_error: false,
            },
        }
    }
}
