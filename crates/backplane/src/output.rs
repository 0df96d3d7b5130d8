//! Output formatting for CLI commands.

use backplane_core::connection::ConnectionEvent;
use backplane_core::message::RedisMessage;
use backplane_core::script::ScriptReply;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Formats a received message.
pub fn format_message(message: &RedisMessage, format: OutputFormat) -> String {
    let payload = String::from_utf8_lossy(&message.payload);
    match format {
        OutputFormat::Json => json!({ "id": message.id, "payload": payload }).to_string(),
        OutputFormat::Pretty => format!("[{}] {}", message.id, payload),
    }
}

/// Formats a connection event.
pub fn format_event(event: &ConnectionEvent, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "event": event.kind(),
            "error": event.error().to_string(),
        })
        .to_string(),
        OutputFormat::Pretty => format!("event: {} ({})", event.kind(), event.error()),
    }
}

/// Formats the result of a publish.
pub fn format_published(id: u64, key: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({ "id": id, "key": key }).to_string(),
        OutputFormat::Pretty => format!("Published message {} on {}", id, key),
    }
}

/// Formats a script reply.
pub fn format_reply(reply: &ScriptReply, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => reply_to_json(reply).to_string(),
        OutputFormat::Pretty => reply.to_string(),
    }
}

fn reply_to_json(reply: &ScriptReply) -> Value {
    match reply {
        ScriptReply::Nil => Value::Null,
        ScriptReply::Int(n) => json!(n),
        ScriptReply::Data(bytes) => json!(String::from_utf8_lossy(bytes)),
        ScriptReply::Status(s) => json!(s),
        ScriptReply::Array(items) => Value::Array(items.iter().map(reply_to_json).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backplane_core::connection::ConnectionError;

    #[test]
    fn test_format_message() {
        let message = RedisMessage::new(4, b"hello".to_vec());
        assert_eq!(format_message(&message, OutputFormat::Pretty), "[4] hello");
        assert_eq!(
            format_message(&message, OutputFormat::Json),
            r#"{"id":4,"payload":"hello"}"#
        );
    }

    #[test]
    fn test_format_event() {
        let event = ConnectionEvent::ConnectionFailed(ConnectionError::Closed);
        assert_eq!(
            format_event(&event, OutputFormat::Pretty),
            "event: connection_failed (The redis connection was closed)"
        );
        assert_eq!(
            format_event(&event, OutputFormat::Json),
            r#"{"error":"The redis connection was closed","event":"connection_failed"}"#
        );
    }

    #[test]
    fn test_format_reply_json() {
        let reply = ScriptReply::Array(vec![
            ScriptReply::Int(1),
            ScriptReply::Data(b"a".to_vec()),
            ScriptReply::Nil,
        ]);
        assert_eq!(format_reply(&reply, OutputFormat::Json), r#"[1,"a",null]"#);
    }

    #[test]
    fn test_format_published() {
        assert_eq!(
            format_published(9, "SignalR", OutputFormat::Pretty),
            "Published message 9 on SignalR"
        );
    }
}
