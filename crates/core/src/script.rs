//! Server-side scripts and their replies.

use crate::connection::{BackplaneConnection, ConnectionError, Result};
use crate::message::RedisMessage;

/// Assigns the next sequence id for `KEYS[1]` and publishes
/// `"<id> " .. ARGV[1]` on the channel of the same name.
///
/// Returns `{id, ARGV[1], published payload}`.
pub const PUBLISH_SCRIPT: &str = r#"local newId = redis.call('INCR', KEYS[1])
local payload = newId .. ' ' .. ARGV[1]
redis.call('PUBLISH', KEYS[1], payload)
return {newId, ARGV[1], payload}"#;

/// Reply of a script evaluation, detached from the client library's types.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptReply {
    Nil,
    Int(i64),
    Data(Vec<u8>),
    Status(String),
    Array(Vec<ScriptReply>),
}

impl ScriptReply {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Data(bytes) => std::str::from_utf8(bytes).ok()?.parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScriptReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "(nil)"),
            Self::Int(n) => write!(f, "(integer) {n}"),
            Self::Data(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes)),
            Self::Status(s) => write!(f, "{s}"),
            Self::Array(items) => {
                if items.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

/// Publishes `payload` on `key` through [`PUBLISH_SCRIPT`].
///
/// Returns the sequence id assigned to the message.
pub async fn publish<C>(connection: &C, database: u32, key: &str, payload: &[u8]) -> Result<u64>
where
    C: BackplaneConnection + ?Sized,
{
    let argument = RedisMessage::encode_argument(payload)
        .map_err(|e| ConnectionError::OperationFailed(e.to_string()))?;
    let reply = connection
        .script_evaluate(database, PUBLISH_SCRIPT, key, &argument)
        .await?;

    published_id(&reply)
}

fn published_id(reply: &ScriptReply) -> Result<u64> {
    let id = match reply {
        ScriptReply::Array(items) => items.first().and_then(ScriptReply::as_int),
        other => other.as_int(),
    };

    id.and_then(|n| u64::try_from(n).ok()).ok_or_else(|| {
        ConnectionError::ScriptFailed(format!("unexpected publish script reply: {reply:?}"))
    })
}
