use backplane_core::script::ScriptReply;

/// Converts a raw reply into the library-independent [`ScriptReply`].
pub(crate) fn to_script_reply(value: redis::Value) -> ScriptReply {
    match value {
        redis::Value::Nil => ScriptReply::Nil,
        redis::Value::Int(n) => ScriptReply::Int(n),
        redis::Value::BulkString(bytes) => ScriptReply::Data(bytes),
        redis::Value::SimpleString(s) => ScriptReply::Status(s),
        redis::Value::Okay => ScriptReply::Status("OK".to_string()),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            ScriptReply::Array(items.into_iter().map(to_script_reply).collect())
        }
        redis::Value::Boolean(b) => ScriptReply::Int(i64::from(b)),
        redis::Value::Double(d) => ScriptReply::Status(d.to_string()),
        other => ScriptReply::Status(format!("{other:?}")),
    }
}
