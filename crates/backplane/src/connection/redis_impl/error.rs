//! Redis error mapping to ConnectionError.

use backplane_core::connection::ConnectionError;

/// Returns true when the error means the link itself is unusable.
pub(crate) fn is_link_error(err: &redis::RedisError) -> bool {
    err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_io_error()
}

/// Returns the server error message when the error is a server reply.
pub(crate) fn server_message(err: &redis::RedisError) -> Option<String> {
    if is_link_error(err) {
        return None;
    }
    err.code().map(|_| err.to_string())
}

/// Maps Redis errors to ConnectionError.
pub(crate) fn map_redis_error(err: redis::RedisError) -> ConnectionError {
    if is_link_error(&err) {
        ConnectionError::ConnectionFailed(err.to_string())
    } else {
        ConnectionError::OperationFailed(err.to_string())
    }
}

/// Maps script evaluation errors, keeping link failures distinguishable.
pub(crate) fn map_script_error(err: redis::RedisError) -> ConnectionError {
    if is_link_error(&err) {
        ConnectionError::ConnectionFailed(err.to_string())
    } else {
        ConnectionError::ScriptFailed(err.to_string())
    }
}

/// Maps subscribe errors.
pub(crate) fn map_subscribe_error(err: redis::RedisError) -> ConnectionError {
    if is_link_error(&err) {
        ConnectionError::ConnectionFailed(err.to_string())
    } else {
        ConnectionError::SubscribeFailed(err.to_string())
    }
}
