mod error;
mod events;
mod traits;

pub use error::{ConnectionError, Result};
pub use events::ConnectionEvent;
pub use traits::{BackplaneConnection, MessageHandler, STREAM_INDEX};
