use super::{DecodeError, EncodeError};

const ID_SEPARATOR: u8 = b' ';
const LENGTH_PREFIX_SIZE: usize = 4;

/// A scale-out message received on a Redis channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisMessage {
    /// Sequence id assigned by the publish script.
    pub id: u64,
    /// Opaque serialized message batch.
    pub payload: Vec<u8>,
}

impl RedisMessage {
    pub fn new(id: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Decodes a channel payload.
    ///
    /// Bytes after the declared payload are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use backplane_core::message::RedisMessage;
    ///
    /// let data = b"7 \x02\x00\x00\x00hi";
    /// let message = RedisMessage::from_bytes(data).unwrap();
    /// assert_eq!(message.id, 7);
    /// assert_eq!(message.payload, b"hi");
    /// ```
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        let separator = data
            .iter()
            .position(|b| *b == ID_SEPARATOR)
            .ok_or(DecodeError::UnexpectedEof("message id"))?;

        let id_digits = &data[..separator];
        let id = std::str::from_utf8(id_digits)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| DecodeError::InvalidId(String::from_utf8_lossy(id_digits).into_owned()))?;

        let rest = &data[separator + 1..];
        let prefix: [u8; LENGTH_PREFIX_SIZE] = rest
            .get(..LENGTH_PREFIX_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(DecodeError::UnexpectedEof("payload length"))?;

        let length = i32::from_le_bytes(prefix);
        if length < 0 {
            return Err(DecodeError::NegativeLength(length));
        }

        let body = &rest[LENGTH_PREFIX_SIZE..];
        let payload = body
            .get(..length as usize)
            .ok_or(DecodeError::UnexpectedEof("payload"))?;

        Ok(Self::new(id, payload))
    }

    /// Encodes `payload` as the publish script argument (`ARGV[1]`).
    ///
    /// The script prepends `"<id> "` when it publishes. Payloads longer than
    /// `i32::MAX` bytes cannot be framed.
    pub fn encode_argument(payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let prefix = length_prefix(payload.len())?;
        let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// Encodes the message exactly as it appears on the channel.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = self.id.to_string().into_bytes();
        buf.push(ID_SEPARATOR);
        buf.extend(Self::encode_argument(&self.payload)?);
        Ok(buf)
    }
}

fn length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], EncodeError> {
    i32::try_from(len)
        .map(i32::to_le_bytes)
        .map_err(|_| EncodeError::PayloadTooLarge(len))
}
