#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error("not connected: no write characteristic bound")]
    NotConnected,
    #[error("busy: a transfer is already in flight")]
    Busy,
    #[error("characteristic {uuid} unsupported: {reason}")]
    UnsupportedCharacteristic {
        uuid: uuid::Uuid,
        reason: &'static str,
    },
    #[error("notification is not valid UTF-8 ({} bytes): {source}", .bytes.len())]
    Decode {
        bytes: Vec<u8>,
        source: std::str::Utf8Error,
    },
    #[error("write acknowledged with no transfer in flight")]
    UnexpectedAcknowledgement,
    #[error("transport refused write: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}
