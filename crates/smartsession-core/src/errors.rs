use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Configuration invalid: {reason}")]
    ConfigurationInvalid { reason: String },

    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },

    #[error("Camera unavailable: {reason}")]
    CameraUnavailable { reason: String },

    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Outbound queue full, message dropped")]
    OutboundFull,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unexpected binary message ({len} bytes)")]
    UnexpectedBinary { len: usize },
}
