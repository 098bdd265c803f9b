use crate::objects::Handle;
use thiserror::Error;

/// Errors raised by the object graph, the stream codecs and the encryption
/// subsystem.
///
/// Grammar-level failures live in [`crate::parser::ParseError`] and are
/// wrapped into [`PdfError::Parse`] when they cross the parser boundary.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("parse error: {0}")]
    Parse(#[from] crate::parser::ParseError),

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("operation requires an indirect object: {0}")]
    DirectObject(String),

    #[error("invalid object reference: {0}")]
    InvalidReference(String),

    #[error("incompatible cast from {from} to {to}")]
    TypeMismatch { from: String, to: String },

    #[error("invalid stream object: {0}")]
    InvalidStreamObject(String),

    #[error("unknown stream filter: /{0}")]
    UnknownFilter(String),

    /// A filter rejected malformed data. Whatever output was produced before
    /// the failure is preserved so callers can keep it for forensic recovery.
    #[error("invalid filter data: {message}")]
    InvalidFilterData {
        message: String,
        partial: Vec<u8>,
    },

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("encryption scheme not supported: {0}")]
    EncryptionNotSupported(String),

    #[error("invalid password")]
    EncryptionInvalidPassword,

    #[error("missing required key: /{0}")]
    MissingKey(String),

    #[error("stale object handle: {0:?}")]
    StaleHandle(Handle),
}

pub type Result<T> = std::result::Result<T, PdfError>;
