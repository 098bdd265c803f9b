//! PDF object grammar parser.
//!
//! Parses the object syntax (ISO 32000-1 Section 7.3) out of an in-memory
//! buffer into an [`Arena`](crate::objects::Arena). Document-level structure
//! (cross-reference tables, trailers, incremental updates) belongs to the
//! surrounding loader, not this module.

pub mod filters;
pub mod lexer;
pub mod objects;

pub use lexer::Lexer;
pub use objects::{ObjectParser, ParseOptions};

use crate::objects::Handle;

/// Result type for grammar-level parsing.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Grammar failures, one variant per object type so callers can tell what
/// the parser was in the middle of.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("no grammar rule matches input at offset {0}")]
    UnknownObjectType(usize),

    #[error("invalid boolean at offset {0}")]
    InvalidBoolean(usize),

    #[error("invalid null at offset {0}")]
    InvalidNull(usize),

    #[error("invalid number at offset {0}")]
    InvalidNumber(usize),

    #[error("invalid name at offset {0}")]
    InvalidName(usize),

    #[error("invalid string at offset {0}: {1}")]
    InvalidString(usize, String),

    #[error("invalid dictionary at offset {position}: {message}")]
    InvalidDictionary { position: usize, message: String },

    #[error("invalid reference at offset {0}")]
    InvalidReference(usize),

    #[error("invalid stream object at offset {position}: {message}")]
    InvalidStream { position: usize, message: String },

    #[error("object shall begin with 'N G obj' at offset {0}")]
    InvalidObjectHeader(usize),

    /// The body parsed but the `endobj` terminator is missing. The
    /// partially-built object stays in the arena so best-effort recovery
    /// can still use it.
    #[error("object {number} {generation} is missing its 'endobj' terminator")]
    UnterminatedObject {
        number: u32,
        generation: u16,
        handle: Handle,
    },

    #[error("unexpected end of input")]
    UnexpectedEof,
}
