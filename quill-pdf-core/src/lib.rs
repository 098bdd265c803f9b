//! # quill-pdf
//!
//! A pure Rust PDF document object model and codec layer: the low-level
//! object syntax parsed into a typed, arena-backed graph with lazy
//! reference resolution, stream filter codecs, and the standard security
//! handler for encryption revisions 2 through 6.
//!
//! ## What this crate covers
//!
//! - **Object model**: every PDF value kind as one enum, stored in an
//!   arena with non-owning parent handles, object numbering, deep copy
//!   and reference-inlining export.
//! - **Containers**: dictionaries and arrays with derived string/name/xref
//!   caches, fingerprint-based type guessing and a declarative field
//!   schema.
//! - **Streams**: raw/decoded duality with a filter pipeline (Flate, LZW,
//!   ASCIIHex, ASCII85, RunLength, PNG/TIFF predictors), and object
//!   streams with lazy unpacking and compaction.
//! - **Encryption**: RC4 and byte-exact AES-128/192/256-CBC, password
//!   verification and key derivation for the standard security handler,
//!   and whole-document encrypt/decrypt.
//!
//! File-level structure — cross-reference tables, trailers, incremental
//! updates — belongs to a surrounding loader and is out of scope.
//!
//! ## Quick start
//!
//! ```rust
//! use quill_pdf::{Document, ObjectId};
//!
//! # fn main() -> quill_pdf::Result<()> {
//! let mut doc = Document::new();
//! doc.load_objects(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj")?;
//!
//! let catalog = doc.get_object(ObjectId::new(1, 0)).unwrap();
//! let pages = doc.arena().dict_get(catalog, "Pages").unwrap();
//! assert_eq!(
//!     doc.arena().get(pages).as_reference(),
//!     Some(ObjectId::new(2, 0))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Encrypting and decrypting a document:
//!
//! ```rust
//! use quill_pdf::encryption::{EncryptOptions, EncryptionAlgorithm};
//! use quill_pdf::{Document, Object};
//!
//! # fn main() -> quill_pdf::Result<()> {
//! let mut doc = Document::new();
//! doc.insert(Object::from("confidential"));
//!
//! doc.encrypt(&EncryptOptions {
//!     user_password: b"secret".to_vec(),
//!     cipher: EncryptionAlgorithm::Aes,
//!     key_size: 256,
//!     ..EncryptOptions::default()
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod encryption;
pub mod error;
pub mod objects;
pub mod parser;
pub mod writer;

pub use document::{Document, DocumentOptions};
pub use error::{PdfError, Result};
pub use objects::{
    Arena, Array, BodyState, Dictionary, Handle, Name, Object, ObjectId, ObjectMeta, PdfString,
    PdfType, Stream, StringFormat, TypeTag,
};
pub use parser::{ObjectParser, ParseError, ParseOptions};

/// Current version of quill-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_create_empty_document() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert!(!doc.is_encrypted());
    }
}
