//! PDF encryption: the standard security handler (revisions 2 through 6),
//! RC4 and AES-CBC ciphers, and the per-object encrypt/decrypt lifecycle.
//!
//! Key derivation follows ISO 32000-1 section 7.6 and, for the revision 6
//! hardened hash, ISO 32000-2 Algorithm 2.B.

mod aes;
mod crypt_filters;
mod document_crypt;
mod encryption_dict;
mod permissions;
mod rc4;
mod standard_security;

pub use aes::{generate_iv, Aes, BLOCK_SIZE};
pub use crypt_filters::{select_ciphers, CipherKind, CryptFilterMethod, CryptFilterSpec};
pub use document_crypt::{EncryptOptions, EncryptionAlgorithm, EncryptionState};
pub use encryption_dict::EncryptionDictionary;
pub use permissions::Permissions;
pub use rc4::{rc4, Rc4};
pub use standard_security::{compute_hardened_hash, pad_password, PADDING};
