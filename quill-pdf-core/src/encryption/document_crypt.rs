//! Document-wide encryption and decryption.
//!
//! `Document::decrypt` verifies the password, derives the file key and
//! rewrites every eligible string and stream in place; `Document::encrypt`
//! builds a standard security handler dictionary and does the reverse.
//! The walk runs over the object table and uses the containers' string
//! caches rather than a full graph traversal. Exempt from rewriting: the
//! handler's own validation fields, cross-reference streams, and the XMP
//! metadata stream when `EncryptMetadata` is false.

use crate::document::Document;
use crate::encryption::aes::{generate_iv, Aes};
use crate::encryption::rc4::rc4;
use crate::encryption::{select_ciphers, CipherKind, CryptFilterMethod, CryptFilterSpec, EncryptionDictionary, Permissions};
use crate::error::{PdfError, Result};
use crate::objects::{Handle, Object, ObjectId, TypeTag};
use rand::RngCore;
use std::collections::{HashMap, HashSet};

/// Cipher used when writing a new encryption dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    Rc4,
    Aes,
}

/// Options for [`Document::encrypt`].
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    pub user_password: Vec<u8>,
    pub owner_password: Vec<u8>,
    pub cipher: EncryptionAlgorithm,
    /// Key size in bits: 40..=128 in steps of 8 for RC4, 128 or 256 for AES.
    pub key_size: u32,
    /// Use the revision 6 hardened password hash (AES-256 only).
    pub hardened: bool,
    pub encrypt_metadata: bool,
    pub permissions: Permissions,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            user_password: Vec::new(),
            owner_password: Vec::new(),
            cipher: EncryptionAlgorithm::Rc4,
            key_size: 128,
            hardened: false,
            encrypt_metadata: true,
            permissions: Permissions::all_permissions(),
        }
    }
}

/// Live encryption context of a document.
pub struct EncryptionState {
    pub dict: EncryptionDictionary,
    /// The document-wide encryption key.
    pub key: Vec<u8>,
    pub str_cipher: CipherKind,
    pub stm_cipher: CipherKind,
    /// Whether an object's in-memory bytes are currently plaintext.
    decrypted: HashMap<Handle, bool>,
}

impl EncryptionState {
    fn new(
        dict: EncryptionDictionary,
        key: Vec<u8>,
        ciphers: (CipherKind, CipherKind),
    ) -> Self {
        Self {
            dict,
            key,
            str_cipher: ciphers.0,
            stm_cipher: ciphers.1,
            decrypted: HashMap::new(),
        }
    }

    /// Per-object key: MD5 over the file key, the low three bytes of the
    /// object number and the low two of the generation, plus the `sAlT`
    /// suffix for AES. Revision 5+ uses the file key unchanged.
    pub fn object_key(&self, id: ObjectId, cipher: CipherKind) -> Vec<u8> {
        if self.dict.r >= 5 {
            return self.key.clone();
        }
        let mut input = self.key.clone();
        input.extend_from_slice(&id.number().to_le_bytes()[..3]);
        input.extend_from_slice(&id.generation().to_le_bytes()[..2]);
        if cipher == CipherKind::Aes {
            input.extend_from_slice(b"sAlT");
        }
        let len = (self.key.len() + 5).min(16);
        md5::compute(&input).0[..len].to_vec()
    }

    fn decrypt_bytes(&self, cipher: CipherKind, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match cipher {
            CipherKind::Identity => Ok(data.to_vec()),
            CipherKind::Rc4 => Ok(rc4(key, data)),
            CipherKind::Aes => Aes::new(key)?.decrypt_cbc(data),
        }
    }

    fn encrypt_bytes(&self, cipher: CipherKind, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match cipher {
            CipherKind::Identity => Ok(data.to_vec()),
            CipherKind::Rc4 => Ok(rc4(key, data)),
            CipherKind::Aes => Ok(Aes::new(key)?.encrypt_cbc(data, &generate_iv())),
        }
    }

    pub fn is_decrypted(&self, handle: Handle) -> Option<bool> {
        self.decrypted.get(&handle).copied()
    }
}

/// One rewritable payload found during the walk.
struct CryptTarget {
    handle: Handle,
    /// Identity of the indirect object the payload belongs to.
    owner: ObjectId,
    is_stream: bool,
}

impl Document {
    /// Decrypt the document in place with `password` (user or owner).
    ///
    /// Fails with [`PdfError::EncryptionInvalidPassword`] when the password
    /// matches neither check, and with
    /// [`PdfError::EncryptionNotSupported`] for unknown handlers, versions
    /// or crypt filter methods, so callers can decide whether re-prompting
    /// makes sense.
    pub fn decrypt(&mut self, password: &[u8]) -> Result<()> {
        let encrypt_handle = self
            .encrypt_dict
            .ok_or_else(|| PdfError::Encryption("PDF is not encrypted".to_string()))?;
        let dict = EncryptionDictionary::from_dictionary(&self.arena, encrypt_handle)?;

        if dict.filter != "Standard" {
            return Err(PdfError::EncryptionNotSupported(format!(
                "unknown security handler: {}",
                dict.filter
            )));
        }
        let ciphers = select_ciphers(&dict)?;

        let file_id = self.file_id.clone();
        if file_id.is_none() && dict.v != 5 {
            return Err(PdfError::Encryption(
                "document ID was not found or is invalid".to_string(),
            ));
        }
        let file_id = file_id.as_deref();

        let key = if dict.is_user_password(password, file_id)? {
            dict.compute_user_encryption_key(password, file_id)?
        } else if dict.is_owner_password(password, file_id)? {
            if dict.r < 5 {
                let user_password = dict.retrieve_user_password(password)?;
                dict.compute_user_encryption_key(&user_password, file_id)?
            } else {
                dict.compute_owner_encryption_key(password)?
            }
        } else {
            return Err(PdfError::EncryptionInvalidPassword);
        };

        self.crypt = Some(EncryptionState::new(dict, key, ciphers));
        self.apply_crypt(true)
    }

    /// Encrypt the document in place, writing a standard security handler
    /// dictionary. The document must not already be encrypted.
    pub fn encrypt(&mut self, options: &EncryptOptions) -> Result<()> {
        if self.is_encrypted() {
            return Err(PdfError::Encryption("PDF is already encrypted".to_string()));
        }

        let (version, revision) = match options.cipher {
            EncryptionAlgorithm::Rc4 => {
                if !(40..=128).contains(&options.key_size) || options.key_size % 8 != 0 {
                    return Err(PdfError::Encryption("invalid RC4 key length".to_string()));
                }
                if options.key_size > 40 {
                    (2, 3)
                } else {
                    (1, 2)
                }
            }
            EncryptionAlgorithm::Aes => match options.key_size {
                128 => (4, 4),
                256 => (5, if options.hardened { 6 } else { 5 }),
                _ => {
                    return Err(PdfError::Encryption(
                        "invalid AES key length (only 128 and 256 bit keys are supported)"
                            .to_string(),
                    ))
                }
            },
        };

        let file_id = match &self.file_id {
            Some(id) => id.clone(),
            None => {
                let mut id = vec![0u8; 16];
                rand::thread_rng().fill_bytes(&mut id);
                self.file_id = Some(id.clone());
                id
            }
        };

        let mut dict = EncryptionDictionary::new(version, revision, options.key_size as i64);
        dict.p = options.permissions.to_p_value() as i32 as i64;
        dict.encrypt_metadata = options.encrypt_metadata;

        if revision >= 4 {
            let method = if revision == 4 {
                CryptFilterMethod::AESV2
            } else {
                CryptFilterMethod::AESV3
            };
            dict.crypt_filters.insert(
                "StdCF".to_string(),
                CryptFilterSpec {
                    method,
                    length: Some((options.key_size >> 3) as i64),
                },
            );
            dict.stm_f = Some("StdCF".to_string());
            dict.str_f = Some("StdCF".to_string());
        }

        let file_key =
            dict.set_passwords(&options.owner_password, &options.user_password, Some(&file_id))?;
        let key = match file_key {
            Some(key) => key,
            None => dict.compute_user_encryption_key(&options.user_password, Some(&file_id))?,
        };

        let ciphers = match options.cipher {
            EncryptionAlgorithm::Rc4 => (CipherKind::Rc4, CipherKind::Rc4),
            EncryptionAlgorithm::Aes => (CipherKind::Aes, CipherKind::Aes),
        };

        let dict_handle = dict.to_dictionary(&mut self.arena)?;
        self.add_object(dict_handle)?;
        self.encrypt_dict = Some(dict_handle);

        self.crypt = Some(EncryptionState::new(dict, key, ciphers));
        self.apply_crypt(false)
    }

    /// Whether an object's bytes are currently plaintext. `None` when the
    /// object was never touched by the encryption machinery.
    pub fn is_decrypted(&self, handle: Handle) -> Option<bool> {
        self.crypt.as_ref().and_then(|state| state.is_decrypted(handle))
    }

    /// Values of the handler's own fields that must never be rewritten.
    fn crypt_exempt_strings(&self) -> HashSet<Handle> {
        let mut exempt = HashSet::new();
        if let Some(encrypt) = self.encrypt_dict {
            for key in ["U", "O", "UE", "OE", "Perms"] {
                if let Some(value) = self.arena.dict_get(encrypt, key) {
                    exempt.insert(value);
                }
            }
        }
        exempt
    }

    /// The catalog's metadata stream, when there is one.
    fn metadata_stream(&self) -> Option<Handle> {
        let catalog = self.root_objects().find(|&handle| {
            self.arena
                .get(handle)
                .as_dict()
                .and_then(|d| d.type_tag())
                == Some(TypeTag::Catalog)
        })?;
        let metadata = self.arena.dict_get(catalog, "Metadata")?;
        match self.arena.get(metadata) {
            Object::Reference(id) => self.get_object(*id),
            Object::Stream(_) => Some(metadata),
            _ => None,
        }
    }

    fn collect_crypt_targets(&self) -> Result<Vec<CryptTarget>> {
        let state = self
            .crypt
            .as_ref()
            .ok_or_else(|| PdfError::Encryption("document has no encryption state".to_string()))?;

        let exempt_strings = self.crypt_exempt_strings();
        let exempt_metadata = if state.dict.encrypt_metadata {
            None
        } else {
            self.metadata_stream()
        };

        let mut targets = Vec::new();
        for (id, root) in self.objects() {
            if Some(root) == self.encrypt_dict {
                continue;
            }
            match self.arena.get(root) {
                Object::String(_) => targets.push(CryptTarget {
                    handle: root,
                    owner: id,
                    is_stream: false,
                }),
                Object::Stream(stream) => {
                    let tag = stream.dict.type_tag();
                    if tag == Some(TypeTag::XRefStream) {
                        continue;
                    }
                    if Some(root) == exempt_metadata {
                        continue;
                    }
                    targets.push(CryptTarget {
                        handle: root,
                        owner: id,
                        is_stream: true,
                    });
                    for &string in stream.dict.strings_cache() {
                        if !exempt_strings.contains(&string) {
                            targets.push(CryptTarget {
                                handle: string,
                                owner: id,
                                is_stream: false,
                            });
                        }
                    }
                }
                Object::Dictionary(dict) => {
                    for &string in dict.strings_cache() {
                        if !exempt_strings.contains(&string) {
                            targets.push(CryptTarget {
                                handle: string,
                                owner: id,
                                is_stream: false,
                            });
                        }
                    }
                }
                Object::Array(array) => {
                    for &string in array.strings_cache() {
                        if !exempt_strings.contains(&string) {
                            targets.push(CryptTarget {
                                handle: string,
                                owner: id,
                                is_stream: false,
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(targets)
    }

    /// Walk every indirect object and rewrite eligible payloads.
    fn apply_crypt(&mut self, decrypt: bool) -> Result<()> {
        let targets = self.collect_crypt_targets()?;

        for target in targets {
            // Streams encrypt their raw (filtered) form.
            if target.is_stream && !decrypt {
                self.arena.stream_raw_data(target.handle)?;
            }

            let state = self
                .crypt
                .as_ref()
                .ok_or_else(|| PdfError::Encryption("document has no encryption state".to_string()))?;
            let cipher = if target.is_stream {
                state.stm_cipher
            } else {
                state.str_cipher
            };
            let key = state.object_key(target.owner, cipher);

            let payload: Vec<u8> = match self.arena.get(target.handle) {
                Object::String(string) => string.as_bytes().to_vec(),
                Object::Stream(stream) => stream.raw.clone().unwrap_or_default(),
                _ => continue,
            };
            if payload.is_empty() {
                continue;
            }

            let rewritten = if decrypt {
                state.decrypt_bytes(cipher, &key, &payload)?
            } else {
                state.encrypt_bytes(cipher, &key, &payload)?
            };

            let new_length = rewritten.len() as i64;
            match self.arena.get_mut(target.handle) {
                Object::String(string) => string.data = rewritten,
                Object::Stream(stream) => {
                    stream.raw = Some(rewritten);
                    // The decoded cache no longer matches the raw bytes.
                    stream.decoded = None;
                    stream.packed = None;
                }
                _ => {}
            }
            if target.is_stream {
                // AES framing grows the body; keep /Length honest.
                self.arena
                    .dict_set_value(target.handle, "Length", new_length)?;
            }

            if let Some(state) = self.crypt.as_mut() {
                state.decrypted.insert(target.handle, decrypt);
            }
        }
        Ok(())
    }
}
