//! Typed view and builder of the `/Encrypt` dictionary.

use crate::encryption::{CryptFilterMethod, CryptFilterSpec};
use crate::error::{PdfError, Result};
use crate::objects::{
    Arena, Dictionary, Handle, Name, Object, PdfString, TypeTag,
};
use std::collections::BTreeMap;

/// Standard security handler parameters, bridged from and to the generic
/// dictionary representation.
#[derive(Debug, Clone, PartialEq)]
pub struct EncryptionDictionary {
    /// Security handler name; only `Standard` is supported.
    pub filter: String,
    pub sub_filter: Option<String>,
    /// Algorithm version.
    pub v: i64,
    /// Security handler revision.
    pub r: i64,
    /// Key length in bits.
    pub length: i64,
    /// Owner password validation data.
    pub o: Vec<u8>,
    /// User password validation data.
    pub u: Vec<u8>,
    /// Owner-wrapped file key (revision 5+).
    pub oe: Option<Vec<u8>>,
    /// User-wrapped file key (revision 5+).
    pub ue: Option<Vec<u8>>,
    /// Wrapped permissions block (revision 5+).
    pub perms: Option<Vec<u8>>,
    /// Permission bits, as stored (signed).
    pub p: i64,
    pub encrypt_metadata: bool,
    pub crypt_filters: BTreeMap<String, CryptFilterSpec>,
    /// Default crypt filter for streams.
    pub stm_f: Option<String>,
    /// Default crypt filter for strings.
    pub str_f: Option<String>,
}

impl EncryptionDictionary {
    /// An empty standard handler dictionary for the given revision.
    pub fn new(v: i64, r: i64, length: i64) -> Self {
        Self {
            filter: "Standard".to_string(),
            sub_filter: None,
            v,
            r,
            length,
            o: Vec::new(),
            u: Vec::new(),
            oe: None,
            ue: None,
            perms: None,
            p: -1,
            encrypt_metadata: true,
            crypt_filters: BTreeMap::new(),
            stm_f: None,
            str_f: None,
        }
    }

    /// Key length in bytes.
    pub fn key_length(&self) -> usize {
        (self.length / 8).max(0) as usize
    }

    /// Read the handler parameters out of a parsed dictionary.
    pub fn from_dictionary(arena: &Arena, handle: Handle) -> Result<Self> {
        let dict = arena
            .try_get(handle)?
            .as_dict()
            .ok_or_else(|| {
                PdfError::InvalidObject("encryption dictionary is not a dictionary".to_string())
            })?
            .clone();

        let name_at = |key: &str| -> Option<String> {
            dict.get(key)
                .and_then(|h| arena.get(h).as_name())
                .map(|n| n.as_str().to_string())
        };
        let int_at = |key: &str| -> Option<i64> {
            dict.get(key).and_then(|h| arena.get(h).as_integer())
        };
        let string_at = |key: &str| -> Option<Vec<u8>> {
            dict.get(key)
                .and_then(|h| arena.get(h).as_string())
                .map(|s| s.as_bytes().to_vec())
        };
        let required_string = |key: &str| -> Result<Vec<u8>> {
            string_at(key).ok_or_else(|| PdfError::MissingKey(key.to_string()))
        };

        let filter = name_at("Filter").ok_or_else(|| PdfError::MissingKey("Filter".to_string()))?;
        let r = int_at("R").ok_or_else(|| PdfError::MissingKey("R".to_string()))?;
        let p = int_at("P").ok_or_else(|| PdfError::MissingKey("P".to_string()))?;

        let mut crypt_filters = BTreeMap::new();
        if let Some(cf_handle) = dict.get("CF") {
            if let Some(cf_dict) = arena.get(cf_handle).as_dict() {
                for (name, value) in cf_dict.iter() {
                    let Some(filter_dict) = arena.get(value).as_dict() else {
                        continue;
                    };
                    let method = filter_dict
                        .get("CFM")
                        .and_then(|h| arena.get(h).as_name())
                        .and_then(|n| CryptFilterMethod::from_name(n.as_str()))
                        .unwrap_or(CryptFilterMethod::None);
                    let length = filter_dict
                        .get("Length")
                        .and_then(|h| arena.get(h).as_integer());
                    crypt_filters
                        .insert(name.as_str().to_string(), CryptFilterSpec { method, length });
                }
            }
        }

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(|h| arena.get(h).as_bool())
            .unwrap_or(true);

        Ok(Self {
            filter,
            sub_filter: name_at("SubFilter"),
            v: int_at("V").unwrap_or(0),
            r,
            length: int_at("Length").unwrap_or(40),
            o: required_string("O")?,
            u: required_string("U")?,
            oe: string_at("OE"),
            ue: string_at("UE"),
            perms: string_at("Perms"),
            p,
            encrypt_metadata,
            crypt_filters,
            stm_f: name_at("StmF"),
            str_f: name_at("StrF"),
        })
    }

    /// Materialize the handler parameters as a dictionary in the arena.
    pub fn to_dictionary(&self, arena: &mut Arena) -> Result<Handle> {
        let handle = arena.alloc(Object::Dictionary(Dictionary::new()));
        arena.cast_to(handle, TypeTag::Encryption)?;

        arena.dict_set_value(handle, "Filter", Object::Name(Name::new(&*self.filter)))?;
        if let Some(sub_filter) = &self.sub_filter {
            arena.dict_set_value(handle, "SubFilter", Object::Name(Name::new(&**sub_filter)))?;
        }
        arena.dict_set_value(handle, "V", self.v)?;
        arena.dict_set_value(handle, "R", self.r)?;
        arena.dict_set_value(handle, "Length", self.length)?;
        arena.dict_set_value(handle, "P", self.p)?;
        arena.dict_set_value(handle, "O", PdfString::literal(self.o.clone()))?;
        arena.dict_set_value(handle, "U", PdfString::literal(self.u.clone()))?;
        if let Some(oe) = &self.oe {
            arena.dict_set_value(handle, "OE", PdfString::literal(oe.clone()))?;
        }
        if let Some(ue) = &self.ue {
            arena.dict_set_value(handle, "UE", PdfString::literal(ue.clone()))?;
        }
        if let Some(perms) = &self.perms {
            arena.dict_set_value(handle, "Perms", PdfString::literal(perms.clone()))?;
        }
        if !self.encrypt_metadata {
            arena.dict_set_value(handle, "EncryptMetadata", false)?;
        }

        if !self.crypt_filters.is_empty() {
            let cf = arena.alloc(Object::Dictionary(Dictionary::new()));
            for (name, spec) in &self.crypt_filters {
                let filter = arena.alloc(Object::Dictionary(Dictionary::new()));
                arena.cast_to(filter, TypeTag::CryptFilter)?;
                arena.dict_set_value(filter, "Type", Object::Name(Name::new("CryptFilter")))?;
                arena.dict_set_value(
                    filter,
                    "CFM",
                    Object::Name(Name::new(spec.method.pdf_name())),
                )?;
                arena.dict_set_value(filter, "AuthEvent", Object::Name(Name::new("DocOpen")))?;
                if let Some(length) = spec.length {
                    arena.dict_set_value(filter, "Length", length)?;
                }
                arena.dict_set(cf, Name::new(&**name), filter)?;
            }
            arena.dict_set(handle, "CF", cf)?;
        }
        if let Some(stm_f) = &self.stm_f {
            arena.dict_set_value(handle, "StmF", Object::Name(Name::new(&**stm_f)))?;
        }
        if let Some(str_f) = &self.str_f {
            arena.dict_set_value(handle, "StrF", Object::Name(Name::new(&**str_f)))?;
        }
        Ok(handle)
    }
}
