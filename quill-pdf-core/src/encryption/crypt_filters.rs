//! Crypt filter methods and cipher selection.
//!
//! Encryption versions 1 and 2 use RC4 for everything. Versions 4 and 5
//! select per-usage ciphers (strings vs. streams) through named crypt
//! filter dictionaries; a missing or unnamed filter means identity.

use crate::encryption::EncryptionDictionary;
use crate::error::{PdfError, Result};

/// `/CFM` methods of a crypt filter dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptFilterMethod {
    /// No encryption.
    None,
    /// RC4.
    V2,
    /// AES-128-CBC.
    AESV2,
    /// AES-256-CBC (encryption version 5 only).
    AESV3,
}

impl CryptFilterMethod {
    pub fn pdf_name(&self) -> &'static str {
        match self {
            CryptFilterMethod::None => "None",
            CryptFilterMethod::V2 => "V2",
            CryptFilterMethod::AESV2 => "AESV2",
            CryptFilterMethod::AESV3 => "AESV3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "None" => Some(CryptFilterMethod::None),
            "V2" => Some(CryptFilterMethod::V2),
            "AESV2" => Some(CryptFilterMethod::AESV2),
            "AESV3" => Some(CryptFilterMethod::AESV3),
            _ => None,
        }
    }
}

/// One named crypt filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptFilterSpec {
    pub method: CryptFilterMethod,
    /// Key length in bytes, when declared.
    pub length: Option<i64>,
}

/// The cipher actually applied to an object's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Identity,
    Rc4,
    Aes,
}

fn method_cipher(method: CryptFilterMethod, version: i64) -> Result<CipherKind> {
    match method {
        CryptFilterMethod::None => Ok(CipherKind::Identity),
        CryptFilterMethod::V2 => Ok(CipherKind::Rc4),
        CryptFilterMethod::AESV2 => Ok(CipherKind::Aes),
        CryptFilterMethod::AESV3 if version == 5 => Ok(CipherKind::Aes),
        CryptFilterMethod::AESV3 => Err(PdfError::EncryptionNotSupported(format!(
            "AESV3 crypt filter requires encryption version 5, found {version}"
        ))),
    }
}

/// Pick the string and stream ciphers for a security handler dictionary.
pub fn select_ciphers(dict: &EncryptionDictionary) -> Result<(CipherKind, CipherKind)> {
    match dict.v {
        1 | 2 => Ok((CipherKind::Rc4, CipherKind::Rc4)),
        4 | 5 => {
            if dict.crypt_filters.is_empty() {
                return Ok((CipherKind::Identity, CipherKind::Identity));
            }
            let lookup = |name: &Option<String>| -> Result<CipherKind> {
                let Some(name) = name else {
                    return Ok(CipherKind::Identity);
                };
                match dict.crypt_filters.get(name) {
                    Some(filter) => method_cipher(filter.method, dict.v),
                    None => Ok(CipherKind::Identity),
                }
            };
            Ok((lookup(&dict.str_f)?, lookup(&dict.stm_f)?))
        }
        other => Err(PdfError::EncryptionNotSupported(format!(
            "unsupported encryption version: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::EncryptionDictionary;

    fn v4_dict(method: CryptFilterMethod) -> EncryptionDictionary {
        let mut dict = EncryptionDictionary::new(4, 4, 128);
        dict.crypt_filters.insert(
            "StdCF".to_string(),
            CryptFilterSpec {
                method,
                length: Some(16),
            },
        );
        dict.stm_f = Some("StdCF".to_string());
        dict.str_f = Some("StdCF".to_string());
        dict
    }

    #[test]
    fn test_v1_v2_always_rc4() {
        for v in [1, 2] {
            let dict = EncryptionDictionary::new(v, 2, 40);
            assert_eq!(
                select_ciphers(&dict).unwrap(),
                (CipherKind::Rc4, CipherKind::Rc4)
            );
        }
    }

    #[test]
    fn test_v4_crypt_filter_selection() {
        assert_eq!(
            select_ciphers(&v4_dict(CryptFilterMethod::V2)).unwrap(),
            (CipherKind::Rc4, CipherKind::Rc4)
        );
        assert_eq!(
            select_ciphers(&v4_dict(CryptFilterMethod::AESV2)).unwrap(),
            (CipherKind::Aes, CipherKind::Aes)
        );
        assert_eq!(
            select_ciphers(&v4_dict(CryptFilterMethod::None)).unwrap(),
            (CipherKind::Identity, CipherKind::Identity)
        );
    }

    #[test]
    fn test_missing_filters_mean_identity() {
        let dict = EncryptionDictionary::new(4, 4, 128);
        assert_eq!(
            select_ciphers(&dict).unwrap(),
            (CipherKind::Identity, CipherKind::Identity)
        );

        let mut dict = v4_dict(CryptFilterMethod::AESV2);
        dict.str_f = None;
        let (strings, streams) = select_ciphers(&dict).unwrap();
        assert_eq!(strings, CipherKind::Identity);
        assert_eq!(streams, CipherKind::Aes);
    }

    #[test]
    fn test_aesv3_requires_version_5() {
        let dict = v4_dict(CryptFilterMethod::AESV3);
        assert!(matches!(
            select_ciphers(&dict),
            Err(PdfError::EncryptionNotSupported(_))
        ));

        let mut dict = v4_dict(CryptFilterMethod::AESV3);
        dict.v = 5;
        dict.r = 5;
        assert_eq!(
            select_ciphers(&dict).unwrap(),
            (CipherKind::Aes, CipherKind::Aes)
        );
    }

    #[test]
    fn test_unsupported_version() {
        let dict = EncryptionDictionary::new(3, 3, 128);
        assert!(matches!(
            select_ciphers(&dict),
            Err(PdfError::EncryptionNotSupported(_))
        ));
    }
}
