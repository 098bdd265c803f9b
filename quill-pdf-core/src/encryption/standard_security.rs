//! Standard security handler: password verification and encryption key
//! derivation for revisions 2 through 6 (ISO 32000-1 section 7.6.3 and
//! ISO 32000-2 section 7.6.4).

use crate::encryption::aes::{Aes, BLOCK_SIZE};
use crate::encryption::rc4::rc4;
use crate::encryption::EncryptionDictionary;
use crate::error::{PdfError, Result};
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Password padding string, ISO 32000-1 Algorithm 2.
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

fn md5(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Pad or truncate a password to exactly 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    if len < 32 {
        padded[len..].copy_from_slice(&PADDING[..32 - len]);
    }
    padded
}

/// Revision 5/6 passwords are used verbatim, truncated to 127 bytes.
fn password_r5(password: &[u8]) -> &[u8] {
    &password[..password.len().min(127)]
}

fn xor_key(key: &[u8], byte: u8) -> Vec<u8> {
    key.iter().map(|k| k ^ byte).collect()
}

fn random_bytes(count: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; count];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Revision 6 hardened hash, ISO 32000-2 Algorithm 2.B.
///
/// At least 64 rounds of AES-128-CBC over the repeated password/digest
/// block, each hashed with SHA-256/384/512 selected by the byte sum of the
/// pass, continuing until the last output byte allows termination. The
/// published algorithm is the authority here; earlier implementations
/// disagreed on the loop bound.
pub fn compute_hardened_hash(password: &[u8], salt: &[u8], vector: &[u8]) -> Result<[u8; 32]> {
    let mut seed = Vec::with_capacity(password.len() + salt.len() + vector.len());
    seed.extend_from_slice(password);
    seed.extend_from_slice(salt);
    seed.extend_from_slice(vector);
    let mut key: Vec<u8> = sha256(&seed).to_vec();

    let mut round = 0usize;
    loop {
        let mut block = Vec::with_capacity(64 * (password.len() + key.len() + vector.len()));
        for _ in 0..64 {
            block.extend_from_slice(password);
            block.extend_from_slice(&key);
            block.extend_from_slice(vector);
        }

        let aes = Aes::new(&key[..16])?;
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&key[16..32]);
        let pass = aes.encrypt_cbc_no_padding(&block, &iv)?;

        let selector: u32 = pass[..16].iter().map(|b| *b as u32).sum();
        key = match selector % 3 {
            0 => Sha256::digest(&pass).to_vec(),
            1 => Sha384::digest(&pass).to_vec(),
            _ => Sha512::digest(&pass).to_vec(),
        };

        round += 1;
        let last = pass[pass.len() - 1] as usize;
        if round >= 64 && last <= round - 32 {
            break;
        }
    }

    let mut result = [0u8; 32];
    result.copy_from_slice(&key[..32]);
    Ok(result)
}

/// Revision 5/6 validation hash: SHA-256 for R5, hardened hash for R6.
fn validation_hash(r: i64, password: &[u8], salt: &[u8], vector: &[u8]) -> Result<[u8; 32]> {
    if r == 5 {
        let mut input = Vec::with_capacity(password.len() + salt.len() + vector.len());
        input.extend_from_slice(password);
        input.extend_from_slice(salt);
        input.extend_from_slice(vector);
        Ok(sha256(&input))
    } else {
        compute_hardened_hash(password, salt, vector)
    }
}

fn unwrap_file_key(wrapping_key: &[u8; 32], wrapped: &[u8]) -> Result<Vec<u8>> {
    let aes = Aes::new(wrapping_key)?;
    aes.decrypt_cbc_no_padding(wrapped, &[0u8; BLOCK_SIZE])
}

fn wrap_file_key(wrapping_key: &[u8; 32], file_key: &[u8]) -> Result<Vec<u8>> {
    let aes = Aes::new(wrapping_key)?;
    aes.encrypt_cbc_no_padding(file_key, &[0u8; BLOCK_SIZE])
}

impl EncryptionDictionary {
    fn u_clamped(&self) -> &[u8] {
        &self.u[..self.u.len().min(48)]
    }

    /// Key used to produce and recover the `/O` value (revisions < 5).
    fn compute_owner_key(&self, owner_password: &[u8]) -> Vec<u8> {
        let mut hash = md5(&pad_password(owner_password)).to_vec();
        if self.r >= 3 {
            for _ in 0..50 {
                hash = md5(&hash).to_vec();
            }
        }
        let len = if self.r == 2 { 5 } else { self.key_length() };
        hash.truncate(len);
        hash
    }

    /// ISO 32000-1 Algorithm 2: the document encryption key from the user
    /// password. For revision 5+ the file key is unwrapped from `/UE`.
    pub fn compute_user_encryption_key(
        &self,
        password: &[u8],
        file_id: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        if self.r < 5 {
            let mut input = pad_password(password).to_vec();
            input.extend_from_slice(&self.o);
            input.extend_from_slice(&(self.p as i32).to_le_bytes());
            if let Some(id) = file_id {
                input.extend_from_slice(id);
            }
            if self.r >= 4 && !self.encrypt_metadata {
                input.extend_from_slice(&[0xFF; 4]);
            }

            let mut key = md5(&input).to_vec();
            let len = if self.r == 2 { 5 } else { self.key_length() };
            if self.r >= 3 {
                for _ in 0..50 {
                    key = md5(&key[..len]).to_vec();
                }
            }
            key.truncate(len);
            Ok(key)
        } else {
            if self.u.len() < 48 {
                return Err(PdfError::Encryption(
                    "user validation data is too short".to_string(),
                ));
            }
            let uks = &self.u[40..48];
            let ukey = validation_hash(self.r, password_r5(password), uks, &[])?;
            let ue = self
                .ue
                .as_deref()
                .ok_or_else(|| PdfError::MissingKey("UE".to_string()))?;
            unwrap_file_key(&ukey, ue)
        }
    }

    /// The document encryption key from the owner password, revision 5+.
    pub fn compute_owner_encryption_key(&self, password: &[u8]) -> Result<Vec<u8>> {
        if self.r < 5 {
            return Err(PdfError::Encryption(
                "owner encryption keys exist only for revision 5 and later".to_string(),
            ));
        }
        if self.o.len() < 48 {
            return Err(PdfError::Encryption(
                "owner validation data is too short".to_string(),
            ));
        }
        let oks = &self.o[40..48];
        let okey = validation_hash(self.r, password_r5(password), oks, self.u_clamped())?;
        let oe = self
            .oe
            .as_deref()
            .ok_or_else(|| PdfError::MissingKey("OE".to_string()))?;
        unwrap_file_key(&okey, oe)
    }

    /// ISO 32000-1 Algorithms 4/5: the `/U` value. Revisions < 5 only.
    fn compute_user_password_hash(&self, password: &[u8], file_id: Option<&[u8]>) -> Result<Vec<u8>> {
        let key = self.compute_user_encryption_key(password, file_id)?;
        if self.r == 2 {
            Ok(rc4(&key, &PADDING))
        } else {
            let mut input = PADDING.to_vec();
            if let Some(id) = file_id {
                input.extend_from_slice(id);
            }
            let hash = md5(&input);

            let mut user_hash = rc4(&key, &hash);
            for i in 1..=19u8 {
                user_hash = rc4(&xor_key(&key, i), &user_hash);
            }
            user_hash.resize(32, 0xFF);
            Ok(user_hash)
        }
    }

    /// Check a user password. `file_id` is the document identifier for
    /// revisions < 5; the salts live inside `/U` for revision 5+.
    pub fn is_user_password(&self, password: &[u8], file_id: Option<&[u8]>) -> Result<bool> {
        match self.r {
            2 => Ok(self.compute_user_password_hash(password, file_id)? == self.u),
            3 | 4 => {
                let computed = self.compute_user_password_hash(password, file_id)?;
                Ok(self.u.len() >= 16 && computed[..16] == self.u[..16])
            }
            5 | 6 => {
                if self.u.len() < 48 {
                    return Ok(false);
                }
                let uvs = &self.u[32..40];
                let hash = validation_hash(self.r, password_r5(password), uvs, &[])?;
                Ok(hash == self.u[..32])
            }
            other => Err(PdfError::EncryptionNotSupported(format!(
                "unsupported security handler revision: {other}"
            ))),
        }
    }

    /// Check an owner password.
    pub fn is_owner_password(&self, password: &[u8], file_id: Option<&[u8]>) -> Result<bool> {
        match self.r {
            2 | 3 | 4 => {
                let user_password = self.retrieve_user_password(password)?;
                self.is_user_password(&user_password, file_id)
            }
            5 | 6 => {
                if self.o.len() < 48 {
                    return Ok(false);
                }
                let ovs = &self.o[32..40];
                let hash = validation_hash(self.r, password_r5(password), ovs, self.u_clamped())?;
                Ok(hash == self.o[..32])
            }
            other => Err(PdfError::EncryptionNotSupported(format!(
                "unsupported security handler revision: {other}"
            ))),
        }
    }

    /// Recover the (padded) user password from the owner password.
    /// Revisions < 5 only; later revisions have no such relationship.
    pub fn retrieve_user_password(&self, owner_password: &[u8]) -> Result<Vec<u8>> {
        if self.r >= 5 {
            return Err(PdfError::Encryption(
                "the user password cannot be derived for revision 5 and later".to_string(),
            ));
        }
        let key = self.compute_owner_key(owner_password);
        if self.r == 2 {
            Ok(rc4(&key, &self.o))
        } else {
            let mut user_password = self.o.clone();
            for i in (0..=19u8).rev() {
                user_password = rc4(&xor_key(&key, i), &user_password);
            }
            Ok(user_password)
        }
    }

    /// Populate the password validation entries: `/O` and `/U`, plus
    /// `/OE`, `/UE` and `/Perms` for revision 5+. Returns the freshly
    /// generated file key for revision 5+.
    pub fn set_passwords(
        &mut self,
        owner_password: &[u8],
        user_password: &[u8],
        file_id: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>> {
        if self.r < 5 {
            let key = self.compute_owner_key(owner_password);
            let mut owner_hash = rc4(&key, &pad_password(user_password));
            if self.r >= 3 {
                for i in 1..=19u8 {
                    owner_hash = rc4(&xor_key(&key, i), &owner_hash);
                }
            }
            self.o = owner_hash;
            self.u = self.compute_user_password_hash(user_password, file_id)?;
            Ok(None)
        } else {
            let upass = password_r5(user_password).to_vec();
            let opass = password_r5(owner_password).to_vec();

            let uvs = random_bytes(8);
            let uks = random_bytes(8);
            let ovs = random_bytes(8);
            let oks = random_bytes(8);
            let file_key = random_bytes(32);

            let mut u = validation_hash(self.r, &upass, &uvs, &[])?.to_vec();
            u.extend_from_slice(&uvs);
            u.extend_from_slice(&uks);
            self.u = u;

            let mut o = validation_hash(self.r, &opass, &ovs, &self.u)?.to_vec();
            o.extend_from_slice(&ovs);
            o.extend_from_slice(&oks);
            self.o = o;

            let ukey = validation_hash(self.r, &upass, &uks, &[])?;
            let okey = validation_hash(self.r, &opass, &oks, &self.u)?;
            self.ue = Some(wrap_file_key(&ukey, &file_key)?);
            self.oe = Some(wrap_file_key(&okey, &file_key)?);

            let mut perms_block = Vec::with_capacity(16);
            perms_block.extend_from_slice(&(self.p as i32).to_le_bytes());
            perms_block.extend_from_slice(&[0xFF; 4]);
            perms_block.push(if self.encrypt_metadata { b'T' } else { b'F' });
            perms_block.extend_from_slice(b"adb");
            perms_block.extend_from_slice(&[0u8; 4]);

            let aes = Aes::new(&file_key)?;
            let perms = aes.encrypt_cbc_no_padding(&perms_block, &[0u8; BLOCK_SIZE])?;
            self.perms = Some(perms[..16].to_vec());

            Ok(Some(file_key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc4_dict(r: i64) -> EncryptionDictionary {
        let (v, length) = if r == 2 { (1, 40) } else { (2, 128) };
        let mut dict = EncryptionDictionary::new(v, r, length);
        dict.p = -44;
        dict
    }

    fn aes_dict(r: i64) -> EncryptionDictionary {
        let mut dict = EncryptionDictionary::new(5, r, 256);
        dict.p = -44;
        dict
    }

    const FILE_ID: &[u8] = b"0123456789abcdef";

    #[test]
    fn test_pad_password() {
        let padded = pad_password(b"test");
        assert_eq!(&padded[..4], b"test");
        assert_eq!(&padded[4..], &PADDING[..28]);

        assert_eq!(pad_password(b""), PADDING);

        let long = vec![b'x'; 40];
        assert_eq!(pad_password(&long), [b'x'; 32]);
    }

    #[test]
    fn test_r2_password_round_trip() {
        let mut dict = rc4_dict(2);
        dict.set_passwords(b"owner", b"user", Some(FILE_ID)).unwrap();

        assert_eq!(dict.o.len(), 32);
        assert_eq!(dict.u.len(), 32);
        assert!(dict.is_user_password(b"user", Some(FILE_ID)).unwrap());
        assert!(dict.is_owner_password(b"owner", Some(FILE_ID)).unwrap());
        assert!(!dict.is_user_password(b"wrong", Some(FILE_ID)).unwrap());
        assert!(!dict.is_owner_password(b"user", Some(FILE_ID)).unwrap());

        let key = dict.compute_user_encryption_key(b"user", Some(FILE_ID)).unwrap();
        assert_eq!(key.len(), 5);
    }

    #[test]
    fn test_r3_password_round_trip() {
        let mut dict = rc4_dict(3);
        dict.set_passwords(b"owner", b"user", Some(FILE_ID)).unwrap();

        assert!(dict.is_user_password(b"user", Some(FILE_ID)).unwrap());
        assert!(dict.is_owner_password(b"owner", Some(FILE_ID)).unwrap());
        assert!(!dict.is_user_password(b"wrong", Some(FILE_ID)).unwrap());

        let key = dict.compute_user_encryption_key(b"user", Some(FILE_ID)).unwrap();
        assert_eq!(key.len(), 16);
    }

    #[test]
    fn test_retrieve_user_password() {
        for r in [2, 3] {
            let mut dict = rc4_dict(r);
            dict.set_passwords(b"secret-owner", b"plain-user", Some(FILE_ID))
                .unwrap();

            let recovered = dict.retrieve_user_password(b"secret-owner").unwrap();
            assert_eq!(&recovered, &pad_password(b"plain-user"));
        }
    }

    #[test]
    fn test_empty_user_password_is_common_case() {
        let mut dict = rc4_dict(3);
        dict.set_passwords(b"owner", b"", Some(FILE_ID)).unwrap();
        assert!(dict.is_user_password(b"", Some(FILE_ID)).unwrap());
        assert!(!dict.is_user_password(b"x", Some(FILE_ID)).unwrap());
    }

    #[test]
    fn test_metadata_flag_changes_r4_key() {
        let mut a = rc4_dict(4);
        a.length = 128;
        let mut b = a.clone();
        b.encrypt_metadata = false;

        a.set_passwords(b"o", b"u", Some(FILE_ID)).unwrap();
        b.set_passwords(b"o", b"u", Some(FILE_ID)).unwrap();

        let key_a = a.compute_user_encryption_key(b"u", Some(FILE_ID)).unwrap();
        let key_b = b.compute_user_encryption_key(b"u", Some(FILE_ID)).unwrap();
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn test_r5_password_round_trip() {
        let mut dict = aes_dict(5);
        let file_key = dict
            .set_passwords(b"owner5", b"user5", None)
            .unwrap()
            .unwrap();
        assert_eq!(file_key.len(), 32);
        assert_eq!(dict.u.len(), 48);
        assert_eq!(dict.o.len(), 48);

        assert!(dict.is_user_password(b"user5", None).unwrap());
        assert!(dict.is_owner_password(b"owner5", None).unwrap());
        assert!(!dict.is_user_password(b"nope", None).unwrap());
        assert!(!dict.is_owner_password(b"user5", None).unwrap());

        // Both unwrapping paths recover the same file key.
        assert_eq!(
            dict.compute_user_encryption_key(b"user5", None).unwrap(),
            file_key
        );
        assert_eq!(
            dict.compute_owner_encryption_key(b"owner5").unwrap(),
            file_key
        );
    }

    #[test]
    fn test_r6_hardened_round_trip() {
        let mut dict = aes_dict(6);
        let file_key = dict
            .set_passwords(b"owner6", b"user6", None)
            .unwrap()
            .unwrap();

        assert!(dict.is_user_password(b"user6", None).unwrap());
        assert!(dict.is_owner_password(b"owner6", None).unwrap());
        assert!(!dict.is_user_password(b"user5", None).unwrap());

        assert_eq!(
            dict.compute_user_encryption_key(b"user6", None).unwrap(),
            file_key
        );
        assert_eq!(
            dict.compute_owner_encryption_key(b"owner6").unwrap(),
            file_key
        );
    }

    #[test]
    fn test_hardened_hash_is_deterministic() {
        let a = compute_hardened_hash(b"pw", b"salty8b!", b"").unwrap();
        let b = compute_hardened_hash(b"pw", b"salty8b!", b"").unwrap();
        let c = compute_hardened_hash(b"pw", b"other8b!", b"").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_retrieve_user_password_rejected_for_r5() {
        let dict = aes_dict(5);
        assert!(dict.retrieve_user_password(b"x").is_err());
    }

    #[test]
    fn test_unsupported_revision() {
        let dict = EncryptionDictionary::new(1, 7, 40);
        assert!(matches!(
            dict.is_user_password(b"", None),
            Err(PdfError::EncryptionNotSupported(_))
        ));
    }
}
