//! AES (Rijndael) block cipher with CBC chaining.
//!
//! Byte-level implementation per FIPS-197: 128/192/256-bit keys over 10, 12
//! or 14 rounds. The PDF convention is followed for CBC payloads: encryption
//! prepends a fresh random IV, decryption consumes the leading IV block.
//! PKCS#7 padding is validated strictly on decrypt — every pad byte must
//! equal the pad length. The no-padding variants serve the revision 5/6 key
//! wrapping, which runs AES over exact 16-byte multiples.

use crate::error::{PdfError, Result};
use rand::RngCore;

pub const BLOCK_SIZE: usize = 16;

#[rustfmt::skip]
const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

#[rustfmt::skip]
const INV_SBOX: [u8; 256] = [
    0x52, 0x09, 0x6a, 0xd5, 0x30, 0x36, 0xa5, 0x38, 0xbf, 0x40, 0xa3, 0x9e, 0x81, 0xf3, 0xd7, 0xfb,
    0x7c, 0xe3, 0x39, 0x82, 0x9b, 0x2f, 0xff, 0x87, 0x34, 0x8e, 0x43, 0x44, 0xc4, 0xde, 0xe9, 0xcb,
    0x54, 0x7b, 0x94, 0x32, 0xa6, 0xc2, 0x23, 0x3d, 0xee, 0x4c, 0x95, 0x0b, 0x42, 0xfa, 0xc3, 0x4e,
    0x08, 0x2e, 0xa1, 0x66, 0x28, 0xd9, 0x24, 0xb2, 0x76, 0x5b, 0xa2, 0x49, 0x6d, 0x8b, 0xd1, 0x25,
    0x72, 0xf8, 0xf6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xd4, 0xa4, 0x5c, 0xcc, 0x5d, 0x65, 0xb6, 0x92,
    0x6c, 0x70, 0x48, 0x50, 0xfd, 0xed, 0xb9, 0xda, 0x5e, 0x15, 0x46, 0x57, 0xa7, 0x8d, 0x9d, 0x84,
    0x90, 0xd8, 0xab, 0x00, 0x8c, 0xbc, 0xd3, 0x0a, 0xf7, 0xe4, 0x58, 0x05, 0xb8, 0xb3, 0x45, 0x06,
    0xd0, 0x2c, 0x1e, 0x8f, 0xca, 0x3f, 0x0f, 0x02, 0xc1, 0xaf, 0xbd, 0x03, 0x01, 0x13, 0x8a, 0x6b,
    0x3a, 0x91, 0x11, 0x41, 0x4f, 0x67, 0xdc, 0xea, 0x97, 0xf2, 0xcf, 0xce, 0xf0, 0xb4, 0xe6, 0x73,
    0x96, 0xac, 0x74, 0x22, 0xe7, 0xad, 0x35, 0x85, 0xe2, 0xf9, 0x37, 0xe8, 0x1c, 0x75, 0xdf, 0x6e,
    0x47, 0xf1, 0x1a, 0x71, 0x1d, 0x29, 0xc5, 0x89, 0x6f, 0xb7, 0x62, 0x0e, 0xaa, 0x18, 0xbe, 0x1b,
    0xfc, 0x56, 0x3e, 0x4b, 0xc6, 0xd2, 0x79, 0x20, 0x9a, 0xdb, 0xc0, 0xfe, 0x78, 0xcd, 0x5a, 0xf4,
    0x1f, 0xdd, 0xa8, 0x33, 0x88, 0x07, 0xc7, 0x31, 0xb1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xec, 0x5f,
    0x60, 0x51, 0x7f, 0xa9, 0x19, 0xb5, 0x4a, 0x0d, 0x2d, 0xe5, 0x7a, 0x9f, 0x93, 0xc9, 0x9c, 0xef,
    0xa0, 0xe0, 0x3b, 0x4d, 0xae, 0x2a, 0xf5, 0xb0, 0xc8, 0xeb, 0xbb, 0x3c, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2b, 0x04, 0x7e, 0xba, 0x77, 0xd6, 0x26, 0xe1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0c, 0x7d,
];

const RCON: [u8; 10] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

/// Multiplication in GF(2^8) modulo x^8 + x^4 + x^3 + x + 1.
fn gmul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// AES cipher keyed for one key size.
pub struct Aes {
    round_keys: Vec<[u8; BLOCK_SIZE]>,
    rounds: usize,
}

impl Aes {
    /// Key must be 16, 24 or 32 bytes (AES-128/192/256).
    pub fn new(key: &[u8]) -> Result<Self> {
        let nk = match key.len() {
            16 => 4,
            24 => 6,
            32 => 8,
            other => {
                return Err(PdfError::Encryption(format!(
                    "AES key must be 128, 192 or 256 bits, got {} bits",
                    other * 8
                )))
            }
        };
        let rounds = nk + 6;

        // FIPS-197 section 5.2 key expansion, word oriented.
        let total_words = 4 * (rounds + 1);
        let mut words: Vec<[u8; 4]> = Vec::with_capacity(total_words);
        for chunk in key.chunks(4) {
            words.push([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        for i in nk..total_words {
            let mut temp = words[i - 1];
            if i % nk == 0 {
                temp.rotate_left(1);
                for byte in temp.iter_mut() {
                    *byte = SBOX[*byte as usize];
                }
                temp[0] ^= RCON[i / nk - 1];
            } else if nk > 6 && i % nk == 4 {
                for byte in temp.iter_mut() {
                    *byte = SBOX[*byte as usize];
                }
            }
            let prev = words[i - nk];
            words.push([
                prev[0] ^ temp[0],
                prev[1] ^ temp[1],
                prev[2] ^ temp[2],
                prev[3] ^ temp[3],
            ]);
        }

        let round_keys = words
            .chunks(4)
            .map(|w| {
                let mut rk = [0u8; BLOCK_SIZE];
                for (i, word) in w.iter().enumerate() {
                    rk[4 * i..4 * i + 4].copy_from_slice(word);
                }
                rk
            })
            .collect();

        Ok(Self { round_keys, rounds })
    }

    fn add_round_key(&self, state: &mut [u8; BLOCK_SIZE], round: usize) {
        for (byte, key_byte) in state.iter_mut().zip(self.round_keys[round].iter()) {
            *byte ^= key_byte;
        }
    }

    fn sub_bytes(state: &mut [u8; BLOCK_SIZE]) {
        for byte in state.iter_mut() {
            *byte = SBOX[*byte as usize];
        }
    }

    fn inv_sub_bytes(state: &mut [u8; BLOCK_SIZE]) {
        for byte in state.iter_mut() {
            *byte = INV_SBOX[*byte as usize];
        }
    }

    // State bytes are kept in input order: s[row][col] = state[row + 4*col].
    fn shift_rows(state: &mut [u8; BLOCK_SIZE]) {
        let copy = *state;
        for row in 1..4 {
            for col in 0..4 {
                state[row + 4 * col] = copy[row + 4 * ((col + row) % 4)];
            }
        }
    }

    fn inv_shift_rows(state: &mut [u8; BLOCK_SIZE]) {
        let copy = *state;
        for row in 1..4 {
            for col in 0..4 {
                state[row + 4 * ((col + row) % 4)] = copy[row + 4 * col];
            }
        }
    }

    fn mix_columns(state: &mut [u8; BLOCK_SIZE]) {
        for col in 0..4 {
            let c = &mut state[4 * col..4 * col + 4];
            let (a0, a1, a2, a3) = (c[0], c[1], c[2], c[3]);
            c[0] = gmul(a0, 2) ^ gmul(a1, 3) ^ a2 ^ a3;
            c[1] = a0 ^ gmul(a1, 2) ^ gmul(a2, 3) ^ a3;
            c[2] = a0 ^ a1 ^ gmul(a2, 2) ^ gmul(a3, 3);
            c[3] = gmul(a0, 3) ^ a1 ^ a2 ^ gmul(a3, 2);
        }
    }

    fn inv_mix_columns(state: &mut [u8; BLOCK_SIZE]) {
        for col in 0..4 {
            let c = &mut state[4 * col..4 * col + 4];
            let (a0, a1, a2, a3) = (c[0], c[1], c[2], c[3]);
            c[0] = gmul(a0, 14) ^ gmul(a1, 11) ^ gmul(a2, 13) ^ gmul(a3, 9);
            c[1] = gmul(a0, 9) ^ gmul(a1, 14) ^ gmul(a2, 11) ^ gmul(a3, 13);
            c[2] = gmul(a0, 13) ^ gmul(a1, 9) ^ gmul(a2, 14) ^ gmul(a3, 11);
            c[3] = gmul(a0, 11) ^ gmul(a1, 13) ^ gmul(a2, 9) ^ gmul(a3, 14);
        }
    }

    pub(crate) fn encrypt_block(&self, state: &mut [u8; BLOCK_SIZE]) {
        self.add_round_key(state, 0);
        for round in 1..self.rounds {
            Self::sub_bytes(state);
            Self::shift_rows(state);
            Self::mix_columns(state);
            self.add_round_key(state, round);
        }
        Self::sub_bytes(state);
        Self::shift_rows(state);
        self.add_round_key(state, self.rounds);
    }

    pub(crate) fn decrypt_block(&self, state: &mut [u8; BLOCK_SIZE]) {
        self.add_round_key(state, self.rounds);
        Self::inv_shift_rows(state);
        Self::inv_sub_bytes(state);
        for round in (1..self.rounds).rev() {
            self.add_round_key(state, round);
            Self::inv_mix_columns(state);
            Self::inv_shift_rows(state);
            Self::inv_sub_bytes(state);
        }
        self.add_round_key(state, 0);
    }

    fn cbc_encrypt_blocks(&self, data: &[u8], iv: &[u8; BLOCK_SIZE]) -> Vec<u8> {
        let mut output = Vec::with_capacity(data.len());
        let mut chain = *iv;
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            for (byte, chained) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chained;
            }
            self.encrypt_block(&mut block);
            output.extend_from_slice(&block);
            chain = block;
        }
        output
    }

    fn cbc_decrypt_blocks(&self, data: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Vec<u8>> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(PdfError::Encryption(format!(
                "ciphertext length {} is not a multiple of the AES block size",
                data.len()
            )));
        }
        let mut output = Vec::with_capacity(data.len());
        let mut chain = *iv;
        for chunk in data.chunks(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.decrypt_block(&mut block);
            for (byte, chained) in block.iter_mut().zip(chain.iter()) {
                *byte ^= chained;
            }
            output.extend_from_slice(&block);
            chain.copy_from_slice(chunk);
        }
        Ok(output)
    }

    /// CBC encrypt with PKCS#7 padding; the IV is prepended to the output.
    pub fn encrypt_cbc(&self, data: &[u8], iv: &[u8; BLOCK_SIZE]) -> Vec<u8> {
        let pad = BLOCK_SIZE - data.len() % BLOCK_SIZE;
        let mut padded = data.to_vec();
        padded.extend(std::iter::repeat(pad as u8).take(pad));

        let mut output = iv.to_vec();
        output.extend(self.cbc_encrypt_blocks(&padded, iv));
        output
    }

    /// CBC decrypt; the leading block of `data` is the IV. Padding is
    /// validated strictly: a wrong pad length or any wrong pad byte fails,
    /// corrupted plaintext is never returned silently.
    pub fn decrypt_cbc(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < BLOCK_SIZE {
            return Err(PdfError::Encryption(
                "AES data is missing its initialization vector".to_string(),
            ));
        }
        let mut iv = [0u8; BLOCK_SIZE];
        iv.copy_from_slice(&data[..BLOCK_SIZE]);

        let mut plain = self.cbc_decrypt_blocks(&data[BLOCK_SIZE..], &iv)?;
        let Some(&pad) = plain.last() else {
            return Err(PdfError::Encryption("AES data has no content".to_string()));
        };
        if pad == 0 || pad as usize > BLOCK_SIZE || pad as usize > plain.len() {
            return Err(PdfError::Encryption(format!(
                "incorrect padding length: {pad}"
            )));
        }
        let boundary = plain.len() - pad as usize;
        if plain[boundary..].iter().any(|&byte| byte != pad) {
            return Err(PdfError::Encryption("incorrect padding byte".to_string()));
        }
        plain.truncate(boundary);
        Ok(plain)
    }

    /// CBC without padding or IV framing; both sides must pass exact
    /// multiples of 16 bytes. Used by the revision 5/6 key wrapping.
    pub fn encrypt_cbc_no_padding(&self, data: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Vec<u8>> {
        if data.len() % BLOCK_SIZE != 0 {
            return Err(PdfError::Encryption(format!(
                "plaintext length {} is not a multiple of the AES block size",
                data.len()
            )));
        }
        Ok(self.cbc_encrypt_blocks(data, iv))
    }

    pub fn decrypt_cbc_no_padding(&self, data: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Vec<u8>> {
        self.cbc_decrypt_blocks(data, iv)
    }
}

/// A fresh random IV from the thread-local CSPRNG.
pub fn generate_iv() -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);
    iv
}
