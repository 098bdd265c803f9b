//! RC4 stream cipher.
//!
//! Key-scheduled once per invocation over the full key; encryption and
//! decryption are the same operation.

/// RC4 cipher state.
pub struct Rc4 {
    s: [u8; 256],
    i: usize,
    j: usize,
}

impl Rc4 {
    /// Key-schedule a cipher from `key` (1..=256 bytes; PDF uses 5..=16).
    pub fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, byte) in s.iter_mut().enumerate() {
            *byte = i as u8;
        }

        let mut j = 0usize;
        for i in 0..256 {
            j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
            s.swap(i, j);
        }

        Self { s, i: 0, j: 0 }
    }

    /// Run the keystream over `data`.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut output = data.to_vec();
        self.process_in_place(&mut output);
        output
    }

    pub fn process_in_place(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = (self.i + 1) % 256;
            self.j = (self.j + self.s[self.i] as usize) % 256;
            self.s.swap(self.i, self.j);

            let k = self.s[(self.s[self.i] as usize + self.s[self.j] as usize) % 256];
            *byte ^= k;
        }
    }
}

/// One-shot RC4. Symmetric: apply twice with the same key to get the
/// input back.
pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).process(data)
}
