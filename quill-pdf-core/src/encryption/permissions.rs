//! Document permission bits, ISO 32000-1 Table 22.

use bitflags::bitflags;

/// Bits 7, 8 and 13..32 are reserved and shall be set.
const RESERVED: u32 = (1 << 6) | (1 << 7) | 0xFFFF_F000;

bitflags! {
    /// User-access permissions recorded in the encryption dictionary's
    /// `/P` entry. The reserved bits are always part of the raw value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY_CONTENTS = 1 << 3;
        const COPY_CONTENTS = 1 << 4;
        const MODIFY_ANNOTATIONS = 1 << 5;
        const FILLIN_FORMS = 1 << 8;
        const EXTRACT_CONTENTS = 1 << 9;
        const ASSEMBLE_DOC = 1 << 10;
        const HIGH_QUALITY_PRINT = 1 << 11;
        const _ = !0;
    }
}

impl Permissions {
    /// Every user permission granted.
    pub fn all_permissions() -> Self {
        Self::PRINT
            | Self::MODIFY_CONTENTS
            | Self::COPY_CONTENTS
            | Self::MODIFY_ANNOTATIONS
            | Self::FILLIN_FORMS
            | Self::EXTRACT_CONTENTS
            | Self::ASSEMBLE_DOC
            | Self::HIGH_QUALITY_PRINT
    }

    /// The raw `/P` value, reserved bits included.
    pub fn to_p_value(self) -> u32 {
        self.bits() | RESERVED
    }

    /// Interpret a raw `/P` value (stored signed in the file).
    pub fn from_p_value(p: i64) -> Self {
        Self::from_bits_retain(p as u32)
    }

    pub fn can_print(self) -> bool {
        self.contains(Self::PRINT)
    }

    pub fn can_modify_contents(self) -> bool {
        self.contains(Self::MODIFY_CONTENTS)
    }

    pub fn can_copy_contents(self) -> bool {
        self.contains(Self::COPY_CONTENTS)
    }

    pub fn can_fill_forms(self) -> bool {
        self.contains(Self::FILLIN_FORMS)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::empty()
    }
}
