//! PGP armored keys. Armoring is done by the PGP provider; this module only
//! routes the text.

use keysmith_core::{FormatTag, PgpKeyObject, SerializedKey};

/// Prefix shared by every OpenPGP armor header.
pub const PGP_ARMOR_PREFIX: &str = "-----BEGIN PGP";

pub fn export_armored(key: &PgpKeyObject) -> SerializedKey {
    SerializedKey::new(FormatTag::PgpArmored, key.armored.clone())
}

pub fn is_armored(text: &str) -> bool {
    text.starts_with(PGP_ARMOR_PREFIX)
}
