//! Raw symmetric key bytes as Base64 or hex.

use keysmith_core::{
    CryptoProvider, Error, ExportForm, FormatTag, KeyFamily, KeyHandle, Result, SerializedKey,
};

use crate::encoding::{base64_decode, base64_encode, hex_decode, hex_encode};

fn require_symmetric(key: &KeyHandle) -> Result<()> {
    match key.algorithm().family() {
        KeyFamily::Symmetric => Ok(()),
        KeyFamily::Rsa | KeyFamily::Ec => Err(Error::unsupported_key_type("raw symmetric")),
    }
}

pub async fn export_raw_base64(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    require_symmetric(key)?;
    let bytes = provider.export_key(key, ExportForm::Raw).await?.into_bytes()?;
    Ok(SerializedKey::new(FormatTag::RawBase64, base64_encode(&bytes)))
}

pub async fn export_raw_hex(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    require_symmetric(key)?;
    let bytes = provider.export_key(key, ExportForm::Raw).await?.into_bytes()?;
    Ok(SerializedKey::new(FormatTag::RawHex, hex_encode(&bytes)))
}

/// Byte strings `text` may encode, Base64 reading first, then hex.
pub fn decode_candidates(text: &str) -> Vec<(FormatTag, Vec<u8>)> {
    let mut out = Vec::with_capacity(2);
    if let Ok(bytes) = base64_decode(text) {
        out.push((FormatTag::RawBase64, bytes));
    }
    if let Ok(bytes) = hex_decode(text) {
        out.push((FormatTag::RawHex, bytes));
    }
    out
}
