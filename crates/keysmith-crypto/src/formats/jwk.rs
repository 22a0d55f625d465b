//! JWK export and detection.

use serde_json::Value;

use keysmith_core::{CryptoProvider, ExportForm, FormatTag, Jwk, KeyHandle, Result, SerializedKey};

/// JWK with private members removed, as pretty JSON.
pub async fn export_public_jwk(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    let mut jwk = provider.export_key(key, ExportForm::Jwk).await?.into_jwk()?;
    jwk.strip_private();
    Ok(SerializedKey::new(FormatTag::Jwk, jwk.to_pretty_json()?))
}

/// Full JWK as pretty JSON.
pub async fn export_private_jwk(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    let jwk = provider.export_key(key, ExportForm::Jwk).await?.into_jwk()?;
    Ok(SerializedKey::new(FormatTag::Jwk, jwk.to_pretty_json()?))
}

/// Parse `text` as a JWK if it is a JSON object with a `kty` member.
///
/// Returns `Ok(None)` when the text is not such an object, and an error when
/// it is one but its members have the wrong shape.
pub fn parse_jwk(text: &str) -> Result<Option<Jwk>> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(None);
    };
    if value.get("kty").is_none() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}
