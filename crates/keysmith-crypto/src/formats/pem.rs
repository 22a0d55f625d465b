//! PEM framing of SPKI and PKCS#8 DER (RFC 7468).

use keysmith_core::{
    CryptoProvider, Error, ExportForm, FormatTag, KeyFamily, KeyHandle, Result, SerializedKey,
};

use crate::encoding::{base64_decode, base64_encode, pem_footer, pem_header, pem_unwrap, pem_wrap};

pub const SPKI_LABEL: &str = "PUBLIC KEY";
pub const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Any PEM boundary line.
pub const PEM_BOUNDARY: &str = "-----BEGIN";

/// DER payload of a PEM block and which structure its header names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub public: bool,
    pub der: Vec<u8>,
}

/// Wrap DER bytes in a PEM block with `label`.
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    pem_wrap(&base64_encode(der), &pem_header(label), &pem_footer(label))
}

/// Decode a PEM block. SPKI is chosen when the first line mentions `PUBLIC`.
pub fn decode_pem(text: &str) -> Result<PemBlock> {
    let header = text.lines().next().unwrap_or_default();
    let der = base64_decode(&pem_unwrap(text))
        .map_err(|e| Error::malformed(format!("PEM body does not decode: {}", e)))?;
    if der.is_empty() {
        return Err(Error::malformed("PEM body is empty"));
    }
    Ok(PemBlock {
        public: header.contains("PUBLIC"),
        der,
    })
}

/// Only RSA and EC keys have an SPKI or PKCS#8 structure.
fn require_asymmetric(key: &KeyHandle) -> Result<()> {
    match key.algorithm().family() {
        KeyFamily::Rsa | KeyFamily::Ec => Ok(()),
        KeyFamily::Symmetric => Err(Error::unsupported_key_type("PEM")),
    }
}

pub async fn export_spki_pem(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    require_asymmetric(key)?;
    let der = provider.export_key(key, ExportForm::Spki).await?.into_bytes()?;
    Ok(SerializedKey::new(FormatTag::PemSpki, encode_pem(SPKI_LABEL, &der)))
}

pub async fn export_pkcs8_pem(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<SerializedKey> {
    require_asymmetric(key)?;
    let der = provider.export_key(key, ExportForm::Pkcs8).await?.into_bytes()?;
    Ok(SerializedKey::new(FormatTag::PemPkcs8, encode_pem(PKCS8_LABEL, &der)))
}
