//! Format sniffing and speculative import.
//!
//! [`import_key`] walks a fixed decision procedure over trimmed text:
//!
//! 1. PGP armor, read by the PGP provider (failures fall through)
//! 2. JSON with a `kty` member, imported as a JWK
//! 3. OpenSSH private, PuTTY `.ppk` and SSH public key text
//! 4. PEM, tried against [`PEM_CANDIDATES`] in order
//! 5. Raw Base64 then hex bytes, tried as AES keys under [`AesMode::ALL`]
//!
//! Ambiguous input resolves by that order. Thirty-two hex digits are also
//! valid Base64, so they import as a 24-byte AES-192 key, not AES-128.

use tracing::{debug, info, warn};

use keysmith_core::defaults::AES_KEY_BITS;
use keysmith_core::logging::{
    ALGORITHM, BYTE_LEN, CANDIDATE, ERROR_MSG, FORMAT, KIND, OPERATION, SUBSYSTEM,
};
use keysmith_core::{
    AesMode, AlgorithmDescriptor, CryptoProvider, Error, FormatTag, HashAlg, ImportMaterial, Jwk,
    KeyHandle, KeyUsage, LoadedKey, NamedCurve, PgpProvider, Result,
};

use crate::components::{descriptor_for_usages, import_components, KeyComponents};
use crate::encoding::base64url_decode;
use crate::formats::{jwk, openssh, pem, pgp, putty, raw, ssh};

/// Algorithms tried, in order, for a PEM body.
pub const PEM_CANDIDATES: [AlgorithmDescriptor; 5] = [
    AlgorithmDescriptor::RsaOaep {
        hash: HashAlg::Sha256,
    },
    AlgorithmDescriptor::RsaPss {
        hash: HashAlg::Sha256,
    },
    AlgorithmDescriptor::Ecdsa {
        curve: NamedCurve::P256,
    },
    AlgorithmDescriptor::Ecdsa {
        curve: NamedCurve::P384,
    },
    AlgorithmDescriptor::Ecdsa {
        curve: NamedCurve::P521,
    },
];

/// Usages attached to imported public keys.
pub const PUBLIC_USAGES: [KeyUsage; 2] = [KeyUsage::Encrypt, KeyUsage::Verify];

/// Usages attached to imported private keys.
pub const PRIVATE_USAGES: [KeyUsage; 2] = [KeyUsage::Decrypt, KeyUsage::Sign];

/// Usages attached to raw symmetric keys.
pub const SYMMETRIC_USAGES: [KeyUsage; 2] = [KeyUsage::Encrypt, KeyUsage::Decrypt];

/// A sniffed key and the format it was recognized as.
#[derive(Debug)]
pub struct ImportedKey {
    pub key: LoadedKey,
    pub format: FormatTag,
}

impl ImportedKey {
    fn provider(key: KeyHandle, format: FormatTag) -> Self {
        Self {
            key: LoadedKey::Provider(key),
            format,
        }
    }
}

/// Detect the format of `blob` and import it.
///
/// A PGP armor header with no PGP provider configured is
/// [`Error::PgpUnavailable`]. Recognized input the provider refuses is
/// [`Error::ProviderRejected`]; unrecognized input is
/// [`Error::UnsupportedKeyFormat`].
pub async fn import_key(
    provider: &dyn CryptoProvider,
    pgp_provider: Option<&dyn PgpProvider>,
    blob: &str,
) -> Result<ImportedKey> {
    let text = blob.trim();
    if text.is_empty() {
        return Err(Error::UnsupportedKeyFormat);
    }

    let imported = sniff(provider, pgp_provider, text).await?;
    info!(
        { SUBSYSTEM } = "sniffer",
        { OPERATION } = "import",
        { FORMAT } = %imported.format,
        { KIND } = %imported.key.kind(),
        "Imported key"
    );
    Ok(imported)
}

async fn sniff(
    provider: &dyn CryptoProvider,
    pgp_provider: Option<&dyn PgpProvider>,
    text: &str,
) -> Result<ImportedKey> {
    if pgp::is_armored(text) {
        let Some(pgp_provider) = pgp_provider else {
            return Err(Error::PgpUnavailable);
        };
        match pgp_provider.read_key(text).await {
            Ok(key) => {
                return Ok(ImportedKey {
                    key: LoadedKey::Pgp(key),
                    format: FormatTag::PgpArmored,
                })
            }
            Err(e) => warn!(
                { SUBSYSTEM } = "sniffer",
                { FORMAT } = "pgp",
                { ERROR_MSG } = %e,
                "PGP armor did not parse, trying other formats"
            ),
        }
    }

    if let Some(jwk) = jwk::parse_jwk(text)? {
        debug!({ SUBSYSTEM } = "sniffer", { FORMAT } = "jwk", kty = %jwk.kty, "Detected JWK");
        let key = import_jwk(provider, &jwk).await?;
        return Ok(ImportedKey::provider(key, FormatTag::Jwk));
    }

    if openssh::is_openssh_private(text) {
        debug!({ SUBSYSTEM } = "sniffer", { FORMAT } = "openssh", "Detected OpenSSH private key");
        let decoded = openssh::parse(text)?;
        let key = import_ssh_components(provider, &decoded.components, &PRIVATE_USAGES).await?;
        return Ok(ImportedKey::provider(key, FormatTag::OpensshPrivateV1));
    }

    if putty::is_putty_private(text) {
        debug!({ SUBSYSTEM } = "sniffer", { FORMAT } = "putty", "Detected PuTTY private key");
        let decoded = putty::parse(text)?;
        let key = import_ssh_components(provider, &decoded.components, &PRIVATE_USAGES).await?;
        return Ok(ImportedKey::provider(key, FormatTag::PuttyPpkV2));
    }

    if ssh::is_public_line(text) {
        debug!({ SUBSYSTEM } = "sniffer", { FORMAT } = "ssh", "Detected SSH public key");
        let (components, _comment) = ssh::parse_public_line(text)?;
        let key = import_ssh_components(provider, &components, &PUBLIC_USAGES).await?;
        return Ok(ImportedKey::provider(key, FormatTag::SshPublic));
    }

    if text.starts_with(pem::PEM_BOUNDARY) {
        debug!({ SUBSYSTEM } = "sniffer", { FORMAT } = "pem", "Detected PEM framing");
        return import_pem(provider, text).await;
    }

    for (tag, bytes) in raw::decode_candidates(text) {
        debug!(
            { SUBSYSTEM } = "sniffer",
            { FORMAT } = %tag,
            { BYTE_LEN } = bytes.len(),
            "Trying raw key bytes"
        );
        if let Some(key) = import_raw_aes(provider, &bytes).await {
            return Ok(ImportedKey::provider(key, tag));
        }
    }

    Err(Error::UnsupportedKeyFormat)
}

// =============================================================================
// BRANCHES
// =============================================================================

/// Usages from `key_ops`, else inferred from the presence of `d`.
fn jwk_usages(jwk: &Jwk) -> Vec<KeyUsage> {
    match &jwk.key_ops {
        Some(ops) => ops.clone(),
        None if jwk.is_private() => PRIVATE_USAGES.to_vec(),
        None => PUBLIC_USAGES.to_vec(),
    }
}

/// SHA-384/512 when `alg` ends with that size, SHA-256 otherwise.
fn hash_from_alg(alg: &str) -> HashAlg {
    if alg.ends_with("384") {
        HashAlg::Sha384
    } else if alg.ends_with("512") {
        HashAlg::Sha512
    } else {
        HashAlg::Sha256
    }
}

/// Symmetric algorithm named by an `oct` JWK's `alg`, e.g. `A256GCM` or `HS384`.
fn oct_algorithm(alg: &str) -> Option<AlgorithmDescriptor> {
    if let Some(bits) = alg.strip_prefix("HS") {
        return HashAlg::from_bits(bits.parse().ok()?).map(|hash| AlgorithmDescriptor::Hmac { hash });
    }
    let rest = alg.strip_prefix('A')?;
    let split = rest.find(|c: char| !c.is_ascii_digit())?;
    let (bits, mode) = rest.split_at(split);
    let length: usize = bits.parse().ok()?;
    let mode: AesMode = mode.parse().ok()?;
    AES_KEY_BITS
        .contains(&length)
        .then_some(AlgorithmDescriptor::Aes { mode, length })
}

async fn import_jwk(provider: &dyn CryptoProvider, jwk: &Jwk) -> Result<KeyHandle> {
    let alg = jwk.alg.as_deref().unwrap_or_default();
    let algorithm = match jwk.kty.as_str() {
        "RSA" => {
            let hash = hash_from_alg(alg);
            if alg.starts_with("PS") || alg.contains("PSS") {
                AlgorithmDescriptor::RsaPss { hash }
            } else {
                AlgorithmDescriptor::RsaOaep { hash }
            }
        }
        "EC" => {
            let curve = match jwk.crv.as_deref() {
                None => NamedCurve::P256,
                Some(crv) => crv
                    .parse()
                    .map_err(|_| Error::unsupported_key_type(format!("JWK curve {}", crv)))?,
            };
            if alg.starts_with("ES") {
                AlgorithmDescriptor::Ecdsa { curve }
            } else {
                AlgorithmDescriptor::Ecdh { curve }
            }
        }
        "oct" => return import_oct_jwk(provider, jwk, alg).await,
        other => return Err(Error::unsupported_key_type(format!("JWK kty {}", other))),
    };
    debug!(
        { SUBSYSTEM } = "sniffer",
        { FORMAT } = "jwk",
        { ALGORITHM } = %algorithm,
        "Importing JWK"
    );
    provider
        .import_key(ImportMaterial::Jwk(jwk), &algorithm, true, &jwk_usages(jwk))
        .await
}

/// `oct` keys whose `alg` names an algorithm import under it; the rest go
/// through the raw AES sniffing.
async fn import_oct_jwk(provider: &dyn CryptoProvider, jwk: &Jwk, alg: &str) -> Result<KeyHandle> {
    if let Some(algorithm) = oct_algorithm(alg) {
        let usages = match (&jwk.key_ops, algorithm) {
            (Some(ops), _) => ops.clone(),
            (None, AlgorithmDescriptor::Hmac { .. }) => vec![KeyUsage::Sign, KeyUsage::Verify],
            (None, _) => SYMMETRIC_USAGES.to_vec(),
        };
        return provider
            .import_key(ImportMaterial::Jwk(jwk), &algorithm, true, &usages)
            .await;
    }
    let k = jwk
        .k
        .as_deref()
        .ok_or_else(|| Error::malformed("oct JWK is missing k"))?;
    let bytes = base64url_decode(k)?;
    import_raw_aes(provider, &bytes)
        .await
        .ok_or_else(|| Error::ProviderRejected(format!("no AES variant accepts a {}-byte key", bytes.len())))
}

async fn import_ssh_components(
    provider: &dyn CryptoProvider,
    components: &KeyComponents,
    usages: &[KeyUsage],
) -> Result<KeyHandle> {
    let algorithm = descriptor_for_usages(components, usages, HashAlg::Sha256)
        .ok_or_else(|| Error::unsupported_key_type("SSH"))?;
    import_components(provider, components, &algorithm, true, usages).await
}

async fn import_pem(provider: &dyn CryptoProvider, text: &str) -> Result<ImportedKey> {
    let block = pem::decode_pem(text)?;
    let (material, usages, tag) = if block.public {
        (ImportMaterial::Spki(&block.der), PUBLIC_USAGES, FormatTag::PemSpki)
    } else {
        (ImportMaterial::Pkcs8(&block.der), PRIVATE_USAGES, FormatTag::PemPkcs8)
    };

    let mut last_error = None;
    for candidate in &PEM_CANDIDATES {
        match provider.import_key(material, candidate, true, &usages).await {
            Ok(key) => {
                debug!(
                    { SUBSYSTEM } = "sniffer",
                    { CANDIDATE } = %candidate,
                    "PEM candidate accepted"
                );
                return Ok(ImportedKey::provider(key, tag));
            }
            Err(e) => {
                debug!(
                    { SUBSYSTEM } = "sniffer",
                    { CANDIDATE } = %candidate,
                    { ERROR_MSG } = %e,
                    "PEM candidate rejected"
                );
                last_error = Some(e);
            }
        }
    }
    Err(Error::ProviderRejected(format!(
        "no candidate algorithm accepted the {} key{}",
        tag,
        last_error
            .map(|e| format!(" (last error: {})", e))
            .unwrap_or_default()
    )))
}

/// Try `bytes` as an AES key under each mode. `None` when the length is not
/// an AES key size or every mode is refused.
async fn import_raw_aes(provider: &dyn CryptoProvider, bytes: &[u8]) -> Option<KeyHandle> {
    let length = bytes.len() * 8;
    if !AES_KEY_BITS.contains(&length) {
        return None;
    }
    for mode in AesMode::ALL {
        let candidate = AlgorithmDescriptor::Aes { mode, length };
        match provider
            .import_key(ImportMaterial::Raw(bytes), &candidate, true, &SYMMETRIC_USAGES)
            .await
        {
            Ok(key) => return Some(key),
            Err(e) => debug!(
                { SUBSYSTEM } = "sniffer",
                { CANDIDATE } = %candidate,
                { ERROR_MSG } = %e,
                "Raw candidate rejected"
            ),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_from_alg() {
        assert_eq!(hash_from_alg("RSA-OAEP-512"), HashAlg::Sha512);
        assert_eq!(hash_from_alg("PS384"), HashAlg::Sha384);
        assert_eq!(hash_from_alg("RSA-OAEP"), HashAlg::Sha256);
        assert_eq!(hash_from_alg(""), HashAlg::Sha256);
    }

    #[test]
    fn test_oct_algorithm() {
        assert_eq!(
            oct_algorithm("A192CTR"),
            Some(AlgorithmDescriptor::Aes {
                mode: AesMode::Ctr,
                length: 192
            })
        );
        assert_eq!(
            oct_algorithm("HS512"),
            Some(AlgorithmDescriptor::Hmac {
                hash: HashAlg::Sha512
            })
        );
        assert_eq!(oct_algorithm("A128KW"), None);
        assert_eq!(oct_algorithm("A100GCM"), None);
        assert_eq!(oct_algorithm(""), None);
    }

    #[test]
    fn test_jwk_usages_default_by_private_member() {
        let mut jwk = Jwk {
            kty: "EC".into(),
            ..Default::default()
        };
        assert_eq!(jwk_usages(&jwk), PUBLIC_USAGES.to_vec());
        jwk.d = Some("AA".into());
        assert_eq!(jwk_usages(&jwk), PRIVATE_USAGES.to_vec());
        jwk.key_ops = Some(vec![KeyUsage::DeriveBits]);
        assert_eq!(jwk_usages(&jwk), vec![KeyUsage::DeriveBits]);
    }

    #[test]
    fn test_pem_candidate_order() {
        assert_eq!(PEM_CANDIDATES[0].name(), "RSA-OAEP");
        assert_eq!(PEM_CANDIDATES[1].name(), "RSA-PSS");
        assert_eq!(PEM_CANDIDATES[4].curve(), Some(NamedCurve::P521));
    }
}
