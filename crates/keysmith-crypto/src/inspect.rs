//! Derive display properties from a loaded key.
//!
//! RSA and EC keys have two personalities each (RSA-OAEP/RSA-PSS,
//! ECDH/ECDSA). The label is chosen from the key's usages, so a key imported
//! with empty or mixed usages can be labelled differently from the
//! algorithm it is bound to.

use tracing::debug;

use keysmith_core::logging::{ALGORITHM, KIND, OPERATION, SUBSYSTEM};
use keysmith_core::{CryptoProvider, KeyHandle, KeyKind, KeyProperties, KeyUsage, LoadedKey, PgpKeyObject, Result};

use crate::components::{export_components, KeyComponents};
use crate::detect::{PRIVATE_USAGES, PUBLIC_USAGES};

const SIGNING: [KeyUsage; 2] = [KeyUsage::Sign, KeyUsage::Verify];
const ENCRYPTION: [KeyUsage; 2] = [KeyUsage::Encrypt, KeyUsage::Decrypt];
const DERIVATION: [KeyUsage; 2] = [KeyUsage::DeriveKey, KeyUsage::DeriveBits];

/// Properties of either key representation.
pub async fn inspect(provider: &dyn CryptoProvider, key: &LoadedKey) -> Result<KeyProperties> {
    let properties = match key {
        LoadedKey::Pgp(pgp_key) => inspect_pgp(pgp_key),
        LoadedKey::Provider(handle) => inspect_handle(provider, handle).await?,
    };
    debug!(
        { SUBSYSTEM } = "inspector",
        { OPERATION } = "inspect",
        { KIND } = %properties.key_type,
        { ALGORITHM } = %properties.algorithm,
        size = %properties.size,
        "Inspected key"
    );
    Ok(properties)
}

pub fn inspect_pgp(key: &PgpKeyObject) -> KeyProperties {
    let size = match (key.bits, &key.curve) {
        (Some(bits), _) => format!("{} bits", bits),
        (None, Some(curve)) => curve.clone(),
        (None, None) => "N/A".to_string(),
    };
    let (key_type, usages) = if key.is_private {
        (KeyKind::Private, PRIVATE_USAGES)
    } else {
        (KeyKind::Public, PUBLIC_USAGES)
    };
    KeyProperties {
        key_type,
        algorithm: format!("PGP/{}", key.algorithm.to_uppercase()),
        size,
        usages: usages.into_iter().collect(),
        extractable: true,
    }
}

pub async fn inspect_handle(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<KeyProperties> {
    let components = export_components(provider, key).await?;
    let descriptor = key.algorithm();

    let (algorithm, size) = match &components {
        KeyComponents::Rsa(rsa) => {
            let mut label = if key.has_any_usage(&SIGNING) {
                "RSA-PSS"
            } else if key.has_any_usage(&ENCRYPTION) {
                "RSA-OAEP"
            } else {
                descriptor.name()
            }
            .to_string();
            if let Some(hash) = descriptor.hash() {
                label.push_str(&format!(" ({})", hash));
            }
            (label, format!("{} bits", rsa.modulus_bits()))
        }
        KeyComponents::Ec(ec) => {
            let label = if key.has_any_usage(&SIGNING) {
                "ECDSA"
            } else if key.has_any_usage(&DERIVATION) {
                "ECDH"
            } else {
                descriptor.name()
            };
            (label.to_string(), ec.curve.jwk_name().to_string())
        }
        KeyComponents::Symmetric { k } => (
            descriptor.name().to_string(),
            format!("{} bits", k.len() * 8),
        ),
    };

    Ok(KeyProperties {
        key_type: key.kind(),
        algorithm,
        size,
        usages: key.usages().clone(),
        extractable: key.extractable(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pgp_key(is_private: bool, bits: Option<usize>, curve: Option<&str>) -> PgpKeyObject {
        PgpKeyObject {
            is_private,
            algorithm: "eddsa".into(),
            bits,
            curve: curve.map(String::from),
            key_id: "ABCDEF0123456789".into(),
            armored: String::new(),
        }
    }

    #[test]
    fn test_pgp_private_with_bits() {
        let props = inspect_pgp(&pgp_key(true, Some(4096), None));
        assert_eq!(props.key_type, KeyKind::Private);
        assert_eq!(props.algorithm, "PGP/EDDSA");
        assert_eq!(props.size, "4096 bits");
        assert!(props.usages.contains(&KeyUsage::Sign));
        assert!(props.usages.contains(&KeyUsage::Decrypt));
        assert!(props.extractable);
    }

    #[test]
    fn test_pgp_public_curve_label() {
        let props = inspect_pgp(&pgp_key(false, None, Some("curve25519")));
        assert_eq!(props.key_type, KeyKind::Public);
        assert_eq!(props.size, "curve25519");
        assert!(props.usages.contains(&KeyUsage::Verify));
    }

    #[test]
    fn test_pgp_size_unknown() {
        assert_eq!(inspect_pgp(&pgp_key(false, None, None)).size, "N/A");
    }
}
