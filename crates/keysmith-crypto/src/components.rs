//! Key material adapter: provider handles to and from numeric components.
//!
//! Components travel through the provider's JWK export/import, so this
//! module performs no cryptography. It decodes the JWK members and enforces
//! that private members appear exactly when the key is private.

use std::fmt;

use rsa::BigUint;
use tracing::trace;
use zeroize::Zeroizing;

use keysmith_core::logging::{KIND, OPERATION, SUBSYSTEM};
use keysmith_core::{
    AlgorithmDescriptor, Error, ExportForm, HashAlg, ImportMaterial, Jwk, KeyFamily, KeyHandle,
    KeyKind, KeyUsage, NamedCurve, Result,
};
use keysmith_core::CryptoProvider;

use crate::encoding::{base64url_decode, base64url_encode};

type Secret = Zeroizing<Vec<u8>>;

/// Private RSA members, unsigned big-endian.
#[derive(Clone)]
pub struct RsaPrivateComponents {
    pub d: Secret,
    pub p: Secret,
    pub q: Secret,
    pub dp: Secret,
    pub dq: Secret,
    pub qi: Secret,
}

#[derive(Clone)]
pub struct RsaComponents {
    pub n: Vec<u8>,
    pub e: Vec<u8>,
    pub private: Option<RsaPrivateComponents>,
}

impl RsaComponents {
    /// Modulus size in bits.
    pub fn modulus_bits(&self) -> usize {
        bit_length(&self.n)
    }

    /// Build private components from the fields SSH containers carry
    /// (`n, e, d, iqmp, p, q`), deriving the CRT exponents.
    pub fn from_ssh_private(
        n: &[u8],
        e: &[u8],
        d: &[u8],
        iqmp: &[u8],
        p: &[u8],
        q: &[u8],
    ) -> Result<Self> {
        let one = BigUint::from(1u32);
        let d_int = BigUint::from_bytes_be(d);
        let p_int = BigUint::from_bytes_be(p);
        let q_int = BigUint::from_bytes_be(q);
        if p_int <= one || q_int <= one {
            return Err(Error::malformed("RSA prime factor out of range"));
        }
        let dp = &d_int % (&p_int - &one);
        let dq = &d_int % (&q_int - &one);

        Ok(Self {
            n: n.to_vec(),
            e: e.to_vec(),
            private: Some(RsaPrivateComponents {
                d: Zeroizing::new(d.to_vec()),
                p: Zeroizing::new(p.to_vec()),
                q: Zeroizing::new(q.to_vec()),
                dp: Zeroizing::new(dp.to_bytes_be()),
                dq: Zeroizing::new(dq.to_bytes_be()),
                qi: Zeroizing::new(iqmp.to_vec()),
            }),
        })
    }
}

#[derive(Clone)]
pub struct EcComponents {
    pub curve: NamedCurve,
    /// Affine X, left-padded to the field size.
    pub x: Vec<u8>,
    /// Affine Y, left-padded to the field size.
    pub y: Vec<u8>,
    /// Private scalar, left-padded to the field size.
    pub d: Option<Secret>,
}

impl EcComponents {
    /// Build from an uncompressed SEC1 point `0x04 ‖ X ‖ Y`.
    pub fn from_uncompressed_point(
        curve: NamedCurve,
        point: &[u8],
        d: Option<&[u8]>,
    ) -> Result<Self> {
        let size = curve.field_size();
        if point.len() != 1 + 2 * size || point[0] != 0x04 {
            return Err(Error::malformed(format!(
                "expected uncompressed {} point of {} bytes, got {}",
                curve,
                1 + 2 * size,
                point.len()
            )));
        }
        let d = d
            .map(|d| left_pad(d, size, "d").map(Zeroizing::new))
            .transpose()?;
        Ok(Self {
            curve,
            x: point[1..=size].to_vec(),
            y: point[1 + size..].to_vec(),
            d,
        })
    }

    /// Uncompressed SEC1 point `0x04 ‖ X ‖ Y`.
    pub fn uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(0x04);
        point.extend_from_slice(&self.x);
        point.extend_from_slice(&self.y);
        point
    }
}

/// Numeric components of a key, decoded from its JWK form.
#[derive(Clone)]
pub enum KeyComponents {
    Rsa(RsaComponents),
    Ec(EcComponents),
    Symmetric { k: Secret },
}

impl fmt::Debug for KeyComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa(rsa) => f
                .debug_struct("Rsa")
                .field("bits", &rsa.modulus_bits())
                .field("private", &rsa.private.is_some())
                .finish(),
            Self::Ec(ec) => f
                .debug_struct("Ec")
                .field("curve", &ec.curve)
                .field("private", &ec.d.is_some())
                .finish(),
            Self::Symmetric { k } => f.debug_struct("Symmetric").field("len", &k.len()).finish(),
        }
    }
}

impl KeyComponents {
    pub fn family(&self) -> KeyFamily {
        match self {
            Self::Rsa(_) => KeyFamily::Rsa,
            Self::Ec(_) => KeyFamily::Ec,
            Self::Symmetric { .. } => KeyFamily::Symmetric,
        }
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Rsa(RsaComponents { private: Some(_), .. })
            | Self::Ec(EcComponents { d: Some(_), .. }) => KeyKind::Private,
            Self::Rsa(_) | Self::Ec(_) => KeyKind::Public,
            Self::Symmetric { .. } => KeyKind::Secret,
        }
    }

    /// Decode a JWK and check it against the expected key kind.
    pub fn from_jwk(jwk: &Jwk, kind: KeyKind) -> Result<Self> {
        let components = match jwk.kty.as_str() {
            "RSA" => {
                let private = if jwk.d.is_some() {
                    Some(RsaPrivateComponents {
                        d: secret_member(jwk.d.as_deref(), "d")?,
                        p: secret_member(jwk.p.as_deref(), "p")?,
                        q: secret_member(jwk.q.as_deref(), "q")?,
                        dp: secret_member(jwk.dp.as_deref(), "dp")?,
                        dq: secret_member(jwk.dq.as_deref(), "dq")?,
                        qi: secret_member(jwk.qi.as_deref(), "qi")?,
                    })
                } else {
                    let stray = [
                        ("p", &jwk.p),
                        ("q", &jwk.q),
                        ("dp", &jwk.dp),
                        ("dq", &jwk.dq),
                        ("qi", &jwk.qi),
                    ]
                    .into_iter()
                    .find(|(_, value)| value.is_some());
                    if let Some((name, _)) = stray {
                        return Err(Error::malformed(format!(
                            "RSA JWK has private member {} without d",
                            name
                        )));
                    }
                    None
                };
                Self::Rsa(RsaComponents {
                    n: member(jwk.n.as_deref(), "n")?,
                    e: member(jwk.e.as_deref(), "e")?,
                    private,
                })
            }
            "EC" => {
                let crv = jwk
                    .crv
                    .as_deref()
                    .ok_or_else(|| Error::malformed("EC JWK is missing crv"))?;
                let curve: NamedCurve = crv
                    .parse()
                    .map_err(|_| Error::malformed(format!("unsupported curve {}", crv)))?;
                let size = curve.field_size();
                let d = jwk
                    .d
                    .as_deref()
                    .map(|d| {
                        let bytes = Zeroizing::new(base64url_decode(d)?);
                        left_pad(&bytes, size, "d").map(Zeroizing::new)
                    })
                    .transpose()?;
                Self::Ec(EcComponents {
                    curve,
                    x: left_pad(&member(jwk.x.as_deref(), "x")?, size, "x")?,
                    y: left_pad(&member(jwk.y.as_deref(), "y")?, size, "y")?,
                    d,
                })
            }
            "oct" => Self::Symmetric {
                k: secret_member(jwk.k.as_deref(), "k")?,
            },
            other => return Err(Error::unsupported_key_type(format!("JWK kty {}", other))),
        };

        let actual = components.kind();
        if actual != kind {
            return Err(Error::malformed(format!(
                "JWK members describe a {} key but the handle is {}",
                actual, kind
            )));
        }
        Ok(components)
    }

    /// Encode as a JWK with no `alg`, `key_ops`, or `ext`.
    pub fn to_jwk(&self) -> Jwk {
        match self {
            Self::Rsa(rsa) => {
                let mut jwk = Jwk {
                    kty: "RSA".into(),
                    n: Some(base64url_encode(&rsa.n)),
                    e: Some(base64url_encode(&rsa.e)),
                    ..Default::default()
                };
                if let Some(private) = &rsa.private {
                    jwk.d = Some(base64url_encode(&private.d));
                    jwk.p = Some(base64url_encode(&private.p));
                    jwk.q = Some(base64url_encode(&private.q));
                    jwk.dp = Some(base64url_encode(&private.dp));
                    jwk.dq = Some(base64url_encode(&private.dq));
                    jwk.qi = Some(base64url_encode(&private.qi));
                }
                jwk
            }
            Self::Ec(ec) => Jwk {
                kty: "EC".into(),
                crv: Some(ec.curve.jwk_name().into()),
                x: Some(base64url_encode(&ec.x)),
                y: Some(base64url_encode(&ec.y)),
                d: ec.d.as_ref().map(|d| base64url_encode(d)),
                ..Default::default()
            },
            Self::Symmetric { k } => Jwk {
                kty: "oct".into(),
                k: Some(base64url_encode(k)),
                ..Default::default()
            },
        }
    }
}

/// Export a handle's components through the provider's JWK export.
pub async fn export_components(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
) -> Result<KeyComponents> {
    let jwk = provider.export_key(key, ExportForm::Jwk).await?.into_jwk()?;
    let components = KeyComponents::from_jwk(&jwk, key.kind())?;
    trace!(
        { SUBSYSTEM } = "codec",
        { OPERATION } = "export_components",
        { KIND } = %key.kind(),
        "Decoded key components"
    );
    Ok(components)
}

/// Import components through the provider's JWK import.
pub async fn import_components(
    provider: &dyn CryptoProvider,
    components: &KeyComponents,
    algorithm: &AlgorithmDescriptor,
    extractable: bool,
    usages: &[KeyUsage],
) -> Result<KeyHandle> {
    let jwk = components.to_jwk();
    provider
        .import_key(ImportMaterial::Jwk(&jwk), algorithm, extractable, usages)
        .await
}

/// Algorithm to re-import asymmetric components under, chosen from usages.
///
/// RSA maps to RSA-PSS when the usages include signing and RSA-OAEP
/// otherwise. EC maps to ECDH only for derivation-only usages. Symmetric
/// material has no usage-driven choice and yields `None`.
pub fn descriptor_for_usages(
    components: &KeyComponents,
    usages: &[KeyUsage],
    hash: HashAlg,
) -> Option<AlgorithmDescriptor> {
    let signs = usages
        .iter()
        .any(|u| matches!(u, KeyUsage::Sign | KeyUsage::Verify));
    match components {
        KeyComponents::Rsa(_) if signs => Some(AlgorithmDescriptor::RsaPss { hash }),
        KeyComponents::Rsa(_) => Some(AlgorithmDescriptor::RsaOaep { hash }),
        KeyComponents::Ec(ec) => {
            let derives = usages
                .iter()
                .any(|u| matches!(u, KeyUsage::DeriveKey | KeyUsage::DeriveBits));
            if derives && !signs {
                Some(AlgorithmDescriptor::Ecdh { curve: ec.curve })
            } else {
                Some(AlgorithmDescriptor::Ecdsa { curve: ec.curve })
            }
        }
        KeyComponents::Symmetric { .. } => None,
    }
}

/// Bit length of an unsigned big-endian magnitude.
pub fn bit_length(magnitude: &[u8]) -> usize {
    match magnitude.iter().position(|&b| b != 0) {
        Some(i) => (magnitude.len() - i - 1) * 8 + (8 - magnitude[i].leading_zeros() as usize),
        None => 0,
    }
}

fn member(value: Option<&str>, name: &str) -> Result<Vec<u8>> {
    let text = value.ok_or_else(|| Error::malformed(format!("JWK is missing {}", name)))?;
    base64url_decode(text)
}

fn secret_member(value: Option<&str>, name: &str) -> Result<Secret> {
    member(value, name).map(Zeroizing::new)
}

fn left_pad(bytes: &[u8], size: usize, name: &str) -> Result<Vec<u8>> {
    if bytes.len() > size {
        return Err(Error::malformed(format!(
            "{} is {} bytes, longer than the {}-byte field",
            name,
            bytes.len(),
            size
        )));
    }
    let mut out = vec![0u8; size - bytes.len()];
    out.extend_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ec_jwk(d: Option<&str>) -> Jwk {
        Jwk {
            kty: "EC".into(),
            crv: Some("P-256".into()),
            x: Some(base64url_encode(&[1u8; 32])),
            y: Some(base64url_encode(&[2u8; 32])),
            d: d.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(&[0x01]), 1);
        assert_eq!(bit_length(&[0x80, 0x00]), 16);
        assert_eq!(bit_length(&[0x00, 0x7f]), 7);
        assert_eq!(bit_length(&[]), 0);
    }

    #[test]
    fn test_ec_public_components() {
        let components = KeyComponents::from_jwk(&ec_jwk(None), KeyKind::Public).unwrap();
        assert_eq!(components.kind(), KeyKind::Public);
        match components {
            KeyComponents::Ec(ec) => {
                assert_eq!(ec.curve, NamedCurve::P256);
                let point = ec.uncompressed_point();
                assert_eq!(point.len(), 65);
                assert_eq!(point[0], 0x04);
            }
            other => panic!("expected EC, got {:?}", other),
        }
    }

    #[test]
    fn test_private_member_on_public_handle_is_malformed() {
        let jwk = ec_jwk(Some(&base64url_encode(&[3u8; 32])));
        let err = KeyComponents::from_jwk(&jwk, KeyKind::Public).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn test_missing_public_member_is_malformed() {
        let mut jwk = ec_jwk(None);
        jwk.y = None;
        let err = KeyComponents::from_jwk(&jwk, KeyKind::Public).unwrap_err();
        assert!(matches!(err, Error::MalformedContainer(_)));
    }

    #[test]
    fn test_rsa_private_requires_crt_members() {
        let jwk = Jwk {
            kty: "RSA".into(),
            n: Some("AQAB".into()),
            e: Some("AQAB".into()),
            d: Some("AQAB".into()),
            ..Default::default()
        };
        assert!(KeyComponents::from_jwk(&jwk, KeyKind::Private).is_err());
    }

    #[test]
    fn test_rsa_crt_members_without_d_are_malformed() {
        let jwk = Jwk {
            kty: "RSA".into(),
            n: Some("AQAB".into()),
            e: Some("AQAB".into()),
            p: Some("AQAB".into()),
            q: Some("AQAB".into()),
            dp: Some("AQAB".into()),
            ..Default::default()
        };
        for kind in [KeyKind::Public, KeyKind::Private] {
            let err = KeyComponents::from_jwk(&jwk, kind).unwrap_err();
            assert!(matches!(err, Error::MalformedContainer(_)), "{:?}", err);
        }

        let qi_only = Jwk {
            qi: Some("AQAB".into()),
            p: None,
            q: None,
            dp: None,
            ..jwk
        };
        let err = KeyComponents::from_jwk(&qi_only, KeyKind::Public).unwrap_err();
        assert!(err.to_string().contains("qi"), "{}", err);
    }

    #[test]
    fn test_unknown_kty() {
        let jwk = Jwk {
            kty: "OKP".into(),
            ..Default::default()
        };
        let err = KeyComponents::from_jwk(&jwk, KeyKind::Public).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKeyType { .. }));
    }

    #[test]
    fn test_ec_coordinates_left_padded() {
        let mut jwk = ec_jwk(None);
        jwk.x = Some(base64url_encode(&[9u8; 31]));
        let components = KeyComponents::from_jwk(&jwk, KeyKind::Public).unwrap();
        let KeyComponents::Ec(ec) = components else {
            panic!("expected EC");
        };
        assert_eq!(ec.x.len(), 32);
        assert_eq!(ec.x[0], 0);
    }

    #[test]
    fn test_jwk_roundtrip_symmetric() {
        let jwk = Jwk {
            kty: "oct".into(),
            k: Some(base64url_encode(&[7u8; 16])),
            ..Default::default()
        };
        let components = KeyComponents::from_jwk(&jwk, KeyKind::Secret).unwrap();
        assert_eq!(components.to_jwk(), jwk);
    }

    #[test]
    fn test_descriptor_for_usages() {
        let rsa = KeyComponents::Rsa(RsaComponents {
            n: vec![0xc5; 256],
            e: vec![1, 0, 1],
            private: None,
        });
        let ec = KeyComponents::from_jwk(&ec_jwk(None), KeyKind::Public).unwrap();

        assert_eq!(
            descriptor_for_usages(&rsa, &[KeyUsage::Decrypt, KeyUsage::Sign], HashAlg::Sha256),
            Some(AlgorithmDescriptor::RsaPss {
                hash: HashAlg::Sha256
            })
        );
        assert_eq!(
            descriptor_for_usages(&rsa, &[KeyUsage::Encrypt], HashAlg::Sha384),
            Some(AlgorithmDescriptor::RsaOaep {
                hash: HashAlg::Sha384
            })
        );
        assert_eq!(
            descriptor_for_usages(&ec, &[KeyUsage::DeriveBits], HashAlg::Sha256),
            Some(AlgorithmDescriptor::Ecdh {
                curve: NamedCurve::P256
            })
        );
        assert_eq!(
            descriptor_for_usages(&ec, &[KeyUsage::Encrypt, KeyUsage::Verify], HashAlg::Sha256),
            Some(AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P256
            })
        );
        let secret = KeyComponents::from_jwk(
            &Jwk {
                kty: "oct".into(),
                k: Some(base64url_encode(&[7u8; 16])),
                ..Default::default()
            },
            KeyKind::Secret,
        )
        .unwrap();
        assert_eq!(descriptor_for_usages(&secret, &[KeyUsage::Encrypt], HashAlg::Sha256), None);
    }

    #[test]
    fn test_rsa_from_ssh_derives_crt_exponents() {
        // Toy key: p = 61, q = 53, n = 3233, e = 17, d = 2753, iqmp = q^-1 mod p = 38
        let rsa = RsaComponents::from_ssh_private(
            &3233u32.to_be_bytes(),
            &[17],
            &2753u32.to_be_bytes(),
            &[38],
            &[61],
            &[53],
        )
        .unwrap();
        let private = rsa.private.as_ref().unwrap();
        assert_eq!(private.dp.as_slice(), &[53]); // 2753 mod 60
        assert_eq!(private.dq.as_slice(), &[49]); // 2753 mod 52
        assert_eq!(rsa.modulus_bits(), 12);
    }
}
