//! In-process provider backed by RustCrypto crates.
//!
//! Key material lives inside the [`KeyHandle`] as a private [`SoftwareKey`]
//! payload. Secret buffers are zeroized on drop.
//!
//! Usage sets are recorded but not validated at import: any usage list is
//! accepted for any algorithm, which lets the sniffer attach its fixed
//! per-branch usage sets. Operations do check that the handle carries the
//! usage they perform.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::Digest;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

use keysmith_core::defaults::{
    AES_KEY_BITS, CBC_IV_LENGTH, CTR_COUNTER_LENGTH, GCM_IV_LENGTH, RSA_PUBLIC_EXPONENT,
};
use keysmith_core::logging::{ALGORITHM, COMPONENT, KIND, OPERATION, SUBSYSTEM};
use keysmith_core::{
    AesMode, AlgorithmDescriptor, CipherParams, CryptoProvider, Error, ExportForm, ExportedKey,
    GeneratedKey, HashAlg, ImportMaterial, Jwk, KeyFamily, KeyGenParams, KeyHandle, KeyKind,
    KeyPair, KeyUsage, NamedCurve, Result, SignatureParams,
};

use crate::encoding::{base64url_decode, base64url_encode};

/// Usages that belong on the public half of a generated pair.
const PUBLIC_USAGES: [KeyUsage; 3] = [KeyUsage::Encrypt, KeyUsage::Verify, KeyUsage::WrapKey];

/// Provider payload stored in every handle this provider creates.
enum SoftwareKey {
    RsaPrivate(Box<RsaPrivateKey>),
    RsaPublic(RsaPublicKey),
    EcPrivate {
        curve: NamedCurve,
        secret: Zeroizing<Vec<u8>>,
        public: Vec<u8>,
    },
    EcPublic {
        curve: NamedCurve,
        /// Uncompressed SEC1 point.
        public: Vec<u8>,
    },
    Secret(Zeroizing<Vec<u8>>),
}

/// Software implementation of [`CryptoProvider`].
#[derive(Debug, Clone, Default)]
pub struct SoftwareProvider {
    _private: (),
}

impl SoftwareProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

fn payload(key: &KeyHandle) -> Result<&SoftwareKey> {
    key.material::<SoftwareKey>().ok_or_else(|| {
        Error::ProviderRejected("key handle was not created by the software provider".into())
    })
}

fn reject<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> Error {
    move |e| Error::ProviderRejected(format!("{}: {}", context, e))
}

fn require_usage(key: &KeyHandle, usage: KeyUsage) -> Result<()> {
    if key.usages().contains(&usage) {
        Ok(())
    } else {
        Err(Error::ProviderRejected(format!(
            "key usages do not permit {}",
            usage
        )))
    }
}

fn split_usages(usages: &[KeyUsage]) -> (Vec<KeyUsage>, Vec<KeyUsage>) {
    usages
        .iter()
        .copied()
        .partition(|u| PUBLIC_USAGES.contains(u))
}

// =============================================================================
// PER-ALGORITHM DISPATCH
// =============================================================================

macro_rules! with_hash {
    ($hash:expr, $h:ident => $body:expr) => {
        match $hash {
            HashAlg::Sha256 => {
                type $h = sha2::Sha256;
                $body
            }
            HashAlg::Sha384 => {
                type $h = sha2::Sha384;
                $body
            }
            HashAlg::Sha512 => {
                type $h = sha2::Sha512;
                $body
            }
        }
    };
}

macro_rules! with_curve {
    ($curve:expr, $ec:ident => $body:expr) => {
        match $curve {
            NamedCurve::P256 => {
                use p256 as $ec;
                $body
            }
            NamedCurve::P384 => {
                use p384 as $ec;
                $body
            }
            NamedCurve::P521 => {
                use p521 as $ec;
                $body
            }
        }
    };
}

macro_rules! with_aes {
    ($key:expr, $a:ident => $body:expr) => {
        match $key.len() {
            16 => {
                type $a = aes::Aes128;
                $body
            }
            24 => {
                type $a = aes::Aes192;
                $body
            }
            32 => {
                type $a = aes::Aes256;
                $body
            }
            n => Err(Error::ProviderRejected(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                n
            ))),
        }
    };
}

// ─── EC ────────────────────────────────────────────────────────────────────

/// Returns `(scalar, uncompressed point)`.
fn ec_generate(curve: NamedCurve) -> (Zeroizing<Vec<u8>>, Vec<u8>) {
    with_curve!(curve, ec => {
        let secret = ec::SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_sec1_bytes().into_vec();
        (Zeroizing::new(secret.to_bytes().to_vec()), public)
    })
}

/// Validate a SEC1 point and return it uncompressed.
fn ec_public_from_sec1(curve: NamedCurve, point: &[u8]) -> Result<Vec<u8>> {
    with_curve!(curve, ec => {
        let public = ec::PublicKey::from_sec1_bytes(point).map_err(reject("invalid EC point"))?;
        Ok(public.to_sec1_bytes().into_vec())
    })
}

/// Validate a scalar and derive its public point.
fn ec_secret_from_scalar(curve: NamedCurve, d: &[u8]) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    with_curve!(curve, ec => {
        let secret = ec::SecretKey::from_slice(d).map_err(reject("invalid EC scalar"))?;
        let public = secret.public_key().to_sec1_bytes().into_vec();
        Ok((Zeroizing::new(secret.to_bytes().to_vec()), public))
    })
}

fn ec_spki_import(curve: NamedCurve, der: &[u8]) -> Result<Vec<u8>> {
    with_curve!(curve, ec => {
        let public = ec::PublicKey::from_public_key_der(der).map_err(reject("not an EC SPKI for this curve"))?;
        Ok(public.to_sec1_bytes().into_vec())
    })
}

fn ec_spki_export(curve: NamedCurve, point: &[u8]) -> Result<Vec<u8>> {
    with_curve!(curve, ec => {
        let public = ec::PublicKey::from_sec1_bytes(point).map_err(reject("invalid EC point"))?;
        let der = public.to_public_key_der().map_err(reject("SPKI encoding failed"))?;
        Ok(der.as_bytes().to_vec())
    })
}

fn ec_pkcs8_import(curve: NamedCurve, der: &[u8]) -> Result<(Zeroizing<Vec<u8>>, Vec<u8>)> {
    with_curve!(curve, ec => {
        let secret = ec::SecretKey::from_pkcs8_der(der).map_err(reject("not an EC PKCS#8 key for this curve"))?;
        let public = secret.public_key().to_sec1_bytes().into_vec();
        Ok((Zeroizing::new(secret.to_bytes().to_vec()), public))
    })
}

fn ec_pkcs8_export(curve: NamedCurve, d: &[u8]) -> Result<Vec<u8>> {
    with_curve!(curve, ec => {
        let secret = ec::SecretKey::from_slice(d).map_err(reject("invalid EC scalar"))?;
        let der = secret.to_pkcs8_der().map_err(reject("PKCS#8 encoding failed"))?;
        Ok(der.as_bytes().to_vec())
    })
}

/// Digest of `data` as an ECDSA prehash for `curve`.
///
/// A digest shorter than the field is left-padded with zeros, which keeps
/// its integer value. This lets SHA-256 sign on P-521.
fn ecdsa_prehash(curve: NamedCurve, hash: HashAlg, data: &[u8]) -> Vec<u8> {
    let digest = with_hash!(hash, H => H::digest(data).to_vec());
    let field = curve.field_size();
    if digest.len() >= field {
        return digest;
    }
    let mut padded = vec![0u8; field - digest.len()];
    padded.extend_from_slice(&digest);
    padded
}

/// ECDSA over `hash(data)`, `r ‖ s` output.
fn ecdsa_sign(curve: NamedCurve, hash: HashAlg, d: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let prehash = ecdsa_prehash(curve, hash, data);
    with_curve!(curve, ec => {
        let key = ec::ecdsa::SigningKey::from_slice(d).map_err(reject("invalid EC scalar"))?;
        let signature: ec::ecdsa::Signature =
            key.sign_prehash(&prehash).map_err(reject("ECDSA signing failed"))?;
        Ok(signature.to_bytes().to_vec())
    })
}

fn ecdsa_verify(
    curve: NamedCurve,
    hash: HashAlg,
    point: &[u8],
    signature: &[u8],
    data: &[u8],
) -> Result<bool> {
    let prehash = ecdsa_prehash(curve, hash, data);
    with_curve!(curve, ec => {
        let key = ec::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(reject("invalid EC point"))?;
        let Ok(signature) = ec::ecdsa::Signature::from_slice(signature) else {
            return Ok(false);
        };
        Ok(key.verify_prehash(&prehash, &signature).is_ok())
    })
}

fn ec_jwk(curve: NamedCurve, point: &[u8], d: Option<&[u8]>) -> Jwk {
    let size = curve.field_size();
    Jwk {
        kty: "EC".into(),
        crv: Some(curve.jwk_name().into()),
        x: point.get(1..=size).map(base64url_encode),
        y: point.get(1 + size..).map(base64url_encode),
        d: d.map(base64url_encode),
        ..Default::default()
    }
}

// ─── RSA ───────────────────────────────────────────────────────────────────

fn rsa_public_jwk(key: &RsaPublicKey) -> Jwk {
    Jwk {
        kty: "RSA".into(),
        n: Some(base64url_encode(&key.n().to_bytes_be())),
        e: Some(base64url_encode(&key.e().to_bytes_be())),
        ..Default::default()
    }
}

fn rsa_private_jwk(key: &RsaPrivateKey) -> Result<Jwk> {
    let [p, q] = key.primes() else {
        return Err(Error::ProviderRejected(
            "multi-prime RSA keys cannot be exported as JWK".into(),
        ));
    };
    let one = BigUint::from(1u32);
    let dp = key.dp().cloned().unwrap_or_else(|| key.d() % (p - &one));
    let dq = key.dq().cloned().unwrap_or_else(|| key.d() % (q - &one));
    let qi = key
        .crt_coefficient()
        .ok_or_else(|| Error::ProviderRejected("RSA primes have no CRT coefficient".into()))?;

    let mut jwk = rsa_public_jwk(&key.to_public_key());
    jwk.d = Some(base64url_encode(&key.d().to_bytes_be()));
    jwk.p = Some(base64url_encode(&p.to_bytes_be()));
    jwk.q = Some(base64url_encode(&q.to_bytes_be()));
    jwk.dp = Some(base64url_encode(&dp.to_bytes_be()));
    jwk.dq = Some(base64url_encode(&dq.to_bytes_be()));
    jwk.qi = Some(base64url_encode(&qi.to_bytes_be()));
    Ok(jwk)
}

fn jwk_uint(value: Option<&str>, name: &str) -> Result<BigUint> {
    let text = value
        .ok_or_else(|| Error::ProviderRejected(format!("JWK is missing {}", name)))?;
    Ok(BigUint::from_bytes_be(&base64url_decode(text)?))
}

fn rsa_from_jwk(jwk: &Jwk) -> Result<SoftwareKey> {
    let n = jwk_uint(jwk.n.as_deref(), "n")?;
    let e = jwk_uint(jwk.e.as_deref(), "e")?;
    if jwk.d.is_none() {
        let key = RsaPublicKey::new(n, e).map_err(reject("invalid RSA public key"))?;
        return Ok(SoftwareKey::RsaPublic(key));
    }
    let d = jwk_uint(jwk.d.as_deref(), "d")?;
    let primes = match (jwk.p.as_deref(), jwk.q.as_deref()) {
        (Some(_), Some(_)) => vec![jwk_uint(jwk.p.as_deref(), "p")?, jwk_uint(jwk.q.as_deref(), "q")?],
        _ => Vec::new(),
    };
    let key = RsaPrivateKey::from_components(n, e, d, primes)
        .map_err(reject("invalid RSA private key"))?;
    Ok(SoftwareKey::RsaPrivate(Box::new(key)))
}

// ─── AES ───────────────────────────────────────────────────────────────────

fn aes_gcm(key: &[u8], iv: &[u8], data: &[u8], encrypt: bool) -> Result<Vec<u8>> {
    use aes_gcm::aead::consts::U12;
    use aes_gcm::aead::{Aead, KeyInit};

    if iv.len() != GCM_IV_LENGTH {
        return Err(Error::ProviderRejected(format!(
            "AES-GCM IV must be {} bytes, got {}",
            GCM_IV_LENGTH,
            iv.len()
        )));
    }
    with_aes!(key, A => {
        let cipher = aes_gcm::AesGcm::<A, U12>::new_from_slice(key).map_err(reject("AES-GCM key"))?;
        let nonce = aes_gcm::Nonce::<U12>::from_slice(iv);
        if encrypt {
            cipher.encrypt(nonce, data).map_err(reject("AES-GCM encryption failed"))
        } else {
            cipher.decrypt(nonce, data).map_err(reject("AES-GCM authentication failed"))
        }
    })
}

fn aes_cbc(key: &[u8], iv: &[u8], data: &[u8], encrypt: bool) -> Result<Vec<u8>> {
    use cbc::cipher::block_padding::Pkcs7;
    use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

    if iv.len() != CBC_IV_LENGTH {
        return Err(Error::ProviderRejected(format!(
            "AES-CBC IV must be {} bytes, got {}",
            CBC_IV_LENGTH,
            iv.len()
        )));
    }
    with_aes!(key, A => {
        if encrypt {
            let cipher = cbc::Encryptor::<A>::new_from_slices(key, iv).map_err(reject("AES-CBC key"))?;
            Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(data))
        } else {
            let cipher = cbc::Decryptor::<A>::new_from_slices(key, iv).map_err(reject("AES-CBC key"))?;
            cipher.decrypt_padded_vec_mut::<Pkcs7>(data).map_err(reject("AES-CBC padding"))
        }
    })
}

/// CTR is its own inverse.
fn aes_ctr(key: &[u8], counter: &[u8], length: u32, data: &[u8]) -> Result<Vec<u8>> {
    use ctr::cipher::{KeyIvInit, StreamCipher};

    if counter.len() != CTR_COUNTER_LENGTH {
        return Err(Error::ProviderRejected(format!(
            "AES-CTR counter block must be {} bytes, got {}",
            CTR_COUNTER_LENGTH,
            counter.len()
        )));
    }
    let mut buf = data.to_vec();
    macro_rules! apply {
        ($flavor:ident) => {
            with_aes!(key, A => {
                let mut cipher = ctr::$flavor::<A>::new_from_slices(key, counter)
                    .map_err(reject("AES-CTR key"))?;
                cipher.apply_keystream(&mut buf);
                Ok(())
            })
        };
    }
    let applied: Result<()> = match length {
        32 => apply!(Ctr32BE),
        64 => apply!(Ctr64BE),
        128 => apply!(Ctr128BE),
        other => Err(Error::ProviderRejected(format!(
            "AES-CTR counter length {} is not supported",
            other
        ))),
    };
    applied.map(|()| buf)
}

fn hmac_tag(hash: HashAlg, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    with_hash!(hash, H => {
        let mut mac = Hmac::<H>::new_from_slice(key).map_err(reject("HMAC key"))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    })
}

fn hmac_check(hash: HashAlg, key: &[u8], tag: &[u8], data: &[u8]) -> Result<bool> {
    with_hash!(hash, H => {
        let mut mac = Hmac::<H>::new_from_slice(key).map_err(reject("HMAC key"))?;
        mac.update(data);
        Ok(mac.verify_slice(tag).is_ok())
    })
}

// ─── JWK metadata ─────────────────────────────────────────────────────────

/// JWA `alg` value for a descriptor, when one exists.
fn jwk_alg(algorithm: &AlgorithmDescriptor) -> Option<String> {
    match algorithm {
        AlgorithmDescriptor::RsaOaep { hash } => Some(match hash {
            HashAlg::Sha256 => "RSA-OAEP-256".to_string(),
            HashAlg::Sha384 => "RSA-OAEP-384".to_string(),
            HashAlg::Sha512 => "RSA-OAEP-512".to_string(),
        }),
        AlgorithmDescriptor::RsaPss { hash } => Some(format!("PS{}", hash.bits())),
        AlgorithmDescriptor::Ecdsa { curve } => Some(format!("ES{}", curve.ecdsa_hash().bits())),
        AlgorithmDescriptor::Ecdh { .. } => None,
        AlgorithmDescriptor::Aes { mode, length } => Some(format!("A{}{}", length, mode.as_str())),
        AlgorithmDescriptor::Hmac { hash } => Some(format!("HS{}", hash.bits())),
    }
}

fn check_jwk_family(jwk: &Jwk, algorithm: &AlgorithmDescriptor) -> Result<()> {
    let expected = algorithm.family().kty();
    if jwk.kty != expected {
        return Err(Error::ProviderRejected(format!(
            "JWK kty {} does not match {}",
            jwk.kty,
            algorithm.name()
        )));
    }
    if let (Some(crv), Some(curve)) = (jwk.crv.as_deref(), algorithm.curve()) {
        if crv != curve.jwk_name() {
            return Err(Error::ProviderRejected(format!(
                "JWK curve {} does not match {}",
                crv, curve
            )));
        }
    }
    Ok(())
}

fn check_secret_length(algorithm: &AlgorithmDescriptor, secret: &[u8]) -> Result<()> {
    match algorithm {
        AlgorithmDescriptor::Aes { length, .. } if secret.len() * 8 != *length => {
            Err(Error::ProviderRejected(format!(
                "{} expects a {}-bit key, got {} bits",
                algorithm.name(),
                length,
                secret.len() * 8
            )))
        }
        AlgorithmDescriptor::Hmac { .. } if secret.is_empty() => {
            Err(Error::ProviderRejected("HMAC key is empty".into()))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// PROVIDER
// =============================================================================

#[async_trait]
impl CryptoProvider for SoftwareProvider {
    #[instrument(
        skip(self, params, usages),
        fields(subsystem = "provider", component = "software", op = "generate_key", algorithm = %params.algorithm)
    )]
    async fn generate_key(
        &self,
        params: &KeyGenParams,
        usages: &[KeyUsage],
        extractable: bool,
    ) -> Result<GeneratedKey> {
        let algorithm = params.algorithm;
        let generated = match algorithm {
            AlgorithmDescriptor::Aes { length, .. } => {
                if !AES_KEY_BITS.contains(&length) {
                    return Err(Error::ProviderRejected(format!(
                        "AES key length {} is not supported",
                        length
                    )));
                }
                let mut bytes = Zeroizing::new(vec![0u8; length / 8]);
                OsRng.fill_bytes(&mut bytes);
                GeneratedKey::Secret(KeyHandle::new(
                    KeyKind::Secret,
                    algorithm,
                    extractable,
                    usages.iter().copied(),
                    SoftwareKey::Secret(bytes),
                ))
            }
            AlgorithmDescriptor::Hmac { hash } => {
                let mut bytes = Zeroizing::new(vec![0u8; hash.block_size()]);
                OsRng.fill_bytes(&mut bytes);
                GeneratedKey::Secret(KeyHandle::new(
                    KeyKind::Secret,
                    algorithm,
                    extractable,
                    usages.iter().copied(),
                    SoftwareKey::Secret(bytes),
                ))
            }
            AlgorithmDescriptor::RsaOaep { .. } | AlgorithmDescriptor::RsaPss { .. } => {
                let bits = params.modulus_length.ok_or_else(|| {
                    Error::InvalidInput("RSA generation requires a modulus length".into())
                })?;
                let private = tokio::task::spawn_blocking(move || {
                    RsaPrivateKey::new_with_exp(
                        &mut OsRng,
                        bits,
                        &BigUint::from(RSA_PUBLIC_EXPONENT),
                    )
                })
                .await
                .map_err(reject("RSA generation task failed"))?
                .map_err(reject("RSA generation failed"))?;
                let public = private.to_public_key();
                let (public_usages, private_usages) = split_usages(usages);
                GeneratedKey::Pair(KeyPair {
                    public_key: KeyHandle::new(
                        KeyKind::Public,
                        algorithm,
                        true,
                        public_usages,
                        SoftwareKey::RsaPublic(public),
                    ),
                    private_key: KeyHandle::new(
                        KeyKind::Private,
                        algorithm,
                        extractable,
                        private_usages,
                        SoftwareKey::RsaPrivate(Box::new(private)),
                    ),
                })
            }
            AlgorithmDescriptor::Ecdsa { curve } | AlgorithmDescriptor::Ecdh { curve } => {
                let (secret, public) = ec_generate(curve);
                let (public_usages, private_usages) = split_usages(usages);
                GeneratedKey::Pair(KeyPair {
                    public_key: KeyHandle::new(
                        KeyKind::Public,
                        algorithm,
                        true,
                        public_usages,
                        SoftwareKey::EcPublic {
                            curve,
                            public: public.clone(),
                        },
                    ),
                    private_key: KeyHandle::new(
                        KeyKind::Private,
                        algorithm,
                        extractable,
                        private_usages,
                        SoftwareKey::EcPrivate {
                            curve,
                            secret,
                            public,
                        },
                    ),
                })
            }
        };
        debug!(
            { SUBSYSTEM } = "provider",
            { COMPONENT } = "software",
            { OPERATION } = "generate",
            { ALGORITHM } = %algorithm,
            "Generated key"
        );
        Ok(generated)
    }

    async fn export_key(&self, key: &KeyHandle, form: ExportForm) -> Result<ExportedKey> {
        if !key.extractable() {
            return Err(Error::ProviderRejected("key is not extractable".into()));
        }
        let mut exported = match (payload(key)?, form) {
            (SoftwareKey::Secret(bytes), ExportForm::Raw) => ExportedKey::Bytes(bytes.to_vec()),
            (SoftwareKey::Secret(bytes), ExportForm::Jwk) => ExportedKey::Jwk(Jwk {
                kty: "oct".into(),
                k: Some(base64url_encode(bytes)),
                ..Default::default()
            }),
            (SoftwareKey::RsaPublic(public), ExportForm::Spki) => ExportedKey::Bytes(
                public
                    .to_public_key_der()
                    .map_err(reject("SPKI encoding failed"))?
                    .as_bytes()
                    .to_vec(),
            ),
            (SoftwareKey::RsaPublic(public), ExportForm::Jwk) => {
                ExportedKey::Jwk(rsa_public_jwk(public))
            }
            (SoftwareKey::RsaPrivate(private), ExportForm::Pkcs8) => ExportedKey::Bytes(
                private
                    .to_pkcs8_der()
                    .map_err(reject("PKCS#8 encoding failed"))?
                    .as_bytes()
                    .to_vec(),
            ),
            (SoftwareKey::RsaPrivate(private), ExportForm::Jwk) => {
                ExportedKey::Jwk(rsa_private_jwk(private)?)
            }
            (SoftwareKey::EcPublic { curve, public }, ExportForm::Spki) => {
                ExportedKey::Bytes(ec_spki_export(*curve, public)?)
            }
            (SoftwareKey::EcPublic { curve, public }, ExportForm::Jwk) => {
                ExportedKey::Jwk(ec_jwk(*curve, public, None))
            }
            (SoftwareKey::EcPrivate { curve, secret, .. }, ExportForm::Pkcs8) => {
                ExportedKey::Bytes(ec_pkcs8_export(*curve, secret)?)
            }
            (
                SoftwareKey::EcPrivate {
                    curve,
                    secret,
                    public,
                },
                ExportForm::Jwk,
            ) => ExportedKey::Jwk(ec_jwk(*curve, public, Some(secret.as_slice()))),
            (_, form) => {
                return Err(Error::ProviderRejected(format!(
                    "{:?} export is not valid for a {} {} key",
                    form,
                    key.kind(),
                    key.algorithm().name()
                )))
            }
        };
        if let ExportedKey::Jwk(jwk) = &mut exported {
            jwk.alg = jwk_alg(key.algorithm());
            jwk.key_ops = Some(key.usages().iter().copied().collect());
            jwk.ext = Some(key.extractable());
        }
        Ok(exported)
    }

    #[instrument(
        skip(self, material, algorithm, usages),
        fields(subsystem = "provider", component = "software", op = "import_key", form = ?material.form(), algorithm = %algorithm)
    )]
    async fn import_key(
        &self,
        material: ImportMaterial<'_>,
        algorithm: &AlgorithmDescriptor,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<KeyHandle> {
        let payload = match (algorithm.family(), material) {
            (KeyFamily::Symmetric, ImportMaterial::Raw(bytes)) => {
                check_secret_length(algorithm, bytes)?;
                SoftwareKey::Secret(Zeroizing::new(bytes.to_vec()))
            }
            (KeyFamily::Symmetric, ImportMaterial::Jwk(jwk)) => {
                check_jwk_family(jwk, algorithm)?;
                let k = jwk
                    .k
                    .as_deref()
                    .ok_or_else(|| Error::ProviderRejected("oct JWK is missing k".into()))?;
                let bytes = Zeroizing::new(base64url_decode(k)?);
                check_secret_length(algorithm, &bytes)?;
                SoftwareKey::Secret(bytes)
            }
            (KeyFamily::Rsa, ImportMaterial::Spki(der)) => SoftwareKey::RsaPublic(
                RsaPublicKey::from_public_key_der(der).map_err(reject("not an RSA SPKI"))?,
            ),
            (KeyFamily::Rsa, ImportMaterial::Pkcs8(der)) => SoftwareKey::RsaPrivate(Box::new(
                RsaPrivateKey::from_pkcs8_der(der).map_err(reject("not an RSA PKCS#8 key"))?,
            )),
            (KeyFamily::Rsa, ImportMaterial::Jwk(jwk)) => {
                check_jwk_family(jwk, algorithm)?;
                rsa_from_jwk(jwk)?
            }
            (KeyFamily::Ec, material) => {
                let Some(curve) = algorithm.curve() else {
                    return Err(Error::ProviderRejected("EC import needs a curve".into()));
                };
                match material {
                    ImportMaterial::Spki(der) => SoftwareKey::EcPublic {
                        curve,
                        public: ec_spki_import(curve, der)?,
                    },
                    ImportMaterial::Pkcs8(der) => {
                        let (secret, public) = ec_pkcs8_import(curve, der)?;
                        SoftwareKey::EcPrivate {
                            curve,
                            secret,
                            public,
                        }
                    }
                    ImportMaterial::Jwk(jwk) => {
                        check_jwk_family(jwk, algorithm)?;
                        let size = curve.field_size();
                        let coordinate = |value: Option<&str>, name: &str| -> Result<Vec<u8>> {
                            let text = value.ok_or_else(|| {
                                Error::ProviderRejected(format!("EC JWK is missing {}", name))
                            })?;
                            let bytes = base64url_decode(text)?;
                            if bytes.len() != size {
                                return Err(Error::ProviderRejected(format!(
                                    "EC JWK {} must be {} bytes",
                                    name, size
                                )));
                            }
                            Ok(bytes)
                        };
                        let mut point = vec![0x04];
                        point.extend(coordinate(jwk.x.as_deref(), "x")?);
                        point.extend(coordinate(jwk.y.as_deref(), "y")?);
                        let public = ec_public_from_sec1(curve, &point)?;
                        match jwk.d.as_deref() {
                            None => SoftwareKey::EcPublic { curve, public },
                            Some(d) => {
                                let d = Zeroizing::new(base64url_decode(d)?);
                                let (secret, derived) = ec_secret_from_scalar(curve, &d)?;
                                if derived != public {
                                    return Err(Error::ProviderRejected(
                                        "EC JWK d does not match x/y".into(),
                                    ));
                                }
                                SoftwareKey::EcPrivate {
                                    curve,
                                    secret,
                                    public,
                                }
                            }
                        }
                    }
                    ImportMaterial::Raw(_) => {
                        return Err(Error::ProviderRejected(
                            "raw import is not supported for EC keys".into(),
                        ))
                    }
                }
            }
            (family, material) => {
                return Err(Error::ProviderRejected(format!(
                    "{:?} import is not valid for {} keys",
                    material.form(),
                    family.kty()
                )))
            }
        };

        let kind = match &payload {
            SoftwareKey::RsaPublic(_) | SoftwareKey::EcPublic { .. } => KeyKind::Public,
            SoftwareKey::RsaPrivate(_) | SoftwareKey::EcPrivate { .. } => KeyKind::Private,
            SoftwareKey::Secret(_) => KeyKind::Secret,
        };
        debug!(
            { SUBSYSTEM } = "provider",
            { COMPONENT } = "software",
            { OPERATION } = "import",
            { KIND } = %kind,
            "Imported key"
        );
        Ok(KeyHandle::new(
            kind,
            *algorithm,
            extractable,
            usages.iter().copied(),
            payload,
        ))
    }

    async fn sign(
        &self,
        key: &KeyHandle,
        params: &SignatureParams,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Sign)?;
        match (key.algorithm(), params, payload(key)?) {
            (
                AlgorithmDescriptor::RsaPss { hash },
                SignatureParams::RsaPss { salt_length },
                SoftwareKey::RsaPrivate(private),
            ) => with_hash!(*hash, H => {
                let digest = H::digest(data);
                private
                    .sign_with_rng(&mut OsRng, Pss::new_with_salt::<H>(*salt_length), &digest)
                    .map_err(reject("RSA-PSS signing failed"))
            }),
            (
                AlgorithmDescriptor::Ecdsa { curve },
                SignatureParams::Ecdsa { hash },
                SoftwareKey::EcPrivate { secret, .. },
            ) => ecdsa_sign(*curve, *hash, secret, data),
            (AlgorithmDescriptor::Hmac { hash }, SignatureParams::Hmac, SoftwareKey::Secret(k)) => {
                hmac_tag(*hash, k, data)
            }
            _ => Err(Error::ProviderRejected(format!(
                "{:?} signing is not valid for a {} {} key",
                params,
                key.kind(),
                key.algorithm().name()
            ))),
        }
    }

    async fn verify(
        &self,
        key: &KeyHandle,
        params: &SignatureParams,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool> {
        require_usage(key, KeyUsage::Verify)?;
        match (key.algorithm(), params, payload(key)?) {
            (
                AlgorithmDescriptor::RsaPss { hash },
                SignatureParams::RsaPss { salt_length },
                SoftwareKey::RsaPublic(public),
            ) => with_hash!(*hash, H => {
                let digest = H::digest(data);
                Ok(public
                    .verify(Pss::new_with_salt::<H>(*salt_length), &digest, signature)
                    .is_ok())
            }),
            (
                AlgorithmDescriptor::Ecdsa { curve },
                SignatureParams::Ecdsa { hash },
                SoftwareKey::EcPublic { public, .. },
            ) => ecdsa_verify(*curve, *hash, public, signature, data),
            (AlgorithmDescriptor::Hmac { hash }, SignatureParams::Hmac, SoftwareKey::Secret(k)) => {
                hmac_check(*hash, k, signature, data)
            }
            _ => Err(Error::ProviderRejected(format!(
                "{:?} verification is not valid for a {} {} key",
                params,
                key.kind(),
                key.algorithm().name()
            ))),
        }
    }

    async fn encrypt(
        &self,
        key: &KeyHandle,
        params: &CipherParams,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Encrypt)?;
        match (key.algorithm(), params, payload(key)?) {
            (
                AlgorithmDescriptor::RsaOaep { hash },
                CipherParams::RsaOaep,
                SoftwareKey::RsaPublic(public),
            ) => with_hash!(*hash, H => {
                public
                    .encrypt(&mut OsRng, Oaep::new::<H>(), data)
                    .map_err(reject("RSA-OAEP encryption failed"))
            }),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Gcm, ..
                },
                CipherParams::AesGcm { iv },
                SoftwareKey::Secret(k),
            ) => aes_gcm(k, iv, data, true),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Cbc, ..
                },
                CipherParams::AesCbc { iv },
                SoftwareKey::Secret(k),
            ) => aes_cbc(k, iv, data, true),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Ctr, ..
                },
                CipherParams::AesCtr { counter, length },
                SoftwareKey::Secret(k),
            ) => aes_ctr(k, counter, *length, data),
            _ => Err(Error::ProviderRejected(format!(
                "{:?} encryption is not valid for a {} {} key",
                params,
                key.kind(),
                key.algorithm().name()
            ))),
        }
    }

    async fn decrypt(
        &self,
        key: &KeyHandle,
        params: &CipherParams,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        require_usage(key, KeyUsage::Decrypt)?;
        match (key.algorithm(), params, payload(key)?) {
            (
                AlgorithmDescriptor::RsaOaep { hash },
                CipherParams::RsaOaep,
                SoftwareKey::RsaPrivate(private),
            ) => with_hash!(*hash, H => {
                private
                    .decrypt(Oaep::new::<H>(), data)
                    .map_err(reject("RSA-OAEP decryption failed"))
            }),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Gcm, ..
                },
                CipherParams::AesGcm { iv },
                SoftwareKey::Secret(k),
            ) => aes_gcm(k, iv, data, false),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Cbc, ..
                },
                CipherParams::AesCbc { iv },
                SoftwareKey::Secret(k),
            ) => aes_cbc(k, iv, data, false),
            (
                AlgorithmDescriptor::Aes {
                    mode: AesMode::Ctr, ..
                },
                CipherParams::AesCtr { counter, length },
                SoftwareKey::Secret(k),
            ) => aes_ctr(k, counter, *length, data),
            _ => Err(Error::ProviderRejected(format!(
                "{:?} decryption is not valid for a {} {} key",
                params,
                key.kind(),
                key.algorithm().name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{base64_decode, pem_unwrap};

    const RSA_PKCS8: &str = include_str!("../../tests/fixtures/rsa2048_pkcs8.pem");
    const RSA_SPKI: &str = include_str!("../../tests/fixtures/rsa2048_spki.pem");
    const P384_PKCS8: &str = include_str!("../../tests/fixtures/ec_p384_pkcs8.pem");
    const P384_SPKI: &str = include_str!("../../tests/fixtures/ec_p384_spki.pem");

    fn der(pem: &str) -> Vec<u8> {
        base64_decode(&pem_unwrap(pem)).unwrap()
    }

    async fn import(
        provider: &SoftwareProvider,
        pem: &str,
        private: bool,
        algorithm: AlgorithmDescriptor,
        usages: &[KeyUsage],
    ) -> Result<KeyHandle> {
        let der = der(pem);
        let material = if private {
            ImportMaterial::Pkcs8(&der)
        } else {
            ImportMaterial::Spki(&der)
        };
        provider.import_key(material, &algorithm, true, usages).await
    }

    fn aes(mode: AesMode, length: usize) -> AlgorithmDescriptor {
        AlgorithmDescriptor::Aes { mode, length }
    }

    #[tokio::test]
    async fn test_generate_aes_lengths() {
        let provider = SoftwareProvider::new();
        for bits in AES_KEY_BITS {
            let params = KeyGenParams::new(aes(AesMode::Gcm, bits));
            let GeneratedKey::Secret(key) = provider
                .generate_key(&params, &[KeyUsage::Encrypt, KeyUsage::Decrypt], true)
                .await
                .unwrap()
            else {
                panic!("expected a secret key");
            };
            let raw = provider
                .export_key(&key, ExportForm::Raw)
                .await
                .unwrap()
                .into_bytes()
                .unwrap();
            assert_eq!(raw.len() * 8, bits);
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_odd_aes_length() {
        let provider = SoftwareProvider::new();
        let params = KeyGenParams::new(aes(AesMode::Cbc, 100));
        let err = provider.generate_key(&params, &[], true).await.unwrap_err();
        assert!(matches!(err, Error::ProviderRejected(_)));
    }

    #[tokio::test]
    async fn test_hmac_key_uses_block_size() {
        let provider = SoftwareProvider::new();
        let params = KeyGenParams::new(AlgorithmDescriptor::Hmac {
            hash: HashAlg::Sha384,
        });
        let GeneratedKey::Secret(key) = provider
            .generate_key(&params, &[KeyUsage::Sign, KeyUsage::Verify], true)
            .await
            .unwrap()
        else {
            panic!("expected a secret key");
        };
        let jwk = provider
            .export_key(&key, ExportForm::Jwk)
            .await
            .unwrap()
            .into_jwk()
            .unwrap();
        assert_eq!(jwk.alg.as_deref(), Some("HS384"));
        assert_eq!(base64url_decode(jwk.k.as_deref().unwrap()).unwrap().len(), 128);

        let tag = provider.sign(&key, &SignatureParams::Hmac, b"msg").await.unwrap();
        assert_eq!(tag.len(), 48);
        assert!(provider
            .verify(&key, &SignatureParams::Hmac, &tag, b"msg")
            .await
            .unwrap());
        assert!(!provider
            .verify(&key, &SignatureParams::Hmac, &tag, b"other")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_ec_generate_splits_usages() {
        let provider = SoftwareProvider::new();
        let params = KeyGenParams::new(AlgorithmDescriptor::Ecdsa {
            curve: NamedCurve::P256,
        });
        let GeneratedKey::Pair(pair) = provider
            .generate_key(&params, &[KeyUsage::Sign, KeyUsage::Verify], true)
            .await
            .unwrap()
        else {
            panic!("expected a key pair");
        };
        assert_eq!(pair.public_key.kind(), KeyKind::Public);
        assert!(pair.public_key.usages().contains(&KeyUsage::Verify));
        assert!(!pair.public_key.usages().contains(&KeyUsage::Sign));
        assert!(pair.private_key.usages().contains(&KeyUsage::Sign));

        let signature = provider
            .sign(
                &pair.private_key,
                &SignatureParams::Ecdsa {
                    hash: HashAlg::Sha256,
                },
                b"hello",
            )
            .await
            .unwrap();
        assert_eq!(signature.len(), 64);
        let ok = provider
            .verify(
                &pair.public_key,
                &SignatureParams::Ecdsa {
                    hash: HashAlg::Sha256,
                },
                &signature,
                b"hello",
            )
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn test_ecdh_public_key_has_no_usages() {
        let provider = SoftwareProvider::new();
        let params = KeyGenParams::new(AlgorithmDescriptor::Ecdh {
            curve: NamedCurve::P521,
        });
        let GeneratedKey::Pair(pair) = provider
            .generate_key(&params, &[KeyUsage::DeriveKey, KeyUsage::DeriveBits], true)
            .await
            .unwrap()
        else {
            panic!("expected a key pair");
        };
        assert!(pair.public_key.usages().is_empty());
        assert_eq!(pair.private_key.usages().len(), 2);
    }

    #[tokio::test]
    async fn test_ecdsa_p384_signs_sha256_prehash() {
        use p256::ecdsa::signature::Verifier;

        let provider = SoftwareProvider::new();
        let key = import(
            &provider,
            P384_PKCS8,
            true,
            AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P384,
            },
            &[KeyUsage::Sign],
        )
        .await
        .unwrap();
        let params = SignatureParams::Ecdsa {
            hash: HashAlg::Sha256,
        };
        let signature = provider.sign(&key, &params, b"release").await.unwrap();
        assert_eq!(signature.len(), 96);

        let secret = p384::SecretKey::from_pkcs8_der(&der(P384_PKCS8)).unwrap();
        let verifier = p384::ecdsa::VerifyingKey::from(secret.public_key());
        let signature = p384::ecdsa::Signature::from_slice(&signature).unwrap();
        let digest = sha2::Sha256::digest(b"release");
        assert!(verifier.verify_prehash(&digest, &signature).is_ok());
        // Not the SHA-384 signature the curve would conventionally use.
        assert!(verifier.verify(b"release", &signature).is_err());
    }

    #[tokio::test]
    async fn test_ecdsa_p521_sha256_roundtrip() {
        let provider = SoftwareProvider::new();
        let params = KeyGenParams::new(AlgorithmDescriptor::Ecdsa {
            curve: NamedCurve::P521,
        });
        let GeneratedKey::Pair(pair) = provider
            .generate_key(&params, &[KeyUsage::Sign, KeyUsage::Verify], true)
            .await
            .unwrap()
        else {
            panic!("expected a key pair");
        };
        let params = SignatureParams::Ecdsa {
            hash: HashAlg::Sha256,
        };
        let signature = provider.sign(&pair.private_key, &params, b"hello").await.unwrap();
        assert_eq!(signature.len(), 132);
        assert!(provider
            .verify(&pair.public_key, &params, &signature, b"hello")
            .await
            .unwrap());
        assert!(!provider
            .verify(&pair.public_key, &params, &signature, b"hullo")
            .await
            .unwrap());
    }

    #[test]
    fn test_ecdsa_prehash_left_pads_short_digest() {
        let prehash = ecdsa_prehash(NamedCurve::P521, HashAlg::Sha256, b"abc");
        assert_eq!(prehash.len(), 66);
        assert!(prehash[..34].iter().all(|&b| b == 0));
        assert_eq!(&prehash[34..], sha2::Sha256::digest(b"abc").as_slice());
        assert_eq!(ecdsa_prehash(NamedCurve::P256, HashAlg::Sha256, b"abc").len(), 32);
        assert_eq!(ecdsa_prehash(NamedCurve::P384, HashAlg::Sha512, b"abc").len(), 64);
    }

    #[tokio::test]
    async fn test_spki_import_requires_matching_curve() {
        let provider = SoftwareProvider::new();
        let wrong = import(
            &provider,
            P384_SPKI,
            false,
            AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P256,
            },
            &[KeyUsage::Verify],
        )
        .await;
        assert!(wrong.is_err());
        let right = import(
            &provider,
            P384_SPKI,
            false,
            AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P384,
            },
            &[KeyUsage::Verify],
        )
        .await
        .unwrap();
        assert_eq!(right.kind(), KeyKind::Public);
    }

    #[tokio::test]
    async fn test_rsa_spki_rejected_as_ec() {
        let provider = SoftwareProvider::new();
        let result = import(
            &provider,
            RSA_SPKI,
            false,
            AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P256,
            },
            &[KeyUsage::Verify],
        )
        .await;
        assert!(matches!(result, Err(Error::ProviderRejected(_))));
    }

    #[tokio::test]
    async fn test_rsa_jwk_roundtrip_through_provider() {
        let provider = SoftwareProvider::new();
        let algorithm = AlgorithmDescriptor::RsaPss {
            hash: HashAlg::Sha256,
        };
        let private = import(&provider, RSA_PKCS8, true, algorithm, &[KeyUsage::Sign])
            .await
            .unwrap();
        let jwk = provider
            .export_key(&private, ExportForm::Jwk)
            .await
            .unwrap()
            .into_jwk()
            .unwrap();
        assert_eq!(jwk.alg.as_deref(), Some("PS256"));
        assert!(jwk.dp.is_some() && jwk.dq.is_some() && jwk.qi.is_some());

        let reimported = provider
            .import_key(ImportMaterial::Jwk(&jwk), &algorithm, true, &[KeyUsage::Sign])
            .await
            .unwrap();
        let pkcs8_a = provider
            .export_key(&private, ExportForm::Pkcs8)
            .await
            .unwrap()
            .into_bytes()
            .unwrap();
        let pkcs8_b = provider
            .export_key(&reimported, ExportForm::Pkcs8)
            .await
            .unwrap()
            .into_bytes()
            .unwrap();
        assert_eq!(pkcs8_a, pkcs8_b);
    }

    #[tokio::test]
    async fn test_rsa_pss_sign_verify() {
        let provider = SoftwareProvider::new();
        let algorithm = AlgorithmDescriptor::RsaPss {
            hash: HashAlg::Sha256,
        };
        let private = import(&provider, RSA_PKCS8, true, algorithm, &[KeyUsage::Sign])
            .await
            .unwrap();
        let public = import(&provider, RSA_SPKI, false, algorithm, &[KeyUsage::Verify])
            .await
            .unwrap();
        let params = SignatureParams::RsaPss { salt_length: 32 };
        let signature = provider.sign(&private, &params, b"message").await.unwrap();
        assert_eq!(signature.len(), 256);
        assert!(provider
            .verify(&public, &params, &signature, b"message")
            .await
            .unwrap());
        assert!(!provider
            .verify(&public, &params, &signature, b"tampered")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_rsa_oaep_encrypt_decrypt() {
        let provider = SoftwareProvider::new();
        let algorithm = AlgorithmDescriptor::RsaOaep {
            hash: HashAlg::Sha256,
        };
        let private = import(&provider, RSA_PKCS8, true, algorithm, &[KeyUsage::Decrypt])
            .await
            .unwrap();
        let public = import(&provider, RSA_SPKI, false, algorithm, &[KeyUsage::Encrypt])
            .await
            .unwrap();
        let ciphertext = provider
            .encrypt(&public, &CipherParams::RsaOaep, b"secret")
            .await
            .unwrap();
        let plaintext = provider
            .decrypt(&private, &CipherParams::RsaOaep, &ciphertext)
            .await
            .unwrap();
        assert_eq!(plaintext, b"secret");
    }

    #[tokio::test]
    async fn test_operation_requires_usage() {
        let provider = SoftwareProvider::new();
        let public = import(
            &provider,
            RSA_SPKI,
            false,
            AlgorithmDescriptor::RsaOaep {
                hash: HashAlg::Sha256,
            },
            &[KeyUsage::Verify],
        )
        .await
        .unwrap();
        let err = provider
            .encrypt(&public, &CipherParams::RsaOaep, b"x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("encrypt"));
    }

    #[tokio::test]
    async fn test_aes_modes_roundtrip() {
        let provider = SoftwareProvider::new();
        let usages = [KeyUsage::Encrypt, KeyUsage::Decrypt];
        let cases = [
            (
                aes(AesMode::Gcm, 128),
                CipherParams::AesGcm { iv: vec![1; 12] },
            ),
            (
                aes(AesMode::Cbc, 192),
                CipherParams::AesCbc { iv: vec![2; 16] },
            ),
            (
                aes(AesMode::Ctr, 256),
                CipherParams::AesCtr {
                    counter: vec![3; 16],
                    length: 64,
                },
            ),
        ];
        for (algorithm, params) in cases {
            let GeneratedKey::Secret(key) = provider
                .generate_key(&KeyGenParams::new(algorithm), &usages, true)
                .await
                .unwrap()
            else {
                panic!("expected a secret key");
            };
            let ciphertext = provider.encrypt(&key, &params, b"attack at dawn").await.unwrap();
            assert_ne!(ciphertext, b"attack at dawn");
            let plaintext = provider.decrypt(&key, &params, &ciphertext).await.unwrap();
            assert_eq!(plaintext, b"attack at dawn", "{}", algorithm);
        }
    }

    #[tokio::test]
    async fn test_gcm_tamper_detected() {
        let provider = SoftwareProvider::new();
        let key = provider
            .import_key(
                ImportMaterial::Raw(&[7u8; 32]),
                &aes(AesMode::Gcm, 256),
                true,
                &[KeyUsage::Encrypt, KeyUsage::Decrypt],
            )
            .await
            .unwrap();
        let params = CipherParams::AesGcm { iv: vec![0; 12] };
        let mut ciphertext = provider.encrypt(&key, &params, b"data").await.unwrap();
        ciphertext[0] ^= 1;
        assert!(provider.decrypt(&key, &params, &ciphertext).await.is_err());
    }

    #[tokio::test]
    async fn test_raw_import_length_must_match() {
        let provider = SoftwareProvider::new();
        let result = provider
            .import_key(
                ImportMaterial::Raw(&[0u8; 16]),
                &aes(AesMode::Gcm, 256),
                true,
                &[],
            )
            .await;
        assert!(matches!(result, Err(Error::ProviderRejected(_))));
    }

    #[tokio::test]
    async fn test_non_extractable_export_rejected() {
        let provider = SoftwareProvider::new();
        let key = provider
            .import_key(
                ImportMaterial::Raw(&[0u8; 16]),
                &aes(AesMode::Ctr, 128),
                false,
                &[],
            )
            .await
            .unwrap();
        let err = provider.export_key(&key, ExportForm::Raw).await.unwrap_err();
        assert!(matches!(err, Error::ProviderRejected(_)));
    }

    #[tokio::test]
    async fn test_spki_export_of_private_key_rejected() {
        let provider = SoftwareProvider::new();
        let key = import(
            &provider,
            P384_PKCS8,
            true,
            AlgorithmDescriptor::Ecdsa {
                curve: NamedCurve::P384,
            },
            &[KeyUsage::Sign],
        )
        .await
        .unwrap();
        assert!(provider.export_key(&key, ExportForm::Spki).await.is_err());
        let pkcs8 = provider
            .export_key(&key, ExportForm::Pkcs8)
            .await
            .unwrap()
            .into_bytes()
            .unwrap();
        assert!(!pkcs8.is_empty());
    }

    #[tokio::test]
    async fn test_ec_jwk_scalar_must_match_point() {
        let provider = SoftwareProvider::new();
        let algorithm = AlgorithmDescriptor::Ecdsa {
            curve: NamedCurve::P384,
        };
        let key = import(&provider, P384_PKCS8, true, algorithm, &[KeyUsage::Sign])
            .await
            .unwrap();
        let mut jwk = provider
            .export_key(&key, ExportForm::Jwk)
            .await
            .unwrap()
            .into_jwk()
            .unwrap();
        assert_eq!(jwk.alg.as_deref(), Some("ES384"));
        assert!(provider
            .import_key(ImportMaterial::Jwk(&jwk), &algorithm, true, &[])
            .await
            .is_ok());

        let (other_secret, _) = ec_generate(NamedCurve::P384);
        jwk.d = Some(base64url_encode(&other_secret));
        let err = provider
            .import_key(ImportMaterial::Jwk(&jwk), &algorithm, true, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderRejected(_)));
    }

    #[tokio::test]
    async fn test_foreign_handle_rejected() {
        let provider = SoftwareProvider::new();
        let foreign = KeyHandle::new(
            KeyKind::Secret,
            aes(AesMode::Gcm, 128),
            true,
            [KeyUsage::Encrypt],
            vec![0u8; 16],
        );
        let err = provider.export_key(&foreign, ExportForm::Raw).await.unwrap_err();
        assert!(err.to_string().contains("software provider"));
    }
}
