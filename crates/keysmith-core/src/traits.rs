//! Capability traits for cryptographic providers.
//!
//! The codec never touches primitives directly. Everything it needs from a
//! cryptographic backend goes through [`CryptoProvider`], and everything it
//! needs from an OpenPGP backend goes through [`PgpProvider`]. Both are
//! object-safe and shared as `Arc<dyn ...>`.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::jwk::Jwk;
use crate::models::{
    AlgorithmDescriptor, HashAlg, KeyHandle, KeyPair, KeyUsage, PgpIdentity, PgpKeyObject,
};

// =============================================================================
// CRYPTO PROVIDER
// =============================================================================

/// Parameters for key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenParams {
    pub algorithm: AlgorithmDescriptor,
    /// RSA modulus length in bits. Ignored for other families.
    pub modulus_length: Option<usize>,
}

impl KeyGenParams {
    pub fn new(algorithm: AlgorithmDescriptor) -> Self {
        Self {
            algorithm,
            modulus_length: None,
        }
    }

    pub fn with_modulus_length(mut self, bits: usize) -> Self {
        self.modulus_length = Some(bits);
        self
    }
}

/// Output of [`CryptoProvider::generate_key`].
#[derive(Debug)]
pub enum GeneratedKey {
    Secret(KeyHandle),
    Pair(KeyPair),
}

/// Export representation requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportForm {
    /// Raw secret bytes (symmetric keys only).
    Raw,
    /// DER SubjectPublicKeyInfo.
    Spki,
    /// DER PKCS#8 PrivateKeyInfo.
    Pkcs8,
    Jwk,
}

/// Provider export result.
#[derive(Debug)]
pub enum ExportedKey {
    Bytes(Vec<u8>),
    Jwk(Jwk),
}

impl ExportedKey {
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Jwk(_) => Err(Error::ProviderRejected(
                "provider returned a JWK where bytes were requested".into(),
            )),
        }
    }

    pub fn into_jwk(self) -> Result<Jwk> {
        match self {
            Self::Jwk(jwk) => Ok(jwk),
            Self::Bytes(_) => Err(Error::ProviderRejected(
                "provider returned bytes where a JWK was requested".into(),
            )),
        }
    }
}

/// Key material handed to [`CryptoProvider::import_key`].
#[derive(Debug, Clone, Copy)]
pub enum ImportMaterial<'a> {
    Raw(&'a [u8]),
    Spki(&'a [u8]),
    Pkcs8(&'a [u8]),
    Jwk(&'a Jwk),
}

impl ImportMaterial<'_> {
    pub fn form(&self) -> ExportForm {
        match self {
            Self::Raw(_) => ExportForm::Raw,
            Self::Spki(_) => ExportForm::Spki,
            Self::Pkcs8(_) => ExportForm::Pkcs8,
            Self::Jwk(_) => ExportForm::Jwk,
        }
    }
}

/// Algorithm parameters for encrypt/decrypt.
#[derive(Clone, PartialEq, Eq)]
pub enum CipherParams {
    RsaOaep,
    AesGcm { iv: Vec<u8> },
    AesCbc { iv: Vec<u8> },
    /// `length` is the number of counter bits in the block.
    AesCtr { counter: Vec<u8>, length: u32 },
}

impl std::fmt::Debug for CipherParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RsaOaep => f.write_str("RsaOaep"),
            Self::AesGcm { iv } => write!(f, "AesGcm {{ iv_len: {} }}", iv.len()),
            Self::AesCbc { iv } => write!(f, "AesCbc {{ iv_len: {} }}", iv.len()),
            Self::AesCtr { counter, length } => write!(
                f,
                "AesCtr {{ counter_len: {}, length: {} }}",
                counter.len(),
                length
            ),
        }
    }
}

/// Algorithm parameters for sign/verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureParams {
    RsaPss { salt_length: usize },
    Ecdsa { hash: HashAlg },
    Hmac,
}

/// Cryptographic backend capability.
///
/// Implementations must be thread-safe; a provider is shared by every codec
/// call. Handles produced by one provider are only meaningful to that
/// provider.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Generate a secret key or key pair.
    async fn generate_key(
        &self,
        params: &KeyGenParams,
        usages: &[KeyUsage],
        extractable: bool,
    ) -> Result<GeneratedKey>;

    /// Export key material in the requested representation.
    async fn export_key(&self, key: &KeyHandle, form: ExportForm) -> Result<ExportedKey>;

    /// Import key material under the given algorithm.
    async fn import_key(
        &self,
        material: ImportMaterial<'_>,
        algorithm: &AlgorithmDescriptor,
        extractable: bool,
        usages: &[KeyUsage],
    ) -> Result<KeyHandle>;

    async fn sign(&self, key: &KeyHandle, params: &SignatureParams, data: &[u8])
        -> Result<Vec<u8>>;

    async fn verify(
        &self,
        key: &KeyHandle,
        params: &SignatureParams,
        signature: &[u8],
        data: &[u8],
    ) -> Result<bool>;

    async fn encrypt(&self, key: &KeyHandle, params: &CipherParams, data: &[u8])
        -> Result<Vec<u8>>;

    async fn decrypt(&self, key: &KeyHandle, params: &CipherParams, data: &[u8])
        -> Result<Vec<u8>>;
}

// =============================================================================
// PGP PROVIDER
// =============================================================================

/// Key type for PGP generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgpKeyType {
    Rsa { bits: usize },
    /// Ed25519 primary key with a Curve25519 encryption subkey.
    Curve25519,
}

/// Options for [`PgpProvider::generate_key`].
#[derive(Debug, Clone)]
pub struct PgpKeyOptions {
    pub key_type: PgpKeyType,
    pub identity: PgpIdentity,
}

/// Output of [`PgpProvider::generate_key`].
#[derive(Clone)]
pub struct PgpGeneratedKey {
    pub public_armored: String,
    pub private_armored: String,
    pub key_id: String,
}

impl std::fmt::Debug for PgpGeneratedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgpGeneratedKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// OpenPGP backend capability.
#[async_trait]
pub trait PgpProvider: Send + Sync {
    async fn generate_key(&self, options: &PgpKeyOptions) -> Result<PgpGeneratedKey>;

    /// Parse an armored public or private key.
    async fn read_key(&self, armored: &str) -> Result<PgpKeyObject>;

    /// Encrypt to a public key, returning an armored message.
    async fn encrypt(&self, key: &PgpKeyObject, plaintext: &[u8]) -> Result<String>;

    /// Decrypt an armored message with a private key.
    async fn decrypt(
        &self,
        key: &PgpKeyObject,
        armored_message: &str,
        passphrase: Option<&str>,
    ) -> Result<Vec<u8>>;

    /// Produce an armored detached signature.
    async fn sign(
        &self,
        key: &PgpKeyObject,
        message: &[u8],
        passphrase: Option<&str>,
    ) -> Result<String>;

    async fn verify(
        &self,
        key: &PgpKeyObject,
        armored_signature: &str,
        message: &[u8],
    ) -> Result<bool>;
}
