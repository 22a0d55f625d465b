//! Key model types shared by providers, codecs, and callers.
//!
//! A [`KeyHandle`] is the provider-owned, opaque side of a key; everything
//! the codec layer learns about key material it learns by asking the
//! provider to export it. [`KeyProperties`] is the derived, display-facing
//! projection produced by the inspector.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// KEY KIND AND USAGES
// =============================================================================

/// Whether a key is the public or private half of a pair, or a secret key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Public,
    Private,
    Secret,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Secret => "secret",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation a key is permitted to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
    DeriveKey,
    DeriveBits,
    WrapKey,
    UnwrapKey,
}

impl KeyUsage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::DeriveKey => "deriveKey",
            Self::DeriveBits => "deriveBits",
            Self::WrapKey => "wrapKey",
            Self::UnwrapKey => "unwrapKey",
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "encrypt" => Ok(Self::Encrypt),
            "decrypt" => Ok(Self::Decrypt),
            "sign" => Ok(Self::Sign),
            "verify" => Ok(Self::Verify),
            "deriveKey" => Ok(Self::DeriveKey),
            "deriveBits" => Ok(Self::DeriveBits),
            "wrapKey" => Ok(Self::WrapKey),
            "unwrapKey" => Ok(Self::UnwrapKey),
            _ => Err(Error::InvalidInput(format!("Unknown key usage: {}", s))),
        }
    }
}

/// Set of permitted operations. Ordering is irrelevant; a `BTreeSet` keeps
/// output stable and comparisons order-insensitive.
pub type KeyUsages = BTreeSet<KeyUsage>;

// =============================================================================
// ALGORITHM PARAMETERS
// =============================================================================

/// Hash function bound to an RSA or HMAC key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlg {
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl HashAlg {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Digest output size in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Sha256 => 256,
            Self::Sha384 => 384,
            Self::Sha512 => 512,
        }
    }

    /// Internal block size in bytes; default HMAC key length.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha384 | Self::Sha512 => 128,
        }
    }

    /// Look up a hash by its output size in bits.
    pub fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            256 => Some(Self::Sha256),
            384 => Some(Self::Sha384),
            512 => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// NIST curve used by ECDSA and ECDH keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedCurve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "P-521")]
    P521,
}

impl NamedCurve {
    /// JWK `crv` value, e.g. `P-256`.
    pub fn jwk_name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// SSH curve identifier, e.g. `nistp256`.
    pub fn ssh_name(&self) -> &'static str {
        match self {
            Self::P256 => "nistp256",
            Self::P384 => "nistp384",
            Self::P521 => "nistp521",
        }
    }

    /// SSH key type string, e.g. `ecdsa-sha2-nistp256`.
    pub fn ssh_key_type(&self) -> &'static str {
        match self {
            Self::P256 => "ecdsa-sha2-nistp256",
            Self::P384 => "ecdsa-sha2-nistp384",
            Self::P521 => "ecdsa-sha2-nistp521",
        }
    }

    /// Byte length of a coordinate or scalar.
    pub fn field_size(&self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    /// Hash conventionally paired with the curve for ECDSA.
    pub fn ecdsa_hash(&self) -> HashAlg {
        match self {
            Self::P256 => HashAlg::Sha256,
            Self::P384 => HashAlg::Sha384,
            Self::P521 => HashAlg::Sha512,
        }
    }

    /// Resolve an SSH curve identifier.
    pub fn from_ssh_name(name: &str) -> Option<Self> {
        match name {
            "nistp256" => Some(Self::P256),
            "nistp384" => Some(Self::P384),
            "nistp521" => Some(Self::P521),
            _ => None,
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.jwk_name())
    }
}

impl FromStr for NamedCurve {
    type Err = Error;

    /// Accepts `P-256`, `P256`, and `nistp256` spellings.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "P-256" | "P256" | "NISTP256" => Ok(Self::P256),
            "P-384" | "P384" | "NISTP384" => Ok(Self::P384),
            "P-521" | "P521" | "NISTP521" => Ok(Self::P521),
            _ => Err(Error::InvalidInput(format!("Unknown curve: {}", s))),
        }
    }
}

/// AES block cipher mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AesMode {
    Gcm,
    Cbc,
    Ctr,
}

impl AesMode {
    /// Sniffing order for raw key material.
    pub const ALL: [AesMode; 3] = [AesMode::Gcm, AesMode::Cbc, AesMode::Ctr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcm => "GCM",
            Self::Cbc => "CBC",
            Self::Ctr => "CTR",
        }
    }
}

impl FromStr for AesMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GCM" => Ok(Self::Gcm),
            "CBC" => Ok(Self::Cbc),
            "CTR" => Ok(Self::Ctr),
            _ => Err(Error::InvalidInput(format!("Unknown AES mode: {}", s))),
        }
    }
}

/// Broad key family, mirroring the JWK `kty` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    Ec,
    Symmetric,
}

impl KeyFamily {
    /// JWK `kty` value.
    pub fn kty(&self) -> &'static str {
        match self {
            Self::Rsa => "RSA",
            Self::Ec => "EC",
            Self::Symmetric => "oct",
        }
    }
}

/// Algorithm a key is bound to, with its hash, curve, or length parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmDescriptor {
    RsaOaep { hash: HashAlg },
    RsaPss { hash: HashAlg },
    Ecdsa { curve: NamedCurve },
    Ecdh { curve: NamedCurve },
    Aes { mode: AesMode, length: usize },
    Hmac { hash: HashAlg },
}

impl AlgorithmDescriptor {
    /// Algorithm name as the provider reports it (`RSA-OAEP`, `AES-GCM`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Self::RsaOaep { .. } => "RSA-OAEP",
            Self::RsaPss { .. } => "RSA-PSS",
            Self::Ecdsa { .. } => "ECDSA",
            Self::Ecdh { .. } => "ECDH",
            Self::Aes { mode, .. } => match mode {
                AesMode::Gcm => "AES-GCM",
                AesMode::Cbc => "AES-CBC",
                AesMode::Ctr => "AES-CTR",
            },
            Self::Hmac { .. } => "HMAC",
        }
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::RsaOaep { .. } | Self::RsaPss { .. } => KeyFamily::Rsa,
            Self::Ecdsa { .. } | Self::Ecdh { .. } => KeyFamily::Ec,
            Self::Aes { .. } | Self::Hmac { .. } => KeyFamily::Symmetric,
        }
    }

    pub fn hash(&self) -> Option<HashAlg> {
        match self {
            Self::RsaOaep { hash } | Self::RsaPss { hash } | Self::Hmac { hash } => Some(*hash),
            _ => None,
        }
    }

    pub fn curve(&self) -> Option<NamedCurve> {
        match self {
            Self::Ecdsa { curve } | Self::Ecdh { curve } => Some(*curve),
            _ => None,
        }
    }
}

impl fmt::Display for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaOaep { hash } | Self::RsaPss { hash } | Self::Hmac { hash } => {
                write!(f, "{}/{}", self.name(), hash)
            }
            Self::Ecdsa { curve } | Self::Ecdh { curve } => write!(f, "{}/{}", self.name(), curve),
            Self::Aes { length, .. } => write!(f, "{}/{}", self.name(), length),
        }
    }
}

// =============================================================================
// KEY HANDLES
// =============================================================================

/// Opaque reference to provider-managed key material.
///
/// The handle carries the attributes every consumer may read (kind,
/// algorithm, extractability, usages) and a provider-private payload that
/// only the provider which created it knows how to interpret.
pub struct KeyHandle {
    kind: KeyKind,
    algorithm: AlgorithmDescriptor,
    extractable: bool,
    usages: KeyUsages,
    material: Box<dyn Any + Send + Sync>,
}

impl KeyHandle {
    /// Create a handle. Intended for provider implementations.
    pub fn new<M>(
        kind: KeyKind,
        algorithm: AlgorithmDescriptor,
        extractable: bool,
        usages: impl IntoIterator<Item = KeyUsage>,
        material: M,
    ) -> Self
    where
        M: Any + Send + Sync,
    {
        Self {
            kind,
            algorithm,
            extractable,
            usages: usages.into_iter().collect(),
            material: Box::new(material),
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn algorithm(&self) -> &AlgorithmDescriptor {
        &self.algorithm
    }

    pub fn extractable(&self) -> bool {
        self.extractable
    }

    pub fn usages(&self) -> &KeyUsages {
        &self.usages
    }

    pub fn has_any_usage(&self, wanted: &[KeyUsage]) -> bool {
        wanted.iter().any(|u| self.usages.contains(u))
    }

    /// Borrow the provider payload if it has the expected type.
    pub fn material<M: Any>(&self) -> Option<&M> {
        self.material.downcast_ref::<M>()
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("kind", &self.kind)
            .field("algorithm", &self.algorithm)
            .field("extractable", &self.extractable)
            .field("usages", &self.usages)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Public and private halves of an asymmetric key.
#[derive(Debug)]
pub struct KeyPair {
    pub public_key: KeyHandle,
    pub private_key: KeyHandle,
}

/// An OpenPGP key as produced by a PGP provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PgpKeyObject {
    pub is_private: bool,
    /// Public-key algorithm name, e.g. `rsa` or `eddsa`.
    pub algorithm: String,
    pub bits: Option<usize>,
    pub curve: Option<String>,
    /// Upper-case hex key ID.
    pub key_id: String,
    /// ASCII-armored key text.
    pub armored: String,
}

impl fmt::Debug for PgpKeyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let armored: &dyn fmt::Debug = if self.is_private {
            &"[REDACTED]"
        } else {
            &self.armored
        };
        f.debug_struct("PgpKeyObject")
            .field("is_private", &self.is_private)
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bits)
            .field("curve", &self.curve)
            .field("key_id", &self.key_id)
            .field("armored", armored)
            .finish()
    }
}

/// A key of either representation, matched exhaustively by consumers.
#[derive(Debug)]
pub enum LoadedKey {
    Provider(KeyHandle),
    Pgp(PgpKeyObject),
}

impl LoadedKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Provider(handle) => handle.kind(),
            Self::Pgp(key) if key.is_private => KeyKind::Private,
            Self::Pgp(_) => KeyKind::Public,
        }
    }
}

impl From<KeyHandle> for LoadedKey {
    fn from(handle: KeyHandle) -> Self {
        Self::Provider(handle)
    }
}

impl From<PgpKeyObject> for LoadedKey {
    fn from(key: PgpKeyObject) -> Self {
        Self::Pgp(key)
    }
}

// =============================================================================
// DERIVED AND SERIALIZED FORMS
// =============================================================================

/// Display-facing properties derived from a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyProperties {
    #[serde(rename = "type")]
    pub key_type: KeyKind,
    /// Display label, e.g. `RSA-OAEP (SHA-256)` or `PGP/RSA`.
    pub algorithm: String,
    /// Display size, e.g. `2048 bits`, `P-384`, or `N/A`.
    pub size: String,
    pub usages: KeyUsages,
    pub extractable: bool,
}

/// Semantic tag of a serialized key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatTag {
    PemSpki,
    PemPkcs8,
    Jwk,
    RawBase64,
    RawHex,
    SshPublic,
    OpensshPrivateV1,
    PuttyPpkV2,
    PgpArmored,
}

impl FormatTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PemSpki => "pem-spki",
            Self::PemPkcs8 => "pem-pkcs8",
            Self::Jwk => "jwk",
            Self::RawBase64 => "raw-base64",
            Self::RawHex => "raw-hex",
            Self::SshPublic => "ssh-public",
            Self::OpensshPrivateV1 => "openssh-private-v1",
            Self::PuttyPpkV2 => "putty-ppk-v2",
            Self::PgpArmored => "pgp-armored",
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized key text with its format tag. Never persisted by the library.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedKey {
    pub format: FormatTag,
    pub text: String,
}

impl SerializedKey {
    pub fn new(format: FormatTag, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
        }
    }
}

impl fmt::Debug for SerializedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializedKey")
            .field("format", &self.format)
            .field("len", &self.text.len())
            .finish()
    }
}

/// User identity embedded in a generated PGP key.
#[derive(Clone, Default)]
pub struct PgpIdentity {
    pub name: String,
    pub email: String,
    pub passphrase: Option<String>,
}

impl PgpIdentity {
    /// RFC 4880 user ID string, `Name <email>`.
    pub fn user_id(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

impl fmt::Debug for PgpIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgpIdentity")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Outcome of a generation request.
#[derive(Debug)]
pub enum KeyGenerationResult {
    Symmetric {
        key: KeyHandle,
        display_value: String,
    },
    Asymmetric {
        key_pair: KeyPair,
        display_value: String,
    },
    Pgp {
        public_key: String,
        private_key: String,
        key_id: String,
        display_value: String,
    },
}

impl KeyGenerationResult {
    pub fn display_value(&self) -> &str {
        match self {
            Self::Symmetric { display_value, .. }
            | Self::Asymmetric { display_value, .. }
            | Self::Pgp { display_value, .. } => display_value,
        }
    }
}
