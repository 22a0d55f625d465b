//! Algorithm catalog: the generation options keysmith offers.
//!
//! A catalog entry's `value` combined with one of its size options forms an
//! [`AlgorithmSpec`] string such as `RSA-OAEP-SHA-256-2048` or
//! `SSH-ECDSA-P256`; see [`compose_spec`].

use std::fmt;
use std::str::FromStr;

use crate::defaults::AES_KEY_BITS;
use crate::error::{Error, Result};
use crate::models::{AesMode, AlgorithmDescriptor, HashAlg, KeyUsage, NamedCurve};
use crate::traits::{KeyGenParams, PgpKeyType};

// =============================================================================
// STATIC TABLES
// =============================================================================

/// One selectable algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmOption {
    pub value: &'static str,
    pub label: &'static str,
    pub group: &'static str,
    pub description: &'static str,
}

/// One selectable key size or curve for an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySizeOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Usage group heading with its one-line summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageGroup {
    pub group: &'static str,
    pub short_description: &'static str,
}

pub const GROUP_SYMMETRIC: &str = "Symmetric Encryption";
pub const GROUP_ASYMMETRIC: &str = "Asymmetric Encryption";
pub const GROUP_SSH: &str = "SSH Authentication";
pub const GROUP_SIGNATURES: &str = "Digital Signatures";
pub const GROUP_KEY_AGREEMENT: &str = "Key Agreement";
pub const GROUP_MAC: &str = "Message Authentication";
pub const GROUP_PGP: &str = "PGP / GPG";

pub static USAGE_GROUPS: &[UsageGroup] = &[
    UsageGroup {
        group: GROUP_SYMMETRIC,
        short_description: "Fast, single-key encryption.",
    },
    UsageGroup {
        group: GROUP_ASYMMETRIC,
        short_description: "Two-key (public/private) encryption.",
    },
    UsageGroup {
        group: GROUP_SSH,
        short_description: "Passwordless server access.",
    },
    UsageGroup {
        group: GROUP_SIGNATURES,
        short_description: "Verify authenticity & integrity.",
    },
    UsageGroup {
        group: GROUP_KEY_AGREEMENT,
        short_description: "Securely establish a shared secret.",
    },
    UsageGroup {
        group: GROUP_MAC,
        short_description: "Verify message source & integrity.",
    },
    UsageGroup {
        group: GROUP_PGP,
        short_description: "Encrypt & sign emails/files.",
    },
];

macro_rules! option {
    ($value:literal, $label:literal, $group:expr, $description:literal) => {
        AlgorithmOption {
            value: $value,
            label: $label,
            group: $group,
            description: $description,
        }
    };
}

pub static ALGORITHM_OPTIONS: &[AlgorithmOption] = &[
    option!("AES-128-GCM", "AES-128-GCM", GROUP_SYMMETRIC,
        "Modern, fast, authenticated encryption. Recommended for general use."),
    option!("AES-192-GCM", "AES-192-GCM", GROUP_SYMMETRIC,
        "Authenticated encryption with a larger key size."),
    option!("AES-256-GCM", "AES-256-GCM", GROUP_SYMMETRIC,
        "Authenticated encryption with the largest AES key size."),
    option!("AES-128-CBC", "AES-128-CBC", GROUP_SYMMETRIC,
        "Legacy block mode without built-in authentication. GCM is generally preferred."),
    option!("AES-192-CBC", "AES-192-CBC", GROUP_SYMMETRIC,
        "Legacy block mode with a larger key size. No built-in authentication."),
    option!("AES-256-CBC", "AES-256-CBC", GROUP_SYMMETRIC,
        "Legacy block mode with the largest key size. No built-in authentication."),
    option!("AES-128-CTR", "AES-128-CTR", GROUP_SYMMETRIC,
        "Counter mode stream cipher. Fast, but provides no authentication."),
    option!("AES-192-CTR", "AES-192-CTR", GROUP_SYMMETRIC,
        "Counter mode with a larger key size. Provides no authentication."),
    option!("AES-256-CTR", "AES-256-CTR", GROUP_SYMMETRIC,
        "Counter mode with the largest key size. Provides no authentication."),
    option!("RSA-OAEP-SHA-256", "RSA-OAEP (SHA-256)", GROUP_ASYMMETRIC,
        "RSA encryption with SHA-256. Recommended for general use."),
    option!("RSA-OAEP-SHA-384", "RSA-OAEP (SHA-384)", GROUP_ASYMMETRIC,
        "RSA encryption with SHA-384."),
    option!("RSA-OAEP-SHA-512", "RSA-OAEP (SHA-512)", GROUP_ASYMMETRIC,
        "RSA encryption with SHA-512."),
    option!("SSH-RSA", "SSH RSA", GROUP_SSH,
        "Legacy-compatible RSA key for SSH. ECDSA is recommended for modern systems."),
    option!("SSH-ECDSA", "SSH ECDSA", GROUP_SSH,
        "Elliptic curve key for SSH. Recommended for most uses."),
    option!("ECDSA", "ECDSA", GROUP_SIGNATURES,
        "Elliptic curve digital signatures with small keys."),
    option!("RSA-PSS", "RSA-PSS", GROUP_SIGNATURES,
        "Probabilistic RSA signatures."),
    option!("ECDH", "ECDH", GROUP_KEY_AGREEMENT,
        "Establish a shared secret between two parties for symmetric encryption."),
    option!("HMAC-SHA-256", "HMAC (SHA-256)", GROUP_MAC,
        "Message integrity and authenticity with a shared secret and SHA-256."),
    option!("HMAC-SHA-384", "HMAC (SHA-384)", GROUP_MAC,
        "HMAC with SHA-384."),
    option!("HMAC-SHA-512", "HMAC (SHA-512)", GROUP_MAC,
        "HMAC with SHA-512."),
    option!("PGP-ECC-curve25519", "PGP ECC (Curve25519)", GROUP_PGP,
        "Curve25519 PGP key for signing and encryption. Recommended."),
    option!("PGP-RSA", "PGP RSA", GROUP_PGP,
        "RSA PGP key for signing and encryption. Widely compatible."),
];

const RSA_SIZES: &[KeySizeOption] = &[
    KeySizeOption { value: "2048", label: "2048 bits" },
    KeySizeOption { value: "4096", label: "4096 bits" },
];

const NIST_CURVES: &[KeySizeOption] = &[
    KeySizeOption { value: "P-256", label: "NIST P-256" },
    KeySizeOption { value: "P-384", label: "NIST P-384" },
    KeySizeOption { value: "P-521", label: "NIST P-521" },
];

const SSH_CURVES: &[KeySizeOption] = &[
    KeySizeOption { value: "P256", label: "NIST P-256" },
    KeySizeOption { value: "P384", label: "NIST P-384" },
    KeySizeOption { value: "P521", label: "NIST P-521" },
];

const PGP_RSA_SIZES: &[KeySizeOption] = &[KeySizeOption { value: "4096", label: "4096 bits" }];

/// Size options per algorithm value. Values not listed take no size.
pub static KEY_SIZE_OPTIONS: &[(&str, &[KeySizeOption])] = &[
    ("RSA-OAEP-SHA-256", RSA_SIZES),
    ("RSA-OAEP-SHA-384", RSA_SIZES),
    ("RSA-OAEP-SHA-512", RSA_SIZES),
    ("RSA-PSS", RSA_SIZES),
    ("ECDSA", NIST_CURVES),
    ("ECDH", NIST_CURVES),
    ("SSH-RSA", RSA_SIZES),
    ("SSH-ECDSA", SSH_CURVES),
    ("PGP-RSA", PGP_RSA_SIZES),
];

/// Size options for an algorithm value, empty when it takes none.
pub fn key_size_options(value: &str) -> &'static [KeySizeOption] {
    KEY_SIZE_OPTIONS
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, sizes)| *sizes)
        .unwrap_or(&[])
}

pub fn find_option(value: &str) -> Option<&'static AlgorithmOption> {
    ALGORITHM_OPTIONS.iter().find(|o| o.value == value)
}

/// Join a catalog value and a size into a spec string.
///
/// A missing size selects the first listed option; a size for a value that
/// takes none is an error.
pub fn compose_spec(value: &str, size: Option<&str>) -> Result<AlgorithmSpec> {
    let sizes = key_size_options(value);
    let full = match (sizes.first(), size) {
        (None, None) => value.to_string(),
        (None, Some(size)) => {
            return Err(Error::InvalidInput(format!(
                "{} does not take a key size (got {})",
                value, size
            )))
        }
        (Some(default), None) => format!("{}-{}", value, default.value),
        (Some(_), Some(size)) => {
            if !sizes.iter().any(|s| s.value == size) {
                return Err(Error::InvalidInput(format!(
                    "Unsupported key size {} for {}",
                    size, value
                )));
            }
            format!("{}-{}", value, size)
        }
    };
    full.parse()
}

// =============================================================================
// ALGORITHM SPEC
// =============================================================================

/// Curve for PGP ECC keys.
pub const PGP_CURVE25519: &str = "curve25519";

/// A fully-specified generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmSpec {
    Aes { length: usize, mode: AesMode },
    RsaOaep { hash: HashAlg, modulus_length: usize },
    RsaPss { modulus_length: usize },
    Ecdsa { curve: NamedCurve },
    Ecdh { curve: NamedCurve },
    Hmac { hash: HashAlg },
    SshRsa { modulus_length: usize },
    SshEcdsa { curve: NamedCurve },
    PgpRsa { bits: usize },
    PgpCurve25519,
}

/// How the generation result is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayForm {
    /// Base64 of the raw secret.
    RawBase64,
    /// Public key as PEM/SPKI.
    PublicPem,
    /// Public key as an SSH public line.
    SshPublic,
    /// Armored PGP public key.
    PgpArmored,
}

impl AlgorithmSpec {
    /// Provider parameters, or `None` for PGP specs.
    pub fn key_gen_params(&self) -> Option<KeyGenParams> {
        let params = match *self {
            Self::Aes { length, mode } => {
                KeyGenParams::new(AlgorithmDescriptor::Aes { mode, length })
            }
            Self::RsaOaep {
                hash,
                modulus_length,
            } => KeyGenParams::new(AlgorithmDescriptor::RsaOaep { hash })
                .with_modulus_length(modulus_length),
            Self::RsaPss { modulus_length } | Self::SshRsa { modulus_length } => {
                KeyGenParams::new(AlgorithmDescriptor::RsaPss {
                    hash: HashAlg::Sha256,
                })
                .with_modulus_length(modulus_length)
            }
            Self::Ecdsa { curve } | Self::SshEcdsa { curve } => {
                KeyGenParams::new(AlgorithmDescriptor::Ecdsa { curve })
            }
            Self::Ecdh { curve } => KeyGenParams::new(AlgorithmDescriptor::Ecdh { curve }),
            Self::Hmac { hash } => KeyGenParams::new(AlgorithmDescriptor::Hmac { hash }),
            Self::PgpRsa { .. } | Self::PgpCurve25519 => return None,
        };
        Some(params)
    }

    /// PGP key type, or `None` for provider specs.
    pub fn pgp_key_type(&self) -> Option<PgpKeyType> {
        match *self {
            Self::PgpRsa { bits } => Some(PgpKeyType::Rsa { bits }),
            Self::PgpCurve25519 => Some(PgpKeyType::Curve25519),
            _ => None,
        }
    }

    /// Usages granted to generated keys.
    pub fn usages(&self) -> &'static [KeyUsage] {
        match self {
            Self::Aes { .. } | Self::RsaOaep { .. } => &[KeyUsage::Encrypt, KeyUsage::Decrypt],
            Self::RsaPss { .. }
            | Self::Ecdsa { .. }
            | Self::Hmac { .. }
            | Self::SshRsa { .. }
            | Self::SshEcdsa { .. } => &[KeyUsage::Sign, KeyUsage::Verify],
            Self::Ecdh { .. } => &[KeyUsage::DeriveKey, KeyUsage::DeriveBits],
            Self::PgpRsa { .. } | Self::PgpCurve25519 => &[
                KeyUsage::Encrypt,
                KeyUsage::Decrypt,
                KeyUsage::Sign,
                KeyUsage::Verify,
            ],
        }
    }

    pub fn display_form(&self) -> DisplayForm {
        match self {
            Self::Aes { .. } | Self::Hmac { .. } => DisplayForm::RawBase64,
            Self::RsaOaep { .. } | Self::RsaPss { .. } | Self::Ecdsa { .. } | Self::Ecdh { .. } => {
                DisplayForm::PublicPem
            }
            Self::SshRsa { .. } | Self::SshEcdsa { .. } => DisplayForm::SshPublic,
            Self::PgpRsa { .. } | Self::PgpCurve25519 => DisplayForm::PgpArmored,
        }
    }

    pub fn is_pgp(&self) -> bool {
        matches!(self, Self::PgpRsa { .. } | Self::PgpCurve25519)
    }

    /// Catalog group this spec belongs to.
    pub fn group(&self) -> &'static str {
        match self {
            Self::Aes { .. } => GROUP_SYMMETRIC,
            Self::RsaOaep { .. } => GROUP_ASYMMETRIC,
            Self::SshRsa { .. } | Self::SshEcdsa { .. } => GROUP_SSH,
            Self::RsaPss { .. } | Self::Ecdsa { .. } => GROUP_SIGNATURES,
            Self::Ecdh { .. } => GROUP_KEY_AGREEMENT,
            Self::Hmac { .. } => GROUP_MAC,
            Self::PgpRsa { .. } | Self::PgpCurve25519 => GROUP_PGP,
        }
    }
}

fn parse_rsa_bits(s: &str) -> Option<usize> {
    match s {
        "2048" => Some(2048),
        "4096" => Some(4096),
        _ => None,
    }
}

fn parse_sha(s: &str) -> Option<HashAlg> {
    s.parse().ok().and_then(HashAlg::from_bits)
}

fn parse_nist(s: &str) -> Option<NamedCurve> {
    match s {
        "256" => Some(NamedCurve::P256),
        "384" => Some(NamedCurve::P384),
        "521" => Some(NamedCurve::P521),
        _ => None,
    }
}

impl FromStr for AlgorithmSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let parts: Vec<&str> = upper.split('-').collect();
        let spec = match parts.as_slice() {
            ["AES", length, mode] => {
                let length: usize = length
                    .parse()
                    .ok()
                    .filter(|l| AES_KEY_BITS.contains(l))
                    .ok_or_else(|| unsupported(s))?;
                Self::Aes {
                    length,
                    mode: mode.parse().map_err(|_| unsupported(s))?,
                }
            }
            ["RSA", "OAEP", "SHA", hash, bits] => Self::RsaOaep {
                hash: parse_sha(hash).ok_or_else(|| unsupported(s))?,
                modulus_length: parse_rsa_bits(bits).ok_or_else(|| unsupported(s))?,
            },
            ["RSA", "PSS", bits] => Self::RsaPss {
                modulus_length: parse_rsa_bits(bits).ok_or_else(|| unsupported(s))?,
            },
            ["ECDSA", "P", size] => Self::Ecdsa {
                curve: parse_nist(size).ok_or_else(|| unsupported(s))?,
            },
            ["ECDH", "P", size] => Self::Ecdh {
                curve: parse_nist(size).ok_or_else(|| unsupported(s))?,
            },
            ["HMAC", "SHA", hash] => Self::Hmac {
                hash: parse_sha(hash).ok_or_else(|| unsupported(s))?,
            },
            ["SSH", "RSA", bits] => Self::SshRsa {
                modulus_length: parse_rsa_bits(bits).ok_or_else(|| unsupported(s))?,
            },
            ["SSH", "ECDSA", curve] => Self::SshEcdsa {
                curve: curve
                    .strip_prefix('P')
                    .and_then(parse_nist)
                    .ok_or_else(|| unsupported(s))?,
            },
            ["PGP", "RSA", "4096"] => Self::PgpRsa { bits: 4096 },
            ["PGP", "ECC", "CURVE25519"] => Self::PgpCurve25519,
            _ => return Err(unsupported(s)),
        };
        Ok(spec)
    }
}

fn unsupported(s: &str) -> Error {
    Error::InvalidInput(format!("Unsupported algorithm: {}", s))
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aes { length, mode } => write!(f, "AES-{}-{}", length, mode.as_str()),
            Self::RsaOaep {
                hash,
                modulus_length,
            } => write!(f, "RSA-OAEP-{}-{}", hash, modulus_length),
            Self::RsaPss { modulus_length } => write!(f, "RSA-PSS-{}", modulus_length),
            Self::Ecdsa { curve } => write!(f, "ECDSA-{}", curve),
            Self::Ecdh { curve } => write!(f, "ECDH-{}", curve),
            Self::Hmac { hash } => write!(f, "HMAC-{}", hash),
            Self::SshRsa { modulus_length } => write!(f, "SSH-RSA-{}", modulus_length),
            Self::SshEcdsa { curve } => {
                write!(f, "SSH-ECDSA-P{}", &curve.jwk_name()[2..])
            }
            Self::PgpRsa { bits } => write!(f, "PGP-RSA-{}", bits),
            Self::PgpCurve25519 => write!(f, "PGP-ECC-{}", PGP_CURVE25519),
        }
    }
}
