//! Format encoders and the container parsers the sniffer uses.
//!
//! Every encoder reads key material through the provider's export
//! capability and renders text. The SSH-family modules also parse their
//! own output back into [`KeyComponents`] so exported keys can be
//! re-imported.

pub mod jwk;
pub mod openssh;
pub mod pem;
pub mod pgp;
pub mod putty;
pub mod raw;
pub mod ssh;

use std::fmt;
use std::str::FromStr;

use tracing::info;

use keysmith_core::logging::{FORMAT, KIND, OPERATION, SUBSYSTEM};
use keysmith_core::{
    CryptoProvider, Error, FormatTag, KeyHandle, LoadedKey, Result, SerializedKey,
};

use crate::components::KeyComponents;

/// Output format selectable by callers.
///
/// JWK has a public and a private rendering; both carry the `jwk` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    PemSpki,
    PemPkcs8,
    JwkPublic,
    JwkPrivate,
    RawBase64,
    RawHex,
    SshPublic,
    OpensshPrivate,
    PuttyPrivate,
    PgpArmored,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 10] = [
        Self::PemSpki,
        Self::PemPkcs8,
        Self::JwkPublic,
        Self::JwkPrivate,
        Self::RawBase64,
        Self::RawHex,
        Self::SshPublic,
        Self::OpensshPrivate,
        Self::PuttyPrivate,
        Self::PgpArmored,
    ];

    pub fn tag(&self) -> FormatTag {
        match self {
            Self::PemSpki => FormatTag::PemSpki,
            Self::PemPkcs8 => FormatTag::PemPkcs8,
            Self::JwkPublic | Self::JwkPrivate => FormatTag::Jwk,
            Self::RawBase64 => FormatTag::RawBase64,
            Self::RawHex => FormatTag::RawHex,
            Self::SshPublic => FormatTag::SshPublic,
            Self::OpensshPrivate => FormatTag::OpensshPrivateV1,
            Self::PuttyPrivate => FormatTag::PuttyPpkV2,
            Self::PgpArmored => FormatTag::PgpArmored,
        }
    }

    /// Name accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PemSpki => "pem-spki",
            Self::PemPkcs8 => "pem-pkcs8",
            Self::JwkPublic => "jwk-public",
            Self::JwkPrivate => "jwk-private",
            Self::RawBase64 => "raw-base64",
            Self::RawHex => "raw-hex",
            Self::SshPublic => "ssh-public",
            Self::OpensshPrivate => "openssh-private-v1",
            Self::PuttyPrivate => "putty-ppk-v2",
            Self::PgpArmored => "pgp-armored",
        }
    }

    /// Human-readable name used in `UnsupportedKeyType` errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PemSpki | Self::PemPkcs8 => "PEM",
            Self::JwkPublic | Self::JwkPrivate => "JWK",
            Self::RawBase64 | Self::RawHex => "raw symmetric",
            Self::SshPublic => "SSH public key",
            Self::OpensshPrivate => "OpenSSH",
            Self::PuttyPrivate => "PuTTY",
            Self::PgpArmored => "PGP",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|f| f.as_str()).collect();
                Error::InvalidInput(format!(
                    "Unknown export format '{}'. Expected one of: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// A private SSH-family container decoded back into components.
#[derive(Debug)]
pub struct DecodedSshKey {
    pub components: KeyComponents,
    pub comment: String,
}

/// Render a provider handle in `format`.
///
/// `comment` applies to the SSH-family formats and is ignored elsewhere.
pub async fn export_key(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
    format: ExportFormat,
    comment: &str,
) -> Result<SerializedKey> {
    let serialized = match format {
        ExportFormat::PemSpki => pem::export_spki_pem(provider, key).await?,
        ExportFormat::PemPkcs8 => pem::export_pkcs8_pem(provider, key).await?,
        ExportFormat::JwkPublic => jwk::export_public_jwk(provider, key).await?,
        ExportFormat::JwkPrivate => jwk::export_private_jwk(provider, key).await?,
        ExportFormat::RawBase64 => raw::export_raw_base64(provider, key).await?,
        ExportFormat::RawHex => raw::export_raw_hex(provider, key).await?,
        ExportFormat::SshPublic => ssh::export_ssh_public(provider, key, comment).await?,
        ExportFormat::OpensshPrivate => {
            openssh::export_openssh_private(provider, key, comment).await?
        }
        ExportFormat::PuttyPrivate => putty::export_putty_private(provider, key, comment).await?,
        ExportFormat::PgpArmored => return Err(Error::unsupported_key_type(format.label())),
    };
    info!(
        { SUBSYSTEM } = "codec",
        { OPERATION } = "export",
        { FORMAT } = %serialized.format,
        { KIND } = %key.kind(),
        "Exported key"
    );
    Ok(serialized)
}

/// Render either key representation. PGP keys only support
/// [`ExportFormat::PgpArmored`].
pub async fn export_loaded(
    provider: &dyn CryptoProvider,
    key: &LoadedKey,
    format: ExportFormat,
    comment: &str,
) -> Result<SerializedKey> {
    match (key, format) {
        (LoadedKey::Pgp(pgp_key), ExportFormat::PgpArmored) => Ok(pgp::export_armored(pgp_key)),
        (LoadedKey::Pgp(_), other) => Err(Error::unsupported_key_type(other.label())),
        (LoadedKey::Provider(handle), format) => export_key(provider, handle, format, comment).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_roundtrip() {
        for format in ExportFormat::ALL {
            assert_eq!(format.as_str().parse::<ExportFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_jwk_variants_share_tag() {
        assert_eq!(ExportFormat::JwkPublic.tag(), FormatTag::Jwk);
        assert_eq!(ExportFormat::JwkPrivate.tag(), FormatTag::Jwk);
        assert_eq!(ExportFormat::OpensshPrivate.tag().as_str(), "openssh-private-v1");
    }

    #[test]
    fn test_unknown_format_lists_choices() {
        let err = "der".parse::<ExportFormat>().unwrap_err();
        assert!(err.to_string().contains("putty-ppk-v2"));
    }
}
