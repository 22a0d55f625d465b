//! SSH public-key wire format (RFC 4253 §6.6, RFC 5656 §3.1) and the
//! one-line `authorized_keys` rendering.

use keysmith_core::{CryptoProvider, Error, FormatTag, KeyHandle, NamedCurve, Result, SerializedKey};

use crate::components::{export_components, EcComponents, KeyComponents, RsaComponents};
use crate::encoding::{base64_decode, base64_encode, encode_mpint, put_ssh_string, SshReader};

pub const SSH_RSA: &str = "ssh-rsa";

/// Prefix of every ECDSA key type this crate handles.
pub const SSH_ECDSA_PREFIX: &str = "ecdsa-sha2-nistp";

/// SSH key type name for a key's components.
pub fn key_type(components: &KeyComponents, format: &str) -> Result<&'static str> {
    match components {
        KeyComponents::Rsa(_) => Ok(SSH_RSA),
        KeyComponents::Ec(ec) => Ok(ec.curve.ssh_key_type()),
        KeyComponents::Symmetric { .. } => Err(Error::unsupported_key_type(format)),
    }
}

/// Public wire blob: `string type ‖ mpint e ‖ mpint n` or
/// `string type ‖ string curve ‖ string Q`.
pub fn public_blob(components: &KeyComponents, format: &str) -> Result<Vec<u8>> {
    let key_type = key_type(components, format)?;
    let mut blob = Vec::new();
    put_ssh_string(&mut blob, key_type.as_bytes());
    match components {
        KeyComponents::Rsa(rsa) => {
            put_ssh_string(&mut blob, &encode_mpint(&rsa.e));
            put_ssh_string(&mut blob, &encode_mpint(&rsa.n));
        }
        KeyComponents::Ec(ec) => {
            put_ssh_string(&mut blob, ec.curve.ssh_name().as_bytes());
            put_ssh_string(&mut blob, &ec.uncompressed_point());
        }
        KeyComponents::Symmetric { .. } => {}
    }
    Ok(blob)
}

/// Resolve an `ecdsa-sha2-nistpNNN` type name.
pub fn curve_for_key_type(key_type: &str) -> Option<NamedCurve> {
    key_type
        .strip_prefix("ecdsa-sha2-")
        .and_then(NamedCurve::from_ssh_name)
}

/// Decode a public wire blob into public components.
pub fn parse_public_blob(blob: &[u8]) -> Result<KeyComponents> {
    let mut reader = SshReader::new(blob);
    let key_type = reader.read_str()?;
    let components = if key_type == SSH_RSA {
        let e = reader.read_mpint()?.to_vec();
        let n = reader.read_mpint()?.to_vec();
        KeyComponents::Rsa(RsaComponents {
            n,
            e,
            private: None,
        })
    } else if let Some(curve) = curve_for_key_type(key_type) {
        let curve_name = reader.read_str()?;
        if curve_name != curve.ssh_name() {
            return Err(Error::malformed(format!(
                "key type {} names curve {}",
                key_type, curve_name
            )));
        }
        let point = reader.read_string()?;
        KeyComponents::Ec(EcComponents::from_uncompressed_point(curve, point, None)?)
    } else {
        return Err(Error::malformed(format!("unsupported SSH key type {}", key_type)));
    };
    if !reader.is_empty() {
        return Err(Error::malformed("trailing bytes after SSH public key"));
    }
    Ok(components)
}

/// `"<type> <base64> <comment>"`.
pub fn encode_public_line(components: &KeyComponents, comment: &str) -> Result<String> {
    let key_type = key_type(components, "SSH public key")?;
    let blob = public_blob(components, "SSH public key")?;
    Ok(format!("{} {} {}", key_type, base64_encode(&blob), comment))
}

/// Whether `text` looks like a public key line this crate can read.
pub fn is_public_line(text: &str) -> bool {
    text.starts_with("ssh-rsa ") || text.starts_with(SSH_ECDSA_PREFIX)
}

/// Parse a public key line. The comment is empty when absent.
pub fn parse_public_line(text: &str) -> Result<(KeyComponents, String)> {
    let mut fields = text.trim().splitn(3, char::is_whitespace);
    let (Some(key_type), Some(body)) = (fields.next(), fields.next()) else {
        return Err(Error::malformed("SSH public key line needs a type and a body"));
    };
    let comment = fields.next().unwrap_or_default().trim().to_string();
    let blob = base64_decode(body)?;
    let components = parse_public_blob(&blob)?;
    let embedded = self::key_type(&components, "SSH public key")?;
    if embedded != key_type {
        return Err(Error::malformed(format!(
            "line says {} but the key blob is {}",
            key_type, embedded
        )));
    }
    Ok((components, comment))
}

pub async fn export_ssh_public(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
    comment: &str,
) -> Result<SerializedKey> {
    let components = export_components(provider, key).await?;
    let line = encode_public_line(&components, comment)?;
    Ok(SerializedKey::new(FormatTag::SshPublic, line))
}
