//! PuTTY `.ppk` version 2 private key files, unencrypted.
//!
//! The `Private-MAC` line is HMAC-SHA1 keyed with
//! `SHA1("putty-private-key-file-mac-key")` over the length-prefixed
//! key type, encryption name, comment, public blob and private blob.

use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use tracing::debug;

use keysmith_core::defaults::{PEM_LINE_WIDTH, PUTTY_MAC_KEY_LABEL, SSH_CIPHER_NONE};
use keysmith_core::logging::{COMPONENT, OPERATION, SUBSYSTEM};
use keysmith_core::{CryptoProvider, Error, FormatTag, KeyHandle, Result, SerializedKey};

use super::ssh::{key_type, parse_public_blob, public_blob};
use super::DecodedSshKey;
use crate::components::{export_components, EcComponents, KeyComponents, RsaComponents};
use crate::encoding::{
    base64_decode, base64_encode, chunk_lines, encode_mpint, hex_decode, hex_encode,
    put_ssh_string, SshReader,
};

type HmacSha1 = Hmac<Sha1>;

pub const PUTTY_V2_HEADER: &str = "PuTTY-User-Key-File-2";

const FORMAT: &str = "PuTTY";

fn mac_engine(
    key_type: &str,
    encryption: &str,
    comment: &str,
    public: &[u8],
    private: &[u8],
) -> Result<HmacSha1> {
    let mac_key = Sha1::digest(PUTTY_MAC_KEY_LABEL.as_bytes());
    let mut mac = HmacSha1::new_from_slice(&mac_key)
        .map_err(|e| Error::ProviderRejected(format!("HMAC-SHA1 key: {}", e)))?;
    let mut data = Vec::new();
    put_ssh_string(&mut data, key_type.as_bytes());
    put_ssh_string(&mut data, encryption.as_bytes());
    put_ssh_string(&mut data, comment.as_bytes());
    put_ssh_string(&mut data, public);
    put_ssh_string(&mut data, private);
    mac.update(&data);
    Ok(mac)
}

/// `Private-MAC` bytes for the given fields.
pub fn private_mac(
    key_type: &str,
    encryption: &str,
    comment: &str,
    public: &[u8],
    private: &[u8],
) -> Result<Vec<u8>> {
    let mac = mac_engine(key_type, encryption, comment, public, private)?;
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Private blob: mpints `d, p, q, iqmp` for RSA, the scalar for EC.
fn private_blob(components: &KeyComponents) -> Result<Vec<u8>> {
    let mut blob = Vec::new();
    match components {
        KeyComponents::Rsa(RsaComponents {
            private: Some(secret),
            ..
        }) => {
            for field in [&secret.d, &secret.p, &secret.q, &secret.qi] {
                put_ssh_string(&mut blob, &encode_mpint(field));
            }
        }
        KeyComponents::Ec(EcComponents { d: Some(d), .. }) => {
            put_ssh_string(&mut blob, &encode_mpint(d));
        }
        _ => return Err(Error::unsupported_key_type(FORMAT)),
    }
    Ok(blob)
}

/// Render a `.ppk` v2 file, lines joined with `\n`.
pub fn encode(components: &KeyComponents, comment: &str) -> Result<String> {
    let key_type = key_type(components, FORMAT)?;
    let private = private_blob(components)?;
    let public = public_blob(components, FORMAT)?;
    let mac = private_mac(key_type, SSH_CIPHER_NONE, comment, &public, &private)?;

    let public_b64 = base64_encode(&public);
    let private_b64 = base64_encode(&private);
    let public_lines = chunk_lines(&public_b64, PEM_LINE_WIDTH);
    let private_lines = chunk_lines(&private_b64, PEM_LINE_WIDTH);

    let mut lines = vec![
        format!("{}: {}", PUTTY_V2_HEADER, key_type),
        format!("Encryption: {}", SSH_CIPHER_NONE),
        format!("Comment: {}", comment),
        format!("Public-Lines: {}", public_lines.len()),
    ];
    lines.extend(public_lines.iter().map(|l| l.to_string()));
    lines.push(format!("Private-Lines: {}", private_lines.len()));
    lines.extend(private_lines.iter().map(|l| l.to_string()));
    lines.push(format!("Private-MAC: {}", hex_encode(&mac)));
    Ok(lines.join("\n"))
}

pub async fn export_putty_private(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
    comment: &str,
) -> Result<SerializedKey> {
    let components = export_components(provider, key).await?;
    let text = encode(&components, comment)?;
    Ok(SerializedKey::new(FormatTag::PuttyPpkV2, text))
}

pub fn is_putty_private(text: &str) -> bool {
    text.starts_with(PUTTY_V2_HEADER)
}

/// Line cursor over a `.ppk` file.
struct PpkLines<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> PpkLines<'a> {
    /// Next line, which must be `name: value`.
    fn header(&mut self, name: &str) -> Result<&'a str> {
        let line = self
            .lines
            .next()
            .ok_or_else(|| Error::malformed(format!("PuTTY file ends before {}", name)))?;
        line.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(": "))
            .map(|value| value.trim_end_matches('\r'))
            .ok_or_else(|| Error::malformed(format!("expected PuTTY {} line", name)))
    }

    /// `name: N` followed by N Base64 lines.
    fn blob(&mut self, name: &str) -> Result<Vec<u8>> {
        let count: usize = self
            .header(name)?
            .parse()
            .map_err(|_| Error::malformed(format!("PuTTY {} is not a number", name)))?;
        let mut body = String::new();
        for _ in 0..count {
            let line = self
                .lines
                .next()
                .ok_or_else(|| Error::malformed(format!("PuTTY {} body is truncated", name)))?;
            body.push_str(line.trim());
        }
        base64_decode(&body)
    }
}

/// Parse a `.ppk` v2 file and verify its MAC.
pub fn parse(text: &str) -> Result<DecodedSshKey> {
    let mut lines = PpkLines {
        lines: text.lines(),
    };
    let key_type = lines.header(PUTTY_V2_HEADER)?;
    let encryption = lines.header("Encryption")?;
    if encryption != SSH_CIPHER_NONE {
        return Err(Error::UnsupportedOperation(format!(
            "encrypted PuTTY keys are not supported ({})",
            encryption
        )));
    }
    let comment = lines.header("Comment")?;
    let public = lines.blob("Public-Lines")?;
    let private = lines.blob("Private-Lines")?;
    let mac = hex_decode(lines.header("Private-MAC")?)?;

    mac_engine(key_type, encryption, comment, &public, &private)?
        .verify_slice(&mac)
        .map_err(|_| Error::IntegrityMismatch("PuTTY Private-MAC does not match".into()))?;

    let components = match parse_public_blob(&public)? {
        KeyComponents::Rsa(rsa) => {
            let mut reader = SshReader::new(&private);
            let d = reader.read_mpint()?;
            let p = reader.read_mpint()?;
            let q = reader.read_mpint()?;
            let iqmp = reader.read_mpint()?;
            KeyComponents::Rsa(RsaComponents::from_ssh_private(
                &rsa.n, &rsa.e, d, iqmp, p, q,
            )?)
        }
        KeyComponents::Ec(ec) => {
            let mut reader = SshReader::new(&private);
            let d = reader.read_mpint()?;
            KeyComponents::Ec(EcComponents::from_uncompressed_point(
                ec.curve,
                &ec.uncompressed_point(),
                Some(d),
            )?)
        }
        KeyComponents::Symmetric { .. } => return Err(Error::unsupported_key_type(FORMAT)),
    };
    if self::key_type(&components, FORMAT)? != key_type {
        return Err(Error::malformed(format!(
            "header says {} but the public blob is another type",
            key_type
        )));
    }
    debug!(
        { SUBSYSTEM } = "codec",
        { COMPONENT } = "putty",
        { OPERATION } = "parse",
        key_type,
        "Parsed PuTTY private key"
    );
    Ok(DecodedSshKey {
        components,
        comment: comment.to_string(),
    })
}
