//! OpenSSH private-key v1 container (`PROTOCOL.key`), unencrypted.
//!
//! ```text
//! "openssh-key-v1\0"
//! string ciphername ("none")
//! string kdfname ("none")
//! string kdfoptions (empty)
//! uint32 number of keys (1)
//! string public key blob
//! string private section:
//!     uint32 checkint, uint32 checkint
//!     string keytype, key fields...
//!     string comment
//!     padding 1, 2, 3, ... to the block size
//! ```

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, trace};

use keysmith_core::defaults::{OPENSSH_AUTH_MAGIC, OPENSSH_BLOCK_SIZE, SSH_CIPHER_NONE};
use keysmith_core::logging::{COMPONENT, OPERATION, SUBSYSTEM};
use keysmith_core::{CryptoProvider, Error, FormatTag, KeyHandle, Result, SerializedKey};

use super::ssh::{curve_for_key_type, key_type, public_blob, SSH_RSA};
use super::DecodedSshKey;
use crate::components::{export_components, EcComponents, KeyComponents, RsaComponents};
use crate::encoding::{
    base64_decode, base64_encode, encode_mpint, pem_footer, pem_header, pem_unwrap, pem_wrap,
    put_ssh_string, SshReader,
};

pub const OPENSSH_LABEL: &str = "OPENSSH PRIVATE KEY";

const FORMAT: &str = "OpenSSH";

/// Build the container for private components with the given checkint.
pub fn encode(components: &KeyComponents, comment: &str, checkint: u32) -> Result<String> {
    let key_type = key_type(components, FORMAT)?;
    let public = public_blob(components, FORMAT)?;

    let mut private = Vec::new();
    private.extend_from_slice(&checkint.to_be_bytes());
    private.extend_from_slice(&checkint.to_be_bytes());
    put_ssh_string(&mut private, key_type.as_bytes());
    match components {
        KeyComponents::Rsa(RsaComponents {
            n,
            e,
            private: Some(secret),
        }) => {
            for field in [
                n.as_slice(),
                e.as_slice(),
                secret.d.as_slice(),
                secret.qi.as_slice(),
                secret.p.as_slice(),
                secret.q.as_slice(),
            ] {
                put_ssh_string(&mut private, &encode_mpint(field));
            }
        }
        KeyComponents::Ec(ec @ EcComponents { d: Some(d), .. }) => {
            put_ssh_string(&mut private, ec.curve.ssh_name().as_bytes());
            put_ssh_string(&mut private, &ec.uncompressed_point());
            put_ssh_string(&mut private, &encode_mpint(d));
        }
        _ => return Err(Error::unsupported_key_type(FORMAT)),
    }
    put_ssh_string(&mut private, comment.as_bytes());
    let pad_len = (OPENSSH_BLOCK_SIZE - private.len() % OPENSSH_BLOCK_SIZE) % OPENSSH_BLOCK_SIZE;
    private.extend((1..=pad_len).map(|i| i as u8));
    trace!(
        { SUBSYSTEM } = "codec",
        { COMPONENT } = "openssh",
        private_len = private.len(),
        pad_len,
        "Built private section"
    );

    let mut out = OPENSSH_AUTH_MAGIC.to_vec();
    put_ssh_string(&mut out, SSH_CIPHER_NONE.as_bytes());
    put_ssh_string(&mut out, SSH_CIPHER_NONE.as_bytes());
    put_ssh_string(&mut out, &[]);
    out.extend_from_slice(&1u32.to_be_bytes());
    put_ssh_string(&mut out, &public);
    put_ssh_string(&mut out, &private);

    Ok(pem_wrap(
        &base64_encode(&out),
        &pem_header(OPENSSH_LABEL),
        &pem_footer(OPENSSH_LABEL),
    ))
}

pub async fn export_openssh_private(
    provider: &dyn CryptoProvider,
    key: &KeyHandle,
    comment: &str,
) -> Result<SerializedKey> {
    let components = export_components(provider, key).await?;
    let text = encode(&components, comment, OsRng.next_u32())?;
    Ok(SerializedKey::new(FormatTag::OpensshPrivateV1, text))
}

pub fn is_openssh_private(text: &str) -> bool {
    text.starts_with(&pem_header(OPENSSH_LABEL))
}

/// Parse an unencrypted container back into private components.
pub fn parse(text: &str) -> Result<DecodedSshKey> {
    let bytes = base64_decode(&pem_unwrap(text))?;
    let mut reader = SshReader::new(&bytes);
    if reader.read_bytes(OPENSSH_AUTH_MAGIC.len())? != OPENSSH_AUTH_MAGIC {
        return Err(Error::malformed("missing openssh-key-v1 magic"));
    }
    let cipher = reader.read_str()?;
    let kdf = reader.read_str()?;
    reader.read_string()?;
    if cipher != SSH_CIPHER_NONE || kdf != SSH_CIPHER_NONE {
        return Err(Error::UnsupportedOperation(format!(
            "encrypted OpenSSH keys are not supported (cipher {}, kdf {})",
            cipher, kdf
        )));
    }
    let count = reader.read_u32()?;
    if count != 1 {
        return Err(Error::malformed(format!(
            "expected one key in container, found {}",
            count
        )));
    }
    let public = reader.read_string()?;
    let private = reader.read_string()?;
    if private.len() % OPENSSH_BLOCK_SIZE != 0 {
        return Err(Error::malformed(format!(
            "private section length {} is not a multiple of {}",
            private.len(),
            OPENSSH_BLOCK_SIZE
        )));
    }

    let mut section = SshReader::new(private);
    let check1 = section.read_u32()?;
    let check2 = section.read_u32()?;
    if check1 != check2 {
        return Err(Error::IntegrityMismatch(format!(
            "checkint mismatch ({:08x} != {:08x})",
            check1, check2
        )));
    }

    let key_type = section.read_str()?;
    let components = if key_type == SSH_RSA {
        let n = section.read_mpint()?;
        let e = section.read_mpint()?;
        let d = section.read_mpint()?;
        let iqmp = section.read_mpint()?;
        let p = section.read_mpint()?;
        let q = section.read_mpint()?;
        KeyComponents::Rsa(RsaComponents::from_ssh_private(n, e, d, iqmp, p, q)?)
    } else if let Some(curve) = curve_for_key_type(key_type) {
        let curve_name = section.read_str()?;
        if curve_name != curve.ssh_name() {
            return Err(Error::malformed(format!(
                "key type {} names curve {}",
                key_type, curve_name
            )));
        }
        let point = section.read_string()?;
        let d = section.read_mpint()?;
        KeyComponents::Ec(EcComponents::from_uncompressed_point(curve, point, Some(d))?)
    } else {
        return Err(Error::malformed(format!(
            "unsupported SSH key type {}",
            key_type
        )));
    };
    let comment = section.read_str()?.to_string();

    let padding = section.remaining();
    let expected = (1..=padding.len()).map(|i| i as u8);
    if padding.len() >= OPENSSH_BLOCK_SIZE || !padding.iter().copied().eq(expected) {
        return Err(Error::malformed("invalid private section padding"));
    }

    if public_blob(&components, FORMAT)? != public {
        return Err(Error::IntegrityMismatch(
            "public key does not match the private section".into(),
        ));
    }
    debug!(
        { SUBSYSTEM } = "codec",
        { COMPONENT } = "openssh",
        { OPERATION } = "parse",
        key_type,
        "Parsed OpenSSH private key"
    );
    Ok(DecodedSshKey {
        components,
        comment,
    })
}
