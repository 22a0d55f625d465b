//! Binary encoding primitives shared by every format codec.
//!
//! SSH-derived formats (RFC 4253 §5) frame every field as a 4-byte
//! big-endian length followed by the payload. Integers are "mpints":
//! two's-complement big-endian, so a magnitude whose top bit is set gets a
//! leading zero byte, and zero is the empty string.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use keysmith_core::defaults::PEM_LINE_WIDTH;
use keysmith_core::{Error, Result};

/// Base64URL without padding on encode; decoding accepts padded or bare input.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Standard alphabet, lenient on padding and trailing bits.
const BASE64_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// =============================================================================
// TEXT ENCODINGS
// =============================================================================

/// Standard padded Base64.
pub fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode standard Base64, ignoring embedded whitespace and missing padding.
pub fn base64_decode(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_LENIENT
        .decode(compact)
        .map_err(|e| Error::malformed(format!("invalid Base64: {}", e)))
}

/// Base64URL without padding.
pub fn base64url_encode(data: &[u8]) -> String {
    BASE64_URL.encode(data)
}

pub fn base64url_decode(text: &str) -> Result<Vec<u8>> {
    BASE64_URL
        .decode(text)
        .map_err(|e| Error::malformed(format!("invalid Base64URL: {}", e)))
}

/// Lower-case hex.
pub fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

pub fn hex_decode(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| Error::malformed(format!("invalid hex: {}", e)))
}

// =============================================================================
// PEM
// =============================================================================

/// Split text into lines of at most `width` characters.
///
/// Input is ASCII (Base64), so byte offsets are character offsets.
pub fn chunk_lines(text: &str, width: usize) -> Vec<&str> {
    text.as_bytes()
        .chunks(width.max(1))
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect()
}

/// Frame Base64 text between PEM boundary lines, 64 columns per line.
///
/// No trailing newline follows the footer.
pub fn pem_wrap(base64: &str, header: &str, footer: &str) -> String {
    let mut out = String::with_capacity(base64.len() + base64.len() / PEM_LINE_WIDTH + 80);
    out.push_str(header);
    out.push('\n');
    for line in chunk_lines(base64, PEM_LINE_WIDTH) {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(footer);
    out
}

/// PEM header line for a label, e.g. `-----BEGIN PUBLIC KEY-----`.
pub fn pem_header(label: &str) -> String {
    format!("-----BEGIN {}-----", label)
}

/// PEM footer line for a label.
pub fn pem_footer(label: &str) -> String {
    format!("-----END {}-----", label)
}

/// Remove `PUBLIC KEY` and `[WORD ]PRIVATE KEY` boundary lines and all
/// whitespace, leaving the Base64 body.
///
/// Other boundaries (certificates, PGP armor) are left in place so the body
/// fails to decode.
pub fn pem_unwrap(pem: &str) -> String {
    let mut body = String::with_capacity(pem.len());
    let mut rest = pem;
    while let Some(start) = rest.find("-----") {
        body.push_str(&rest[..start]);
        let after = &rest[start + 5..];
        match after.find("-----") {
            Some(end) if is_key_boundary(&after[..end]) => rest = &after[end + 5..],
            _ => {
                body.push_str("-----");
                rest = after;
            }
        }
    }
    body.push_str(rest);
    body.retain(|c| !c.is_whitespace());
    body
}

fn is_key_boundary(label: &str) -> bool {
    let Some(kind) = label
        .strip_prefix("BEGIN ")
        .or_else(|| label.strip_prefix("END "))
    else {
        return false;
    };
    if kind == "PUBLIC KEY" {
        return true;
    }
    match kind.strip_suffix("PRIVATE KEY") {
        Some("") => true,
        Some(prefix) => prefix
            .strip_suffix(' ')
            .is_some_and(|word| !word.is_empty() && word.bytes().all(|b| b.is_ascii_uppercase())),
        None => false,
    }
}

// =============================================================================
// SSH WIRE ENCODING
// =============================================================================

/// Length-prefix `data` with a 4-byte big-endian length.
pub fn write_ssh_string(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    put_ssh_string(&mut out, data);
    out
}

/// Append a length-prefixed field to `out`.
pub fn put_ssh_string(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Encode an unsigned big-endian magnitude as mpint payload bytes.
///
/// Leading zero bytes are dropped first, so zero encodes as empty.
pub fn encode_mpint(magnitude: &[u8]) -> Vec<u8> {
    let first = magnitude
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(magnitude.len());
    let digits = &magnitude[first..];
    let mut out = Vec::with_capacity(digits.len() + 1);
    if digits.first().is_some_and(|&b| b & 0x80 != 0) {
        out.push(0x00);
    }
    out.extend_from_slice(digits);
    out
}

/// Decode a Base64URL magnitude (a JWK member) into mpint payload bytes.
pub fn mpint_from_base64url(b64url: &str) -> Result<Vec<u8>> {
    Ok(encode_mpint(&base64url_decode(b64url)?))
}

/// Bounds-checked cursor over SSH wire data.
#[derive(Debug, Clone)]
pub struct SshReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SshReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Take the next `len` bytes verbatim.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::malformed(format!(
                    "truncated SSH data: wanted {} bytes at offset {}, have {}",
                    len,
                    self.pos,
                    self.buf.len() - self.pos
                ))
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a length-prefixed field.
    pub fn read_string(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Read a length-prefixed UTF-8 field.
    pub fn read_str(&mut self) -> Result<&'a str> {
        let bytes = self.read_string()?;
        std::str::from_utf8(bytes).map_err(|_| Error::malformed("SSH string is not UTF-8"))
    }

    /// Read an mpint and return its unsigned magnitude without leading zeros.
    pub fn read_mpint(&mut self) -> Result<&'a [u8]> {
        let bytes = self.read_string()?;
        if bytes.first().is_some_and(|&b| b & 0x80 != 0) {
            return Err(Error::malformed("negative mpint"));
        }
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Ok(&bytes[first..])
    }

    /// Everything not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}
