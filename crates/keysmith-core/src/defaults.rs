//! Centralized default constants for keysmith.
//!
//! Every crate references these constants instead of repeating magic
//! numbers. Values that are fixed by an external format (PEM, OpenSSH,
//! PuTTY) live here too so the encoders and their tests agree.

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Comment appended to SSH public keys and embedded in private containers.
pub const DEFAULT_COMMENT: &str = "user@hostname";

/// Column width of PEM and PuTTY Base64 bodies.
pub const PEM_LINE_WIDTH: usize = 64;

/// Cipher block size used to pad the OpenSSH private section.
pub const OPENSSH_BLOCK_SIZE: usize = 8;

/// Magic prefix of the OpenSSH private-key v1 container (NUL included).
pub const OPENSSH_AUTH_MAGIC: &[u8; 15] = b"openssh-key-v1\0";

/// Cipher and KDF name used for unencrypted SSH containers.
pub const SSH_CIPHER_NONE: &str = "none";

/// Secret hashed with SHA-1 to derive the PuTTY v2 MAC key.
pub const PUTTY_MAC_KEY_LABEL: &str = "putty-private-key-file-mac-key";

// =============================================================================
// KEY GENERATION
// =============================================================================

/// RSA public exponent (65537).
pub const RSA_PUBLIC_EXPONENT: u32 = 65_537;

/// RSA-PSS salt length in bytes.
pub const PSS_SALT_LENGTH: usize = 32;

// =============================================================================
// SYMMETRIC ENCRYPTION
// =============================================================================

/// AES-GCM nonce length in bytes.
pub const GCM_IV_LENGTH: usize = 12;

/// AES-CBC IV length in bytes.
pub const CBC_IV_LENGTH: usize = 16;

/// AES-CTR counter block length in bytes.
pub const CTR_COUNTER_LENGTH: usize = 16;

/// Number of counter bits in the AES-CTR counter block.
pub const CTR_COUNTER_BITS: u32 = 64;

/// Accepted raw AES key lengths in bits, in sniffing order.
pub const AES_KEY_BITS: [usize; 3] = [128, 192, 256];
