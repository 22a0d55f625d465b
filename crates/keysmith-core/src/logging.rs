//! Structured logging field names for keysmith.
//!
//! All crates use these constants for structured `tracing` fields so log
//! output can be filtered by the same names everywhere.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Unused by the library; failures are returned as values |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Completed generation, import, and export operations |
//! | DEBUG | Decision points: sniffer branches, candidate attempts |
//! | TRACE | Per-field encoding detail |
//!
//! Key material never appears in any field.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "codec", "sniffer", "inspector", "provider", "service", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "openssh", "putty", "jwk", "software"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "generate", "export", "import", "inspect", "sign"
pub const OPERATION: &str = "op";

// ─── Key fields ────────────────────────────────────────────────────────────

/// Serialized format tag (`pem-spki`, `openssh-private-v1`, ...).
pub const FORMAT: &str = "format";

/// Algorithm descriptor or catalog value.
pub const ALGORITHM: &str = "algorithm";

/// Speculative import candidate being attempted.
pub const CANDIDATE: &str = "candidate";

/// Key kind (`public`, `private`, `secret`).
pub const KIND: &str = "kind";

/// Byte length of decoded input.
pub const BYTE_LEN: &str = "byte_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
