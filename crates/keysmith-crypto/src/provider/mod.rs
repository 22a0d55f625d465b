//! Cryptographic providers.

mod software;

pub use software::SoftwareProvider;
