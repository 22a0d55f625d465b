//! # keysmith-crypto
//!
//! Key-material codec for keysmith.
//!
//! This crate converts provider-managed keys to and from the serialized
//! formats people actually paste around, and works out what an unknown blob
//! is. All cryptography is reached through the
//! [`CryptoProvider`](keysmith_core::CryptoProvider) and
//! [`PgpProvider`](keysmith_core::PgpProvider) capabilities.
//!
//! ## Formats
//!
//! | Format | Export | Import |
//! |--------|--------|--------|
//! | PEM SPKI / PKCS#8 | yes | yes |
//! | JWK (public, private) | yes | yes |
//! | Raw Base64 / hex (AES) | yes | yes |
//! | SSH public line (`ssh-rsa`, `ecdsa-sha2-nistp*`) | yes | yes |
//! | OpenSSH private key v1, unencrypted | yes | yes |
//! | PuTTY `.ppk` v2, unencrypted | yes | yes |
//! | PGP armored | passthrough | via the PGP provider |
//!
//! ## Examples
//!
//! ### Generate and Export
//!
//! ```rust
//! use std::sync::Arc;
//! use keysmith_crypto::{ExportFormat, KeyService, SoftwareProvider};
//! use keysmith_core::{KeyGenerationResult, LoadedKey};
//!
//! # #[tokio::main]
//! # async fn main() -> keysmith_core::Result<()> {
//! let service = KeyService::new(Arc::new(SoftwareProvider::new()));
//! let generated = service.generate(&"ECDSA-P-256".parse()?, None).await?;
//! assert!(generated.display_value().starts_with("-----BEGIN PUBLIC KEY-----"));
//!
//! if let KeyGenerationResult::Asymmetric { key_pair, .. } = generated {
//!     let private = LoadedKey::Provider(key_pair.private_key);
//!     let ppk = service.export(&private, ExportFormat::PuttyPrivate, "laptop").await?;
//!     assert!(ppk.text.starts_with("PuTTY-User-Key-File-2: ecdsa-sha2-nistp256"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Inspect an Unknown Blob
//!
//! ```rust
//! use std::sync::Arc;
//! use keysmith_crypto::{KeyService, SoftwareProvider};
//!
//! # #[tokio::main]
//! # async fn main() -> keysmith_core::Result<()> {
//! let service = KeyService::new(Arc::new(SoftwareProvider::new()));
//! let inspected = service
//!     .import_and_inspect("AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=")
//!     .await?;
//! assert_eq!(inspected.properties.algorithm, "AES-GCM");
//! assert_eq!(inspected.properties.size, "256 bits");
//! # Ok(())
//! # }
//! ```

pub mod components;
pub mod detect;
pub mod encoding;
pub mod formats;
pub mod inspect;
pub mod mock;
pub mod provider;
pub mod service;

// Re-export commonly used types
pub use components::{EcComponents, KeyComponents, RsaComponents};
pub use detect::{import_key, ImportedKey};
pub use formats::{export_key, export_loaded, ExportFormat};
pub use inspect::inspect;
pub use provider::SoftwareProvider;
pub use service::{InspectedKey, InspectionReport, KeyService};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;

    use keysmith_core::{FormatTag, KeyGenerationResult, KeyKind, LoadedKey};

    /// Generate, export to every private container, and read each back.
    #[tokio::test]
    async fn test_ssh_containers_roundtrip_through_sniffer() {
        let service = KeyService::new(Arc::new(SoftwareProvider::new()));
        let KeyGenerationResult::Asymmetric { key_pair, .. } = service
            .generate(&"SSH-ECDSA-P521".parse().unwrap(), None)
            .await
            .unwrap()
        else {
            panic!("expected a key pair");
        };
        let private = LoadedKey::Provider(key_pair.private_key);
        let original = service.inspect(&private).await.unwrap();

        for (format, tag) in [
            (ExportFormat::OpensshPrivate, FormatTag::OpensshPrivateV1),
            (ExportFormat::PuttyPrivate, FormatTag::PuttyPpkV2),
            (ExportFormat::PemPkcs8, FormatTag::PemPkcs8),
            (ExportFormat::JwkPrivate, FormatTag::Jwk),
        ] {
            let text = service.export(&private, format, "roundtrip").await.unwrap();
            let inspected = service.import_and_inspect(&text.text).await.unwrap();
            assert_eq!(inspected.format, tag);
            assert_eq!(inspected.properties.key_type, KeyKind::Private);
            assert_eq!(inspected.properties.algorithm, "ECDSA");
            assert_eq!(inspected.properties.size, original.size);
        }
    }

    /// Sign with a re-imported private container, verify with the public line.
    #[tokio::test]
    async fn test_signature_survives_format_change() {
        let service = KeyService::new(Arc::new(SoftwareProvider::new()));
        let KeyGenerationResult::Asymmetric { key_pair, display_value } = service
            .generate(&"SSH-ECDSA-P256".parse().unwrap(), None)
            .await
            .unwrap()
        else {
            panic!("expected a key pair");
        };
        let private = LoadedKey::Provider(key_pair.private_key);
        let openssh = service
            .export(&private, ExportFormat::OpensshPrivate, "signer")
            .await
            .unwrap();

        let signer = service.import_and_inspect(&openssh.text).await.unwrap();
        let verifier = service.import_and_inspect(&display_value).await.unwrap();
        assert_eq!(verifier.format, FormatTag::SshPublic);

        let signature = service.sign_text(&signer.key, "payload", None).await.unwrap();
        assert!(service
            .verify_text(&verifier.key, "payload", &signature)
            .await
            .unwrap());
    }
}
