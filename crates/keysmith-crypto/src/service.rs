//! Orchestration: generation, export, import with inspection, and the
//! text-level encrypt/decrypt/sign/verify operations.
//!
//! [`KeyService`] owns the injected providers and routes each call to the
//! crypto provider or the PGP provider depending on the key it is given.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, instrument};

use keysmith_core::defaults::{
    CBC_IV_LENGTH, CTR_COUNTER_BITS, CTR_COUNTER_LENGTH, DEFAULT_COMMENT, GCM_IV_LENGTH,
    PSS_SALT_LENGTH,
};
use keysmith_core::logging::{ALGORITHM, KIND, OPERATION, SUBSYSTEM};
use keysmith_core::{
    AesMode, AlgorithmDescriptor, AlgorithmSpec, CipherParams, CryptoProvider, DisplayForm, Error,
    FormatTag, GeneratedKey, HashAlg, KeyGenerationResult, KeyHandle, KeyPair, KeyProperties, LoadedKey,
    PgpIdentity, PgpKeyOptions, PgpProvider, Result, SerializedKey, SignatureParams,
};

use crate::detect::{import_key, ImportedKey};
use crate::encoding::{base64_decode, base64_encode};
use crate::formats::{export_key, export_loaded, ExportFormat};
use crate::inspect::inspect;

/// Result of [`KeyService::import_and_inspect`].
#[derive(Debug)]
pub struct InspectedKey {
    pub key: LoadedKey,
    pub format: FormatTag,
    pub properties: KeyProperties,
}

/// Serializable summary of an [`InspectedKey`].
#[derive(Debug, Clone, Serialize)]
pub struct InspectionReport {
    pub format: FormatTag,
    #[serde(flatten)]
    pub properties: KeyProperties,
}

impl InspectedKey {
    pub fn report(&self) -> InspectionReport {
        InspectionReport {
            format: self.format,
            properties: self.properties.clone(),
        }
    }
}

/// Key-material service over injected providers.
#[derive(Clone)]
pub struct KeyService {
    provider: Arc<dyn CryptoProvider>,
    pgp_provider: Option<Arc<dyn PgpProvider>>,
}

impl KeyService {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            pgp_provider: None,
        }
    }

    pub fn with_pgp_provider(mut self, pgp_provider: Arc<dyn PgpProvider>) -> Self {
        self.pgp_provider = Some(pgp_provider);
        self
    }

    pub fn provider(&self) -> &dyn CryptoProvider {
        self.provider.as_ref()
    }

    fn pgp(&self) -> Result<&dyn PgpProvider> {
        self.pgp_provider.as_deref().ok_or(Error::PgpUnavailable)
    }

    // =========================================================================
    // GENERATION
    // =========================================================================

    /// Generate a key for `spec`. PGP specs need `identity`.
    ///
    /// All generated keys are extractable.
    #[instrument(skip(self, spec, identity), fields(subsystem = "service", op = "generate", algorithm = %spec))]
    pub async fn generate(
        &self,
        spec: &AlgorithmSpec,
        identity: Option<&PgpIdentity>,
    ) -> Result<KeyGenerationResult> {
        let result = match (spec.key_gen_params(), spec.pgp_key_type()) {
            (Some(params), _) => {
                let generated = self
                    .provider
                    .generate_key(&params, spec.usages(), true)
                    .await?;
                self.describe_generated(spec.display_form(), generated).await?
            }
            (None, Some(key_type)) => {
                let pgp = self.pgp()?;
                let identity = identity.ok_or_else(|| {
                    Error::InvalidInput("PGP keys need a name and email".into())
                })?;
                let generated = pgp
                    .generate_key(&PgpKeyOptions {
                        key_type,
                        identity: identity.clone(),
                    })
                    .await?;
                KeyGenerationResult::Pgp {
                    display_value: generated.public_armored.clone(),
                    public_key: generated.public_armored,
                    private_key: generated.private_armored,
                    key_id: generated.key_id,
                }
            }
            (None, None) => {
                return Err(Error::InvalidInput(format!(
                    "Unsupported algorithm: {}",
                    spec
                )))
            }
        };
        info!(
            { SUBSYSTEM } = "service",
            { OPERATION } = "generate",
            { ALGORITHM } = %spec,
            "Generated key"
        );
        Ok(result)
    }

    async fn describe_generated(
        &self,
        display: DisplayForm,
        generated: GeneratedKey,
    ) -> Result<KeyGenerationResult> {
        match generated {
            GeneratedKey::Secret(key) => {
                let display_value = self.display_value(&key, display).await?;
                Ok(KeyGenerationResult::Symmetric { key, display_value })
            }
            GeneratedKey::Pair(key_pair) => {
                let display_value = self.display_value(&key_pair.public_key, display).await?;
                Ok(KeyGenerationResult::Asymmetric {
                    key_pair,
                    display_value,
                })
            }
        }
    }

    async fn display_value(&self, key: &KeyHandle, display: DisplayForm) -> Result<String> {
        let format = match display {
            DisplayForm::RawBase64 => ExportFormat::RawBase64,
            DisplayForm::PublicPem => ExportFormat::PemSpki,
            DisplayForm::SshPublic => ExportFormat::SshPublic,
            DisplayForm::PgpArmored => ExportFormat::PgpArmored,
        };
        let serialized = export_key(self.provider(), key, format, DEFAULT_COMMENT).await?;
        Ok(serialized.text)
    }

    // =========================================================================
    // CODEC
    // =========================================================================

    /// Serialize `key` in `format`. `comment` applies to SSH-family formats.
    pub async fn export(
        &self,
        key: &LoadedKey,
        format: ExportFormat,
        comment: &str,
    ) -> Result<SerializedKey> {
        export_loaded(self.provider(), key, format, comment).await
    }

    /// Serialize one half of a generated pair.
    pub async fn export_pair(
        &self,
        key_pair: &KeyPair,
        format: ExportFormat,
        comment: &str,
    ) -> Result<SerializedKey> {
        let half = match format {
            ExportFormat::PemSpki | ExportFormat::JwkPublic | ExportFormat::SshPublic => {
                &key_pair.public_key
            }
            _ => &key_pair.private_key,
        };
        export_key(self.provider(), half, format, comment).await
    }

    /// Sniff, import and inspect an unknown blob.
    pub async fn import_and_inspect(&self, blob: &str) -> Result<InspectedKey> {
        let ImportedKey { key, format } =
            import_key(self.provider(), self.pgp_provider.as_deref(), blob).await?;
        let properties = inspect(self.provider(), &key).await?;
        Ok(InspectedKey {
            key,
            format,
            properties,
        })
    }

    pub async fn inspect(&self, key: &LoadedKey) -> Result<KeyProperties> {
        inspect(self.provider(), key).await
    }

    // =========================================================================
    // TEXT OPERATIONS
    // =========================================================================

    /// Encrypt UTF-8 text. AES output is `IV || ciphertext`, Base64.
    pub async fn encrypt_text(&self, key: &LoadedKey, plaintext: &str) -> Result<String> {
        let handle = match key {
            LoadedKey::Pgp(pgp_key) => return self.pgp()?.encrypt(pgp_key, plaintext.as_bytes()).await,
            LoadedKey::Provider(handle) => handle,
        };
        let data = plaintext.as_bytes();
        let output = match handle.algorithm() {
            AlgorithmDescriptor::RsaOaep { .. } => {
                self.provider
                    .encrypt(handle, &CipherParams::RsaOaep, data)
                    .await?
            }
            AlgorithmDescriptor::Aes { mode, .. } => {
                let mut iv = vec![0u8; iv_length(*mode)];
                OsRng.fill_bytes(&mut iv);
                let ciphertext = self
                    .provider
                    .encrypt(handle, &cipher_params(*mode, iv.clone()), data)
                    .await?;
                iv.extend_from_slice(&ciphertext);
                iv
            }
            other => return Err(unsupported(other, "encryption")),
        };
        log_text_op("encrypt", handle);
        Ok(base64_encode(&output))
    }

    /// Reverse [`encrypt_text`](Self::encrypt_text).
    pub async fn decrypt_text(
        &self,
        key: &LoadedKey,
        ciphertext: &str,
        passphrase: Option<&str>,
    ) -> Result<String> {
        let handle = match key {
            LoadedKey::Pgp(pgp_key) => {
                let plaintext = self.pgp()?.decrypt(pgp_key, ciphertext, passphrase).await?;
                return utf8(plaintext);
            }
            LoadedKey::Provider(handle) => handle,
        };
        let data = decode_input(ciphertext, "ciphertext")?;
        let plaintext = match handle.algorithm() {
            AlgorithmDescriptor::RsaOaep { .. } => {
                self.provider
                    .decrypt(handle, &CipherParams::RsaOaep, &data)
                    .await?
            }
            AlgorithmDescriptor::Aes { mode, .. } => {
                let split = iv_length(*mode);
                if data.len() < split {
                    return Err(Error::InvalidInput(format!(
                        "ciphertext is shorter than the {}-byte IV",
                        split
                    )));
                }
                let (iv, body) = data.split_at(split);
                self.provider
                    .decrypt(handle, &cipher_params(*mode, iv.to_vec()), body)
                    .await?
            }
            other => return Err(unsupported(other, "decryption")),
        };
        log_text_op("decrypt", handle);
        utf8(plaintext)
    }

    /// Sign UTF-8 text, returning a Base64 signature (armored for PGP).
    pub async fn sign_text(
        &self,
        key: &LoadedKey,
        message: &str,
        passphrase: Option<&str>,
    ) -> Result<String> {
        let handle = match key {
            LoadedKey::Pgp(pgp_key) => {
                return self
                    .pgp()?
                    .sign(pgp_key, message.as_bytes(), passphrase)
                    .await
            }
            LoadedKey::Provider(handle) => handle,
        };
        let params = signature_params(handle.algorithm())?;
        let signature = self
            .provider
            .sign(handle, &params, message.as_bytes())
            .await?;
        log_text_op("sign", handle);
        Ok(base64_encode(&signature))
    }

    /// Check a signature produced by [`sign_text`](Self::sign_text).
    ///
    /// A signature that is not Base64 is [`Error::InvalidInput`]; one that
    /// decodes but does not match is `Ok(false)`.
    pub async fn verify_text(&self, key: &LoadedKey, message: &str, signature: &str) -> Result<bool> {
        let handle = match key {
            LoadedKey::Pgp(pgp_key) => {
                return self
                    .pgp()?
                    .verify(pgp_key, signature, message.as_bytes())
                    .await
            }
            LoadedKey::Provider(handle) => handle,
        };
        let params = signature_params(handle.algorithm())?;
        let signature = decode_input(signature, "signature")?;
        let valid = self
            .provider
            .verify(handle, &params, &signature, message.as_bytes())
            .await?;
        debug!(
            { SUBSYSTEM } = "service",
            { OPERATION } = "verify",
            { ALGORITHM } = %handle.algorithm(),
            valid,
            "Verified signature"
        );
        Ok(valid)
    }
}

fn iv_length(mode: AesMode) -> usize {
    match mode {
        AesMode::Gcm => GCM_IV_LENGTH,
        AesMode::Cbc => CBC_IV_LENGTH,
        AesMode::Ctr => CTR_COUNTER_LENGTH,
    }
}

fn cipher_params(mode: AesMode, iv: Vec<u8>) -> CipherParams {
    match mode {
        AesMode::Gcm => CipherParams::AesGcm { iv },
        AesMode::Cbc => CipherParams::AesCbc { iv },
        AesMode::Ctr => CipherParams::AesCtr {
            counter: iv,
            length: CTR_COUNTER_BITS,
        },
    }
}

fn signature_params(algorithm: &AlgorithmDescriptor) -> Result<SignatureParams> {
    match algorithm {
        AlgorithmDescriptor::RsaPss { .. } => Ok(SignatureParams::RsaPss {
            salt_length: PSS_SALT_LENGTH,
        }),
        // SHA-256 on every curve, not the curve's conventional pairing.
        AlgorithmDescriptor::Ecdsa { .. } => Ok(SignatureParams::Ecdsa {
            hash: HashAlg::Sha256,
        }),
        AlgorithmDescriptor::Hmac { .. } => Ok(SignatureParams::Hmac),
        other => Err(unsupported(other, "signing")),
    }
}

fn unsupported(algorithm: &AlgorithmDescriptor, operation: &str) -> Error {
    Error::UnsupportedOperation(format!(
        "{} keys do not support {}",
        algorithm.name(),
        operation
    ))
}

fn decode_input(text: &str, what: &str) -> Result<Vec<u8>> {
    base64_decode(text.trim())
        .map_err(|_| Error::InvalidInput(format!("{} is not valid Base64", what)))
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidInput("decrypted data is not UTF-8 text".into()))
}

fn log_text_op(operation: &'static str, key: &KeyHandle) {
    debug!(
        { SUBSYSTEM } = "service",
        { OPERATION } = operation,
        { ALGORITHM } = %key.algorithm(),
        { KIND } = %key.kind(),
        "Completed text operation"
    );
}
