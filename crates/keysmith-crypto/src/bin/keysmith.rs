//! keysmith: command-line tool for key generation, conversion and inspection.
//!
//! Results are printed as JSON on stdout. Key and message text is read from
//! files or stdin; nothing is written to disk.

use clap::{Parser, Subcommand};
use keysmith_core::catalog::{compose_spec, key_size_options, ALGORITHM_OPTIONS, USAGE_GROUPS};
use keysmith_core::defaults::DEFAULT_COMMENT;
use keysmith_core::{AlgorithmSpec, KeyGenerationResult, LoadedKey, PgpIdentity};
use keysmith_crypto::{ExportFormat, KeyService, SoftwareProvider};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keysmith")]
#[command(author, version, about = "Generate, convert and inspect cryptographic keys")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the algorithms and key sizes that can be generated
    Algorithms,

    /// Generate a new key
    Generate {
        /// Algorithm, e.g. AES-256-GCM, RSA-PSS-4096 or SSH-ECDSA
        algorithm: String,

        /// Key size or curve when ALGORITHM names only the family
        #[arg(short, long)]
        size: Option<String>,

        /// Also render the public key in this format
        #[arg(long)]
        public_format: Option<ExportFormat>,

        /// Also render the private key in this format
        #[arg(long)]
        private_format: Option<ExportFormat>,

        /// Comment for SSH-family formats
        #[arg(short, long)]
        comment: Option<String>,

        /// Name for PGP keys
        #[arg(long)]
        name: Option<String>,

        /// Email for PGP keys
        #[arg(long)]
        email: Option<String>,

        /// Passphrase for PGP keys
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// Detect the format of a key and show its properties
    Inspect {
        /// Key file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Convert a key to another format
    Convert {
        /// Target format
        #[arg(short, long)]
        to: ExportFormat,

        /// Key file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Comment for SSH-family formats
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// Encrypt text with a key
    Encrypt {
        /// Key file
        #[arg(short, long)]
        key: PathBuf,

        /// Plaintext file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Decrypt text with a key
    Decrypt {
        /// Key file
        #[arg(short, long)]
        key: PathBuf,

        /// Ciphertext file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Passphrase for PGP private keys
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Sign text with a private or secret key
    Sign {
        /// Key file
        #[arg(short, long)]
        key: PathBuf,

        /// Message file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Passphrase for PGP private keys
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Verify a signature over text
    Verify {
        /// Key file
        #[arg(short, long)]
        key: PathBuf,

        /// Signature file
        #[arg(short, long)]
        signature: PathBuf,

        /// Message file (default: stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

/// Settings taken from the environment. Command-line flags win.
struct Config {
    comment: String,
}

impl Config {
    fn from_env() -> Self {
        Self {
            comment: std::env::var("KEYSMITH_COMMENT")
                .ok()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COMMENT.to_string()),
        }
    }

    fn comment(&self, flag: Option<String>) -> String {
        flag.unwrap_or_else(|| self.comment.clone())
    }
}

// Logging goes to stderr so stdout stays machine-readable.
//   LOG_FORMAT - "json" or "text" (default: "text")
//   RUST_LOG   - standard env filter (default: "warn")
fn init_logging() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env();

    match run(cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let service = KeyService::new(Arc::new(SoftwareProvider::new()));

    match cli.command {
        Commands::Algorithms => {
            cmd_algorithms()?;
        }
        Commands::Generate {
            algorithm,
            size,
            public_format,
            private_format,
            comment,
            name,
            email,
            passphrase,
        } => {
            let identity = match (name, email) {
                (Some(name), Some(email)) => Some(PgpIdentity {
                    name,
                    email,
                    passphrase,
                }),
                _ => None,
            };
            let formats = (public_format, private_format);
            cmd_generate(
                &service,
                &algorithm,
                size.as_deref(),
                formats,
                &config.comment(comment),
                identity.as_ref(),
            )
            .await?;
        }
        Commands::Inspect { input } => {
            cmd_inspect(&service, input.as_deref()).await?;
        }
        Commands::Convert { to, input, comment } => {
            cmd_convert(&service, to, input.as_deref(), &config.comment(comment)).await?;
        }
        Commands::Encrypt { key, input } => {
            cmd_encrypt(&service, &key, input.as_deref()).await?;
        }
        Commands::Decrypt {
            key,
            input,
            passphrase,
        } => {
            cmd_decrypt(&service, &key, input.as_deref(), passphrase.as_deref()).await?;
        }
        Commands::Sign {
            key,
            input,
            passphrase,
        } => {
            cmd_sign(&service, &key, input.as_deref(), passphrase.as_deref()).await?;
        }
        Commands::Verify {
            key,
            signature,
            input,
        } => {
            cmd_verify(&service, &key, &signature, input.as_deref()).await?;
        }
    }

    Ok(())
}

/// Read a file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> std::io::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_key(service: &KeyService, path: &Path) -> Result<LoadedKey, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(service.import_and_inspect(&text).await?.key)
}

/// Full spec strings parse directly; bare family names take `--size`.
fn resolve_spec(algorithm: &str, size: Option<&str>) -> keysmith_core::Result<AlgorithmSpec> {
    match size {
        Some(size) => compose_spec(algorithm, Some(size)),
        None => algorithm
            .parse()
            .or_else(|_| compose_spec(algorithm, None)),
    }
}

fn cmd_algorithms() -> Result<(), Box<dyn std::error::Error>> {
    let groups: Vec<serde_json::Value> = USAGE_GROUPS
        .iter()
        .map(|group| {
            let algorithms: Vec<serde_json::Value> = ALGORITHM_OPTIONS
                .iter()
                .filter(|o| o.group == group.group)
                .map(|o| {
                    let sizes: Vec<&str> =
                        key_size_options(o.value).iter().map(|s| s.value).collect();
                    serde_json::json!({
                        "value": o.value,
                        "label": o.label,
                        "description": o.description,
                        "sizes": sizes,
                    })
                })
                .collect();
            serde_json::json!({
                "group": group.group,
                "description": group.short_description,
                "algorithms": algorithms,
            })
        })
        .collect();

    print_json(&serde_json::Value::Array(groups))
}

async fn cmd_generate(
    service: &KeyService,
    algorithm: &str,
    size: Option<&str>,
    (public_format, private_format): (Option<ExportFormat>, Option<ExportFormat>),
    comment: &str,
    identity: Option<&PgpIdentity>,
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = resolve_spec(algorithm, size)?;
    let generated = service.generate(&spec, identity).await?;

    let mut output = serde_json::json!({
        "algorithm": spec.to_string(),
        "display_value": generated.display_value(),
    });

    match &generated {
        KeyGenerationResult::Symmetric { key, .. } => {
            let loaded_format = public_format.or(private_format);
            if let Some(format) = loaded_format {
                let rendered = keysmith_crypto::export_key(service.provider(), key, format, comment)
                    .await?;
                output["key"] = serde_json::json!({
                    "format": rendered.format,
                    "text": rendered.text,
                });
            }
        }
        KeyGenerationResult::Asymmetric { key_pair, .. } => {
            if let Some(format) = public_format {
                let rendered = service.export_pair(key_pair, format, comment).await?;
                output["public_key"] = serde_json::json!({
                    "format": rendered.format,
                    "text": rendered.text,
                });
            }
            if let Some(format) = private_format {
                let rendered = service.export_pair(key_pair, format, comment).await?;
                output["private_key"] = serde_json::json!({
                    "format": rendered.format,
                    "text": rendered.text,
                });
            }
        }
        KeyGenerationResult::Pgp {
            public_key,
            private_key,
            key_id,
            ..
        } => {
            output["key_id"] = serde_json::json!(key_id);
            output["public_key"] = serde_json::json!(public_key);
            output["private_key"] = serde_json::json!(private_key);
        }
    }

    print_json(&output)
}

async fn cmd_inspect(
    service: &KeyService,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    let inspected = service.import_and_inspect(&text).await?;
    print_json(&serde_json::to_value(inspected.report())?)
}

async fn cmd_convert(
    service: &KeyService,
    to: ExportFormat,
    input: Option<&Path>,
    comment: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_input(input)?;
    let inspected = service.import_and_inspect(&text).await?;
    let rendered = service.export(&inspected.key, to, comment).await?;

    let output = serde_json::json!({
        "from": inspected.format,
        "to": rendered.format,
        "text": rendered.text,
    });
    print_json(&output)
}

async fn cmd_encrypt(
    service: &KeyService,
    key_path: &Path,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = load_key(service, key_path).await?;
    let plaintext = read_input(input)?;
    let ciphertext = service.encrypt_text(&key, &plaintext).await?;

    print_json(&serde_json::json!({ "ciphertext": ciphertext }))
}

async fn cmd_decrypt(
    service: &KeyService,
    key_path: &Path,
    input: Option<&Path>,
    passphrase: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = load_key(service, key_path).await?;
    let ciphertext = read_input(input)?;
    let plaintext = service.decrypt_text(&key, &ciphertext, passphrase).await?;

    print_json(&serde_json::json!({ "plaintext": plaintext }))
}

async fn cmd_sign(
    service: &KeyService,
    key_path: &Path,
    input: Option<&Path>,
    passphrase: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = load_key(service, key_path).await?;
    let message = read_input(input)?;
    let signature = service.sign_text(&key, &message, passphrase).await?;

    print_json(&serde_json::json!({ "signature": signature }))
}

async fn cmd_verify(
    service: &KeyService,
    key_path: &Path,
    signature_path: &Path,
    input: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let key = load_key(service, key_path).await?;
    let signature = std::fs::read_to_string(signature_path)?;
    let message = read_input(input)?;
    let valid = service.verify_text(&key, &message, &signature).await?;

    print_json(&serde_json::json!({ "valid": valid }))
}
