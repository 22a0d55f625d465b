//! End-to-end tests for the `keysmith` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::tempdir;

const P256_PKCS8: &str = include_str!("fixtures/ec_p256_pkcs8.pem");
const P256_SPKI: &str = include_str!("fixtures/ec_p256_spki.pem");
const OPENSSH_P384: &str = include_str!("fixtures/openssh_ecdsa_p384");

fn keysmith(args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_keysmith"))
        .args(args)
        .env_remove("KEYSMITH_COMMENT")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start keysmith");
    if let Some(input) = stdin {
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
    }
    child.wait_with_output().unwrap()
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "keysmith failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_algorithms_lists_every_group() {
    let value = json(&keysmith(&["algorithms"], None));
    let groups = value.as_array().unwrap();
    assert_eq!(groups.len(), 7);
    let ssh = groups
        .iter()
        .find(|g| g["group"] == "SSH Authentication")
        .unwrap();
    assert_eq!(ssh["algorithms"][1]["value"], "SSH-ECDSA");
    assert_eq!(ssh["algorithms"][1]["sizes"][0], "P256");
}

#[test]
fn test_generate_with_family_and_size() {
    let value = json(&keysmith(
        &[
            "generate",
            "SSH-ECDSA",
            "--size",
            "P384",
            "--private-format",
            "putty-ppk-v2",
            "--comment",
            "ci",
        ],
        None,
    ));
    assert_eq!(value["algorithm"], "SSH-ECDSA-P384");
    let display = value["display_value"].as_str().unwrap();
    assert!(display.starts_with("ecdsa-sha2-nistp384 "));
    assert!(display.ends_with(" user@hostname"));
    assert_eq!(value["private_key"]["format"], "putty-ppk-v2");
    assert!(value["private_key"]["text"]
        .as_str()
        .unwrap()
        .contains("Comment: ci"));
}

#[test]
fn test_generate_unknown_algorithm_fails() {
    let output = keysmith(&["generate", "DES-56"], None);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "{}", stderr);
}

#[test]
fn test_inspect_from_stdin() {
    let value = json(&keysmith(&["inspect"], Some(OPENSSH_P384)));
    assert_eq!(value["format"], "openssh-private-v1");
    assert_eq!(value["type"], "private");
    assert_eq!(value["algorithm"], "ECDSA");
    assert_eq!(value["size"], "P-384");
}

#[test]
fn test_convert_uses_comment_from_environment() {
    let dir = tempdir().unwrap();
    let key = write(dir.path(), "id_ecdsa", OPENSSH_P384);

    let output = Command::new(env!("CARGO_BIN_EXE_keysmith"))
        .args(["convert", "--to", "ssh-public", "--input", &key])
        .env("KEYSMITH_COMMENT", "from-env@host")
        .output()
        .unwrap();
    let value = json(&output);
    assert_eq!(value["from"], "openssh-private-v1");
    assert_eq!(value["to"], "ssh-public");
    assert!(value["text"].as_str().unwrap().ends_with(" from-env@host"));

    // A flag wins over the environment.
    let output = Command::new(env!("CARGO_BIN_EXE_keysmith"))
        .args(["convert", "--to", "ssh-public", "--input", &key, "--comment", "flag"])
        .env("KEYSMITH_COMMENT", "from-env@host")
        .output()
        .unwrap();
    assert!(json(&output)["text"].as_str().unwrap().ends_with(" flag"));
}

#[test]
fn test_convert_rejects_unknown_format() {
    let output = keysmith(&["convert", "--to", "der"], Some(P256_SPKI));
    assert!(!output.status.success());
}

#[test]
fn test_sign_and_verify_with_key_files() {
    let dir = tempdir().unwrap();
    let private = write(dir.path(), "private.pem", P256_PKCS8);
    let public = write(dir.path(), "public.pem", P256_SPKI);
    let message = write(dir.path(), "message.txt", "release 1.2.3");

    let signed = json(&keysmith(&["sign", "--key", &private, "--input", &message], None));
    let signature = write(
        dir.path(),
        "message.sig",
        signed["signature"].as_str().unwrap(),
    );

    let verified = json(&keysmith(
        &[
            "verify",
            "--key",
            &public,
            "--signature",
            &signature,
            "--input",
            &message,
        ],
        None,
    ));
    assert_eq!(verified["valid"], true);

    let tampered = write(dir.path(), "tampered.txt", "release 1.2.4");
    let verified = json(&keysmith(
        &[
            "verify",
            "--key",
            &public,
            "--signature",
            &signature,
            "--input",
            &tampered,
        ],
        None,
    ));
    assert_eq!(verified["valid"], false);
}

#[test]
fn test_encrypt_and_decrypt_with_raw_key() {
    let dir = tempdir().unwrap();
    let key = write(dir.path(), "aes.key", "AAECAwQFBgcICQoLDA0ODw==");

    let encrypted = json(&keysmith(&["encrypt", "--key", &key], Some("secret note")));
    let ciphertext = write(
        dir.path(),
        "note.enc",
        encrypted["ciphertext"].as_str().unwrap(),
    );

    let decrypted = json(&keysmith(
        &["decrypt", "--key", &key, "--input", &ciphertext],
        None,
    ));
    assert_eq!(decrypted["plaintext"], "secret note");
}

#[test]
fn test_pgp_generation_unavailable() {
    let output = keysmith(
        &[
            "generate",
            "PGP-ECC-curve25519",
            "--name",
            "Ada",
            "--email",
            "ada@example.com",
        ],
        None,
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("PGP"));
}
