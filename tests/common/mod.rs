#![allow(dead_code)]

use std::path::Path;

use cryptfile::{CipherBackend, CryptFileError, KeyringConfig, Result};
use secrecy::{ExposeSecret, SecretString};

/// Route library logs to the test harness. Set `RUST_LOG=cryptfile=debug`
/// to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

pub fn keyrings(dir: &Path) -> KeyringConfig {
    KeyringConfig::new(dir.join("secring.age"), dir.join("pubring.txt"))
}

const MAGIC: &[u8] = b"FAKE";

/// Deterministic stand-in for a real cipher.
///
/// Ciphertext is `FAKE || key || (plaintext XOR key)`, where the key is
/// derived from the passphrase on read and from the first recipient on
/// write. A recipient and a passphrase with the same text form a pair.
#[derive(Default)]
pub struct FakeBackend {
    pub fail_encrypt: bool,
    read_key: Option<u8>,
    write_key: Option<u8>,
}

impl FakeBackend {
    pub fn failing_encrypt() -> Self {
        Self {
            fail_encrypt: true,
            ..Self::default()
        }
    }
}

fn derive(s: &str) -> u8 {
    s.bytes().fold(0x33u8, |acc, b| acc.rotate_left(3) ^ b) | 1
}

impl CipherBackend for FakeBackend {
    fn init_decrypt(&mut self, _: &Path, passphrase: &SecretString) -> Result<()> {
        self.read_key = Some(derive(passphrase.expose_secret()));
        Ok(())
    }

    fn decrypt(&self, ciphertext: &[u8], _: &SecretString) -> Result<Vec<u8>> {
        let key = self.read_key.ok_or_else(|| CryptFileError::Decrypt {
            reason: "decrypt context not initialized".into(),
        })?;
        match ciphertext.strip_prefix(MAGIC).and_then(<[u8]>::split_first) {
            Some((stored, body)) if *stored == key => Ok(body.iter().map(|b| b ^ key).collect()),
            Some(_) => Err(CryptFileError::Decrypt {
                reason: "wrong passphrase".into(),
            }),
            None => Err(CryptFileError::Decrypt {
                reason: "not a fake ciphertext".into(),
            }),
        }
    }

    fn init_encrypt(&mut self, _: &Path, recipients: &[String]) -> Result<()> {
        let first = recipients.first().ok_or_else(|| CryptFileError::Encrypt {
            reason: "No recipients provided".into(),
        })?;
        self.write_key = Some(derive(first));
        Ok(())
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.fail_encrypt {
            return Err(CryptFileError::Encrypt {
                reason: "backend refused".into(),
            });
        }
        let key = self.write_key.ok_or_else(|| CryptFileError::Encrypt {
            reason: "encrypt context not initialized".into(),
        })?;
        let mut out = MAGIC.to_vec();
        out.push(key);
        out.extend(plaintext.iter().map(|b| b ^ key));
        Ok(out)
    }

    fn name(&self) -> &str {
        "fake"
    }
}
