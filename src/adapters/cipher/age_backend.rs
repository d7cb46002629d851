use std::io::{Read, Write};
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use crate::adapters::keyrings::file_keyring::FileKeyring;
use crate::core::errors::{CryptFileError, Result};
use crate::core::models::key_identity::KeyIdentity;
use crate::core::models::open_mode::OpenMode;
use crate::core::traits::cipher::CipherBackend;
use crate::core::traits::keyring::PublicKeyring;

const ARMOR_BEGIN: &[u8] = b"-----BEGIN AGE ENCRYPTED FILE-----";
const BINARY_MAGIC: &[u8] = b"age-encryption.org/v1";

/// Age encryption backend using X25519 + ChaCha20-Poly1305.
///
/// The secret keyring is an age identity file, optionally sealed with a
/// passphrase (age scrypt). The public keyring is a [`FileKeyring`].
/// Ciphertext is ASCII-armored.
#[derive(Default)]
pub struct AgeBackend {
    identities: Vec<age::x25519::Identity>,
    recipients: Vec<age::x25519::Recipient>,
}

impl AgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new X25519 identity, write it to `secret_keyring`
    /// (sealed with `passphrase` unless it is empty) and register its
    /// public key in `public_keyring` under `label`.
    ///
    /// Returns the public key string.
    pub fn generate_keyring(
        secret_keyring: &Path,
        public_keyring: &Path,
        passphrase: &SecretString,
        label: Option<&str>,
    ) -> Result<String> {
        let identity = age::x25519::Identity::generate();
        let public_key = identity.to_public().to_string();

        let created = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let contents = format!(
            "# created: {created}\n# public key: {public_key}\n{}\n",
            identity.to_string().expose_secret()
        );

        let bytes = if passphrase.expose_secret().is_empty() {
            contents.into_bytes()
        } else {
            seal(contents.as_bytes(), passphrase)?
        };

        if let Some(parent) = secret_keyring.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenMode::Write
            .options()
            .open(secret_keyring)
            .map_err(|source| CryptFileError::Open {
                path: secret_keyring.to_path_buf(),
                source,
            })?;
        file.write_all(&bytes)?;
        file.sync_all()?;

        let entry = match label {
            Some(label) => KeyIdentity::labeled(public_key.clone(), label),
            None => KeyIdentity::new(public_key.clone()),
        };
        FileKeyring::new(public_keyring).add(&entry)?;

        debug!(
            secret_keyring = %secret_keyring.display(),
            public_keyring = %public_keyring.display(),
            "generated keyring"
        );
        Ok(public_key)
    }

    /// Read the public key belonging to the first identity in a secret
    /// keyring.
    pub fn read_public_key(secret_keyring: &Path, passphrase: &SecretString) -> Result<String> {
        let content = read_keyring(secret_keyring, passphrase)?;

        // Prefer the "# public key: age1..." comment line
        for line in content.lines() {
            if let Some(key) = line.strip_prefix("# public key: ") {
                return Ok(key.trim().to_string());
            }
        }

        let identities = parse_identities(&content, secret_keyring)?;
        identities
            .first()
            .map(|identity| identity.to_public().to_string())
            .ok_or_else(|| CryptFileError::Keyring {
                path: secret_keyring.to_path_buf(),
                detail: "No secret key found".into(),
            })
    }

    /// Turn a recipient name into an age recipient, looking it up in the
    /// public keyring first and falling back to an inline `age1...` key.
    fn resolve_recipient(keyring: &FileKeyring, name: &str) -> Result<age::x25519::Recipient> {
        let public_key = match keyring.resolve(name) {
            Ok(identity) => identity.public_key,
            Err(CryptFileError::RecipientNotFound { .. }) if name.starts_with("age1") => {
                name.to_string()
            }
            Err(e) => return Err(e),
        };

        public_key
            .parse::<age::x25519::Recipient>()
            .map_err(|e: &str| CryptFileError::Encrypt {
                reason: format!("Invalid recipient key '{public_key}': {e}"),
            })
    }
}

impl CipherBackend for AgeBackend {
    fn init_decrypt(&mut self, secret_keyring: &Path, passphrase: &SecretString) -> Result<()> {
        self.identities.clear();

        let content = read_keyring(secret_keyring, passphrase)?;
        let identities = parse_identities(&content, secret_keyring)?;
        if identities.is_empty() {
            return Err(CryptFileError::Keyring {
                path: secret_keyring.to_path_buf(),
                detail: "No secret key found".into(),
            });
        }

        debug!(count = identities.len(), "loaded secret keys");
        self.identities = identities;
        Ok(())
    }

    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    fn decrypt(&self, ciphertext: &[u8], _passphrase: &SecretString) -> Result<Vec<u8>> {
        if self.identities.is_empty() {
            return Err(CryptFileError::Decrypt {
                reason: "No secret keys loaded; initialize the decrypt context first".into(),
            });
        }

        let armored_reader = age::armor::ArmoredReader::new(ciphertext);
        let decryptor =
            age::Decryptor::new(armored_reader).map_err(|e| CryptFileError::Decrypt {
                reason: format!("Invalid encrypted file: {e}"),
            })?;

        let mut reader = decryptor
            .decrypt(self.identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| CryptFileError::Decrypt {
                reason: format!("{e}"),
            })?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| CryptFileError::Decrypt {
                reason: format!("Read decrypted data failed: {e}"),
            })?;

        debug!(plaintext_len = plaintext.len(), "decryption complete");
        Ok(plaintext)
    }

    fn init_encrypt(&mut self, public_keyring: &Path, recipients: &[String]) -> Result<()> {
        self.recipients.clear();

        if recipients.is_empty() {
            return Err(CryptFileError::Encrypt {
                reason: "No recipients provided".into(),
            });
        }

        let keyring = FileKeyring::new(public_keyring);
        let parsed = recipients
            .iter()
            .map(|name| Self::resolve_recipient(&keyring, name))
            .collect::<Result<Vec<_>>>()?;

        debug!(count = parsed.len(), "resolved recipients");
        self.recipients = parsed;
        Ok(())
    }

    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if self.recipients.is_empty() {
            return Err(CryptFileError::Encrypt {
                reason: "No recipients resolved; initialize the encrypt context first".into(),
            });
        }

        let encryptor = age::Encryptor::with_recipients(
            self.recipients.iter().map(|r| r as &dyn age::Recipient),
        )
        .map_err(|e| CryptFileError::Encrypt {
            reason: format!("{e}"),
        })?;

        let output = armored(encryptor, plaintext)?;
        debug!(ciphertext_len = output.len(), "encryption complete");
        Ok(output)
    }

    fn name(&self) -> &str {
        "age"
    }
}

/// Read a secret keyring, unsealing it with `passphrase` when it is an
/// age-encrypted file.
fn read_keyring(path: &Path, passphrase: &SecretString) -> Result<String> {
    let raw = std::fs::read(path).map_err(|e| CryptFileError::Keyring {
        path: path.to_path_buf(),
        detail: format!("Failed to read secret keyring: {e}"),
    })?;

    let bytes = if is_sealed(&raw) {
        unseal(&raw, passphrase, path)?
    } else {
        raw
    };

    String::from_utf8(bytes).map_err(|_| CryptFileError::Keyring {
        path: path.to_path_buf(),
        detail: "Secret keyring is not valid UTF-8".into(),
    })
}

fn is_sealed(raw: &[u8]) -> bool {
    let trimmed = raw.trim_ascii_start();
    trimmed.starts_with(ARMOR_BEGIN) || trimmed.starts_with(BINARY_MAGIC)
}

/// Parse every `AGE-SECRET-KEY-` line of an identity file.
fn parse_identities(content: &str, path: &Path) -> Result<Vec<age::x25519::Identity>> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("AGE-SECRET-KEY-"))
        .map(|l| {
            l.parse::<age::x25519::Identity>()
                .map_err(|e| CryptFileError::Keyring {
                    path: path.to_path_buf(),
                    detail: format!("Invalid age key: {e}"),
                })
        })
        .collect()
}

fn seal(contents: &[u8], passphrase: &SecretString) -> Result<Vec<u8>> {
    let encryptor = age::Encryptor::with_user_passphrase(passphrase.clone());
    armored(encryptor, contents)
}

fn unseal(raw: &[u8], passphrase: &SecretString, path: &Path) -> Result<Vec<u8>> {
    let decryptor = age::Decryptor::new(age::armor::ArmoredReader::new(raw)).map_err(|e| {
        CryptFileError::Keyring {
            path: path.to_path_buf(),
            detail: format!("Sealed keyring is corrupt: {e}"),
        }
    })?;

    let identity = age::scrypt::Identity::new(passphrase.clone());
    let mut reader = decryptor
        .decrypt(std::iter::once(&identity as &dyn age::Identity))
        .map_err(|_| CryptFileError::Decrypt {
            reason: format!("Wrong passphrase for secret keyring {}", path.display()),
        })?;

    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .map_err(|e| CryptFileError::Keyring {
            path: path.to_path_buf(),
            detail: format!("Failed to unseal keyring: {e}"),
        })?;
    Ok(contents)
}

/// Run `encryptor` over `plaintext` with ASCII armor.
fn armored(encryptor: age::Encryptor, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    let armor =
        age::armor::ArmoredWriter::wrap_output(&mut output, age::armor::Format::AsciiArmor)
            .map_err(|e| CryptFileError::Encrypt {
                reason: format!("Armor writer failed: {e}"),
            })?;

    let mut writer = encryptor
        .wrap_output(armor)
        .map_err(|e| CryptFileError::Encrypt {
            reason: format!("Encryption stream failed: {e}"),
        })?;

    writer
        .write_all(plaintext)
        .map_err(|e| CryptFileError::Encrypt {
            reason: format!("Write failed: {e}"),
        })?;

    writer
        .finish()
        .and_then(|armor| armor.finish())
        .map_err(|e| CryptFileError::Encrypt {
            reason: format!("Encryption finish failed: {e}"),
        })?;

    Ok(output)
}
