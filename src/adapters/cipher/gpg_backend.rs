use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use crate::core::errors::{CryptFileError, Result};
use crate::core::traits::cipher::CipherBackend;

/// GPG encryption backend that shells out to the system `gpg` binary.
///
/// Keyring paths are GnuPG home directories: the secret keyring path is
/// passed as `--homedir` when decrypting, the public keyring path when
/// encrypting. Requires GPG to be installed.
pub struct GpgBackend {
    /// Path to the gpg binary (defaults to "gpg").
    gpg_path: PathBuf,
    /// Path to gpgconf, next to the gpg binary.
    gpgconf_path: PathBuf,
    secret_home: Option<PathBuf>,
    public_home: Option<PathBuf>,
    recipients: Vec<String>,
}

/// Which side of the backend a failing gpg run belongs to.
#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn error(self, reason: String) -> CryptFileError {
        match self {
            Direction::Encrypt => CryptFileError::Encrypt { reason },
            Direction::Decrypt => CryptFileError::Decrypt { reason },
        }
    }
}

impl GpgBackend {
    /// Create a new backend using the default `gpg` binary.
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("gpg"))
    }

    /// Create a new backend with a custom gpg binary path.
    pub fn with_path(gpg_path: PathBuf) -> Self {
        let gpgconf_path = match gpg_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join("gpgconf"),
            _ => PathBuf::from("gpgconf"),
        };
        Self {
            gpg_path,
            gpgconf_path,
            secret_home: None,
            public_home: None,
            recipients: Vec::new(),
        }
    }

    /// Check if GPG is available on the system.
    pub fn is_available(&self) -> bool {
        Command::new(&self.gpg_path)
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    /// Run gpg with `args`, feed `stdin_data` to it, and return stdout on
    /// success.
    fn run_gpg(&self, args: &[&str], stdin_data: &[u8], direction: Direction) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.gpg_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| direction.error(format!("Failed to run gpg: {e}")))?;

        // Feed stdin from another thread so a full stdout pipe cannot
        // stall the write.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| direction.error("gpg stdin unavailable".into()))?;
        let input = stdin_data.to_vec();
        let feeder = std::thread::spawn(move || stdin.write_all(&input));

        let output = child
            .wait_with_output()
            .map_err(|e| direction.error(format!("gpg process failed: {e}")))?;

        match feeder.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(direction.error(format!("Failed to write to gpg stdin: {e}")));
            }
            Err(_) => return Err(direction.error("gpg stdin writer panicked".into())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(direction.error(format!("gpg exited with error: {stderr}")));
        }

        Ok(output.stdout)
    }

    /// Make gpg-agent drop every cached passphrase for `home`.
    ///
    /// The agent would otherwise answer a later decrypt from its cache and
    /// ignore the passphrase handed to it.
    fn forget_passphrases(&self, home: &Path) -> Result<()> {
        let output = Command::new(&self.gpgconf_path)
            .arg("--homedir")
            .arg(home)
            .args(["--reload", "gpg-agent"])
            .output()
            .map_err(|e| CryptFileError::Decrypt {
                reason: format!("Failed to run gpgconf: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CryptFileError::Decrypt {
                reason: format!("Could not flush gpg-agent passphrase cache: {stderr}"),
            });
        }
        Ok(())
    }
}

impl Default for GpgBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn home_dir(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(CryptFileError::Keyring {
            path: path.to_path_buf(),
            detail: "GnuPG home directory does not exist".into(),
        });
    }
    Ok(path.to_path_buf())
}

impl CipherBackend for GpgBackend {
    fn init_decrypt(&mut self, secret_keyring: &Path, _passphrase: &SecretString) -> Result<()> {
        self.secret_home = None;
        self.secret_home = Some(home_dir(secret_keyring)?);
        Ok(())
    }

    #[instrument(skip_all, fields(ciphertext_len = ciphertext.len()))]
    fn decrypt(&self, ciphertext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>> {
        let home = self.secret_home.as_ref().ok_or_else(|| CryptFileError::Decrypt {
            reason: "GnuPG home not set; initialize the decrypt context first".into(),
        })?;

        // The passphrase goes through stdin, so the ciphertext goes
        // through a temporary file.
        let mut input = tempfile::NamedTempFile::new()?;
        input.write_all(ciphertext)?;
        input.flush()?;

        let home_str = home.to_string_lossy();
        let input_str = input.path().to_string_lossy();
        let args = [
            "--homedir",
            &*home_str,
            "--decrypt",
            "--batch",
            "--yes",
            "--quiet",
            "--pinentry-mode",
            "loopback",
            "--passphrase-fd",
            "0",
            &*input_str,
        ];

        let mut secret = passphrase.expose_secret().as_bytes().to_vec();
        secret.push(b'\n');

        self.forget_passphrases(home)?;
        let result = self.run_gpg(&args, &secret, Direction::Decrypt);
        if let Err(e) = self.forget_passphrases(home) {
            warn!(error = %e, "passphrase may remain cached in gpg-agent");
        }
        let plaintext = result?;
        debug!(plaintext_len = plaintext.len(), "decryption complete");
        Ok(plaintext)
    }

    fn init_encrypt(&mut self, public_keyring: &Path, recipients: &[String]) -> Result<()> {
        self.public_home = None;
        self.recipients.clear();

        if recipients.is_empty() {
            return Err(CryptFileError::Encrypt {
                reason: "No recipients provided".into(),
            });
        }

        self.public_home = Some(home_dir(public_keyring)?);
        self.recipients = recipients.to_vec();
        Ok(())
    }

    #[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let home = match (&self.public_home, self.recipients.is_empty()) {
            (Some(home), false) => home.to_string_lossy(),
            _ => {
                return Err(CryptFileError::Encrypt {
                    reason: "No recipients resolved; initialize the encrypt context first".into(),
                });
            }
        };

        let mut args = vec![
            "--homedir",
            &*home,
            "--encrypt",
            "--armor",
            "--batch",
            "--yes",
            "--trust-model",
            "always",
        ];
        for recipient in &self.recipients {
            args.push("--recipient");
            args.push(recipient.as_str());
        }

        let ciphertext = self.run_gpg(&args, plaintext, Direction::Encrypt)?;
        debug!(ciphertext_len = ciphertext.len(), "encryption complete");
        Ok(ciphertext)
    }

    fn name(&self) -> &str {
        "gpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpg_backend_has_correct_name() {
        let backend = GpgBackend::new();
        assert_eq!(backend.name(), "gpg");
    }

    #[test]
    fn encrypt_no_recipients_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GpgBackend::new();
        let result = backend.init_encrypt(dir.path(), &[]);
        assert!(matches!(result, Err(CryptFileError::Encrypt { .. })));
        assert!(backend.encrypt(b"data").is_err());
    }

    #[test]
    fn missing_home_is_keyring_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GpgBackend::new();
        let result = backend.init_decrypt(
            &dir.path().join("no-such-home"),
            &SecretString::from("x".to_string()),
        );
        assert!(matches!(result, Err(CryptFileError::Keyring { .. })));
    }

    #[test]
    fn decrypt_without_init_fails() {
        let backend = GpgBackend::new();
        let result = backend.decrypt(b"data", &SecretString::from(String::new()));
        assert!(matches!(result, Err(CryptFileError::Decrypt { .. })));
    }

    #[test]
    fn missing_binary_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = GpgBackend::with_path(dir.path().join("not-gpg"));
        assert!(!backend.is_available());

        backend
            .init_encrypt(dir.path(), &["someone@example.com".into()])
            .unwrap();
        assert!(matches!(
            backend.encrypt(b"data"),
            Err(CryptFileError::Encrypt { .. })
        ));
    }

    /// Throwaway GnuPG home holding one key for `UID`, protected by `RIGHT`.
    /// Its agent is stopped on drop.
    struct GpgHome {
        dir: tempfile::TempDir,
    }

    const UID: &str = "test@example.com";
    const RIGHT: &str = "right-pass";

    impl GpgHome {
        /// `None` when gpg is not installed.
        fn with_key() -> Option<Self> {
            if !GpgBackend::new().is_available() {
                eprintln!("gpg not installed, skipping");
                return None;
            }
            let dir = tempfile::tempdir().unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700))
                    .unwrap();
            }

            let params = format!(
                "Key-Type: eddsa\nKey-Curve: ed25519\nKey-Usage: sign\n\
                 Subkey-Type: ecdh\nSubkey-Curve: cv25519\nSubkey-Usage: encrypt\n\
                 Name-Real: Test\nName-Email: {UID}\nExpire-Date: 0\n\
                 Passphrase: {RIGHT}\n%commit\n"
            );
            let home = dir.path().to_string_lossy().into_owned();
            GpgBackend::new()
                .run_gpg(
                    &["--homedir", &home, "--batch", "--pinentry-mode", "loopback", "--gen-key"],
                    params.as_bytes(),
                    Direction::Encrypt,
                )
                .unwrap();
            Some(Self { dir })
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }
    }

    impl Drop for GpgHome {
        fn drop(&mut self) {
            let _ = Command::new("gpgconf")
                .arg("--homedir")
                .arg(self.dir.path())
                .args(["--kill", "gpg-agent"])
                .output();
        }
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn encrypt_for(home: &Path, recipient: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut backend = GpgBackend::new();
        backend.init_encrypt(home, &[recipient.to_string()])?;
        backend.encrypt(plaintext)
    }

    fn decrypt_with(home: &Path, passphrase: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let mut backend = GpgBackend::new();
        let passphrase = secret(passphrase);
        backend.init_decrypt(home, &passphrase)?;
        backend.decrypt(ciphertext, &passphrase)
    }

    #[test]
    fn gpg_round_trip() {
        let Some(home) = GpgHome::with_key() else {
            return;
        };

        let ciphertext = encrypt_for(home.path(), UID, b"hello").unwrap();
        assert!(String::from_utf8_lossy(&ciphertext).contains("BEGIN PGP MESSAGE"));
        assert_eq!(decrypt_with(home.path(), RIGHT, &ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn wrong_passphrase_fails_after_successful_decrypt() {
        let Some(home) = GpgHome::with_key() else {
            return;
        };
        let ciphertext = encrypt_for(home.path(), UID, b"hello").unwrap();

        assert_eq!(decrypt_with(home.path(), RIGHT, &ciphertext).unwrap(), b"hello");
        let result = decrypt_with(home.path(), "WRONG", &ciphertext);
        assert!(matches!(result, Err(CryptFileError::Decrypt { .. })));

        assert_eq!(decrypt_with(home.path(), RIGHT, &ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn unknown_recipient_is_encrypt_error() {
        let Some(home) = GpgHome::with_key() else {
            return;
        };

        let result = encrypt_for(home.path(), "nobody@example.com", b"hello");
        assert!(matches!(result, Err(CryptFileError::Encrypt { .. })));
    }
}
