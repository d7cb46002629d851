use std::path::Path;

use secrecy::SecretString;

use crate::core::errors::Result;

/// Port for encryption/decryption backends.
///
/// Implementations live in `adapters::cipher` (e.g. AgeBackend, GpgBackend).
/// The adapters in `adapters::stream` only depend on this trait.
///
/// Each direction has an explicit init step that binds the backend to a
/// keyring. Keyring paths are always passed in; a backend never reads
/// them from process-wide state.
pub trait CipherBackend: Send + Sync {
    /// Load the secret keyring, unlocking it with `passphrase` if needed.
    fn init_decrypt(&mut self, secret_keyring: &Path, passphrase: &SecretString) -> Result<()>;

    /// Decrypt a complete ciphertext with the keys loaded by `init_decrypt`.
    fn decrypt(&self, ciphertext: &[u8], passphrase: &SecretString) -> Result<Vec<u8>>;

    /// Resolve `recipients` against the public keyring.
    fn init_encrypt(&mut self, public_keyring: &Path, recipients: &[String]) -> Result<()>;

    /// Encrypt plaintext for the recipients bound by `init_encrypt`.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Human-readable name of this backend (e.g. "age", "gpg").
    fn name(&self) -> &str;
}
