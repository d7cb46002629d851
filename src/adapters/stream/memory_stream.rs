use std::io::{Cursor, Read, Write};

use secrecy::SecretString;
use tracing::{debug, instrument};

use crate::adapters::stream::encrypted_file::{as_decrypt_error, as_encrypt_error};
use crate::config::keyring_config::KeyringConfig;
use crate::core::errors::Result;
use crate::core::services::buffer;
use crate::core::traits::cipher::CipherBackend;
use crate::core::traits::stream::{EncryptedRead, EncryptedWrite};

/// An encrypted stream held entirely in memory.
///
/// Behaves like [`EncryptedFile`](super::encrypted_file::EncryptedFile)
/// over a `Cursor<Vec<u8>>` of ciphertext: no open or close step, and the
/// raw bytes are available through [`MemoryStream::into_inner`].
pub struct MemoryStream<B: CipherBackend> {
    inner: Cursor<Vec<u8>>,
    passphrase: SecretString,
    recipients: Vec<String>,
    backend: B,
    keyrings: KeyringConfig,
}

impl<B: CipherBackend> MemoryStream<B> {
    /// An empty stream.
    pub fn new(
        passphrase: SecretString,
        recipients: Vec<String>,
        backend: B,
        keyrings: KeyringConfig,
    ) -> Self {
        Self::with_ciphertext(Vec::new(), passphrase, recipients, backend, keyrings)
    }

    /// A stream positioned at the start of existing ciphertext.
    pub fn with_ciphertext(
        ciphertext: Vec<u8>,
        passphrase: SecretString,
        recipients: Vec<String>,
        backend: B,
        keyrings: KeyringConfig,
    ) -> Self {
        Self {
            inner: Cursor::new(ciphertext),
            passphrase,
            recipients,
            backend,
            keyrings,
        }
    }

    /// Move the cursor back to the start.
    pub fn rewind(&mut self) {
        self.inner.set_position(0);
    }

    /// Decrypt everything from the cursor to the end.
    #[instrument(skip_all)]
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let len = self.inner.get_ref().len() as u64;
        let remaining = len.saturating_sub(self.inner.position());
        let ciphertext = buffer::read_all_bounded(
            &mut self.inner,
            buffer::size_hint(Some(remaining)),
            self.keyrings.max_buffer_size,
        )?;

        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        self.decrypt(&ciphertext)
    }

    /// Encrypt `data` and write the ciphertext at the cursor.
    ///
    /// Returns the number of ciphertext bytes written.
    #[instrument(skip_all, fields(plaintext_len = data.len()))]
    pub fn write_encrypted(&mut self, data: &[u8]) -> Result<usize> {
        let ciphertext = self.encrypt(data)?;
        self.inner.write_all(&ciphertext)?;
        debug!(ciphertext_len = ciphertext.len(), "buffered ciphertext");
        Ok(ciphertext.len())
    }

    /// The raw ciphertext.
    pub fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

impl<B: CipherBackend> Read for MemoryStream<B> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<B: CipherBackend> Write for MemoryStream<B> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<B: CipherBackend> EncryptedRead for MemoryStream<B> {
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.backend
            .init_decrypt(&self.keyrings.secret_keyring, &self.passphrase)
            .and_then(|()| self.backend.decrypt(ciphertext, &self.passphrase))
            .map_err(as_decrypt_error)
    }
}

impl<B: CipherBackend> EncryptedWrite for MemoryStream<B> {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.backend
            .init_encrypt(&self.keyrings.public_keyring, &self.recipients)
            .and_then(|()| self.backend.encrypt(plaintext))
            .map_err(as_encrypt_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cipher::age_backend::AgeBackend;
    use crate::core::errors::CryptFileError;
    use crate::core::traits::stream::EncryptedReadWrite;

    fn age_stream(dir: &std::path::Path) -> MemoryStream<AgeBackend> {
        let keyrings = KeyringConfig::new(dir.join("secring.age"), dir.join("pubring.txt"));
        let empty = SecretString::from(String::new());
        AgeBackend::generate_keyring(
            &keyrings.secret_keyring,
            &keyrings.public_keyring,
            &empty,
            Some("me"),
        )
        .unwrap();
        MemoryStream::new(empty, vec!["me".into()], AgeBackend::new(), keyrings)
    }

    fn round_trip<S: EncryptedReadWrite>(stream: &mut S, plaintext: &[u8]) -> Vec<u8> {
        let ciphertext = stream.encrypt(plaintext).unwrap();
        stream.decrypt(&ciphertext).unwrap()
    }

    #[test]
    fn round_trip_through_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = age_stream(dir.path());
        assert_eq!(round_trip(&mut stream, b"through the trait"), b"through the trait");
        assert_eq!(round_trip(&mut stream, b""), b"");
    }

    #[test]
    fn write_rewind_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = age_stream(dir.path());

        let written = stream.write_encrypted(b"in memory").unwrap();
        stream.rewind();
        assert_eq!(stream.read_all().unwrap(), b"in memory");

        let raw = stream.into_inner();
        assert_eq!(raw.len(), written);
        assert!(!raw.windows(9).any(|w| w == b"in memory"));
    }

    #[test]
    fn read_at_end_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = age_stream(dir.path());
        stream.write_encrypted(b"data").unwrap();
        assert!(stream.read_all().unwrap().is_empty());
    }

    #[test]
    fn oversize_ciphertext_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let keyrings = KeyringConfig::new(dir.path().join("s"), dir.path().join("p"))
            .with_max_buffer_size(16);
        let mut stream = MemoryStream::with_ciphertext(
            vec![0u8; 64],
            SecretString::from(String::new()),
            vec![],
            AgeBackend::new(),
            keyrings,
        );
        assert!(matches!(
            stream.read_all(),
            Err(CryptFileError::Oversize { limit: 16 })
        ));
    }

    #[test]
    fn missing_keyring_surfaces_as_decrypt_error() {
        let dir = tempfile::tempdir().unwrap();
        let keyrings = KeyringConfig::new(dir.path().join("s"), dir.path().join("p"));
        let mut stream = MemoryStream::with_ciphertext(
            b"not really ciphertext".to_vec(),
            SecretString::from(String::new()),
            vec![],
            AgeBackend::new(),
            keyrings,
        );
        assert!(matches!(
            stream.read_all(),
            Err(CryptFileError::Decrypt { .. })
        ));
    }
}
