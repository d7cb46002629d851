use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::{debug, instrument};

use crate::config::keyring_config::KeyringConfig;
use crate::core::errors::{CryptFileError, Result};
use crate::core::models::open_mode::OpenMode;
use crate::core::services::buffer;
use crate::core::traits::cipher::CipherBackend;
use crate::core::traits::stream::{EncryptedRead, EncryptedWrite};

/// A file whose bytes on disk are always ciphertext.
///
/// `read_all` drains the file and decrypts it in one shot with the
/// passphrase; `write_encrypted` encrypts a whole buffer for the
/// recipients and writes it in one call. The passphrase is only used
/// for reads and the recipients only for writes, but both are recorded
/// whatever the open mode.
///
/// The handle is owned exclusively; every I/O operation takes
/// `&mut self`.
pub struct EncryptedFile<B: CipherBackend> {
    path: PathBuf,
    passphrase: SecretString,
    recipients: Vec<String>,
    file: Option<File>,
    mode: Option<OpenMode>,
    backend: B,
    keyrings: KeyringConfig,
    max_buffer_size: usize,
}

impl<B: CipherBackend> EncryptedFile<B> {
    /// Build an unopened adapter. Performs no I/O and no validation.
    pub fn new(
        path: impl Into<PathBuf>,
        passphrase: SecretString,
        recipients: Vec<String>,
        backend: B,
        keyrings: KeyringConfig,
    ) -> Self {
        let max_buffer_size = keyrings.max_buffer_size;
        Self {
            path: path.into(),
            passphrase,
            recipients,
            file: None,
            mode: None,
            backend,
            keyrings,
            max_buffer_size,
        }
    }

    /// Open `path` in `mode` and return an adapter bound to the handle.
    ///
    /// Files created by this call get owner-only permissions.
    pub fn open(
        path: impl Into<PathBuf>,
        mode: OpenMode,
        passphrase: SecretString,
        recipients: Vec<String>,
        backend: B,
        keyrings: KeyringConfig,
    ) -> Result<Self> {
        let mut file = Self::new(path, passphrase, recipients, backend, keyrings);
        file.open_handle(mode)?;
        Ok(file)
    }

    /// Open (or re-open) the backing file of this adapter in `mode`.
    ///
    /// A handle that is already open is replaced.
    pub fn open_handle(&mut self, mode: OpenMode) -> Result<()> {
        let handle = mode
            .options()
            .open(&self.path)
            .map_err(|source| CryptFileError::Open {
                path: self.path.clone(),
                source,
            })?;

        debug!(path = %self.path.display(), ?mode, "opened encrypted file");
        self.file = Some(handle);
        self.mode = Some(mode);
        Ok(())
    }

    /// Override the largest ciphertext `read_all` will buffer.
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Mode of the current handle, if open.
    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    /// The cipher backend this file encrypts and decrypts with.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn handle(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or_else(|| CryptFileError::NotOpen {
            path: self.path.clone(),
        })
    }

    /// Read the rest of the file and return it decrypted.
    ///
    /// The file size is only a hint for the initial allocation. Reaching
    /// end of file is success: an empty file yields an empty plaintext.
    /// Nothing is returned if reading or decryption fails.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let max = self.max_buffer_size;
        let file = self.handle()?;

        let reported = file.metadata().ok().map(|m| m.len());
        let hint = buffer::size_hint(reported);
        let ciphertext = buffer::read_all_bounded(file, hint, max)?;

        if ciphertext.is_empty() {
            debug!("empty file, nothing to decrypt");
            return Ok(Vec::new());
        }

        self.decrypt(&ciphertext)
    }

    /// Encrypt `data` for the recipients and write the ciphertext.
    ///
    /// Returns the number of ciphertext bytes written. Nothing is written
    /// when encryption fails. A write error may leave a partial
    /// ciphertext behind.
    #[instrument(skip_all, fields(path = %self.path.display(), plaintext_len = data.len()))]
    pub fn write_encrypted(&mut self, data: &[u8]) -> Result<usize> {
        self.handle()?;
        let ciphertext = self.encrypt(data)?;

        let file = self.handle()?;
        file.write_all(&ciphertext)
            .map_err(|source| CryptFileError::Write { source })?;

        debug!(ciphertext_len = ciphertext.len(), "wrote ciphertext");
        Ok(ciphertext.len())
    }

    /// Release the backing handle.
    ///
    /// Writable handles are synced to disk first and the sync error, if
    /// any, is returned. Closing an adapter that is not open fails with
    /// `NotOpen`.
    pub fn close(&mut self) -> Result<()> {
        let file = self.file.take().ok_or_else(|| CryptFileError::NotOpen {
            path: self.path.clone(),
        })?;
        let mode = self.mode.take();

        if mode.is_some_and(OpenMode::is_writable) {
            file.sync_all()
                .map_err(|source| CryptFileError::Close { source })?;
        }

        debug!(path = %self.path.display(), "closed encrypted file");
        Ok(())
    }
}

impl<B: CipherBackend> std::fmt::Debug for EncryptedFile<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFile")
            .field("path", &self.path)
            .field("recipients", &self.recipients)
            .field("mode", &self.mode)
            .field("backend", &self.backend.name())
            .field("max_buffer_size", &self.max_buffer_size)
            .finish_non_exhaustive()
    }
}

/// Raw ciphertext bytes from the backing file.
impl<B: CipherBackend> Read for EncryptedFile<B> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.handle().map_err(std::io::Error::other)?.read(buf)
    }
}

/// Raw ciphertext bytes to the backing file.
impl<B: CipherBackend> Write for EncryptedFile<B> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.handle().map_err(std::io::Error::other)?.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<B: CipherBackend> EncryptedRead for EncryptedFile<B> {
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.backend
            .init_decrypt(&self.keyrings.secret_keyring, &self.passphrase)
            .and_then(|()| self.backend.decrypt(ciphertext, &self.passphrase))
            .map_err(as_decrypt_error)
    }
}

impl<B: CipherBackend> EncryptedWrite for EncryptedFile<B> {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.backend
            .init_encrypt(&self.keyrings.public_keyring, &self.recipients)
            .and_then(|()| self.backend.encrypt(plaintext))
            .map_err(as_encrypt_error)
    }
}

/// Report any backend failure on the read path as a decrypt failure.
pub(crate) fn as_decrypt_error(e: CryptFileError) -> CryptFileError {
    match e {
        CryptFileError::Decrypt { .. } => e,
        other => CryptFileError::Decrypt {
            reason: other.to_string(),
        },
    }
}

/// Report any backend failure on the write path as an encrypt failure.
pub(crate) fn as_encrypt_error(e: CryptFileError) -> CryptFileError {
    match e {
        CryptFileError::Encrypt { .. } => e,
        other => CryptFileError::Encrypt {
            reason: other.to_string(),
        },
    }
}
