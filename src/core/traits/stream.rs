use std::io::{Read, Write};

use crate::core::errors::Result;

/// A byte stream whose raw bytes are ciphertext, with an explicit
/// decrypt step.
pub trait EncryptedRead: Read {
    /// Decrypt a complete ciphertext and return the plaintext.
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// A byte sink whose raw bytes are ciphertext, with an explicit
/// encrypt step.
pub trait EncryptedWrite: Write {
    /// Encrypt a complete plaintext and return the ciphertext.
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>>;
}

/// Both directions.
pub trait EncryptedReadWrite: EncryptedRead + EncryptedWrite {}

impl<T: EncryptedRead + EncryptedWrite> EncryptedReadWrite for T {}
