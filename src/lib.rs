//! Files that are always encrypted on disk and always plaintext in memory.
//!
//! [`EncryptedFile`] reads a whole file, decrypts it with a passphrase
//! and returns the plaintext; it encrypts a whole buffer for a list of
//! recipients and writes the ciphertext. The cryptography is delegated
//! to a [`CipherBackend`]: [`AgeBackend`] by default, or [`GpgBackend`]
//! for existing GnuPG setups.
//!
//! ```no_run
//! use cryptfile::{AgeBackend, EncryptedFile, KeyringConfig, OpenMode};
//! use secrecy::SecretString;
//!
//! # fn main() -> cryptfile::Result<()> {
//! let keyrings = KeyringConfig::default_paths()?;
//! let mut file = EncryptedFile::open(
//!     "notes.age",
//!     OpenMode::Read,
//!     SecretString::from("passphrase".to_string()),
//!     Vec::new(),
//!     AgeBackend::new(),
//!     keyrings,
//! )?;
//! let plaintext = file.read_all()?;
//! file.close()?;
//! # let _ = plaintext;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;

pub use crate::adapters::cipher::age_backend::AgeBackend;
pub use crate::adapters::cipher::gpg_backend::GpgBackend;
pub use crate::adapters::keyrings::file_keyring::FileKeyring;
pub use crate::adapters::stream::encrypted_file::EncryptedFile;
pub use crate::adapters::stream::memory_stream::MemoryStream;
pub use crate::config::keyring_config::KeyringConfig;
pub use crate::core::errors::{CryptFileError, Result};
pub use crate::core::models::key_identity::KeyIdentity;
pub use crate::core::models::open_mode::OpenMode;
pub use crate::core::traits::cipher::CipherBackend;
pub use crate::core::traits::keyring::PublicKeyring;
pub use crate::core::traits::stream::{EncryptedRead, EncryptedReadWrite, EncryptedWrite};
