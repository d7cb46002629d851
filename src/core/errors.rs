use std::path::PathBuf;

/// All errors surfaced by cryptfile.
///
/// Filesystem causes are carried verbatim in `source` so callers can
/// still match on `io::ErrorKind`.
#[derive(Debug, thiserror::Error)]
pub enum CryptFileError {
    #[error(
        "Cannot open {path}: {source}\n\n  \
         Check that the path is correct and that you have permission to access it."
    )]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read failed before end of file: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Encrypted content exceeds the maximum buffer size of {limit} bytes\n\n  \
         Raise [buffer] max_size in the keyring configuration if the file is legitimate."
    )]
    Oversize { limit: usize },

    #[error("Decryption failed: {reason}")]
    Decrypt { reason: String },

    #[error("Encryption failed: {reason}")]
    Encrypt { reason: String },

    #[error(
        "Write failed: {source}\n\n  \
         The file may now contain a partial ciphertext. Re-write it before reading."
    )]
    Write {
        #[source]
        source: std::io::Error,
    },

    #[error("Close failed: {source}")]
    Close {
        #[source]
        source: std::io::Error,
    },

    #[error("File {path} is not open")]
    NotOpen { path: PathBuf },

    #[error("Keyring error in {path}: {detail}")]
    Keyring { path: PathBuf, detail: String },

    #[error(
        "Recipient '{name}' not found in the public keyring\n\n  \
         Add it first, or pass the full age public key (age1...)."
    )]
    RecipientNotFound { name: String },

    #[error("Key '{identity}' not found in keyring")]
    KeyNotFound { identity: String },

    #[error("Key '{identity}' already exists in keyring")]
    KeyAlreadyExists { identity: String },

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CryptFileError>;
