use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::errors::{CryptFileError, Result};

/// Default ceiling for a single in-memory read: 1 GiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1 << 30;

/// Name of the per-user configuration directory.
pub const CONFIG_DIR_NAME: &str = "cryptfile";

/// Keyring locations and read limits handed to every encrypted stream.
///
/// This is a plain value: build one per process (or per test) and pass
/// it to the adapters that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringConfig {
    /// Secret keyring used to decrypt.
    pub secret_keyring: PathBuf,
    /// Public keyring used to resolve recipients when encrypting.
    pub public_keyring: PathBuf,
    /// Largest ciphertext `read_all` will buffer.
    pub max_buffer_size: usize,
}

impl KeyringConfig {
    /// Config with explicit keyring paths and the default buffer limit.
    pub fn new(secret_keyring: impl Into<PathBuf>, public_keyring: impl Into<PathBuf>) -> Self {
        Self {
            secret_keyring: secret_keyring.into(),
            public_keyring: public_keyring.into(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Default keyring locations for the current platform.
    ///
    /// - Linux: `~/.config/cryptfile/{secring.age,pubring.txt}`
    /// - macOS: `~/Library/Application Support/cryptfile/...`
    /// - Windows: `%APPDATA%/cryptfile/...`
    pub fn default_paths() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| CryptFileError::InvalidConfig {
            detail: "Could not determine config directory".into(),
        })?;
        let base = config_dir.join(CONFIG_DIR_NAME);
        Ok(Self::new(base.join("secring.age"), base.join("pubring.txt")))
    }

    /// Load the configuration from a TOML file.
    ///
    /// Relative keyring paths are resolved against the directory holding
    /// the config file.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(CryptFileError::InvalidConfig {
                detail: format!("{} not found", config_path.display()),
            });
        }
        let content = std::fs::read_to_string(config_path)?;
        let base = config_path.parent().unwrap_or(Path::new("."));
        Self::from_toml(&content, base)
    }

    /// Parse a TOML document, resolving relative paths against `base`.
    pub fn from_toml(content: &str, base: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| CryptFileError::InvalidConfig {
            detail: format!("Failed to parse keyring config: {e}"),
        })?;

        let max_buffer_size = file
            .buffer
            .and_then(|b| b.max_size)
            .unwrap_or(DEFAULT_MAX_BUFFER_SIZE);
        if max_buffer_size == 0 {
            return Err(CryptFileError::InvalidConfig {
                detail: "[buffer] max_size must be greater than zero".into(),
            });
        }

        Ok(Self {
            secret_keyring: resolve(base, &file.keyring.secret),
            public_keyring: resolve(base, &file.keyring.public),
            max_buffer_size,
        })
    }

    /// Same keyrings, different read ceiling.
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// On-disk layout of the configuration file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    keyring: KeyringSection,
    buffer: Option<BufferSection>,
}

/// The `[keyring]` section.
#[derive(Debug, Deserialize)]
struct KeyringSection {
    secret: PathBuf,
    public: PathBuf,
}

/// The `[buffer]` section.
#[derive(Debug, Deserialize)]
struct BufferSection {
    max_size: Option<usize>,
}
