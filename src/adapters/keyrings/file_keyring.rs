use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::errors::{CryptFileError, Result};
use crate::core::models::key_identity::KeyIdentity;
use crate::core::traits::keyring::PublicKeyring;

/// Public keyring persisted as a text file.
///
/// Format: one public key per line, with an optional inline `# label`.
/// Blank lines and lines starting with `#` are ignored.
///
/// Example `pubring.txt`:
/// ```text
/// # team keys
/// age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p # alice
/// age1x9ynm5k7wz6v3mj8d4qr5tl2hj9nc0kp6w3f7s2y8x4u1v0n3m5q7f2p
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyring {
    path: PathBuf,
}

impl FileKeyring {
    /// Create a keyring backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Return the file path this keyring reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a single line into a `KeyIdentity`, if it contains a key.
    fn parse_line(line: &str) -> Option<KeyIdentity> {
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (key, label) = match trimmed.split_once('#') {
            Some((k, l)) => {
                let l = l.trim();
                (k.trim(), (!l.is_empty()).then(|| l.to_string()))
            }
            None => (trimmed, None),
        };

        if key.is_empty() {
            return None;
        }

        Some(KeyIdentity {
            public_key: key.to_string(),
            label,
            added_at: None,
        })
    }

    /// Serialize all identities back to the file format.
    fn serialize(identities: &[KeyIdentity]) -> String {
        identities
            .iter()
            .map(|ki| match &ki.label {
                Some(label) => format!("{} # {}", ki.public_key, label),
                None => ki.public_key.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
            + "\n"
    }

    fn store(&self, identities: &[KeyIdentity]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, Self::serialize(identities))?;
        Ok(())
    }
}

impl PublicKeyring for FileKeyring {
    fn add(&self, identity: &KeyIdentity) -> Result<()> {
        let mut existing = self.list()?;

        if existing
            .iter()
            .any(|ki| ki.public_key == identity.public_key)
        {
            return Err(CryptFileError::KeyAlreadyExists {
                identity: identity.public_key.clone(),
            });
        }

        existing.push(identity.clone());
        self.store(&existing)?;
        debug!(keyring = %self.path.display(), recipient = %identity, "added recipient");
        Ok(())
    }

    fn list(&self) -> Result<Vec<KeyIdentity>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content =
            std::fs::read_to_string(&self.path).map_err(|e| CryptFileError::Keyring {
                path: self.path.clone(),
                detail: e.to_string(),
            })?;

        Ok(content.lines().filter_map(Self::parse_line).collect())
    }

    fn remove(&self, public_key: &str) -> Result<()> {
        let existing = self.list()?;

        if !existing.iter().any(|ki| ki.public_key == public_key) {
            return Err(CryptFileError::KeyNotFound {
                identity: public_key.to_string(),
            });
        }

        let filtered: Vec<_> = existing
            .into_iter()
            .filter(|ki| ki.public_key != public_key)
            .collect();

        self.store(&filtered)
    }

    fn resolve(&self, name: &str) -> Result<KeyIdentity> {
        let identities = self.list()?;

        identities
            .iter()
            .find(|ki| ki.has_label(name))
            .or_else(|| identities.iter().find(|ki| ki.public_key == name))
            .cloned()
            .ok_or_else(|| CryptFileError::RecipientNotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_keyring() -> (tempfile::TempDir, FileKeyring) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = FileKeyring::new(dir.path().join("pubring.txt"));
        (dir, keyring)
    }

    fn sample_key(suffix: &str) -> KeyIdentity {
        KeyIdentity::new(format!("age1testkey{suffix}"))
    }

    #[test]
    fn list_missing_file_returns_empty() {
        let (_dir, keyring) = temp_keyring();
        assert!(keyring.list().unwrap().is_empty());
    }

    #[test]
    fn add_and_list() {
        let (_dir, keyring) = temp_keyring();
        keyring.add(&sample_key("abc")).unwrap();

        let keys = keyring.list().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].public_key, "age1testkeyabc");
    }

    #[test]
    fn add_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = FileKeyring::new(dir.path().join("nested/dir/pubring.txt"));

        keyring.add(&sample_key("x")).unwrap();
        assert!(keyring.path().exists());
    }

    #[test]
    fn add_duplicate_fails() {
        let (_dir, keyring) = temp_keyring();
        let key = sample_key("dup");

        keyring.add(&key).unwrap();
        let result = keyring.add(&key);
        assert!(matches!(
            result,
            Err(CryptFileError::KeyAlreadyExists { .. })
        ));
    }

    #[test]
    fn remove_existing_key() {
        let (_dir, keyring) = temp_keyring();
        keyring.add(&sample_key("one")).unwrap();
        keyring.add(&sample_key("two")).unwrap();

        keyring.remove("age1testkeyone").unwrap();

        let keys = keyring.list().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].public_key, "age1testkeytwo");
    }

    #[test]
    fn remove_nonexistent_fails() {
        let (_dir, keyring) = temp_keyring();
        let result = keyring.remove("age1doesnotexist");
        assert!(matches!(result, Err(CryptFileError::KeyNotFound { .. })));
    }

    #[test]
    fn resolve_prefers_label_then_key() {
        let (_dir, keyring) = temp_keyring();
        keyring
            .add(&KeyIdentity::labeled("age1alice", "alice"))
            .unwrap();
        keyring.add(&sample_key("bob")).unwrap();

        assert_eq!(keyring.resolve("alice").unwrap().public_key, "age1alice");
        assert_eq!(
            keyring.resolve("age1testkeybob").unwrap().public_key,
            "age1testkeybob"
        );
        assert!(matches!(
            keyring.resolve("carol"),
            Err(CryptFileError::RecipientNotFound { .. })
        ));
    }

    #[test]
    fn parse_line_with_label() {
        let ki = FileKeyring::parse_line("age1abc123 # dev-team").unwrap();
        assert_eq!(ki.public_key, "age1abc123");
        assert_eq!(ki.label.as_deref(), Some("dev-team"));
    }

    #[test]
    fn parse_line_empty_label_is_none() {
        let ki = FileKeyring::parse_line("age1abc123 #").unwrap();
        assert_eq!(ki.label, None);
    }

    #[test]
    fn parse_line_skips_comments() {
        assert!(FileKeyring::parse_line("# this is a comment").is_none());
        assert!(FileKeyring::parse_line("").is_none());
        assert!(FileKeyring::parse_line("  ").is_none());
    }
}
