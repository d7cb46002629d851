use crate::core::errors::Result;
use crate::core::models::key_identity::KeyIdentity;

/// Port for the public keyring: the set of recipients a file may be
/// encrypted for.
pub trait PublicKeyring: Send + Sync {
    /// Add a recipient to the keyring.
    fn add(&self, identity: &KeyIdentity) -> Result<()>;

    /// List all recipients.
    fn list(&self) -> Result<Vec<KeyIdentity>>;

    /// Remove a recipient by its public key string.
    fn remove(&self, public_key: &str) -> Result<()>;

    /// Find the recipient named `name`, matching labels first and then
    /// public keys.
    fn resolve(&self, name: &str) -> Result<KeyIdentity>;
}
