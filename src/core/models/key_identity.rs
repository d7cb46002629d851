/// A recipient in the public keyring: a public key that encrypted
/// files can be addressed to, with an optional human label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyIdentity {
    pub public_key: String,
    pub label: Option<String>,
    pub added_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl KeyIdentity {
    /// A recipient with no label.
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            label: None,
            added_at: None,
        }
    }

    /// A recipient carrying `label`, stamped with the current time.
    pub fn labeled(public_key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            label: Some(label.into()),
            added_at: Some(chrono::Utc::now()),
        }
    }

    /// Whether `name` refers to this identity by label.
    pub fn has_label(&self, name: &str) -> bool {
        self.label.as_deref() == Some(name)
    }
}

impl std::fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", self.public_key, label),
            None => write!(f, "{}", self.public_key),
        }
    }
}
