use std::time::Duration;

/// A document as it currently sits in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub revision: u64,
    pub value: String,
}

/// Emitted to every subscriber of `key` after a successful write, the writer included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
    pub revision: u64,
    pub value: String,
}

#[derive(Debug)]
pub enum StoreError {
    Backend { key: String, message: String },
    Timeout { key: String, after: Duration },
    Encoding { message: String },
}

impl StoreError {
    pub(crate) fn backend(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend { key, message } => {
                write!(f, "document {key}: {message}")
            }
            Self::Timeout { key, after } => {
                write!(f, "document {key}: no response after {}ms", after.as_millis())
            }
            Self::Encoding { message } => {
                write!(f, "could not encode document: {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
