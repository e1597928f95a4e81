//! API credential loading.
//!
//! The generative-language key is the one required piece of configuration.
//! It is read from the environment at startup; a missing key is fatal.

use std::fmt;

use crate::error::{ColloquyError, Result};

/// An API key together with the environment variable it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    source: String,
    key: String,
}

impl ApiCredential {
    pub fn new(source: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            key: key.into(),
        }
    }

    /// Read the key from the process environment.
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_lookup(var, |name| std::env::var(name).ok())
    }

    /// Read the key through an arbitrary lookup. Blank values count as missing.
    pub fn from_lookup<F>(var: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(var) {
            Some(value) if !value.trim().is_empty() => Ok(Self::new(var, value.trim())),
            _ => Err(ColloquyError::MissingCredential(format!(
                "API key not found. Please set the {} environment variable.",
                var
            ))),
        }
    }

    /// Name of the environment variable the key was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("source", &self.source)
            .field("key", &"<redacted>")
            .finish()
    }
}
