//! Secret reference parsing
//!
//! A raw reference is dispatched on its scheme prefix. Anything without a
//! recognised prefix is a literal value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::constants::{
    SECRET_SCHEME_ENV, SECRET_SCHEME_FILE, SECRET_SCHEME_VAULT, VAULT_SECRET_KEY_PARAM,
};

/// Backing store a secret reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretScheme {
    Literal,
    Env,
    File,
    Vault,
}

impl fmt::Display for SecretScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Literal => "literal",
            Self::Env => "env",
            Self::File => "file",
            Self::Vault => "vault",
        };
        f.write_str(name)
    }
}

/// A reference that could not be parsed for its scheme
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {scheme} reference: {reason}")]
pub struct InvalidSecretReference {
    /// Scheme whose syntax was violated
    pub scheme: SecretScheme,
    /// What was wrong
    pub reason: String,
}

/// Parsed secret reference
#[derive(Clone, PartialEq, Eq)]
pub enum SecretReference {
    /// The raw value is the secret itself
    Literal(Zeroizing<String>),
    /// `env://NAME`
    Env { variable: String },
    /// `file://PATH`
    File { path: PathBuf },
    /// `vault://mount/path?secret=key`
    Vault {
        mount: String,
        path: String,
        key: String,
    },
}

impl SecretReference {
    /// Parse a raw reference string
    pub fn parse(raw: &str) -> Result<Self, InvalidSecretReference> {
        if let Some(variable) = raw.strip_prefix(SECRET_SCHEME_ENV) {
            if variable.is_empty() {
                return Err(invalid(SecretScheme::Env, "variable name is empty"));
            }
            return Ok(Self::Env {
                variable: variable.to_string(),
            });
        }

        if let Some(path) = raw.strip_prefix(SECRET_SCHEME_FILE) {
            if path.is_empty() {
                return Err(invalid(SecretScheme::File, "path is empty"));
            }
            return Ok(Self::File {
                path: PathBuf::from(path),
            });
        }

        if let Some(rest) = raw.strip_prefix(SECRET_SCHEME_VAULT) {
            return parse_vault(rest);
        }

        Ok(Self::Literal(Zeroizing::new(raw.to_string())))
    }

    /// Scheme this reference dispatches to
    pub fn scheme(&self) -> SecretScheme {
        match self {
            Self::Literal(_) => SecretScheme::Literal,
            Self::Env { .. } => SecretScheme::Env,
            Self::File { .. } => SecretScheme::File,
            Self::Vault { .. } => SecretScheme::Vault,
        }
    }
}

fn parse_vault(rest: &str) -> Result<SecretReference, InvalidSecretReference> {
    let (location, query) = rest
        .split_once('?')
        .ok_or_else(|| invalid(SecretScheme::Vault, "missing '?secret=<key>' query"))?;

    let (mount, path) = location
        .split_once('/')
        .ok_or_else(|| invalid(SecretScheme::Vault, "expected 'mount/path'"))?;
    if mount.is_empty() || path.is_empty() {
        return Err(invalid(SecretScheme::Vault, "mount and path must be non-empty"));
    }

    let key = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == VAULT_SECRET_KEY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid(SecretScheme::Vault, "missing 'secret' query parameter"))?;

    Ok(SecretReference::Vault {
        mount: mount.to_string(),
        path: path.trim_end_matches('/').to_string(),
        key: key.to_string(),
    })
}

fn invalid(scheme: SecretScheme, reason: &str) -> InvalidSecretReference {
    InvalidSecretReference {
        scheme,
        reason: reason.to_string(),
    }
}

// Literal values never reach logs.
impl fmt::Debug for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(_) => f.write_str("Literal([REDACTED])"),
            Self::Env { variable } => f.debug_struct("Env").field("variable", variable).finish(),
            Self::File { path } => f.debug_struct("File").field("path", path).finish(),
            Self::Vault { mount, path, key } => f
                .debug_struct("Vault")
                .field("mount", mount)
                .field("path", path)
                .field("key", key)
                .finish(),
        }
    }
}
