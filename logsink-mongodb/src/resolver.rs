//! Lookup of named connection strings, so deployments can refer to a connection by alias instead
//! of embedding the URL (and its credentials) in the sink setup.

use std::collections::HashMap;
use std::env;

pub const DEFAULT_ENV_PREFIX: &str = "LOGSINK_MONGODB_CONNECTION_";

/// Resolves a connection string alias. Returns `None` when the alias is unknown.
pub trait ConnectionStringResolver {
    fn resolve(&self, name: &str) -> Option<String>;
}

impl ConnectionStringResolver for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolves aliases from environment variables. The alias `audit-db` is looked up as
/// `<prefix>AUDIT_DB`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvResolver {
    prefix: String,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl EnvResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable consulted for `name`.
    pub fn key_for(&self, name: &str) -> String {
        let alias: String = name
            .trim()
            .chars()
            .map(|c| match c {
                '-' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("{}{}", self.prefix, alias)
    }
}

impl ConnectionStringResolver for EnvResolver {
    fn resolve(&self, name: &str) -> Option<String> {
        let key = self.key_for(name);
        match env::var(&key) {
            Ok(value) if !value.trim().is_empty() => Some(value),
            Ok(_) => {
                tracing::warn!(key = %key, "Named connection string is set but empty, ignoring it");
                None
            }
            Err(_) => None,
        }
    }
}
