//! Credential storage
//!
//! A read-only username/password table shared by all sessions. Loaded once
//! at startup; lookups need no locking.

use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;

use crate::auth::validator::is_valid_input;

/// Answers the two questions authentication needs.
pub trait CredentialVerifier: Send + Sync {
    fn user_exists(&self, username: &str) -> bool;
    fn verify(&self, username: &str, password: &str) -> bool;
}

#[derive(Debug, Default, Clone)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.insert(username, password);
        self
    }

    pub fn insert(&mut self, username: &str, password: &str) {
        self.users.insert(username.to_string(), password.to_string());
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Parses `username password` lines. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Self {
        let mut store = Self::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(user), Some(pass)) if is_valid_input(user) && is_valid_input(pass) => {
                    store.insert(user, pass);
                }
                _ => warn!("Skipping malformed credentials line {}", number + 1),
            }
        }
        store
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store = Self::parse(&content);
        info!(
            "Loaded {} user(s) from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }
}

impl CredentialVerifier for CredentialStore {
    fn user_exists(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|stored| stored == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_noise() {
        let store = CredentialStore::parse(
            "# users\nalice secret\n\n  bob   hunter2  \nbroken\n",
        );
        assert_eq!(store.len(), 2);
        assert!(store.user_exists("alice"));
        assert!(store.verify("bob", "hunter2"));
        assert!(!store.user_exists("broken"));
    }

    #[test]
    fn verify_requires_matching_password() {
        let store = CredentialStore::new().with_user("alice", "secret");
        assert!(store.verify("alice", "secret"));
        assert!(!store.verify("alice", "Secret"));
        assert!(!store.verify("mallory", "secret"));
    }
}
