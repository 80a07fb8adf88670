//! Secret store adapters
//!
//! `FileSecretStore` keeps the server secret in a plain file next to the
//! settings, creating it on first use. `StaticSecretStore` holds one in memory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::ports::SecretStore;
use crate::services::crypto::generate_secret;

/// Secret kept in a file, generated once when missing
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the secret file has been created yet
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read_existing(&self) -> Result<String> {
        let secret = fs::read_to_string(&self.path)?.trim().to_string();
        if secret.is_empty() {
            return Err(Error::Config(format!(
                "Secret file {} is empty",
                self.path.display()
            )));
        }
        Ok(secret)
    }

    /// Write a new secret
    ///
    /// The secret is fully written to a private file first and then linked
    /// into place, so a concurrent reader never sees a partial secret and the
    /// loser of a creation race adopts the winner's secret.
    fn create(&self) -> Result<String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let secret = generate_secret();
        let staging = self
            .path
            .with_extension(format!("{}.tmp", rand::random::<u64>()));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)?;
        file.write_all(secret.as_bytes())?;
        file.sync_all()?;
        drop(file);

        let linked = fs::hard_link(&staging, &self.path);
        let _ = fs::remove_file(&staging);

        match linked {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "generated new server secret");
                Ok(secret)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => self.read_existing(),
            Err(e) => Err(e.into()),
        }
    }
}

impl SecretStore for FileSecretStore {
    fn secret(&self) -> Result<String> {
        match self.read_existing() {
            Ok(secret) => Ok(secret),
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => self.create(),
            Err(e) => Err(e),
        }
    }
}

/// In-memory secret
#[derive(Clone)]
pub struct StaticSecretStore {
    secret: String,
}

impl StaticSecretStore {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSecretStore").finish_non_exhaustive()
    }
}

impl SecretStore for StaticSecretStore {
    fn secret(&self) -> Result<String> {
        if self.secret.is_empty() {
            return Err(Error::Config("Server secret is empty".to_string()));
        }
        Ok(self.secret.clone())
    }
}
