//! Credential providers.
//!
//! The completion API key is looked up through a [`SecretProvider`] handed to
//! whoever builds the client, so tests can inject keys without touching the
//! environment or the user's data directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name under which the completion API key is stored.
pub const OPENAI_SECRET: &str = "openai";

/// File holding stored credentials inside the data directory.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.toml";

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Failed to access credentials file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse credentials file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Source of named secrets.
pub trait SecretProvider: Send + Sync {
    /// Look up a secret. `Ok(None)` means the provider has no value for it.
    fn get(&self, name: &str) -> Result<Option<String>, SecretError>;
}

/// Reads secrets from environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    overrides: BTreeMap<String, String>,
}

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `name` from `var` instead of the derived variable name.
    pub fn with_var(mut self, name: impl Into<String>, var: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), var.into());
        self
    }

    /// Environment variable consulted for `name` (`openai` -> `OPENAI_API_KEY`).
    pub fn var_name(&self, name: &str) -> String {
        self.overrides
            .get(name)
            .cloned()
            .unwrap_or_else(|| format!("{}_API_KEY", name.to_uppercase().replace('-', "_")))
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        let var = self.var_name(name);
        Ok(std::env::var(&var).ok().filter(|v| !v.is_empty()))
    }
}

/// Secrets stored as a TOML table in the data directory.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/credentials.toml`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CREDENTIALS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write or replace a secret, creating the file and its directory.
    pub fn set(&self, name: &str, value: &str) -> Result<(), SecretError> {
        let mut secrets = self.load()?;
        secrets.insert(name.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string(&secrets)?;
        write_private(&self.path, &content)?;

        debug!(path = %self.path.display(), name, "Stored secret");
        Ok(())
    }

    fn load(&self) -> Result<BTreeMap<String, String>, SecretError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl SecretProvider for FileSecretStore {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(self.load()?.remove(name))
    }
}

/// Write `content` to a file only the owner can read.
///
/// A new file is created with mode 0600. An existing file is narrowed to 0600
/// before the new content is written.
#[cfg(unix)]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, content)
}

/// Fixed in-memory secrets.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretProvider {
    secrets: BTreeMap<String, String>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        Ok(self.secrets.get(name).cloned())
    }
}

/// Asks each provider in turn; the first value found wins.
#[derive(Default)]
pub struct ChainedSecretProvider {
    providers: Vec<Box<dyn SecretProvider>>,
}

impl ChainedSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: impl SecretProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl SecretProvider for ChainedSecretProvider {
    fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        for provider in &self.providers {
            if let Some(value) = provider.get(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
