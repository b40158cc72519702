//! Sealing service configuration
//!
//! Loaded from TOML, then overridden by `DOCSEAL_*` environment variables.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_VERIFICATION_URL: &str = "DOCSEAL_VERIFICATION_URL";
pub const ENV_PRIVATE_KEY: &str = "DOCSEAL_PRIVATE_KEY";
pub const ENV_STORAGE_DIR: &str = "DOCSEAL_STORAGE_DIR";
pub const ENV_MAX_CONCURRENT: &str = "DOCSEAL_MAX_CONCURRENT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SealConfig {
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

impl SealConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup (normally the process environment)
    pub fn with_overrides<F>(mut self, lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_VERIFICATION_URL) {
            self.verification.base_url = url;
        }
        if let Some(path) = lookup(ENV_PRIVATE_KEY) {
            self.signing.private_key_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR) {
            self.storage.root = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_MAX_CONCURRENT) {
            self.workers.max_concurrent = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", ENV_MAX_CONCURRENT))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.verification.base_url.trim().is_empty(),
            "verification.base_url must not be empty"
        );
        anyhow::ensure!(
            self.workers.max_concurrent > 0,
            "workers.max_concurrent must be at least 1"
        );
        anyhow::ensure!(
            self.signing.key_bits >= 1024,
            "signing.key_bits must be at least 1024"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Prefix of the public verification URL; the document id is appended as `?hash=`
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,
    /// Modulus size used when a missing key is generated
    #[serde(default = "default_key_bits")]
    pub key_bits: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            private_key_path: default_private_key_path(),
            key_bits: default_key_bits(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_base_url() -> String {
    "https://localhost:8000/validar".to_string()
}

fn default_private_key_path() -> PathBuf {
    PathBuf::from("chave_privada_assinatura.pem")
}

fn default_key_bits() -> usize {
    2048
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("assinados")
}

fn default_max_concurrent() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SealConfig::from_str("").unwrap();
        assert_eq!(config, SealConfig::default());
        assert_eq!(config.verification.base_url, "https://localhost:8000/validar");
        assert_eq!(
            config.signing.private_key_path,
            PathBuf::from("chave_privada_assinatura.pem")
        );
        assert_eq!(config.signing.key_bits, 2048);
        assert_eq!(config.storage.root, PathBuf::from("assinados"));
        assert_eq!(config.workers.max_concurrent, 4);
    }

    #[test]
    fn test_partial_toml() {
        let config = SealConfig::from_str(
            r#"
            [verification]
            base_url = "https://sign.example.com/validar"

            [workers]
            max_concurrent = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.verification.base_url, "https://sign.example.com/validar");
        assert_eq!(config.workers.max_concurrent, 8);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_VERIFICATION_URL, "https://v.example.com/check"),
            (ENV_PRIVATE_KEY, "/etc/docseal/key.pem"),
            (ENV_STORAGE_DIR, "/var/lib/docseal"),
            (ENV_MAX_CONCURRENT, "2"),
        ]);

        let config = SealConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.verification.base_url, "https://v.example.com/check");
        assert_eq!(config.signing.private_key_path, PathBuf::from("/etc/docseal/key.pem"));
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/docseal"));
        assert_eq!(config.workers.max_concurrent, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SealConfig::default()
            .with_overrides(|key| (key == ENV_MAX_CONCURRENT).then(|| "many".to_string()))
            .is_err());
        assert!(SealConfig::default()
            .with_overrides(|key| (key == ENV_MAX_CONCURRENT).then(|| "0".to_string()))
            .is_err());
        assert!(SealConfig::from_str("[workers]\nmax_concurrent = \"x\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docseal.toml");
        std::fs::write(&path, "[storage]\nroot = \"/tmp/sealed\"\n").unwrap();

        let config = SealConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/tmp/sealed"));
        assert!(SealConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
