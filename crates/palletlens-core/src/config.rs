use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LensError, Result};
use crate::types::DetailLevel;

/// Top-level configuration for PalletLens.
///
/// Loaded from `~/.palletlens/config.toml` by default. Every section falls
/// back to its defaults when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LensConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
}

impl LensConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LensConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LensError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Full path of the credential store file.
    pub fn credential_store_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.credential.store_file)
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the credential store and other local state.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.palletlens".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Remote vision model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Vision-capable model identifier.
    pub model: String,
    /// Upper bound on completion length.
    pub max_tokens: u32,
    /// Image detail hint.
    pub detail: DetailLevel,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            max_tokens: 300,
            detail: DetailLevel::Low,
            timeout_secs: 60,
        }
    }
}

/// Image acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// JPEG quality (1-100) for camera snapshots.
    pub jpeg_quality: u8,
    /// Largest uploaded file accepted, in bytes.
    pub max_file_bytes: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 92,
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Credential persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    /// File name of the key/value store, relative to `general.data_dir`.
    pub store_file: String,
    /// Key under which the API key is stored.
    pub key: String,
    /// Environment variable whose value overrides the stored key for one run.
    /// It is never written to the store.
    pub env_var: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            store_file: "credentials.json".to_string(),
            key: "openai_api_key".to_string(),
            env_var: "OPENAI_API_KEY".to_string(),
        }
    }
}
