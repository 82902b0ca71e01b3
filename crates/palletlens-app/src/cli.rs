//! CLI argument definitions for the PalletLens application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use palletlens_core::types::{Credential, DetailLevel};
use std::path::PathBuf;

/// PalletLens: describe warehouse photos for problem reports.
#[derive(Parser, Debug)]
#[command(name = "palletlens", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the credential store.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Credential for this run only. Not persisted.
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    /// Image detail hint sent with the request (low, high).
    #[arg(long = "detail", global = true)]
    pub detail: Option<DetailLevel>,

    /// Print the final session view as JSON.
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Upload an image file and describe it.
    Analyze {
        /// Image file to analyze.
        file: PathBuf,
    },
    /// Snapshot a camera frame file and describe it.
    Capture {
        /// Frame file kept current by the camera.
        #[arg(long = "frame")]
        frame: PathBuf,
    },
    /// Manage the stored inference credential.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum KeyAction {
    /// Store a credential. Blank input clears it.
    Set { value: String },
    /// Remove the stored credential.
    Clear,
    /// Report whether a credential is available.
    Status,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PALLETLENS_CONFIG env var > platform default (~/.palletlens/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PALLETLENS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Resolve a credential that overrides the store for this run.
    ///
    /// Priority: --api-key flag > `env_var` (normally OPENAI_API_KEY).
    /// Blank values are ignored.
    pub fn resolve_api_key(&self, env_var: &str) -> Option<Credential> {
        if let Some(c) = self.api_key.as_deref().and_then(Credential::new) {
            return Some(c);
        }
        std::env::var(env_var).ok().and_then(Credential::new)
    }

    /// Resolve the detail hint.
    ///
    /// Priority: --detail flag > config file value.
    pub fn resolve_detail(&self, config_detail: DetailLevel) -> DetailLevel {
        self.detail.unwrap_or(config_detail)
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".palletlens").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".palletlens").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_with_globals() {
        let args = CliArgs::try_parse_from([
            "palletlens",
            "analyze",
            "damage.jpg",
            "--detail",
            "high",
            "--json",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Analyze {
                file: PathBuf::from("damage.jpg")
            }
        );
        assert_eq!(args.resolve_detail(DetailLevel::Low), DetailLevel::High);
        assert!(args.json);
    }

    #[test]
    fn test_parse_capture_requires_frame() {
        assert!(CliArgs::try_parse_from(["palletlens", "capture"]).is_err());
        let args =
            CliArgs::try_parse_from(["palletlens", "capture", "--frame", "/tmp/cam.jpg"]).unwrap();
        assert_eq!(
            args.command,
            Command::Capture {
                frame: PathBuf::from("/tmp/cam.jpg")
            }
        );
    }

    #[test]
    fn test_parse_key_actions() {
        let args = CliArgs::try_parse_from(["palletlens", "key", "set", "sk-abc"]).unwrap();
        assert_eq!(
            args.command,
            Command::Key {
                action: KeyAction::Set {
                    value: "sk-abc".to_string()
                }
            }
        );
        let args = CliArgs::try_parse_from(["palletlens", "key", "status"]).unwrap();
        assert_eq!(args.command, Command::Key { action: KeyAction::Status });
    }

    #[test]
    fn test_invalid_detail_rejected() {
        assert!(CliArgs::try_parse_from(["palletlens", "analyze", "a.jpg", "--detail", "auto"]).is_err());
    }

    #[test]
    fn test_flag_overrides() {
        let args = CliArgs::try_parse_from([
            "palletlens",
            "-c",
            "/etc/palletlens.toml",
            "-d",
            "/var/lib/palletlens",
            "-l",
            "debug",
            "--api-key",
            "sk-flag",
            "key",
            "status",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/palletlens.toml"));
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/var/lib/palletlens"));
        assert_eq!(args.resolve_log_level("info"), "debug");
        assert_eq!(
            args.resolve_api_key("PALLETLENS_TEST_UNSET_VAR").map(|c| c.expose().to_string()),
            Some("sk-flag".to_string())
        );
    }

    #[test]
    fn test_defaults_fall_back_to_config() {
        let args = CliArgs::try_parse_from(["palletlens", "key", "status"]).unwrap();
        assert_eq!(args.resolve_data_dir(), None);
        assert_eq!(args.resolve_log_level("warn"), "warn");
        assert_eq!(args.resolve_detail(DetailLevel::Low), DetailLevel::Low);
        assert!(args.resolve_api_key("PALLETLENS_TEST_UNSET_VAR").is_none());
    }
}
