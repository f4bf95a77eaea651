//! Configuration management for the hvault CLI

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Result, VaultError};
use crate::ui::UI;
use crate::{ConfigArgs, ConfigCommand};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SUBJECTS: [&str; 4] = ["Mathematics", "Physics", "Chemistry", "Computer Science"];

const ENV_PREFIX: &str = "HANDOUT_VAULT";

/// Identity provider used for email/password sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Public web API key of the identity project
    pub api_key: Option<String>,
    pub sign_in_endpoint: String,
    pub token_endpoint: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            sign_in_endpoint: "https://identitytoolkit.googleapis.com/v1".to_string(),
            token_endpoint: "https://securetoken.googleapis.com/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Handout Vault API
    pub api_base: String,
    /// Client-wide request timeout in seconds
    pub timeout: u64,
    pub verbose: bool,
    pub storage_dir: PathBuf,
    pub token_storage_enabled: bool,
    /// Subjects always listed, in display order
    pub subjects: Vec<String>,
    pub download_dir: Option<PathBuf>,
    pub identity: IdentityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            storage_dir: default_storage_dir(),
            token_storage_enabled: true,
            subjects: DEFAULT_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            download_dir: None,
            identity: IdentityConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location
    pub async fn load() -> Result<Self> {
        Self::load_from(&default_config_path()).await
    }

    /// Load defaults, then the JSON file, then `HANDOUT_VAULT_*` environment variables.
    ///
    /// A missing or unreadable file is replaced by one holding the defaults.
    pub async fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            Self::default().save(config_path).await?;
        } else {
            let content = fs::read_to_string(config_path).await?;
            if serde_json::from_str::<Self>(&content).is_err() {
                tracing::warn!(path = %config_path.display(), "config file is invalid, resetting to defaults");
                Self::default().save(config_path).await?;
            }
        }

        let config = Self::from_file_and_env(config_path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file_and_env(config_path: &Path, env_prefix: &str) -> Result<Self> {
        let layered = config::Config::builder()
            .add_source(
                File::from(config_path)
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("subjects")
                    .try_parsing(true),
            )
            .build()?;

        Ok(layered.try_deserialize()?)
    }

    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(VaultError::invalid_endpoint("API base URL cannot be empty"));
        }
        if self.timeout == 0 {
            return Err(VaultError::config("Timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Absolute URL for an API path
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_start_matches('/');
        let base_url = if self.api_base.starts_with("http://") || self.api_base.starts_with("https://")
        {
            self.api_base.clone()
        } else {
            format!("https://{}", self.api_base)
        };

        format!("{}/{}", base_url.trim_end_matches('/'), endpoint)
    }

    pub fn session_path(&self) -> PathBuf {
        self.storage_dir.join("session.json")
    }
}

/// Percent-encode a single path segment (subject names contain spaces)
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("handout-vault")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

pub fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("handout-vault")
}

/// Handles `hvault config ...`
pub struct ConfigService {
    config: Config,
    config_path: PathBuf,
    ui: UI,
}

impl ConfigService {
    pub fn new(config: Config) -> Self {
        Self::with_config_path(config, default_config_path())
    }

    pub fn with_config_path(config: Config, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            ui: UI::new(),
        }
    }

    #[cfg(test)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        match args.command {
            ConfigCommand::Show => {
                self.show();
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => {
                let url = url.trim().to_string();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(VaultError::invalid_endpoint(
                        "Endpoint must start with http:// or https://",
                    ));
                }
                self.config.api_base = url.trim_end_matches('/').to_string();
                self.ui
                    .success(&format!("API endpoint set to {}", self.config.api_base));
            }
            ConfigCommand::SetTimeout { seconds } => {
                if seconds == 0 {
                    return Err(VaultError::validation_field(
                        "Timeout must be greater than zero",
                        "timeout",
                    ));
                }
                self.config.timeout = seconds;
                self.ui.success(&format!("Timeout set to {}s", seconds));
            }
            ConfigCommand::SetVerbose { enabled } => {
                self.config.verbose = parse_bool(&enabled)?;
                self.ui
                    .success(&format!("Verbose output: {}", self.config.verbose));
            }
            ConfigCommand::SetIdentityKey { key } => {
                let key = key.trim();
                self.config.identity.api_key = if key.is_empty() {
                    None
                } else {
                    Some(key.to_string())
                };
                self.ui.success("Identity provider key updated");
            }
            ConfigCommand::SetDownloadDir { path } => {
                self.config.download_dir = Some(path.clone());
                self.ui
                    .success(&format!("Download directory set to {}", path.display()));
            }
            ConfigCommand::AddSubject { name } => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(VaultError::validation_field(
                        "Subject name cannot be empty",
                        "subject",
                    ));
                }
                if self.config.subjects.iter().any(|s| s == &name) {
                    self.ui.warning(&format!("Subject '{}' is already listed", name));
                    return Ok(());
                }
                self.config.subjects.push(name.clone());
                self.ui.success(&format!("Added subject '{}'", name));
            }
            ConfigCommand::RemoveSubject { name } => {
                let before = self.config.subjects.len();
                self.config.subjects.retain(|s| s != &name);
                if self.config.subjects.len() == before {
                    return Err(VaultError::not_found(format!("subject '{}'", name)));
                }
                self.ui.success(&format!("Removed subject '{}'", name));
            }
            ConfigCommand::Reset => {
                self.config = Config::default();
                self.ui.success("Configuration reset to defaults");
            }
        }

        self.config.save(&self.config_path).await
    }

    fn show(&self) {
        let identity_key = if self.config.identity.api_key.is_some() {
            "configured".to_string()
        } else {
            "-".to_string()
        };
        let download_dir = self
            .config
            .download_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "current directory".to_string());

        self.ui.card(
            "Configuration",
            vec![
                ("Config file", self.config_path.display().to_string()),
                ("API endpoint", self.config.api_base.clone()),
                ("Timeout", format!("{}s", self.config.timeout)),
                ("Verbose", self.config.verbose.to_string()),
                ("Storage", self.config.storage_dir.display().to_string()),
                ("Downloads", download_dir),
                ("Subjects", self.config.subjects.join(", ")),
                ("Identity key", identity_key),
            ],
        );
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(VaultError::invalid_input(format!(
            "Expected true/false, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::test_helpers::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.timeout, 15);
        assert_eq!(
            config.subjects,
            vec!["Mathematics", "Physics", "Chemistry", "Computer Science"]
        );
        assert!(config.identity.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_joins_without_double_slash() {
        let mut config = Config::default();
        config.api_base = "http://localhost:8000/".to_string();
        assert_eq!(
            config.endpoint_url("/handouts/subjects"),
            "http://localhost:8000/handouts/subjects"
        );
        assert_eq!(
            config.endpoint_url("handouts/subjects"),
            "http://localhost:8000/handouts/subjects"
        );
    }

    #[test]
    fn test_endpoint_url_adds_scheme() {
        let mut config = Config::default();
        config.api_base = "vault.example.edu".to_string();
        assert_eq!(
            config.endpoint_url("/auth/me"),
            "https://vault.example.edu/auth/me"
        );
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("Computer Science"), "Computer%20Science");
        assert_eq!(encode_segment("Physics"), "Physics");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            timeout: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_creates_default_file() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS);
    }

    #[tokio::test]
    async fn test_save_then_load_keeps_values() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.api_base = "https://vault.example.edu".to_string();
        config.timeout = 42;
        config.subjects.push("Biology".to_string());
        config.save(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded.api_base, "https://vault.example.edu");
        assert_eq!(loaded.timeout, 42);
        assert_eq!(loaded.subjects.last().map(String::as_str), Some("Biology"));
    }

    #[tokio::test]
    async fn test_environment_overrides_file() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("config.json");

        let mut config = Config::default();
        config.api_base = "https://file.example.edu".to_string();
        config.timeout = 42;
        config.save(&path).await.unwrap();

        // Prefix unique to this test; the process environment is shared
        std::env::set_var("HVAULT_LAYERING_API_BASE", "https://env.example.edu");
        std::env::set_var("HVAULT_LAYERING_SUBJECTS", "Art,Music");
        std::env::set_var("HVAULT_LAYERING_IDENTITY__API_KEY", "k123");

        let layered = Config::from_file_and_env(&path, "HVAULT_LAYERING");

        std::env::remove_var("HVAULT_LAYERING_API_BASE");
        std::env::remove_var("HVAULT_LAYERING_SUBJECTS");
        std::env::remove_var("HVAULT_LAYERING_IDENTITY__API_KEY");

        let layered = layered.unwrap();
        assert_eq!(layered.api_base, "https://env.example.edu");
        assert_eq!(layered.subjects, vec!["Art", "Music"]);
        assert_eq!(layered.identity.api_key.as_deref(), Some("k123"));
        // Untouched keys keep the file value
        assert_eq!(layered.timeout, 42);
    }

    #[tokio::test]
    async fn test_invalid_file_is_reset() {
        let temp_dir = create_temp_dir();
        let path = create_temp_file_with_content(&temp_dir, "config.json", b"{not json");

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT_SECS);
        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("api_base"));
    }

    #[tokio::test]
    async fn test_config_service_updates_and_persists() {
        let temp_dir = create_temp_dir();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::with_config_path(Config::default(), path.clone());

        service
            .handle_config(ConfigArgs {
                command: ConfigCommand::SetEndpoint {
                    url: "https://vault.example.edu/".to_string(),
                },
            })
            .await
            .unwrap();
        service
            .handle_config(ConfigArgs {
                command: ConfigCommand::AddSubject {
                    name: "Biology".to_string(),
                },
            })
            .await
            .unwrap();

        assert_eq!(service.config().api_base, "https://vault.example.edu");
        let saved: Config = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.api_base, "https://vault.example.edu");
        assert!(saved.subjects.contains(&"Biology".to_string()));
    }

    #[tokio::test]
    async fn test_config_service_rejects_bad_endpoint() {
        let temp_dir = create_temp_dir();
        let mut service =
            ConfigService::with_config_path(Config::default(), temp_dir.path().join("c.json"));

        let result = service
            .handle_config(ConfigArgs {
                command: ConfigCommand::SetEndpoint {
                    url: "ftp://vault".to_string(),
                },
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_remove_unknown_subject_fails() {
        let temp_dir = create_temp_dir();
        let mut service =
            ConfigService::with_config_path(Config::default(), temp_dir.path().join("c.json"));

        let result = service
            .handle_config(ConfigArgs {
                command: ConfigCommand::RemoveSubject {
                    name: "Astrology".to_string(),
                },
            })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("on").unwrap());
        assert!(!parse_bool("FALSE").unwrap());
        assert!(parse_bool("maybe").is_err());
    }
}
