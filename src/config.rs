use crate::cli::Cli;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default ceiling for scalar values shown without `--no-size-guard`.
pub const DEFAULT_MAX_CONTENT_SIZE: u64 = 1024 * 1024;

/// Main configuration combining connection and display settings.
///
/// Can be loaded from files, env vars, or CLI args with precedence order:
/// CLI > File > Environment > Defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the store lives and how to authenticate against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db: 0,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Largest scalar (in bytes) the inspector fetches when the size guard is on.
    #[serde(default = "default_max_content_size")]
    pub max_content_size: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_content_size: default_max_content_size(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_max_content_size() -> u64 {
    DEFAULT_MAX_CONTENT_SIZE
}

/// The settings a config file actually spells out. Anything left out falls
/// through to the environment during the merge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub display: FileDisplayConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub db: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDisplayConfig {
    pub max_content_size: Option<u64>,
}

impl FileConfig {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl Config {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("REDIS_HOST") {
            config.server.host = host;
        }

        if let Some(port) = lookup("REDIS_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid REDIS_PORT: {}", port)))?;
        }

        if let Some(password) = lookup("REDIS_PASSWORD") {
            if !password.is_empty() {
                config.server.password = Some(password);
            }
        }

        if let Some(db) = lookup("REDIS_DB") {
            config.server.db = db
                .parse()
                .map_err(|_| ConfigError::Validation(format!("invalid REDIS_DB: {}", db)))?;
        }

        if let Some(size) = lookup("MAX_CONTENT_SIZE") {
            config.display.max_content_size = size.parse().map_err(|_| {
                ConfigError::Validation(format!("invalid MAX_CONTENT_SIZE: {}", size))
            })?;
        }

        Ok(config)
    }

    /// Create config with CLI args taking precedence over environment and file.
    ///
    /// Precedence: CLI > File > Environment > Defaults
    pub fn from_sources(cli: &Cli) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        let file_config = cli
            .config
            .as_ref()
            .map(FileConfig::load)
            .transpose()?;

        Ok(Self::merge(cli, file_config.as_ref(), &env_config))
    }

    fn merge(cli: &Cli, file_config: Option<&FileConfig>, env_config: &Config) -> Self {
        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or_else(|| file_config.and_then(|c| c.server.host.clone()))
                .unwrap_or_else(|| env_config.server.host.clone()),
            port: cli
                .port
                .or_else(|| file_config.and_then(|c| c.server.port))
                .unwrap_or(env_config.server.port),
            password: cli
                .password
                .clone()
                .or_else(|| file_config.and_then(|c| c.server.password.clone()))
                .or_else(|| env_config.server.password.clone()),
            db: cli
                .db
                .or_else(|| file_config.and_then(|c| c.server.db))
                .unwrap_or(env_config.server.db),
        };

        let display = DisplayConfig {
            max_content_size: cli
                .max_content_size
                .or_else(|| file_config.and_then(|c| c.display.max_content_size))
                .unwrap_or(env_config.display.max_content_size),
        };

        Config { server, display }
    }

    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.address(), "127.0.0.1:6379");
        assert_eq!(config.server.db, 0);
        assert_eq!(config.display.max_content_size, DEFAULT_MAX_CONTENT_SIZE);
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_HOST", "cache.local"),
            ("REDIS_PORT", "6380"),
            ("REDIS_DB", "3"),
            ("MAX_CONTENT_SIZE", "42"),
        ]))
        .unwrap();

        assert_eq!(config.server.host, "cache.local");
        assert_eq!(config.server.port, 6380);
        assert_eq!(config.server.db, 3);
        assert_eq!(config.server.password, None);
        assert_eq!(config.display.max_content_size, 42);
    }

    #[test]
    fn test_from_lookup_rejects_bad_port() {
        let result = Config::from_lookup(lookup(&[("REDIS_PORT", "not-a-port")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_merge_precedence() {
        let cli = Cli::try_parse_from(["coral-inspect", "--port", "7000", "info"]).unwrap();

        let mut file = FileConfig::default();
        file.server.host = Some("file-host".to_string());
        file.server.port = Some(6500);
        file.display.max_content_size = Some(10);

        let mut env = Config::default();
        env.server.host = "env-host".to_string();
        env.server.password = Some("secret".to_string());

        let merged = Config::merge(&cli, Some(&file), &env);
        assert_eq!(merged.server.port, 7000);
        assert_eq!(merged.server.host, "file-host");
        assert_eq!(merged.server.password.as_deref(), Some("secret"));
        assert_eq!(merged.display.max_content_size, 10);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("coral-inspect-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut config = Config::default();
        config.server.db = 5;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.server.db, 5);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"port": 6390}}"#).unwrap();
        assert_eq!(config.server.port, 6390);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.display.max_content_size, DEFAULT_MAX_CONTENT_SIZE);
    }

    #[test]
    fn test_partial_file_falls_through_to_env() {
        let cli = Cli::try_parse_from(["coral-inspect", "info"]).unwrap();
        let file: FileConfig = serde_json::from_str(r#"{"server": {"port": 6390}}"#).unwrap();
        let env = Config::from_lookup(lookup(&[
            ("REDIS_HOST", "env-host"),
            ("REDIS_PORT", "7001"),
            ("MAX_CONTENT_SIZE", "42"),
        ]))
        .unwrap();

        let merged = Config::merge(&cli, Some(&file), &env);
        assert_eq!(merged.server.host, "env-host");
        assert_eq!(merged.server.port, 6390);
        assert_eq!(merged.server.db, 0);
        assert_eq!(merged.display.max_content_size, 42);
    }

    #[test]
    fn test_file_config_load() {
        let dir = std::env::temp_dir().join(format!("coral-inspect-file-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.json");
        std::fs::write(&path, r#"{"display": {"max_content_size": 7}}"#).unwrap();

        let file = FileConfig::load(&path).unwrap();
        assert_eq!(file.display.max_content_size, Some(7));
        assert_eq!(file.server.host, None);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
