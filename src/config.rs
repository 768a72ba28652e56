use std::fs;
use std::path::Path;

use clap::Parser;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub retrieval: RetrievalConfig,
    pub mcp: McpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Evidence retrieval settings. `docs_dir` is the default corpus used when a
/// request does not name one; the index cache is keyed per directory.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RetrievalConfig {
    pub docs_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub supported_protocol_versions: Vec<String>,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "atlas")]
#[command(version, about = "Atlas - T-SQL migration analysis service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Logging level (overrides config file, e.g., "info,mssql_migration=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Default evidence docs directory (overrides config file)
    #[arg(long, value_name = "PATH")]
    pub docs_dir: Option<String>,
}

impl Config {
    /// Load configuration with command line, environment variable, and file
    /// support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();
        Self::load_with(cli_args)
    }

    pub fn load_with(cli_args: CommandLineArgs) -> Result<Self, anyhow::Error> {
        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Supported environment variables:
    /// - APP_SERVER_HOST: Server host (default: 0.0.0.0)
    /// - APP_SERVER_PORT: Server port (default: 8080)
    /// - APP_LOG_LEVEL: Logging level
    /// - APP_DOCS_DIR: Default evidence docs directory
    /// - APP_MCP_PROTOCOL_VERSIONS: Comma-separated protocol versions
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(docs_dir) = std::env::var("APP_DOCS_DIR") {
            self.retrieval.docs_dir = Some(docs_dir);
            tracing::info!("Override retrieval.docs_dir from env");
        }

        if let Ok(versions) = std::env::var("APP_MCP_PROTOCOL_VERSIONS") {
            let parsed: Vec<String> = versions
                .split(',')
                .map(str::trim)
                .filter(|version| !version.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.mcp.supported_protocol_versions = parsed;
                tracing::info!("Override mcp.supported_protocol_versions from env");
            }
        }
    }

    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(docs_dir) = &args.docs_dir {
            self.retrieval.docs_dir = Some(docs_dir.clone());
            tracing::info!("Override retrieval.docs_dir from CLI");
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.mcp.supported_protocol_versions.is_empty() {
            anyhow::bail!("mcp.supported_protocol_versions must not be empty");
        }
        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths =
            ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info,mssql_migration=debug".to_string(), file: None }
    }
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            supported_protocol_versions: vec![
                "2025-03-26".to_string(),
                "2025-11-25".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mcp.supported_protocol_versions.len(), 2);
        assert!(config.retrieval.docs_dir.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_sections() {
        let parsed: Config = toml::from_str(
            "[server]\nhost = \"127.0.0.1\"\nport = 9090\n\n[retrieval]\ndocs_dir = \"docs\"\n",
        )
        .unwrap();
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.server.port, 9090);
        assert_eq!(parsed.retrieval.docs_dir.as_deref(), Some("docs"));
        // Missing sections fall back to defaults.
        assert_eq!(parsed.mcp.supported_protocol_versions.len(), 2);
    }
}
