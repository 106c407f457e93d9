use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub import: ImportConfig,
    pub spreadsheet: Option<SpreadsheetConfig>,
}

impl RegistryConfig {
    pub fn load() -> Result<Self> {
        let configured_path = std::env::var("VOTER_REGISTRY_CONFIG")
            .unwrap_or_else(|_| "config/registry.toml".to_string());
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(false));

        if let Ok(env_override) = std::env::var("VOTER_REGISTRY_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/registry.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("VOTER_REGISTRY")
                .prefix_separator("__")
                .separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize registry configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        ensure!(
            self.database.max_connections >= self.database.min_connections.unwrap_or(1),
            "Max connections must be >= min connections"
        );
        ensure!(
            self.database.max_connections <= 128,
            "Connection pool oversized"
        );
        ensure!(self.server.port > 0, "Server port must be greater than zero");
        self.maintenance.ensure_bounds()?;
        if let Some(spreadsheet) = &self.spreadsheet {
            spreadsheet.ensure_bounds()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 3001,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        8
    }
}

/// Window sizes used by the maintenance commands.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "MaintenanceConfig::default_page_size")]
    pub page_size: u64,
    #[serde(default = "MaintenanceConfig::default_delete_batch_size")]
    pub delete_batch_size: usize,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
            delete_batch_size: Self::default_delete_batch_size(),
        }
    }
}

impl MaintenanceConfig {
    const fn default_page_size() -> u64 {
        1000
    }

    const fn default_delete_batch_size() -> usize {
        100
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure!(self.page_size > 0, "Page size must be positive");
        ensure!(self.page_size <= 10_000, "Page size exceeds limit");
        ensure!(
            self.delete_batch_size > 0,
            "Delete batch size must be positive"
        );
        ensure!(
            self.delete_batch_size <= 1_000,
            "Delete batch size exceeds limit"
        );
        Ok(())
    }
}

/// Zero-based column offsets of the import workbook.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub id_column: usize,
    #[serde(default = "ImportConfig::default_family_column")]
    pub family_column: usize,
    #[serde(default = "ImportConfig::default_classification_column")]
    pub classification_column: usize,
    #[serde(default = "ImportConfig::default_header_rows")]
    pub header_rows: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            id_column: 0,
            family_column: Self::default_family_column(),
            classification_column: Self::default_classification_column(),
            header_rows: Self::default_header_rows(),
        }
    }
}

impl ImportConfig {
    const fn default_family_column() -> usize {
        1
    }

    const fn default_classification_column() -> usize {
        2
    }

    const fn default_header_rows() -> usize {
        1
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadsheetConfig {
    pub spreadsheet_id: String,
    #[serde(default = "SpreadsheetConfig::default_sheet_name")]
    pub sheet_name: String,
    /// Column letter holding the numeric original id
    #[serde(default = "SpreadsheetConfig::default_id_column")]
    pub id_column: String,
    /// Column letter receiving the voted marker
    pub voted_column: String,
    #[serde(default = "SpreadsheetConfig::default_voted_value")]
    pub voted_value: String,
    #[serde(default = "SpreadsheetConfig::default_unvoted_value")]
    pub unvoted_value: String,
    pub access_token: String,
    #[serde(default = "SpreadsheetConfig::default_api_base")]
    pub api_base: String,
    pub request_timeout_ms: Option<u64>,
}

impl SpreadsheetConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(5_000);
        Duration::from_millis(millis)
    }

    fn ensure_bounds(&self) -> Result<()> {
        ensure!(
            !self.spreadsheet_id.is_empty(),
            "Spreadsheet id must be specified"
        );
        ensure!(
            is_column_letters(&self.id_column),
            "Spreadsheet id column must be column letters"
        );
        ensure!(
            is_column_letters(&self.voted_column),
            "Spreadsheet voted column must be column letters"
        );
        let millis = self.request_timeout_ms.unwrap_or(5_000);
        ensure!(millis >= 100, "Spreadsheet timeout must be at least 100ms");
        ensure!(
            millis <= 60_000,
            "Spreadsheet timeout cannot exceed 60 seconds"
        );
        Ok(())
    }

    fn default_sheet_name() -> String {
        "Sheet1".to_string()
    }

    fn default_id_column() -> String {
        "A".to_string()
    }

    fn default_voted_value() -> String {
        "TRUE".to_string()
    }

    fn default_unvoted_value() -> String {
        "FALSE".to_string()
    }

    fn default_api_base() -> String {
        "https://sheets.googleapis.com".to_string()
    }
}

fn is_column_letters(value: &str) -> bool {
    !value.is_empty() && value.len() <= 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
