use config::{Config, ConfigError, Environment, File};
use gaeb_models::MatchKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

/// Configuration surface of the BoQ core, supplied by the surrounding
/// service or CLI. The core never reads files or the environment itself;
/// `load` exists for callers that want the conventional layered setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub import: ImportConfig,
    pub merge: MergeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Phase assumed when a caller does not declare one ("A" or "B").
    pub default_phase: String,
    pub max_document_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Field correlating positions across documents.
    pub match_key: MatchKey,
    /// Quantity difference tolerated before a conflict is reported.
    pub quantity_tolerance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Start with default values
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific config
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with GAEB prefix
            .add_source(Environment::with_prefix("GAEB").separator("__"));

        config.build()?.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            import: ImportConfig {
                default_phase: "A".to_string(),
                max_document_size: 64 * 1024 * 1024, // 64MB
            },
            merge: MergeConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
                file_path: None,
            },
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            match_key: MatchKey::OzPath,
            quantity_tolerance: Decimal::ZERO,
        }
    }
}
