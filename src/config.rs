use crate::services::store::CollectionNames;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub store: StoreSettings,
    #[serde(default)]
    pub collection: CollectionSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub neighborhoods: NeighborhoodSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Which listing store implementation serves queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgrest,
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// PostgREST base URL (Supabase project URL)
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub database_url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
    /// JSON fixtures for the memory backend
    pub fixtures_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_sales_table")]
    pub sales: String,
    #[serde(default = "default_rentals_table")]
    pub rentals: String,
    #[serde(default = "default_rent_stabilized_table")]
    pub rent_stabilized: String,
}

fn default_sales_table() -> String { "sales_listings".to_string() }
fn default_rentals_table() -> String { "rental_listings".to_string() }
fn default_rent_stabilized_table() -> String { "rent_stabilized_listings".to_string() }

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            sales: default_sales_table(),
            rentals: default_rentals_table(),
            rent_stabilized: default_rent_stabilized_table(),
        }
    }
}

impl From<&CollectionSettings> for CollectionNames {
    fn from(settings: &CollectionSettings) -> Self {
        Self {
            sales: settings.sales.clone(),
            rentals: settings.rentals.clone(),
            rent_stabilized: settings.rent_stabilized.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Redis L2 tier; L1-only when absent
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NeighborhoodSettings {
    /// TOML file replacing the built-in similarity table
    pub similarity_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn environment() -> Environment {
    // e.g., NEST__SERVER__PORT -> server.port
    Environment::with_prefix("NEST")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Configuration file (config/default.toml)
    /// 2. Local overrides (config/local.toml)
    /// 3. Environment variables (prefixed with NEST__)
    /// 4. SUPABASE_URL, SUPABASE_SERVICE_KEY and DATABASE_URL
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        apply_well_known_env(settings)?.try_deserialize()
    }

    /// Parse settings from TOML text alone, without consulting the environment
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn collection_names(&self) -> CollectionNames {
        CollectionNames::from(&self.collection)
    }
}

/// Map the conventional Supabase and Postgres variables onto store settings
fn apply_well_known_env(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("SUPABASE_URL", "store.url"),
        ("SUPABASE_SERVICE_KEY", "store.api_key"),
        ("DATABASE_URL", "store.database_url"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_minimal_settings() {
        let settings = Settings::from_toml_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert!(!settings.cache.enabled);
        assert!(settings.neighborhoods.similarity_file.is_none());
        assert_eq!(settings.collection_names().rentals, "rental_listings");
    }

    #[test]
    fn test_collection_overrides() {
        let settings = Settings::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [store]
            backend = "postgrest"
            url = "https://example.supabase.co"

            [collection]
            rent_stabilized = "rs_units"
            "#,
        )
        .unwrap();

        let names = settings.collection_names();
        assert_eq!(names.rent_stabilized, "rs_units");
        assert_eq!(names.sales, "sales_listings");
        assert_eq!(settings.store.url.as_deref(), Some("https://example.supabase.co"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Settings::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [store]
            backend = "dynamodb"
            "#,
        );
        assert!(result.is_err());
    }
}
