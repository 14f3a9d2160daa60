use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub fulfillment: FulfillmentConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Public base URL used when building artifact links.
    pub base_url: String,
    pub cors_origin: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Empty URL selects the in-memory repository (dev/test).
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Local,
    Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub local_dir: String,
    /// Key for signed read URLs in remote mode.
    #[serde(default)]
    pub signing_key: String,
    #[serde(default = "default_url_ttl")]
    pub url_ttl_seconds: u64,
}

// 7 days
fn default_url_ttl() -> u64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub admin_api_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FulfillmentConfig {
    /// A Processing order older than this is eligible for admin retry.
    #[serde(default = "default_stale_processing")]
    pub stale_processing_seconds: u64,
}

fn default_stale_processing() -> u64 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub from: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `DOSSIER__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("DOSSIER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
