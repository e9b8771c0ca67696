use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub firebase: FirebaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirebaseConfig {
    /// Path to the service account JSON. Falls back to `GOOGLE_APPLICATION_CREDENTIALS`.
    pub credentials: Option<String>,
    /// Overrides the project ID found in the service account.
    pub project_id: Option<String>,
    /// Firestore REST base, ending in `/databases/{database}/documents`.
    pub firestore_url: Option<String>,
    /// FCM `messages:send` endpoint.
    pub fcm_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Collection whose created documents are dispatched
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Maximum number of dispatches in flight at once
    #[serde(default = "default_max_instances")]
    pub max_instances: usize,
    /// Re-read the document and skip the send when it is no longer queued
    #[serde(default = "default_true")]
    pub verify_before_send: bool,
    /// Attempts at writing the terminal status before giving up
    #[serde(default = "default_status_write_attempts")]
    pub status_write_attempts: u32,
    /// Delay before the first status write retry, doubled on each retry
    #[serde(default = "default_status_write_backoff_ms")]
    pub status_write_backoff_ms: u64,
    /// Validate messages with FCM without delivering them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_collection() -> String {
    "notifications".to_string()
}

fn default_max_instances() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_status_write_attempts() -> u32 {
    3
}

fn default_status_write_backoff_ms() -> u64 {
    200
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // RELAY_SERVER__PORT, RELAY_DISPATCH__MAX_INSTANCES, RELAY_FIREBASE__CREDENTIALS, ...
            .add_source(
                Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        // Cloud Run injects PORT.
        if let Some(port) = env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            settings.server.port = port;
        }

        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            max_instances: default_max_instances(),
            verify_before_send: true,
            status_write_attempts: default_status_write_attempts(),
            status_write_backoff_ms: default_status_write_backoff_ms(),
            dry_run: false,
        }
    }
}
