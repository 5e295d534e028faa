//! Server configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `PAYGATE__`-prefixed environment variables, then CLI flags.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// `postgres` or `memory`
    pub backend: String,
    pub postgres_url: String,
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "memory".into(),
            postgres_url: String::new(),
            max_connections: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub admin_token: String,
    pub lockout_threshold: i32,
    pub lockout_minutes: i64,
    pub replay_window_minutes: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            admin_token: String::new(),
            lockout_threshold: 5,
            lockout_minutes: 15,
            replay_window_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub global_min_amount: i64,
    pub global_max_amount: i64,
    pub default_expiry_minutes: i64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            global_min_amount: 100,
            global_max_amount: 100_000_000,
            default_expiry_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub check_active_secs: i64,
    pub check_terminal_secs: i64,
    pub mutation_secs: i64,
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            check_active_secs: 30,
            check_terminal_secs: 300,
            mutation_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub enable_cors: bool,
    pub rate_limit_per_minute: u32,
    pub public_base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            enable_cors: false,
            rate_limit_per_minute: 120,
            public_base_url: "http://localhost:8080".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, error
    pub level: String,
    /// json or pretty
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PAYGATE").separator("__"),
        );
        let loaded = builder.build()?.try_deserialize()?;
        Ok(loaded)
    }
}
