use serde::Deserialize;

/// Namespace used when `OSSA_NAMESPACE` is not set.
pub const DEFAULT_NAMESPACE: &str = "ossa";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection string (`redis://[:password@]host[:port][/db]`)
    pub redis_url: String,

    /// Namespace partitioning keys, the payload store and the processing queue
    pub namespace: String,

    /// Verbose logging for the ossa crates
    pub debug: bool,

    /// Port the HTTP front end listens on (default: 3000)
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            namespace: std::env::var("OSSA_NAMESPACE")
                .ok()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            debug: parse_flag(std::env::var("OSSA_DEBUG").ok().as_deref())
                .map_err(|_| anyhow::anyhow!("OSSA_DEBUG must be true/false/1/0"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
        })
    }

    /// Default `EnvFilter` directive used when `RUST_LOG` is unset.
    pub fn default_log_filter(&self, binary: &str) -> String {
        let level = if self.debug { "debug" } else { "info" };
        format!("{binary}={level},ossa_engine={level},ossa_common={level},tower_http=info")
    }
}

fn parse_flag(raw: Option<&str>) -> Result<bool, ()> {
    match raw.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v.is_empty() => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(()),
        },
    }
}
