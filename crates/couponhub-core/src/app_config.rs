use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide settings for the ingestion service and its binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// YAML provider definitions. `None` means the built-in platform defaults.
    pub providers_path: Option<PathBuf>,
    /// JSON file backing the coupon store.
    pub store_path: PathBuf,
    /// Maximum number of metric entries retained per provider.
    pub metrics_history: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    pub fetch_max_retries: u32,
    pub fetch_backoff_base_secs: u64,
    /// Run every enabled provider once right after the scheduler starts.
    pub run_on_startup: bool,
    pub shutdown_timeout_secs: u64,
}
