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

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub targets_path: PathBuf,
    /// Minimum extracted/known ratio a scan must reach before its diff is
    /// committed. Below this the run completes but change detection is
    /// skipped for it.
    pub coverage_trust_threshold: f64,
    /// Window (days) separating a "quick" follow-then-unfollow from
    /// ordinary churn in pattern reports.
    pub quick_unfollow_window_days: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub extractor_base_url: String,
    pub extractor_api_key: Option<String>,
    pub extractor_request_timeout_secs: u64,
    pub extractor_user_agent: String,
    pub extractor_page_size: u32,
    pub extractor_max_concurrent_targets: usize,
    pub extractor_inter_request_delay_ms: u64,
    pub extractor_max_retries: u32,
    pub extractor_retry_backoff_base_secs: u64,
    /// Cron expression for scheduled scans. `None` disables the scheduler job.
    pub scan_cron: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("targets_path", &self.targets_path)
            .field("database_url", &"[redacted]")
            .field("coverage_trust_threshold", &self.coverage_trust_threshold)
            .field(
                "quick_unfollow_window_days",
                &self.quick_unfollow_window_days,
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("extractor_base_url", &self.extractor_base_url)
            .field(
                "extractor_api_key",
                &self.extractor_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "extractor_request_timeout_secs",
                &self.extractor_request_timeout_secs,
            )
            .field("extractor_user_agent", &self.extractor_user_agent)
            .field("extractor_page_size", &self.extractor_page_size)
            .field(
                "extractor_max_concurrent_targets",
                &self.extractor_max_concurrent_targets,
            )
            .field(
                "extractor_inter_request_delay_ms",
                &self.extractor_inter_request_delay_ms,
            )
            .field("extractor_max_retries", &self.extractor_max_retries)
            .field(
                "extractor_retry_backoff_base_secs",
                &self.extractor_retry_backoff_base_secs,
            )
            .field("scan_cron", &self.scan_cron)
            .finish()
    }
}
