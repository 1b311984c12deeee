use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Errors surfaced by the ingestion core to its callers.
///
/// Provider scrape failures never appear here: they are folded into
/// `failure` metrics by the scheduler.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("coupon store I/O error at {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("coupon store at {path} is not valid JSON: {source}")]
    CorruptStore {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("provider not found: {0}")]
    UnknownProvider(String),

    #[error("a provider named \"{0}\" is already registered")]
    DuplicateProvider(String),

    #[error("ingestion service must be initialized first")]
    NotInitialized,

    #[error("ingestion service has been shut down")]
    ShutDown,

    #[error("invalid cron expression \"{expression}\" for provider {provider}")]
    InvalidSchedule { provider: String, expression: String },

    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] FetchError),

    #[error("shutdown did not complete within {timeout_secs}s")]
    ShutdownTimedOut { timeout_secs: u64 },
}

/// Errors from the HTTP fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("page not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },
}

/// Errors a provider adapter may raise from `scrape()`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("all {count} sources failed for {provider}: {errors}")]
    AllSourcesFailed {
        provider: String,
        count: usize,
        errors: String,
    },

    #[error("{0}")]
    Scrape(String),
}
