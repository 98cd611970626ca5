use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Invalid key '{raw}': {reason}")]
    InvalidKey { raw: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Snapshot error: {message}")]
    Snapshot { message: String },

    #[error("Rate limit violated: {admitted} admitted, limit is {limit}")]
    RateLimitViolation { admitted: usize, limit: usize },

    #[error("Dispatcher was closed while tasks were pending")]
    DispatcherClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Storage,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GeoError::InvalidKey { .. } | GeoError::Csv(_) => ErrorCategory::Input,
            GeoError::Http(_) => ErrorCategory::Network,
            GeoError::Io(_) | GeoError::Serialization(_) | GeoError::Snapshot { .. } => {
                ErrorCategory::Storage
            }
            GeoError::Config { .. }
            | GeoError::InvalidConfigValue { .. }
            | GeoError::MissingConfig { .. } => ErrorCategory::Configuration,
            GeoError::RateLimitViolation { .. } | GeoError::DispatcherClosed => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GeoError::InvalidKey { .. } => ErrorSeverity::Low,
            GeoError::Http(_) => ErrorSeverity::Medium,
            GeoError::Csv(_)
            | GeoError::Io(_)
            | GeoError::Serialization(_)
            | GeoError::Snapshot { .. }
            | GeoError::Config { .. }
            | GeoError::InvalidConfigValue { .. }
            | GeoError::MissingConfig { .. } => ErrorSeverity::High,
            GeoError::RateLimitViolation { .. } | GeoError::DispatcherClosed => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Check that the key column holds postal codes with at most 8 digits",
            ErrorCategory::Network => "Check network connectivity and retry; previous results can be reused with --snapshot",
            ErrorCategory::Storage => "Check file paths, permissions and that snapshot files are valid JSON",
            ErrorCategory::Configuration => "Review the command line arguments and the TOML provider configuration",
            ErrorCategory::Internal => "This is a bug in the dispatcher; please report it with the log output",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            GeoError::InvalidKey { raw, .. } => format!("Postal code '{}' is not valid", raw),
            GeoError::Snapshot { message } => format!("Could not use snapshot: {}", message),
            GeoError::MissingConfig { field } => format!("Missing setting: {}", field),
            other => other.to_string(),
        }
    }
}

/// 供應商層級錯誤：全部都代表「無結果，換下一個供應商」
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("request timed out after {after:?}")]
    Timeout { after: std::time::Duration },

    #[error("unexpected HTTP status {status}")]
    Http { status: u16 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("could not parse response: {0}")]
    Parse(String),

    #[error("unexpected page structure: {0}")]
    ScrapeStructure(String),

    #[error("no coordinates: {0}")]
    NoResult(String),

    #[error("upstream throttled the request")]
    Throttled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ProviderError::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
