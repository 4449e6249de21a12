use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Service operation failures
    RegistrationFailure,
    UnregistrationFailure,
    FetchActionsFailure,

    // SDK lifecycle errors
    SdkNotInitialized,
    SdkAlreadyInitialized,

    // Configuration errors
    ConfigMissingRequired,
    ConfigInvalidUrl,
    ConfigInvalidCacheTtl,
    ConfigInvalidTimeout,

    // Cache errors
    CacheReadError,
    CacheWriteError,
    CacheInvalidData,
    CacheStorageError,

    // Transport setup
    HttpClientError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RegistrationFailure => "REGISTRATION_FAILURE",
            ErrorCode::UnregistrationFailure => "UNREGISTRATION_FAILURE",
            ErrorCode::FetchActionsFailure => "FETCH_ACTIONS_FAILURE",
            ErrorCode::SdkNotInitialized => "SDK_NOT_INITIALIZED",
            ErrorCode::SdkAlreadyInitialized => "SDK_ALREADY_INITIALIZED",
            ErrorCode::ConfigMissingRequired => "CONFIG_MISSING_REQUIRED",
            ErrorCode::ConfigInvalidUrl => "CONFIG_INVALID_URL",
            ErrorCode::ConfigInvalidCacheTtl => "CONFIG_INVALID_CACHE_TTL",
            ErrorCode::ConfigInvalidTimeout => "CONFIG_INVALID_TIMEOUT",
            ErrorCode::CacheReadError => "CACHE_READ_ERROR",
            ErrorCode::CacheWriteError => "CACHE_WRITE_ERROR",
            ErrorCode::CacheInvalidData => "CACHE_INVALID_DATA",
            ErrorCode::CacheStorageError => "CACHE_STORAGE_ERROR",
            ErrorCode::HttpClientError => "HTTP_CLIENT_ERROR",
        }
    }

    /// Whether the failure came back from (or on the way to) the service.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            ErrorCode::RegistrationFailure
                | ErrorCode::UnregistrationFailure
                | ErrorCode::FetchActionsFailure
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure surfaced by every fallible SDK operation.
///
/// For service failures `message` carries the raw response text, or the
/// transport error description when no response arrived.
#[derive(Error, Debug)]
#[error("[{code}] {message}")]
pub struct AppLaunchError {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppLaunchError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn registration_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RegistrationFailure, message)
    }

    pub fn unregistration_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnregistrationFailure, message)
    }

    pub fn fetch_actions_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchActionsFailure, message)
    }

    pub fn not_initialized() -> Self {
        Self::new(
            ErrorCode::SdkNotInitialized,
            "AppLaunch SDK is not initialized. Call initialize() first.",
        )
    }

    pub fn already_initialized() -> Self {
        Self::new(ErrorCode::SdkAlreadyInitialized, "AppLaunch SDK already initialized.")
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ConfigMissingRequired
                | ErrorCode::ConfigInvalidUrl
                | ErrorCode::ConfigInvalidCacheTtl
                | ErrorCode::ConfigInvalidTimeout
        )
    }

    pub fn is_cache_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::CacheReadError
                | ErrorCode::CacheWriteError
                | ErrorCode::CacheInvalidData
                | ErrorCode::CacheStorageError
        )
    }
}

pub type Result<T> = std::result::Result<T, AppLaunchError>;
