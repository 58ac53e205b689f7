//! Typed error types for the session core and the yt-dlp bridge.
//!
//! Every error carries a stable [`ErrorCode`] so status records and log
//! entries can be classified without probing message text:
//! - `E_VAL_*`: Validation errors (user can fix input)
//! - `E_IO_*`: File system errors
//! - `E_DL_*`: Download and backend call errors (may be retryable)
//! - `E_NET_*`: Network errors (often retryable)
//! - `E_CFG_*`: Configuration errors
//! - `E_INT_*`: Internal errors (should be reported)

use serde::Serialize;
use thiserror::Error;

/// Stable identifiers that don't change with message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (E_VAL_*)
    EValInvalidUrl,
    EValInvalidSettings,
    EValInvalidPath,
    EValInvalidFormat,

    // IO errors (E_IO_*)
    EIoFailed,
    EIoNotFound,
    EIoPermissionDenied,

    // Download errors (E_DL_*)
    EDlSpawnFailed,
    EDlProcessFailed,
    EDlNotFound,
    EDlOutputUnavailable,

    // Network errors (E_NET_*)
    ENetConnectionFailed,

    // Configuration errors (E_CFG_*)
    ECfgNotConfigured,

    // Internal errors (E_INT_*)
    EInternal,
    EIntSerializeFailed,
}

impl ErrorCode {
    /// Returns whether this error is typically retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ENetConnectionFailed | Self::EDlProcessFailed | Self::EDlOutputUnavailable)
    }

    /// Returns the error code as a string (e.g., "E_VAL_INVALID_URL").
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EValInvalidUrl => "E_VAL_INVALID_URL",
            Self::EValInvalidSettings => "E_VAL_INVALID_SETTINGS",
            Self::EValInvalidPath => "E_VAL_INVALID_PATH",
            Self::EValInvalidFormat => "E_VAL_INVALID_FORMAT",
            Self::EIoFailed => "E_IO_FAILED",
            Self::EIoNotFound => "E_IO_NOT_FOUND",
            Self::EIoPermissionDenied => "E_IO_PERMISSION_DENIED",
            Self::EDlSpawnFailed => "E_DL_SPAWN_FAILED",
            Self::EDlProcessFailed => "E_DL_PROCESS_FAILED",
            Self::EDlNotFound => "E_DL_NOT_FOUND",
            Self::EDlOutputUnavailable => "E_DL_OUTPUT_UNAVAILABLE",
            Self::ENetConnectionFailed => "E_NET_CONNECTION_FAILED",
            Self::ECfgNotConfigured => "E_CFG_NOT_CONFIGURED",
            Self::EInternal => "E_INTERNAL",
            Self::EIntSerializeFailed => "E_INT_SERIALIZE_FAILED",
        }
    }
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValidationKind {
    InvalidUrl,
    InvalidSettings,
    InvalidPath,
    InvalidFormat,
}

/// Which stage of a backend call failed. Use this to classify backend
/// failures in a stable, machine-readable way instead of probing message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BackendErrorKind {
    Spawn,
    Process,
    UnknownDownload,
    EmptyOutput,
}

/// Unified error type for the session and the download bridge.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("validation error ({kind:?}): {message}")]
    Validation { kind: ValidationKind, message: String },

    #[error("io error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Backend { kind: BackendErrorKind, message: String },

    #[error("download location is not configured: {message}")]
    NotConfigured { message: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("serialization error in {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DownloaderError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { kind, .. } => match kind {
                ValidationKind::InvalidUrl => ErrorCode::EValInvalidUrl,
                ValidationKind::InvalidSettings => ErrorCode::EValInvalidSettings,
                ValidationKind::InvalidPath => ErrorCode::EValInvalidPath,
                ValidationKind::InvalidFormat => ErrorCode::EValInvalidFormat,
            },
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::EIoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::EIoPermissionDenied,
                _ => ErrorCode::EIoFailed,
            },
            Self::Backend { kind, .. } => match kind {
                BackendErrorKind::Spawn => ErrorCode::EDlSpawnFailed,
                BackendErrorKind::Process => ErrorCode::EDlProcessFailed,
                BackendErrorKind::UnknownDownload => ErrorCode::EDlNotFound,
                BackendErrorKind::EmptyOutput => ErrorCode::EDlOutputUnavailable,
            },
            Self::NotConfigured { .. } => ErrorCode::ECfgNotConfigured,
            Self::Network { .. } => ErrorCode::ENetConnectionFailed,
            Self::Serialization { .. } => ErrorCode::EIntSerializeFailed,
            Self::Internal { .. } => ErrorCode::EInternal,
        }
    }
}

// Convenience constructors
impl DownloaderError {
    /// Create a URL validation error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidUrl,
            message: message.into(),
        }
    }

    /// Create a settings validation error.
    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidSettings,
            message: message.into(),
        }
    }

    /// Create a path validation error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidPath,
            message: message.into(),
        }
    }

    /// Create a format selection error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::Validation {
            kind: ValidationKind::InvalidFormat,
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// yt-dlp could not be started.
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Backend {
            kind: BackendErrorKind::Spawn,
            message: message.into(),
        }
    }

    /// yt-dlp ran and reported failure.
    pub fn process(message: impl Into<String>) -> Self {
        Self::Backend {
            kind: BackendErrorKind::Process,
            message: message.into(),
        }
    }

    /// No running download has the given id.
    pub fn unknown_download(download_id: impl std::fmt::Display) -> Self {
        Self::Backend {
            kind: BackendErrorKind::UnknownDownload,
            message: format!("No active download with id {download_id}"),
        }
    }

    /// yt-dlp succeeded but produced nothing usable.
    pub fn empty_output(message: impl Into<String>) -> Self {
        Self::Backend {
            kind: BackendErrorKind::EmptyOutput,
            message: message.into(),
        }
    }

    /// Settings are missing or carry no download location.
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured { message: message.into() }
    }

    /// Create a network error.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error with context.
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}
