use thiserror::Error;

/// Error category determining how a failure surfaces to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidArgument,
    ResourceConflict,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidArgument => "invalid_argument",
            ErrorCategory::ResourceConflict => "resource_conflict",
            ErrorCategory::Internal => "internal",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::InvalidArgument => 400,
            ErrorCategory::ResourceConflict => 409,
            ErrorCategory::Internal => 500,
        }
    }
}

pub const CODE_INTERNAL_PANIC: &str = "SYS_9000";
pub const CODE_INTERNAL_UNDEFINED: &str = "SYS_9001";

/// Service-level error with a stable, client-visible code.
///
/// Module-level failures (store errors, rollup mismatches, ...) are typed
/// `thiserror` enums; they get wrapped into a `ServiceError` at the service
/// boundary so every outward-facing failure carries a category, a stable
/// code, and a client-safe message.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub category: ErrorCategory,
    pub code: &'static str,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    pub fn invalid_argument(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::InvalidArgument,
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn resource_conflict(
        code: &'static str,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            category: ErrorCategory::ResourceConflict,
            code,
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn internal(
        code: &'static str,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            category: ErrorCategory::Internal,
            code,
            message: "internal server error".to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Error for a recovered panic; `detail` is the panic payload rendered as text.
    pub fn panic(detail: String) -> Self {
        Self {
            category: ErrorCategory::Internal,
            code: CODE_INTERNAL_PANIC,
            message: "internal server error".to_string(),
            cause: Some(detail.into()),
        }
    }

    /// Error for failures that escaped without a service-owned code.
    pub fn undefined(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::internal(CODE_INTERNAL_UNDEFINED, cause)
    }

    pub fn is_internal(&self) -> bool {
        self.category == ErrorCategory::Internal
    }

    pub fn http_status(&self) -> u16 {
        self.category.http_status()
    }
}

/// Renders a caught panic payload as text for logging and error causes.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
