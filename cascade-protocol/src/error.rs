//! Error types for the cascade protocol.
//!
//! Follows `layer0::error`'s shape: one `#[non_exhaustive]`,
//! `thiserror`-derived enum per concern, each with a catch-all
//! `Other(#[from] Box<dyn Error + Send + Sync>)` arm. [`ErrorKind`] is
//! the closed, spec-mandated vocabulary (§7) every concern-local error
//! maps into at the envelope boundary; it is the only enum in this
//! crate that is *not* `#[non_exhaustive]` — it is a fixed wire
//! contract, not an extension point.

use thiserror::Error;

/// The closed set of machine-readable error kinds from spec §7, each
/// carrying its HTTP status code as associated data via [`ErrorKind::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input failed structural validation.
    ValidationError,
    /// Request body was not valid JSON.
    InvalidJson,
    /// A required field was missing.
    MissingRequired,
    /// A function id violated the id grammar.
    InvalidFunctionId,
    /// A version string was malformed.
    InvalidVersion,
    /// An unsupported source language was specified.
    InvalidLanguage,
    /// A parameter value was out of range or otherwise invalid.
    InvalidParameter,
    /// No valid credentials were presented.
    Unauthorized,
    /// The principal lacks the scope required for this operation.
    Forbidden,
    /// The referenced resource does not exist.
    NotFound,
    /// The referenced function does not exist.
    FunctionNotFound,
    /// The HTTP method is not supported for this route.
    MethodNotAllowed,
    /// A tier or the cascade exceeded its time budget.
    Timeout,
    /// The request conflicts with existing state.
    Conflict,
    /// The request body exceeded the maximum size.
    PayloadTooLarge,
    /// Every reachable tier failed or was skipped.
    CascadeExhausted,
    /// Code failed to compile/prepare for execution.
    CompilationError,
    /// A tier handler raised an error during execution.
    ExecutionError,
    /// An unexpected internal error occurred.
    InternalError,
    /// The requested operation is not implemented.
    NotImplemented,
    /// A downstream collaborator is unavailable.
    ServiceUnavailable,
}

impl ErrorKind {
    /// The HTTP status code this kind maps to, per spec §7.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::ValidationError
            | ErrorKind::InvalidJson
            | ErrorKind::MissingRequired
            | ErrorKind::InvalidFunctionId
            | ErrorKind::InvalidVersion
            | ErrorKind::InvalidLanguage
            | ErrorKind::InvalidParameter
            | ErrorKind::CompilationError => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound | ErrorKind::FunctionNotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Timeout => 408,
            ErrorKind::Conflict => 409,
            ErrorKind::PayloadTooLarge => 413,
            ErrorKind::CascadeExhausted => 422,
            ErrorKind::ExecutionError | ErrorKind::InternalError => 500,
            ErrorKind::NotImplemented => 501,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// The wire-format machine-readable code, e.g. `"CASCADE_EXHAUSTED"`.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::InvalidJson => "INVALID_JSON",
            ErrorKind::MissingRequired => "MISSING_REQUIRED",
            ErrorKind::InvalidFunctionId => "INVALID_FUNCTION_ID",
            ErrorKind::InvalidVersion => "INVALID_VERSION",
            ErrorKind::InvalidLanguage => "INVALID_LANGUAGE",
            ErrorKind::InvalidParameter => "INVALID_PARAMETER",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FunctionNotFound => "FUNCTION_NOT_FOUND",
            ErrorKind::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorKind::CascadeExhausted => "CASCADE_EXHAUSTED",
            ErrorKind::CompilationError => "COMPILATION_ERROR",
            ErrorKind::ExecutionError => "EXECUTION_ERROR",
            ErrorKind::InternalError => "INTERNAL_ERROR",
            ErrorKind::NotImplemented => "NOT_IMPLEMENTED",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Protocol-layer errors: id/duration/version grammar violations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A function id violated the grammar in spec §3.
    #[error("invalid function id: {0}")]
    InvalidFunctionId(String),

    /// A duration literal used an unknown unit or malformed integer.
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// A semantic version string was malformed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProtocolError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidFunctionId(_) => ErrorKind::InvalidFunctionId,
            ProtocolError::InvalidDuration(_) => ErrorKind::ValidationError,
            ProtocolError::InvalidVersion(_) => ErrorKind::InvalidVersion,
            ProtocolError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Code/metadata store errors (component B).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// No metadata/code exists for the requested (id, version, derivative).
    #[error("not found: {0}")]
    NotFound(String),

    /// The function id or version string was malformed.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ProtocolError),

    /// A chunked object is missing one or more chunks.
    #[error("incomplete chunked object: {0}")]
    IncompleteChunks(String),

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidIdentifier(_) => ErrorKind::InvalidFunctionId,
            StoreError::IncompleteChunks(_) | StoreError::Compression(_) => {
                ErrorKind::InternalError
            }
            StoreError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Log aggregator errors (component C).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LogError {
    /// `functionId` was empty or `level` was not a recognized value.
    #[error("invalid log entry: {0}")]
    InvalidEntry(String),

    /// An opaque query cursor could not be decoded.
    #[error("invalid cursor")]
    InvalidCursor,

    /// A structured-query condition referenced an unsupported operator
    /// or mismatched operand types.
    #[error("invalid query condition: {0}")]
    InvalidCondition(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl LogError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LogError::InvalidEntry(_) => ErrorKind::ValidationError,
            LogError::InvalidCursor => ErrorKind::ValidationError,
            LogError::InvalidCondition(_) => ErrorKind::InvalidParameter,
            LogError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Rate limiter errors (component D).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The underlying counter storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RateLimitError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RateLimitError::Storage(_) => ErrorKind::ServiceUnavailable,
            RateLimitError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Function classifier errors (component E).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model backend used for classification was unavailable.
    #[error("classifier backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ClassifierError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifierError::BackendUnavailable(_) => ErrorKind::ServiceUnavailable,
            ClassifierError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Tier dispatcher errors (component F).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The function has no code artifact for a code-tier dispatch.
    #[error("missing code artifact for function {0}")]
    MissingCode(String),

    /// The tier handler raised a non-2xx result.
    #[error("tier execution failed: {0}")]
    ExecutionFailed(String),

    /// The tier handler did not respond within its deadline.
    #[error("tier timed out")]
    Timeout,

    /// No handler is installed for the requested tier.
    #[error("no handler installed for tier {0}")]
    NoHandler(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::MissingCode(_) => ErrorKind::CompilationError,
            DispatchError::ExecutionFailed(_) => ErrorKind::ExecutionError,
            DispatchError::Timeout => ErrorKind::Timeout,
            DispatchError::NoHandler(_) => ErrorKind::NotImplemented,
            DispatchError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Authorization guard errors (component H).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AuthError {
    /// The principal's scope set does not grant the required scope.
    #[error("forbidden: tier {tier} requires scope {required_scope}")]
    Forbidden {
        /// The tier that was denied.
        tier: String,
        /// The scope that would have granted access.
        required_scope: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Forbidden { .. } => ErrorKind::Forbidden,
            AuthError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Input validator errors (component I). The validator itself never
/// fails with an exception — invalid input is reported via
/// `ValidationResult`. This enum exists only for malformed schemas.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The function's declared input schema was itself malformed.
    #[error("malformed schema: {0}")]
    MalformedSchema(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ValidationError {
    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MalformedSchema(_) => ErrorKind::ValidationError,
            ValidationError::Other(_) => ErrorKind::InternalError,
        }
    }
}

/// Cascade executor errors (component G). Authorization failures are
/// the only cascade-terminating error per spec §4.G/§7 — everything
/// else escalates to the next tier instead of propagating.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Every reachable tier failed, timed out, or was skipped.
    ///
    /// Carries the full attempt history so the 422 body can attach it
    /// verbatim, per spec §7 ("exhaustion packages the full attempt
    /// history and attaches it to the 422 body").
    #[error("cascade exhausted after {} tier(s)", history.len())]
    Exhausted {
        /// Every attempt made before exhaustion, in start-time order.
        history: Vec<crate::tier::TierAttempt>,
    },

    /// An escalation boundary denied the principal's scope.
    #[error("authorization denied: {0}")]
    Authorization(#[from] AuthError),

    /// No tier was reachable given `startTier`/`skipTiers`.
    #[error("no tiers available")]
    NoTiersAvailable,

    /// The cascade was cancelled before completion.
    #[error("cascade cancelled")]
    Cancelled,

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl CascadeError {
    /// Number of tiers attempted before the cascade gave up, when known.
    pub fn tiers_attempted(&self) -> Option<usize> {
        match self {
            CascadeError::Exhausted { history } => Some(history.len()),
            _ => None,
        }
    }

    /// Map to the closed error-kind vocabulary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CascadeError::Exhausted { .. } => ErrorKind::CascadeExhausted,
            CascadeError::Authorization(e) => e.kind(),
            CascadeError::NoTiersAvailable => ErrorKind::CascadeExhausted,
            CascadeError::Cancelled => ErrorKind::Timeout,
            CascadeError::Other(_) => ErrorKind::InternalError,
        }
    }
}
