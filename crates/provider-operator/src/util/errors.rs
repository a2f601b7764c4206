use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

/// The six-member error taxonomy from the error handling design: each
/// variant maps to exactly one condition reason surfaced on the provider's
/// status.
#[derive(Error, Debug)]
pub enum StdError {
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("DependencyError: {0}")]
    Dependency(String),

    #[error("ComponentsFetchError: {0}")]
    Fetch(String),

    #[error("RenderError: {0}")]
    Render(String),

    #[error("ApplyError: {0}")]
    Apply(String),

    #[error("NoDeploymentAvailableConditionReason: {0}")]
    Availability(String),

    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("YamlError: {0}")]
    YamlError(#[source] serde_yaml::Error),

    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Finalizer Error: {0}")]
    // NB: awkward type because finalizer::Error embeds the reconciler error (which is this)
    // so boxing this error to break cycles
    FinalizerError(#[source] Box<kube::runtime::finalizer::Error<Error>>),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("OciError: {0}")]
    OciError(String),

    #[error("IllegalDocument")]
    IllegalDocument,
}

impl StdError {
    pub fn metric_label(&self) -> String {
        format!("{self:?}").to_lowercase()
    }

    /// Whether this error class is retryable per the error handling design:
    /// fetch/dependency/apply-conflict are retried with backoff; validation
    /// and render errors are recorded on conditions and left alone until
    /// `spec.generation` changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StdError::Dependency(_)
                | StdError::Fetch(_)
                | StdError::HttpError(_)
                | StdError::OciError(_)
                | StdError::Availability(_)
                | StdError::KubeError(_)
        )
    }
}

#[derive(Error, Debug)]
pub struct ErrorWithRequeue {
    pub duration: Duration,
    pub error: StdError,
}

impl ErrorWithRequeue {
    pub fn new(error: StdError, duration: Duration) -> ErrorWithRequeue {
        ErrorWithRequeue { error, duration }
    }

    pub fn metric_label(&self) -> String {
        self.error.metric_label()
    }
}

impl fmt::Display for ErrorWithRequeue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error("Error With Requeue: {0}")]
    ErrorWithRequeue(#[source] ErrorWithRequeue),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::ErrorWithRequeue(e) => e.metric_label(),
        }
    }

    pub fn requeue(error: StdError, duration: Duration) -> Error {
        Error::ErrorWithRequeue(ErrorWithRequeue::new(error, duration))
    }
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::StdError(StdError::KubeError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StdError(StdError::JsonSerializationError(e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::StdError(StdError::YamlError(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff schedule used by retryable phase failures: initial
/// 500ms, factor 1.5, capped at roughly 20 attempts.
pub fn backoff_duration(attempt: u32) -> Duration {
    const INITIAL_MS: f64 = 500.0;
    const FACTOR: f64 = 1.5;
    const MAX_ATTEMPTS: u32 = 20;
    const CAP_MS: f64 = 300_000.0;

    let attempt = attempt.min(MAX_ATTEMPTS);
    let ms = INITIAL_MS * FACTOR.powi(attempt as i32);
    Duration::from_millis(ms.min(CAP_MS) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let d0 = backoff_duration(0);
        let d1 = backoff_duration(1);
        assert!(d1 > d0);
        let d_far = backoff_duration(1000);
        assert_eq!(d_far, backoff_duration(20));
    }

    #[test]
    fn retryable_classification() {
        assert!(StdError::Fetch("x".into()).is_retryable());
        assert!(!StdError::Validation("x".into()).is_retryable());
        assert!(!StdError::Render("x".into()).is_retryable());
    }
}
