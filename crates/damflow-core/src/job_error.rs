//! Job execution errors
//!
//! Handlers return `anyhow::Error`; wrapping the cause in a [`JobError`] tells the queue
//! whether another attempt is worthwhile. Errors that are not a `JobError` are retried.

use std::fmt;

/// Failure of a single job attempt, classified for the retry policy.
#[derive(Debug)]
pub struct JobError {
    inner: anyhow::Error,
    retryable: bool,
}

impl JobError {
    /// An error that will not go away on retry, such as a malformed payload or a
    /// source file that no longer exists. The job fails immediately.
    pub fn fatal(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            retryable: false,
        }
    }

    /// A transient error, such as an external tool timing out or the database being
    /// unavailable. The job is retried with backoff while attempts remain.
    pub fn retryable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }

    /// Returns true when `err` is a [`JobError`] marked fatal.
    pub fn is_fatal(err: &anyhow::Error) -> bool {
        err.downcast_ref::<JobError>()
            .map(|e| !e.retryable)
            .unwrap_or(false)
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The rest of the chain is reachable through `source`.
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::retryable(err)
    }
}

/// Marks the error side of a result as fatal.
pub trait JobResultExt<T> {
    fn fatal(self) -> Result<T, JobError>;
}

impl<T, E: Into<anyhow::Error>> JobResultExt<T> for Result<T, E> {
    fn fatal(self) -> Result<T, JobError> {
        self.map_err(|e| JobError::fatal(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_detected_through_anyhow() {
        let err: anyhow::Error = JobError::fatal(anyhow::anyhow!("payload is not JSON")).into();
        assert!(JobError::is_fatal(&err));
        assert!(err.to_string().contains("payload is not JSON"));
    }

    #[test]
    fn test_retryable_and_plain_errors_are_not_fatal() {
        let err: anyhow::Error = JobError::retryable(anyhow::anyhow!("ffmpeg timed out")).into();
        assert!(!JobError::is_fatal(&err));

        let plain = anyhow::anyhow!("connection reset");
        assert!(!JobError::is_fatal(&plain));
    }

    #[test]
    fn test_from_anyhow_defaults_to_retryable() {
        let err: JobError = anyhow::anyhow!("busy").into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_result_ext_marks_fatal() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "source missing",
        ));
        let err = result.fatal().unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("source missing"));
    }
}
