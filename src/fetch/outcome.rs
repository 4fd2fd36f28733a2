//! Fetch outcome types.
//!
//! Every fetch settles into one [`FetchOutcome`]. Conversion into a status or
//! an error happens in one place, at the orchestrator boundary.

use std::fmt;

use crate::error::AuthoringError;

use super::status::FetchStatus;

/// How an HTTP status code is treated by the fetch machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Ok,
    /// 202: resource exists but is still being prepared
    NotReady,
    NotFound,
    Denied,
    Error,
}

pub fn classify(status: u16) -> ResponseClass {
    match status {
        202 => ResponseClass::NotReady,
        200..=299 => ResponseClass::Ok,
        403 => ResponseClass::Denied,
        404 => ResponseClass::NotFound,
        _ => ResponseClass::Error,
    }
}

/// Why a fetch ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Every attempt answered 202
    NotReadyExhausted { attempts: u32 },
    /// Non-retryable HTTP status
    Status(u16),
    /// Network failure or timeout
    Transport(String),
    /// 2xx with a body that did not decode
    Decode(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReadyExhausted { attempts } => write!(f, "still not ready after {} attempts", attempts),
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Transport(msg) => write!(f, "transport: {}", msg),
            Self::Decode(msg) => write!(f, "decode: {}", msg),
        }
    }
}

/// Settled result of one fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Ready(T),
    NotFound,
    Denied,
    Failed(FailureReason),
}

impl<T> FetchOutcome<T> {
    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Ready(_) => FetchStatus::Successful,
            Self::NotFound => FetchStatus::NotFound,
            Self::Denied => FetchStatus::Denied,
            Self::Failed(_) => FetchStatus::Failed,
        }
    }

    /// Caller-facing errors: only 202 exhaustion fails loudly.
    pub fn boundary_error(&self, key: &str) -> Option<AuthoringError> {
        match self {
            Self::Failed(FailureReason::NotReadyExhausted { attempts }) => Some(AuthoringError::CourseNotReady {
                key: key.to_string(),
                attempts: *attempts,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(200), ResponseClass::Ok);
        assert_eq!(classify(204), ResponseClass::Ok);
        assert_eq!(classify(202), ResponseClass::NotReady);
        assert_eq!(classify(403), ResponseClass::Denied);
        assert_eq!(classify(404), ResponseClass::NotFound);
        assert_eq!(classify(401), ResponseClass::Error);
        assert_eq!(classify(500), ResponseClass::Error);
        assert_eq!(classify(503), ResponseClass::Error);
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(FetchOutcome::Ready(1).status(), FetchStatus::Successful);
        assert_eq!(FetchOutcome::<()>::NotFound.status(), FetchStatus::NotFound);
        assert_eq!(FetchOutcome::<()>::Denied.status(), FetchStatus::Denied);
        assert_eq!(
            FetchOutcome::<()>::Failed(FailureReason::Status(500)).status(),
            FetchStatus::Failed
        );
    }

    #[test]
    fn test_only_not_ready_exhaustion_is_boundary_error() {
        let exhausted = FetchOutcome::<()>::Failed(FailureReason::NotReadyExhausted { attempts: 3 });
        assert!(matches!(
            exhausted.boundary_error("c1"),
            Some(AuthoringError::CourseNotReady { attempts: 3, .. })
        ));

        assert!(FetchOutcome::<()>::NotFound.boundary_error("c1").is_none());
        assert!(FetchOutcome::<()>::Denied.boundary_error("c1").is_none());
        assert!(FetchOutcome::<()>::Failed(FailureReason::Status(500)).boundary_error("c1").is_none());
        assert!(
            FetchOutcome::<()>::Failed(FailureReason::Transport("reset".into()))
                .boundary_error("c1")
                .is_none()
        );
    }
}
