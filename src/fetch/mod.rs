//! Resource fetch state machine
//!
//! This module provides:
//! - FetchStatus slots and the transition stream (status)
//! - Not-ready retry policy with compounding backoff (retry)
//! - Tagged fetch outcomes and HTTP status classification (outcome)
//! - FetchOrchestrator, which ties them to the transport (orchestrator)

pub mod orchestrator;
pub mod outcome;
pub mod retry;
pub mod status;

pub use orchestrator::FetchOrchestrator;
pub use outcome::{FailureReason, FetchOutcome, ResponseClass, classify};
pub use retry::{RetryAttempt, RetryConfig, RetrySchedule, RetryTrigger};
pub use status::{FetchStatus, PageView, ResourceKind, StatusBoard, StatusTransition};
