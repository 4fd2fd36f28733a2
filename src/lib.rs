//! Authoring - course-authoring resource fetch core
//!
//! Fetches course detail, course apps, and waffle flags from the Studio and
//! LMS APIs. Every fetch drives a per-resource status slot; course detail
//! fetches retry while the server reports the course as not ready yet.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod flags;
pub mod session;
pub mod store;
pub mod transport;

pub use error::{AuthoringError, Result};
pub use session::AuthoringSession;
