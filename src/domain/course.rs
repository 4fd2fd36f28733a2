//! Course detail as returned by the LMS courses API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::user::AuthenticatedUser;

/// Course detail record.
///
/// Only the fields the authoring core reasons about are typed; everything
/// else the LMS returns is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDetail {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub pacing: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CourseDetail {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            start: None,
            end: None,
            org: None,
            number: None,
            short_description: None,
            pacing: None,
            extra: Map::new(),
        }
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start.is_some_and(|start| start <= now)
    }

    /// Discussion providers can only be switched before the course starts,
    /// unless the user is a global administrator.
    pub fn can_change_providers(&self, user: &AuthenticatedUser, now: DateTime<Utc>) -> bool {
        user.administrator || self.start.is_some_and(|start| start > now)
    }
}
