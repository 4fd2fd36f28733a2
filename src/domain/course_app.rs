//! Course apps: configurable course features (discussions, proctoring, teams, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::HasId;

/// What the current user may do with an app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowedOperations {
    pub enable: bool,
    pub configure: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseApp {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub allowed_operations: AllowedOperations,
    #[serde(default)]
    pub legacy_link: Option<String>,
    #[serde(default)]
    pub documentation_links: Value,
}

impl CourseApp {
    pub fn new(id: impl Into<String>, enabled: bool) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            enabled,
            allowed_operations: AllowedOperations::default(),
            legacy_link: None,
            documentation_links: Value::Null,
        }
    }

    pub fn can_toggle(&self) -> bool {
        self.allowed_operations.enable
    }
}

impl HasId for CourseApp {
    fn id(&self) -> &str {
        &self.id
    }
}
