//! Client-side cache of fetched server resources.
//!
//! One `ResourceStore` lives per session. The fetch orchestrator is the only
//! writer.

mod keyed;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{CourseApp, CourseDetail};

pub use keyed::{HasId, KeyedStore};

/// A fetched course plus what was derived from it at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseEntry {
    pub course: CourseDetail,
    pub can_change_providers: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ResourceStore {
    courses: KeyedStore<CourseEntry>,
    course_apps: KeyedStore<Vec<CourseApp>>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn course(&self, course_id: &str) -> Option<Arc<CourseEntry>> {
        self.courses.get(course_id)
    }

    pub fn can_change_providers(&self, course_id: &str) -> bool {
        self.courses
            .get(course_id)
            .is_some_and(|entry| entry.can_change_providers)
    }

    pub fn put_course(&self, course_id: &str, entry: CourseEntry) {
        self.courses.put(course_id, entry);
    }

    pub fn course_ids(&self) -> Vec<String> {
        self.courses.keys()
    }

    pub fn course_apps(&self, course_id: &str) -> Option<Arc<Vec<CourseApp>>> {
        self.course_apps.get(course_id)
    }

    pub fn course_app(&self, course_id: &str, app_id: &str) -> Option<CourseApp> {
        self.course_apps.find_record(course_id, app_id)
    }

    pub fn put_course_apps(&self, course_id: &str, apps: Vec<CourseApp>) {
        self.course_apps.put(course_id, apps);
    }

    pub fn replace_course_app(&self, course_id: &str, app: CourseApp) -> bool {
        self.course_apps.replace_record(course_id, app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, can_change: bool) -> CourseEntry {
        CourseEntry {
            course: CourseDetail::new(id, "Test"),
            can_change_providers: can_change,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_course_round_trip() {
        let store = ResourceStore::new();
        assert!(store.course("c1").is_none());
        assert!(!store.can_change_providers("c1"));

        store.put_course("c1", entry("c1", true));

        assert_eq!(store.course("c1").unwrap().course.name, "Test");
        assert!(store.can_change_providers("c1"));
        assert_eq!(store.course_ids(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_course_apps_replace() {
        let store = ResourceStore::new();
        store.put_course_apps("c1", vec![CourseApp::new("teams", false), CourseApp::new("wiki", true)]);

        assert!(store.replace_course_app("c1", CourseApp::new("teams", true)));

        assert!(store.course_app("c1", "teams").unwrap().enabled);
        assert!(store.course_app("c1", "wiki").unwrap().enabled);
        assert_eq!(store.course_apps("c1").unwrap().len(), 2);
    }
}
