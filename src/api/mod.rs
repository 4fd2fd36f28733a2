//! Endpoint URLs for the Studio and LMS REST APIs.

use serde::{Deserialize, Serialize};

const DEFAULT_STUDIO_BASE_URL: &str = "http://localhost:18010";
const DEFAULT_LMS_BASE_URL: &str = "http://localhost:18000";

/// Base URLs the core talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiUrls {
    pub studio_base_url: String,
    pub lms_base_url: String,
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self {
            studio_base_url: DEFAULT_STUDIO_BASE_URL.to_string(),
            lms_base_url: DEFAULT_LMS_BASE_URL.to_string(),
        }
    }
}

impl ApiUrls {
    pub fn new(studio_base_url: impl Into<String>, lms_base_url: impl Into<String>) -> Self {
        Self {
            studio_base_url: studio_base_url.into(),
            lms_base_url: lms_base_url.into(),
        }
    }

    fn studio(&self) -> &str {
        self.studio_base_url.trim_end_matches('/')
    }

    fn lms(&self) -> &str {
        self.lms_base_url.trim_end_matches('/')
    }

    /// Global flags when `course_id` is `None`, course-scoped otherwise.
    pub fn course_waffle_flags(&self, course_id: Option<&str>) -> String {
        match course_id {
            Some(id) => format!("{}/api/contentstore/v1/course_waffle_flags/{}", self.studio(), id),
            None => format!("{}/api/contentstore/v1/course_waffle_flags", self.studio()),
        }
    }

    /// Course detail; callers add the `username` query parameter.
    pub fn course_detail(&self, course_id: &str) -> String {
        format!("{}/api/courses/v1/courses/{}", self.lms(), course_id)
    }

    pub fn course_apps(&self, course_id: &str) -> String {
        format!("{}/api/course_apps/v1/apps/{}", self.studio(), course_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waffle_flag_urls() {
        let urls = ApiUrls::new("http://studio", "http://lms");
        assert_eq!(
            urls.course_waffle_flags(None),
            "http://studio/api/contentstore/v1/course_waffle_flags"
        );
        assert_eq!(
            urls.course_waffle_flags(Some("course-v1:edX+DemoX+2024")),
            "http://studio/api/contentstore/v1/course_waffle_flags/course-v1:edX+DemoX+2024"
        );
    }

    #[test]
    fn test_course_urls_trim_trailing_slash() {
        let urls = ApiUrls::new("http://studio/", "http://lms/");
        assert_eq!(urls.course_detail("c1"), "http://lms/api/courses/v1/courses/c1");
        assert_eq!(urls.course_apps("c1"), "http://studio/api/course_apps/v1/apps/c1");
    }

    #[test]
    fn test_defaults_point_at_local_devstack() {
        let urls = ApiUrls::default();
        assert_eq!(urls.studio_base_url, DEFAULT_STUDIO_BASE_URL);
        assert_eq!(urls.lms_base_url, DEFAULT_LMS_BASE_URL);
    }
}
