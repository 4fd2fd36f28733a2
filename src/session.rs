//! Authoring session - shared state for one application session
//!
//! AuthoringSession owns everything that would otherwise be process-wide:
//! the status board, the resource store, the flag cache, and the fetch
//! orchestrator. Construct one per session and pass it by reference.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::api::ApiUrls;
use crate::config::Config;
use crate::domain::AuthenticatedUser;
use crate::error::Result;
use crate::fetch::{FetchOrchestrator, FetchStatus, ResourceKind, RetryConfig, StatusBoard, StatusTransition};
use crate::flags::{FlagCache, FlagResolution};
use crate::store::{CourseEntry, ResourceStore};
use crate::transport::{HttpTransport, HttpTransportConfig, Transport};

pub struct AuthoringSession {
    /// Not-ready retry policy applied to course detail fetches
    pub retry: RetryConfig,
    statuses: Arc<StatusBoard>,
    store: Arc<ResourceStore>,
    flags: Arc<FlagCache>,
    orchestrator: Arc<FetchOrchestrator>,
}

impl AuthoringSession {
    /// Create a session talking HTTP to the configured servers
    pub fn new(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(HttpTransportConfig::with_timeout(Duration::from_millis(
            config.api.timeout_ms,
        )))?;

        Ok(Self::with_transport(
            Arc::new(transport),
            config.api.urls(),
            config.user.clone(),
            config.retry.clone(),
        ))
    }

    /// Create a session over any transport
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        urls: ApiUrls,
        user: AuthenticatedUser,
        retry: RetryConfig,
    ) -> Self {
        let statuses = Arc::new(StatusBoard::new());
        let store = Arc::new(ResourceStore::new());
        let flags = Arc::new(FlagCache::new(transport.clone(), urls.clone(), statuses.clone()));
        let orchestrator = Arc::new(FetchOrchestrator::new(
            transport,
            urls,
            user,
            statuses.clone(),
            store.clone(),
        ));

        Self {
            retry,
            statuses,
            store,
            flags,
            orchestrator,
        }
    }

    pub async fn fetch_course_detail(&self, course_id: &str) -> Result<FetchStatus> {
        self.orchestrator.fetch_course_detail(course_id, &self.retry).await
    }

    /// Same as `fetch_course_detail` with an explicit retry policy
    pub async fn fetch_course_detail_with(&self, course_id: &str, retry: &RetryConfig) -> Result<FetchStatus> {
        self.orchestrator.fetch_course_detail(course_id, retry).await
    }

    pub async fn fetch_course_apps(&self, course_id: &str) -> Result<FetchStatus> {
        self.orchestrator.fetch_course_apps(course_id).await
    }

    pub async fn update_course_app(&self, course_id: &str, app_id: &str, enabled: bool) -> Result<FetchStatus> {
        self.orchestrator.update_course_app(course_id, app_id, enabled).await
    }

    /// Synchronous flag lookup; kicks off loading in the background
    pub fn resolve_flags(&self, scope: Option<&str>) -> FlagResolution {
        self.flags.resolve_flags(scope)
    }

    /// Wait for a scope's flags to settle
    pub async fn load_flags(&self, scope: Option<&str>) -> FlagResolution {
        self.flags.load(scope).await
    }

    pub fn status(&self, kind: ResourceKind, key: &str) -> FetchStatus {
        self.statuses.get(kind, key)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.statuses.subscribe()
    }

    pub fn course(&self, course_id: &str) -> Option<Arc<CourseEntry>> {
        self.store.course(course_id)
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }
}

impl std::fmt::Debug for AuthoringSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthoringSession")
            .field("retry", &self.retry)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::WaffleFlag;
    use crate::transport::{MockReply, MockTransport};
    use serde_json::json;

    fn session(mock: &Arc<MockTransport>) -> AuthoringSession {
        AuthoringSession::with_transport(
            mock.clone(),
            ApiUrls::new("http://studio", "http://lms"),
            AuthenticatedUser::new("staff"),
            RetryConfig::new(3, 10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_are_isolated() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "http://lms/api/courses/v1/courses/c1",
            [MockReply::json(200, json!({"id": "c1", "name": "Test"}))],
        );

        let first = session(&mock);
        let second = session(&mock);
        first.fetch_course_detail("c1").await.unwrap();

        assert!(first.course("c1").is_some());
        assert!(second.course("c1").is_none());
        assert_eq!(second.status(ResourceKind::CourseDetail, "c1"), FetchStatus::Pending);
    }

    #[tokio::test]
    async fn test_flags_through_session() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            "http://studio/api/contentstore/v1/course_waffle_flags",
            [MockReply::json(200, json!({"enable_course_optimizer": true}))],
        );
        let session = session(&mock);

        let resolution = session.load_flags(None).await;

        assert!(resolution.is_enabled(WaffleFlag::EnableCourseOptimizer));
        assert_eq!(
            session.status(ResourceKind::WaffleFlags, "global"),
            FetchStatus::Successful
        );
    }

    #[test]
    fn test_new_from_default_config() {
        let session = AuthoringSession::new(&Config::default()).unwrap();
        assert_eq!(session.retry, RetryConfig::default());
    }
}
