//! Read-through waffle-flag cache.
//!
//! Callers always get a complete flag set synchronously. While a scope is
//! loading they get the best stand-in available: the scope's own set, then
//! the global set, then the static defaults.
//!
//! Loaded sets are kept for the whole session. A failed load leaves no set
//! behind; the scope reads as defaults with `is_error` until a later `load`
//! succeeds.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::api::ApiUrls;
use crate::fetch::{FetchStatus, ResourceKind, ResponseClass, StatusBoard, classify};
use crate::transport::Transport;

use super::{WaffleFlag, WaffleFlagSet};

/// Status-board key for the global scope.
pub const GLOBAL_SCOPE_KEY: &str = "global";

type Scope = Option<String>;
type PendingLoad = Shared<BoxFuture<'static, ()>>;

enum ScopeState {
    Loading(PendingLoad),
    Loaded(Arc<WaffleFlagSet>),
    Failed(String),
}

/// What a caller sees for one scope right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagResolution {
    pub flags: WaffleFlagSet,
    pub is_loading: bool,
    pub is_error: bool,
}

impl FlagResolution {
    pub fn is_enabled(&self, flag: WaffleFlag) -> bool {
        self.flags.get(flag)
    }
}

pub struct FlagCache {
    transport: Arc<dyn Transport>,
    urls: ApiUrls,
    statuses: Arc<StatusBoard>,
    scopes: RwLock<HashMap<Scope, ScopeState>>,
}

impl FlagCache {
    pub fn new(transport: Arc<dyn Transport>, urls: ApiUrls, statuses: Arc<StatusBoard>) -> Self {
        Self {
            transport,
            urls,
            statuses,
            scopes: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve flags for `scope` and make sure a load is under way.
    ///
    /// A course scope also requests the global scope, which is its stand-in
    /// while loading. Outside a Tokio runtime nothing is scheduled and the
    /// cached view is returned as is.
    pub fn resolve_flags(self: &Arc<Self>, scope: Option<&str>) -> FlagResolution {
        let scope = normalize_scope(scope);
        if tokio::runtime::Handle::try_current().is_err() {
            log::debug!("No runtime; resolving flags for {} from cache only", status_key(scope));
            return self.resolve(scope);
        }

        if scope.is_some() {
            self.request(None, false);
        }
        self.request(scope, false);
        self.resolve(scope)
    }

    /// Resolve from whatever is cached; never triggers a load.
    pub fn resolve(&self, scope: Option<&str>) -> FlagResolution {
        let scope = normalize_scope(scope);
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        let key: Scope = scope.map(str::to_string);

        match scopes.get(&key) {
            Some(ScopeState::Loaded(set)) => FlagResolution {
                flags: set.as_ref().clone(),
                is_loading: false,
                is_error: false,
            },
            Some(ScopeState::Failed(_)) => FlagResolution {
                flags: WaffleFlagSet::defaults(scope),
                is_loading: false,
                is_error: true,
            },
            own => {
                let is_loading = matches!(own, Some(ScopeState::Loading(_)));
                let global = match (scope, scopes.get(&None)) {
                    (Some(_), Some(ScopeState::Loaded(global))) => Some(global.with_id(scope)),
                    _ => None,
                };
                FlagResolution {
                    flags: global.unwrap_or_else(|| WaffleFlagSet::defaults(scope)),
                    is_loading,
                    is_error: false,
                }
            }
        }
    }

    /// Load `scope` (joining any load in flight) and resolve once it settles.
    ///
    /// A scope whose previous load failed is fetched again.
    pub async fn load(self: &Arc<Self>, scope: Option<&str>) -> FlagResolution {
        let scope = normalize_scope(scope);
        if let Some(pending) = self.request(scope, true) {
            pending.await;
        }
        self.resolve(scope)
    }

    pub fn is_cached(&self, scope: Option<&str>) -> bool {
        let scope = normalize_scope(scope);
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        matches!(
            scopes.get(&scope.map(str::to_string)),
            Some(ScopeState::Loaded(_))
        )
    }

    /// Start a load for `scope` unless one is cached or in flight.
    ///
    /// Returns the pending load to await, if any.
    fn request(self: &Arc<Self>, scope: Option<&str>, retry_failed: bool) -> Option<PendingLoad> {
        let key: Scope = scope.map(str::to_string);
        let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);

        match scopes.get(&key) {
            Some(ScopeState::Loaded(_)) => return None,
            Some(ScopeState::Loading(pending)) => return Some(pending.clone()),
            Some(ScopeState::Failed(_)) if !retry_failed => return None,
            Some(ScopeState::Failed(_)) | None => {}
        }

        self.statuses
            .set(ResourceKind::WaffleFlags, status_key(scope), FetchStatus::InProgress);

        let this = Arc::clone(self);
        let load_key = key.clone();
        let pending = async move { this.fetch_scope(load_key).await }.boxed().shared();
        scopes.insert(key, ScopeState::Loading(pending.clone()));
        tokio::spawn(pending.clone());
        Some(pending)
    }

    async fn fetch_scope(&self, scope: Scope) {
        let url = self.urls.course_waffle_flags(scope.as_deref());

        let state = match self.transport.get(&url, &[]).await {
            Ok(response) => match classify(response.status) {
                ResponseClass::Ok => match WaffleFlagSet::from_server(scope.as_deref(), &response.body) {
                    Ok(set) => ScopeState::Loaded(Arc::new(set)),
                    Err(e) => ScopeState::Failed(e),
                },
                _ => ScopeState::Failed(format!("HTTP {}", response.status)),
            },
            Err(e) => ScopeState::Failed(e.to_string()),
        };

        let status = match &state {
            ScopeState::Loaded(_) => FetchStatus::Successful,
            _ => FetchStatus::Failed,
        };
        if let ScopeState::Failed(reason) = &state {
            log::warn!("Waffle flags for {} failed to load: {}", status_key(scope.as_deref()), reason);
        } else {
            log::info!("Loaded waffle flags for {}", status_key(scope.as_deref()));
        }

        let mut scopes = self.scopes.write().unwrap_or_else(PoisonError::into_inner);
        self.statuses
            .set(ResourceKind::WaffleFlags, status_key(scope.as_deref()), status);
        scopes.insert(scope, state);
    }
}

impl std::fmt::Debug for FlagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes = self.scopes.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("FlagCache")
            .field("urls", &self.urls)
            .field("scopes", &scopes.len())
            .finish()
    }
}

fn status_key(scope: Option<&str>) -> &str {
    scope.unwrap_or(GLOBAL_SCOPE_KEY)
}

/// A blank course id names the global scope.
fn normalize_scope(scope: Option<&str>) -> Option<&str> {
    scope.filter(|id| !id.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockReply, MockTransport};
    use serde_json::json;
    use tokio::sync::Notify;

    const GLOBAL_URL: &str = "http://studio/api/contentstore/v1/course_waffle_flags";
    const COURSE_URL: &str = "http://studio/api/contentstore/v1/course_waffle_flags/c1";

    fn cache(mock: &Arc<MockTransport>) -> Arc<FlagCache> {
        Arc::new(FlagCache::new(
            mock.clone(),
            ApiUrls::new("http://studio", "http://lms"),
            Arc::new(StatusBoard::new()),
        ))
    }

    #[tokio::test]
    async fn test_defaults_before_any_fetch_settles() {
        let mock = Arc::new(MockTransport::new());
        let gate = Arc::new(Notify::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({})).gated(gate.clone())]);
        mock.on(COURSE_URL, [MockReply::json(200, json!({})).gated(gate.clone())]);
        let cache = cache(&mock);

        for scope in [None, Some("c1")] {
            let resolution = cache.resolve_flags(scope);
            assert_eq!(resolution.flags, WaffleFlagSet::defaults(scope));
            assert!(resolution.is_loading);
            assert!(!resolution.is_error);
        }
    }

    #[tokio::test]
    async fn test_course_scope_inherits_global_while_pending() {
        let mock = Arc::new(MockTransport::new());
        let gate = Arc::new(Notify::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({"use_new_home_page": false}))]);
        mock.on(COURSE_URL, [MockReply::json(200, json!({})).gated(gate.clone())]);
        let cache = cache(&mock);

        cache.load(None).await;
        let resolution = cache.resolve_flags(Some("c1"));

        assert!(!resolution.is_enabled(WaffleFlag::UseNewHomePage));
        assert_eq!(resolution.flags.id.as_deref(), Some("c1"));
        assert!(resolution.is_loading);
    }

    #[tokio::test]
    async fn test_scoped_set_wins_once_loaded() {
        let mock = Arc::new(MockTransport::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({"use_new_home_page": false}))]);
        mock.on(
            COURSE_URL,
            [MockReply::json(200, json!({"course_id": "c1", "use_new_home_page": true, "use_new_unit_page": true}))],
        );
        let cache = cache(&mock);

        cache.load(None).await;
        let resolution = cache.load(Some("c1")).await;

        assert!(resolution.is_enabled(WaffleFlag::UseNewHomePage));
        assert!(resolution.is_enabled(WaffleFlag::UseNewUnitPage));
        assert!(!resolution.is_loading);
        assert!(cache.is_cached(Some("c1")));
    }

    #[tokio::test]
    async fn test_error_falls_back_to_defaults_not_global() {
        let mock = Arc::new(MockTransport::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({"use_new_home_page": false}))]);
        mock.on(COURSE_URL, [MockReply::status(500)]);
        let cache = cache(&mock);

        cache.load(None).await;
        let resolution = cache.load(Some("c1")).await;

        assert!(resolution.is_error);
        assert!(!resolution.is_loading);
        assert_eq!(resolution.flags, WaffleFlagSet::defaults(Some("c1")));
        assert!(!cache.is_cached(Some("c1")));
    }

    #[tokio::test]
    async fn test_loaded_scope_is_never_refetched() {
        let mock = Arc::new(MockTransport::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({}))]);
        let cache = cache(&mock);

        cache.load(None).await;
        cache.load(None).await;
        cache.resolve_flags(None);

        assert_eq!(mock.calls_to(GLOBAL_URL), 1);
    }

    #[tokio::test]
    async fn test_failed_scope_reloads_on_explicit_load() {
        let mock = Arc::new(MockTransport::new());
        mock.on(
            GLOBAL_URL,
            [MockReply::connection_error("refused"), MockReply::json(200, json!({"use_new_home_page": false}))],
        );
        let cache = cache(&mock);

        assert!(cache.load(None).await.is_error);
        // resolve_flags does not hammer a failed scope
        assert!(cache.resolve_flags(None).is_error);

        let resolution = cache.load(None).await;
        assert!(!resolution.is_error);
        assert!(!resolution.is_enabled(WaffleFlag::UseNewHomePage));
        assert_eq!(mock.calls_to(GLOBAL_URL), 2);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_request() {
        let mock = Arc::new(MockTransport::new());
        let gate = Arc::new(Notify::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({})).gated(gate.clone())]);
        let cache = cache(&mock);

        let first = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load(None).await })
        };
        let second = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load(None).await })
        };
        while mock.call_count() == 0 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        assert!(!first.await.unwrap().is_loading);
        assert!(!second.await.unwrap().is_loading);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_status_board_tracks_scopes() {
        let mock = Arc::new(MockTransport::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({}))]);
        mock.on(COURSE_URL, [MockReply::status(403)]);
        let statuses = Arc::new(StatusBoard::new());
        let cache = Arc::new(FlagCache::new(
            mock.clone(),
            ApiUrls::new("http://studio", "http://lms"),
            statuses.clone(),
        ));

        cache.load(None).await;
        cache.load(Some("c1")).await;

        assert_eq!(statuses.get(ResourceKind::WaffleFlags, GLOBAL_SCOPE_KEY), FetchStatus::Successful);
        assert_eq!(statuses.get(ResourceKind::WaffleFlags, "c1"), FetchStatus::Failed);
    }

    #[test]
    fn test_resolve_flags_outside_runtime_schedules_nothing() {
        let mock = Arc::new(MockTransport::new());
        let cache = cache(&mock);

        let resolution = cache.resolve_flags(Some("c1"));

        assert_eq!(resolution.flags, WaffleFlagSet::defaults(Some("c1")));
        assert!(!resolution.is_loading);
        assert!(!cache.is_cached(Some("c1")));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_scope_is_global() {
        let mock = Arc::new(MockTransport::new());
        mock.on(GLOBAL_URL, [MockReply::json(200, json!({"enable_course_optimizer": true}))]);
        let cache = cache(&mock);

        let resolution = cache.load(Some("  ")).await;

        assert!(resolution.flags.id.is_none());
        assert!(resolution.is_enabled(WaffleFlag::EnableCourseOptimizer));
        assert!(cache.resolve_flags(Some("")).is_enabled(WaffleFlag::EnableCourseOptimizer));
        assert_eq!(mock.calls_to(GLOBAL_URL), 1);
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_resolve_without_runtime_returns_defaults() {
        let mock = Arc::new(MockTransport::new());
        let cache = cache(&mock);

        let resolution = cache.resolve(Some("c1"));

        assert_eq!(resolution.flags, WaffleFlagSet::defaults(Some("c1")));
        assert!(!resolution.is_loading);
        assert!(!resolution.is_error);
        assert_eq!(mock.call_count(), 0);
    }
}
