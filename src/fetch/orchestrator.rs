//! Fetch orchestration: one "get this resource" intent in, a sequence of
//! network attempts and exactly one terminal status out.
//!
//! Overlapping fetches for the same (kind, key) share a single in-flight
//! request. The shared request is driven by a spawned task, so it runs to
//! completion even if every caller stops waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{Value, json};

use crate::api::ApiUrls;
use crate::domain::{AuthenticatedUser, CourseApp, CourseDetail};
use crate::error::{AuthoringError, Result};
use crate::store::{CourseEntry, ResourceStore};
use crate::transport::Transport;

use super::outcome::{FailureReason, FetchOutcome, ResponseClass, classify};
use super::retry::{RetryConfig, RetrySchedule, RetryTrigger};
use super::status::{FetchStatus, ResourceKind, StatusBoard};

type Slot = (ResourceKind, String);
type InFlight = Shared<BoxFuture<'static, FetchOutcome<()>>>;

pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    urls: ApiUrls,
    user: AuthenticatedUser,
    statuses: Arc<StatusBoard>,
    store: Arc<ResourceStore>,
    in_flight: Mutex<HashMap<Slot, InFlight>>,
}

impl FetchOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        urls: ApiUrls,
        user: AuthenticatedUser,
        statuses: Arc<StatusBoard>,
        store: Arc<ResourceStore>,
    ) -> Self {
        Self {
            transport,
            urls,
            user,
            statuses,
            store,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self, kind: ResourceKind, key: &str) -> FetchStatus {
        self.statuses.get(kind, key)
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Fetch a course's detail, retrying while the LMS reports it is not ready.
    ///
    /// Returns the terminal status. The only error returns are an empty key
    /// (nothing is dispatched) and a course that stayed 202 through every
    /// attempt (`CourseNotReady`; the slot is marked `Failed`).
    ///
    /// A call that joins an in-flight fetch for the same course inherits that
    /// fetch's retry configuration.
    pub async fn fetch_course_detail(self: &Arc<Self>, course_id: &str, retry: &RetryConfig) -> Result<FetchStatus> {
        validate_key(course_id)?;

        let this = Arc::clone(self);
        let key = course_id.to_string();
        let retry = retry.clone();
        let outcome = self
            .join_or_start(ResourceKind::CourseDetail, course_id, async move {
                this.load_course_detail(&key, &retry).await
            })
            .await;

        settle(outcome, course_id)
    }

    /// Fetch the course-app list. No not-ready retries: 403 is `Denied`, 404
    /// is `NotFound`, anything else unexpected is `Failed`.
    pub async fn fetch_course_apps(self: &Arc<Self>, course_id: &str) -> Result<FetchStatus> {
        validate_key(course_id)?;

        let this = Arc::clone(self);
        let key = course_id.to_string();
        let outcome = self
            .join_or_start(ResourceKind::CourseApps, course_id, async move {
                this.load_course_apps(&key).await
            })
            .await;

        settle(outcome, course_id)
    }

    /// Enable or disable one course app. Mutations are never joined.
    pub async fn update_course_app(&self, course_id: &str, app_id: &str, enabled: bool) -> Result<FetchStatus> {
        validate_key(course_id)?;
        validate_key(app_id)?;

        self.statuses
            .set(ResourceKind::CourseAppUpdate, course_id, FetchStatus::InProgress);
        let outcome = self.save_course_app(course_id, app_id, enabled).await;
        self.statuses
            .set(ResourceKind::CourseAppUpdate, course_id, outcome.status());

        settle(outcome, course_id)
    }

    async fn join_or_start<F>(self: &Arc<Self>, kind: ResourceKind, key: &str, work: F) -> FetchOutcome<()>
    where
        F: std::future::Future<Output = FetchOutcome<()>> + Send + 'static,
    {
        let slot: Slot = (kind, key.to_string());

        let fetch = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&slot) {
                Some(existing) => {
                    log::debug!("Joining in-flight {} fetch for {}", kind, key);
                    existing.clone()
                }
                None => {
                    self.statuses.set(kind, key, FetchStatus::InProgress);

                    let this = Arc::clone(self);
                    let finished_slot = slot.clone();
                    let fetch = async move {
                        let outcome = work.await;
                        this.finish(&finished_slot, &outcome);
                        outcome
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(slot, fetch.clone());
                    tokio::spawn(fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Publish the terminal status and retire the in-flight entry atomically,
    /// so a fetch dispatched right after cannot have its `InProgress`
    /// overwritten by this one's result.
    fn finish(&self, slot: &Slot, outcome: &FetchOutcome<()>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.statuses.set(slot.0, &slot.1, outcome.status());
        in_flight.remove(slot);
    }

    async fn load_course_detail(&self, course_id: &str, retry: &RetryConfig) -> FetchOutcome<()> {
        let url = self.urls.course_detail(course_id);
        let query = [("username", self.user.username.as_str())];
        let mut schedule = RetrySchedule::new(retry);

        loop {
            let response = match self.transport.get(&url, &query).await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!(
                        "Course detail {} failed on attempt {}: {}",
                        course_id,
                        schedule.attempt(),
                        e
                    );
                    return FetchOutcome::Failed(FailureReason::Transport(e.to_string()));
                }
            };

            let trigger = match classify(response.status) {
                ResponseClass::Ok => return self.store_course_detail(course_id, response.body),
                ResponseClass::NotReady => RetryTrigger::NotReady,
                ResponseClass::NotFound => RetryTrigger::NotFound,
                ResponseClass::Denied => return FetchOutcome::Denied,
                ResponseClass::Error => {
                    log::warn!("Course detail {} returned HTTP {}", course_id, response.status);
                    return FetchOutcome::Failed(FailureReason::Status(response.status));
                }
            };

            match schedule.next(trigger) {
                Some(attempt) => {
                    tracing::info!(
                        course_id,
                        attempt = attempt.attempt_number,
                        delay_ms = attempt.delay.as_millis() as u64,
                        trigger = ?attempt.trigger,
                        "Course not ready, retrying"
                    );
                    tokio::time::sleep(attempt.delay).await;
                }
                None => {
                    return match trigger {
                        RetryTrigger::NotFound => FetchOutcome::NotFound,
                        RetryTrigger::NotReady => {
                            log::warn!(
                                "Course {} still not ready after {} attempts",
                                course_id,
                                schedule.attempt()
                            );
                            FetchOutcome::Failed(FailureReason::NotReadyExhausted {
                                attempts: schedule.attempt(),
                            })
                        }
                    };
                }
            }
        }
    }

    fn store_course_detail(&self, course_id: &str, body: Value) -> FetchOutcome<()> {
        let course: CourseDetail = match serde_json::from_value(body) {
            Ok(course) => course,
            Err(e) => return FetchOutcome::Failed(FailureReason::Decode(e.to_string())),
        };

        let now = Utc::now();
        let can_change_providers = course.can_change_providers(&self.user, now);
        log::info!(
            "Fetched course {} ({}), can_change_providers={}",
            course_id,
            course.name,
            can_change_providers
        );

        self.store.put_course(
            course_id,
            CourseEntry {
                course,
                can_change_providers,
                fetched_at: now,
            },
        );
        FetchOutcome::Ready(())
    }

    async fn load_course_apps(&self, course_id: &str) -> FetchOutcome<()> {
        let url = self.urls.course_apps(course_id);
        let response = match self.transport.get(&url, &[]).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(FailureReason::Transport(e.to_string())),
        };

        match classify(response.status) {
            ResponseClass::Ok => match serde_json::from_value::<Vec<CourseApp>>(response.body) {
                Ok(apps) => {
                    log::info!("Fetched {} course apps for {}", apps.len(), course_id);
                    self.store.put_course_apps(course_id, apps);
                    FetchOutcome::Ready(())
                }
                Err(e) => FetchOutcome::Failed(FailureReason::Decode(e.to_string())),
            },
            ResponseClass::Denied => FetchOutcome::Denied,
            ResponseClass::NotFound => FetchOutcome::NotFound,
            ResponseClass::NotReady | ResponseClass::Error => {
                FetchOutcome::Failed(FailureReason::Status(response.status))
            }
        }
    }

    async fn save_course_app(&self, course_id: &str, app_id: &str, enabled: bool) -> FetchOutcome<()> {
        let url = self.urls.course_apps(course_id);
        let body = json!({ "id": app_id, "enabled": enabled });
        let response = match self.transport.patch(&url, &body).await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(FailureReason::Transport(e.to_string())),
        };

        match classify(response.status) {
            ResponseClass::Ok => {
                // Prefer the server's copy; fall back to flipping our own
                let updated = serde_json::from_value::<CourseApp>(response.body)
                    .ok()
                    .or_else(|| {
                        self.store.course_app(course_id, app_id).map(|mut app| {
                            app.enabled = enabled;
                            app
                        })
                    });

                if let Some(app) = updated {
                    if !self.store.replace_course_app(course_id, app) {
                        log::debug!("Course app {} not cached for {}, nothing to replace", app_id, course_id);
                    }
                }
                log::info!("Course app {} for {} set enabled={}", app_id, course_id, enabled);
                FetchOutcome::Ready(())
            }
            ResponseClass::Denied => FetchOutcome::Denied,
            ResponseClass::NotFound => FetchOutcome::NotFound,
            ResponseClass::NotReady | ResponseClass::Error => {
                FetchOutcome::Failed(FailureReason::Status(response.status))
            }
        }
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("urls", &self.urls)
            .field("user", &self.user.username)
            .finish()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(AuthoringError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn settle(outcome: FetchOutcome<()>, key: &str) -> Result<FetchStatus> {
    match outcome.boundary_error(key) {
        Some(err) => Err(err),
        None => Ok(outcome.status()),
    }
}
