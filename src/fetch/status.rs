//! Fetch status slots and their observers.
//!
//! Every (kind, key) pair owns exactly one [`FetchStatus`]. The orchestrator is
//! the only writer; everything else reads the board or subscribes to the
//! transition stream.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle of one fetched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchStatus {
    #[default]
    Pending,
    InProgress,
    Successful,
    NotFound,
    Denied,
    Failed,
}

impl FetchStatus {
    /// Terminal states only change when a new fetch is dispatched.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::NotFound | Self::Denied | Self::Failed)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    /// What a page gated on this status shows.
    pub fn page_view(&self) -> PageView {
        match self {
            Self::Pending | Self::InProgress => PageView::Loading,
            Self::NotFound => PageView::NotFound,
            Self::Denied => PageView::PermissionDenied,
            // FAILED renders the page anyway, same as SUCCESSFUL
            Self::Successful | Self::Failed => PageView::Content,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Successful => "SUCCESSFUL",
            Self::NotFound => "NOT_FOUND",
            Self::Denied => "DENIED",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Page-level rendering decision derived from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageView {
    Loading,
    NotFound,
    PermissionDenied,
    Content,
}

/// Which server resource a status slot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    CourseDetail,
    CourseApps,
    CourseAppUpdate,
    WaffleFlags,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CourseDetail => "course detail",
            Self::CourseApps => "course apps",
            Self::CourseAppUpdate => "course app update",
            Self::WaffleFlags => "waffle flags",
        };
        write!(f, "{}", s)
    }
}

/// One published status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub kind: ResourceKind,
    pub key: String,
    pub from: FetchStatus,
    pub to: FetchStatus,
}

/// Status slots for every (kind, key) seen this session.
#[derive(Debug)]
pub struct StatusBoard {
    slots: RwLock<HashMap<(ResourceKind, String), FetchStatus>>,
    events: broadcast::Sender<StatusTransition>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            slots: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Current status; slots never written read as `Pending`.
    pub fn get(&self, kind: ResourceKind, key: &str) -> FetchStatus {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(kind, key.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Replace the slot and publish the transition.
    pub fn set(&self, kind: ResourceKind, key: &str, status: FetchStatus) {
        let from = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            slots.insert((kind, key.to_string()), status).unwrap_or_default()
        };

        log::debug!("{} {}: {} -> {}", kind, key, from, status);

        // No subscribers is fine
        let _ = self.events.send(StatusTransition {
            kind,
            key: key.to_string(),
            from,
            to: status,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.events.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
