//! Narrow read-only view of the external issue tracker.
//!
//! The gate only needs to look a work item up by id. [`BeadsTracker`] reads
//! from the `bd` CLI; [`InMemoryTracker`] serves embedding callers and tests.

pub mod beads;

pub use beads::BeadsTracker;

use crate::context::ExecContext;
use crate::errors::TrackerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// A tracked unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Issue {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: "open".to_string(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    fn has_any_label(&self, wanted: &[&str]) -> bool {
        self.labels.iter().any(|l| wanted.contains(&l.as_str()))
    }

    /// Carries a label recording a passed verification.
    pub fn is_verified(&self) -> bool {
        self.has_any_label(VERIFIED_LABELS)
    }

    /// Carries a label asking for verification and has not passed yet.
    pub fn awaits_verification(&self) -> bool {
        self.has_any_label(AWAITING_LABELS) && !self.is_verified()
    }
}

/// Labels marking an issue whose work already passed verification.
pub const VERIFIED_LABELS: &[&str] = &["verified", "verification-passed"];

/// Labels marking an issue queued for verification.
pub const AWAITING_LABELS: &[&str] = &["needs-verification", "pending-verification"];

/// Lookup of work items by id.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Fetch one issue. A missing id must yield [`TrackerError::NotFound`].
    async fn show(&self, ctx: &ExecContext, id: &str) -> Result<Issue, TrackerError>;

    /// All issues currently open.
    async fn list_open(&self, ctx: &ExecContext) -> Result<Vec<Issue>, TrackerError>;
}

/// Tracker backed by a map.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    issues: RwLock<BTreeMap<String, Issue>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issues<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = Issue>,
    {
        let tracker = Self::new();
        for issue in issues {
            tracker.insert(issue);
        }
        tracker
    }

    /// Add or replace an issue.
    pub fn insert(&self, issue: Issue) {
        self.issues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(issue.id.clone(), issue);
    }
}

#[async_trait]
impl Tracker for InMemoryTracker {
    async fn show(&self, _ctx: &ExecContext, id: &str) -> Result<Issue, TrackerError> {
        self.issues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    async fn list_open(&self, _ctx: &ExecContext) -> Result<Vec<Issue>, TrackerError> {
        Ok(self
            .issues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|issue| issue.status == "open")
            .cloned()
            .collect())
    }
}
