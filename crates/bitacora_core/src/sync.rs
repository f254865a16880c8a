//! crates/bitacora_core/src/sync.rs
//!
//! The data synchronization layer: fetches the six collections concurrently,
//! tolerates per-collection failures and narrows the result to what a given
//! session may see.

use crate::domain::{AppMedia, AppNotification, Expense, SessionContext, Trip, TripStatus, User};
use crate::expense::average_performance;
use crate::logbook::{LogBookEntry, LogBookStatus};
use crate::ports::{Collection, DatabaseService, PortError, PortResult};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub trips: Vec<Trip>,
    pub expenses: Vec<Expense>,
    pub notifications: Vec<AppNotification>,
    pub profiles: Vec<User>,
    pub media: Vec<AppMedia>,
    pub logbooks: Vec<LogBookEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionFailure {
    pub collection: Collection,
    pub error: String,
}

/// The result of one full re-fetch. Collections that failed stay empty and
/// are listed in `failures`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub snapshot: Snapshot,
    pub failures: Vec<CollectionFailure>,
}

fn settle<T>(
    collection: Collection,
    result: PortResult<Vec<T>>,
    failures: &mut Vec<CollectionFailure>,
) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(e) => {
            warn!("Failed to fetch {}: {}", collection, e);
            failures.push(CollectionFailure {
                collection,
                error: e.to_string(),
            });
            Vec::new()
        }
    }
}

/// Runs the six read queries concurrently and settles each independently.
pub async fn fetch_all(db: &dyn DatabaseService) -> SyncOutcome {
    let (trips, expenses, notifications, profiles, media, logbooks) = futures::join!(
        db.list_trips(),
        db.list_expenses(),
        db.list_notifications(),
        db.list_profiles(),
        db.list_media(),
        db.list_logbooks(),
    );

    let mut failures = Vec::new();
    let snapshot = Snapshot {
        trips: settle(Collection::Trips, trips, &mut failures),
        expenses: settle(Collection::Expenses, expenses, &mut failures),
        notifications: settle(Collection::Notifications, notifications, &mut failures),
        profiles: settle(Collection::Profiles, profiles, &mut failures),
        media: settle(Collection::Media, media, &mut failures),
        logbooks: settle(Collection::LogBooks, logbooks, &mut failures),
    };
    SyncOutcome { snapshot, failures }
}

/// Fetches everything and keeps only what `ctx` may see.
pub async fn fetch_visible(db: &dyn DatabaseService, ctx: &SessionContext) -> SyncOutcome {
    let outcome = fetch_all(db).await;
    SyncOutcome {
        snapshot: outcome.snapshot.visible_to(ctx),
        failures: outcome.failures,
    }
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_trips: usize,
    pub pending_logbooks: usize,
    pub open_logbooks: usize,
    pub unread_notifications: usize,
    pub average_performance: Option<f64>,
    pub total_expenses: f64,
}

impl Snapshot {
    pub fn visible_to(self, ctx: &SessionContext) -> Snapshot {
        let is_admin = ctx.is_admin();
        Snapshot {
            trips: self
                .trips
                .into_iter()
                .filter(|t| is_admin || t.details.operator_id == ctx.user_id)
                .collect(),
            expenses: self
                .expenses
                .into_iter()
                .filter(|e| is_admin || e.operator_id == ctx.user_id)
                .collect(),
            notifications: self
                .notifications
                .into_iter()
                .filter(|n| n.visible_to(ctx))
                .collect(),
            profiles: self.profiles,
            media: self.media,
            logbooks: self
                .logbooks
                .into_iter()
                .filter(|l| l.visible_to(ctx))
                .collect(),
        }
    }

    /// Entries waiting for an operator to accept them.
    pub fn pending_logbooks(&self) -> impl Iterator<Item = &LogBookEntry> {
        self.logbooks
            .iter()
            .filter(|l| l.status() == LogBookStatus::Pending)
    }

    pub fn completed_logbooks(&self) -> Vec<LogBookEntry> {
        self.logbooks
            .iter()
            .filter(|l| l.status() == LogBookStatus::Completed)
            .cloned()
            .collect()
    }

    /// Computed over an already narrowed snapshot. Notifications sent by the
    /// viewer are not counted as unread.
    pub fn stats(&self, ctx: &SessionContext) -> DashboardStats {
        DashboardStats {
            active_trips: self
                .trips
                .iter()
                .filter(|t| t.details.status == TripStatus::InProgress)
                .count(),
            pending_logbooks: self.pending_logbooks().count(),
            open_logbooks: self.logbooks.iter().filter(|l| l.is_open()).count(),
            unread_notifications: self
                .notifications
                .iter()
                .filter(|n| !n.read && n.from_id != ctx.user_id)
                .count(),
            average_performance: average_performance(&self.expenses),
            total_expenses: self.expenses.iter().map(|e| e.amount).sum(),
        }
    }
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, collection: Collection) -> bool {
        self.failures.iter().any(|f| f.collection == collection)
    }
}

/// Errors from the sync layer are never fatal; this only exists so callers
/// can surface a total outage distinctly.
pub fn total_outage(outcome: &SyncOutcome) -> Option<PortError> {
    if outcome.failures.len() == Collection::ALL.len() {
        Some(PortError::Unexpected(
            "every collection failed to load".to_string(),
        ))
    } else {
        None
    }
}
