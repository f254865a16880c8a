//! crates/bitacora_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the backend
//! store, its change feed, the AI text generator and password hashing are
//! all collaborators the core only knows through these ports.

use crate::domain::{
    AppMedia, AppNotification, Expense, ExpenseStatus, NewExpense, NewMedia, NewNotification,
    NewProfile, ProfileStatus, SessionContext, Trip, TripDetails, User, UserCredentials,
};
use crate::logbook::{LogBookEntry, LogBookRecord, LogBookStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Collections and Change Events
//=========================================================================================

/// The six record collections the client keeps in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Trips,
    Expenses,
    Notifications,
    Profiles,
    Media,
    LogBooks,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Collection::Trips,
        Collection::Expenses,
        Collection::Notifications,
        Collection::Profiles,
        Collection::Media,
        Collection::LogBooks,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::Trips => "trips",
            Collection::Expenses => "expenses",
            Collection::Notifications => "notifications",
            Collection::Profiles => "profiles",
            Collection::Media => "media_assets",
            Collection::LogBooks => "bitacora_registros",
        }
    }

    pub fn from_table_name(table: &str) -> Option<Self> {
        Collection::ALL
            .into_iter()
            .find(|c| c.table_name() == table)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

impl ChangeOperation {
    pub fn parse(op: &str) -> Option<Self> {
        match op.to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeOperation::Insert),
            "UPDATE" => Some(ChangeOperation::Update),
            "DELETE" => Some(ChangeOperation::Delete),
            _ => None,
        }
    }
}

/// A row-level change reported by the backend, or a write made by this
/// service. Either way the reaction is a full re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub operation: ChangeOperation,
}

impl ChangeEvent {
    /// Whether this event belongs to one of the two subscribed topics:
    /// any change to log-books, or a new notification.
    pub fn is_subscribed_topic(&self) -> bool {
        match self.collection {
            Collection::LogBooks => true,
            Collection::Notifications => self.operation == ChangeOperation::Insert,
            _ => false,
        }
    }
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = PortResult<ChangeEvent>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles ---
    async fn list_profiles(&self) -> PortResult<Vec<User>>;

    async fn get_profile(&self, id: &str) -> PortResult<User>;

    async fn get_profile_by_employee_id(&self, employee_id: &str) -> PortResult<Option<User>>;

    async fn get_credentials_by_employee_id(
        &self,
        employee_id: &str,
    ) -> PortResult<Option<UserCredentials>>;

    /// Fails with [`PortError::Conflict`] when the employee id is taken.
    async fn create_profile(&self, profile: &NewProfile, password_hash: &str) -> PortResult<User>;

    async fn set_profile_status(&self, id: &str, status: ProfileStatus) -> PortResult<User>;

    async fn delete_profile(&self, id: &str) -> PortResult<()>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        ctx: &SessionContext,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionContext>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Log-books ---
    async fn list_logbooks(&self) -> PortResult<Vec<LogBookEntry>>;

    async fn get_logbook(&self, id: Uuid) -> PortResult<LogBookEntry>;

    /// The backend assigns the id.
    async fn insert_logbook(&self, record: &LogBookRecord) -> PortResult<LogBookEntry>;

    /// Writes only while the stored status is still `expected`. An entry that
    /// moved on in the meantime fails with `PortError::Conflict`.
    async fn update_logbook(
        &self,
        id: Uuid,
        expected: LogBookStatus,
        record: &LogBookRecord,
    ) -> PortResult<LogBookEntry>;

    async fn delete_logbook(&self, id: Uuid) -> PortResult<()>;

    // --- Notifications ---
    async fn list_notifications(&self) -> PortResult<Vec<AppNotification>>;

    async fn insert_notification(&self, notification: &NewNotification)
        -> PortResult<AppNotification>;

    async fn mark_notification_read(&self, id: Uuid) -> PortResult<()>;

    // --- Trips ---
    async fn list_trips(&self) -> PortResult<Vec<Trip>>;

    async fn insert_trip(&self, trip: &TripDetails) -> PortResult<Trip>;

    async fn update_trip(&self, id: Uuid, trip: &TripDetails) -> PortResult<Trip>;

    async fn delete_trip(&self, id: Uuid) -> PortResult<()>;

    // --- Expenses ---
    async fn list_expenses(&self) -> PortResult<Vec<Expense>>;

    async fn get_expense(&self, id: Uuid) -> PortResult<Expense>;

    async fn insert_expense(&self, expense: &NewExpense) -> PortResult<Expense>;

    async fn set_expense_status(&self, id: Uuid, status: ExpenseStatus) -> PortResult<Expense>;

    // --- Media ---
    async fn list_media(&self) -> PortResult<Vec<AppMedia>>;

    async fn insert_media(&self, media: &NewMedia) -> PortResult<AppMedia>;

    async fn delete_media(&self, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription to the backend's change topics.
    async fn subscribe(&self) -> PortResult<ChangeStream>;
}

/// Which advisory surface a prompt belongs to. Adapters may route kinds to
/// different models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    TripInsights,
    AddressValidation,
    FleetSummary,
    ExpenseAudit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryPrompt {
    pub kind: AdvisoryKind,
    pub system_instruction: String,
    pub prompt: String,
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait AdvisoryService: Send + Sync {
    /// Generates free-form text for a prompt and a system instruction.
    async fn generate(&self, prompt: &AdvisoryPrompt) -> PortResult<String>;
}

/// Password hashing and verification.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> PortResult<String>;

    fn verify(&self, password: &str, hash: &str) -> bool;
}
