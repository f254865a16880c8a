//! In-memory collaborators for driving the core services in tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bitacora_core::domain::{
    AppMedia, AppNotification, Expense, ExpenseStatus, NewExpense, NewMedia, NewNotification,
    NewProfile, ProfileStatus, SessionContext, Trip, TripDetails, User, UserCredentials, UserRole,
};
use bitacora_core::logbook::{LogBookEntry, LogBookRecord, LogBookStatus};
use bitacora_core::ports::{
    AdvisoryPrompt, AdvisoryService, Collection, CredentialHasher, DatabaseService, PortError,
    PortResult,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn admin() -> SessionContext {
    SessionContext {
        user_id: "ADM-admin1".to_string(),
        user_name: "ADMIN1".to_string(),
        role: UserRole::Admin,
    }
}

pub fn operator(id: &str) -> SessionContext {
    SessionContext {
        user_id: id.to_string(),
        user_name: format!("Operador {}", id),
        role: UserRole::Operator,
    }
}

// 1x1 transparent PNG
pub const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

//=========================================================================================
// Database
//=========================================================================================

#[derive(Default)]
struct State {
    profiles: Vec<(User, String)>,
    sessions: HashMap<String, (SessionContext, DateTime<Utc>)>,
    logbooks: Vec<LogBookEntry>,
    notifications: Vec<AppNotification>,
    trips: Vec<Trip>,
    expenses: Vec<Expense>,
    media: Vec<AppMedia>,
}

#[derive(Default)]
pub struct InMemoryDb {
    state: Mutex<State>,
    failing: Mutex<HashSet<Collection>>,
    writes_fail: AtomicBool,
    stale_reads: Mutex<HashMap<Uuid, LogBookEntry>>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read and write of `collection` fails from now on.
    pub fn fail(&self, collection: Collection) {
        self.failing.lock().unwrap().insert(collection);
    }

    /// Every write fails from now on; reads keep working.
    pub fn fail_writes(&self) {
        self.writes_fail.store(true, Ordering::SeqCst);
    }

    /// The next read of this log-book returns `entry` instead of the stored
    /// one, as if another session wrote in between.
    pub fn serve_stale(&self, entry: LogBookEntry) {
        self.stale_reads.lock().unwrap().insert(entry.id, entry);
    }

    pub fn logbook(&self, id: Uuid) -> LogBookEntry {
        self.state
            .lock()
            .unwrap()
            .logbooks
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .expect("log-book exists")
    }

    pub fn notifications(&self) -> Vec<AppNotification> {
        self.state.lock().unwrap().notifications.clone()
    }

    pub fn seed_logbook(&self, record: LogBookRecord) -> LogBookEntry {
        let entry = LogBookEntry {
            id: Uuid::new_v4(),
            record,
        };
        self.state.lock().unwrap().logbooks.push(entry.clone());
        entry
    }

    pub fn seed_profile(&self, user: User, password_hash: &str) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .push((user, password_hash.to_string()));
    }

    fn read(&self, collection: Collection) -> PortResult<()> {
        if self.failing.lock().unwrap().contains(&collection) {
            return Err(PortError::Unexpected(format!("{} unavailable", collection)));
        }
        Ok(())
    }

    fn write(&self, collection: Collection) -> PortResult<()> {
        self.read(collection)?;
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("write rejected".to_string()));
        }
        Ok(())
    }
}

fn profile_user(profile: &NewProfile) -> User {
    User {
        id: Uuid::new_v4().to_string(),
        name: profile.name.clone(),
        role: profile.role.unwrap_or(UserRole::Operator),
        avatar: profile.avatar.clone().unwrap_or_default(),
        employee_id: Some(profile.employee_id.clone()),
        email: profile.email.clone(),
        phone: profile.phone.clone(),
        license_number: profile.license_number.clone(),
        license_type: profile.license_type.clone(),
        license_expiry: profile.license_expiry.clone(),
        emergency_contact: profile.emergency_contact.clone(),
        emergency_phone: profile.emergency_phone.clone(),
        blood_type: profile.blood_type.clone(),
        position: profile.position.clone(),
        hire_date: profile.hire_date.clone(),
        status: Some(ProfileStatus::Active),
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn list_profiles(&self) -> PortResult<Vec<User>> {
        self.read(Collection::Profiles)?;
        Ok(self.state.lock().unwrap().profiles.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn get_profile(&self, id: &str) -> PortResult<User> {
        self.read(Collection::Profiles)?;
        self.state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("profile {}", id)))
    }

    async fn get_profile_by_employee_id(&self, employee_id: &str) -> PortResult<Option<User>> {
        self.read(Collection::Profiles)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|(u, _)| u.employee_id.as_deref() == Some(employee_id))
            .map(|(u, _)| u.clone()))
    }

    async fn get_credentials_by_employee_id(
        &self,
        employee_id: &str,
    ) -> PortResult<Option<UserCredentials>> {
        self.read(Collection::Profiles)?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|(u, _)| u.employee_id.as_deref() == Some(employee_id))
            .map(|(u, hash)| UserCredentials {
                user: u.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn create_profile(&self, profile: &NewProfile, password_hash: &str) -> PortResult<User> {
        self.write(Collection::Profiles)?;
        let mut state = self.state.lock().unwrap();
        if state
            .profiles
            .iter()
            .any(|(u, _)| u.employee_id.as_deref() == Some(profile.employee_id.as_str()))
        {
            return Err(PortError::Conflict(profile.employee_id.clone()));
        }
        let user = profile_user(profile);
        state.profiles.push((user.clone(), password_hash.to_string()));
        Ok(user)
    }

    async fn set_profile_status(&self, id: &str, status: ProfileStatus) -> PortResult<User> {
        self.write(Collection::Profiles)?;
        let mut state = self.state.lock().unwrap();
        let (user, _) = state
            .profiles
            .iter_mut()
            .find(|(u, _)| u.id == id)
            .ok_or_else(|| PortError::NotFound(format!("profile {}", id)))?;
        user.status = Some(status);
        Ok(user.clone())
    }

    async fn delete_profile(&self, id: &str) -> PortResult<()> {
        self.write(Collection::Profiles)?;
        self.state.lock().unwrap().profiles.retain(|(u, _)| u.id != id);
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        ctx: &SessionContext,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (ctx.clone(), expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionContext> {
        match self.state.lock().unwrap().sessions.get(session_id) {
            Some((ctx, expires_at)) if *expires_at > Utc::now() => Ok(ctx.clone()),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.state.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn list_logbooks(&self) -> PortResult<Vec<LogBookEntry>> {
        self.read(Collection::LogBooks)?;
        Ok(self.state.lock().unwrap().logbooks.clone())
    }

    async fn get_logbook(&self, id: Uuid) -> PortResult<LogBookEntry> {
        self.read(Collection::LogBooks)?;
        if let Some(stale) = self.stale_reads.lock().unwrap().remove(&id) {
            return Ok(stale);
        }
        self.state
            .lock()
            .unwrap()
            .logbooks
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("log-book {}", id)))
    }

    async fn insert_logbook(&self, record: &LogBookRecord) -> PortResult<LogBookEntry> {
        self.write(Collection::LogBooks)?;
        let entry = LogBookEntry {
            id: Uuid::new_v4(),
            record: record.clone(),
        };
        self.state.lock().unwrap().logbooks.push(entry.clone());
        Ok(entry)
    }

    async fn update_logbook(
        &self,
        id: Uuid,
        expected: LogBookStatus,
        record: &LogBookRecord,
    ) -> PortResult<LogBookEntry> {
        self.write(Collection::LogBooks)?;
        let mut state = self.state.lock().unwrap();
        let entry = state
            .logbooks
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| PortError::NotFound(format!("log-book {}", id)))?;
        if entry.record.status != expected {
            return Err(PortError::Conflict(format!(
                "log-book {} is {}, not {}",
                id, entry.record.status, expected
            )));
        }
        entry.record = record.clone();
        Ok(entry.clone())
    }

    async fn delete_logbook(&self, id: Uuid) -> PortResult<()> {
        self.write(Collection::LogBooks)?;
        self.state.lock().unwrap().logbooks.retain(|l| l.id != id);
        Ok(())
    }

    async fn list_notifications(&self) -> PortResult<Vec<AppNotification>> {
        self.read(Collection::Notifications)?;
        Ok(self.state.lock().unwrap().notifications.clone())
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> PortResult<AppNotification> {
        self.write(Collection::Notifications)?;
        let stored = AppNotification {
            id: Uuid::new_v4(),
            from_id: notification.from_id.clone(),
            from_name: notification.from_name.clone(),
            to_id: notification.to_id.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            timestamp: notification.timestamp,
            trip_id: notification.trip_id.clone(),
            read: false,
        };
        self.state.lock().unwrap().notifications.push(stored.clone());
        Ok(stored)
    }

    async fn mark_notification_read(&self, id: Uuid) -> PortResult<()> {
        self.write(Collection::Notifications)?;
        let mut state = self.state.lock().unwrap();
        let n = state
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| PortError::NotFound(format!("notification {}", id)))?;
        n.read = true;
        Ok(())
    }

    async fn list_trips(&self) -> PortResult<Vec<Trip>> {
        self.read(Collection::Trips)?;
        Ok(self.state.lock().unwrap().trips.clone())
    }

    async fn insert_trip(&self, trip: &TripDetails) -> PortResult<Trip> {
        self.write(Collection::Trips)?;
        let trip = Trip {
            id: Uuid::new_v4(),
            details: trip.clone(),
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().trips.push(trip.clone());
        Ok(trip)
    }

    async fn update_trip(&self, id: Uuid, details: &TripDetails) -> PortResult<Trip> {
        self.write(Collection::Trips)?;
        let mut state = self.state.lock().unwrap();
        let trip = state
            .trips
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PortError::NotFound(format!("trip {}", id)))?;
        trip.details = details.clone();
        Ok(trip.clone())
    }

    async fn delete_trip(&self, id: Uuid) -> PortResult<()> {
        self.write(Collection::Trips)?;
        self.state.lock().unwrap().trips.retain(|t| t.id != id);
        Ok(())
    }

    async fn list_expenses(&self) -> PortResult<Vec<Expense>> {
        self.read(Collection::Expenses)?;
        Ok(self.state.lock().unwrap().expenses.clone())
    }

    async fn get_expense(&self, id: Uuid) -> PortResult<Expense> {
        self.read(Collection::Expenses)?;
        self.state
            .lock()
            .unwrap()
            .expenses
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("expense {}", id)))
    }

    async fn insert_expense(&self, expense: &NewExpense) -> PortResult<Expense> {
        self.write(Collection::Expenses)?;
        let stored = Expense {
            id: Uuid::new_v4(),
            trip_id: expense.trip_id.clone(),
            operator_id: expense.operator_id.clone(),
            operator_name: expense.operator_name.clone(),
            category: expense.category,
            amount: expense.amount,
            date: expense.date.clone(),
            description: expense.description.clone(),
            status: ExpenseStatus::Pending,
            unit_price: expense.unit_price,
            diesel_liters: expense.diesel_liters,
            odometer: expense.odometer,
            performance: expense.performance,
            receipt_url: expense.receipt_url.clone(),
        };
        self.state.lock().unwrap().expenses.push(stored.clone());
        Ok(stored)
    }

    async fn set_expense_status(&self, id: Uuid, status: ExpenseStatus) -> PortResult<Expense> {
        self.write(Collection::Expenses)?;
        let mut state = self.state.lock().unwrap();
        let expense = state
            .expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PortError::NotFound(format!("expense {}", id)))?;
        expense.status = status;
        Ok(expense.clone())
    }

    async fn list_media(&self) -> PortResult<Vec<AppMedia>> {
        self.read(Collection::Media)?;
        Ok(self.state.lock().unwrap().media.clone())
    }

    async fn insert_media(&self, media: &NewMedia) -> PortResult<AppMedia> {
        self.write(Collection::Media)?;
        let stored = AppMedia {
            id: Uuid::new_v4(),
            url: media.url.clone(),
            name: media.name.clone(),
            category: media.category,
            uploader_id: media.uploader_id.clone(),
            uploader_name: media.uploader_name.clone(),
            timestamp: media.timestamp,
            size: media.size.clone(),
        };
        self.state.lock().unwrap().media.push(stored.clone());
        Ok(stored)
    }

    async fn delete_media(&self, id: Uuid) -> PortResult<()> {
        self.write(Collection::Media)?;
        self.state.lock().unwrap().media.retain(|m| m.id != id);
        Ok(())
    }
}

//=========================================================================================
// Hasher and Advisory
//=========================================================================================

/// Reversible "hash" so tests can assert on what was stored.
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> PortResult<String> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash == format!("plain:{}", password)
    }
}

/// Answers every prompt with a fixed reply, or fails when `reply` is `None`.
pub struct ScriptedAdvisory {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<AdvisoryPrompt>>,
}

impl ScriptedAdvisory {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl AdvisoryService for ScriptedAdvisory {
    async fn generate(&self, prompt: &AdvisoryPrompt) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.reply
            .clone()
            .ok_or_else(|| PortError::Unexpected("provider unreachable".to_string()))
    }
}
