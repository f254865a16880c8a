//! crates/bitacora_core/src/domain.rs
//!
//! Defines the plain records of the fleet application: users and their
//! profiles, trips, expenses, notifications and media assets.
//! The log-book entry lives in its own module because it carries lifecycle logic.
//!
//! Plain records serialize with camelCase keys (`employeeId`, `fromId`, ...);
//! the database adapter maps them to snake_case columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Pseudo recipient for notifications addressed to every administrator.
pub const ADMIN_RECIPIENT: &str = "ADMIN";

/// Pseudo recipient for notifications any operator may see.
pub const ALL_OPERATORS_RECIPIENT: &str = "OPERATORS_ALL";

//=========================================================================================
// Users and Session Context
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Admin,
    Operator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Operator => "OPERATOR",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "OPERATOR" => Ok(UserRole::Operator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    #[default]
    Active,
    Paused,
    Offline,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Active => "active",
            ProfileStatus::Paused => "paused",
            ProfileStatus::Offline => "offline",
        }
    }

    /// Active operators get paused; anything else becomes active again.
    pub fn toggled(self) -> Self {
        match self {
            ProfileStatus::Active => ProfileStatus::Paused,
            _ => ProfileStatus::Active,
        }
    }
}

impl FromStr for ProfileStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProfileStatus::Active),
            "paused" => Ok(ProfileStatus::Paused),
            "offline" => Ok(ProfileStatus::Offline),
            other => Err(format!("unknown profile status '{}'", other)),
        }
    }
}

/// A user of the application. Operators and administrators share the same
/// profile record; the role decides what they may do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: UserRole,
    pub avatar: String,
    pub employee_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<String>,
    pub license_expiry: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    pub blood_type: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<String>,
    pub status: Option<ProfileStatus>,
}

impl User {
    /// A user that only exists in memory, used for master credentials that
    /// have no stored profile.
    pub fn synthetic(id: String, name: String, role: UserRole, employee_id: &str) -> Self {
        Self {
            id,
            name,
            role,
            avatar: avatar_url(employee_id),
            employee_id: Some(employee_id.to_string()),
            email: None,
            phone: None,
            license_number: None,
            license_type: None,
            license_expiry: None,
            emergency_contact: None,
            emergency_phone: None,
            blood_type: None,
            position: None,
            hire_date: None,
            status: Some(ProfileStatus::Active),
        }
    }
}

pub fn avatar_url(seed: &str) -> String {
    format!("https://i.pravatar.cc/150?u={}", seed)
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Fields accepted when creating a profile, either by self-registration or
/// by an administrator adding an operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewProfile {
    pub name: String,
    pub role: Option<UserRole>,
    pub employee_id: String,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub license_number: Option<String>,
    pub license_type: Option<String>,
    pub license_expiry: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
    pub blood_type: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<String>,
}

/// The explicit identity passed to every service call once a request has
/// been authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub user_name: String,
    pub role: UserRole,
}

impl SessionContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for SessionContext {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            role: user.role,
        }
    }
}

//=========================================================================================
// Trips
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Scheduled => "scheduled",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TripStatus::Scheduled),
            "in_progress" => Ok(TripStatus::InProgress),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(format!("unknown trip status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: TripDetails,
    pub created_at: DateTime<Utc>,
}

/// The editable part of a trip, used for both creation and full updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TripDetails {
    pub origin: String,
    pub destination: String,
    pub operator_id: String,
    pub operator_name: String,
    pub vehicle_id: String,
    pub start_date: String,
    pub status: TripStatus,
    pub ai_insights: Option<String>,
    pub client: String,
    pub project: String,
    pub appointment_time: String,
    pub arrival_time: String,
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub zip: String,
    pub load_sheet_url: Option<String>,
    pub bill_of_lading_url: Option<String>,
    pub start_mileage: Option<f64>,
    pub end_mileage: Option<f64>,
}

impl TripDetails {
    /// The single-line address handed to the address advisory.
    pub fn address_line(&self) -> String {
        format!(
            "{} {}, {}, CP {}",
            self.street.trim(),
            self.number.trim(),
            self.neighborhood.trim(),
            self.zip.trim()
        )
    }
}

//=========================================================================================
// Expenses
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Fuel,
    Food,
    Tolls,
    Maintenance,
    Others,
    Maniobras,
    Claves,
}

impl ExpenseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::Fuel => "fuel",
            ExpenseCategory::Food => "food",
            ExpenseCategory::Tolls => "tolls",
            ExpenseCategory::Maintenance => "maintenance",
            ExpenseCategory::Others => "others",
            ExpenseCategory::Maniobras => "maniobras",
            ExpenseCategory::Claves => "claves",
        }
    }
}

impl FromStr for ExpenseCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fuel" => Ok(ExpenseCategory::Fuel),
            "food" => Ok(ExpenseCategory::Food),
            "tolls" => Ok(ExpenseCategory::Tolls),
            "maintenance" => Ok(ExpenseCategory::Maintenance),
            "others" => Ok(ExpenseCategory::Others),
            "maniobras" => Ok(ExpenseCategory::Maniobras),
            "claves" => Ok(ExpenseCategory::Claves),
            other => Err(format!("unknown expense category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseStatus::Pending => "pending",
            ExpenseStatus::Approved => "approved",
            ExpenseStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ExpenseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExpenseStatus::Pending),
            "approved" => Ok(ExpenseStatus::Approved),
            "rejected" => Ok(ExpenseStatus::Rejected),
            other => Err(format!("unknown expense status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub trip_id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: String,
    pub description: String,
    pub status: ExpenseStatus,
    pub unit_price: Option<f64>,
    pub diesel_liters: Option<f64>,
    pub odometer: Option<f64>,
    pub performance: Option<f64>,
    pub receipt_url: Option<String>,
}

/// An expense ready to be written. Operator and performance are filled in by
/// the service, never taken from the request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub trip_id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub category: ExpenseCategory,
    pub amount: f64,
    pub date: String,
    pub description: String,
    pub unit_price: Option<f64>,
    pub diesel_liters: Option<f64>,
    pub odometer: Option<f64>,
    pub performance: Option<f64>,
    pub receipt_url: Option<String>,
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Alert,
    Success,
    Request,
    ExpenseUpdate,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Alert => "alert",
            NotificationKind::Success => "success",
            NotificationKind::Request => "request",
            NotificationKind::ExpenseUpdate => "expense_update",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationKind::Info),
            "alert" => Ok(NotificationKind::Alert),
            "success" => Ok(NotificationKind::Success),
            "request" => Ok(NotificationKind::Request),
            "expense_update" => Ok(NotificationKind::ExpenseUpdate),
            other => Err(format!("unknown notification type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppNotification {
    pub id: Uuid,
    pub from_id: String,
    pub from_name: String,
    /// A user id, [`ADMIN_RECIPIENT`] or [`ALL_OPERATORS_RECIPIENT`].
    pub to_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub trip_id: Option<String>,
    pub read: bool,
}

impl AppNotification {
    /// Admins see what is addressed to `ADMIN` plus what they sent; operators
    /// see what is addressed to them or to every operator, plus what they sent.
    pub fn visible_to(&self, ctx: &SessionContext) -> bool {
        if self.from_id == ctx.user_id {
            return true;
        }
        if ctx.is_admin() {
            self.to_id == ADMIN_RECIPIENT
        } else {
            self.to_id == ctx.user_id || self.to_id == ALL_OPERATORS_RECIPIENT
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub from_id: String,
    pub from_name: String,
    pub to_id: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
    pub trip_id: Option<String>,
}

impl NewNotification {
    pub fn from_session(
        ctx: &SessionContext,
        to_id: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            from_id: ctx.user_id.clone(),
            from_name: ctx.user_name.clone(),
            to_id: to_id.into(),
            message: message.into(),
            kind,
            timestamp: Utc::now(),
            trip_id: None,
        }
    }
}

//=========================================================================================
// Media Assets
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    #[default]
    Evidencia,
    Unidad,
    Documento,
    Otros,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Evidencia => "evidencia",
            MediaCategory::Unidad => "unidad",
            MediaCategory::Documento => "documento",
            MediaCategory::Otros => "otros",
        }
    }
}

impl FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evidencia" => Ok(MediaCategory::Evidencia),
            "unidad" => Ok(MediaCategory::Unidad),
            "documento" => Ok(MediaCategory::Documento),
            "otros" => Ok(MediaCategory::Otros),
            other => Err(format!("unknown media category '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMedia {
    pub id: Uuid,
    /// A base64 data URL.
    pub url: String,
    pub name: String,
    pub category: MediaCategory,
    pub uploader_id: String,
    pub uploader_name: String,
    pub timestamp: DateTime<Utc>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub url: String,
    pub name: String,
    pub category: MediaCategory,
    pub uploader_id: String,
    pub uploader_name: String,
    pub timestamp: DateTime<Utc>,
    pub size: Option<String>,
}
