//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` and `ChangeFeed` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.
//!
//! Enumerations are stored as text and parsed back on read; nested log-book
//! parts (extra items, inspection, evidence) are JSONB columns.

use async_trait::async_trait;
use bitacora_core::domain::{
    AppMedia, AppNotification, Expense, ExpenseStatus, NewExpense, NewMedia, NewNotification,
    NewProfile, ProfileStatus, SessionContext, Trip, TripDetails, User, UserCredentials,
    UserRole,
};
use bitacora_core::logbook::{
    ComplianceFlags, DerivedTotals, ExpenseInputs, InspectionChecklist, LogBookEntry,
    LogBookForm, LogBookRecord, LogBookStatus, OtherExpense,
};
use bitacora_core::ports::{
    ChangeEvent, ChangeFeed, ChangeOperation, ChangeStream, Collection, DatabaseService,
    PortError, PortResult,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Row};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;

/// The channel the migration triggers publish row changes on.
pub const CHANGE_CHANNEL: &str = "fleet_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn conflict_or_unexpected(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            PortError::Conflict(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse<T: FromStr<Err = String>>(raw: &str) -> PortResult<T> {
    raw.parse::<T>().map_err(PortError::Unexpected)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PROFILE_COLUMNS: &str = "id, name, role, avatar, employee_id, email, phone, license_number, \
    license_type, license_expiry, emergency_contact, emergency_phone, blood_type, position, \
    hire_date, status";

#[derive(FromRow)]
struct ProfileRecord {
    id: String,
    name: String,
    role: String,
    avatar: Option<String>,
    employee_id: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    license_number: Option<String>,
    license_type: Option<String>,
    license_expiry: Option<String>,
    emergency_contact: Option<String>,
    emergency_phone: Option<String>,
    blood_type: Option<String>,
    position: Option<String>,
    hire_date: Option<String>,
    status: Option<String>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            role: parse::<UserRole>(&self.role)?,
            avatar: self.avatar.unwrap_or_default(),
            employee_id: self.employee_id,
            email: self.email,
            phone: self.phone,
            license_number: self.license_number,
            license_type: self.license_type,
            license_expiry: self.license_expiry,
            emergency_contact: self.emergency_contact,
            emergency_phone: self.emergency_phone,
            blood_type: self.blood_type,
            position: self.position,
            hire_date: self.hire_date,
            status: self.status.as_deref().map(parse::<ProfileStatus>).transpose()?,
        })
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: String,
    user_name: String,
    role: String,
}

#[derive(FromRow)]
struct TripRecord {
    id: Uuid,
    origin: String,
    destination: String,
    operator_id: String,
    operator_name: String,
    vehicle_id: String,
    start_date: String,
    status: String,
    ai_insights: Option<String>,
    client: String,
    project: String,
    appointment_time: String,
    arrival_time: String,
    street: String,
    number: String,
    neighborhood: String,
    zip: String,
    load_sheet_url: Option<String>,
    bill_of_lading_url: Option<String>,
    start_mileage: Option<f64>,
    end_mileage: Option<f64>,
    created_at: DateTime<Utc>,
}
impl TripRecord {
    fn to_domain(self) -> PortResult<Trip> {
        Ok(Trip {
            id: self.id,
            details: TripDetails {
                origin: self.origin,
                destination: self.destination,
                operator_id: self.operator_id,
                operator_name: self.operator_name,
                vehicle_id: self.vehicle_id,
                start_date: self.start_date,
                status: parse(&self.status)?,
                ai_insights: self.ai_insights,
                client: self.client,
                project: self.project,
                appointment_time: self.appointment_time,
                arrival_time: self.arrival_time,
                street: self.street,
                number: self.number,
                neighborhood: self.neighborhood,
                zip: self.zip,
                load_sheet_url: self.load_sheet_url,
                bill_of_lading_url: self.bill_of_lading_url,
                start_mileage: self.start_mileage,
                end_mileage: self.end_mileage,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct ExpenseRecord {
    id: Uuid,
    trip_id: String,
    operator_id: String,
    operator_name: String,
    category: String,
    amount: f64,
    date: String,
    description: String,
    status: String,
    unit_price: Option<f64>,
    diesel_liters: Option<f64>,
    odometer: Option<f64>,
    performance: Option<f64>,
    receipt_url: Option<String>,
}
impl ExpenseRecord {
    fn to_domain(self) -> PortResult<Expense> {
        Ok(Expense {
            id: self.id,
            trip_id: self.trip_id,
            operator_id: self.operator_id,
            operator_name: self.operator_name,
            category: parse(&self.category)?,
            amount: self.amount,
            date: self.date,
            description: self.description,
            status: parse(&self.status)?,
            unit_price: self.unit_price,
            diesel_liters: self.diesel_liters,
            odometer: self.odometer,
            performance: self.performance,
            receipt_url: self.receipt_url,
        })
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    from_id: String,
    from_name: String,
    to_id: String,
    message: String,
    #[sqlx(rename = "type")]
    kind: String,
    timestamp: DateTime<Utc>,
    trip_id: Option<String>,
    read: bool,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<AppNotification> {
        Ok(AppNotification {
            id: self.id,
            from_id: self.from_id,
            from_name: self.from_name,
            to_id: self.to_id,
            message: self.message,
            kind: parse(&self.kind)?,
            timestamp: self.timestamp,
            trip_id: self.trip_id,
            read: self.read,
        })
    }
}

#[derive(FromRow)]
struct MediaRecord {
    id: Uuid,
    url: String,
    name: String,
    category: String,
    uploader_id: String,
    uploader_name: String,
    timestamp: DateTime<Utc>,
    size: Option<String>,
}
impl MediaRecord {
    fn to_domain(self) -> PortResult<AppMedia> {
        Ok(AppMedia {
            id: self.id,
            url: self.url,
            name: self.name,
            category: parse(&self.category)?,
            uploader_id: self.uploader_id,
            uploader_name: self.uploader_name,
            timestamp: self.timestamp,
            size: self.size,
        })
    }
}

/// Every writable log-book column, in bind order.
const LOGBOOK_COLUMNS: [&str; 35] = [
    "trip_num",
    "departure_date",
    "doc_delivery_date",
    "log_delivery_date",
    "unit_eco",
    "client",
    "destinations",
    "operator_id",
    "operator_name",
    "odo_initial",
    "total_distance",
    "odo_final",
    "fuel_card_liters",
    "fuel_card_amount",
    "tolls_tag_amount",
    "fuel_cash_amount",
    "tolls_cash_amount",
    "food_amount",
    "repairs_amount",
    "maneuvers_amount",
    "subtotal_electronic",
    "subtotal_cash",
    "total_expenses",
    "other_expenses",
    "inspection",
    "eval_fuel_compliance",
    "eval_docs_compliance",
    "presented_at_load",
    "on_time_route",
    "discipline_evidence",
    "final_compliance",
    "signature",
    "evidence_urls",
    "status",
    "timestamp",
];

fn logbook_insert_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let cols = &LOGBOOK_COLUMNS;
        let params: Vec<String> = (1..=cols.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO bitacora_registros ({}) VALUES ({}) RETURNING *",
            cols.join(", "),
            params.join(", ")
        )
    })
}

fn logbook_update_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let sets: Vec<String> = LOGBOOK_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", c, i + 2))
            .collect();
        // The last parameter guards against a status change since the read.
        format!(
            "UPDATE bitacora_registros SET {} WHERE id = $1 AND status = ${} RETURNING *",
            sets.join(", "),
            LOGBOOK_COLUMNS.len() + 2
        )
    })
}

#[derive(FromRow)]
struct LogBookRow {
    id: Uuid,
    trip_num: String,
    departure_date: Option<String>,
    doc_delivery_date: Option<String>,
    log_delivery_date: Option<String>,
    unit_eco: String,
    client: String,
    destinations: String,
    operator_id: Option<String>,
    operator_name: String,
    odo_initial: f64,
    total_distance: f64,
    odo_final: f64,
    fuel_card_liters: f64,
    fuel_card_amount: f64,
    tolls_tag_amount: f64,
    fuel_cash_amount: f64,
    tolls_cash_amount: f64,
    food_amount: f64,
    repairs_amount: f64,
    maneuvers_amount: f64,
    subtotal_electronic: f64,
    subtotal_cash: f64,
    total_expenses: f64,
    other_expenses: Json<Vec<OtherExpense>>,
    inspection: Json<InspectionChecklist>,
    eval_fuel_compliance: bool,
    eval_docs_compliance: bool,
    presented_at_load: bool,
    on_time_route: bool,
    discipline_evidence: bool,
    final_compliance: bool,
    signature: Option<String>,
    evidence_urls: Json<Vec<String>>,
    status: String,
    timestamp: DateTime<Utc>,
}
impl LogBookRow {
    fn to_domain(self) -> PortResult<LogBookEntry> {
        let form = LogBookForm {
            trip_num: self.trip_num,
            departure_date: self.departure_date,
            doc_delivery_date: self.doc_delivery_date,
            log_delivery_date: self.log_delivery_date,
            unit_eco: self.unit_eco,
            client: self.client,
            destinations: self.destinations,
            operator_id: self.operator_id,
            operator_name: self.operator_name,
            odo_initial: self.odo_initial,
            total_distance: self.total_distance,
            expenses: ExpenseInputs {
                fuel_card_liters: self.fuel_card_liters,
                fuel_card_amount: self.fuel_card_amount,
                tolls_tag_amount: self.tolls_tag_amount,
                fuel_cash_amount: self.fuel_cash_amount,
                tolls_cash_amount: self.tolls_cash_amount,
                food_amount: self.food_amount,
                repairs_amount: self.repairs_amount,
                maneuvers_amount: self.maneuvers_amount,
            },
            other_expenses: self.other_expenses.0,
            inspection: self.inspection.0,
            compliance: ComplianceFlags {
                eval_fuel_compliance: self.eval_fuel_compliance,
                eval_docs_compliance: self.eval_docs_compliance,
                presented_at_load: self.presented_at_load,
                on_time_route: self.on_time_route,
                discipline_evidence: self.discipline_evidence,
                final_compliance: self.final_compliance,
            },
            signature: self.signature,
            evidence_urls: self.evidence_urls.0,
        };
        Ok(LogBookEntry {
            id: self.id,
            record: LogBookRecord {
                form,
                odo_final: self.odo_final,
                totals: DerivedTotals {
                    subtotal_electronic: self.subtotal_electronic,
                    subtotal_cash: self.subtotal_cash,
                    total_expenses: self.total_expenses,
                },
                status: parse(&self.status)?,
                timestamp: self.timestamp,
            },
        })
    }
}

type LogBookQuery<'q> =
    sqlx::query::QueryAs<'q, sqlx::Postgres, LogBookRow, sqlx::postgres::PgArguments>;

/// Binds the record in [`LOGBOOK_COLUMNS`] order.
fn bind_logbook<'q>(query: LogBookQuery<'q>, r: &'q LogBookRecord) -> LogBookQuery<'q> {
    let f = &r.form;
    let e = &f.expenses;
    let c = &f.compliance;
    query
        .bind(&f.trip_num)
        .bind(&f.departure_date)
        .bind(&f.doc_delivery_date)
        .bind(&f.log_delivery_date)
        .bind(&f.unit_eco)
        .bind(&f.client)
        .bind(&f.destinations)
        .bind(&f.operator_id)
        .bind(&f.operator_name)
        .bind(f.odo_initial)
        .bind(f.total_distance)
        .bind(r.odo_final)
        .bind(e.fuel_card_liters)
        .bind(e.fuel_card_amount)
        .bind(e.tolls_tag_amount)
        .bind(e.fuel_cash_amount)
        .bind(e.tolls_cash_amount)
        .bind(e.food_amount)
        .bind(e.repairs_amount)
        .bind(e.maneuvers_amount)
        .bind(r.totals.subtotal_electronic)
        .bind(r.totals.subtotal_cash)
        .bind(r.totals.total_expenses)
        .bind(Json(&f.other_expenses))
        .bind(Json(&f.inspection))
        .bind(c.eval_fuel_compliance)
        .bind(c.eval_docs_compliance)
        .bind(c.presented_at_load)
        .bind(c.on_time_route)
        .bind(c.discipline_evidence)
        .bind(c.final_compliance)
        .bind(&f.signature)
        .bind(Json(&f.evidence_urls))
        .bind(r.status.as_str())
        .bind(r.timestamp)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Profiles ---

    async fn list_profiles(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles ORDER BY name ASC",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_profile(&self, id: &str) -> PortResult<User> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Profile {} not found", id)))?
        .to_domain()
    }

    async fn get_profile_by_employee_id(&self, employee_id: &str) -> PortResult<Option<User>> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {} FROM profiles WHERE employee_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(|r| r.to_domain())
        .transpose()
    }

    async fn get_credentials_by_employee_id(
        &self,
        employee_id: &str,
    ) -> PortResult<Option<UserCredentials>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {}, password_hash FROM profiles WHERE employee_id = $1",
            PROFILE_COLUMNS
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let password_hash: Option<String> = row.try_get("password_hash").map_err(unexpected)?;
        let user = ProfileRecord::from_row(&row).map_err(unexpected)?.to_domain()?;
        Ok(Some(UserCredentials {
            user,
            password_hash: password_hash.unwrap_or_default(),
        }))
    }

    async fn create_profile(&self, profile: &NewProfile, password_hash: &str) -> PortResult<User> {
        let role = profile.role.unwrap_or(UserRole::Operator);
        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "INSERT INTO profiles (id, name, role, avatar, employee_id, email, phone, license_number, \
             license_type, license_expiry, emergency_contact, emergency_phone, blood_type, position, \
             hire_date, status, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&profile.name)
        .bind(role.as_str())
        .bind(&profile.avatar)
        .bind(&profile.employee_id)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.license_number)
        .bind(&profile.license_type)
        .bind(&profile.license_expiry)
        .bind(&profile.emergency_contact)
        .bind(&profile.emergency_phone)
        .bind(&profile.blood_type)
        .bind(&profile.position)
        .bind(&profile.hire_date)
        .bind(ProfileStatus::Active.as_str())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or_unexpected)?;
        info!("Created profile for employee {}", profile.employee_id);
        record.to_domain()
    }

    async fn set_profile_status(&self, id: &str, status: ProfileStatus) -> PortResult<User> {
        sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET status = $2 WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Profile {} not found", id)))?
        .to_domain()
    }

    async fn delete_profile(&self, id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        ctx: &SessionContext,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO auth_sessions (id, user_id, user_name, role, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session_id)
        .bind(&ctx.user_id)
        .bind(&ctx.user_name)
        .bind(ctx.role.as_str())
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<SessionContext> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, user_name, role FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        Ok(SessionContext {
            user_id: record.user_id,
            user_name: record.user_name,
            role: parse(&record.role)?,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Log-books ---

    async fn list_logbooks(&self) -> PortResult<Vec<LogBookEntry>> {
        let rows = sqlx::query_as::<_, LogBookRow>(
            "SELECT * FROM bitacora_registros ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        rows.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_logbook(&self, id: Uuid) -> PortResult<LogBookEntry> {
        sqlx::query_as::<_, LogBookRow>("SELECT * FROM bitacora_registros WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Log-book {} not found", id)))?
            .to_domain()
    }

    async fn insert_logbook(&self, record: &LogBookRecord) -> PortResult<LogBookEntry> {
        let query = sqlx::query_as::<_, LogBookRow>(logbook_insert_sql());
        bind_logbook(query, record)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?
            .to_domain()
    }

    async fn update_logbook(
        &self,
        id: Uuid,
        expected: LogBookStatus,
        record: &LogBookRecord,
    ) -> PortResult<LogBookEntry> {
        let query = sqlx::query_as::<_, LogBookRow>(logbook_update_sql()).bind(id);
        let row = bind_logbook(query, record)
            .bind(expected.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match row {
            Some(row) => row.to_domain(),
            None => {
                // Either gone, or someone else moved it first.
                let current = self.get_logbook(id).await?;
                Err(PortError::Conflict(format!(
                    "Log-book {} is already {}",
                    id,
                    current.status()
                )))
            }
        }
    }

    async fn delete_logbook(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM bitacora_registros WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Notifications ---

    async fn list_notifications(&self) -> PortResult<Vec<AppNotification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, from_id, from_name, to_id, message, type, timestamp, trip_id, read \
             FROM notifications ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> PortResult<AppNotification> {
        sqlx::query_as::<_, NotificationRecord>(
            "INSERT INTO notifications (from_id, from_name, to_id, message, type, timestamp, trip_id, read) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE) \
             RETURNING id, from_id, from_name, to_id, message, type, timestamp, trip_id, read",
        )
        .bind(&notification.from_id)
        .bind(&notification.from_name)
        .bind(&notification.to_id)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.timestamp)
        .bind(&notification.trip_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn mark_notification_read(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    // --- Trips ---

    async fn list_trips(&self) -> PortResult<Vec<Trip>> {
        let records = sqlx::query_as::<_, TripRecord>("SELECT * FROM trips ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_trip(&self, trip: &TripDetails) -> PortResult<Trip> {
        sqlx::query_as::<_, TripRecord>(
            "INSERT INTO trips (origin, destination, operator_id, operator_name, vehicle_id, start_date, \
             status, ai_insights, client, project, appointment_time, arrival_time, street, number, \
             neighborhood, zip, load_sheet_url, bill_of_lading_url, start_mileage, end_mileage) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) \
             RETURNING *",
        )
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(&trip.operator_id)
        .bind(&trip.operator_name)
        .bind(&trip.vehicle_id)
        .bind(&trip.start_date)
        .bind(trip.status.as_str())
        .bind(&trip.ai_insights)
        .bind(&trip.client)
        .bind(&trip.project)
        .bind(&trip.appointment_time)
        .bind(&trip.arrival_time)
        .bind(&trip.street)
        .bind(&trip.number)
        .bind(&trip.neighborhood)
        .bind(&trip.zip)
        .bind(&trip.load_sheet_url)
        .bind(&trip.bill_of_lading_url)
        .bind(trip.start_mileage)
        .bind(trip.end_mileage)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn update_trip(&self, id: Uuid, trip: &TripDetails) -> PortResult<Trip> {
        sqlx::query_as::<_, TripRecord>(
            "UPDATE trips SET origin = $2, destination = $3, operator_id = $4, operator_name = $5, \
             vehicle_id = $6, start_date = $7, status = $8, ai_insights = $9, client = $10, project = $11, \
             appointment_time = $12, arrival_time = $13, street = $14, number = $15, neighborhood = $16, \
             zip = $17, load_sheet_url = $18, bill_of_lading_url = $19, start_mileage = $20, end_mileage = $21 \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(&trip.operator_id)
        .bind(&trip.operator_name)
        .bind(&trip.vehicle_id)
        .bind(&trip.start_date)
        .bind(trip.status.as_str())
        .bind(&trip.ai_insights)
        .bind(&trip.client)
        .bind(&trip.project)
        .bind(&trip.appointment_time)
        .bind(&trip.arrival_time)
        .bind(&trip.street)
        .bind(&trip.number)
        .bind(&trip.neighborhood)
        .bind(&trip.zip)
        .bind(&trip.load_sheet_url)
        .bind(&trip.bill_of_lading_url)
        .bind(trip.start_mileage)
        .bind(trip.end_mileage)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Trip {} not found", id)))?
        .to_domain()
    }

    async fn delete_trip(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Expenses ---

    async fn list_expenses(&self) -> PortResult<Vec<Expense>> {
        let records =
            sqlx::query_as::<_, ExpenseRecord>("SELECT * FROM expenses ORDER BY date DESC, created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_expense(&self, id: Uuid) -> PortResult<Expense> {
        sqlx::query_as::<_, ExpenseRecord>("SELECT * FROM expenses WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Expense {} not found", id)))?
            .to_domain()
    }

    async fn insert_expense(&self, expense: &NewExpense) -> PortResult<Expense> {
        sqlx::query_as::<_, ExpenseRecord>(
            "INSERT INTO expenses (trip_id, operator_id, operator_name, category, amount, date, \
             description, status, unit_price, diesel_liters, odometer, performance, receipt_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING *",
        )
        .bind(&expense.trip_id)
        .bind(&expense.operator_id)
        .bind(&expense.operator_name)
        .bind(expense.category.as_str())
        .bind(expense.amount)
        .bind(&expense.date)
        .bind(&expense.description)
        .bind(ExpenseStatus::Pending.as_str())
        .bind(expense.unit_price)
        .bind(expense.diesel_liters)
        .bind(expense.odometer)
        .bind(expense.performance)
        .bind(&expense.receipt_url)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn set_expense_status(&self, id: Uuid, status: ExpenseStatus) -> PortResult<Expense> {
        sqlx::query_as::<_, ExpenseRecord>(
            "UPDATE expenses SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Expense {} not found", id)))?
        .to_domain()
    }

    // --- Media ---

    async fn list_media(&self) -> PortResult<Vec<AppMedia>> {
        let records = sqlx::query_as::<_, MediaRecord>(
            "SELECT id, url, name, category, uploader_id, uploader_name, timestamp, size \
             FROM media_assets ORDER BY timestamp DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_media(&self, media: &NewMedia) -> PortResult<AppMedia> {
        sqlx::query_as::<_, MediaRecord>(
            "INSERT INTO media_assets (url, name, category, uploader_id, uploader_name, timestamp, size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, url, name, category, uploader_id, uploader_name, timestamp, size",
        )
        .bind(&media.url)
        .bind(&media.name)
        .bind(media.category.as_str())
        .bind(&media.uploader_id)
        .bind(&media.uploader_name)
        .bind(media.timestamp)
        .bind(&media.size)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?
        .to_domain()
    }

    async fn delete_media(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `ChangeFeed` Trait Implementation
//=========================================================================================

/// The payload the notify trigger publishes.
#[derive(Deserialize)]
struct ChangePayload {
    table: String,
    op: String,
}

pub(crate) fn parse_change(payload: &str) -> Option<ChangeEvent> {
    let payload: ChangePayload = serde_json::from_str(payload).ok()?;
    Some(ChangeEvent {
        collection: Collection::from_table_name(&payload.table)?,
        operation: ChangeOperation::parse(&payload.op)?,
    })
}

#[async_trait]
impl ChangeFeed for DbAdapter {
    async fn subscribe(&self) -> PortResult<ChangeStream> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unexpected)?;
        listener.listen(CHANGE_CHANNEL).await.map_err(unexpected)?;
        info!("Listening for row changes on channel '{}'", CHANGE_CHANNEL);

        let stream = listener.into_stream().filter_map(|item| async move {
            match item {
                Ok(notification) => match parse_change(notification.payload()) {
                    Some(event) => Some(Ok(event)),
                    None => {
                        warn!("Ignoring malformed change payload: {}", notification.payload());
                        None
                    }
                },
                Err(e) => Some(Err(unexpected(e))),
            }
        });
        Ok(Box::pin(stream))
    }
}
