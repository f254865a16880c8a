//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every successful write publishes a change event so connected WebSocket
//! sessions re-fetch their snapshot.

use crate::error::HttpError;
use crate::web::protocol::ServerMessage;
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use bitacora_core::advisory::AddressCheck;
use bitacora_core::attachments::MediaUpload;
use bitacora_core::domain::{ExpenseStatus, NewProfile, SessionContext, TripDetails};
use bitacora_core::expense::{ExpenseSubmission, FuelField, FuelInputs};
use bitacora_core::export::{
    expense_document, expenses_sheet, logbook_document, logbooks_sheet, PrintDocument, Sheet,
};
use bitacora_core::fleet::{FleetError, OutgoingMessage, ValidationError};
use bitacora_core::logbook::LogBookForm;
use bitacora_core::ports::{ChangeOperation, Collection, PortError};
use bitacora_core::sync::{fetch_all, fetch_visible, Snapshot};
use bitacora_core::trip::validate_address;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::login_handler,
        crate::web::auth::register_handler,
        crate::web::auth::logout_handler,
        sync_handler,
        list_logbooks_handler,
        create_logbook_handler,
        get_logbook_handler,
        update_logbook_handler,
        claim_logbook_handler,
        submit_logbook_handler,
        finalize_logbook_handler,
        delete_logbook_handler,
        logbook_document_handler,
        export_logbooks_handler,
        list_expenses_handler,
        submit_expense_handler,
        review_expense_handler,
        fuel_calc_handler,
        export_expenses_handler,
        expense_document_handler,
        list_trips_handler,
        create_trip_handler,
        update_trip_handler,
        delete_trip_handler,
        list_notifications_handler,
        send_notification_handler,
        mark_read_handler,
        list_profiles_handler,
        add_operator_handler,
        delete_profile_handler,
        toggle_profile_handler,
        list_media_handler,
        upload_media_handler,
        delete_media_handler,
        trip_insights_handler,
        address_check_handler,
        fleet_summary_handler,
        expense_audit_handler,
    ),
    components(
        schemas(
            crate::web::auth::LoginRequest,
            crate::web::auth::RegisterRequest,
            crate::web::auth::AuthResponse,
            ReviewRequest,
            FuelCalcRequest,
            RouteRequest,
            AdvisoryText,
        )
    ),
    tags(
        (name = "Fleet Log-Book API", description = "Log-books, expenses, trips, messages and media for the fleet.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The admin's verdict on a pending expense.
#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// `approved` or `rejected`.
    #[schema(value_type = String)]
    pub status: ExpenseStatus,
}

/// One edit to the fuel inputs of an expense form.
#[derive(Deserialize, ToSchema)]
pub struct FuelCalcRequest {
    #[schema(value_type = Object)]
    pub inputs: FuelInputs,
    /// `amount`, `liters` or `unitPrice`.
    #[schema(value_type = String)]
    pub field: FuelField,
    pub value: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RouteRequest {
    pub origin: String,
    pub destination: String,
}

#[derive(Serialize, ToSchema)]
pub struct AdvisoryText {
    pub text: String,
}

fn require_admin(ctx: &SessionContext) -> Result<(), HttpError> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(HttpError::new(
            StatusCode::FORBIDDEN,
            "Solo los administradores pueden realizar esta acción",
        ))
    }
}

const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn download(content_type: &str, filename: String, body: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

fn sheet_download(filename: &str, sheet: Sheet) -> Result<impl IntoResponse, HttpError> {
    let filename = format!("{}_{}.xlsx", filename, Utc::now().format("%Y-%m-%d"));
    Ok(download(XLSX, filename, sheet.to_xlsx()?))
}

fn pdf_download(document: PrintDocument) -> Result<impl IntoResponse, HttpError> {
    let body = document.to_pdf()?;
    Ok(download("application/pdf", document.filename, body))
}

//=========================================================================================
// Synchronization
//=========================================================================================

/// Everything the caller may see, with per-collection failures.
#[utoipa::path(
    get,
    path = "/sync",
    responses(
        (status = 200, description = "Visible snapshot, dashboard stats and failed collections"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> impl IntoResponse {
    let outcome = fetch_visible(state.db.as_ref(), &ctx).await;
    Json(ServerMessage::snapshot(outcome, &ctx))
}

//=========================================================================================
// Log-books
//=========================================================================================

#[utoipa::path(
    get,
    path = "/logbooks",
    responses((status = 200, description = "Log-books visible to the caller"))
)]
pub async fn list_logbooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let logbooks = state.db.list_logbooks().await?;
    // Narrowed with the same rules the snapshot uses.
    let snapshot = Snapshot {
        logbooks,
        ..Default::default()
    }
    .visible_to(&ctx);
    Ok(Json(snapshot.logbooks))
}

/// Launch a new log-book (admin).
#[utoipa::path(
    post,
    path = "/logbooks",
    request_body(content = Object, description = "The log-book form"),
    responses(
        (status = 201, description = "Created in status pending"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 502, description = "The database rejected the write")
    )
)]
pub async fn create_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(form): Json<LogBookForm>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.workflow.create(&ctx, &form).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Insert);
    state.publish(Collection::Notifications, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    get,
    path = "/logbooks/{id}",
    params(("id" = Uuid, Path, description = "Log-book id")),
    responses(
        (status = 200, description = "The log-book"),
        (status = 404, description = "Unknown or not visible")
    )
)]
pub async fn get_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(state.workflow.get(&ctx, id).await?))
}

/// Edit a log-book without changing its status (admin).
#[utoipa::path(
    put,
    path = "/logbooks/{id}",
    params(("id" = Uuid, Path, description = "Log-book id")),
    request_body(content = Object, description = "The full log-book form"),
    responses(
        (status = 200, description = "Saved with recomputed totals"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "The log-book is completed and read-only")
    )
)]
pub async fn update_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(form): Json<LogBookForm>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.workflow.update(&ctx, id, &form).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Update);
    Ok(Json(entry))
}

/// Accept a pending log-book (operator).
#[utoipa::path(
    post,
    path = "/logbooks/{id}/claim",
    params(("id" = Uuid, Path, description = "Log-book id")),
    responses(
        (status = 200, description = "Now approved and assigned to the caller"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn claim_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.workflow.claim(&ctx, id).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Update);
    Ok(Json(entry))
}

/// Submit a signed, filled-in log-book (operator).
#[utoipa::path(
    post,
    path = "/logbooks/{id}/submit",
    params(("id" = Uuid, Path, description = "Log-book id")),
    request_body(content = Object, description = "The filled-in form, including the signature"),
    responses(
        (status = 200, description = "Completed"),
        (status = 422, description = "Missing or invalid signature; nothing was saved"),
        (status = 409, description = "Not in progress")
    )
)]
pub async fn submit_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(form): Json<LogBookForm>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.workflow.submit(&ctx, id, &form).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Update);
    state.publish(Collection::Notifications, ChangeOperation::Insert);
    Ok(Json(entry))
}

/// Close a log-book directly (admin). An optional form body is saved along
/// with it; no signature is needed.
#[utoipa::path(
    post,
    path = "/logbooks/{id}/finalize",
    params(("id" = Uuid, Path, description = "Log-book id")),
    request_body(content = Object, description = "Optional edited form"),
    responses(
        (status = 200, description = "Completed"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 409, description = "Already completed")
    )
)]
pub async fn finalize_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let form: Option<LogBookForm> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(serde_json::from_slice(&body).map_err(|e| {
            HttpError::new(StatusCode::UNPROCESSABLE_ENTITY, format!("Formulario inválido: {}", e))
        })?)
    };
    let entry = state.workflow.finalize(&ctx, id, form.as_ref()).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Update);
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/logbooks/{id}",
    params(("id" = Uuid, Path, description = "Log-book id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn delete_logbook_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.workflow.delete(&ctx, id).await?;
    state.publish(Collection::LogBooks, ChangeOperation::Delete);
    Ok(StatusCode::NO_CONTENT)
}

/// Printable document of one log-book.
#[utoipa::path(
    get,
    path = "/logbooks/{id}/document",
    params(("id" = Uuid, Path, description = "Log-book id")),
    responses((status = 200, description = "Paginated PDF", content_type = "application/pdf", body = Vec<u8>))
)]
pub async fn logbook_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state.workflow.get(&ctx, id).await?;
    pdf_download(logbook_document(&entry))
}

/// Spreadsheet of the completed log-books the caller can see.
#[utoipa::path(
    get,
    path = "/logbooks/export",
    responses((status = 200, description = "XLSX workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", body = Vec<u8>))
)]
pub async fn export_logbooks_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let logbooks = state.db.list_logbooks().await?;
    let snapshot = Snapshot {
        logbooks,
        ..Default::default()
    }
    .visible_to(&ctx);
    let completed = snapshot.completed_logbooks();
    info!("Exporting {} completed log-books for {}", completed.len(), ctx.user_id);
    sheet_download("Reporte_Bitacoras", logbooks_sheet(&completed))
}

//=========================================================================================
// Expenses
//=========================================================================================

#[utoipa::path(
    get,
    path = "/expenses",
    responses((status = 200, description = "All expenses for admins, own expenses for operators"))
)]
pub async fn list_expenses_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let expenses = state.db.list_expenses().await?;
    let snapshot = Snapshot {
        expenses,
        ..Default::default()
    }
    .visible_to(&ctx);
    Ok(Json(snapshot.expenses))
}

#[utoipa::path(
    post,
    path = "/expenses",
    request_body(content = Object, description = "The expense; performance is computed server-side"),
    responses(
        (status = 201, description = "Recorded as pending"),
        (status = 422, description = "Missing category, date or a non-positive amount")
    )
)]
pub async fn submit_expense_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(submission): Json<ExpenseSubmission>,
) -> Result<impl IntoResponse, HttpError> {
    let expense = state.fleet.submit_expense(&ctx, submission).await?;
    state.publish(Collection::Expenses, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(expense)))
}

#[utoipa::path(
    put,
    path = "/expenses/{id}/status",
    params(("id" = Uuid, Path, description = "Expense id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Reviewed; the operator is notified"),
        (status = 403, description = "Caller is not an administrator"),
        (status = 422, description = "Already reviewed or not a final status")
    )
)]
pub async fn review_expense_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let expense = state.fleet.review_expense(&ctx, id, req.status).await?;
    state.publish(Collection::Expenses, ChangeOperation::Update);
    state.publish(Collection::Notifications, ChangeOperation::Insert);
    Ok(Json(expense))
}

/// Applies one edit to the fuel inputs and returns the recomputed inputs.
#[utoipa::path(
    post,
    path = "/expenses/fuel-calc",
    request_body = FuelCalcRequest,
    responses((status = 200, description = "The inputs after the edit"))
)]
pub async fn fuel_calc_handler(Json(req): Json<FuelCalcRequest>) -> impl IntoResponse {
    Json(req.inputs.edit(req.field, &req.value))
}

#[utoipa::path(
    get,
    path = "/expenses/export",
    responses((status = 200, description = "XLSX workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", body = Vec<u8>))
)]
pub async fn export_expenses_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let expenses = state.db.list_expenses().await?;
    let snapshot = Snapshot {
        expenses,
        ..Default::default()
    }
    .visible_to(&ctx);
    sheet_download("Reporte_Gastos", expenses_sheet(&snapshot.expenses))
}

#[utoipa::path(
    get,
    path = "/expenses/{id}/document",
    params(("id" = Uuid, Path, description = "Expense id")),
    responses(
        (status = 200, description = "Paginated PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Unknown or not visible")
    )
)]
pub async fn expense_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let expense = state.db.get_expense(id).await?;
    if !ctx.is_admin() && expense.operator_id != ctx.user_id {
        return Err(PortError::NotFound(format!("Expense {} not found", id)).into());
    }
    pdf_download(expense_document(&expense))
}

//=========================================================================================
// Trips
//=========================================================================================

#[utoipa::path(
    get,
    path = "/trips",
    responses((status = 200, description = "All trips for admins, own trips for operators"))
)]
pub async fn list_trips_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let trips = state.db.list_trips().await?;
    let snapshot = Snapshot {
        trips,
        ..Default::default()
    }
    .visible_to(&ctx);
    Ok(Json(snapshot.trips))
}

#[utoipa::path(
    post,
    path = "/trips",
    request_body(content = Object, description = "Trip details"),
    responses(
        (status = 201, description = "Created"),
        (status = 422, description = "Invalid address; `fields` lists the offending inputs")
    )
)]
pub async fn create_trip_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(trip): Json<TripDetails>,
) -> Result<impl IntoResponse, HttpError> {
    let trip = state.fleet.create_trip(&ctx, &trip).await?;
    state.publish(Collection::Trips, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(trip)))
}

#[utoipa::path(
    put,
    path = "/trips/{id}",
    params(("id" = Uuid, Path, description = "Trip id")),
    request_body(content = Object, description = "Trip details"),
    responses(
        (status = 200, description = "Saved"),
        (status = 422, description = "Invalid address")
    )
)]
pub async fn update_trip_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(trip): Json<TripDetails>,
) -> Result<impl IntoResponse, HttpError> {
    let trip = state.fleet.update_trip(&ctx, id, &trip).await?;
    state.publish(Collection::Trips, ChangeOperation::Update);
    Ok(Json(trip))
}

#[utoipa::path(
    delete,
    path = "/trips/{id}",
    params(("id" = Uuid, Path, description = "Trip id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_trip_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.fleet.delete_trip(&ctx, id).await?;
    state.publish(Collection::Trips, ChangeOperation::Delete);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Notifications
//=========================================================================================

#[utoipa::path(
    get,
    path = "/notifications",
    responses((status = 200, description = "Messages addressed to or sent by the caller"))
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    let notifications = state.db.list_notifications().await?;
    let snapshot = Snapshot {
        notifications,
        ..Default::default()
    }
    .visible_to(&ctx);
    Ok(Json(snapshot.notifications))
}

#[utoipa::path(
    post,
    path = "/notifications",
    request_body(content = Object, description = "`message`, `type`, optional `toId` and `tripId`"),
    responses(
        (status = 201, description = "Sent"),
        (status = 422, description = "Empty message")
    )
)]
pub async fn send_notification_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(message): Json<OutgoingMessage>,
) -> Result<impl IntoResponse, HttpError> {
    let notification = state.fleet.send_message(&ctx, &message).await?;
    state.publish(Collection::Notifications, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Marked as read"),
        (status = 403, description = "The caller is not a recipient")
    )
)]
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.fleet.mark_read(&ctx, id).await?;
    state.publish(Collection::Notifications, ChangeOperation::Update);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Operator Directory
//=========================================================================================

#[utoipa::path(
    get,
    path = "/profiles",
    responses((status = 200, description = "Every profile"))
)]
pub async fn list_profiles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(state.db.list_profiles().await?))
}

/// Add an operator (admin). The employee id is the initial password.
#[utoipa::path(
    post,
    path = "/profiles",
    request_body(content = Object, description = "Profile fields; `name` and `employeeId` are required"),
    responses(
        (status = 201, description = "Created"),
        (status = 409, description = "Employee id already registered")
    )
)]
pub async fn add_operator_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(profile): Json<NewProfile>,
) -> Result<impl IntoResponse, HttpError> {
    let user = state.fleet.add_operator(&ctx, &profile).await?;
    state.publish(Collection::Profiles, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    delete,
    path = "/profiles/{id}",
    params(("id" = String, Path, description = "Profile id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 422, description = "Cannot delete your own profile")
    )
)]
pub async fn delete_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    state.fleet.delete_profile(&ctx, &id).await?;
    state.publish(Collection::Profiles, ChangeOperation::Delete);
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/profiles/{id}/toggle-status",
    params(("id" = String, Path, description = "Profile id")),
    responses((status = 200, description = "The profile with its new status"))
)]
pub async fn toggle_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let user = state.fleet.toggle_profile_status(&ctx, &id).await?;
    state.publish(Collection::Profiles, ChangeOperation::Update);
    Ok(Json(user))
}

//=========================================================================================
// Media Gallery
//=========================================================================================

#[utoipa::path(
    get,
    path = "/media",
    responses((status = 200, description = "Every gallery item"))
)]
pub async fn list_media_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    Ok(Json(state.db.list_media().await?))
}

#[utoipa::path(
    post,
    path = "/media",
    request_body(content = Object, description = "`url` (base64 image), `name`, `category`"),
    responses(
        (status = 201, description = "Stored"),
        (status = 422, description = "Not an image, not base64 or larger than 5MB")
    )
)]
pub async fn upload_media_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Json(upload): Json<MediaUpload>,
) -> Result<impl IntoResponse, HttpError> {
    let media = state.fleet.upload_media(&ctx, upload).await?;
    state.publish(Collection::Media, ChangeOperation::Insert);
    Ok((StatusCode::CREATED, Json(media)))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(("id" = Uuid, Path, description = "Media id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Neither the uploader nor an administrator")
    )
)]
pub async fn delete_media_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    state.fleet.delete_media(&ctx, id).await?;
    state.publish(Collection::Media, ChangeOperation::Delete);
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Advisory
//=========================================================================================

#[utoipa::path(
    post,
    path = "/advisory/trip-insights",
    request_body = RouteRequest,
    responses((status = 200, description = "Route advice, or a fixed fallback text", body = AdvisoryText))
)]
pub async fn trip_insights_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RouteRequest>,
) -> impl IntoResponse {
    let text = state.advisor.trip_insights(&req.origin, &req.destination).await;
    Json(AdvisoryText { text })
}

/// Validates the address fields locally, then asks for an accessibility
/// check with map links.
#[utoipa::path(
    post,
    path = "/advisory/address",
    request_body(content = Object, description = "Trip details with the delivery address"),
    responses(
        (status = 200, description = "Advice text and extracted map links"),
        (status = 422, description = "Invalid address; the advisor was not asked")
    )
)]
pub async fn address_check_handler(
    State(state): State<Arc<AppState>>,
    Json(trip): Json<TripDetails>,
) -> Result<Json<AddressCheck>, HttpError> {
    validate_address(&trip).map_err(|e| FleetError::from(ValidationError::from(e)))?;
    Ok(Json(state.advisor.validate_address(&trip.address_line()).await))
}

#[utoipa::path(
    get,
    path = "/advisory/fleet-summary",
    responses(
        (status = 200, description = "Executive summary, or a fixed fallback text", body = AdvisoryText),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn fleet_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    require_admin(&ctx)?;
    let snapshot = fetch_all(state.db.as_ref()).await.snapshot;
    let text = state
        .advisor
        .fleet_summary(&snapshot.trips, &snapshot.expenses, &snapshot.notifications)
        .await;
    Ok(Json(AdvisoryText { text }))
}

#[utoipa::path(
    get,
    path = "/advisory/expense-audit",
    responses(
        (status = 200, description = "Audit findings, or a fixed fallback text", body = AdvisoryText),
        (status = 403, description = "Caller is not an administrator")
    )
)]
pub async fn expense_audit_handler(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, HttpError> {
    require_admin(&ctx)?;
    let expenses = state.db.list_expenses().await?;
    let text = state.advisor.audit_expenses(&expenses).await;
    Ok(Json(AdvisoryText { text }))
}

