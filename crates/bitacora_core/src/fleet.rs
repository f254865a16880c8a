//! crates/bitacora_core/src/fleet.rs
//!
//! Services for the plain records: trips, expenses, notifications, the
//! operator directory and the media gallery. These carry no lifecycle beyond
//! the expense review, only role checks and input validation.

use crate::attachments::{AttachmentError, MediaUpload};
use crate::domain::{
    AppMedia, AppNotification, Expense, ExpenseStatus, NewNotification, NewProfile,
    NotificationKind, SessionContext, Trip, TripDetails, User, UserRole, ADMIN_RECIPIENT,
    ALL_OPERATORS_RECIPIENT,
};
use crate::expense::{ExpenseError, ExpenseSubmission};
use crate::identity::{AuthError, IdentityGate};
use crate::ports::{DatabaseService, PortError};
use crate::trip::{validate_address, AddressErrors};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Input that cannot be saved as given.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Expense(#[from] ExpenseError),
    #[error(transparent)]
    Address(#[from] AddressErrors),
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error("{0}")]
    Message(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Operation not allowed for role {0}")]
    Forbidden(UserRole),
    #[error(transparent)]
    Profile(#[from] AuthError),
    #[error(transparent)]
    Backend(#[from] PortError),
}

pub type FleetResult<T> = Result<T, FleetError>;

fn require_admin(ctx: &SessionContext) -> FleetResult<()> {
    if !ctx.is_admin() {
        return Err(FleetError::Forbidden(ctx.role));
    }
    Ok(())
}

/// A message typed by a user. Operators write to the administrators;
/// administrators may address an operator or every operator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub to_id: Option<String>,
    pub trip_id: Option<String>,
}

#[derive(Clone)]
pub struct FleetService {
    db: Arc<dyn DatabaseService>,
    identity: Arc<IdentityGate>,
}

impl FleetService {
    pub fn new(db: Arc<dyn DatabaseService>, identity: Arc<IdentityGate>) -> Self {
        Self { db, identity }
    }

    //=====================================================================================
    // Trips
    //=====================================================================================

    pub async fn create_trip(&self, ctx: &SessionContext, trip: &TripDetails) -> FleetResult<Trip> {
        require_admin(ctx)?;
        validate_address(trip).map_err(ValidationError::from)?;
        let trip = self.db.insert_trip(trip).await?;
        info!("Trip {} created for operator {}", trip.id, trip.details.operator_id);
        Ok(trip)
    }

    pub async fn update_trip(
        &self,
        ctx: &SessionContext,
        id: Uuid,
        trip: &TripDetails,
    ) -> FleetResult<Trip> {
        require_admin(ctx)?;
        validate_address(trip).map_err(ValidationError::from)?;
        Ok(self.db.update_trip(id, trip).await?)
    }

    pub async fn delete_trip(&self, ctx: &SessionContext, id: Uuid) -> FleetResult<()> {
        require_admin(ctx)?;
        Ok(self.db.delete_trip(id).await?)
    }

    //=====================================================================================
    // Expenses
    //=====================================================================================

    /// Stamps the expense with the caller and a recomputed performance.
    pub async fn submit_expense(
        &self,
        ctx: &SessionContext,
        submission: ExpenseSubmission,
    ) -> FleetResult<Expense> {
        let expense = submission
            .into_new_expense(ctx)
            .map_err(ValidationError::from)?;
        let expense = self.db.insert_expense(&expense).await?;
        info!(
            "Expense {} ({:?}, {:.2}) recorded by {}",
            expense.id, expense.category, expense.amount, ctx.user_id
        );
        Ok(expense)
    }

    /// Admin review: `pending -> approved | rejected`. The operator is told
    /// about the outcome.
    pub async fn review_expense(
        &self,
        ctx: &SessionContext,
        id: Uuid,
        status: ExpenseStatus,
    ) -> FleetResult<Expense> {
        require_admin(ctx)?;
        if status == ExpenseStatus::Pending {
            return Err(ValidationError::Message("Un gasto solo puede aprobarse o rechazarse").into());
        }
        let current = self.db.get_expense(id).await?;
        if current.status != ExpenseStatus::Pending {
            return Err(ValidationError::Message("El gasto ya fue revisado").into());
        }
        let expense = self.db.set_expense_status(id, status).await?;

        let verdict = match status {
            ExpenseStatus::Approved => "aprobado",
            _ => "rechazado",
        };
        let mut notice = NewNotification::from_session(
            ctx,
            expense.operator_id.clone(),
            format!("Tu gasto de ${:.2} del {} fue {}.", expense.amount, expense.date, verdict),
            NotificationKind::ExpenseUpdate,
        );
        notice.trip_id = Some(expense.trip_id.clone()).filter(|t| !t.is_empty());
        if let Err(e) = self.db.insert_notification(&notice).await {
            warn!("Failed to notify expense review for {}: {}", id, e);
        }
        Ok(expense)
    }

    //=====================================================================================
    // Notifications
    //=====================================================================================

    pub async fn send_message(
        &self,
        ctx: &SessionContext,
        message: &OutgoingMessage,
    ) -> FleetResult<AppNotification> {
        let text = message.message.trim();
        if text.is_empty() {
            return Err(ValidationError::Message("El mensaje no puede estar vacío").into());
        }
        let to_id = match ctx.role {
            UserRole::Operator => ADMIN_RECIPIENT.to_string(),
            UserRole::Admin => message
                .to_id
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| ALL_OPERATORS_RECIPIENT.to_string()),
        };
        let mut notice = NewNotification::from_session(ctx, to_id, text, message.kind);
        notice.trip_id = message.trip_id.clone();
        Ok(self.db.insert_notification(&notice).await?)
    }

    /// Only a recipient may mark a notification as read.
    pub async fn mark_read(&self, ctx: &SessionContext, id: Uuid) -> FleetResult<()> {
        let notifications = self.db.list_notifications().await?;
        let notification = notifications
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| PortError::NotFound(format!("notification {}", id)))?;
        if !notification.visible_to(ctx) {
            return Err(FleetError::Forbidden(ctx.role));
        }
        Ok(self.db.mark_notification_read(id).await?)
    }

    //=====================================================================================
    // Operator Directory
    //=====================================================================================

    pub async fn add_operator(&self, ctx: &SessionContext, profile: &NewProfile) -> FleetResult<User> {
        require_admin(ctx)?;
        Ok(self.identity.add_operator(profile).await?)
    }

    pub async fn delete_profile(&self, ctx: &SessionContext, id: &str) -> FleetResult<()> {
        require_admin(ctx)?;
        if id == ctx.user_id {
            return Err(ValidationError::Message("No puedes eliminar tu propio perfil").into());
        }
        Ok(self.db.delete_profile(id).await?)
    }

    /// Active becomes paused; paused or offline becomes active.
    pub async fn toggle_profile_status(&self, ctx: &SessionContext, id: &str) -> FleetResult<User> {
        require_admin(ctx)?;
        let profile = self.db.get_profile(id).await?;
        let next = profile.status.unwrap_or_default().toggled();
        Ok(self.db.set_profile_status(id, next).await?)
    }

    //=====================================================================================
    // Media Gallery
    //=====================================================================================

    pub async fn upload_media(&self, ctx: &SessionContext, upload: MediaUpload) -> FleetResult<AppMedia> {
        let media = upload.into_new_media(ctx).map_err(ValidationError::from)?;
        Ok(self.db.insert_media(&media).await?)
    }

    /// Admins delete anything; others only their own uploads.
    pub async fn delete_media(&self, ctx: &SessionContext, id: Uuid) -> FleetResult<()> {
        if !ctx.is_admin() {
            let media = self.db.list_media().await?;
            let owned = media
                .iter()
                .any(|m| m.id == id && m.uploader_id == ctx.user_id);
            if !owned {
                return Err(FleetError::Forbidden(ctx.role));
            }
        }
        Ok(self.db.delete_media(id).await?)
    }
}
