//! crates/bitacora_core/src/workflow.rs
//!
//! Orchestrates the log-book lifecycle against the backend: every operation
//! checks the actor, applies [`next_status`], recomputes the derived fields
//! at the commit point and emits the notification side effects.
//!
//! Operations borrow the caller's form. A failed write returns a
//! [`WorkflowError`] and leaves the form exactly as it was.

use crate::attachments::decode_image;
use crate::domain::{NewNotification, SessionContext, UserRole};
use crate::logbook::{
    assignment_notice, completion_notice, next_status, LifecycleError, LogBookAction,
    LogBookEntry, LogBookForm, LogBookRecord, LogBookStatus,
};
use crate::ports::{DatabaseService, PortError};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("Only administrators may {0} log-books")]
    AdminOnly(&'static str),
    #[error("No se pudo guardar la bitácora: {0}")]
    Backend(#[from] PortError),
}

impl WorkflowError {
    /// Errors the user can fix by changing the form, as opposed to backend
    /// or permission failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            WorkflowError::Lifecycle(
                LifecycleError::MissingSignature
                    | LifecycleError::InvalidSignature(_)
                    | LifecycleError::InvalidEvidence { .. }
            )
        )
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

fn ensure_actor(ctx: &SessionContext, action: LogBookAction) -> WorkflowResult<()> {
    if ctx.role != action.actor() {
        return Err(LifecycleError::Forbidden {
            role: ctx.role,
            action,
        }
        .into());
    }
    Ok(())
}

/// Evidence photos obey the same image rules as uploads.
fn check_evidence(form: &LogBookForm) -> WorkflowResult<()> {
    for (index, evidence) in form
        .evidence_urls
        .iter()
        .filter(|e| !e.trim().is_empty())
        .enumerate()
    {
        decode_image(evidence).map_err(|e| LifecycleError::InvalidEvidence {
            index: index + 1,
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn ensure_admin(ctx: &SessionContext, what: &'static str) -> WorkflowResult<()> {
    if ctx.role != UserRole::Admin {
        return Err(WorkflowError::AdminOnly(what));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LogBookWorkflow {
    db: Arc<dyn DatabaseService>,
}

impl LogBookWorkflow {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db }
    }

    /// Notifications follow a write that already succeeded, so a failure
    /// here is logged and swallowed.
    async fn notify(&self, notification: NewNotification) {
        if let Err(e) = self.db.insert_notification(&notification).await {
            warn!(
                "Failed to notify {} after log-book write: {}",
                notification.to_id, e
            );
        }
    }

    /// An operator only acts on entries they can see.
    async fn load_for(&self, ctx: &SessionContext, id: Uuid) -> WorkflowResult<LogBookEntry> {
        let entry = self.db.get_logbook(id).await?;
        if !entry.visible_to(ctx) {
            return Err(LifecycleError::NotVisible.into());
        }
        Ok(entry)
    }

    /// Admin launches a new entry in `pending`, optionally assigned.
    pub async fn create(
        &self,
        ctx: &SessionContext,
        form: &LogBookForm,
    ) -> WorkflowResult<LogBookEntry> {
        ensure_admin(ctx, "create")?;
        check_evidence(form)?;
        let record = LogBookRecord::commit(form, LogBookStatus::Pending, Utc::now());
        let entry = self.db.insert_logbook(&record).await?;
        info!("Log-book {} created by {}", entry.id, ctx.user_id);

        self.notify(assignment_notice(ctx, &record.form)).await;
        Ok(entry)
    }

    /// Admin edit of an open entry. The stored status is kept whatever the
    /// payload says.
    pub async fn update(
        &self,
        ctx: &SessionContext,
        id: Uuid,
        form: &LogBookForm,
    ) -> WorkflowResult<LogBookEntry> {
        ensure_admin(ctx, "edit")?;
        check_evidence(form)?;
        let current = self.db.get_logbook(id).await?;
        if current.status() == LogBookStatus::Completed {
            return Err(LifecycleError::ReadOnly.into());
        }
        let record = LogBookRecord::commit(form, current.status(), Utc::now());
        Ok(self
            .db
            .update_logbook(id, current.status(), &record)
            .await?)
    }

    /// Operator accepts a pending entry, which becomes theirs. The write only
    /// lands while the entry is still pending, so a second claimer gets a
    /// conflict instead of taking it over.
    pub async fn claim(&self, ctx: &SessionContext, id: Uuid) -> WorkflowResult<LogBookEntry> {
        ensure_actor(ctx, LogBookAction::Claim)?;
        let current = self.load_for(ctx, id).await?;
        let status = next_status(current.status(), LogBookAction::Claim, ctx.role)?;

        let record = current.record.with_status(
            status,
            Some((ctx.user_id.as_str(), ctx.user_name.as_str())),
            Utc::now(),
        );
        let entry = self
            .db
            .update_logbook(id, current.status(), &record)
            .await?;
        info!("Log-book {} claimed by {}", id, ctx.user_id);
        Ok(entry)
    }

    /// Operator sends the filled form. The signature and evidence are checked
    /// before the backend is touched, so a bad one leaves the stored entry as
    /// is. Compliance flags are admin review data and keep their stored
    /// values.
    pub async fn submit(
        &self,
        ctx: &SessionContext,
        id: Uuid,
        form: &LogBookForm,
    ) -> WorkflowResult<LogBookEntry> {
        ensure_actor(ctx, LogBookAction::Submit)?;
        let signature = form
            .signature
            .as_deref()
            .filter(|_| form.has_signature())
            .ok_or(LifecycleError::MissingSignature)?;
        decode_image(signature)
            .map_err(|e| LifecycleError::InvalidSignature(e.to_string()))?;
        check_evidence(form)?;

        let current = self.load_for(ctx, id).await?;
        if current.record.form.operator_id.as_deref() != Some(ctx.user_id.as_str()) {
            return Err(LifecycleError::NotVisible.into());
        }
        let status = next_status(current.status(), LogBookAction::Submit, ctx.role)?;

        let mut submitted = form.clone();
        submitted.operator_id = Some(ctx.user_id.clone());
        if submitted.operator_name.trim().is_empty() {
            submitted.operator_name = ctx.user_name.clone();
        }
        submitted.compliance = current.record.form.compliance;
        let record = LogBookRecord::commit(&submitted, status, Utc::now());
        let entry = self
            .db
            .update_logbook(id, current.status(), &record)
            .await?;
        info!("Log-book {} completed by operator {}", id, ctx.user_id);

        self.notify(completion_notice(ctx)).await;
        Ok(entry)
    }

    /// Admin closes an open entry without a signature. When a form is given
    /// it replaces the stored inputs.
    pub async fn finalize(
        &self,
        ctx: &SessionContext,
        id: Uuid,
        form: Option<&LogBookForm>,
    ) -> WorkflowResult<LogBookEntry> {
        ensure_actor(ctx, LogBookAction::Finalize)?;
        if let Some(form) = form {
            check_evidence(form)?;
        }
        let current = self.db.get_logbook(id).await?;
        let status = next_status(current.status(), LogBookAction::Finalize, ctx.role)?;

        let record = match form {
            Some(form) => LogBookRecord::commit(form, status, Utc::now()),
            None => current.record.with_status(status, None, Utc::now()),
        };
        let entry = self
            .db
            .update_logbook(id, current.status(), &record)
            .await?;
        info!("Log-book {} finalized by {}", id, ctx.user_id);
        Ok(entry)
    }

    pub async fn delete(&self, ctx: &SessionContext, id: Uuid) -> WorkflowResult<()> {
        ensure_admin(ctx, "delete")?;
        self.db.delete_logbook(id).await?;
        info!("Log-book {} deleted by {}", id, ctx.user_id);
        Ok(())
    }

    /// A single entry, if the session may see it.
    pub async fn get(&self, ctx: &SessionContext, id: Uuid) -> WorkflowResult<LogBookEntry> {
        self.load_for(ctx, id).await
    }
}
