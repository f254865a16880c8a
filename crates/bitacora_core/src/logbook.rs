//! crates/bitacora_core/src/logbook.rs
//!
//! The trip log-book ("bitácora"): its editable form, the record written to
//! the backend with every derived field recomputed, the status state machine
//! and the read-side visibility rule.
//!
//! Everything here is pure. Persistence and notification side effects are
//! orchestrated by [`crate::workflow::LogBookWorkflow`].

use crate::domain::{
    NewNotification, NotificationKind, SessionContext, UserRole, ADMIN_RECIPIENT,
    ALL_OPERATORS_RECIPIENT,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Status and Actions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogBookStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl LogBookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogBookStatus::Pending => "pending",
            LogBookStatus::Approved => "approved",
            LogBookStatus::Rejected => "rejected",
            LogBookStatus::Completed => "completed",
        }
    }

    /// The label shown on badges and printed documents.
    pub fn label(&self) -> &'static str {
        match self {
            LogBookStatus::Pending => "POR ACEPTAR",
            LogBookStatus::Approved => "EN CURSO",
            LogBookStatus::Rejected => "RECHAZADA",
            LogBookStatus::Completed => "FINALIZADA",
        }
    }
}

impl fmt::Display for LogBookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogBookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LogBookStatus::Pending),
            "approved" => Ok(LogBookStatus::Approved),
            "rejected" => Ok(LogBookStatus::Rejected),
            "completed" => Ok(LogBookStatus::Completed),
            other => Err(format!("unknown log-book status '{}'", other)),
        }
    }
}

/// The actions that move an existing entry between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBookAction {
    /// An operator accepts an unclaimed or assigned entry.
    Claim,
    /// An operator sends the filled, signed form.
    Submit,
    /// An administrator closes the entry without the operator's signature.
    Finalize,
}

impl LogBookAction {
    pub fn actor(&self) -> UserRole {
        match self {
            LogBookAction::Claim | LogBookAction::Submit => UserRole::Operator,
            LogBookAction::Finalize => UserRole::Admin,
        }
    }
}

impl fmt::Display for LogBookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogBookAction::Claim => "claim",
            LogBookAction::Submit => "submit",
            LogBookAction::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Debes firmar la bitácora para poder enviarla.")]
    MissingSignature,
    #[error("La firma no es una imagen base64 válida: {0}")]
    InvalidSignature(String),
    #[error("La evidencia {index} no es una imagen válida: {reason}")]
    InvalidEvidence { index: usize, reason: String },
    #[error("La bitácora está finalizada y no admite cambios.")]
    ReadOnly,
    #[error("Cannot {action} a log-book in status '{from}'")]
    InvalidTransition {
        from: LogBookStatus,
        action: LogBookAction,
    },
    #[error("Role {role} may not {action} a log-book")]
    Forbidden { role: UserRole, action: LogBookAction },
    #[error("Log-book is not visible to this operator")]
    NotVisible,
}

/// Computes the status an entry moves to when `role` performs `action` on it.
///
/// `Rejected` is never produced: no action leads there.
pub fn next_status(
    current: LogBookStatus,
    action: LogBookAction,
    role: UserRole,
) -> Result<LogBookStatus, LifecycleError> {
    if role != action.actor() {
        return Err(LifecycleError::Forbidden { role, action });
    }
    if current == LogBookStatus::Completed {
        return Err(LifecycleError::ReadOnly);
    }

    match (current, action) {
        (LogBookStatus::Pending, LogBookAction::Claim) => Ok(LogBookStatus::Approved),
        (LogBookStatus::Approved, LogBookAction::Submit) => Ok(LogBookStatus::Completed),
        (LogBookStatus::Pending | LogBookStatus::Approved, LogBookAction::Finalize) => {
            Ok(LogBookStatus::Completed)
        }
        (from, action) => Err(LifecycleError::InvalidTransition { from, action }),
    }
}

//=========================================================================================
// Form Building Blocks
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionChecklist {
    pub tires: bool,
    pub lights: bool,
    pub fluids: bool,
    pub brakes: bool,
    pub documents: bool,
    pub cleaned: bool,
}

impl Default for InspectionChecklist {
    fn default() -> Self {
        Self {
            tires: true,
            lights: true,
            fluids: true,
            brakes: true,
            documents: true,
            cleaned: true,
        }
    }
}

impl InspectionChecklist {
    pub fn items(&self) -> [(&'static str, bool); 6] {
        [
            ("Llantas", self.tires),
            ("Luces", self.lights),
            ("Fluidos", self.fluids),
            ("Frenos", self.brakes),
            ("Documentos", self.documents),
            ("Limpieza", self.cleaned),
        ]
    }
}

/// Review flags set by an administrator. They are stored and displayed but
/// do not drive any transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceFlags {
    pub eval_fuel_compliance: bool,
    pub eval_docs_compliance: bool,
    pub presented_at_load: bool,
    pub on_time_route: bool,
    pub discipline_evidence: bool,
    pub final_compliance: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherExpense {
    pub description: String,
    pub amount: f64,
}

/// The seven expense inputs that feed the derived subtotals, plus the card
/// liters which are informational only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseInputs {
    pub fuel_card_liters: f64,
    pub fuel_card_amount: f64,
    pub tolls_tag_amount: f64,
    pub fuel_cash_amount: f64,
    pub tolls_cash_amount: f64,
    pub food_amount: f64,
    pub repairs_amount: f64,
    pub maneuvers_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedTotals {
    pub subtotal_electronic: f64,
    pub subtotal_cash: f64,
    pub total_expenses: f64,
}

impl ExpenseInputs {
    /// Recomputes every subtotal from the inputs. Free-form extra items are
    /// not part of the totals.
    pub fn totals(&self) -> DerivedTotals {
        let subtotal_electronic = self.fuel_card_amount + self.tolls_tag_amount;
        let subtotal_cash = self.fuel_cash_amount
            + self.tolls_cash_amount
            + self.food_amount
            + self.repairs_amount
            + self.maneuvers_amount;
        DerivedTotals {
            subtotal_electronic,
            subtotal_cash,
            total_expenses: subtotal_electronic + subtotal_cash,
        }
    }

    /// Cash lines in the order they are printed.
    pub fn cash_lines(&self) -> [(&'static str, f64); 5] {
        [
            ("Diesel (Efectivo)", self.fuel_cash_amount),
            ("Casetas", self.tolls_cash_amount),
            ("Viáticos", self.food_amount),
            ("Maniobras", self.maneuvers_amount),
            ("Varios / Reparaciones", self.repairs_amount),
        ]
    }

    pub fn electronic_lines(&self) -> [(&'static str, f64); 2] {
        [
            ("Diesel (Tarjeta)", self.fuel_card_amount),
            ("Casetas (TAG)", self.tolls_tag_amount),
        ]
    }
}

//=========================================================================================
// The Editable Form
//=========================================================================================

/// Everything a user can type into a log-book. Derived fields are absent on
/// purpose: they only exist on [`LogBookRecord`] and are always recomputed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogBookForm {
    pub trip_num: String,
    pub departure_date: Option<String>,
    pub doc_delivery_date: Option<String>,
    pub log_delivery_date: Option<String>,
    pub unit_eco: String,
    pub client: String,
    pub destinations: String,
    /// `None` means unclaimed: every operator may see and claim the entry.
    pub operator_id: Option<String>,
    pub operator_name: String,
    pub odo_initial: f64,
    pub total_distance: f64,
    #[serde(flatten)]
    pub expenses: ExpenseInputs,
    pub other_expenses: Vec<OtherExpense>,
    pub inspection: InspectionChecklist,
    #[serde(flatten)]
    pub compliance: ComplianceFlags,
    pub signature: Option<String>,
    pub evidence_urls: Vec<String>,
}

impl LogBookForm {
    pub fn odo_final(&self) -> f64 {
        self.odo_initial + self.total_distance
    }

    pub fn has_signature(&self) -> bool {
        self.signature
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_unclaimed(&self) -> bool {
        is_blank_assignment(self.operator_id.as_deref())
    }

    /// Blank strings become `None` so the backend never stores an empty
    /// assignment or an empty date.
    pub fn normalized(&self) -> Self {
        let mut form = self.clone();
        if is_blank_assignment(form.operator_id.as_deref()) {
            form.operator_id = None;
        }
        for date in [
            &mut form.departure_date,
            &mut form.doc_delivery_date,
            &mut form.log_delivery_date,
        ] {
            if date.as_deref().map(|d| d.trim().is_empty()).unwrap_or(false) {
                *date = None;
            }
        }
        if form.signature.as_deref().map(|s| s.trim().is_empty()).unwrap_or(false) {
            form.signature = None;
        }
        form.evidence_urls.retain(|e| !e.trim().is_empty());
        form
    }
}

fn is_blank_assignment(operator_id: Option<&str>) -> bool {
    match operator_id {
        None => true,
        Some(id) => {
            let id = id.trim();
            id.is_empty() || id == "null"
        }
    }
}

//=========================================================================================
// The Stored Record
//=========================================================================================

/// What gets written to the backend: the form plus every derived field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBookRecord {
    #[serde(flatten)]
    pub form: LogBookForm,
    pub odo_final: f64,
    #[serde(flatten)]
    pub totals: DerivedTotals,
    pub status: LogBookStatus,
    /// Last modification time, refreshed on every save.
    pub timestamp: DateTime<Utc>,
}

impl LogBookRecord {
    /// Builds the record for a save. The derived fields are a pure function
    /// of the form, so saving identical inputs twice yields identical totals.
    pub fn commit(form: &LogBookForm, status: LogBookStatus, now: DateTime<Utc>) -> Self {
        let form = form.normalized();
        Self {
            odo_final: form.odo_final(),
            totals: form.expenses.totals(),
            form,
            status,
            timestamp: now,
        }
    }

    /// Re-commits the record with a new status and optional new assignment,
    /// recomputing the derived fields from the stored inputs.
    pub fn with_status(
        &self,
        status: LogBookStatus,
        assignment: Option<(&str, &str)>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut form = self.form.clone();
        if let Some((operator_id, operator_name)) = assignment {
            form.operator_id = Some(operator_id.to_string());
            form.operator_name = operator_name.to_string();
        }
        Self::commit(&form, status, now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBookEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: LogBookRecord,
}

impl LogBookEntry {
    pub fn status(&self) -> LogBookStatus {
        self.record.status
    }

    /// Operators see their own entries and the unclaimed pool; admins see
    /// everything. This is a read-side filter, not an authorization boundary.
    pub fn visible_to(&self, ctx: &SessionContext) -> bool {
        if ctx.is_admin() {
            return true;
        }
        self.record.form.is_unclaimed()
            || self.record.form.operator_id.as_deref() == Some(ctx.user_id.as_str())
    }

    /// Pending or in progress, i.e. still waiting on somebody.
    pub fn is_open(&self) -> bool {
        matches!(
            self.record.status,
            LogBookStatus::Pending | LogBookStatus::Approved
        )
    }
}

//=========================================================================================
// Notification Templates
//=========================================================================================

/// Sent to the administrators when an operator completes an entry.
pub fn completion_notice(ctx: &SessionContext) -> NewNotification {
    NewNotification::from_session(
        ctx,
        ADMIN_RECIPIENT,
        format!("El operador {} finalizó su bitácora.", ctx.user_name),
        NotificationKind::Success,
    )
}

/// Sent when an administrator launches a new entry: to the assigned
/// operator, or to every operator when the entry is unclaimed.
pub fn assignment_notice(ctx: &SessionContext, form: &LogBookForm) -> NewNotification {
    let to_id = match form.operator_id.as_deref() {
        Some(id) if !is_blank_assignment(Some(id)) => id.to_string(),
        _ => ALL_OPERATORS_RECIPIENT.to_string(),
    };
    NewNotification::from_session(
        ctx,
        to_id,
        format!(
            "Se ha lanzado una nueva bitácora para el cliente: {}",
            form.client
        ),
        NotificationKind::Info,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator(id: &str) -> SessionContext {
        SessionContext {
            user_id: id.to_string(),
            user_name: format!("Operador {}", id),
            role: UserRole::Operator,
        }
    }

    fn admin() -> SessionContext {
        SessionContext {
            user_id: "ADM-admin1".to_string(),
            user_name: "ADMIN1".to_string(),
            role: UserRole::Admin,
        }
    }

    fn filled_form() -> LogBookForm {
        LogBookForm {
            client: "Cementos del Norte".to_string(),
            odo_initial: 120_500.0,
            total_distance: 842.5,
            expenses: ExpenseInputs {
                fuel_card_liters: 300.0,
                fuel_card_amount: 7_350.0,
                tolls_tag_amount: 1_280.0,
                fuel_cash_amount: 500.0,
                tolls_cash_amount: 215.0,
                food_amount: 640.0,
                repairs_amount: 0.0,
                maneuvers_amount: 350.0,
            },
            other_expenses: vec![OtherExpense {
                description: "Lavado".to_string(),
                amount: 150.0,
            }],
            ..Default::default()
        }
    }

    fn entry_for(operator_id: Option<&str>) -> LogBookEntry {
        let form = LogBookForm {
            operator_id: operator_id.map(str::to_string),
            ..filled_form()
        };
        LogBookEntry {
            id: Uuid::new_v4(),
            record: LogBookRecord::commit(&form, LogBookStatus::Pending, Utc::now()),
        }
    }

    #[test]
    fn commit_recomputes_odometer_and_totals() {
        let record = LogBookRecord::commit(&filled_form(), LogBookStatus::Pending, Utc::now());

        assert_eq!(record.odo_final, 120_500.0 + 842.5);
        assert_eq!(record.totals.subtotal_electronic, 7_350.0 + 1_280.0);
        assert_eq!(record.totals.subtotal_cash, 500.0 + 215.0 + 640.0 + 0.0 + 350.0);
        assert_eq!(
            record.totals.total_expenses,
            record.totals.subtotal_electronic + record.totals.subtotal_cash
        );
    }

    #[test]
    fn extra_items_do_not_enter_the_totals() {
        let mut form = filled_form();
        let before = form.expenses.totals();
        form.other_expenses.push(OtherExpense {
            description: "Estacionamiento".to_string(),
            amount: 999.0,
        });
        assert_eq!(form.expenses.totals(), before);
    }

    #[test]
    fn recommitting_identical_inputs_is_deterministic() {
        let form = filled_form();
        let first = LogBookRecord::commit(&form, LogBookStatus::Approved, Utc::now());
        let second = LogBookRecord::commit(&first.form, LogBookStatus::Approved, Utc::now());
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.odo_final, second.odo_final);
    }

    #[test]
    fn odo_final_follows_either_input() {
        let mut form = filled_form();
        form.odo_initial = 1_000.0;
        assert_eq!(form.odo_final(), 1_842.5);
        form.total_distance = 10.0;
        assert_eq!(form.odo_final(), 1_010.0);
    }

    #[test]
    fn normalization_clears_blank_assignment_and_dates() {
        let form = LogBookForm {
            operator_id: Some("null".to_string()),
            departure_date: Some("  ".to_string()),
            doc_delivery_date: Some("2025-03-02".to_string()),
            signature: Some(String::new()),
            ..Default::default()
        }
        .normalized();

        assert_eq!(form.operator_id, None);
        assert_eq!(form.departure_date, None);
        assert_eq!(form.doc_delivery_date.as_deref(), Some("2025-03-02"));
        assert_eq!(form.signature, None);
    }

    #[test]
    fn transitions_follow_the_actor_table() {
        use LogBookAction::*;
        use LogBookStatus::*;

        assert_eq!(next_status(Pending, Claim, UserRole::Operator), Ok(Approved));
        assert_eq!(next_status(Approved, Submit, UserRole::Operator), Ok(Completed));
        assert_eq!(next_status(Pending, Finalize, UserRole::Admin), Ok(Completed));
        assert_eq!(next_status(Approved, Finalize, UserRole::Admin), Ok(Completed));

        assert_eq!(
            next_status(Pending, Submit, UserRole::Operator),
            Err(LifecycleError::InvalidTransition { from: Pending, action: Submit })
        );
        assert_eq!(
            next_status(Approved, Claim, UserRole::Operator),
            Err(LifecycleError::InvalidTransition { from: Approved, action: Claim })
        );
        assert_eq!(
            next_status(Rejected, Finalize, UserRole::Admin),
            Err(LifecycleError::InvalidTransition { from: Rejected, action: Finalize })
        );
    }

    #[test]
    fn completed_is_terminal() {
        for (action, role) in [
            (LogBookAction::Claim, UserRole::Operator),
            (LogBookAction::Submit, UserRole::Operator),
            (LogBookAction::Finalize, UserRole::Admin),
        ] {
            assert_eq!(
                next_status(LogBookStatus::Completed, action, role),
                Err(LifecycleError::ReadOnly)
            );
        }
    }

    #[test]
    fn actions_are_bound_to_roles() {
        assert!(matches!(
            next_status(LogBookStatus::Pending, LogBookAction::Finalize, UserRole::Operator),
            Err(LifecycleError::Forbidden { .. })
        ));
        assert!(matches!(
            next_status(LogBookStatus::Pending, LogBookAction::Claim, UserRole::Admin),
            Err(LifecycleError::Forbidden { .. })
        ));
    }

    #[test]
    fn unclaimed_entries_are_visible_to_every_operator() {
        let unclaimed = entry_for(None);
        let blank = entry_for(Some(""));
        for ctx in [operator("op-1"), operator("op-2"), admin()] {
            assert!(unclaimed.visible_to(&ctx));
            assert!(blank.visible_to(&ctx));
        }
    }

    #[test]
    fn assigned_entries_are_visible_to_owner_and_admins_only() {
        let assigned = entry_for(Some("op-1"));
        assert!(assigned.visible_to(&operator("op-1")));
        assert!(!assigned.visible_to(&operator("op-2")));
        assert!(assigned.visible_to(&admin()));
    }

    #[test]
    fn with_status_records_the_claiming_operator() {
        let entry = entry_for(None);
        let claimed =
            entry
                .record
                .with_status(LogBookStatus::Approved, Some(("op-7", "Juan Pérez")), Utc::now());
        assert_eq!(claimed.status, LogBookStatus::Approved);
        assert_eq!(claimed.form.operator_id.as_deref(), Some("op-7"));
        assert_eq!(claimed.form.operator_name, "Juan Pérez");
        assert_eq!(claimed.totals, entry.record.totals);
    }

    #[test]
    fn notices_are_addressed_by_assignment() {
        let ctx = admin();
        let mut form = filled_form();
        let broadcast = assignment_notice(&ctx, &form);
        assert_eq!(broadcast.to_id, ALL_OPERATORS_RECIPIENT);
        assert_eq!(
            broadcast.message,
            "Se ha lanzado una nueva bitácora para el cliente: Cementos del Norte"
        );

        form.operator_id = Some("op-3".to_string());
        assert_eq!(assignment_notice(&ctx, &form).to_id, "op-3");

        let done = completion_notice(&operator("op-3"));
        assert_eq!(done.to_id, ADMIN_RECIPIENT);
        assert_eq!(done.kind, NotificationKind::Success);
        assert_eq!(done.message, "El operador Operador op-3 finalizó su bitácora.");
    }

    #[test]
    fn entries_use_flat_snake_case_json() {
        let entry = entry_for(Some("op-1"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["operator_id"], "op-1");
        assert_eq!(json["fuel_card_amount"], 7_350.0);
        assert_eq!(json["total_expenses"], entry.record.totals.total_expenses);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["inspection"]["tires"], true);
        assert_eq!(json["final_compliance"], false);

        let back: LogBookEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
