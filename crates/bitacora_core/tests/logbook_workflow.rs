mod common;

use bitacora_core::domain::{NotificationKind, ADMIN_RECIPIENT, ALL_OPERATORS_RECIPIENT};
use bitacora_core::logbook::{
    ComplianceFlags, ExpenseInputs, LifecycleError, LogBookAction, LogBookForm, LogBookRecord,
    LogBookStatus,
};
use bitacora_core::ports::{Collection, PortError};
use bitacora_core::workflow::{LogBookWorkflow, WorkflowError};
use chrono::Utc;
use common::{admin, operator, InMemoryDb, SIGNATURE};
use std::sync::Arc;

fn form() -> LogBookForm {
    LogBookForm {
        trip_num: "V-2041".to_string(),
        client: "Cementos del Norte".to_string(),
        unit_eco: "ECO-17".to_string(),
        destinations: "Monterrey - Saltillo".to_string(),
        odo_initial: 100_000.0,
        total_distance: 320.0,
        expenses: ExpenseInputs {
            fuel_card_amount: 3_000.0,
            tolls_tag_amount: 450.0,
            food_amount: 200.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn setup() -> (Arc<InMemoryDb>, LogBookWorkflow) {
    let db = Arc::new(InMemoryDb::new());
    let workflow = LogBookWorkflow::new(db.clone());
    (db, workflow)
}

#[tokio::test]
async fn admin_create_starts_pending_and_broadcasts_to_operators() {
    let (db, workflow) = setup();

    let entry = workflow.create(&admin(), &form()).await.unwrap();

    assert_eq!(entry.status(), LogBookStatus::Pending);
    assert_eq!(entry.record.odo_final, 100_320.0);
    assert_eq!(entry.record.totals.total_expenses, 3_650.0);

    let notes = db.notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].to_id, ALL_OPERATORS_RECIPIENT);
    assert_eq!(notes[0].kind, NotificationKind::Info);
    assert_eq!(
        notes[0].message,
        "Se ha lanzado una nueva bitácora para el cliente: Cementos del Norte"
    );
}

#[tokio::test]
async fn assigned_create_notifies_only_that_operator() {
    let (db, workflow) = setup();
    let assigned = LogBookForm {
        operator_id: Some("op-5".to_string()),
        operator_name: "Operador op-5".to_string(),
        ..form()
    };

    workflow.create(&admin(), &assigned).await.unwrap();

    assert_eq!(db.notifications()[0].to_id, "op-5");
}

#[tokio::test]
async fn operators_cannot_create() {
    let (_, workflow) = setup();
    let err = workflow.create(&operator("op-1"), &form()).await.unwrap_err();
    assert_eq!(err, WorkflowError::AdminOnly("create"));
}

#[tokio::test]
async fn full_operator_path_claim_then_submit() {
    let (db, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();

    let claimed = workflow.claim(&op, entry.id).await.unwrap();
    assert_eq!(claimed.status(), LogBookStatus::Approved);
    assert_eq!(claimed.record.form.operator_id.as_deref(), Some("op-1"));
    assert_eq!(claimed.record.form.operator_name, "Operador op-1");

    let mut filled = claimed.record.form.clone();
    filled.total_distance = 410.0;
    filled.expenses.maneuvers_amount = 150.0;
    filled.signature = Some(SIGNATURE.to_string());

    let done = workflow.submit(&op, entry.id, &filled).await.unwrap();
    assert_eq!(done.status(), LogBookStatus::Completed);
    assert_eq!(done.record.odo_final, 100_410.0);
    assert_eq!(done.record.totals.subtotal_cash, 350.0);
    assert_eq!(done.record.totals.total_expenses, 3_800.0);

    let completion = db
        .notifications()
        .into_iter()
        .find(|n| n.to_id == ADMIN_RECIPIENT)
        .expect("admins are told");
    assert_eq!(completion.kind, NotificationKind::Success);
    assert_eq!(completion.message, "El operador Operador op-1 finalizó su bitácora.");
}

#[tokio::test]
async fn submit_without_signature_leaves_entry_untouched() {
    let (db, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    let claimed = workflow.claim(&op, entry.id).await.unwrap();
    let before = db.logbook(entry.id);

    for signature in [None, Some(String::new()), Some("   ".to_string())] {
        let unsigned = LogBookForm {
            signature,
            ..claimed.record.form.clone()
        };
        let err = workflow.submit(&op, entry.id, &unsigned).await.unwrap_err();
        assert_eq!(err, WorkflowError::Lifecycle(LifecycleError::MissingSignature));
        assert!(err.is_validation());
    }

    assert_eq!(db.logbook(entry.id), before);
    assert_eq!(
        db.notifications()
            .iter()
            .filter(|n| n.to_id == ADMIN_RECIPIENT)
            .count(),
        0
    );
}

#[tokio::test]
async fn submit_rejects_a_signature_that_is_not_an_image() {
    let (_, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    workflow.claim(&op, entry.id).await.unwrap();

    let bad = LogBookForm {
        signature: Some("data:text/plain;base64,aGVsbG8=".to_string()),
        ..form()
    };
    let err = workflow.submit(&op, entry.id, &bad).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Lifecycle(LifecycleError::InvalidSignature(_))
    ));
}

#[tokio::test]
async fn submit_requires_a_claimed_entry() {
    let (_, workflow) = setup();
    let op = operator("op-1");
    let assigned = LogBookForm {
        operator_id: Some("op-1".to_string()),
        ..form()
    };
    let entry = workflow.create(&admin(), &assigned).await.unwrap();

    let signed = LogBookForm {
        signature: Some(SIGNATURE.to_string()),
        ..assigned
    };
    let err = workflow.submit(&op, entry.id, &signed).await.unwrap_err();
    assert_eq!(
        err,
        WorkflowError::Lifecycle(LifecycleError::InvalidTransition {
            from: LogBookStatus::Pending,
            action: LogBookAction::Submit,
        })
    );
}

#[tokio::test]
async fn admin_finalize_needs_no_signature() {
    let (db, workflow) = setup();
    let pending = workflow.create(&admin(), &form()).await.unwrap();
    let approved = workflow.create(&admin(), &form()).await.unwrap();
    workflow.claim(&operator("op-2"), approved.id).await.unwrap();

    for id in [pending.id, approved.id] {
        let done = workflow.finalize(&admin(), id, None).await.unwrap();
        assert_eq!(done.status(), LogBookStatus::Completed);
        assert!(done.record.form.signature.is_none());
    }
    assert_eq!(db.logbook(approved.id).record.form.operator_id.as_deref(), Some("op-2"));

    let notices_to_admin = db
        .notifications()
        .iter()
        .filter(|n| n.to_id == ADMIN_RECIPIENT)
        .count();
    assert_eq!(notices_to_admin, 0);
}

#[tokio::test]
async fn completed_entries_are_read_only() {
    let (_, workflow) = setup();
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    workflow.finalize(&admin(), entry.id, None).await.unwrap();

    assert_eq!(
        workflow.update(&admin(), entry.id, &form()).await.unwrap_err(),
        WorkflowError::Lifecycle(LifecycleError::ReadOnly)
    );
    assert_eq!(
        workflow.finalize(&admin(), entry.id, None).await.unwrap_err(),
        WorkflowError::Lifecycle(LifecycleError::ReadOnly)
    );
    assert_eq!(
        workflow.claim(&operator("op-1"), entry.id).await.unwrap_err(),
        WorkflowError::Lifecycle(LifecycleError::ReadOnly)
    );
}

#[tokio::test]
async fn admin_edit_keeps_status_and_recomputes_totals() {
    let (_, workflow) = setup();
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    workflow.claim(&operator("op-3"), entry.id).await.unwrap();

    let mut edited = form();
    edited.operator_id = Some("op-3".to_string());
    edited.expenses.repairs_amount = 1_000.0;
    let updated = workflow.update(&admin(), entry.id, &edited).await.unwrap();

    assert_eq!(updated.status(), LogBookStatus::Approved);
    assert_eq!(updated.record.totals.subtotal_cash, 1_200.0);
}

#[tokio::test]
async fn operators_cannot_touch_entries_of_others() {
    let (_, workflow) = setup();
    let assigned = LogBookForm {
        operator_id: Some("op-1".to_string()),
        ..form()
    };
    let entry = workflow.create(&admin(), &assigned).await.unwrap();

    assert_eq!(
        workflow.claim(&operator("op-2"), entry.id).await.unwrap_err(),
        WorkflowError::Lifecycle(LifecycleError::NotVisible)
    );
    assert!(matches!(
        workflow.finalize(&operator("op-1"), entry.id, None).await,
        Err(WorkflowError::Lifecycle(LifecycleError::Forbidden { .. }))
    ));
}

#[tokio::test]
async fn failed_write_keeps_the_form_and_reports_a_backend_error() {
    let (db, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    workflow.claim(&op, entry.id).await.unwrap();
    let before = db.logbook(entry.id);

    let filled = LogBookForm {
        operator_id: Some("op-1".to_string()),
        signature: Some(SIGNATURE.to_string()),
        ..form()
    };
    let snapshot = filled.clone();
    db.fail_writes();

    let err = workflow.submit(&op, entry.id, &filled).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Backend(PortError::Unexpected(_))));
    assert!(!err.is_validation());
    assert_eq!(filled, snapshot);
    assert_eq!(db.logbook(entry.id), before);
}

#[tokio::test]
async fn notification_failure_does_not_undo_the_write() {
    let (db, workflow) = setup();
    db.fail(Collection::Notifications);

    let entry = workflow.create(&admin(), &form()).await.unwrap();

    assert_eq!(db.logbook(entry.id).status(), LogBookStatus::Pending);
}

#[tokio::test]
async fn resaving_identical_inputs_gives_identical_totals() {
    let (db, workflow) = setup();
    let seeded = db.seed_logbook(LogBookRecord::commit(
        &form(),
        LogBookStatus::Pending,
        Utc::now(),
    ));

    let first = workflow.update(&admin(), seeded.id, &form()).await.unwrap();
    let second = workflow.update(&admin(), seeded.id, &form()).await.unwrap();

    assert_eq!(first.record.totals, second.record.totals);
    assert_eq!(first.record.odo_final, second.record.odo_final);
}

#[tokio::test]
async fn operator_submit_cannot_set_compliance_flags() {
    let (db, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    let claimed = workflow.claim(&op, entry.id).await.unwrap();

    let mut filled = claimed.record.form.clone();
    filled.signature = Some(SIGNATURE.to_string());
    filled.compliance.final_compliance = true;
    filled.compliance.eval_fuel_compliance = true;
    filled.compliance.on_time_route = true;

    let done = workflow.submit(&op, entry.id, &filled).await.unwrap();

    assert_eq!(done.status(), LogBookStatus::Completed);
    assert_eq!(done.record.form.compliance, ComplianceFlags::default());
    assert_eq!(db.logbook(entry.id).record.form.compliance, ComplianceFlags::default());
}

#[tokio::test]
async fn operator_submit_keeps_flags_set_by_admin_review() {
    let (_, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    workflow.claim(&op, entry.id).await.unwrap();

    let mut reviewed = workflow.get(&admin(), entry.id).await.unwrap().record.form;
    reviewed.compliance.eval_docs_compliance = true;
    workflow.update(&admin(), entry.id, &reviewed).await.unwrap();

    let mut filled = reviewed.clone();
    filled.signature = Some(SIGNATURE.to_string());
    filled.compliance = ComplianceFlags::default();
    let done = workflow.submit(&op, entry.id, &filled).await.unwrap();

    assert!(done.record.form.compliance.eval_docs_compliance);
}

#[tokio::test]
async fn evidence_must_be_valid_images() {
    let (db, workflow) = setup();
    let op = operator("op-1");
    let entry = workflow.create(&admin(), &form()).await.unwrap();
    let claimed = workflow.claim(&op, entry.id).await.unwrap();
    let before = db.logbook(entry.id);

    let mut filled = claimed.record.form.clone();
    filled.signature = Some(SIGNATURE.to_string());
    filled.evidence_urls = vec![SIGNATURE.to_string(), "data:text/html;base64,PGI+".to_string()];

    let err = workflow.submit(&op, entry.id, &filled).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Lifecycle(LifecycleError::InvalidEvidence { index: 2, .. })
    ));
    assert!(err.is_validation());
    assert_eq!(db.logbook(entry.id), before);

    let admin_err = workflow
        .update(&admin(), entry.id, &filled)
        .await
        .unwrap_err();
    assert!(admin_err.is_validation());
    let finalize_err = workflow
        .finalize(&admin(), entry.id, Some(&filled))
        .await
        .unwrap_err();
    assert!(finalize_err.is_validation());
    assert_eq!(db.logbook(entry.id), before);

    filled.evidence_urls = vec![SIGNATURE.to_string(), "  ".to_string()];
    let done = workflow.submit(&op, entry.id, &filled).await.unwrap();
    assert_eq!(done.record.form.evidence_urls, vec![SIGNATURE.to_string()]);
}

#[tokio::test]
async fn second_claim_on_a_stale_read_conflicts() {
    let (db, workflow) = setup();
    let entry = workflow.create(&admin(), &form()).await.unwrap();

    workflow.claim(&operator("op-1"), entry.id).await.unwrap();
    // op-2 read the entry while it was still pending.
    db.serve_stale(entry.clone());
    let err = workflow
        .claim(&operator("op-2"), entry.id)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Backend(PortError::Conflict(_))));
    let stored = db.logbook(entry.id);
    assert_eq!(stored.status(), LogBookStatus::Approved);
    assert_eq!(stored.record.form.operator_id.as_deref(), Some("op-1"));
}
