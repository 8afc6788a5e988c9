#![allow(clippy::unwrap_used)]
// Reconciliation engine against the in-memory controller.

mod common;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use smartzone_core::{
    Action, Comparison, CoreError, DesiredState, MASK, Method, Reconciler, RequestedState,
    ResourceSpec, SecretField, UpdateMode,
};

use common::{FakeController, connect, zone};

// ── Helpers ─────────────────────────────────────────────────────────

fn desired(value: Value) -> DesiredState {
    DesiredState::from_value(value).unwrap()
}

fn zones() -> ResourceSpec {
    ResourceSpec::new("rkszones")
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_posts_then_rereads_by_id() {
    let session = connect(FakeController::new().with_collection("rkszones", vec![])).await;
    let spec = zones();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "Ansible" })), RequestedState::Present)
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.action, Action::Created);
    assert!(outcome.before.is_none());
    let after = outcome.after.unwrap();
    assert_eq!(after.name(), Some("Ansible"));
    assert_eq!(after.id(), Some("id-1"));

    let calls = session.transport().calls();
    let writes = session.transport().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Post);
    assert_eq!(writes[0].path, "rkszones");
    let last = calls.last().unwrap();
    assert_eq!((last.method, last.path.as_str()), (Method::Get, "rkszones/id-1"));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let session = connect(FakeController::new().with_collection("rkszones", vec![])).await;
    let spec = zones();
    let reconciler = Reconciler::new(&session, &spec);
    let wanted = desired(json!({ "name": "Ansible", "description": "lab", "countryCode": "DE" }));

    let first = reconciler.reconcile(&wanted, RequestedState::Present).await.unwrap();
    let second = reconciler.reconcile(&wanted, RequestedState::Present).await.unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.action, Action::Unchanged);
    assert_eq!(first.after, second.after);
    assert_eq!(session.transport().writes().len(), 1);
}

#[tokio::test]
async fn test_create_on_alternate_endpoint() {
    let fake = FakeController::new()
        .with_collection("rkszones/z1/wlans", vec![])
        .with_create_alias("rkszones/z1/wlans/standard8021X", "rkszones/z1/wlans");
    let session = connect(fake).await;
    let spec = ResourceSpec::new("rkszones/z1/wlans").create_path("rkszones/z1/wlans/standard8021X");

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "corp", "ssid": "corp" })), RequestedState::Present)
        .await
        .unwrap();

    assert_eq!(outcome.action, Action::Created);
    let writes = session.transport().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].path, "rkszones/z1/wlans/standard8021X");
    assert_eq!(session.transport().items("rkszones/z1/wlans").len(), 1);
}

// ── Update ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_patches_only_changed_fields() {
    let fake = FakeController::new().with_collection(
        "rkszones",
        vec![zone("z1", "A"), zone("z2", "B"), zone("z3", "C")],
    );
    let session = connect(fake).await;
    let spec = zones();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(
            &desired(json!({ "name": "C", "description": "new", "countryCode": "US" })),
            RequestedState::Present,
        )
        .await
        .unwrap();

    assert_eq!(outcome.action, Action::Updated);
    assert_eq!(outcome.update.to_value(), json!({ "description": "new" }));
    assert_eq!(outcome.before.unwrap().get("description"), Some(&json!("")));
    assert_eq!(outcome.after.unwrap().get("description"), Some(&json!("new")));

    let writes = session.transport().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Patch);
    assert_eq!(writes[0].path, "rkszones/z3");
    assert_eq!(writes[0].body, Some(json!({ "description": "new" })));
}

#[tokio::test]
async fn test_put_mode_sends_full_document_without_server_fields() {
    let profile = json!({
        "id": "p1", "name": "log", "domainId": "d1",
        "createDateTime": 1_700_000_000, "port": 514, "protocol": "UDP"
    });
    let fake = FakeController::new().with_collection("apSyslogServerProfiles", vec![profile]);
    let session = connect(fake).await;
    let spec = ResourceSpec::new("apSyslogServerProfiles?domainId=d1")
        .update_mode(UpdateMode::Put)
        .server_owned(&["id", "domainId", "createDateTime"]);

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "log", "port": 1514 })), RequestedState::Present)
        .await
        .unwrap();

    assert_eq!(outcome.action, Action::Updated);
    let writes = session.transport().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Put);
    assert_eq!(writes[0].path, "apSyslogServerProfiles/p1");
    assert_eq!(
        writes[0].body,
        Some(json!({ "name": "log", "port": 1514, "protocol": "UDP" }))
    );
    // Listing kept its domain filter.
    assert!(
        session
            .transport()
            .calls()
            .iter()
            .any(|c| c.method == Method::Get && c.path == "apSyslogServerProfiles?domainId=d1")
    );
}

// ── Delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_absent_deletes_existing() {
    let fake = FakeController::new().with_collection("rkszones", vec![zone("z1", "A")]);
    let session = connect(fake).await;
    let spec = zones();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "A" })), RequestedState::Absent)
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.action, Action::Deleted);
    assert!(outcome.after.is_none());
    assert_eq!(session.transport().writes()[0].method, Method::Delete);
    assert!(session.transport().items("rkszones").is_empty());
}

#[tokio::test]
async fn test_absent_and_missing_makes_no_write() {
    let fake = FakeController::new().with_collection("rkszones", vec![zone("z1", "A")]);
    let session = connect(fake).await;
    let spec = zones();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "B" })), RequestedState::Absent)
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.action, Action::Unchanged);
    assert!(outcome.before.is_none() && outcome.after.is_none());
    assert!(session.transport().writes().is_empty());
}

// ── Check mode ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_check_mode_never_writes() {
    let fake = FakeController::new().with_collection("rkszones", vec![zone("z1", "A")]);
    let session = connect(fake).await;
    let spec = zones();
    let reconciler = Reconciler::new(&session, &spec).check_mode(true);

    let created = reconciler
        .reconcile(&desired(json!({ "name": "B" })), RequestedState::Present)
        .await
        .unwrap();
    let updated = reconciler
        .reconcile(&desired(json!({ "name": "A", "description": "x" })), RequestedState::Present)
        .await
        .unwrap();
    let deleted = reconciler
        .reconcile(&desired(json!({ "name": "A" })), RequestedState::Absent)
        .await
        .unwrap();

    assert_eq!(created.action, Action::Created);
    assert_eq!(created.after.unwrap().into_value(), json!({ "name": "B" }));
    assert_eq!(updated.action, Action::Updated);
    let projected = updated.after.unwrap();
    assert_eq!(projected.get("description"), Some(&json!("x")));
    assert_eq!(projected.get("countryCode"), Some(&json!("US")));
    assert_eq!(deleted.action, Action::Deleted);

    assert!(session.transport().writes().is_empty());
    assert_eq!(session.transport().items("rkszones"), vec![zone("z1", "A")]);
}

#[tokio::test]
async fn test_check_mode_still_fails_on_lookup_errors() {
    // No rkszones collection at all: the listing itself 404s.
    let session = connect(FakeController::new()).await;
    let spec = zones();

    let err = Reconciler::new(&session, &spec)
        .check_mode(true)
        .reconcile(&desired(json!({ "name": "A" })), RequestedState::Present)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Remote { status: 404, .. }));
}

// ── Secrets ─────────────────────────────────────────────────────────

fn radius_spec() -> ResourceSpec {
    ResourceSpec::new("rkszones/z1/aaa/radius")
        .compare("primary", Comparison::Subset)
        .secret(SecretField::new("primary.sharedSecret"))
}

fn radius_fake() -> FakeController {
    FakeController::new()
        .with_collection(
            "rkszones/z1/aaa/radius",
            vec![json!({
                "id": "r1",
                "name": "corp",
                "primary": { "ip": "10.0.0.1", "port": 1812, "sharedSecret": "old" }
            })],
        )
        .hiding("primary.sharedSecret")
}

#[tokio::test]
async fn test_secret_is_write_once() {
    let session = connect(radius_fake()).await;
    let spec = radius_spec();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(
            &desired(json!({
                "name": "corp",
                "primary": { "ip": "10.0.0.1", "port": 1812, "sharedSecret": "new" }
            })),
            RequestedState::Present,
        )
        .await
        .unwrap();

    assert!(!outcome.changed);
    assert!(session.transport().writes().is_empty());
}

#[tokio::test]
async fn test_secret_rotates_with_flag_and_flag_is_never_sent() {
    let session = connect(radius_fake()).await;
    let spec = radius_spec();

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(
            &desired(json!({
                "name": "corp",
                "primary": { "sharedSecret": "new", "sharedSecret_update": true }
            })),
            RequestedState::Present,
        )
        .await
        .unwrap();

    assert_eq!(outcome.action, Action::Updated);
    let writes = session.transport().writes();
    assert_eq!(
        writes[0].body,
        Some(json!({ "primary": { "ip": "10.0.0.1", "port": 1812, "sharedSecret": "new" } }))
    );
    // The update set is reported with the secret in it, but before/after are masked
    // wherever the controller echoed a value.
    assert!(outcome.update.contains("primary"));
    let stored = &session.transport().items("rkszones/z1/aaa/radius")[0];
    assert_eq!(stored["primary"]["sharedSecret"], "new");
}

#[tokio::test]
async fn test_reported_states_mask_secrets() {
    let fake = FakeController::new().with_collection("users", vec![]);
    let session = connect(fake).await;
    let spec = ResourceSpec::new("users")
        .lookup_query("users/query")
        .identity("userName")
        .secret(SecretField::new("password"));

    let outcome = Reconciler::new(&session, &spec)
        .reconcile(
            &desired(json!({ "userName": "ops", "password": "hunter2", "password_update": true })),
            RequestedState::Present,
        )
        .await
        .unwrap();

    assert_eq!(outcome.action, Action::Created);
    let writes = session.transport().writes();
    assert_eq!(writes[0].body, Some(json!({ "userName": "ops", "password": "hunter2" })));
    let after = outcome.after.unwrap();
    assert_eq!(after.get("password"), Some(&json!(MASK)));
}

#[tokio::test]
async fn test_query_lookup_matches_exact_user_name() {
    let fake = FakeController::new().with_collection(
        "users",
        vec![
            json!({ "id": "u1", "userName": "ops-admin" }),
            json!({ "id": "u2", "userName": "ops" }),
        ],
    );
    let session = connect(fake).await;
    let spec = ResourceSpec::new("users").lookup_query("users/query").identity("userName");

    let found = Reconciler::new(&session, &spec)
        .observe("ops", false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id(), Some("u2"));
}

// ── Singletons ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_singleton_patches_once_and_rereads() {
    let fake = FakeController::new().with_singleton(
        "system/syslog",
        json!({ "enabled": false, "primaryServer": "10.0.0.5" }),
    );
    let session = connect(fake).await;
    let spec = ResourceSpec::new("system/syslog");
    let reconciler = Reconciler::new(&session, &spec);
    let wanted = desired(json!({ "enabled": true }));

    let first = reconciler.reconcile_singleton(&wanted).await.unwrap();
    let second = reconciler.reconcile_singleton(&wanted).await.unwrap();

    assert_eq!(first.action, Action::Updated);
    assert_eq!(first.after.unwrap().get("enabled"), Some(&json!(true)));
    assert!(!second.changed);
    let writes = session.transport().writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, Method::Patch);
    assert_eq!(writes[0].body, Some(json!({ "enabled": true })));
}

#[tokio::test]
async fn test_singleton_check_mode_projects_locally() {
    let fake = FakeController::new()
        .with_singleton("system/snmpAgent", json!({ "snmpV2Agent": [], "enabled": false }));
    let session = connect(fake).await;
    let spec = ResourceSpec::new("system/snmpAgent").update_mode(UpdateMode::Put);

    let outcome = Reconciler::new(&session, &spec)
        .check_mode(true)
        .reconcile_singleton(&desired(json!({ "enabled": true })))
        .await
        .unwrap();

    assert!(outcome.changed);
    assert_eq!(
        outcome.after.unwrap().into_value(),
        json!({ "snmpV2Agent": [], "enabled": true })
    );
    assert!(session.transport().writes().is_empty());
    assert_eq!(session.transport().singleton("system/snmpAgent")["enabled"], false);
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_identity_is_validation_error() {
    let session = connect(FakeController::new().with_collection("rkszones", vec![])).await;
    let spec = zones();

    let err = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "description": "no name" })), RequestedState::Present)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::Validation { .. }));
    assert!(session.transport().calls().is_empty());
}

#[tokio::test]
async fn test_rejected_write_surfaces_remote_error() {
    let session = connect(FakeController::new().with_collection("rkszones", vec![])).await;
    // The double answers creates with 201; accept only 200 to force a rejection.
    let spec = zones().create_codes(&[200]);

    let err = Reconciler::new(&session, &spec)
        .reconcile(&desired(json!({ "name": "A" })), RequestedState::Present)
        .await
        .unwrap_err();

    match err {
        CoreError::Remote { method, path, status, .. } => {
            assert_eq!(method, "POST");
            assert_eq!(path, "rkszones");
            assert_eq!(status, 201);
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    // No re-read after a failed write.
    let last = session.transport().calls().last().cloned().unwrap();
    assert_eq!(last.method, Method::Post);
}
