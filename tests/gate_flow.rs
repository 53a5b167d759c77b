//! Lock gate behaviour against the in-memory store
//!
//! Instants are passed explicitly so expiry boundaries are exact.

use chrono::{Duration, Utc};
use shgate::auth::{hash_password, Access, LockGate, TOKEN_TTL_SECS};
use shgate::db::{AuditAction, DangerLevel, MemoryStore, Provenance, ScriptRecord, ScriptStore};
use shgate::GateError;
use std::sync::Arc;

fn locked(id: &str, path: &str, password: &str) -> ScriptRecord {
    let now = Utc::now();
    ScriptRecord {
        id: id.to_string(),
        path: path.to_string(),
        name: shgate::paths::leaf_name(path).to_string(),
        content: format!("echo {id}"),
        locked: true,
        password_hash: Some(hash_password(password).unwrap()),
        danger_level: DangerLevel::Caution,
        description: None,
        tags: None,
        requires: None,
        examples: None,
        created_at: now,
        updated_at: now,
    }
}

async fn setup() -> (Arc<MemoryStore>, LockGate, ScriptRecord, ScriptRecord) {
    let store = Arc::new(MemoryStore::new());
    let a = locked("a", "/vault/a.sh", "alpha");
    let b = locked("b", "/vault/b.sh", "bravo");
    store.create_script(&a).await.unwrap();
    store.create_script(&b).await.unwrap();
    let gate = LockGate::new(store.clone());
    (store, gate, a, b)
}

#[tokio::test]
async fn test_token_valid_until_just_before_expiry() {
    let (_store, gate, a, _b) = setup().await;
    let issued_at = Utc::now();
    let issued = gate
        .verify_password_at(&a, "alpha", Provenance::default(), issued_at)
        .await
        .unwrap();

    assert_eq!(issued.expires_at, issued_at + Duration::seconds(TOKEN_TTL_SECS));

    let just_before = issued.expires_at - Duration::seconds(1);
    let just_after = issued.expires_at + Duration::seconds(1);
    assert_eq!(
        gate.request_access_at(&a, Some(&issued.token), just_before).await.unwrap(),
        Access::Granted
    );
    assert_eq!(
        gate.request_access_at(&a, Some(&issued.token), issued.expires_at).await.unwrap(),
        Access::NeedsPassword
    );
    assert_eq!(
        gate.request_access_at(&a, Some(&issued.token), just_after).await.unwrap(),
        Access::NeedsPassword
    );
}

#[tokio::test]
async fn test_token_is_bound_to_one_script() {
    let (_store, gate, a, b) = setup().await;
    let issued = gate
        .verify_password(&a, "alpha", Provenance::default())
        .await
        .unwrap();

    assert_eq!(
        gate.request_access(&b, Some(&issued.token)).await.unwrap(),
        Access::NeedsPassword
    );
    assert_eq!(
        gate.request_access(&a, Some(&issued.token)).await.unwrap(),
        Access::Granted
    );
}

#[tokio::test]
async fn test_failed_attempts_are_audited_and_do_not_lock_out() {
    let (store, gate, a, _b) = setup().await;
    let provenance = Provenance {
        ip_address: Some("203.0.113.7".into()),
        user_agent: Some("curl/8.5.0".into()),
    };

    for wrong in ["a", "alph", "ALPHA"] {
        let err = gate
            .verify_password(&a, wrong, provenance.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::Unauthorized(_)));
    }
    assert_eq!(store.token_count(), 0);

    gate.verify_password(&a, "alpha", provenance.clone())
        .await
        .unwrap();
    assert_eq!(store.token_count(), 1);

    let entries = store.audit_entries();
    let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::UnlockFailed,
            AuditAction::UnlockFailed,
            AuditAction::UnlockFailed,
            AuditAction::UnlockSuccess,
        ]
    );
    assert!(entries.iter().all(|e| e.entity_path.as_deref() == Some("/vault/a.sh")));
    assert_eq!(entries[0].provenance, provenance);
}

#[tokio::test]
async fn test_each_unlock_mints_a_distinct_token() {
    let (_store, gate, a, _b) = setup().await;
    let first = gate.verify_password(&a, "alpha", Provenance::default()).await.unwrap();
    let second = gate.verify_password(&a, "alpha", Provenance::default()).await.unwrap();
    assert_ne!(first.token, second.token);
    assert_eq!(gate.request_access(&a, Some(&first.token)).await.unwrap(), Access::Granted);
}

#[tokio::test]
async fn test_sweep_removes_only_expired_tokens() {
    let (store, gate, a, _b) = setup().await;
    let long_ago = Utc::now() - Duration::hours(1);
    gate.verify_password_at(&a, "alpha", Provenance::default(), long_ago)
        .await
        .unwrap();
    let fresh = gate.verify_password(&a, "alpha", Provenance::default()).await.unwrap();

    assert_eq!(store.delete_expired_tokens(Utc::now()).await.unwrap(), 1);
    assert_eq!(store.token_count(), 1);
    assert_eq!(gate.request_access(&a, Some(&fresh.token)).await.unwrap(), Access::Granted);
}
