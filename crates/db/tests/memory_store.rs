//! Contract tests for the in-memory user and session stores.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use haggle_db::memory::{MemorySessionStore, MemoryUserStore};
use haggle_db::models::session::{RefreshSession, SessionStatus};
use haggle_db::models::user::{CreateUser, UpdateUser};
use haggle_db::{SessionStore, StoreError, UserStore};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_user(email: &str) -> CreateUser {
    CreateUser {
        name: "Alice".to_string(),
        email: email.to_string(),
        phone: "+10000000000".to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
        is_store: false,
    }
}

fn new_session(user_id: i64, expires_in: Duration) -> RefreshSession {
    let now = Utc::now();
    RefreshSession {
        id: Uuid::new_v4(),
        user_id,
        fingerprint: "fp1".to_string(),
        created_at: now,
        expires_at: now + expires_in,
        status: SessionStatus::Active,
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_insert_assigns_increasing_ids() {
    let store = MemoryUserStore::new();
    let a = store.insert(&new_user("a@x.com")).await.unwrap();
    let b = store.insert(&new_user("b@x.com")).await.unwrap();
    assert!(b > a);

    let found = store.get_by_email("b@x.com").await.unwrap().unwrap();
    assert_eq!(found.id, b);
    assert_eq!(store.get_by_id(a).await.unwrap().unwrap().email, "a@x.com");
}

#[tokio::test]
async fn duplicate_email_is_a_unique_violation() {
    let store = MemoryUserStore::new();
    store.insert(&new_user("a@x.com")).await.unwrap();

    let err = store.insert(&new_user("a@x.com")).await.unwrap_err();
    assert_matches!(err, StoreError::UniqueViolation(c) if c == "uq_users_email");
}

#[tokio::test]
async fn missing_user_lookups_return_none() {
    let store = MemoryUserStore::new();
    assert!(store.get_by_email("nobody@x.com").await.unwrap().is_none());
    assert!(store.get_by_id(99).await.unwrap().is_none());
    assert!(store
        .update(99, &UpdateUser::default())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn update_applies_only_provided_fields() {
    let store = MemoryUserStore::new();
    let id = store.insert(&new_user("a@x.com")).await.unwrap();

    let update = UpdateUser {
        name: Some("Bob".to_string()),
        ..Default::default()
    };
    let user = store.update(id, &update).await.unwrap().unwrap();
    assert_eq!(user.name, "Bob");
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.phone, "+10000000000");
}

#[tokio::test]
async fn update_to_taken_email_is_rejected() {
    let store = MemoryUserStore::new();
    store.insert(&new_user("a@x.com")).await.unwrap();
    let b = store.insert(&new_user("b@x.com")).await.unwrap();

    let update = UpdateUser {
        email: Some("a@x.com".to_string()),
        ..Default::default()
    };
    assert_matches!(
        store.update(b, &update).await,
        Err(StoreError::UniqueViolation(_))
    );
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_active_skips_expired_and_revoked() {
    let store = MemorySessionStore::new();
    let live = new_session(1, Duration::days(30));
    let expired = new_session(1, Duration::seconds(-5));
    let mut revoked = new_session(1, Duration::days(30));
    revoked.revoke(Utc::now() - Duration::seconds(1));
    let other_user = new_session(2, Duration::days(30));

    for s in [&live, &expired, &revoked, &other_user] {
        store.insert(s).await.unwrap();
    }

    let active = store.list_active_by_user(1).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, live.id);
}

#[tokio::test]
async fn revoke_all_only_touches_active_sessions_of_the_user() {
    let store = MemorySessionStore::new();
    for _ in 0..3 {
        store.insert(&new_session(1, Duration::days(30))).await.unwrap();
    }
    store.insert(&new_session(1, Duration::seconds(-5))).await.unwrap();
    store.insert(&new_session(2, Duration::days(30))).await.unwrap();

    assert_eq!(store.revoke_all_active_by_user(1).await.unwrap(), 3);
    assert!(store.list_active_by_user(1).await.unwrap().is_empty());
    assert_eq!(store.list_active_by_user(2).await.unwrap().len(), 1);
    // Soft revocation: nothing was removed.
    assert_eq!(store.all_for_user(1).await.len(), 4);
}

#[tokio::test]
async fn update_is_conditional_on_not_being_revoked() {
    let store = MemorySessionStore::new();
    let session = new_session(1, Duration::days(30));
    store.insert(&session).await.unwrap();

    let mut first = session.clone();
    first.revoke(Utc::now());
    let stored = store.update(&first).await.unwrap();
    assert!(stored.is_some());

    let mut second = session.clone();
    second.revoke(Utc::now());
    assert!(
        store.update(&second).await.unwrap().is_none(),
        "second revocation must lose"
    );

    let current = store.get_by_id(session.id).await.unwrap().unwrap();
    assert_eq!(current.status, first.status);
}

#[tokio::test]
async fn update_with_active_status_is_illegal() {
    let store = MemorySessionStore::new();
    let session = new_session(1, Duration::days(30));
    store.insert(&session).await.unwrap();

    assert_matches!(
        store.update(&session).await,
        Err(StoreError::IllegalTransition)
    );
}

#[tokio::test]
async fn duplicate_session_id_is_rejected() {
    let store = MemorySessionStore::new();
    let session = new_session(1, Duration::days(30));
    store.insert(&session).await.unwrap();
    assert_matches!(
        store.insert(&session).await,
        Err(StoreError::UniqueViolation(_))
    );
}
