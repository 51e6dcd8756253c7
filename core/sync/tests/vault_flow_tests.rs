//! End-to-end client tests against an in-process fake service.

mod common;

use serde_json::json;
use std::sync::Arc;

use common::{client, logged_in, FakeServer, FakeUser};
use passvault_api::Method;
use passvault_common::{Error, ItemId, Operation, Secret, VaultDraft};
use passvault_session::{SessionStore, SqliteStore};
use passvault_sync::VaultClient;

fn server_with(users: &[FakeUser]) -> FakeServer {
    let server = FakeServer::new();
    for user in users {
        server.add_user(user.clone());
    }
    server
}

fn draft(title: &str, secret: &str) -> VaultDraft {
    VaultDraft::new(title)
        .with_username("alice@example.com")
        .with_secret(Secret::new(secret))
}

#[tokio::test]
async fn test_crud_round_trip() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;

    let created = client.vault().create(&draft("Mail", "s3cret")).await.unwrap();
    let id = created.id.clone().unwrap();
    assert_eq!(client.vault().cached().await.len(), 1);

    let fetched = client.vault().get(&id).await.unwrap();
    assert_eq!(fetched.title, "Mail");
    assert_eq!(fetched.username.as_deref(), Some("alice@example.com"));

    let renamed = VaultDraft {
        title: "Work mail".to_string(),
        ..VaultDraft::from_item(&fetched)
    };
    client.vault().update(&id, &renamed).await.unwrap();
    assert_eq!(client.vault().cached().await[0].title, "Work mail");

    client.vault().delete(&id).await.unwrap();
    assert!(client.vault().cached().await.is_empty());

    let err = client.vault().get(&id).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_update_with_empty_secret_keeps_password() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;

    let created = client.vault().create(&draft("Bank", "original")).await.unwrap();
    let id = created.id.clone().unwrap();

    client
        .vault()
        .update(&id, &VaultDraft::from_item(&created))
        .await
        .unwrap();

    let put = server
        .requests()
        .into_iter()
        .find(|r| r.method == Method::PUT)
        .unwrap();
    assert_eq!(put.body.unwrap()["password"], json!(""));

    let after = client.vault().get(&id).await.unwrap();
    assert_eq!(after.title, created.title);
    assert_eq!(after.username, created.username);
    assert_eq!(server.stored_secret(id.as_str()).as_deref(), Some("original"));

    let rotated = VaultDraft::from_item(&after).with_secret(Secret::new("rotated"));
    client.vault().update(&id, &rotated).await.unwrap();
    assert_eq!(server.stored_secret(id.as_str()).as_deref(), Some("rotated"));
}

#[tokio::test]
async fn test_expired_session_clears_once() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;
    client.vault().create(&draft("Mail", "pw")).await.unwrap();

    server.expire_tokens();
    let before = server.request_count();

    let err = client.vault().list().await.unwrap_err();
    assert!(matches!(err, Error::SessionExpired));
    assert!(err.requires_login());
    assert_eq!(server.request_count() - before, 1);
    assert!(client.session().current().await.is_none());
    assert!(client.session().cached_plan().await.is_none());
    assert!(client.vault().cached().await.is_empty());

    // Without a session the next call is simply unauthorized.
    let err = client.vault().list().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 401, .. }));
}

#[tokio::test]
async fn test_partial_import_is_data() {
    let server = server_with(&[FakeUser::premium("alice")]);
    server.reject_import_title("B");
    let client = logged_in(&server, "alice").await;

    let document = json!({
        "username": "alice",
        "items": [
            {"title": "A", "password": "a"},
            {"title": "B", "password": "b"},
            {"title": "C", "password": "c"}
        ]
    });
    let result = client.transfer().import(&document).await.unwrap();

    assert_eq!(result.imported_count, 2);
    assert_eq!(result.error_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].index, Some(1));
    assert!(result.errors[0].reason.contains("Rejected by server"));

    assert_eq!(client.vault().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_export_document() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;
    client.vault().create(&draft("Mail", "pw")).await.unwrap();

    let exported = client.transfer().export().await.unwrap();
    assert_eq!(exported.file_name, "vault-export.json");

    let document = exported.document().unwrap();
    assert_eq!(document.item_count, Some(1));
    assert_eq!(document.items[0]["password"], json!("pw"));

    // The exported document can be imported back.
    let text = String::from_utf8(exported.content).unwrap();
    let result = client.transfer().import_str(&text).await.unwrap();
    assert_eq!(result.imported_count, 1);
}

#[tokio::test]
async fn test_export_failure_disguised_as_success() {
    let server = server_with(&[FakeUser::premium("alice")]);
    server.fail_export_with("quota exceeded");
    let client = logged_in(&server, "alice").await;

    let err = client.transfer().export().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 200, .. }));
    assert_eq!(err.user_message(Operation::Export), "quota exceeded");
}

#[tokio::test]
async fn test_server_rejection_leaves_cache_unchanged() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;
    client.vault().create(&draft("One", "pw")).await.unwrap();

    // The plan shrinks on the server; the client still holds the old one.
    server.set_limits(
        "alice",
        json!({"maxVaultItems": 1, "maxPasswordLength": 64,
               "canExport": true, "canImport": true, "canShare": true}),
    );
    let listings_before = server
        .requests()
        .iter()
        .filter(|r| r.method == Method::GET && r.path == "/vault")
        .count();

    let err = client.vault().create(&draft("Two", "pw")).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 403, .. }));
    assert!(err
        .user_message(Operation::CreateItem)
        .starts_with("Maximum vault items limit (1)"));

    let cached = client.vault().cached().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].title, "One");
    let listings_after = server
        .requests()
        .iter()
        .filter(|r| r.method == Method::GET && r.path == "/vault")
        .count();
    assert_eq!(listings_before, listings_after);
}

#[tokio::test]
async fn test_free_plan_refused_locally() {
    let server = server_with(&[FakeUser::free("bob")]);
    let client = logged_in(&server, "bob").await;

    client.vault().create(&draft("One", "pw")).await.unwrap();
    client.vault().create(&draft("Two", "pw")).await.unwrap();
    let before = server.request_count();

    let err = client.vault().create(&draft("Three", "pw")).await.unwrap_err();
    assert_eq!(
        err.user_message(Operation::CreateItem),
        "Maximum vault items limit (2) reached for your plan. Please upgrade."
    );
    assert!(matches!(
        client.transfer().export().await,
        Err(Error::PlanLimitExceeded(_))
    ));
    assert!(matches!(
        client.transfer().import(&json!({"items": []})).await,
        Err(Error::PlanLimitExceeded(_))
    ));
    let id = client.vault().cached().await[0].id.clone().unwrap();
    assert!(matches!(
        client.shares().share(&id, "alice", false).await,
        Err(Error::PlanLimitExceeded(_))
    ));

    assert_eq!(server.request_count(), before);
}

#[tokio::test]
async fn test_late_listing_after_logout_is_dropped() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;
    client.vault().create(&draft("Mail", "pw")).await.unwrap();

    server.logout_during_next_list(client.session().clone());

    let err = client.vault().list().await.unwrap_err();
    assert!(matches!(err, Error::SessionChanged));
    assert!(client.session().current().await.is_none());
    assert!(client.vault().cached().await.is_empty());
}

#[tokio::test]
async fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("session.db");
    let server = server_with(&[FakeUser::premium("alice")]);

    {
        let store = SessionStore::open(SqliteStore::open(&db).unwrap()).unwrap();
        let client = VaultClient::with_parts(Arc::new(store), Arc::new(server.clone()));
        client
            .auth()
            .login("alice", &Secret::new("alice-pw"))
            .await
            .unwrap();
        client.vault().create(&draft("Mail", "pw")).await.unwrap();
    }

    let store = SessionStore::open(SqliteStore::open(&db).unwrap()).unwrap();
    let client = VaultClient::with_parts(Arc::new(store), Arc::new(server.clone()));

    assert_eq!(client.session().cached_plan().await.unwrap().name, "Premium");
    assert_eq!(client.vault().list().await.unwrap().len(), 1);

    client.auth().logout().await.unwrap();
    let store = SessionStore::open(SqliteStore::open(&db).unwrap()).unwrap();
    assert!(store.current().await.is_none());
}

#[tokio::test]
async fn test_bearer_sent_only_with_session() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = logged_in(&server, "alice").await;
    client.vault().list().await.unwrap();
    client.auth().logout().await.unwrap();
    let _ = client.vault().list().await;

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].bearer.is_none());
    assert!(requests[1].bearer.is_some());
    assert!(requests[2].bearer.is_none());
}

#[tokio::test]
async fn test_login_without_limits_loads_plan() {
    let user = FakeUser {
        limits_in_login: false,
        ..FakeUser::premium("alice")
    };
    let server = server_with(&[user]);
    let client = logged_in(&server, "alice").await;

    let plan = client.session().cached_plan().await.unwrap();
    assert_eq!(plan.name, "Premium");
    assert!(plan.can_share);
    assert_eq!(server.requests()[1].path, "/user/plan");
}

#[tokio::test]
async fn test_wrong_password() {
    let server = server_with(&[FakeUser::premium("alice")]);
    let client = client(&server);

    let err = client
        .auth()
        .login("alice", &Secret::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(
        err.user_message(Operation::Login),
        "Invalid username or password"
    );
    assert!(client.session().current().await.is_none());
}

#[tokio::test]
async fn test_share_and_receive() {
    let server = server_with(&[FakeUser::premium("alice"), FakeUser::premium("bob")]);
    let alice = logged_in(&server, "alice").await;
    let created = alice.vault().create(&draft("Team wifi", "pw")).await.unwrap();
    let id = created.id.unwrap();

    alice.shares().share(&id, "bob", true).await.unwrap();

    let err = alice.shares().share(&id, "carol", false).await.unwrap_err();
    assert_eq!(err.user_message(Operation::Share), "User not found");

    let bob = logged_in(&server, "bob").await;
    let received = bob.shares().received().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].shared_by_username, "alice");
    assert!(received[0].can_edit);
    assert_eq!(received[0].vault_item.id.as_ref(), Some(&id));

    assert!(bob.vault().list().await.unwrap().is_empty());
    let missing = ItemId::new("999").unwrap();
    assert!(matches!(
        bob.vault().get(&missing).await,
        Err(Error::Api { status: 404, .. })
    ));
}
