use super::*;

use shared::domain::{AccountId, GroupRef, SessionToken};

fn record(identity: &str) -> AccountRecord {
    AccountRecord::new(AccountId::new(identity), None)
}

#[tokio::test]
async fn missing_file_loads_as_empty_pool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("accounts.json"));
    let records = store.load().await.expect("load");
    assert!(records.is_empty());
}

#[tokio::test]
async fn saves_and_reloads_records() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("accounts.json"));

    let mut alice = AccountRecord::new(
        AccountId::new("+15550000001"),
        Some(SessionToken::new(b"alice-token".to_vec())),
    );
    alice.active = true;
    alice.joined_groups.push(GroupRef::new("@rustaceans"));
    let bob = record("+15550000002");

    store
        .save(&[alice.clone(), bob.clone()])
        .await
        .expect("save");
    let reloaded = store.load().await.expect("load");
    assert_eq!(reloaded, vec![alice, bob]);
}

#[tokio::test]
async fn creates_parent_directories_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("state").join("pool").join("accounts.json"));
    store.save(&[record("+15550000003")]).await.expect("save");
    assert!(store.path().exists());
}

#[tokio::test]
async fn tokens_are_stored_as_base64_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("accounts.json"));
    let account = AccountRecord::new(
        AccountId::new("+15550000004"),
        Some(SessionToken::new(vec![1, 2, 3])),
    );
    store.save(&[account]).await.expect("save");

    let raw = fs::read_to_string(store.path()).await.expect("read");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value[0]["identity"], serde_json::json!("+15550000004"));
    assert_eq!(value[0]["token"], serde_json::json!("AQID"));
    assert_eq!(value[0]["active"], serde_json::json!(false));
    assert_eq!(value[0]["joined_groups"], serde_json::json!([]));
}

#[tokio::test]
async fn corrupt_store_is_an_error_not_an_empty_pool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("accounts.json");
    std::fs::write(&path, b"{ not json").expect("write garbage");

    let store = CredentialStore::new(path);
    store.load().await.expect_err("corrupt store must fail");
}

#[tokio::test]
async fn save_replaces_the_whole_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("accounts.json"));

    store
        .save(&[record("+15550000005"), record("+15550000006")])
        .await
        .expect("first save");
    store.save(&[record("+15550000006")]).await.expect("second save");

    let reloaded = store.load().await.expect("load");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].identity, AccountId::new("+15550000006"));
}
