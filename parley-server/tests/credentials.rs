//! Credential store: load, register, authenticate, reload-on-append.

use std::io::Write;

use parley_server::credentials::{CredentialError, CredentialStore};
use tempfile::tempdir;

#[test]
fn open_loads_existing_records_and_creates_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.txt");
    std::fs::write(&path, "alice:pw1\nbob:pw2\nmalformed-line\n").unwrap();

    let store = CredentialStore::open(&path).unwrap();
    assert!(store.authenticate("alice", "pw1"));
    assert!(store.authenticate("bob", "pw2"));
    assert!(!store.contains("malformed-line"));

    let fresh = dir.path().join("new-users.txt");
    let store = CredentialStore::open(&fresh).unwrap();
    assert!(fresh.exists());
    assert!(!store.contains("anyone"));
}

#[test]
fn register_then_login_with_same_credentials_succeeds() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("users.txt")).unwrap();

    store.register("alice", "pw1").unwrap();
    assert!(store.authenticate("alice", "pw1"));
    assert!(!store.authenticate("alice", "wrong"));
    assert!(!store.authenticate("unknown", "pw1"));
}

#[test]
fn duplicate_username_is_rejected_never_overwritten() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("users.txt")).unwrap();

    store.register("alice", "pw1").unwrap();
    let err = store.register("alice", "pw2").unwrap_err();
    assert!(matches!(err, CredentialError::UsernameTaken));

    // The original password still stands.
    assert!(store.authenticate("alice", "pw1"));
    assert!(!store.authenticate("alice", "pw2"));
}

#[test]
fn register_appends_durably() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.txt");
    let store = CredentialStore::open(&path).unwrap();

    store.register("alice", "pw1").unwrap();
    store.register("bob", "pw2").unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "alice:pw1\nbob:pw2\n");

    // A second store opened on the same file sees both records.
    let reopened = CredentialStore::open(&path).unwrap();
    assert!(reopened.authenticate("alice", "pw1"));
    assert!(reopened.authenticate("bob", "pw2"));
}

#[test]
fn register_picks_up_concurrent_appends() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.txt");
    let store = CredentialStore::open(&path).unwrap();

    // Another writer appends behind our back.
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    writeln!(file, "carol:pw3").unwrap();
    drop(file);

    assert!(!store.authenticate("carol", "pw3"));
    store.register("dave", "pw4").unwrap();
    assert!(store.authenticate("carol", "pw3"));
    assert!(store.authenticate("dave", "pw4"));
}

#[test]
fn authentication_is_exact_equality() {
    let dir = tempdir().unwrap();
    let store = CredentialStore::open(dir.path().join("users.txt")).unwrap();

    store.register("eve", "Secret").unwrap();
    assert!(store.authenticate("eve", "Secret"));
    assert!(!store.authenticate("eve", "secret"));
    assert!(!store.authenticate("eve", "Secret "));
}
