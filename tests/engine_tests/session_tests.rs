//! Tests for sessions and access control
//!
//! These tests verify:
//! - Without an admin password every session is admin
//! - AUTH grants admin rights; admin-only commands are refused before it
//! - SELECT rules for password-protected and private namespaces
//! - NSINFO visibility

use zerokv::protocol::Frame;

use crate::{rejected, run, setup_protected_engine, setup_temp_engine};

// =============================================================================
// Admin Tests
// =============================================================================

#[test]
fn test_open_engine_sessions_are_admin() {
    let (_temp, engine) = setup_temp_engine();
    let session = engine.session().unwrap();

    assert!(session.is_admin());
    assert!(session.is_writable());
    assert_eq!(session.namespace().name(), "default");
}

#[test]
fn test_auth_without_admin_password() {
    let (_temp, engine) = setup_temp_engine();
    let mut session = engine.session().unwrap();

    assert_eq!(
        rejected(&engine, &mut session, &["AUTH", "anything"]),
        "Authentication is not enabled"
    );
}

#[test]
fn test_admin_commands_require_auth() {
    let (_temp, engine) = setup_protected_engine("root-secret");
    let mut session = engine.session().unwrap();
    assert!(!session.is_admin());

    assert_eq!(rejected(&engine, &mut session, &["NSNEW", "ns"]), "Permission denied");
    assert_eq!(
        rejected(&engine, &mut session, &["NSSET", "default", "public", "0"]),
        "Permission denied"
    );
    assert_eq!(
        rejected(&engine, &mut session, &["SET", "k", "v", "1000"]),
        "Permission denied"
    );

    assert_eq!(rejected(&engine, &mut session, &["AUTH", "wrong"]), "Permission denied");
    assert!(!session.is_admin());

    assert_eq!(run(&engine, &mut session, &["AUTH", "root-secret"]).unwrap(), Frame::ok());
    assert!(session.is_admin());
    assert_eq!(run(&engine, &mut session, &["NSNEW", "ns"]).unwrap(), Frame::ok());
    run(&engine, &mut session, &["SET", "k", "v", "1000"]).unwrap();
}

#[test]
fn test_regular_commands_without_auth() {
    let (_temp, engine) = setup_protected_engine("root-secret");
    let mut session = engine.session().unwrap();

    // default namespace has no password: full access
    assert!(session.is_writable());
    run(&engine, &mut session, &["SET", "k", "v"]).unwrap();
    assert_eq!(run(&engine, &mut session, &["GET", "k"]).unwrap(), Frame::bulk("v"));
    assert_eq!(run(&engine, &mut session, &["PING"]).unwrap(), Frame::Simple("PONG".to_string()));
}

// =============================================================================
// SELECT Tests
// =============================================================================

/// Engine with an admin password and a namespace `vault` protected by
/// `vault-pw`; returns the engine after preparing `vault` as admin.
fn setup_vault(public: bool) -> (tempfile::TempDir, zerokv::Engine) {
    let (temp, engine) = setup_protected_engine("root-secret");
    let mut admin = engine.session().unwrap();
    run(&engine, &mut admin, &["AUTH", "root-secret"]).unwrap();
    run(&engine, &mut admin, &["NSNEW", "vault"]).unwrap();
    run(&engine, &mut admin, &["SELECT", "vault"]).unwrap();
    run(&engine, &mut admin, &["SET", "gold", "bar"]).unwrap();
    run(&engine, &mut admin, &["NSSET", "vault", "password", "vault-pw"]).unwrap();
    let public = if public { "1" } else { "0" };
    run(&engine, &mut admin, &["NSSET", "vault", "public", public]).unwrap();
    (temp, engine)
}

#[test]
fn test_select_with_password_is_read_write() {
    let (_temp, engine) = setup_vault(true);
    let mut session = engine.session().unwrap();

    run(&engine, &mut session, &["SELECT", "vault", "vault-pw"]).unwrap();

    assert!(session.is_writable());
    run(&engine, &mut session, &["SET", "silver", "coin"]).unwrap();
}

#[test]
fn test_select_public_without_password_is_read_only() {
    let (_temp, engine) = setup_vault(true);
    let mut session = engine.session().unwrap();

    run(&engine, &mut session, &["SELECT", "vault"]).unwrap();

    assert!(!session.is_writable());
    assert_eq!(run(&engine, &mut session, &["GET", "gold"]).unwrap(), Frame::bulk("bar"));
    assert_eq!(
        rejected(&engine, &mut session, &["SET", "silver", "coin"]),
        "Namespace is in read-only mode"
    );
    assert_eq!(
        rejected(&engine, &mut session, &["DEL", "gold"]),
        "Namespace is in read-only mode"
    );

    // the key is validated before the session's rights
    let long_key = "k".repeat(256);
    assert_eq!(
        rejected(&engine, &mut session, &["SET", long_key.as_str(), "coin"]),
        "Key too large"
    );
}

#[test]
fn test_select_private_namespace() {
    let (_temp, engine) = setup_vault(false);
    let mut session = engine.session().unwrap();

    assert_eq!(rejected(&engine, &mut session, &["SELECT", "vault"]), "Permission denied");
    assert_eq!(
        rejected(&engine, &mut session, &["SELECT", "vault", "nope"]),
        "Permission denied"
    );

    // failed selects keep the previous namespace
    assert_eq!(session.namespace().name(), "default");

    run(&engine, &mut session, &["SELECT", "vault", "vault-pw"]).unwrap();
    assert_eq!(session.namespace().name(), "vault");
}

#[test]
fn test_wrong_password_on_public_namespace() {
    let (_temp, engine) = setup_vault(true);
    let mut session = engine.session().unwrap();

    assert_eq!(
        rejected(&engine, &mut session, &["SELECT", "vault", "nope"]),
        "Permission denied"
    );
}

#[test]
fn test_admin_selects_anything() {
    let (_temp, engine) = setup_vault(false);
    let mut session = engine.session().unwrap();
    run(&engine, &mut session, &["AUTH", "root-secret"]).unwrap();

    run(&engine, &mut session, &["SELECT", "vault"]).unwrap();

    assert!(session.is_writable());
}

#[test]
fn test_password_can_be_cleared() {
    let (_temp, engine) = setup_vault(false);
    let mut admin = engine.session().unwrap();
    run(&engine, &mut admin, &["AUTH", "root-secret"]).unwrap();
    run(&engine, &mut admin, &["NSSET", "vault", "password", "*"]).unwrap();

    let mut session = engine.session().unwrap();
    run(&engine, &mut session, &["SELECT", "vault"]).unwrap();
    assert!(session.is_writable());
}

// =============================================================================
// NSINFO Visibility Tests
// =============================================================================

#[test]
fn test_nsinfo_visibility() {
    let (_temp, engine) = setup_vault(false);
    let mut session = engine.session().unwrap();

    // public namespaces are visible to anyone
    run(&engine, &mut session, &["NSINFO", "default"]).unwrap();

    assert_eq!(
        rejected(&engine, &mut session, &["NSINFO", "vault"]),
        "Permission denied"
    );

    // the selected namespace is always visible
    run(&engine, &mut session, &["SELECT", "vault", "vault-pw"]).unwrap();
    run(&engine, &mut session, &["NSINFO", "vault"]).unwrap();
}
