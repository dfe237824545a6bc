//! Bootstrap and role-resolution scenarios over the full app state

use std::time::Duration;

use uuid::Uuid;

use skillspring_auth::{AccessDecision, AccessGuard, AuthSnapshot, RoleResolution};
use skillspring_common::Deployment;
use skillspring_directory::Role;
use skillspring_identity::{mock::MockIdentity, SessionEventKind};

use crate::common::TestApp;

async fn wait_for(
    app: &TestApp,
    what: &str,
    predicate: impl Fn(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    let mut rx = app.state.session.subscribe();
    let snap = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| predicate(s)))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("snapshot channel closed");
    snap.clone()
}

#[tokio::test(start_paused = true)]
async fn test_authoritative_reconciliation_flips_guard_decision() {
    let app = TestApp::new(Deployment::Admin);
    let guard = AccessGuard::for_deployment(Deployment::Admin, app.state.routes.clone());
    let subject = Uuid::new_v4();

    // Stale embedded claim says student; the record store says admin.
    app.directory.put_role(subject, Role::Admin);
    app.directory.set_delay(Some(Duration::from_secs(5)));
    app.identity.emit(
        SessionEventKind::SignedIn,
        Some(MockIdentity::session_for(subject, Some("student"))),
    );

    // Fast path lands first and the admin route is denied under it.
    let provisional = wait_for(&app, "fast-path role", |s| s.role().is_some()).await;
    assert_eq!(provisional.role(), Some(Role::Student));
    assert!(!provisional.loading);
    assert!(matches!(
        guard.check("/dashboard", &provisional),
        AccessDecision::RedirectForbidden { .. }
    ));

    // The authoritative result supersedes it and the decision flips.
    let reconciled = wait_for(&app, "authoritative role", |s| {
        s.resolution.is_authoritative()
    })
    .await;
    assert_eq!(reconciled.role(), Some(Role::Admin));
    assert_eq!(guard.check("/dashboard", &reconciled), AccessDecision::Allow);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_liveness_and_restrictive_guard() {
    let app = TestApp::new(Deployment::Student);
    let guard = AccessGuard::for_deployment(Deployment::Student, app.state.routes.clone());
    let subject = Uuid::new_v4();

    // No embedded claim, no cache, and a store hung far past every bound.
    app.directory.put_role(subject, Role::Student);
    app.directory.set_delay(Some(Duration::from_secs(600)));
    app.identity.emit(
        SessionEventKind::SignedIn,
        Some(MockIdentity::session_for(subject, None)),
    );

    // Loading still ends: the ceiling guarantees liveness while the
    // query is pending.
    let released = wait_for(&app, "loading released", |s| {
        s.session_present() && !s.loading
    })
    .await;
    assert_eq!(released.role(), None);

    // Under uncertainty the guard holds the route; it never allows.
    assert_eq!(guard.check("/courses", &released), AccessDecision::Wait);

    let timed_out = wait_for(&app, "timed-out resolution", |s| {
        s.resolution == RoleResolution::TimedOut
    })
    .await;
    assert_eq!(guard.check("/courses", &timed_out), AccessDecision::Wait);
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_discards_in_flight_resolution() {
    let app = TestApp::new(Deployment::Student);
    let subject = Uuid::new_v4();

    app.directory.put_role(subject, Role::Student);
    app.directory.set_delay(Some(Duration::from_secs(5)));
    app.identity.emit(
        SessionEventKind::SignedIn,
        Some(MockIdentity::session_for(subject, Some("student"))),
    );

    wait_for(&app, "fast-path role", |s| s.role().is_some()).await;

    // Sign out while the authoritative query is still in flight; its late
    // result must not resurrect a role for a session that is gone.
    app.identity.emit(SessionEventKind::SignedOut, None);
    let cleared = wait_for(&app, "signed-out state", |s| !s.session_present()).await;
    assert_eq!(cleared.resolution, RoleResolution::Unresolved);

    // Give the stale worker time to finish and (incorrectly) apply.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let final_state = app.state.session.snapshot();
    assert!(!final_state.session_present());
    assert_eq!(final_state.resolution, RoleResolution::Unresolved);
}

#[tokio::test]
async fn test_cache_written_after_success_then_serves_fast_path() {
    let app = TestApp::new(Deployment::Instructor);
    let subject = Uuid::new_v4();
    app.directory.put_role(subject, Role::Instructor);

    // No embedded claim: the first resolution is purely authoritative.
    app.identity.emit(
        SessionEventKind::SignedIn,
        Some(MockIdentity::session_for(subject, None)),
    );
    wait_for(&app, "authoritative role", |s| {
        s.resolution.is_authoritative()
    })
    .await;
    assert_eq!(app.state.cache.get(subject).await, Some(Role::Instructor));

    // The store degrades; a fresh observation still unblocks from the
    // cache, and the failed re-verification leaves the entry untouched.
    app.directory.set_fail_fetch(true);
    app.identity.emit(
        SessionEventKind::TokenRefreshed,
        Some(MockIdentity::session_for(subject, None)),
    );

    let fast = wait_for(&app, "cache-served role", |s| {
        s.role() == Some(Role::Instructor) && !s.resolution.is_authoritative()
    })
    .await;
    assert_eq!(fast.resolution, RoleResolution::FastResolved(Role::Instructor));
    assert_eq!(app.state.cache.get(subject).await, Some(Role::Instructor));
}

#[tokio::test]
async fn test_missing_record_is_unknown_not_fatal() {
    let app = TestApp::new(Deployment::Student);
    let guard = AccessGuard::for_deployment(Deployment::Student, app.state.routes.clone());
    let subject = Uuid::new_v4();

    // Sign-up trigger race: the session exists before the record does.
    app.identity.emit(
        SessionEventKind::SignedIn,
        Some(MockIdentity::session_for(subject, None)),
    );

    let unresolved = wait_for(&app, "released without role", |s| {
        s.session_present() && !s.loading
    })
    .await;
    assert_eq!(unresolved.resolution, RoleResolution::Unresolved);
    assert_eq!(guard.check("/courses", &unresolved), AccessDecision::Wait);

    // The trigger lands and the next observation resolves normally.
    app.directory.put_role(subject, Role::Student);
    app.identity.emit(
        SessionEventKind::TokenRefreshed,
        Some(MockIdentity::session_for(subject, None)),
    );
    let resolved = wait_for(&app, "authoritative role", |s| {
        s.resolution.is_authoritative()
    })
    .await;
    assert_eq!(guard.check("/courses", &resolved), AccessDecision::Allow);
}
