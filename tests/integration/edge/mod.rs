//! Edge-guard scenarios: the server-side twin of the client protocol

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use skillspring_auth::{GuardRejection, GuardedPage, RouteTable};
use skillspring_common::Deployment;
use skillspring_directory::Role;

use crate::common::{make_parts, TestApp, STUDENT_ROOT};

#[tokio::test]
async fn test_anonymous_protected_route_redirects_with_return_target() {
    let app = TestApp::new(Deployment::Instructor);

    let mut parts = make_parts("/courses/create", None);
    let rejection = match GuardedPage::from_request_parts(&mut parts, &app.state).await {
        Err(r) => r,
        Ok(_) => panic!("anonymous protected route must not render"),
    };

    let url = match rejection {
        GuardRejection::Redirect(url) => url,
        other => panic!("expected login redirect, got {other:?}"),
    };
    assert!(url
        .as_str()
        .starts_with("https://shop.skillspring.app/login"));
    assert_eq!(
        RouteTable::return_path(&url).as_deref(),
        Some("https://teach.skillspring.app/courses/create")
    );
}

#[tokio::test]
async fn test_stale_claim_is_overridden_by_deep_verification() {
    let app = TestApp::new(Deployment::Admin);
    let subject = Uuid::new_v4();

    // The token still claims admin, but the record store has demoted the
    // subject; the authoritative value decides.
    app.directory.put_role(subject, Role::Student);
    let token = app.jwt(subject, Some("admin"));

    let mut parts = make_parts("/dashboard", Some(&token));
    let rejection = match GuardedPage::from_request_parts(&mut parts, &app.state).await {
        Err(r) => r,
        Ok(_) => panic!("demoted subject must not render the admin app"),
    };

    match rejection {
        GuardRejection::Redirect(url) => assert_eq!(url.as_str(), STUDENT_ROOT),
        other => panic!("expected dispatch to student root, got {other:?}"),
    }
}

#[tokio::test]
async fn test_matching_authoritative_role_renders() {
    let app = TestApp::new(Deployment::Admin);
    let subject = Uuid::new_v4();
    app.directory.put_role(subject, Role::Admin);

    let token = app.jwt(subject, Some("admin"));
    let mut parts = make_parts("/dashboard", Some(&token));

    let GuardedPage(context) = GuardedPage::from_request_parts(&mut parts, &app.state)
        .await
        .expect("admin should render the admin app");
    let context = context.expect("context for authenticated request");
    assert_eq!(context.role(), Some(Role::Admin));
    assert!(context.resolution.is_authoritative());
}

#[tokio::test]
async fn test_unprovisioned_subject_waits_instead_of_denying() {
    let app = TestApp::new(Deployment::Student);
    let subject = Uuid::new_v4();

    // Record not created yet and no embedded claim: hold, don't bounce.
    let token = app.jwt(subject, None);
    let mut parts = make_parts("/courses", Some(&token));

    let rejection = match GuardedPage::from_request_parts(&mut parts, &app.state).await {
        Err(r) => r,
        Ok(_) => panic!("unknown role must not render"),
    };
    let response = match rejection {
        GuardRejection::Wait => GuardRejection::Wait.into_response(),
        other => panic!("expected wait, got {other:?}"),
    };
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
}

#[tokio::test]
async fn test_degraded_store_with_fast_claim_still_renders_own_app() {
    let app = TestApp::new(Deployment::Student);
    let subject = Uuid::new_v4();

    // The store is down; the provisional claim carries the student
    // through their own app rather than blanking the screen.
    app.directory.set_fail_fetch(true);
    let token = app.jwt(subject, Some("student"));
    let mut parts = make_parts("/courses", Some(&token));

    let GuardedPage(context) = GuardedPage::from_request_parts(&mut parts, &app.state)
        .await
        .expect("provisional role should render under store degradation");
    let context = context.expect("context present");
    assert_eq!(context.role(), Some(Role::Student));
    assert!(!context.resolution.is_authoritative());
}
