//! Cross-deployment dispatch and return-path round trips

use axum::extract::{Query, State};
use axum::http::header::LOCATION;
use axum::Json;
use uuid::Uuid;

use skillspring_app::handlers::{self, LoginQuery, SignInRequest};
use skillspring_auth::RouteTable;
use skillspring_common::{Deployment, ValidatedJson};
use skillspring_directory::{Role, UserStore};
use skillspring_identity::mock::MockIdentity;

use crate::common::{TestApp, STUDENT_ROOT};

#[tokio::test]
async fn test_return_path_survives_gateway_and_sign_in() {
    // A signed-out student hits a deep link; the satellite forwards them
    // to the central portal with the location embedded...
    let satellite = TestApp::new(Deployment::Student);
    let deep_link = format!("{STUDENT_ROOT}course/42?tab=reviews");

    let response = handlers::login_gateway(
        State(satellite.state.clone()),
        Query(LoginQuery {
            redirect: Some(deep_link.clone()),
        }),
    )
    .await;

    let location = response
        .headers()
        .get(LOCATION)
        .expect("gateway must redirect")
        .to_str()
        .unwrap()
        .to_string();
    let portal_url = url::Url::parse(&location).unwrap();
    let carried = RouteTable::return_path(&portal_url).expect("return path embedded");
    assert_eq!(carried, deep_link);

    // ...and the portal sign-in lands them exactly there, not on a
    // default dashboard.
    let shell = TestApp::new(Deployment::Shell);
    let subject = Uuid::new_v4();
    shell.identity.register_credentials(
        "student@example.com",
        "hunter2hunter2",
        MockIdentity::session_for(subject, Some("student")),
    );
    shell.directory.put_role(subject, Role::Student);

    let Json(body) = handlers::sign_in(
        State(shell.state.clone()),
        ValidatedJson(SignInRequest {
            email: "student@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            redirect: Some(carried),
        }),
    )
    .await
    .expect("sign-in should succeed");

    assert_eq!(body["redirect_to"], deep_link);
}

#[tokio::test]
async fn test_sign_in_without_return_path_lands_on_role_root() {
    let shell = TestApp::new(Deployment::Shell);
    let subject = Uuid::new_v4();
    shell.identity.register_credentials(
        "admin@example.com",
        "hunter2hunter2",
        MockIdentity::session_for(subject, Some("admin")),
    );
    shell.directory.put_role(subject, Role::Admin);

    let Json(body) = handlers::sign_in(
        State(shell.state.clone()),
        ValidatedJson(SignInRequest {
            email: "admin@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            redirect: None,
        }),
    )
    .await
    .expect("sign-in should succeed");

    assert_eq!(body["redirect_to"], "https://admin.skillspring.app/");
}

#[tokio::test]
async fn test_sign_up_record_is_idempotent_against_trigger() {
    let shell = TestApp::new(Deployment::Shell);

    let Json(body) = handlers::sign_up(
        State(shell.state.clone()),
        ValidatedJson(handlers::SignUpRequest {
            email: "new-instructor@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            full_name: Some("New Instructor".to_string()),
            role: Role::Instructor,
            redirect: None,
        }),
    )
    .await
    .expect("sign-up should succeed");

    let subject: Uuid = serde_json::from_value(body["subject"].clone()).unwrap();
    assert_eq!(shell.directory.role_of(subject), Some(Role::Instructor));
    assert_eq!(body["redirect_to"], "https://teach.skillspring.app/");

    // The hosted trigger racing the same insert is a no-op, not an error.
    shell
        .directory
        .create_user(skillspring_directory::NewUserRecord {
            id: subject,
            email: "new-instructor@example.com".to_string(),
            full_name: None,
            role: Role::Student,
        })
        .await
        .expect("duplicate insert must be ignored");
    assert_eq!(shell.directory.role_of(subject), Some(Role::Instructor));
}
