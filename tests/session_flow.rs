mod common;

use axum::http::{Method, StatusCode};
use chrono::NaiveDate;
use common::{signed_in_context, signed_out_context, MockBackend};
use serde_json::json;
use vaultx_client::models::{Credentials, RegistrationForm, UserId};
use vaultx_client::navigator::{GuardState, Route};
use vaultx_client::{ClientError, ValidationError};

fn credentials() -> Credentials {
    Credentials {
        email: "ann@bank.test".into(),
        password: "secret1".into(),
    }
}

fn form() -> RegistrationForm {
    RegistrationForm {
        first_name: "Ann".into(),
        last_name: "Lee".into(),
        email: "ann@bank.test".into(),
        password: "abc123".into(),
        confirm_password: "abc123".into(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 1),
        ..Default::default()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

#[tokio::test]
async fn sign_in_then_current_session_returns_issued_token() {
    let backend = MockBackend::spawn(|req| {
        assert!(req.is(Method::POST, "/auth/login"));
        (
            StatusCode::OK,
            json!({
                "success": true,
                "token": "issued-token",
                "userId": 12,
                "email": "ann@bank.test",
                "firstName": "Ann",
                "lastName": "Lee",
                "roles": ["USER"],
                "customer": null
            }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    let session = ctx.session().sign_in(&credentials()).await.unwrap();
    assert_eq!(session.token, "issued-token");

    let current = ctx.session().current_session().unwrap();
    assert_eq!(current.token, "issued-token");
    assert_eq!(current.user_id, Some(UserId::Number(12)));
    assert!(!ctx.session().is_signing_in());

    let login = &backend.requests()[0];
    assert_eq!(login.authorization, None);
    assert_eq!(login.body.as_ref().unwrap()["email"], "ann@bank.test");
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    let backend = MockBackend::spawn(|_| (StatusCode::OK, json!({}))).await;
    let ctx = signed_in_context(&backend.base_url);
    assert!(ctx.session().is_authenticated());

    ctx.session().sign_out().unwrap();
    assert_eq!(ctx.session().current_session(), None);
    ctx.session().sign_out().unwrap();
    assert_eq!(ctx.session().current_session(), None);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn rejected_login_leaves_storage_untouched() {
    let backend = MockBackend::spawn(|_| {
        (
            StatusCode::UNAUTHORIZED,
            json!({ "success": false, "message": "Bad credentials" }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    let err = ctx.session().sign_in(&credentials()).await.unwrap_err();
    match err {
        ClientError::InvalidCredentials(message) => assert_eq!(message, "Bad credentials"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(ctx.session().current_session(), None);
}

#[tokio::test]
async fn login_success_false_is_a_rejection() {
    let backend = MockBackend::spawn(|_| {
        (
            StatusCode::OK,
            json!({ "success": false, "message": "Account locked" }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    let err = ctx.session().sign_in(&credentials()).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidCredentials(ref m) if m == "Account locked"));
    assert!(!ctx.session().is_authenticated());
}

#[tokio::test]
async fn legacy_login_shape_is_accepted() {
    let backend = MockBackend::spawn(|_| {
        (
            StatusCode::OK,
            json!({ "token": "legacy", "user": { "userId": 5, "email": "old@bank.test" } }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    ctx.session().sign_in(&credentials()).await.unwrap();
    let session = ctx.session().current_session().unwrap();
    assert_eq!(session.token, "legacy");
    assert_eq!(session.user_id, Some(UserId::Number(5)));
}

#[tokio::test]
async fn server_error_on_login_is_not_an_invalid_credentials_error() {
    let backend =
        MockBackend::spawn(|_| (StatusCode::INTERNAL_SERVER_ERROR, json!({}))).await;
    let ctx = signed_out_context(&backend.base_url);

    let err = ctx.session().sign_in(&credentials()).await.unwrap_err();
    assert!(matches!(err, ClientError::NetworkOrServer { .. }));
    assert!(!ctx.session().is_signing_in());
}

#[tokio::test]
async fn registration_mismatch_makes_no_network_call() {
    let backend = MockBackend::spawn(|_| (StatusCode::OK, json!({ "success": true }))).await;
    let ctx = signed_out_context(&backend.base_url);

    let mismatched = RegistrationForm {
        confirm_password: "abc124".into(),
        ..form()
    };
    let err = ctx
        .session()
        .register_on(mismatched, today())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::PasswordMismatch)
    ));
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn registration_success_does_not_sign_in() {
    let backend = MockBackend::spawn(|_| {
        (
            StatusCode::OK,
            json!({ "success": true, "message": "Welcome aboard" }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    let message = ctx.session().register_on(form(), today()).await.unwrap();
    assert_eq!(message, "Welcome aboard");
    assert!(!ctx.session().is_authenticated());

    let sent = &backend.requests()[0];
    assert!(sent.is(Method::POST, "/auth/register"));
    let body = sent.body.as_ref().unwrap();
    assert_eq!(body["dateOfBirth"], "1990-05-01");
    assert!(body.get("confirmPassword").is_none());
}

#[tokio::test]
async fn registration_rejected_by_backend_carries_its_message() {
    let backend = MockBackend::spawn(|_| {
        (
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Email already registered" }),
        )
    })
    .await;
    let ctx = signed_out_context(&backend.base_url);

    let err = ctx.session().register_on(form(), today()).await.unwrap_err();
    match err {
        ClientError::NetworkOrServer { message, .. } => {
            assert_eq!(message, "Email already registered")
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn guard_follows_stored_session() {
    let backend = MockBackend::spawn(|_| (StatusCode::OK, json!({}))).await;
    let ctx = signed_in_context(&backend.base_url);

    let granted = ctx.navigator().navigate(Route::Customers);
    assert_eq!(granted.token(), Some("tok-1"));

    ctx.session().sign_out().unwrap();
    assert_eq!(
        ctx.navigator().navigate(Route::Customers),
        GuardState::Denied {
            redirect: Route::Login
        }
    );
    assert_eq!(ctx.navigator().current(), Some(Route::Login));
}
