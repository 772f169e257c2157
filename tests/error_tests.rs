// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use fitness_tracker::error::AppError;

async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_status_mapping() {
    assert_eq!(
        AppError::Validation("x".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::Duplicate("email".into()).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::InvalidCredentials.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        AppError::Storage("down".into()).status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_client_error_classification() {
    assert!(AppError::Validation("x".into()).is_client_error());
    assert!(AppError::InvalidCredentials.is_client_error());
    assert!(!AppError::Storage("down".into()).is_client_error());
    assert!(!AppError::Internal(anyhow::anyhow!("boom")).is_client_error());
}

#[tokio::test]
async fn test_storage_error_details_not_exposed() {
    let (status, body) = body_of(AppError::Storage(
        "connection refused to 10.0.0.5:5432".into(),
    ))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "storage_error");
    assert!(body.get("details").is_none());
    assert!(!body.to_string().contains("10.0.0.5"));
}

#[tokio::test]
async fn test_validation_error_carries_field_message() {
    let (status, body) = body_of(AppError::Validation("steps: must be non-negative".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(body["details"], "steps: must be non-negative");
}

#[tokio::test]
async fn test_validator_errors_convert_to_validation() {
    use validator::Validate;

    #[derive(Validate)]
    struct SignupForm {
        #[validate(email(message = "must be a valid email address"))]
        email: String,
        #[validate(length(min = 3, message = "too short"))]
        username: String,
    }

    let errors = SignupForm {
        email: "nope".into(),
        username: "ab".into(),
    }
    .validate()
    .unwrap_err();

    match AppError::from(errors) {
        AppError::Validation(msg) => {
            assert_eq!(
                msg,
                "email: must be a valid email address; username: too short"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
