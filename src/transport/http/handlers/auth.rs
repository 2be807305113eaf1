use crate::transport::http::handlers::common::{auth_error, fail};
use crate::transport::http::types::{
    json_422, ApiResponse, AppState, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
    LoginResponse, ResetPasswordRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted", body = LoginResponse),
        (status = 401, description = "Wrong mail address or password", body = ApiResponse),
        (status = 403, description = "User is disabled", body = ApiResponse)
    )
)]
pub async fn login_handler(
    State(state): State<AppState>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, r#"{"mailAddress": "...", "password": "..."}"#).into_response()
        }
    };

    match state
        .auth
        .login(&request.mail_address, &request.password)
        .await
    {
        Ok(user_id) => match state.sessions.issue(&user_id) {
            Ok(access_token) => {
                let response = LoginResponse {
                    user_id,
                    access_token,
                    token_type: "Bearer".to_string(),
                };
                (StatusCode::OK, Json(ApiResponse::ok(json!(response)))).into_response()
            }
            Err(e) => {
                error!(error = %e, "session token could not be issued");
                fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        },
        Err(e) => auth_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Code issued and handed to delivery", body = ApiResponse),
        (status = 404, description = "Unknown mail address", body = ApiResponse)
    )
)]
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    request: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, r#"{"mailAddress": "..."}"#).into_response(),
    };

    match state.auth.forgot_password(&request.mail_address).await {
        // The code only ever leaves the server through the mail channel.
        Ok(code) => {
            debug!(mail_address = %request.mail_address, %code, "reset code ready for delivery");
            (StatusCode::OK, Json(ApiResponse::done())).into_response()
        }
        Err(e) => auth_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = ApiResponse),
        (status = 404, description = "Invalid or expired code", body = ApiResponse)
    )
)]
pub async fn reset_password_handler(
    State(state): State<AppState>,
    request: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, r#"{"code": "...", "password": "..."}"#).into_response(),
    };

    match state
        .auth
        .reset_password(&request.code, &request.password)
        .await
    {
        Ok(()) => {
            (StatusCode::OK, Json(ApiResponse::ok(json!({ "reset": true })))).into_response()
        }
        Err(e) => auth_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse),
        (status = 401, description = "Current password does not match", body = ApiResponse),
        (status = 404, description = "Unknown user", body = ApiResponse)
    )
)]
pub async fn change_password_handler(
    State(state): State<AppState>,
    request: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(
                e,
                r#"{"userId": "...", "password": "...", "newPassword": "..."}"#,
            )
            .into_response()
        }
    };
    if uuid::Uuid::parse_str(&request.user_id).is_err() {
        return auth_error(crate::app::auth_service::AuthError::NotFound).into_response();
    }

    match state
        .auth
        .change_password(&request.user_id, &request.password, &request.new_password)
        .await
    {
        Ok(()) => {
            (StatusCode::OK, Json(ApiResponse::ok(json!({ "changed": true })))).into_response()
        }
        Err(e) => auth_error(e).into_response(),
    }
}
