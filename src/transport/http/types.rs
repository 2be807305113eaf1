use crate::app::auth_service::AuthService;
use crate::app::database_service::DatabaseService;
use crate::app::session_service::SessionService;
use crate::app::user_service::UserService;
use crate::domain::entities::UserEntity;
use crate::storage::postgres::PgRepository;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub db_service: DatabaseService,
    pub users: UserService<PgRepository<UserEntity>>,
    pub auth: AuthService,
    pub sessions: SessionService,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success without a payload.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// A user as returned by the API. The stored cipher text never leaves the server.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub user_name: String,
    pub login_name: Option<String>,
    pub mail_address: String,
    pub password_update_time: Option<DateTime<Utc>>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub invalid_flg: bool,
    pub permissions: i32,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<UserEntity> for UserView {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name,
            login_name: user.login_name,
            mail_address: user.mail_address,
            password_update_time: user.password_update_time,
            last_login_time: user.last_login_time,
            invalid_flg: user.invalid_flg,
            permissions: user.permissions,
            note: user.note,
            created_at: user.created_at,
            updated_at: user.updated_at,
            deleted_at: user.deleted_at,
        }
    }
}

/// Admin view of a single user, including the decrypted password.
#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: UserView,
    pub password: String,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    #[serde(flatten)]
    pub user: UserView,
    /// Only present when the server generated the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteUserQuery {
    /// Soft delete (default) or remove the row.
    #[serde(default)]
    pub soft: Option<bool>,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub mail_address: String,
    pub password: String,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    /// Sent back as `Authorization: Bearer <token>` on guarded routes.
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub mail_address: String,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub code: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub user_id: String,
    pub password: String,
    pub new_password: String,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::error(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
}
