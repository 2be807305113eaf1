use crate::app::auth_service::AuthError;
use crate::app::session_service::SessionService;
use crate::app::user_service::{UserError, UserService};
use crate::domain::entities::UserEntity;
use crate::domain::permission::{can_activate, PermissionRequirement};
use crate::storage::error::DataError;
use crate::storage::repository::Repository;
use crate::transport::http::types::ApiResponse;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::{error, warn};

pub type ErrorResponse = (StatusCode, Json<ApiResponse>);

/// Requirement attached to the user administration routes.
pub const USER_ADMIN: PermissionRequirement = PermissionRequirement { role_code: "user" };

pub fn fail(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (status, Json(ApiResponse::error(message)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the caller from the bearer token issued at login and runs the
/// permission guard against the bitmask stored on that user.
///
/// 401 when the token is missing, invalid, expired or names a user that no
/// longer exists; 403 when the user is disabled or lacks the permission.
pub async fn authorize<R: Repository<UserEntity>>(
    sessions: &SessionService,
    users: &UserService<R>,
    headers: &HeaderMap,
    requirement: PermissionRequirement,
) -> Result<UserEntity, ErrorResponse> {
    let token = bearer_token(headers)
        .ok_or_else(|| fail(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;
    let claims = sessions.verify(token).map_err(|e| {
        warn!(error = %e, "session rejected");
        fail(StatusCode::UNAUTHORIZED, "Invalid or expired session")
    })?;

    let caller = users
        .base()
        .find_by_id(claims.sub.as_str())
        .await
        .map_err(data_error)?
        .ok_or_else(|| {
            warn!(user_id = %claims.sub, "session names an unknown user");
            fail(StatusCode::UNAUTHORIZED, "Invalid or expired session")
        })?;
    if caller.invalid_flg {
        return Err(fail(StatusCode::FORBIDDEN, "User is disabled"));
    }

    let stored = u32::try_from(caller.permissions).ok();
    if can_activate(Some(requirement), stored) {
        Ok(caller)
    } else {
        warn!(role = requirement.role_code, user_id = %caller.id, ?stored, "permission denied");
        Err(fail(StatusCode::FORBIDDEN, "Permission denied"))
    }
}

pub fn parse_uuid(id: &str) -> Result<String, ErrorResponse> {
    uuid::Uuid::parse_str(id.trim())
        .map(|u| u.to_string())
        .map_err(|_| fail(StatusCode::BAD_REQUEST, format!("Invalid id '{}'", id)))
}

pub fn data_error(err: DataError) -> ErrorResponse {
    match err {
        DataError::InvalidIdentifier(_)
        | DataError::EmptyCriteria(_)
        | DataError::InvalidRecord => fail(StatusCode::BAD_REQUEST, err.to_string()),
        DataError::Storage(_) | DataError::Serialization(_) => {
            error!(error = %err, "storage failure");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub fn user_error(err: UserError) -> ErrorResponse {
    match err {
        UserError::MailTaken => fail(StatusCode::CONFLICT, err.to_string()),
        UserError::Cipher(e) => {
            error!(error = %e, "stored password unreadable");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        UserError::Data(e) => data_error(e),
    }
}

pub fn auth_error(err: AuthError) -> ErrorResponse {
    match err {
        AuthError::NotFound | AuthError::InvalidResetCode => {
            fail(StatusCode::NOT_FOUND, err.to_string())
        }
        AuthError::WrongCredentials => fail(StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::Disabled => fail(StatusCode::FORBIDDEN, err.to_string()),
        AuthError::Cipher(e) => {
            error!(error = %e, "stored password unreadable");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        AuthError::Data(e) => data_error(e),
    }
}
