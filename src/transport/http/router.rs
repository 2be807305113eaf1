use crate::app::user_service::NewUser;
use crate::domain::pagination::PaginationMeta;
use crate::domain::permission::PermissionToggles;
use crate::transport::http::handlers::{auth, health, users};
use crate::transport::http::types::{
    ApiResponse, ChangePasswordRequest, CreatedUser, DeleteUserQuery, ForgotPasswordRequest,
    LoginRequest, LoginResponse, ResetPasswordRequest, UserDetail, UserView,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        users::list_users_handler,
        users::get_user_handler,
        users::create_user_handler,
        users::delete_user_handler,
        users::restore_user_handler,
        auth::login_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        auth::change_password_handler
    ),
    components(schemas(
        ApiResponse,
        PaginationMeta,
        UserView,
        UserDetail,
        CreatedUser,
        NewUser,
        PermissionToggles,
        DeleteUserQuery,
        LoginRequest,
        LoginResponse,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        ChangePasswordRequest
    ))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/api/users/:id",
            get(users::get_user_handler).delete(users::delete_user_handler),
        )
        .route("/api/users/:id/restore", post(users::restore_user_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/api/auth/reset-password", post(auth::reset_password_handler))
        .route("/api/auth/change-password", post(auth::change_password_handler))
        .with_state(app_state)
}
