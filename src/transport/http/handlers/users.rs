use crate::app::list_query::ListQuery;
use crate::app::user_service::NewUser;
use crate::transport::http::handlers::common::{
    authorize, data_error, fail, parse_uuid, user_error, USER_ADMIN,
};
use crate::transport::http::types::{
    json_422, ApiResponse, AppState, CreatedUser, DeleteUserQuery, UserDetail, UserView,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::HashMap;

#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, 1-based (default 1)"),
        ("perPage" = Option<i64>, Query, description = "Page size (default 10, negative = all)"),
        ("search" = Option<String>, Query, description = "Matches name, login, mail and note"),
        ("deleted" = Option<bool>, Query, description = "Include soft-deleted users"),
        ("Authorization" = String, Header, description = "Bearer token issued by /api/auth/login")
    ),
    responses(
        (status = 200, description = "One page of users", body = ApiResponse),
        (status = 400, description = "Bad filter", body = ApiResponse),
        (status = 401, description = "Missing or invalid session", body = ApiResponse),
        (status = 403, description = "Permission denied", body = ApiResponse)
    )
)]
pub async fn list_users_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if let Err(resp) = authorize(&state.sessions, &state.users, &headers, USER_ADMIN).await {
        return resp.into_response();
    }

    let query = match ListQuery::from_params(&params) {
        Ok(q) => q,
        Err(e) => return data_error(e).into_response(),
    };

    match state.users.list(&query).await {
        Ok(page) => {
            let page = page.map(UserView::from);
            (StatusCode::OK, Json(ApiResponse::ok(json!(page)))).into_response()
        }
        Err(e) => user_error(e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(
        ("id" = String, Path, description = "User id (UUID)"),
        ("Authorization" = String, Header, description = "Bearer token issued by /api/auth/login")
    ),
    responses(
        (status = 200, description = "User with decrypted password", body = UserDetail),
        (status = 404, description = "Not found", body = ApiResponse),
        (status = 401, description = "Missing or invalid session", body = ApiResponse),
        (status = 403, description = "Permission denied", body = ApiResponse)
    )
)]
pub async fn get_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = authorize(&state.sessions, &state.users, &headers, USER_ADMIN).await {
        return resp.into_response();
    }
    let id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(resp) => return resp.into_response(),
    };

    match state.users.reveal_password(id).await {
        Ok(Some((user, password))) => {
            let detail = UserDetail {
                user: UserView::from(user),
                password,
            };
            (StatusCode::OK, Json(ApiResponse::ok(json!(detail)))).into_response()
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, "User not found").into_response(),
        Err(e) => user_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/users",
    params(
        ("Authorization" = String, Header, description = "Bearer token issued by /api/auth/login")
    ),
    request_body = NewUser,
    responses(
        (status = 200, description = "User created", body = CreatedUser),
        (status = 401, description = "Missing or invalid session", body = ApiResponse),
        (status = 403, description = "Permission denied", body = ApiResponse),
        (status = 409, description = "Mail address already registered", body = ApiResponse),
        (status = 422, description = "Invalid JSON body", body = ApiResponse)
    )
)]
pub async fn create_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<NewUser>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = authorize(&state.sessions, &state.users, &headers, USER_ADMIN).await {
        return resp.into_response();
    }
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, r#"{"userName": "...", "mailAddress": "...", "password"?: "..."}"#)
                .into_response()
        }
    };

    match state.users.create(request).await {
        Ok((user, generated_password)) => {
            let created = CreatedUser {
                user: UserView::from(user),
                generated_password,
            };
            (StatusCode::OK, Json(ApiResponse::ok(json!(created)))).into_response()
        }
        Err(e) => user_error(e).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = String, Path, description = "User id (UUID)"),
        ("soft" = Option<bool>, Query, description = "Soft delete (default true)"),
        ("Authorization" = String, Header, description = "Bearer token issued by /api/auth/login")
    ),
    responses(
        (status = 200, description = "Affected row count", body = ApiResponse),
        (status = 401, description = "Missing or invalid session", body = ApiResponse),
        (status = 403, description = "Permission denied", body = ApiResponse)
    )
)]
pub async fn delete_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<DeleteUserQuery>,
) -> impl IntoResponse {
    if let Err(resp) = authorize(&state.sessions, &state.users, &headers, USER_ADMIN).await {
        return resp.into_response();
    }
    let id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(resp) => return resp.into_response(),
    };

    match state.users.remove(id, query.soft.unwrap_or(true)).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(json!(result)))).into_response(),
        Err(e) => user_error(e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/restore",
    params(
        ("id" = String, Path, description = "User id (UUID)"),
        ("Authorization" = String, Header, description = "Bearer token issued by /api/auth/login")
    ),
    responses(
        (status = 200, description = "Affected row count", body = ApiResponse),
        (status = 401, description = "Missing or invalid session", body = ApiResponse),
        (status = 403, description = "Permission denied", body = ApiResponse)
    )
)]
pub async fn restore_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = authorize(&state.sessions, &state.users, &headers, USER_ADMIN).await {
        return resp.into_response();
    }
    let id = match parse_uuid(&id) {
        Ok(id) => id,
        Err(resp) => return resp.into_response(),
    };

    match state.users.restore(id).await {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(json!(result)))).into_response(),
        Err(e) => user_error(e).into_response(),
    }
}
