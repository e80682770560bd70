use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{Notification, UnreadCountResponse};

#[axum::debug_handler]
pub async fn list_notifications(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match Notification::list_for_user(&state.pool, &claims.sub).await {
        Ok(notifications) => (StatusCode::OK, success_to_api_response(notifications)),
        Err(e) => {
            tracing::error!("Failed to list notifications: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn unread_count(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match Notification::unread_count(&state.pool, &claims.sub).await {
        Ok(count) => (
            StatusCode::OK,
            success_to_api_response(UnreadCountResponse { count }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn mark_read(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> impl IntoResponse {
    match Notification::mark_read(&state.pool, &claims.sub, &notification_id).await {
        Ok(true) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "success": true })),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Notification not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn mark_all_read(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match Notification::mark_all_read(&state.pool, &claims.sub).await {
        Ok(updated) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "updated": updated })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn delete_notification(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> impl IntoResponse {
    match Notification::delete(&state.pool, &claims.sub, &notification_id).await {
        Ok(true) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "success": true })),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Notification not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}
