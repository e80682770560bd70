use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    routes::notification::model::{Notification, NotificationDraft},
    routes::user::model::User,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::Favorite;

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub user_id: String,
}

#[axum::debug_handler]
pub async fn list_favorites(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match Favorite::list(&state.pool, &claims.sub).await {
        Ok(favorites) => (StatusCode::OK, success_to_api_response(favorites)),
        Err(e) => {
            tracing::error!("Failed to list favorites: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn add_favorite(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<AddFavoriteRequest>,
) -> impl IntoResponse {
    if req.user_id == claims.sub {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Cannot favorite yourself".to_string(),
            ),
        );
    }

    match Favorite::add(&state.pool, &claims.sub, &req.user_id).await {
        Ok(newly_added) => {
            if newly_added {
                // a repeated like of the same user emits nothing
                match User::find_by_id(&state.pool, &claims.sub).await {
                    Ok(Some(actor)) => {
                        let draft = NotificationDraft::like(
                            req.user_id.clone(),
                            &actor.user_id,
                            &actor.full_name,
                            &actor.profile_image,
                        );
                        Notification::record_all(&state.pool, &[draft]).await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!("Failed to load actor for like notification: {}", e);
                    }
                }
            }
            (
                StatusCode::OK,
                success_to_api_response(serde_json::json!({ "added": newly_added })),
            )
        }
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("User not found") {
                (
                    StatusCode::NOT_FOUND,
                    error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
                )
            } else {
                tracing::error!("Failed to add favorite: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(error_codes::INTERNAL_ERROR, msg),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn remove_favorite(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(favorite_id): Path<String>,
) -> impl IntoResponse {
    match Favorite::remove(&state.pool, &claims.sub, &favorite_id).await {
        Ok(removed) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({ "removed": removed })),
        ),
        Err(e) => {
            tracing::error!("Failed to remove favorite: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}
