use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    routes::notification::model::{Notification, NotificationDraft},
    routes::user::model::User,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{ChatMessage, SendMessageRequest, views_for};

#[axum::debug_handler]
pub async fn list_chats(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match ChatMessage::summaries(&state.pool, &claims.sub).await {
        Ok(summaries) => (StatusCode::OK, success_to_api_response(summaries)),
        Err(e) => {
            tracing::error!("Failed to list chats: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_chat(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> impl IntoResponse {
    match ChatMessage::history(&state.pool, &claims.sub, &partner_id).await {
        Ok(messages) => (
            StatusCode::OK,
            success_to_api_response(views_for(messages, &claims.sub)),
        ),
        Err(e) => {
            tracing::error!("Failed to load chat with {}: {}", partner_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn send_message(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let text = req.text.trim();
    if text.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Message must not be empty".to_string(),
            ),
        );
    }
    if partner_id == claims.sub {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Cannot message yourself".to_string(),
            ),
        );
    }

    match ChatMessage::send(&state.pool, &claims.sub, &partner_id, text).await {
        Ok(message) => {
            // best-effort notification with a snapshot of the text
            match User::find_by_id(&state.pool, &claims.sub).await {
                Ok(Some(actor)) => {
                    let draft = NotificationDraft::message(
                        partner_id.clone(),
                        &actor.user_id,
                        &actor.full_name,
                        &actor.profile_image,
                        &message.content,
                    );
                    Notification::record_all(&state.pool, &[draft]).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Failed to load actor for message notification: {}", e);
                }
            }

            (StatusCode::CREATED, success_to_api_response(message))
        }
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("User not found") {
                (
                    StatusCode::NOT_FOUND,
                    error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
                )
            } else {
                tracing::error!("Failed to send message: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(error_codes::INTERNAL_ERROR, msg),
                )
            }
        }
    }
}
