use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    routes::notification::model::Notification,
    utils::{Claims, error_codes, error_to_api_response, success_to_api_response},
};

use super::model::{Occupancy, PeopleCountResponse};

#[axum::debug_handler]
pub async fn enter_shelter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(shelter_id): Path<String>,
) -> impl IntoResponse {
    match Occupancy::enter(&state.pool, &claims.sub, &shelter_id).await {
        Ok(outcome) => {
            // the presence change is committed; notifications are recorded
            // best-effort
            Notification::record_all(&state.pool, &outcome.notifications).await;

            (
                StatusCode::OK,
                success_to_api_response(PeopleCountResponse {
                    people_count: outcome.people_count,
                }),
            )
        }
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("User not found") {
                (
                    StatusCode::NOT_FOUND,
                    error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
                )
            } else if msg.contains("Shelter not found") {
                (
                    StatusCode::NOT_FOUND,
                    error_to_api_response(error_codes::NOT_FOUND, "Shelter not found".to_string()),
                )
            } else {
                tracing::error!("Failed to enter shelter {}: {}", shelter_id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(error_codes::INTERNAL_ERROR, msg),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn leave_shelter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(shelter_id): Path<String>,
) -> impl IntoResponse {
    match Occupancy::leave(&state.pool, &claims.sub, &shelter_id).await {
        Ok(people_count) => (
            StatusCode::OK,
            success_to_api_response(PeopleCountResponse { people_count }),
        ),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("Shelter not found") {
                (
                    StatusCode::NOT_FOUND,
                    error_to_api_response(error_codes::NOT_FOUND, "Shelter not found".to_string()),
                )
            } else {
                tracing::error!("Failed to leave shelter {}: {}", shelter_id, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(error_codes::INTERNAL_ERROR, msg),
                )
            }
        }
    }
}
