use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    utils::{error_codes, error_to_api_response, success_to_api_response, valid_coordinates},
};

use super::model::{Shelter, ShelterDetail};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

#[axum::debug_handler]
pub async fn list_nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> impl IntoResponse {
    if !valid_coordinates(query.latitude, query.longitude) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Invalid coordinates".to_string(),
            ),
        );
    }

    let radius_km = query
        .radius_km
        .unwrap_or(state.config.default_search_radius_km);
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Invalid search radius".to_string(),
            ),
        );
    }
    let radius_m = radius_km.min(state.config.max_search_radius_km) * 1000.0;

    match Shelter::find_nearby(
        &state.pool,
        &state.redis,
        query.latitude,
        query.longitude,
        radius_m,
    )
    .await
    {
        Ok(shelters) => (StatusCode::OK, success_to_api_response(shelters)),
        Err(e) => {
            tracing::error!("Failed to search nearby shelters: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_shelter(
    State(state): State<AppState>,
    Path(shelter_id): Path<String>,
) -> impl IntoResponse {
    let shelter = match Shelter::find_by_id(&state.pool, &state.redis, &shelter_id).await {
        Ok(Some(shelter)) => shelter,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "Shelter not found".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Failed to load shelter {}: {}", shelter_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    match Shelter::occupants(&state.pool, &shelter_id).await {
        Ok(occupants) => (
            StatusCode::OK,
            success_to_api_response(ShelterDetail {
                shelter_id: shelter.shelter_id,
                name: shelter.name,
                address: shelter.address,
                latitude: shelter.latitude,
                longitude: shelter.longitude,
                people_count: occupants.len() as i64,
                occupants,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to load occupants of {}: {}", shelter_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}
