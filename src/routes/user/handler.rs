use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{Claims, error_codes, error_to_api_response, generate_token, success_to_api_response},
};

use super::model::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UpdateProfileRequest, User,
    valid_email, valid_preference,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if req.full_name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Full name must not be empty".to_string(),
            ),
        );
    }
    if !valid_email(&req.email) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Invalid email address".to_string(),
            ),
        );
    }
    if req.password.len() < 6 || req.password.len() > 72 {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Password must be between 6 and 72 characters".to_string(),
            ),
        );
    }

    match User::create(&state.pool, req).await {
        Ok(user) => match generate_token(&user.user_id, &state.config) {
            Ok(token) => (
                StatusCode::CREATED,
                success_to_api_response(RegisterResponse {
                    user_id: user.user_id,
                    full_name: user.full_name,
                    token,
                }),
            ),
            Err(e) => {
                tracing::error!("Failed to generate token: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to generate token".to_string(),
                    ),
                )
            }
        },
        Err(e) => {
            if e.to_string().contains("unique constraint") {
                (
                    StatusCode::CONFLICT,
                    error_to_api_response(
                        error_codes::USER_EXISTS,
                        "Email is already registered".to_string(),
                    ),
                )
            } else {
                tracing::error!("Failed to create user: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response(
                        error_codes::INTERNAL_ERROR,
                        "Failed to create user".to_string(),
                    ),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match User::find_by_email(&state.pool, &req.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Failed to look up user: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "Database error".to_string()),
            );
        }
    };

    match user.verify_login(&req.password) {
        Ok(true) => (),
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response(error_codes::AUTH_FAILED, "Invalid password".to_string()),
            );
        }
        Err(e) => {
            tracing::error!("Password verification failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "Database error".to_string()),
            );
        }
    }

    match generate_token(&user.user_id, &state.config) {
        Ok(token) => (
            StatusCode::OK,
            success_to_api_response(LoginResponse {
                user_id: user.user_id,
                full_name: user.full_name,
                token,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to generate token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(
                    error_codes::INTERNAL_ERROR,
                    "Failed to generate token".to_string(),
                ),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_profile(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match User::find_by_id(&state.pool, &claims.sub).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn update_profile(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    if let Some(name) = &req.full_name
        && name.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Full name must not be empty".to_string(),
            ),
        );
    }
    if let Some(preference) = &req.preference
        && !valid_preference(preference)
    {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(
                error_codes::VALIDATION_ERROR,
                "Preference must be one of women, men or both".to_string(),
            ),
        );
    }

    match User::update_profile(&state.pool, &claims.sub, req).await {
        Ok(user) => (StatusCode::OK, success_to_api_response(user)),
        Err(sqlx::Error::RowNotFound) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "User not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}
