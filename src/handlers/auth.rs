// src/handlers/auth.rs

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::{AuthResponse, LoginUserPayload, MeResponse, SetActiveUnitPayload, UserCheckResponse},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserCheckQuery {
    pub email: String,
}

// Handler de login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginUserPayload,
    responses(
        (status = 200, description = "Login realizado", body = AuthResponse),
        (status = 401, description = "Credenciais inválidas")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<LoginUserPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let response = app_state
        .auth_service
        .login_user(&payload.login, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(response))
}

// Handler da rota protegida /me
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "Users",
    responses((status = 200, description = "Perfil e unidade ativa", body = MeResponse)),
    security(("api_jwt" = []))
)]
pub async fn get_me(user: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse { active_unit_id: user.ctx.unit_id, user: user.user })
}

// GET /api/users/check?email=
#[utoipa::path(
    get,
    path = "/api/users/check",
    tag = "Users",
    params(UserCheckQuery),
    responses((status = 200, description = "Se o e-mail pertence a um usuário ativo", body = UserCheckResponse)),
    security(("api_jwt" = []))
)]
pub async fn check_user(
    State(app_state): State<AppState>,
    locale: Locale,
    _user: AuthenticatedUser,
    Query(query): Query<UserCheckQuery>,
) -> Result<Json<UserCheckResponse>, ApiError> {
    let exists = app_state
        .auth_service
        .user_exists(&query.email)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(UserCheckResponse { exists }))
}

// PUT /api/session/unit
#[utoipa::path(
    put,
    path = "/api/session/unit",
    tag = "Auth",
    request_body = SetActiveUnitPayload,
    responses(
        (status = 200, description = "Unidade ativa trocada; novo token", body = AuthResponse),
        (status = 403, description = "Perfil preso à unidade padrão"),
        (status = 404, description = "Unidade inexistente ou inativa")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_active_unit(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Json(payload): Json<SetActiveUnitPayload>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = app_state
        .auth_service
        .switch_unit(&user.ctx, payload.unit_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(response))
}
