// src/handlers/dashboard.rs

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::ApiError,
    config::AppState,
    db::store::ClosedItemFilter,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{FacilitiesClass, Reception, RequireRole},
    },
    models::{
        item::{ClosedItem, FacilitiesBoard, ItemView, MyItems},
        unit::AllocationOptions,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Busca por ID, rastreio, remetente ou quem recebeu
    pub q: Option<String>,
    /// Data inicial (AAAA-MM-DD)
    pub start: Option<NaiveDate>,
    /// Data final (AAAA-MM-DD)
    pub end: Option<NaiveDate>,
}

// GET /api/dashboard/reception
#[utoipa::path(
    get,
    path = "/api/dashboard/reception",
    tag = "Painéis",
    responses(
        (status = 200, description = "Encomendas aguardando coleta, mais antigas primeiro", body = Vec<ItemView>),
        (status = 403, description = "Perfil sem acesso à portaria")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_reception_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<Reception>,
) -> Result<Json<Vec<ItemView>>, ApiError> {
    let queue = app_state
        .dashboard_service
        .reception_queue(&user.ctx)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(queue))
}

// GET /api/dashboard/facilities
#[utoipa::path(
    get,
    path = "/api/dashboard/facilities",
    tag = "Painéis",
    responses(
        (status = 200, description = "Contadores e filas do Facilities", body = FacilitiesBoard),
        (status = 403, description = "Perfil sem acesso ao Facilities")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_facilities_board(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
) -> Result<Json<FacilitiesBoard>, ApiError> {
    let board = app_state
        .dashboard_service
        .facilities_board(&user.ctx)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(board))
}

// GET /api/dashboard/allocation-options
#[utoipa::path(
    get,
    path = "/api/dashboard/allocation-options",
    tag = "Painéis",
    responses(
        (status = 200, description = "Usuários, locais e grupos da unidade ativa", body = AllocationOptions)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_allocation_options(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
) -> Result<Json<AllocationOptions>, ApiError> {
    let options = app_state
        .dashboard_service
        .allocation_options(&user.ctx)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(options))
}

// GET /api/history
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "Painéis",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Encomendas encerradas, mais recentes primeiro", body = Vec<ClosedItem>)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_closed_history(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ClosedItem>>, ApiError> {
    let filter = ClosedItemFilter { q: query.q, start: query.start, end: query.end };

    let closed = app_state
        .dashboard_service
        .closed_history(&user.ctx, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(closed))
}

// GET /api/me/items
#[utoipa::path(
    get,
    path = "/api/me/items",
    tag = "Painéis",
    responses(
        (status = 200, description = "Minhas encomendas e as sem destinatário", body = MyItems)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_my_items(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
) -> Result<Json<MyItems>, ApiError> {
    let mine = app_state
        .dashboard_service
        .my_items(&user.ctx)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(mine))
}
