// src/handlers/items.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{FacilitiesClass, Reception, RequireRole},
    },
    models::{
        item::{AllocationResult, Item, ItemStatusLookup, NotificationOutcome},
        movement::ItemHistory,
    },
    services::ledger_service::{Allocation, Registration},
};

// ---
// Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterItemPayload {
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "O tipo é obrigatório."))]
    #[schema(example = "Caixa")]
    pub item_type: String,

    pub tracking_code: Option<String>,

    #[validate(length(min = 1, message = "O remetente é obrigatório."))]
    #[schema(example = "Amazon")]
    pub sender: String,
}

impl From<RegisterItemPayload> for Registration {
    fn from(payload: RegisterItemPayload) -> Self {
        Self { item_type: payload.item_type, tracking_code: payload.tracking_code, sender: payload.sender }
    }
}

// `location` ausente cai em MissingField no serviço
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocateItemPayload {
    #[schema(example = "Locker-3")]
    pub location: Option<String>,
    #[schema(example = "bob@co.com")]
    pub recipient_email: Option<String>,
    pub recipient_manual: Option<String>,
    pub recipient_floor: Option<String>,
    pub observation: Option<String>,
}

impl From<AllocateItemPayload> for Allocation {
    fn from(payload: AllocateItemPayload) -> Self {
        Self {
            location: payload.location.unwrap_or_default(),
            recipient_email: payload.recipient_email,
            recipient_manual: payload.recipient_manual,
            recipient_floor: payload.recipient_floor,
            observation: payload.observation,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangeLocationPayload {
    #[validate(length(min = 1, message = "Informe o novo local."))]
    #[schema(example = "B2")]
    pub location: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDeliveryPayload {
    #[validate(length(min = 1, message = "Informe quem recebeu."))]
    pub received_by_name: String,
    #[validate(length(min = 1, message = "A assinatura é obrigatória."))]
    pub signature: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PasswordDeliveryPayload {
    #[validate(length(min = 1, message = "Informe o e-mail."))]
    #[schema(example = "bob@co.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Informe a senha."))]
    pub password: String,
}

// ---
// Handlers
// ---

// POST /api/items
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "Encomendas",
    request_body = RegisterItemPayload,
    responses(
        (status = 201, description = "Encomenda registrada na portaria", body = Item),
        (status = 400, description = "Campos obrigatórios ausentes"),
        (status = 403, description = "Perfil sem acesso à portaria")
    ),
    security(("api_jwt" = []))
)]
pub async fn register_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<Reception>,
    Json(payload): Json<RegisterItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state
        .ledger_service
        .register_item(&user.ctx, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(item)))
}

// POST /api/items/{id}/collect
#[utoipa::path(
    post,
    path = "/api/items/{id}/collect",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    responses(
        (status = 200, description = "Encomenda coletada pelo Facilities", body = Item),
        (status = 404, description = "Encomenda não encontrada na unidade"),
        (status = 409, description = "Status atual não permite a coleta")
    ),
    security(("api_jwt" = []))
)]
pub async fn collect_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Item>, ApiError> {
    let item = app_state
        .ledger_service
        .collect_item(&user.ctx, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(item))
}

// POST /api/items/{id}/allocate
#[utoipa::path(
    post,
    path = "/api/items/{id}/allocate",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    request_body = AllocateItemPayload,
    responses(
        (status = 200, description = "Encomenda alocada e destinatário avisado", body = AllocationResult),
        (status = 400, description = "Local não informado"),
        (status = 409, description = "Encomenda não está em triagem")
    ),
    security(("api_jwt" = []))
)]
pub async fn allocate_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<AllocateItemPayload>,
) -> Result<Json<AllocationResult>, ApiError> {
    let result = app_state
        .ledger_service
        .allocate_item(&user.ctx, item_id, payload.into())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(result))
}

// POST /api/items/{id}/location
#[utoipa::path(
    post,
    path = "/api/items/{id}/location",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    request_body = ChangeLocationPayload,
    responses(
        (status = 200, description = "Local de armazenamento alterado", body = Item),
        (status = 409, description = "Encomenda não está disponível para retirada")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_location(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<ChangeLocationPayload>,
) -> Result<Json<Item>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state
        .ledger_service
        .change_location(&user.ctx, item_id, &payload.location)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(item))
}

// POST /api/items/{id}/deliver/signature
#[utoipa::path(
    post,
    path = "/api/items/{id}/deliver/signature",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    request_body = SignatureDeliveryPayload,
    responses(
        (status = 200, description = "Entrega registrada com assinatura", body = Item),
        (status = 409, description = "Encomenda não está disponível para retirada")
    ),
    security(("api_jwt" = []))
)]
pub async fn deliver_by_signature(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SignatureDeliveryPayload>,
) -> Result<Json<Item>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state
        .ledger_service
        .deliver_by_signature(&user.ctx, item_id, &payload.received_by_name, &payload.signature)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(item))
}

// POST /api/items/{id}/deliver/password
#[utoipa::path(
    post,
    path = "/api/items/{id}/deliver/password",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    request_body = PasswordDeliveryPayload,
    responses(
        (status = 200, description = "Entrega confirmada com a senha do destinatário", body = Item),
        (status = 401, description = "Senha incorreta"),
        (status = 409, description = "Encomenda não está disponível para retirada")
    ),
    security(("api_jwt" = []))
)]
pub async fn deliver_by_password(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<PasswordDeliveryPayload>,
) -> Result<Json<Item>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state
        .ledger_service
        .deliver_by_password(&user.ctx, item_id, &payload.email, &payload.password)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(item))
}

// POST /api/items/{id}/notify
#[utoipa::path(
    post,
    path = "/api/items/{id}/notify",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    responses(
        (status = 200, description = "Aviso reenviado", body = NotificationOutcome),
        (status = 409, description = "Encomenda não está disponível para retirada")
    ),
    security(("api_jwt" = []))
)]
pub async fn resend_notification(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<NotificationOutcome>, ApiError> {
    let outcome = app_state
        .ledger_service
        .resend_notification(&user.ctx, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(outcome))
}

// GET /api/items/{id}/history
#[utoipa::path(
    get,
    path = "/api/items/{id}/history",
    tag = "Encomendas",
    params(("id" = Uuid, Path, description = "ID da encomenda")),
    responses(
        (status = 200, description = "Trilha de movimentações em ordem cronológica", body = ItemHistory),
        (status = 404, description = "Encomenda não encontrada na unidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_item_history(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ItemHistory>, ApiError> {
    let history = app_state
        .ledger_service
        .get_item_history(&user.ctx, item_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(history))
}

// GET /api/items/lookup/{internal_id}
#[utoipa::path(
    get,
    path = "/api/items/lookup/{internal_id}",
    tag = "Encomendas",
    params(("internal_id" = String, Path, description = "ID público (AP-AAAAMMDD-XXXX)")),
    responses(
        (status = 200, description = "Status atual da encomenda", body = ItemStatusLookup),
        (status = 404, description = "Encomenda não encontrada na unidade")
    ),
    security(("api_jwt" = []))
)]
pub async fn lookup_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    Path(internal_id): Path<String>,
) -> Result<Json<ItemStatusLookup>, ApiError> {
    let lookup = app_state
        .ledger_service
        .lookup_by_internal_id(&user.ctx, &internal_id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(Json(lookup))
}
