// src/handlers/occurrences.rs

use axum::{extract::State, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{FacilitiesClass, RequireRole},
    },
    models::item::{Item, OccurrenceKind},
};

// O formulário único de ocorrências: registrar perda/devolução ou recuperar
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccurrenceAction {
    Extraviado,
    Devolvido,
    Recuperado,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccurrencePayload {
    pub action: OccurrenceAction,

    #[validate(length(min = 1, message = "Informe o ID da encomenda."))]
    #[schema(example = "AP-20261019-X7K2")]
    pub internal_id: String,

    #[validate(length(min = 1, message = "Descreva a ocorrência."))]
    pub note: String,

    // Senha do próprio operador
    #[validate(length(min = 1, message = "Confirme sua senha."))]
    pub password: String,
}

// POST /api/occurrences
#[utoipa::path(
    post,
    path = "/api/occurrences",
    tag = "Ocorrências",
    request_body = OccurrencePayload,
    responses(
        (status = 200, description = "Ocorrência registrada ou encomenda recuperada", body = Item),
        (status = 401, description = "Senha do operador incorreta"),
        (status = 403, description = "Recuperação exige administrador"),
        (status = 404, description = "Encomenda não encontrada na unidade"),
        (status = 409, description = "Status atual não permite a operação")
    ),
    security(("api_jwt" = []))
)]
pub async fn handle_occurrence(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _guard: RequireRole<FacilitiesClass>,
    Json(payload): Json<OccurrencePayload>,
) -> Result<Json<Item>, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let ledger = &app_state.ledger_service;
    let result = match payload.action {
        OccurrenceAction::Extraviado | OccurrenceAction::Devolvido => {
            let kind = match payload.action {
                OccurrenceAction::Devolvido => OccurrenceKind::Devolvido,
                _ => OccurrenceKind::Extraviado,
            };
            ledger
                .record_occurrence(&user.ctx, &payload.internal_id, kind, &payload.note, &payload.password)
                .await
        }
        OccurrenceAction::Recuperado => {
            ledger
                .recover_item(&user.ctx, &payload.internal_id, &payload.note, &payload.password)
                .await
        }
    };

    result.map(Json).map_err(|e| e.to_api_error(&locale))
}
