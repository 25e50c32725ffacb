// src/models/unit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ---
// 1. Unit (a "Unidade")
// ---
// O site físico. Toda encomenda, movimentação, local e grupo pertence a uma.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: Uuid,
    #[schema(example = "Sede Central")]
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// ---
// 2. Location (o "Local" de armazenamento)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    #[schema(ignore)]
    pub unit_id: Uuid,
    #[schema(example = "Locker-3")]
    pub name: String,
    pub is_active: bool,
}

// ---
// 3. EmailGroup (lista de distribuição)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EmailGroup {
    pub id: Uuid,
    #[schema(ignore)]
    pub unit_id: Uuid,
    #[schema(example = "Financeiro")]
    pub name: String,
}

// Usuário disponível no seletor de destinatários
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectableUser {
    pub email: String,
    pub full_name: String,
}

// Tudo que a tela de alocação oferece, já filtrado pela unidade ativa
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOptions {
    pub users: Vec<SelectableUser>,
    pub locations: Vec<Location>,
    pub groups: Vec<EmailGroup>,
}
