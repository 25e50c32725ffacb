// src/models/item.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Estados da encomenda ---
// Espelha o tipo `item_status` do banco; nenhum outro valor é observável.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "item_status", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum ItemStatus {
    RecebidoPortaria,
    EmFacilities,
    DisponivelParaRetirada,
    Entregue,
    Extraviado,
    Devolvido,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::RecebidoPortaria => "RECEBIDO_PORTARIA",
            ItemStatus::EmFacilities => "EM_FACILITIES",
            ItemStatus::DisponivelParaRetirada => "DISPONIVEL_PARA_RETIRADA",
            ItemStatus::Entregue => "ENTREGUE",
            ItemStatus::Extraviado => "EXTRAVIADO",
            ItemStatus::Devolvido => "DEVOLVIDO",
        }
    }

    /// Estados finais. Só saem daqui por recuperação.
    pub fn is_closed(self) -> bool {
        matches!(self, ItemStatus::Entregue | ItemStatus::Extraviado | ItemStatus::Devolvido)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Tipos de ocorrência que encerram a custódia sem entrega
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccurrenceKind {
    Extraviado,
    Devolvido,
}

impl OccurrenceKind {
    pub fn status(self) -> ItemStatus {
        match self {
            OccurrenceKind::Extraviado => ItemStatus::Extraviado,
            OccurrenceKind::Devolvido => ItemStatus::Devolvido,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.status().as_str()
    }
}

// --- A encomenda ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,
    #[schema(example = "AP-20261019-X7K2")]
    pub internal_id: String,
    #[schema(ignore)]
    pub unit_id: Uuid,
    pub tracking_code: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "Caixa")]
    pub item_type: String,
    #[schema(example = "Amazon")]
    pub sender: String,
    pub recipient_email: Option<String>,
    pub recipient_name_manual: Option<String>,
    pub recipient_floor: Option<String>,
    pub location: Option<String>,
    pub observation: Option<String>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl Item {
    /// E-mail efetivo do destinatário: o campo próprio, ou o texto manual
    /// quando alguém digitou um e-mail ali.
    pub fn effective_recipient(&self) -> Option<&str> {
        self.recipient_email
            .as_deref()
            .filter(|email| !email.is_empty())
            .or_else(|| {
                self.recipient_name_manual
                    .as_deref()
                    .filter(|manual| manual.contains('@'))
            })
    }
}

// Linha de listagem: a encomenda + se o destinatário tem cadastro (informativo)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub item: Item,
    pub is_registered: bool,
}

// Dados para inserir uma encomenda recém-chegada
#[derive(Debug, Clone)]
pub struct NewItem {
    pub internal_id: String,
    pub unit_id: Uuid,
    pub item_type: String,
    pub tracking_code: Option<String>,
    pub sender: String,
}

// --- Painéis ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub in_portaria: i64,
    pub in_facilities: i64,
    pub ready: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacilitiesBoard {
    pub stats: StatusCounts,
    pub reception: Vec<ItemView>,
    pub triage: Vec<ItemView>,
    pub ready: Vec<ItemView>,
}

// Encomenda encerrada, junto do comprovante e de quem a entregou
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClosedItem {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub item: Item,
    pub received_by_name: String,
    pub delivered_at: DateTime<Utc>,
    pub deliverer_name: String,
    pub occurrence_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyItems {
    pub items: Vec<Item>,
    pub unclaimed: Vec<Item>,
}

// Resultado de uma tentativa de notificação
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct NotificationOutcome {
    pub sent: bool,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub item: Item,
    pub notification: NotificationOutcome,
}

// Consulta de status por ID público
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusLookup {
    pub internal_id: String,
    pub status: ItemStatus,
    pub location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Item> for ItemStatusLookup {
    fn from(item: &Item) -> Self {
        Self {
            internal_id: item.internal_id.clone(),
            status: item.status,
            location: item.location.clone(),
            updated_at: item.updated_at,
        }
    }
}
