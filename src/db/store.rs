// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        auth::User,
        item::{ClosedItem, Item, ItemStatus, ItemView, NewItem, StatusCounts},
        movement::{Movement, MovementAction},
        proof::{NewProof, Proof},
        unit::{AllocationOptions, Unit},
    },
};

// Como a encomenda é identificada: pelo ID interno ou pelo ID público (AP-...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKey {
    Id(Uuid),
    InternalId(String),
}

// Campos de destinatário gravados na alocação
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationFields {
    pub recipient_email: Option<String>,
    pub recipient_name_manual: Option<String>,
    pub recipient_floor: Option<String>,
    pub observation: Option<String>,
}

// ---
// Transition: tudo que uma mudança de estado grava, numa única transação
// ---
#[derive(Debug, Clone)]
pub struct Transition {
    pub status: ItemStatus,
    pub location: Option<String>,
    pub allocation: Option<AllocationFields>,
    pub action: MovementAction,
    pub proof: Option<NewProof>,
}

impl Transition {
    pub fn to(status: ItemStatus, action: MovementAction) -> Self {
        Self { status, location: None, allocation: None, action, proof: None }
    }

    pub fn with_location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_allocation(mut self, allocation: AllocationFields) -> Self {
        self.allocation = Some(allocation);
        self
    }

    pub fn with_proof(mut self, proof: NewProof) -> Self {
        self.proof = Some(proof);
        self
    }

    /// Aplica a mudança sobre a linha lida (o carimbo de `updated_at` é do banco).
    pub fn apply(&self, item: &mut Item) {
        item.status = self.status;
        if let Some(location) = &self.location {
            item.location = Some(location.clone());
        }
        if let Some(fields) = &self.allocation {
            item.recipient_email = fields.recipient_email.clone();
            item.recipient_name_manual = fields.recipient_name_manual.clone();
            item.recipient_floor = fields.recipient_floor.clone();
            item.observation = fields.observation.clone();
        }
    }
}

/// Regra avaliada sobre a linha já travada, dentro da transação.
pub type Guard = Box<dyn FnOnce(&Item) -> Result<Transition, AppError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOrder {
    CreatedAsc,
    UpdatedAsc,
    UpdatedDesc,
}

#[derive(Debug, Clone, Default)]
pub struct ClosedItemFilter {
    pub q: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

// ---
// A porta de armazenamento
// ---
// Toda consulta que lista ou busca encomendas recebe a unidade e filtra por ela.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- Cadastros de referência ---
    async fn find_unit(&self, unit_id: Uuid) -> Result<Option<Unit>, AppError>;
    async fn first_active_unit(&self) -> Result<Option<Unit>, AppError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Login aceita e-mail ou username.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError>;
    async fn email_registered(&self, email: &str) -> Result<bool, AppError>;
    /// E-mails dos membros, se `name` for um grupo da unidade.
    async fn group_members(&self, unit_id: Uuid, name: &str) -> Result<Option<Vec<String>>, AppError>;
    async fn allocation_options(&self, unit_id: Uuid) -> Result<AllocationOptions, AppError>;

    // --- Escrita (livro-razão) ---
    /// Insere a encomenda e o movimento REGISTER_PORTARIA na mesma transação.
    async fn insert_item(&self, item: NewItem, actor_id: Uuid) -> Result<Item, AppError>;
    /// Trava a encomenda, reavalia a regra e grava item + movimento (+ comprovante).
    async fn apply_transition(
        &self,
        unit_id: Uuid,
        key: &ItemKey,
        actor_id: Uuid,
        guard: Guard,
    ) -> Result<Item, AppError>;
    async fn mark_notified(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    // --- Leitura ---
    async fn find_item(&self, unit_id: Uuid, key: &ItemKey) -> Result<Option<Item>, AppError>;
    async fn list_items(
        &self,
        unit_id: Uuid,
        status: ItemStatus,
        order: QueueOrder,
    ) -> Result<Vec<ItemView>, AppError>;
    async fn count_by_status(&self, unit_id: Uuid) -> Result<StatusCounts, AppError>;
    /// Trilha completa em ordem cronológica.
    async fn movements(&self, item_id: Uuid) -> Result<Vec<Movement>, AppError>;
    async fn find_proof(&self, item_id: Uuid) -> Result<Option<Proof>, AppError>;
    async fn closed_items(&self, unit_id: Uuid, filter: &ClosedItemFilter) -> Result<Vec<ClosedItem>, AppError>;
    async fn items_for_recipient(&self, unit_id: Uuid, email: &str) -> Result<Vec<Item>, AppError>;
    async fn unclaimed_items(&self, unit_id: Uuid) -> Result<Vec<Item>, AppError>;
    /// Prontas para retirada e sem aviso desde `cutoff`, em todas as unidades.
    async fn stale_ready_items(&self, cutoff: DateTime<Utc>) -> Result<Vec<Item>, AppError>;
}
