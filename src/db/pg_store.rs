// src/db/pg_store.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::{AppError, Resource},
    db::{
        store::{ClosedItemFilter, Guard, ItemKey, LedgerStore, QueueOrder},
        AuditRepository, ItemRepository, UnitRepository, UserRepository,
    },
    models::{
        auth::User,
        item::{ClosedItem, Item, ItemStatus, ItemView, NewItem, StatusCounts},
        movement::{Movement, MovementAction},
        proof::Proof,
        unit::{AllocationOptions, Unit},
    },
};

// Implementação Postgres da porta de armazenamento.
// Cada escrita é uma transação curta; a regra da transição é reavaliada
// sobre a linha travada, nunca sobre uma leitura anterior.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    items: ItemRepository,
    audit: AuditRepository,
    users: UserRepository,
    units: UnitRepository,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            items: ItemRepository::new(pool.clone()),
            audit: AuditRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            units: UnitRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn find_unit(&self, unit_id: Uuid) -> Result<Option<Unit>, AppError> {
        self.units.find_unit(unit_id).await
    }

    async fn first_active_unit(&self) -> Result<Option<Unit>, AppError> {
        self.units.first_active_unit().await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        self.users.find_by_id(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.users.find_by_email(email).await
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        self.users.find_by_login(login).await
    }

    async fn email_registered(&self, email: &str) -> Result<bool, AppError> {
        self.users.email_registered(email).await
    }

    async fn group_members(&self, unit_id: Uuid, name: &str) -> Result<Option<Vec<String>>, AppError> {
        self.units.group_members(unit_id, name).await
    }

    async fn allocation_options(&self, unit_id: Uuid) -> Result<AllocationOptions, AppError> {
        Ok(AllocationOptions {
            users: self.users.selectable_users(unit_id).await?,
            locations: self.units.active_locations(unit_id).await?,
            groups: self.units.groups(unit_id).await?,
        })
    }

    async fn insert_item(&self, item: NewItem, actor_id: Uuid) -> Result<Item, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = self.items.insert_item(&mut *tx, &item).await?;
        self.audit
            .record_movement(&mut *tx, created.id, actor_id, created.unit_id, &MovementAction::RegisterPortaria)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn apply_transition(
        &self,
        unit_id: Uuid,
        key: &ItemKey,
        actor_id: Uuid,
        guard: Guard,
    ) -> Result<Item, AppError> {
        // 1. Inicia a transação; qualquer `?` abaixo faz rollback no drop
        let mut tx = self.pool.begin().await?;

        // 2. Trava a linha (sempre dentro da unidade)
        let current = self
            .items
            .lock_item(&mut *tx, unit_id, key)
            .await?
            .ok_or(AppError::NotFound(Resource::Item))?;

        // 3. Reavalia a regra sobre o estado travado
        let transition = guard(&current)?;
        let mut next = current;
        transition.apply(&mut next);

        // 4. Item + movimento (+ comprovante)
        let updated = self.items.update_item(&mut *tx, &next).await?;
        self.audit
            .record_movement(&mut *tx, updated.id, actor_id, unit_id, &transition.action)
            .await?;
        if let Some(proof) = &transition.proof {
            self.audit.upsert_proof(&mut *tx, updated.id, actor_id, proof).await?;
        }

        // 5. Commit
        tx.commit().await?;
        Ok(updated)
    }

    async fn mark_notified(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.items.mark_notified(item_id, at).await
    }

    async fn find_item(&self, unit_id: Uuid, key: &ItemKey) -> Result<Option<Item>, AppError> {
        self.items.find_item(unit_id, key).await
    }

    async fn list_items(
        &self,
        unit_id: Uuid,
        status: ItemStatus,
        order: QueueOrder,
    ) -> Result<Vec<ItemView>, AppError> {
        self.items.list_items(unit_id, status, order).await
    }

    async fn count_by_status(&self, unit_id: Uuid) -> Result<StatusCounts, AppError> {
        self.items.count_by_status(unit_id).await
    }

    async fn movements(&self, item_id: Uuid) -> Result<Vec<Movement>, AppError> {
        self.audit.list_movements(item_id).await
    }

    async fn find_proof(&self, item_id: Uuid) -> Result<Option<Proof>, AppError> {
        self.audit.find_proof(item_id).await
    }

    async fn closed_items(&self, unit_id: Uuid, filter: &ClosedItemFilter) -> Result<Vec<ClosedItem>, AppError> {
        self.items.closed_items(unit_id, filter).await
    }

    async fn items_for_recipient(&self, unit_id: Uuid, email: &str) -> Result<Vec<Item>, AppError> {
        self.items.items_for_recipient(unit_id, email).await
    }

    async fn unclaimed_items(&self, unit_id: Uuid) -> Result<Vec<Item>, AppError> {
        self.items.unclaimed_items(unit_id).await
    }

    async fn stale_ready_items(&self, cutoff: DateTime<Utc>) -> Result<Vec<Item>, AppError> {
        self.items.stale_ready_items(cutoff).await
    }
}
