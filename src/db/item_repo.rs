// src/db/item_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ClosedItemFilter, ItemKey, QueueOrder},
    models::item::{ClosedItem, Item, ItemStatus, ItemView, NewItem, StatusCounts},
};

// Colunas usadas para localizar a encomenda dentro da unidade
fn key_column(key: &ItemKey) -> &'static str {
    match key {
        ItemKey::Id(_) => "id",
        ItemKey::InternalId(_) => "internal_id",
    }
}

fn order_clause(order: QueueOrder) -> &'static str {
    match order {
        QueueOrder::CreatedAsc => "i.created_at ASC",
        QueueOrder::UpdatedAsc => "i.updated_at ASC",
        QueueOrder::UpdatedDesc => "i.updated_at DESC",
    }
}

#[derive(Clone)]
pub struct ItemRepository {
    pool: PgPool,
}

impl ItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---

    pub async fn insert_item<'e, E>(&self, executor: E, item: &NewItem) -> Result<Item, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (internal_id, unit_id, item_type, tracking_code, sender, status)
            VALUES ($1, $2, $3, $4, $5, 'RECEBIDO_PORTARIA')
            RETURNING *
            "#,
        )
        .bind(&item.internal_id)
        .bind(item.unit_id)
        .bind(&item.item_type)
        .bind(&item.tracking_code)
        .bind(&item.sender)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::DuplicateInternalId;
                }
            }
            e.into()
        })
    }

    /// Lê a encomenda com `FOR UPDATE`: quem chegar depois espera o commit
    /// e enxerga o status novo.
    pub async fn lock_item<'e, E>(
        &self,
        executor: E,
        unit_id: Uuid,
        key: &ItemKey,
    ) -> Result<Option<Item>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "SELECT * FROM items WHERE unit_id = $1 AND {} = $2 FOR UPDATE",
            key_column(key)
        );
        let query = sqlx::query_as::<_, Item>(&sql).bind(unit_id);
        let query = match key {
            ItemKey::Id(id) => query.bind(*id),
            ItemKey::InternalId(code) => query.bind(code.as_str()),
        };
        Ok(query.fetch_optional(executor).await?)
    }

    pub async fn update_item<'e, E>(&self, executor: E, item: &Item) -> Result<Item, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET
                status = $2,
                location = $3,
                recipient_email = $4,
                recipient_name_manual = $5,
                recipient_floor = $6,
                observation = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(item.id)
        .bind(item.status)
        .bind(&item.location)
        .bind(&item.recipient_email)
        .bind(&item.recipient_name_manual)
        .bind(&item.recipient_floor)
        .bind(&item.observation)
        .fetch_one(executor)
        .await?;
        Ok(updated)
    }

    pub async fn mark_notified(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE items SET last_notified_at = $2 WHERE id = $1")
            .bind(item_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---
    // Funções de "Leitura"
    // ---

    pub async fn find_item(&self, unit_id: Uuid, key: &ItemKey) -> Result<Option<Item>, AppError> {
        let sql = format!("SELECT * FROM items WHERE unit_id = $1 AND {} = $2", key_column(key));
        let query = sqlx::query_as::<_, Item>(&sql).bind(unit_id);
        let query = match key {
            ItemKey::Id(id) => query.bind(*id),
            ItemKey::InternalId(code) => query.bind(code.as_str()),
        };
        Ok(query.fetch_optional(&self.pool).await?)
    }

    pub async fn list_items(
        &self,
        unit_id: Uuid,
        status: ItemStatus,
        order: QueueOrder,
    ) -> Result<Vec<ItemView>, AppError> {
        let sql = format!(
            r#"
            SELECT i.*,
                   EXISTS (SELECT 1 FROM users u WHERE u.email = i.recipient_email) AS is_registered
            FROM items i
            WHERE i.unit_id = $1 AND i.status = $2
            ORDER BY {}
            "#,
            order_clause(order)
        );
        let items = sqlx::query_as::<_, ItemView>(&sql)
            .bind(unit_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    pub async fn count_by_status(&self, unit_id: Uuid) -> Result<StatusCounts, AppError> {
        let rows = sqlx::query_as::<_, (ItemStatus, i64)>(
            "SELECT status, COUNT(*) FROM items WHERE unit_id = $1 GROUP BY status",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, total) in rows {
            match status {
                ItemStatus::RecebidoPortaria => counts.in_portaria = total,
                ItemStatus::EmFacilities => counts.in_facilities = total,
                ItemStatus::DisponivelParaRetirada => counts.ready = total,
                _ => {}
            }
        }
        Ok(counts)
    }

    pub async fn closed_items(
        &self,
        unit_id: Uuid,
        filter: &ClosedItemFilter,
    ) -> Result<Vec<ClosedItem>, AppError> {
        let term = filter.q.as_deref().filter(|q| !q.is_empty()).map(|q| format!("%{q}%"));

        let items = sqlx::query_as::<_, ClosedItem>(
            r#"
            SELECT i.*, p.received_by_name, p.delivered_at,
                   u.full_name AS deliverer_name, p.occurrence_note
            FROM items i
            JOIN proofs p ON p.item_id = i.id
            JOIN users u ON u.id = p.delivered_by
            WHERE i.unit_id = $1
              AND i.status IN ('ENTREGUE', 'EXTRAVIADO', 'DEVOLVIDO')
              AND ($2::text IS NULL
                   OR i.internal_id ILIKE $2
                   OR i.tracking_code ILIKE $2
                   OR i.sender ILIKE $2
                   OR p.received_by_name ILIKE $2)
              AND ($3::date IS NULL OR p.delivered_at::date >= $3)
              AND ($4::date IS NULL OR p.delivered_at::date <= $4)
            ORDER BY p.delivered_at DESC
            "#,
        )
        .bind(unit_id)
        .bind(term)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn items_for_recipient(&self, unit_id: Uuid, email: &str) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE unit_id = $1 AND (recipient_email = $2 OR recipient_name_manual = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(unit_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn unclaimed_items(&self, unit_id: Uuid) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE unit_id = $1
              AND (recipient_email IS NULL OR recipient_email = '')
              AND (recipient_name_manual IS NULL OR recipient_name_manual NOT LIKE '%@%')
              AND status NOT IN ('ENTREGUE', 'EXTRAVIADO', 'DEVOLVIDO')
            ORDER BY created_at DESC
            "#,
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn stale_ready_items(&self, cutoff: DateTime<Utc>) -> Result<Vec<Item>, AppError> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE status = 'DISPONIVEL_PARA_RETIRADA'
              AND (last_notified_at IS NULL OR last_notified_at <= $1)
            ORDER BY updated_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
