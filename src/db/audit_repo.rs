// src/db/audit_repo.rs

use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        movement::{Movement, MovementAction},
        proof::{NewProof, Proof},
    },
};

// Trilha de movimentações (somente INSERT) e comprovantes (upsert por encomenda)
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registra uma movimentação no livro-razão (auditoria).
    /// Deve rodar na mesma transação da mudança de status que documenta.
    pub async fn record_movement<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        actor_id: Uuid,
        unit_id: Uuid,
        action: &MovementAction,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO movements (item_id, user_id, unit_id, action, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item_id)
        .bind(actor_id)
        .bind(unit_id)
        .bind(action.kind())
        .bind(action.payload().map(Json))
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Grava ou substitui o comprovante da encomenda (o último evento vence).
    pub async fn upsert_proof<'e, E>(
        &self,
        executor: E,
        item_id: Uuid,
        actor_id: Uuid,
        proof: &NewProof,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO proofs (item_id, signature_data, delivered_by, received_by_name, occurrence_note)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id) DO UPDATE SET
                signature_data = EXCLUDED.signature_data,
                delivered_by = EXCLUDED.delivered_by,
                received_by_name = EXCLUDED.received_by_name,
                occurrence_note = EXCLUDED.occurrence_note,
                delivered_at = NOW()
            "#,
        )
        .bind(item_id)
        .bind(&proof.signature_data)
        .bind(actor_id)
        .bind(&proof.received_by_name)
        .bind(&proof.occurrence_note)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_movements(&self, item_id: Uuid) -> Result<Vec<Movement>, AppError> {
        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT m.id, m.item_id, m.user_id, m.unit_id, m.action, m.payload, m.created_at,
                   u.full_name AS actor_name
            FROM movements m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.item_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    pub async fn find_proof(&self, item_id: Uuid) -> Result<Option<Proof>, AppError> {
        let proof = sqlx::query_as::<_, Proof>("SELECT * FROM proofs WHERE item_id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(proof)
    }
}
