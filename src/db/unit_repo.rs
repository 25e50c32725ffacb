// src/db/unit_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::unit::{EmailGroup, Location, Unit},
};

// Unidades e os cadastros que pertencem a elas (locais e grupos de e-mail)
#[derive(Clone)]
pub struct UnitRepository {
    pool: PgPool,
}

impl UnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_unit(&self, unit_id: Uuid) -> Result<Option<Unit>, AppError> {
        let unit = sqlx::query_as::<_, Unit>("SELECT * FROM units WHERE id = $1")
            .bind(unit_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(unit)
    }

    pub async fn first_active_unit(&self) -> Result<Option<Unit>, AppError> {
        let unit = sqlx::query_as::<_, Unit>(
            "SELECT * FROM units WHERE is_active ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(unit)
    }

    pub async fn active_locations(&self, unit_id: Uuid) -> Result<Vec<Location>, AppError> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE unit_id = $1 AND is_active ORDER BY name ASC",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    pub async fn groups(&self, unit_id: Uuid) -> Result<Vec<EmailGroup>, AppError> {
        let groups = sqlx::query_as::<_, EmailGroup>(
            "SELECT * FROM email_groups WHERE unit_id = $1 ORDER BY name ASC",
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(groups)
    }

    /// Membros do grupo, se existir um grupo com esse nome exato na unidade.
    pub async fn group_members(&self, unit_id: Uuid, name: &str) -> Result<Option<Vec<String>>, AppError> {
        let group = sqlx::query_as::<_, EmailGroup>(
            "SELECT * FROM email_groups WHERE unit_id = $1 AND name = $2",
        )
        .bind(unit_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(group) = group else {
            return Ok(None);
        };

        let members: Vec<String> = sqlx::query_scalar(
            "SELECT email FROM email_group_members WHERE group_id = $1 ORDER BY email ASC",
        )
        .bind(group.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(members))
    }
}
