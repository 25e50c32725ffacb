// src/services/dashboard_service.rs

use std::sync::Arc;

use crate::{
    common::error::{AppError, Resource},
    db::store::{ClosedItemFilter, LedgerStore, QueueOrder},
    models::{
        auth::{RequestContext, Role},
        item::{ClosedItem, FacilitiesBoard, ItemStatus, ItemView, MyItems},
        unit::AllocationOptions,
    },
    services::ledger_service::require_role,
};

// Projeções de leitura. Tudo filtrado pela unidade do contexto.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn LedgerStore>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Fila da portaria: mais antigas primeiro.
    pub async fn reception_queue(&self, ctx: &RequestContext) -> Result<Vec<ItemView>, AppError> {
        require_role(ctx, Role::can_receive)?;
        self.store
            .list_items(ctx.unit_id, ItemStatus::RecebidoPortaria, QueueOrder::CreatedAsc)
            .await
    }

    pub async fn facilities_board(&self, ctx: &RequestContext) -> Result<FacilitiesBoard, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let unit_id = ctx.unit_id;

        Ok(FacilitiesBoard {
            stats: self.store.count_by_status(unit_id).await?,
            reception: self
                .store
                .list_items(unit_id, ItemStatus::RecebidoPortaria, QueueOrder::CreatedAsc)
                .await?,
            triage: self
                .store
                .list_items(unit_id, ItemStatus::EmFacilities, QueueOrder::UpdatedAsc)
                .await?,
            ready: self
                .store
                .list_items(unit_id, ItemStatus::DisponivelParaRetirada, QueueOrder::UpdatedDesc)
                .await?,
        })
    }

    pub async fn allocation_options(&self, ctx: &RequestContext) -> Result<AllocationOptions, AppError> {
        require_role(ctx, Role::is_facilities)?;
        self.store.allocation_options(ctx.unit_id).await
    }

    pub async fn closed_history(
        &self,
        ctx: &RequestContext,
        filter: &ClosedItemFilter,
    ) -> Result<Vec<ClosedItem>, AppError> {
        require_role(ctx, Role::is_facilities)?;
        self.store.closed_items(ctx.unit_id, filter).await
    }

    /// Encomendas endereçadas ao próprio usuário, mais as sem destinatário.
    pub async fn my_items(&self, ctx: &RequestContext) -> Result<MyItems, AppError> {
        let user = self
            .store
            .find_user_by_id(ctx.user_id)
            .await?
            .ok_or(AppError::NotFound(Resource::User))?;

        let items = match user.email.as_deref() {
            Some(email) => self.store.items_for_recipient(ctx.unit_id, email).await?,
            None => Vec::new(),
        };
        let unclaimed = self.store.unclaimed_items(ctx.unit_id).await?;

        Ok(MyItems { items, unclaimed })
    }
}
