// src/services/ledger_service.rs

use std::sync::Arc;

use chrono::Local;
use rand::Rng;
use uuid::Uuid;

use crate::{
    common::error::{AppError, Denial, Resource},
    db::store::{AllocationFields, ItemKey, LedgerStore, Transition},
    models::{
        auth::{RequestContext, Role},
        item::{AllocationResult, Item, ItemStatus, ItemStatusLookup, NewItem, NotificationOutcome, OccurrenceKind},
        movement::{ItemHistory, MovementAction},
        proof::NewProof,
    },
    services::{auth::{verify_password, verify_password_for_unknown_user}, history, notification_service::NotificationService, recipient},
};

const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_ID_ATTEMPTS: usize = 5;

/// `AP-<AAAAMMDD>-<4 caracteres>`, data local.
pub fn generate_internal_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..4)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect();
    format!("AP-{}-{}", Local::now().format("%Y%m%d"), suffix)
}

pub(crate) fn require_role(ctx: &RequestContext, allowed: fn(Role) -> bool) -> Result<(), AppError> {
    if allowed(ctx.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(Denial::Role))
    }
}

fn required(value: &str, field: &'static str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::MissingField(field));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn expect_status(item: &Item, expected: ItemStatus, action: &'static str) -> Result<(), AppError> {
    if item.status != expected {
        return Err(AppError::InvalidTransition { from: item.status, action });
    }
    Ok(())
}

// Dados de entrada das operações com mais de dois campos
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub item_type: String,
    pub tracking_code: Option<String>,
    pub sender: String,
}

#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub location: String,
    pub recipient_email: Option<String>,
    pub recipient_manual: Option<String>,
    pub recipient_floor: Option<String>,
    pub observation: Option<String>,
}

// ---
// O livro-razão: cada operação é uma transição validada dentro da transação
// ---
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    notifications: NotificationService,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, notifications: NotificationService) -> Self {
        Self { store, notifications }
    }

    pub async fn register_item(&self, ctx: &RequestContext, registration: Registration) -> Result<Item, AppError> {
        require_role(ctx, Role::can_receive)?;
        let item_type = required(&registration.item_type, "type")?;
        let sender = required(&registration.sender, "sender")?;
        let tracking_code = optional(registration.tracking_code.as_deref());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let new_item = NewItem {
                internal_id: generate_internal_id(),
                unit_id: ctx.unit_id,
                item_type: item_type.clone(),
                tracking_code: tracking_code.clone(),
                sender: sender.clone(),
            };

            match self.store.insert_item(new_item, ctx.user_id).await {
                Ok(item) => {
                    tracing::info!("📦 Encomenda {} recebida na portaria (unidade {})", item.internal_id, item.unit_id);
                    return Ok(item);
                }
                Err(AppError::DuplicateInternalId) if attempt < MAX_ID_ATTEMPTS => {
                    tracing::warn!("ID público repetido, gerando outro (tentativa {})", attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn collect_item(&self, ctx: &RequestContext, item_id: Uuid) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;

        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::Id(item_id),
                ctx.user_id,
                Box::new(|item: &Item| {
                    expect_status(item, ItemStatus::RecebidoPortaria, "collect")?;
                    Ok(Transition::to(ItemStatus::EmFacilities, MovementAction::CollectFromPortaria))
                }),
            )
            .await?;

        tracing::info!("🚚 Encomenda {} coletada pelo Facilities", item.internal_id);
        Ok(item)
    }

    pub async fn allocate_item(
        &self,
        ctx: &RequestContext,
        item_id: Uuid,
        allocation: Allocation,
    ) -> Result<AllocationResult, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let location = required(&allocation.location, "location")?;

        let effective = recipient::effective_email(
            allocation.recipient_email.as_deref(),
            allocation.recipient_manual.as_deref(),
        );
        let fields = AllocationFields {
            recipient_email: effective.clone(),
            recipient_name_manual: optional(allocation.recipient_manual.as_deref()),
            recipient_floor: optional(allocation.recipient_floor.as_deref()),
            observation: optional(allocation.observation.as_deref()),
        };
        let action = MovementAction::Allocated {
            location: location.clone(),
            recipient: effective,
            observation: fields.observation.clone(),
        };

        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::Id(item_id),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    expect_status(item, ItemStatus::EmFacilities, "allocate")?;
                    Ok(Transition::to(ItemStatus::DisponivelParaRetirada, action)
                        .with_location(location)
                        .with_allocation(fields))
                }),
            )
            .await?;

        tracing::info!(
            "📍 Encomenda {} alocada em {}",
            item.internal_id,
            item.location.as_deref().unwrap_or_default()
        );

        // Aviso fora da transação: falha aqui não desfaz a alocação
        let notification = match self.notifications.notify_item(&item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("⚠️ Aviso da encomenda {} não foi enviado: {}", item.internal_id, e);
                NotificationOutcome::default()
            }
        };

        Ok(AllocationResult { item, notification })
    }

    pub async fn change_location(&self, ctx: &RequestContext, item_id: Uuid, new_location: &str) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let to = required(new_location, "location")?;

        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::Id(item_id),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    expect_status(item, ItemStatus::DisponivelParaRetirada, "change_location")?;
                    let action = MovementAction::LocationChanged { from: item.location.clone(), to: to.clone() };
                    Ok(Transition::to(ItemStatus::DisponivelParaRetirada, action).with_location(to))
                }),
            )
            .await?;

        tracing::info!("🔁 Encomenda {} mudou de local", item.internal_id);
        Ok(item)
    }

    pub async fn deliver_by_signature(
        &self,
        ctx: &RequestContext,
        item_id: Uuid,
        received_by_name: &str,
        signature: &str,
    ) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let received_by = required(received_by_name, "receivedByName")?;
        let signature = required(signature, "signature")?;

        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::Id(item_id),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    expect_status(item, ItemStatus::DisponivelParaRetirada, "deliver")?;
                    let action = MovementAction::Delivered { received_by: received_by.clone() };
                    Ok(Transition::to(ItemStatus::Entregue, action)
                        .with_proof(NewProof::signature(received_by, signature)))
                }),
            )
            .await?;

        tracing::info!("✅ Encomenda {} entregue (assinatura)", item.internal_id);
        Ok(item)
    }

    /// O destinatário confirma com a própria senha. Falha sempre como
    /// `AuthenticationFailed`, exista ou não o e-mail.
    pub async fn deliver_by_password(
        &self,
        ctx: &RequestContext,
        item_id: Uuid,
        recipient_email: &str,
        password: &str,
    ) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let email = required(recipient_email, "email")?;

        let recipient = self.store.find_user_by_email(&email).await?.filter(|user| user.is_active);
        let Some(recipient) = recipient else {
            // Mesmo custo de bcrypt de um e-mail existente
            verify_password_for_unknown_user(password).await;
            return Err(AppError::AuthenticationFailed);
        };
        if !verify_password(password, &recipient.password_hash).await? {
            return Err(AppError::AuthenticationFailed);
        }

        let received_by = recipient.full_name;
        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::Id(item_id),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    expect_status(item, ItemStatus::DisponivelParaRetirada, "deliver")?;
                    let action = MovementAction::DeliveredViaPassword { received_by: received_by.clone() };
                    Ok(Transition::to(ItemStatus::Entregue, action).with_proof(NewProof::password(received_by)))
                }),
            )
            .await?;

        tracing::info!("✅ Encomenda {} entregue (senha)", item.internal_id);
        Ok(item)
    }

    pub async fn record_occurrence(
        &self,
        ctx: &RequestContext,
        internal_id: &str,
        kind: OccurrenceKind,
        note: &str,
        actor_password: &str,
    ) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let note = required(note, "note")?;
        self.reauthenticate(ctx, actor_password).await?;

        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::InternalId(internal_id.trim().to_string()),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    if item.status.is_closed() {
                        return Err(AppError::InvalidTransition { from: item.status, action: "record_occurrence" });
                    }
                    let action = MovementAction::RecordedOccurrence { occurrence: kind, note: note.clone() };
                    Ok(Transition::to(kind.status(), action).with_proof(NewProof::occurrence(kind, note)))
                }),
            )
            .await?;

        tracing::info!("⚠️ Ocorrência {} registrada para {}", kind.as_str(), item.internal_id);
        Ok(item)
    }

    /// Devolve a encomenda para a triagem. Local e destinatário ficam como estavam.
    pub async fn recover_item(
        &self,
        ctx: &RequestContext,
        internal_id: &str,
        note: &str,
        actor_password: &str,
    ) -> Result<Item, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let note = required(note, "note")?;
        self.reauthenticate(ctx, actor_password).await?;

        let role = ctx.role;
        let item = self
            .store
            .apply_transition(
                ctx.unit_id,
                &ItemKey::InternalId(internal_id.trim().to_string()),
                ctx.user_id,
                Box::new(move |item: &Item| {
                    match item.status {
                        ItemStatus::Extraviado => {}
                        ItemStatus::Devolvido | ItemStatus::Entregue if role.is_admin() => {}
                        ItemStatus::Devolvido | ItemStatus::Entregue => {
                            return Err(AppError::Forbidden(Denial::RecoveryRequiresAdmin));
                        }
                        from => return Err(AppError::InvalidTransition { from, action: "recover" }),
                    }
                    let action = MovementAction::RecoveredItem { previous: item.status, note: note.clone() };
                    Ok(Transition::to(ItemStatus::EmFacilities, action).with_proof(NewProof::recovery(note)))
                }),
            )
            .await?;

        tracing::info!("♻️ Encomenda {} recuperada", item.internal_id);
        Ok(item)
    }

    pub async fn resend_notification(&self, ctx: &RequestContext, item_id: Uuid) -> Result<NotificationOutcome, AppError> {
        require_role(ctx, Role::is_facilities)?;
        let item = self.find(ctx, &ItemKey::Id(item_id)).await?;
        expect_status(&item, ItemStatus::DisponivelParaRetirada, "notify")?;

        self.notifications.notify_item(&item).await
    }

    pub async fn get_item_history(&self, ctx: &RequestContext, item_id: Uuid) -> Result<ItemHistory, AppError> {
        let item = self.find(ctx, &ItemKey::Id(item_id)).await?;
        let movements = self.store.movements(item.id).await?;
        let proof = self.store.find_proof(item.id).await?;

        Ok(history::present(&item, &movements, proof.as_ref()))
    }

    pub async fn lookup_by_internal_id(&self, ctx: &RequestContext, internal_id: &str) -> Result<ItemStatusLookup, AppError> {
        let item = self.find(ctx, &ItemKey::InternalId(internal_id.trim().to_string())).await?;
        Ok(ItemStatusLookup::from(&item))
    }

    async fn find(&self, ctx: &RequestContext, key: &ItemKey) -> Result<Item, AppError> {
        self.store
            .find_item(ctx.unit_id, key)
            .await?
            .ok_or(AppError::NotFound(Resource::Item))
    }

    // Reautenticação do próprio operador (ocorrência e recuperação)
    async fn reauthenticate(&self, ctx: &RequestContext, password: &str) -> Result<(), AppError> {
        let actor = self
            .store
            .find_user_by_id(ctx.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or(AppError::AuthenticationFailed)?;

        if !verify_password(password, &actor.password_hash).await? {
            return Err(AppError::AuthenticationFailed);
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;
    use crate::models::proof::{PASSWORD_AUTH_SIGNATURE, RECOVERY_SIGNATURE};

    fn kinds(fx: &Fixture, item_id: Uuid) -> Vec<String> {
        fx.store
            .all_movements()
            .into_iter()
            .filter(|m| m.item_id == item_id)
            .map(|m| m.action)
            .collect()
    }

    #[test]
    fn internal_id_has_expected_shape() {
        let id = generate_internal_id();
        let today = Local::now().format("%Y%m%d").to_string();

        assert_eq!(id.len(), 16);
        assert!(id.starts_with(&format!("AP-{today}-")));
        assert!(id[12..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn full_lifecycle_from_reception_to_password_delivery() {
        let fx = Fixture::new();

        let item = fx.register("Amazon").await;
        assert_eq!(item.status, ItemStatus::RecebidoPortaria);
        assert_eq!(item.unit_id, fx.unit);
        assert!(item.internal_id.starts_with("AP-"));

        let item = fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap();
        assert_eq!(item.status, ItemStatus::EmFacilities);

        let result = fx.allocate(item.id, "Locker-3", "bob@co.com").await;
        assert_eq!(result.item.status, ItemStatus::DisponivelParaRetirada);
        assert_eq!(result.item.location.as_deref(), Some("Locker-3"));
        assert_eq!(result.notification, NotificationOutcome { sent: true, count: 1 });
        assert_eq!(fx.dispatcher.sent()[0].recipient, "bob@co.com");
        assert_eq!(fx.dispatcher.sent()[0].internal_id, item.internal_id);

        let item = fx
            .ledger
            .deliver_by_password(&fx.facilities, item.id, "bob@co.com", "bobpass")
            .await
            .unwrap();
        assert_eq!(item.status, ItemStatus::Entregue);

        let proof = fx.store.find_proof(item.id).await.unwrap().unwrap();
        assert_eq!(proof.received_by_name, "Bob Smith");
        assert_eq!(proof.signature_data, PASSWORD_AUTH_SIGNATURE);
        assert_eq!(fx.store.proof_count(item.id), 1);

        assert_eq!(
            kinds(&fx, item.id),
            vec!["REGISTER_PORTARIA", "COLLECT_FROM_PORTARIA", "ALLOCATED", "DELIVERED_VIA_PASSWORD"]
        );
    }

    #[tokio::test]
    async fn delivery_only_from_ready_for_pickup() {
        let fx = Fixture::new();
        let received = fx.register("Amazon").await;
        let in_triage = fx.register("Correios").await;
        fx.ledger.collect_item(&fx.facilities, in_triage.id).await.unwrap();

        for item_id in [received.id, in_triage.id] {
            let err = fx
                .ledger
                .deliver_by_signature(&fx.facilities, item_id, "Bob", "sig")
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidTransition { action: "deliver", .. }));
        }

        let ready = fx.ready_item("bob@co.com").await;
        fx.ledger.deliver_by_signature(&fx.facilities, ready.id, "Bob", "sig").await.unwrap();
        let again = fx.ledger.deliver_by_signature(&fx.facilities, ready.id, "Bob", "sig").await;
        assert!(matches!(
            again,
            Err(AppError::InvalidTransition { from: ItemStatus::Entregue, .. })
        ));
    }

    #[tokio::test]
    async fn wrong_password_leaves_item_untouched() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;
        let before = kinds(&fx, item.id).len();

        let wrong = fx.ledger.deliver_by_password(&fx.facilities, item.id, "bob@co.com", "wrongpass").await;
        assert!(matches!(wrong, Err(AppError::AuthenticationFailed)));

        // E-mail desconhecido responde exatamente igual
        let unknown = fx.ledger.deliver_by_password(&fx.facilities, item.id, "ghost@co.com", "x").await;
        assert!(matches!(unknown, Err(AppError::AuthenticationFailed)));

        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::DisponivelParaRetirada);
        assert_eq!(kinds(&fx, item.id).len(), before);
        assert_eq!(fx.store.proof_count(item.id), 0);
    }

    #[tokio::test]
    async fn concurrent_allocations_let_only_one_through() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap();

        let allocation = |location: &str| Allocation {
            location: location.into(),
            recipient_email: Some("bob@co.com".into()),
            ..Default::default()
        };
        let (first, second) = tokio::join!(
            fx.ledger.allocate_item(&fx.facilities, item.id, allocation("A1")),
            fx.ledger.allocate_item(&fx.admin, item.id, allocation("B2")),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(
                    r,
                    Err(AppError::InvalidTransition { from: ItemStatus::DisponivelParaRetirada, action: "allocate" })
                ))
                .count(),
            1
        );
        let allocated = kinds(&fx, item.id).iter().filter(|k| k.as_str() == "ALLOCATED").count();
        assert_eq!(allocated, 1);
        assert_eq!(fx.dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn allocation_requires_location() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap();

        let allocation = Allocation { location: "  ".into(), ..Default::default() };
        let err = fx.ledger.allocate_item(&fx.facilities, item.id, allocation).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("location")));
        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::EmFacilities);
        assert_eq!(kinds(&fx, item.id).len(), 2);
    }

    #[tokio::test]
    async fn other_units_cannot_see_or_touch_items() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        let otto = fx.facilities_in_other_unit();

        assert!(matches!(
            fx.ledger.lookup_by_internal_id(&otto, &item.internal_id).await,
            Err(AppError::NotFound(Resource::Item))
        ));
        assert!(matches!(
            fx.ledger.collect_item(&otto, item.id).await,
            Err(AppError::NotFound(Resource::Item))
        ));
        assert!(matches!(
            fx.ledger.get_item_history(&otto, item.id).await,
            Err(AppError::NotFound(Resource::Item))
        ));

        let here = fx.ledger.lookup_by_internal_id(&fx.facilities, &item.internal_id).await.unwrap();
        assert_eq!(here.status, ItemStatus::RecebidoPortaria);
        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::RecebidoPortaria);
    }

    #[tokio::test]
    async fn registration_is_limited_to_reception_roles() {
        let fx = Fixture::new();
        let registration = Registration { item_type: "Caixa".into(), tracking_code: None, sender: "Amazon".into() };

        for ctx in [fx.facilities, fx.bob_ctx()] {
            let err = fx.ledger.register_item(&ctx, registration.clone()).await.unwrap_err();
            assert!(matches!(err, AppError::Forbidden(Denial::Role)));
        }
        assert!(fx.ledger.register_item(&fx.admin, registration).await.is_ok());
    }

    #[tokio::test]
    async fn registration_requires_sender() {
        let fx = Fixture::new();
        let registration = Registration { item_type: "Caixa".into(), tracking_code: None, sender: " ".into() };
        let err = fx.ledger.register_item(&fx.portaria, registration).await.unwrap_err();
        assert!(matches!(err, AppError::MissingField("sender")));
    }

    #[tokio::test]
    async fn internal_id_collision_is_retried() {
        let fx = Fixture::new();
        fx.store.collide_internal_ids(2);
        let item = fx.register("Amazon").await;
        assert_eq!(kinds(&fx, item.id), vec!["REGISTER_PORTARIA"]);

        fx.store.collide_internal_ids(MAX_ID_ATTEMPTS);
        let registration = Registration { item_type: "Caixa".into(), tracking_code: None, sender: "DHL".into() };
        assert!(matches!(
            fx.ledger.register_item(&fx.portaria, registration).await,
            Err(AppError::DuplicateInternalId)
        ));
    }

    #[tokio::test]
    async fn storage_failure_rolls_back_the_transition() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;

        fx.store.fail_next_write();
        let err = fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));

        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::RecebidoPortaria);
        assert_eq!(kinds(&fx, item.id), vec!["REGISTER_PORTARIA"]);
    }

    #[tokio::test]
    async fn returned_item_recovery_needs_admin() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;

        let item = fx
            .ledger
            .record_occurrence(&fx.facilities, &item.internal_id, OccurrenceKind::Devolvido, "Recusada", "facilities123")
            .await
            .unwrap();
        assert_eq!(item.status, ItemStatus::Devolvido);

        let denied = fx
            .ledger
            .recover_item(&fx.facilities, &item.internal_id, "Remetente reenviou", "facilities123")
            .await;
        assert!(matches!(denied, Err(AppError::Forbidden(Denial::RecoveryRequiresAdmin))));
        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::Devolvido);

        let recovered = fx
            .ledger
            .recover_item(&fx.admin, &item.internal_id, "Remetente reenviou", "admin123")
            .await
            .unwrap();
        assert_eq!(recovered.status, ItemStatus::EmFacilities);
        // Local antigo fica até a próxima alocação
        assert_eq!(recovered.location.as_deref(), Some("Locker-3"));
    }

    #[tokio::test]
    async fn lost_item_can_be_recovered_by_facilities() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        fx.ledger
            .record_occurrence(&fx.facilities, &item.internal_id, OccurrenceKind::Extraviado, "Não achado", "facilities123")
            .await
            .unwrap();

        let recovered = fx
            .ledger
            .recover_item(&fx.facilities, &item.internal_id, "Achado no depósito", "facilities123")
            .await
            .unwrap();
        assert_eq!(recovered.status, ItemStatus::EmFacilities);

        let last = fx.store.all_movements().into_iter().last().unwrap();
        assert_eq!(
            last.decoded(),
            Some(MovementAction::RecoveredItem {
                previous: ItemStatus::Extraviado,
                note: "Achado no depósito".into()
            })
        );
    }

    #[tokio::test]
    async fn recovering_an_active_item_is_invalid() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        let err = fx
            .ledger
            .recover_item(&fx.admin, &item.internal_id, "?", "admin123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { action: "recover", .. }));
    }

    #[tokio::test]
    async fn occurrence_requires_the_operators_own_password() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;

        // A senha de outro usuário não serve
        let err = fx
            .ledger
            .record_occurrence(&fx.facilities, &item.internal_id, OccurrenceKind::Extraviado, "x", "admin123")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthenticationFailed));
        assert_eq!(fx.store.item(item.id).unwrap().status, ItemStatus::RecebidoPortaria);
        assert_eq!(fx.store.proof_count(item.id), 0);
    }

    #[tokio::test]
    async fn occurrence_is_rejected_on_closed_items() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;
        fx.ledger.deliver_by_signature(&fx.facilities, item.id, "Bob", "sig").await.unwrap();

        let err = fx
            .ledger
            .record_occurrence(&fx.facilities, &item.internal_id, OccurrenceKind::Extraviado, "x", "facilities123")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition { from: ItemStatus::Entregue, action: "record_occurrence" }
        ));
    }

    #[tokio::test]
    async fn latest_proof_replaces_the_previous_one() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;

        fx.ledger
            .record_occurrence(&fx.facilities, &item.internal_id, OccurrenceKind::Extraviado, "Sumiu", "facilities123")
            .await
            .unwrap();
        fx.ledger
            .recover_item(&fx.facilities, &item.internal_id, "Apareceu", "facilities123")
            .await
            .unwrap();

        assert_eq!(fx.store.proof_count(item.id), 1);
        let proof = fx.store.find_proof(item.id).await.unwrap().unwrap();
        assert_eq!(proof.signature_data, RECOVERY_SIGNATURE);
        assert_eq!(proof.occurrence_note.as_deref(), Some("Apareceu"));
        assert_eq!(proof.received_by_name, "SISTEMA");
    }

    #[tokio::test]
    async fn earlier_movements_are_never_rewritten() {
        let fx = Fixture::new();
        let first = fx.ready_item("bob@co.com").await;
        let snapshot: Vec<_> = fx
            .store
            .all_movements()
            .into_iter()
            .map(|m| (m.id, m.item_id, m.action, m.payload.map(|p| p.0), m.created_at))
            .collect();

        fx.ledger.change_location(&fx.facilities, first.id, "B2").await.unwrap();
        fx.ledger.deliver_by_signature(&fx.facilities, first.id, "Bob", "sig").await.unwrap();
        fx.ready_item("x@co.com").await;

        let after: Vec<_> = fx
            .store
            .all_movements()
            .into_iter()
            .map(|m| (m.id, m.item_id, m.action, m.payload.map(|p| p.0), m.created_at))
            .collect();
        assert!(after.len() > snapshot.len());
        assert_eq!(&after[..snapshot.len()], &snapshot[..]);
    }

    #[tokio::test]
    async fn location_change_records_old_and_new() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;

        let moved = fx.ledger.change_location(&fx.facilities, item.id, "B2").await.unwrap();
        assert_eq!(moved.status, ItemStatus::DisponivelParaRetirada);
        assert_eq!(moved.location.as_deref(), Some("B2"));

        let last = fx.store.all_movements().into_iter().last().unwrap();
        assert_eq!(
            last.decoded(),
            Some(MovementAction::LocationChanged { from: Some("Locker-3".into()), to: "B2".into() })
        );
    }

    #[tokio::test]
    async fn group_recipient_fans_out_to_every_member() {
        let fx = Fixture::new();
        fx.store.add_group(fx.unit, "Financeiro", &["a@co.com", "b@co.com", "c@co.com"]);

        let item = fx.register("Amazon").await;
        fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap();
        let result = fx.allocate(item.id, "Locker-3", "Financeiro").await;

        assert_eq!(result.notification, NotificationOutcome { sent: true, count: 3 });
        assert_eq!(result.item.recipient_email.as_deref(), Some("Financeiro"));
        let recipients: Vec<_> = fx.dispatcher.sent().into_iter().map(|n| n.recipient).collect();
        assert_eq!(recipients, vec!["a@co.com", "b@co.com", "c@co.com"]);

        let resent = fx.ledger.resend_notification(&fx.facilities, item.id).await.unwrap();
        assert_eq!(resent.count, 3);
        assert_eq!(fx.dispatcher.sent().len(), 6);
        assert_eq!(fx.store.item(item.id).unwrap().recipient_email.as_deref(), Some("Financeiro"));
    }

    #[tokio::test]
    async fn refused_notification_does_not_undo_allocation() {
        let fx = Fixture::new();
        fx.dispatcher.reject("bob@co.com");

        let item = fx.register("Amazon").await;
        fx.ledger.collect_item(&fx.facilities, item.id).await.unwrap();
        let result = fx.allocate(item.id, "Locker-3", "bob@co.com").await;

        assert_eq!(result.notification, NotificationOutcome { sent: false, count: 0 });
        let stored = fx.store.item(item.id).unwrap();
        assert_eq!(stored.status, ItemStatus::DisponivelParaRetirada);
        assert!(stored.last_notified_at.is_none());
    }

    #[tokio::test]
    async fn resend_requires_ready_item() {
        let fx = Fixture::new();
        let item = fx.register("Amazon").await;
        let err = fx.ledger.resend_notification(&fx.facilities, item.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { action: "notify", .. }));
    }

    #[tokio::test]
    async fn history_is_chronological_and_readable() {
        let fx = Fixture::new();
        let item = fx.ready_item("bob@co.com").await;
        fx.ledger
            .deliver_by_password(&fx.facilities, item.id, "bob@co.com", "bobpass")
            .await
            .unwrap();

        let history = fx.ledger.get_item_history(&fx.bob_ctx(), item.id).await.unwrap();
        assert_eq!(history.internal_id, item.internal_id);
        assert_eq!(history.status, ItemStatus::Entregue);

        let actions: Vec<_> = history.movements.iter().map(|m| m.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["Recebido na portaria", "Coletado pelo Facilities", "Alocado para retirada", "Entregue (senha)"]
        );
        assert_eq!(history.movements[0].actor_name, "Paula Portaria");
        assert_eq!(history.movements[3].details, "Recebido por: Bob Smith");
        assert!(history.movements.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn stale_items_are_notified_again_by_the_sweep() {
        let fx = Fixture::new();
        fx.ready_item("bob@co.com").await;
        assert_eq!(fx.dispatcher.sent().len(), 1);

        let notifications = NotificationService::new(fx.store.clone(), fx.dispatcher.clone());
        assert_eq!(notifications.sweep_stale(chrono::Duration::days(3)).await.unwrap(), 0);
        assert_eq!(notifications.sweep_stale(chrono::Duration::zero()).await.unwrap(), 1);
        assert_eq!(fx.dispatcher.sent().len(), 2);
    }
}
