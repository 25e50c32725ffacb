// src/db/memory_store.rs
//
// Porta de armazenamento em memória para os testes de unidade dos serviços.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    common::error::{AppError, Resource},
    db::store::{ClosedItemFilter, Guard, ItemKey, LedgerStore, QueueOrder},
    models::{
        auth::{Role, User},
        item::{ClosedItem, Item, ItemStatus, ItemView, NewItem, StatusCounts},
        movement::{Movement, MovementAction},
        proof::{NewProof, Proof},
        unit::{AllocationOptions, EmailGroup, Location, SelectableUser, Unit},
    },
    services::auth::hash_password_for_tests,
};

#[derive(Default)]
struct State {
    clock: i64,
    units: Vec<Unit>,
    users: Vec<User>,
    locations: Vec<Location>,
    groups: Vec<(EmailGroup, Vec<String>)>,
    items: Vec<Item>,
    movements: Vec<Movement>,
    proofs: HashMap<Uuid, Proof>,
    fail_next_write: bool,
    duplicate_ids_remaining: usize,
}

impl State {
    // Relógio lógico: cada escrita avança um segundo, a ordem fica determinística
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap() + Duration::seconds(self.clock)
    }

    fn push_movement(&mut self, item_id: Uuid, actor_id: Uuid, unit_id: Uuid, action: &MovementAction) {
        let at = self.tick();
        let actor_name = self.users.iter().find(|u| u.id == actor_id).map(|u| u.full_name.clone());
        self.movements.push(Movement {
            id: self.movements.len() as i64 + 1,
            item_id,
            user_id: actor_id,
            unit_id,
            action: action.kind().to_string(),
            payload: action.payload().map(Json),
            created_at: at,
            actor_name,
        });
    }

    fn upsert_proof(&mut self, item_id: Uuid, actor_id: Uuid, proof: &NewProof) {
        let at = self.tick();
        self.proofs.insert(
            item_id,
            Proof {
                item_id,
                signature_data: proof.signature_data.clone(),
                delivered_by: actor_id,
                received_by_name: proof.received_by_name.clone(),
                delivered_at: at,
                occurrence_note: proof.occurrence_note.clone(),
            },
        );
    }

    fn is_registered(&self, email: Option<&str>) -> bool {
        email.is_some_and(|email| self.users.iter().any(|u| u.email.as_deref() == Some(email)))
    }
}

fn matches_key(item: &Item, key: &ItemKey) -> bool {
    match key {
        ItemKey::Id(id) => item.id == *id,
        ItemKey::InternalId(code) => item.internal_id == *code,
    }
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    // --- Preparação de cenários ---

    pub fn add_unit(&self, name: &str, is_active: bool) -> Uuid {
        let mut state = self.lock();
        let created_at = state.tick();
        let unit = Unit { id: Uuid::new_v4(), name: name.to_string(), is_active, created_at };
        let id = unit.id;
        state.units.push(unit);
        id
    }

    pub fn add_user(
        &self,
        full_name: &str,
        email: Option<&str>,
        password: &str,
        role: Role,
        default_unit_id: Option<Uuid>,
    ) -> Uuid {
        let password_hash = hash_password_for_tests(password);
        let mut state = self.lock();
        let created_at = state.tick();
        let user = User {
            id: Uuid::new_v4(),
            username: None,
            email: email.map(str::to_string),
            full_name: full_name.to_string(),
            password_hash,
            role,
            is_active: true,
            default_unit_id,
            must_change_password: false,
            floor: None,
            created_at,
        };
        let id = user.id;
        state.users.push(user);
        id
    }

    pub fn deactivate_user(&self, user_id: Uuid) {
        let mut state = self.lock();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.is_active = false;
        }
    }

    pub fn add_location(&self, unit_id: Uuid, name: &str) -> Uuid {
        let location = Location { id: Uuid::new_v4(), unit_id, name: name.to_string(), is_active: true };
        let id = location.id;
        self.lock().locations.push(location);
        id
    }

    pub fn add_group(&self, unit_id: Uuid, name: &str, members: &[&str]) -> Uuid {
        let group = EmailGroup { id: Uuid::new_v4(), unit_id, name: name.to_string() };
        let id = group.id;
        let members = members.iter().map(|m| m.to_string()).collect();
        self.lock().groups.push((group, members));
        id
    }

    /// Próxima escrita falha depois de avaliada a regra (simula queda do banco).
    pub fn fail_next_write(&self) {
        self.lock().fail_next_write = true;
    }

    /// As próximas `n` inserções colidem no ID público.
    pub fn collide_internal_ids(&self, n: usize) {
        self.lock().duplicate_ids_remaining = n;
    }

    pub fn all_movements(&self) -> Vec<Movement> {
        self.lock().movements.clone()
    }

    pub fn proof_count(&self, item_id: Uuid) -> usize {
        usize::from(self.lock().proofs.contains_key(&item_id))
    }

    pub fn item(&self, item_id: Uuid) -> Option<Item> {
        self.lock().items.iter().find(|i| i.id == item_id).cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_unit(&self, unit_id: Uuid) -> Result<Option<Unit>, AppError> {
        Ok(self.lock().units.iter().find(|u| u.id == unit_id).cloned())
    }

    async fn first_active_unit(&self) -> Result<Option<Unit>, AppError> {
        Ok(self.lock().units.iter().find(|u| u.is_active).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.iter().find(|u| u.email.as_deref() == Some(email)).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        let state = self.lock();
        let user = state
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(login) || u.username.as_deref() == Some(login))
            .cloned();
        Ok(user)
    }

    async fn email_registered(&self, email: &str) -> Result<bool, AppError> {
        let state = self.lock();
        Ok(state.users.iter().any(|u| u.is_active && u.email.as_deref() == Some(email)))
    }

    async fn group_members(&self, unit_id: Uuid, name: &str) -> Result<Option<Vec<String>>, AppError> {
        let state = self.lock();
        let members = state
            .groups
            .iter()
            .find(|(group, _)| group.unit_id == unit_id && group.name == name)
            .map(|(_, members)| members.clone());
        Ok(members)
    }

    async fn allocation_options(&self, unit_id: Uuid) -> Result<AllocationOptions, AppError> {
        let state = self.lock();
        let mut users: Vec<SelectableUser> = state
            .users
            .iter()
            .filter(|u| u.is_active && u.role != Role::Admin && u.default_unit_id == Some(unit_id))
            .filter_map(|u| {
                u.email.clone().map(|email| SelectableUser { email, full_name: u.full_name.clone() })
            })
            .collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        let mut locations: Vec<Location> = state
            .locations
            .iter()
            .filter(|l| l.unit_id == unit_id && l.is_active)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));

        let mut groups: Vec<EmailGroup> = state
            .groups
            .iter()
            .filter(|(g, _)| g.unit_id == unit_id)
            .map(|(g, _)| g.clone())
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(AllocationOptions { users, locations, groups })
    }

    async fn insert_item(&self, item: NewItem, actor_id: Uuid) -> Result<Item, AppError> {
        let mut state = self.lock();
        if state.duplicate_ids_remaining > 0 {
            state.duplicate_ids_remaining -= 1;
            return Err(AppError::DuplicateInternalId);
        }
        if state.items.iter().any(|i| i.internal_id == item.internal_id) {
            return Err(AppError::DuplicateInternalId);
        }

        let now = state.tick();
        let created = Item {
            id: Uuid::new_v4(),
            internal_id: item.internal_id,
            unit_id: item.unit_id,
            tracking_code: item.tracking_code,
            item_type: item.item_type,
            sender: item.sender,
            recipient_email: None,
            recipient_name_manual: None,
            recipient_floor: None,
            location: None,
            observation: None,
            status: ItemStatus::RecebidoPortaria,
            created_at: now,
            updated_at: now,
            last_notified_at: None,
        };
        state.items.push(created.clone());
        state.push_movement(created.id, actor_id, created.unit_id, &MovementAction::RegisterPortaria);
        Ok(created)
    }

    async fn apply_transition(
        &self,
        unit_id: Uuid,
        key: &ItemKey,
        actor_id: Uuid,
        guard: Guard,
    ) -> Result<Item, AppError> {
        let mut state = self.lock();
        let index = state
            .items
            .iter()
            .position(|i| i.unit_id == unit_id && matches_key(i, key))
            .ok_or(AppError::NotFound(Resource::Item))?;

        let transition = guard(&state.items[index])?;

        if state.fail_next_write {
            state.fail_next_write = false;
            return Err(AppError::InternalServerError(anyhow::anyhow!("simulated write failure")));
        }

        let mut next = state.items[index].clone();
        transition.apply(&mut next);
        next.updated_at = state.tick();
        state.items[index] = next.clone();

        state.push_movement(next.id, actor_id, unit_id, &transition.action);
        if let Some(proof) = &transition.proof {
            state.upsert_proof(next.id, actor_id, proof);
        }
        Ok(next)
    }

    async fn mark_notified(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.lock();
        if let Some(item) = state.items.iter_mut().find(|i| i.id == item_id) {
            item.last_notified_at = Some(at);
        }
        Ok(())
    }

    async fn find_item(&self, unit_id: Uuid, key: &ItemKey) -> Result<Option<Item>, AppError> {
        let state = self.lock();
        Ok(state.items.iter().find(|i| i.unit_id == unit_id && matches_key(i, key)).cloned())
    }

    async fn list_items(
        &self,
        unit_id: Uuid,
        status: ItemStatus,
        order: QueueOrder,
    ) -> Result<Vec<ItemView>, AppError> {
        let state = self.lock();
        let mut items: Vec<ItemView> = state
            .items
            .iter()
            .filter(|i| i.unit_id == unit_id && i.status == status)
            .map(|i| ItemView {
                item: i.clone(),
                is_registered: state.is_registered(i.recipient_email.as_deref()),
            })
            .collect();
        match order {
            QueueOrder::CreatedAsc => items.sort_by_key(|v| v.item.created_at),
            QueueOrder::UpdatedAsc => items.sort_by_key(|v| v.item.updated_at),
            QueueOrder::UpdatedDesc => items.sort_by_key(|v| std::cmp::Reverse(v.item.updated_at)),
        }
        Ok(items)
    }

    async fn count_by_status(&self, unit_id: Uuid) -> Result<StatusCounts, AppError> {
        let state = self.lock();
        let count = |status: ItemStatus| {
            state.items.iter().filter(|i| i.unit_id == unit_id && i.status == status).count() as i64
        };
        Ok(StatusCounts {
            in_portaria: count(ItemStatus::RecebidoPortaria),
            in_facilities: count(ItemStatus::EmFacilities),
            ready: count(ItemStatus::DisponivelParaRetirada),
        })
    }

    async fn movements(&self, item_id: Uuid) -> Result<Vec<Movement>, AppError> {
        let state = self.lock();
        Ok(state.movements.iter().filter(|m| m.item_id == item_id).cloned().collect())
    }

    async fn find_proof(&self, item_id: Uuid) -> Result<Option<Proof>, AppError> {
        Ok(self.lock().proofs.get(&item_id).cloned())
    }

    async fn closed_items(&self, unit_id: Uuid, filter: &ClosedItemFilter) -> Result<Vec<ClosedItem>, AppError> {
        let state = self.lock();
        let term = filter.q.as_deref().filter(|q| !q.is_empty()).map(str::to_lowercase);
        let contains = |value: Option<&str>, term: &str| value.is_some_and(|v| v.to_lowercase().contains(term));

        let mut closed: Vec<ClosedItem> = state
            .items
            .iter()
            .filter(|i| i.unit_id == unit_id && i.status.is_closed())
            .filter_map(|i| {
                let proof = state.proofs.get(&i.id)?;
                let deliverer = state.users.iter().find(|u| u.id == proof.delivered_by)?;
                Some(ClosedItem {
                    item: i.clone(),
                    received_by_name: proof.received_by_name.clone(),
                    delivered_at: proof.delivered_at,
                    deliverer_name: deliverer.full_name.clone(),
                    occurrence_note: proof.occurrence_note.clone(),
                })
            })
            .filter(|c| match &term {
                Some(term) => {
                    contains(Some(c.item.internal_id.as_str()), term)
                        || contains(c.item.tracking_code.as_deref(), term)
                        || contains(Some(c.item.sender.as_str()), term)
                        || contains(Some(c.received_by_name.as_str()), term)
                }
                None => true,
            })
            .filter(|c| filter.start.is_none_or(|start| c.delivered_at.date_naive() >= start))
            .filter(|c| filter.end.is_none_or(|end| c.delivered_at.date_naive() <= end))
            .collect();
        closed.sort_by_key(|c| std::cmp::Reverse(c.delivered_at));
        Ok(closed)
    }

    async fn items_for_recipient(&self, unit_id: Uuid, email: &str) -> Result<Vec<Item>, AppError> {
        let state = self.lock();
        let mut items: Vec<Item> = state
            .items
            .iter()
            .filter(|i| {
                i.unit_id == unit_id
                    && (i.recipient_email.as_deref() == Some(email)
                        || i.recipient_name_manual.as_deref() == Some(email))
            })
            .cloned()
            .collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(items)
    }

    async fn unclaimed_items(&self, unit_id: Uuid) -> Result<Vec<Item>, AppError> {
        let state = self.lock();
        let mut items: Vec<Item> = state
            .items
            .iter()
            .filter(|i| {
                i.unit_id == unit_id
                    && i.recipient_email.as_deref().is_none_or(str::is_empty)
                    && i.recipient_name_manual.as_deref().is_none_or(|m| !m.contains('@'))
                    && !i.status.is_closed()
            })
            .cloned()
            .collect();
        items.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        Ok(items)
    }

    async fn stale_ready_items(&self, cutoff: DateTime<Utc>) -> Result<Vec<Item>, AppError> {
        let state = self.lock();
        let items = state
            .items
            .iter()
            .filter(|i| {
                i.status == ItemStatus::DisponivelParaRetirada
                    && i.last_notified_at.is_none_or(|at| at <= cutoff)
            })
            .cloned()
            .collect();
        Ok(items)
    }
}
