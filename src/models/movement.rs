// src/models/movement.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::item::{ItemStatus, OccurrenceKind};

// --- Ação registrada na trilha de auditoria ---
// Persistida como (kind, payload): a tag vai na coluna `action` e os campos
// estruturados em `payload` (JSONB).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum MovementAction {
    #[serde(rename = "REGISTER_PORTARIA")]
    RegisterPortaria,

    #[serde(rename = "COLLECT_FROM_PORTARIA")]
    CollectFromPortaria,

    #[serde(rename = "ALLOCATED")]
    Allocated {
        location: String,
        recipient: Option<String>,
        observation: Option<String>,
    },

    #[serde(rename = "LOCATION_CHANGED_TO")]
    LocationChanged { from: Option<String>, to: String },

    #[serde(rename = "DELIVERED")]
    Delivered { received_by: String },

    #[serde(rename = "DELIVERED_VIA_PASSWORD")]
    DeliveredViaPassword { received_by: String },

    #[serde(rename = "RECORDED_OCCURRENCE")]
    RecordedOccurrence { occurrence: OccurrenceKind, note: String },

    #[serde(rename = "RECOVERED_ITEM")]
    RecoveredItem { previous: ItemStatus, note: String },
}

impl MovementAction {
    pub fn kind(&self) -> &'static str {
        match self {
            MovementAction::RegisterPortaria => "REGISTER_PORTARIA",
            MovementAction::CollectFromPortaria => "COLLECT_FROM_PORTARIA",
            MovementAction::Allocated { .. } => "ALLOCATED",
            MovementAction::LocationChanged { .. } => "LOCATION_CHANGED_TO",
            MovementAction::Delivered { .. } => "DELIVERED",
            MovementAction::DeliveredViaPassword { .. } => "DELIVERED_VIA_PASSWORD",
            MovementAction::RecordedOccurrence { .. } => "RECORDED_OCCURRENCE",
            MovementAction::RecoveredItem { .. } => "RECOVERED_ITEM",
        }
    }

    /// Campos estruturados da ação (None para ações sem dados).
    pub fn payload(&self) -> Option<Value> {
        let mut value = serde_json::to_value(self).ok()?;
        value
            .get_mut("payload")
            .map(Value::take)
            .filter(|payload| !payload.is_null())
    }

    /// Reconstrói a ação a partir das colunas. `None` quando a tag é
    /// desconhecida ou o payload não bate com ela.
    pub fn from_parts(kind: &str, payload: Option<&Value>) -> Option<Self> {
        let mut tagged = Map::new();
        tagged.insert("kind".into(), Value::String(kind.to_string()));
        if let Some(payload) = payload.filter(|p| !p.is_null()) {
            tagged.insert("payload".into(), payload.clone());
        }
        serde_json::from_value(Value::Object(tagged)).ok()
    }

    /// Texto no formato antigo (`"ALLOCATED: X AND ID_RECIPIENT | nota"`),
    /// usado apenas na borda de apresentação e exportação.
    pub fn legacy_label(&self) -> String {
        match self {
            MovementAction::Allocated { location, observation, .. } => {
                with_note(format!("ALLOCATED: {location} AND ID_RECIPIENT"), observation.as_deref())
            }
            MovementAction::LocationChanged { from, to } => {
                let note = from.as_deref().map(|from| format!("{from} -> {to}"));
                with_note(format!("LOCATION_CHANGED_TO: {to}"), note.as_deref())
            }
            MovementAction::RecordedOccurrence { occurrence, note } => {
                with_note(format!("RECORDED_OCCURRENCE: {}", occurrence.as_str()), Some(note))
            }
            MovementAction::RecoveredItem { note, .. } => {
                with_note("RECOVERED_ITEM".to_string(), Some(note))
            }
            other => other.kind().to_string(),
        }
    }
}

fn with_note(label: String, note: Option<&str>) -> String {
    match note.filter(|n| !n.is_empty()) {
        Some(note) => format!("{label} | {note}"),
        None => label,
    }
}

// --- Linha da trilha (como sai do banco, com o nome de quem agiu) ---
#[derive(Debug, Clone, FromRow)]
pub struct Movement {
    pub id: i64,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub unit_id: Uuid,
    pub action: String,
    pub payload: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub actor_name: Option<String>,
}

impl Movement {
    pub fn decoded(&self) -> Option<MovementAction> {
        MovementAction::from_parts(&self.action, self.payload.as_ref().map(|p| &p.0))
    }
}

// --- Histórico apresentado ---
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[schema(example = "Alocado para retirada")]
    pub action: String,
    pub actor_name: String,
    #[schema(example = "Locker-3 - Frágil")]
    pub details: String,
    /// A ação no formato de texto antigo (`"ALLOCATED: X AND ID_RECIPIENT | nota"`).
    #[schema(example = "ALLOCATED: Locker-3 AND ID_RECIPIENT | Frágil")]
    pub raw: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemHistory {
    pub internal_id: String,
    pub status: ItemStatus,
    pub movements: Vec<HistoryEntry>,
}
