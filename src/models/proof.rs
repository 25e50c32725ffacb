// src/models/proof.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::item::OccurrenceKind;

/// Marcador gravado no lugar da assinatura quando o destinatário confirmou a senha.
pub const PASSWORD_AUTH_SIGNATURE: &str = "DATA:AUTHENTICATED_BY_PASSWORD";
/// Marcador da recuperação de uma encomenda.
pub const RECOVERY_SIGNATURE: &str = "OCC_RECUPERADO";
/// Nome registrado como "recebedor" em eventos lançados pelo sistema.
pub const SYSTEM_RECEIVER: &str = "SISTEMA";

pub fn occurrence_signature(kind: OccurrenceKind) -> String {
    format!("OCC_{}", kind.as_str())
}

// Comprovante: no máximo um por encomenda, o último evento substitui o anterior
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub item_id: Uuid,
    #[schema(ignore)]
    pub signature_data: String,
    pub delivered_by: Uuid,
    pub received_by_name: String,
    pub delivered_at: DateTime<Utc>,
    pub occurrence_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProof {
    pub signature_data: String,
    pub received_by_name: String,
    pub occurrence_note: Option<String>,
}

impl NewProof {
    pub fn signature(received_by_name: String, signature_data: String) -> Self {
        Self { signature_data, received_by_name, occurrence_note: None }
    }

    pub fn password(received_by_name: String) -> Self {
        Self {
            signature_data: PASSWORD_AUTH_SIGNATURE.to_string(),
            received_by_name,
            occurrence_note: None,
        }
    }

    pub fn occurrence(kind: OccurrenceKind, note: String) -> Self {
        Self {
            signature_data: occurrence_signature(kind),
            received_by_name: SYSTEM_RECEIVER.to_string(),
            occurrence_note: Some(note),
        }
    }

    pub fn recovery(note: String) -> Self {
        Self {
            signature_data: RECOVERY_SIGNATURE.to_string(),
            received_by_name: SYSTEM_RECEIVER.to_string(),
            occurrence_note: Some(note),
        }
    }
}
