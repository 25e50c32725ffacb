// src/services/history.rs
//
// Apresentação da trilha: transforma cada movimento em (rótulo, detalhes).
// Linhas antigas gravadas só como texto são interpretadas pelo prefixo;
// qualquer coisa desconhecida aparece como veio.

use crate::models::{
    item::{Item, OccurrenceKind},
    movement::{HistoryEntry, ItemHistory, Movement, MovementAction},
    proof::Proof,
};

const NOTE_SEPARATOR: &str = " | ";
const NO_DETAILS: &str = "-";

pub fn present(item: &Item, movements: &[Movement], proof: Option<&Proof>) -> ItemHistory {
    let movements = movements
        .iter()
        .map(|movement| {
            let (action, details) = describe(item, movement, proof);
            HistoryEntry {
                timestamp: movement.created_at,
                action,
                actor_name: movement.actor_name.clone().unwrap_or_else(|| NO_DETAILS.to_string()),
                details,
                raw: raw_label(movement),
            }
        })
        .collect();

    ItemHistory { internal_id: item.internal_id.clone(), status: item.status, movements }
}

// Texto no formato antigo, para quem ainda lê a trilha como string
fn raw_label(movement: &Movement) -> String {
    match movement.decoded() {
        Some(action) => action.legacy_label(),
        None => movement.action.clone(),
    }
}

fn describe(item: &Item, movement: &Movement, proof: Option<&Proof>) -> (String, String) {
    if let Some(action) = movement.decoded() {
        return label(item, &action, None);
    }

    let (raw, note) = split_note(&movement.action);
    // O estado anterior da recuperação não ficava registrado no texto
    if raw.starts_with("RECOVERED_ITEM") {
        let details = note
            .map(str::to_string)
            .or_else(|| proof.and_then(|p| p.occurrence_note.clone()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| NO_DETAILS.to_string());
        return ("Recuperado".to_string(), details);
    }
    match from_legacy(raw, proof) {
        Some(action) => label(item, &action, note),
        None => (raw.to_string(), note.unwrap_or(NO_DETAILS).to_string()),
    }
}

// "AÇÃO | nota" -> ("AÇÃO", Some("nota"))
fn split_note(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(NOTE_SEPARATOR) {
        Some((action, note)) => (action.trim(), Some(note.trim()).filter(|n| !n.is_empty())),
        None => (raw.trim(), None),
    }
}

/// Reconstrói a ação a partir do texto antigo. O que o texto não tem
/// (quem recebeu, por exemplo) vem do comprovante.
fn from_legacy(raw: &str, proof: Option<&Proof>) -> Option<MovementAction> {
    let receiver = || proof.map(|p| p.received_by_name.clone()).unwrap_or_else(|| NO_DETAILS.into());
    let proof_note = || proof.and_then(|p| p.occurrence_note.clone()).unwrap_or_default();

    if raw == "REGISTER_PORTARIA" {
        return Some(MovementAction::RegisterPortaria);
    }
    if raw == "COLLECT_FROM_PORTARIA" {
        return Some(MovementAction::CollectFromPortaria);
    }
    if raw.starts_with("DELIVERED_VIA_PASSWORD") {
        return Some(MovementAction::DeliveredViaPassword { received_by: receiver() });
    }
    if raw.starts_with("DELIVERED") {
        return Some(MovementAction::Delivered { received_by: receiver() });
    }
    if let Some(rest) = raw.strip_prefix("ALLOCATED:") {
        let location = rest.split(" AND ").next().unwrap_or_default().trim().to_string();
        return Some(MovementAction::Allocated { location, recipient: None, observation: None });
    }
    if let Some(rest) = raw.strip_prefix("LOCATION_CHANGED_TO:") {
        return Some(MovementAction::LocationChanged { from: None, to: rest.trim().to_string() });
    }
    if let Some(rest) = raw.strip_prefix("RECORDED_OCCURRENCE") {
        let occurrence = match rest.trim_start_matches(':').trim() {
            "EXTRAVIADO" => OccurrenceKind::Extraviado,
            "DEVOLVIDO" => OccurrenceKind::Devolvido,
            _ => return None,
        };
        return Some(MovementAction::RecordedOccurrence { occurrence, note: proof_note() });
    }
    None
}

fn label(item: &Item, action: &MovementAction, legacy_note: Option<&str>) -> (String, String) {
    let or_dash = |value: Option<&str>| value.filter(|v| !v.is_empty()).unwrap_or(NO_DETAILS).to_string();

    match action {
        MovementAction::RegisterPortaria => {
            ("Recebido na portaria".into(), format!("Remetente: {}", item.sender))
        }
        MovementAction::CollectFromPortaria => {
            ("Coletado pelo Facilities".into(), or_dash(legacy_note))
        }
        MovementAction::Allocated { location, observation, .. } => {
            let note = observation.as_deref().or(legacy_note).filter(|n| !n.is_empty());
            let details = match note {
                Some(note) => format!("{location} - {note}"),
                None => location.clone(),
            };
            ("Alocado para retirada".into(), details)
        }
        MovementAction::LocationChanged { from, to } => {
            let details = match (from, legacy_note) {
                (Some(from), _) => format!("{from} → {to}"),
                (None, Some(note)) => note.to_string(),
                (None, None) => to.clone(),
            };
            ("Local alterado".into(), details)
        }
        MovementAction::Delivered { received_by } => {
            ("Entregue (assinatura)".into(), format!("Recebido por: {received_by}"))
        }
        MovementAction::DeliveredViaPassword { received_by } => {
            ("Entregue (senha)".into(), format!("Recebido por: {received_by}"))
        }
        MovementAction::RecordedOccurrence { occurrence, note } => {
            let details = or_dash(legacy_note.or(Some(note.as_str())));
            (format!("Ocorrência: {}", occurrence.as_str()), details)
        }
        MovementAction::RecoveredItem { previous, note } => {
            (format!("Recuperado de {previous}"), or_dash(Some(note.as_str())))
        }
    }
}
