// src/services/recipient.rs
//
// Resolução do destinatário em duas etapas: primeiro normaliza o que veio do
// formulário (na alocação), depois decide grupo x endereço (no envio).

use uuid::Uuid;

use crate::{common::error::AppError, db::store::LedgerStore};

/// Valor que o seletor envia quando a pessoa ainda não tem cadastro.
pub const NEW_RECIPIENT_SENTINEL: &str = "__NEW__";

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// E-mail efetivo a partir dos dois campos do formulário.
pub fn effective_email(email: Option<&str>, manual: Option<&str>) -> Option<String> {
    let email = non_empty(email).filter(|e| *e != NEW_RECIPIENT_SENTINEL);
    match email {
        Some(email) => Some(email.to_string()),
        // Muita gente digita o e-mail no campo de nome
        None => non_empty(manual).filter(|m| m.contains('@')).map(str::to_string),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Individual(String),
    Group { name: String, members: Vec<String> },
    Unidentified,
}

impl Recipient {
    /// Endereços que recebem o aviso.
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            Recipient::Individual(email) => vec![email.as_str()],
            Recipient::Group { members, .. } => members.iter().map(String::as_str).collect(),
            Recipient::Unidentified => Vec::new(),
        }
    }
}

/// Grupo da unidade (nome exato) ou endereço literal.
pub async fn resolve(
    store: &dyn LedgerStore,
    unit_id: Uuid,
    effective: Option<&str>,
) -> Result<Recipient, AppError> {
    let Some(target) = non_empty(effective) else {
        return Ok(Recipient::Unidentified);
    };

    match store.group_members(unit_id, target).await? {
        Some(members) => Ok(Recipient::Group { name: target.to_string(), members }),
        None => Ok(Recipient::Individual(target.to_string())),
    }
}
