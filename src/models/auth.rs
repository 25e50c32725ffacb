// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Perfis de acesso. A ordem das variantes segue o tipo `user_role` do banco.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Facilities,
    FacilitiesPortaria,
    Portaria,
    User,
}

impl Role {
    /// Pode registrar encomendas na portaria.
    pub fn can_receive(self) -> bool {
        matches!(self, Role::Portaria | Role::Admin | Role::FacilitiesPortaria)
    }

    /// Perfis "classe Facilities": triagem, alocação, entrega e ocorrências.
    pub fn is_facilities(self) -> bool {
        matches!(self, Role::Facilities | Role::Admin | Role::FacilitiesPortaria)
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    /// Operador exclusivo de portaria fica preso à unidade padrão.
    pub fn pinned_to_default_unit(self) -> bool {
        self == Role::Portaria
    }
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: String,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub role: Role,
    pub is_active: bool,
    pub default_unit_id: Option<Uuid>,
    pub must_change_password: bool,
    pub floor: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---
// Contexto da requisição
// ---
// Valor imutável que acompanha toda operação do núcleo.
// Nunca é lido de estado global: o middleware de autenticação monta e entrega.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub role: Role,
    pub unit_id: Uuid,
}

impl RequestContext {
    /// Monta o contexto a partir do usuário e da unidade escolhida na sessão.
    /// PORTARIA sempre usa a unidade padrão, ignorando a sessão
    /// (a sessão só vale enquanto ela não tiver unidade padrão).
    pub fn for_session(user: &User, session_unit: Option<Uuid>) -> Option<Self> {
        let unit_id = if user.role.pinned_to_default_unit() {
            user.default_unit_id.or(session_unit)
        } else {
            session_unit.or(user.default_unit_id)
        }?;

        Some(Self {
            user_id: user.id,
            role: user.role,
            unit_id,
        })
    }
}

// Dados para login (e-mail ou username)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(length(min = 1, message = "Informe o e-mail ou usuário."))]
    #[schema(example = "bob@co.com")]
    pub login: String,
    #[validate(length(min = 1, message = "Informe a senha."))]
    pub password: String,
}

// Troca da unidade ativa
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveUnitPayload {
    pub unit_id: Uuid,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub unit_id: Uuid,
    pub must_change_password: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub active_unit_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserCheckResponse {
    pub exists: bool,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub role: Role,
    pub unit: Uuid, // Unidade ativa da sessão
    pub exp: usize,
    pub iat: usize,
}
