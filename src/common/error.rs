// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::{middleware::i18n::Locale, models::item::ItemStatus};

// O que não foi encontrado (sempre dentro da unidade ativa)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Item,
    Unit,
    User,
}

// Motivos de recusa por perfil ou unidade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Role,
    UnitSwitch,
    RecoveryRequiresAdmin,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error("{0:?} não encontrado")]
    NotFound(Resource),

    #[error("Transição inválida: {action} a partir de {from}")]
    InvalidTransition { from: ItemStatus, action: &'static str },

    // Nunca revela se o e-mail existe
    #[error("Falha de autenticação")]
    AuthenticationFailed,

    #[error("Acesso negado: {0:?}")]
    Forbidden(Denial),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("ID público já utilizado")]
    DuplicateInternalId,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Erro já pronto para a resposta HTTP
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::AuthenticationFailed
            | AppError::InvalidCredentials
            | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converte para a resposta HTTP no idioma do cliente.
    pub fn to_api_error(self, locale: &Locale) -> ApiError {
        let en = locale.is_english();
        let status = self.status();

        let (error, details) = match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                let msg = pick(en, "Um ou mais campos são inválidos.", "One or more fields are invalid.");
                (msg.to_string(), Some(Value::Object(details)))
            }
            AppError::MissingField(field) => {
                let msg = if en {
                    format!("The field '{field}' is required.")
                } else {
                    format!("O campo '{field}' é obrigatório.")
                };
                let mut details = serde_json::Map::new();
                details.insert(field.to_string(), json!(["required"]));
                (msg, Some(Value::Object(details)))
            }
            AppError::NotFound(resource) => {
                let msg = match resource {
                    Resource::Item => pick(en, "Encomenda não encontrada.", "Item not found."),
                    Resource::Unit => pick(en, "Unidade não encontrada ou inativa.", "Unit not found or inactive."),
                    Resource::User => pick(en, "Usuário não encontrado.", "User not found."),
                };
                (msg.to_string(), None)
            }
            AppError::InvalidTransition { from, action } => {
                let msg = if en {
                    format!("Cannot {action} an item in status {from}.")
                } else {
                    format!("Não é possível executar '{action}' em uma encomenda com status {from}.")
                };
                (msg, None)
            }
            AppError::AuthenticationFailed => {
                let msg = pick(en, "Senha incorreta para o usuário informado.", "Incorrect password for the given user.");
                (msg.to_string(), None)
            }
            AppError::Forbidden(denial) => {
                let msg = match denial {
                    Denial::Role => pick(en, "Acesso negado para seu perfil.", "Access denied for your role."),
                    Denial::UnitSwitch => pick(
                        en,
                        "Seu perfil não pode trocar de unidade.",
                        "Your role cannot switch units.",
                    ),
                    Denial::RecoveryRequiresAdmin => pick(
                        en,
                        "Apenas administradores podem recuperar encomendas entregues ou devolvidas.",
                        "Only administrators can recover delivered or returned items.",
                    ),
                };
                (msg.to_string(), None)
            }
            AppError::InvalidCredentials => {
                (pick(en, "Usuário ou senha inválidos.", "Invalid user or password.").to_string(), None)
            }
            AppError::InvalidToken => {
                let msg = pick(
                    en,
                    "Token de autenticação inválido ou ausente.",
                    "Missing or invalid authentication token.",
                );
                (msg.to_string(), None)
            }
            // Todos os outros erros viram 500; o detalhe vai só para o log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (pick(en, "Ocorreu um erro inesperado.", "An unexpected error occurred.").to_string(), None)
            }
        };

        ApiError { status, error, details }
    }
}

fn pick(en: bool, pt: &'static str, english: &'static str) -> &'static str {
    if en { english } else { pt }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        err.to_api_error(&Locale::default())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
