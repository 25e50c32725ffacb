// src/services/auth.rs

use std::sync::{Arc, LazyLock};

use bcrypt::verify;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::{AppError, Denial, Resource},
    db::store::LedgerStore,
    models::auth::{AuthResponse, Claims, RequestContext, Role, User},
};

// Verificação do bcrypt fora do runtime assíncrono
pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password_clone = password.to_owned();
    let password_hash_clone = password_hash.to_owned();

    let is_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

    Ok(is_valid)
}

// Hash descartável para quando o usuário não existe
static UNKNOWN_USER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| bcrypt::hash("aeropost-unknown-user", bcrypt::DEFAULT_COST).ok());

/// Gasta o mesmo tempo de uma verificação real; o resultado é descartado.
pub async fn verify_password_for_unknown_user(password: &str) {
    let password_clone = password.to_owned();
    let _ = tokio::task::spawn_blocking(move || {
        if let Some(hash) = UNKNOWN_USER_HASH.as_deref() {
            let _ = verify(&password_clone, hash);
        }
    })
    .await;
}

#[cfg(test)]
pub fn hash_password_for_tests(password: &str) -> String {
    bcrypt::hash(password, 4).expect("bcrypt hash")
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn LedgerStore>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn LedgerStore>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    pub async fn login_user(&self, login: &str, password: &str) -> Result<AuthResponse, AppError> {
        let Some(user) = self.store.find_user_by_login(login.trim()).await? else {
            verify_password_for_unknown_user(password).await;
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash).await? {
            return Err(AppError::InvalidCredentials);
        }
        // Conta desativada responde igual a senha errada
        if !user.is_active {
            return Err(AppError::InvalidCredentials);
        }

        let unit_id = match user.default_unit_id {
            Some(unit_id) => unit_id,
            None => {
                self.store
                    .first_active_unit()
                    .await?
                    .ok_or(AppError::NotFound(Resource::Unit))?
                    .id
            }
        };

        tracing::info!("🔑 Login de {} na unidade {}", user.id, unit_id);
        self.issue(&user, unit_id)
    }

    /// Decodifica o token e remonta o contexto da requisição.
    pub async fn validate_token(&self, token: &str) -> Result<(User, RequestContext), AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = self
            .store
            .find_user_by_id(token_data.claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidToken)?;

        let ctx = RequestContext::for_session(&user, Some(token_data.claims.unit))
            .ok_or(AppError::InvalidToken)?;

        Ok((user, ctx))
    }

    /// Troca a unidade ativa da sessão e devolve um token novo.
    pub async fn switch_unit(&self, ctx: &RequestContext, unit_id: Uuid) -> Result<AuthResponse, AppError> {
        if ctx.role.pinned_to_default_unit() {
            return Err(AppError::Forbidden(Denial::UnitSwitch));
        }

        self.store
            .find_unit(unit_id)
            .await?
            .filter(|unit| unit.is_active)
            .ok_or(AppError::NotFound(Resource::Unit))?;

        let user = self
            .store
            .find_user_by_id(ctx.user_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        tracing::info!("🏢 Usuário {} trocou para a unidade {}", user.id, unit_id);
        self.issue(&user, unit_id)
    }

    pub async fn user_exists(&self, email: &str) -> Result<bool, AppError> {
        self.store.email_registered(email.trim()).await
    }

    fn issue(&self, user: &User, unit_id: Uuid) -> Result<AuthResponse, AppError> {
        let token = self.create_token(user.id, user.role, unit_id)?;
        Ok(AuthResponse { token, unit_id, must_change_password: user.must_change_password })
    }

    fn create_token(&self, user_id: Uuid, role: Role, unit: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id,
            role,
            unit,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
