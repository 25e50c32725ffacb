// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    common::error::{ApiError, AppError, Denial},
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::Role,
};

/// 1. O Trait que define um conjunto de perfis
pub trait RoleSet: Send + Sync + 'static {
    fn allows(role: Role) -> bool;
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleSet,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let locale = Locale::from_parts(parts);

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale))?;

        if !T::allows(user.ctx.role) {
            return Err(AppError::Forbidden(Denial::Role).to_api_error(&locale));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS CONJUNTOS (TIPOS)
// ---

/// PORTARIA, ADMIN, FACILITIES_PORTARIA
pub struct Reception;
impl RoleSet for Reception {
    fn allows(role: Role) -> bool { role.can_receive() }
}

/// FACILITIES, ADMIN, FACILITIES_PORTARIA
pub struct FacilitiesClass;
impl RoleSet for FacilitiesClass {
    fn allows(role: Role) -> bool { role.is_facilities() }
}
