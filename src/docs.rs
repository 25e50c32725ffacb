// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,
        handlers::auth::set_active_unit,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::check_user,

        // --- Encomendas ---
        handlers::items::register_item,
        handlers::items::collect_item,
        handlers::items::allocate_item,
        handlers::items::change_location,
        handlers::items::deliver_by_signature,
        handlers::items::deliver_by_password,
        handlers::items::resend_notification,
        handlers::items::get_item_history,
        handlers::items::lookup_item,

        // --- Ocorrências ---
        handlers::occurrences::handle_occurrence,

        // --- Painéis ---
        handlers::dashboard::get_reception_queue,
        handlers::dashboard::get_facilities_board,
        handlers::dashboard::get_allocation_options,
        handlers::dashboard::get_closed_history,
        handlers::dashboard::get_my_items,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::Role,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::SetActiveUnitPayload,
            models::auth::AuthResponse,
            models::auth::MeResponse,
            models::auth::UserCheckResponse,

            // --- Unidade ---
            models::unit::Unit,
            models::unit::Location,
            models::unit::EmailGroup,
            models::unit::SelectableUser,
            models::unit::AllocationOptions,

            // --- Encomendas ---
            models::item::ItemStatus,
            models::item::OccurrenceKind,
            models::item::Item,
            models::item::ItemView,
            models::item::StatusCounts,
            models::item::FacilitiesBoard,
            models::item::ClosedItem,
            models::item::MyItems,
            models::item::NotificationOutcome,
            models::item::AllocationResult,
            models::item::ItemStatusLookup,
            models::movement::HistoryEntry,
            models::movement::ItemHistory,

            // --- Payloads ---
            handlers::items::RegisterItemPayload,
            handlers::items::AllocateItemPayload,
            handlers::items::ChangeLocationPayload,
            handlers::items::SignatureDeliveryPayload,
            handlers::items::PasswordDeliveryPayload,
            handlers::occurrences::OccurrenceAction,
            handlers::occurrences::OccurrencePayload,
        )
    ),
    tags(
        (name = "Auth", description = "Login e unidade ativa da sessão"),
        (name = "Users", description = "Dados do Usuário e Perfil"),
        (name = "Encomendas", description = "Ciclo de custódia: portaria, triagem, retirada"),
        (name = "Ocorrências", description = "Extravio, devolução e recuperação"),
        (name = "Painéis", description = "Filas, histórico e minhas encomendas")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
