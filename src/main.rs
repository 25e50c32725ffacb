//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;
use crate::services::notification_service::reminder_task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar
    let config = Config::from_env()?;
    let app_state = AppState::new(&config).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Lembretes de encomendas paradas
    tokio::spawn(reminder_task(
        app_state.notification_service.clone(),
        config.reminder_interval,
        config.reminder_after,
    ));

    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/check", get(handlers::auth::check_user));

    let item_routes = Router::new()
        .route("/", post(handlers::items::register_item))
        .route("/lookup/{internal_id}", get(handlers::items::lookup_item))
        .route("/{id}/collect", post(handlers::items::collect_item))
        .route("/{id}/allocate", post(handlers::items::allocate_item))
        .route("/{id}/location", post(handlers::items::change_location))
        .route("/{id}/deliver/signature", post(handlers::items::deliver_by_signature))
        .route("/{id}/deliver/password", post(handlers::items::deliver_by_password))
        .route("/{id}/notify", post(handlers::items::resend_notification))
        .route("/{id}/history", get(handlers::items::get_item_history));

    let dashboard_routes = Router::new()
        .route("/reception", get(handlers::dashboard::get_reception_queue))
        .route("/facilities", get(handlers::dashboard::get_facilities_board))
        .route("/allocation-options", get(handlers::dashboard::get_allocation_options));

    // Tudo abaixo exige o Bearer
    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/items", item_routes)
        .nest("/dashboard", dashboard_routes)
        .route("/occurrences", post(handlers::occurrences::handle_occurrence))
        .route("/history", get(handlers::dashboard::get_closed_history))
        .route("/me/items", get(handlers::dashboard::get_my_items))
        .route("/session/unit", put(handlers::auth::set_active_unit))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/auth/login", post(handlers::auth::login))
        .nest("/api", protected_routes)
        .with_state(app_state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
