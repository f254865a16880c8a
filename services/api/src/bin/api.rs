//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Argon2Hasher, DbAdapter, DisabledAdvisory, OpenAiAdvisoryAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, register_handler},
        middleware::require_auth,
        rest::{self, ApiDoc},
        state::AppState,
        ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use bitacora_core::ports::{AdvisoryService, ChangeEvent, ChangeFeed};
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Wait before re-subscribing after the change feed drops.
const FEED_RETRY: Duration = Duration::from_secs(5);

/// Forwards the database change feed into the in-process broadcast channel,
/// re-subscribing whenever the listener connection drops.
async fn forward_changes(feed: Arc<dyn ChangeFeed>, changes: broadcast::Sender<ChangeEvent>) {
    loop {
        match feed.subscribe().await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(event) if event.is_subscribed_topic() => {
                            let _ = changes.send(event);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Change feed failed: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!("Could not subscribe to the change feed: {}", e),
        }
        tokio::time::sleep(FEED_RETRY).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let advisory: Arc<dyn AdvisoryService> = match &config.openai_api_key {
        Some(key) => {
            let mut openai_config = OpenAIConfig::new().with_api_key(key);
            if let Some(base) = &config.openai_base_url {
                openai_config = openai_config.with_api_base(base);
            }
            Arc::new(OpenAiAdvisoryAdapter::new(
                Client::with_config(openai_config),
                config.advisory_model.clone(),
                config.summary_model.clone(),
            ))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; advisory features will show their fallback texts.");
            Arc::new(DisabledAdvisory)
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        db_adapter.clone(),
        Arc::new(Argon2Hasher),
        advisory,
        config.clone(),
    ));

    // --- 5. Start the Realtime Change Feed ---
    tokio::spawn(forward_changes(db_adapter, app_state.changes.clone()));

    let cors_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/login", post(login_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/sync", get(rest::sync_handler))
        .route("/ws", get(ws_handler))
        .route(
            "/logbooks",
            get(rest::list_logbooks_handler).post(rest::create_logbook_handler),
        )
        .route("/logbooks/export", get(rest::export_logbooks_handler))
        .route(
            "/logbooks/{id}",
            get(rest::get_logbook_handler)
                .put(rest::update_logbook_handler)
                .delete(rest::delete_logbook_handler),
        )
        .route("/logbooks/{id}/claim", post(rest::claim_logbook_handler))
        .route("/logbooks/{id}/submit", post(rest::submit_logbook_handler))
        .route("/logbooks/{id}/finalize", post(rest::finalize_logbook_handler))
        .route("/logbooks/{id}/document", get(rest::logbook_document_handler))
        .route(
            "/expenses",
            get(rest::list_expenses_handler).post(rest::submit_expense_handler),
        )
        .route("/expenses/fuel-calc", post(rest::fuel_calc_handler))
        .route("/expenses/export", get(rest::export_expenses_handler))
        .route("/expenses/{id}/status", put(rest::review_expense_handler))
        .route("/expenses/{id}/document", get(rest::expense_document_handler))
        .route(
            "/trips",
            get(rest::list_trips_handler).post(rest::create_trip_handler),
        )
        .route(
            "/trips/{id}",
            put(rest::update_trip_handler).delete(rest::delete_trip_handler),
        )
        .route(
            "/notifications",
            get(rest::list_notifications_handler).post(rest::send_notification_handler),
        )
        .route("/notifications/{id}/read", post(rest::mark_read_handler))
        .route(
            "/profiles",
            get(rest::list_profiles_handler).post(rest::add_operator_handler),
        )
        .route("/profiles/{id}", delete(rest::delete_profile_handler))
        .route("/profiles/{id}/toggle-status", post(rest::toggle_profile_handler))
        .route(
            "/media",
            get(rest::list_media_handler).post(rest::upload_media_handler),
        )
        .route("/media/{id}", delete(rest::delete_media_handler))
        .route("/advisory/trip-insights", post(rest::trip_insights_handler))
        .route("/advisory/address", post(rest::address_check_handler))
        .route("/advisory/fleet-summary", get(rest::fleet_summary_handler))
        .route("/advisory/expense-audit", get(rest::expense_audit_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes. Signatures and photos travel as base64 inside JSON.
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
