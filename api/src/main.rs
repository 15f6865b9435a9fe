use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod brain;
mod config;
mod error;
mod executors;
mod llm;
mod middleware;
mod routes;
mod state;
mod store;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attache Agent API",
        version = "0.1.0",
        description = "Hybrid chat & action agent: classifies user messages, drafts third-party actions for approval, and executes approved actions with per-user credentials."
    ),
    paths(
        routes::health::root,
        routes::health::health_check,
        routes::agent::ask_agent,
        routes::agent::list_pending_actions,
        routes::agent::approve_action,
        routes::agent::execute_action,
    ),
    components(schemas(
        attache_core::error::ApiError,
        attache_core::actions::ActionStatus,
        attache_core::actions::ActionDraft,
        attache_core::actions::PendingAction,
        routes::health::RootResponse,
        routes::health::HealthResponse,
        routes::agent::AskAgentRequest,
        routes::agent::AskAgentResponse,
        routes::agent::PendingActionsResponse,
        routes::agent::ApproveActionRequest,
        routes::agent::ApproveActionResponse,
        routes::agent::ExecuteActionRequest,
        routes::agent::ExecuteActionResponse,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attache_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::Config::from_env().expect("invalid configuration");

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url())
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let store: Arc<dyn store::Store> = Arc::new(store::PgStore::new(pool));
    let llm: Arc<dyn llm::LanguageModel> = Arc::new(llm::OllamaClient::new(
        &config.ollama_base_url,
        &config.model,
    ));
    let executors = Arc::new(executors::ExecutorSet::standard());
    let brain = Arc::new(brain::AgentBrain::new(
        store.clone(),
        llm,
        executors.clone(),
    ));

    let app_state = state::AppState {
        brain,
        store,
        executors,
    };

    // CORS
    let cors_layer = middleware::cors::build_cors_layer();

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::agent::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(model = %config.model, "Attache API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
