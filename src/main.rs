use anyhow::Context;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use deferq::config::Config;
use deferq::handlers::{
    FailureListResponse, FailureResponse, JobListResponse, JobResponse, QueueStatsResponse,
};
use deferq::state::AppState;
use deferq::{build_router, handlers};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::job::get_queue_stats,
        handlers::job::list_jobs,
        handlers::job::list_failures,
    ),
    components(schemas(
        QueueStatsResponse,
        JobResponse,
        JobListResponse,
        FailureResponse,
        FailureListResponse,
    )),
    tags(
        (name = "Queue", description = "Read-only queue inspection endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    let addr = config.server_addr();

    // Resolve the default queue connection
    tracing::info!(connection = %config.default_connection, "Connecting to queue...");
    let state = AppState::new(config)
        .await
        .context("Failed to initialize application state")?;
    tracing::info!("Queue connection established");

    // Build the admin router
    let app = build_router(state)
        // Add Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
