use axum::{routing::get, Router};
use axum_table_browser::{ServerConfig, SqliteConnector, TableBrowserLayer};
use sqlx::sqlite::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod database;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    // Either a local SQLite demo or the real PostgREST console
    let console = match &config.demo_database {
        Some(database_url) => {
            let pool = SqlitePool::connect(database_url)
                .await
                .expect("Failed to connect to SQLite demo database");

            database::setup(&pool)
                .await
                .expect("Failed to setup demo database");

            info!(
                database = %database_url,
                "Serving local SQLite demo; any non-empty URL and key connect"
            );
            TableBrowserLayer::with_rows_per_page(
                config.base_path.clone(),
                SqliteConnector::shared(pool),
                config.rows_per_page,
            )
            .into_router()
        }
        None => TableBrowserLayer::from_config(&config).into_router(),
    };

    let mut app = Router::new().route("/api/health", get(health_handler));
    if !config.base_path.is_empty() {
        app = app.route("/", get(root_handler));
    }
    let app = app
        .merge(console)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("Failed to bind listener");

    info!(address = %address, base_path = %config.base_path, "Table browser available");

    axum::serve(listener, app).await.expect("Server error");
}

async fn root_handler() -> &'static str {
    "Welcome to axum-table-browser example server"
}

async fn health_handler() -> &'static str {
    "Server is healthy"
}
