use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use solarschools::{create_app, session::Keys, AppState};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load .env (if present) so DATABASE_URL from file is visible
    let _ = dotenv();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let session_secret = env::var("SESSION_SECRET").expect("SESSION_SECRET must be set");
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    let db = Database::connect(&database_url)
        .await
        .expect("failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("failed to run migrations");

    let state = AppState {
        db,
        keys: Keys::new(session_secret.as_bytes()),
    };

    // Run our server
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    tracing::info!("Server running on http://{}", bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
