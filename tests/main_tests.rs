use std::net::SocketAddr;
use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use tokio::task::JoinHandle;
use tracing::Level;

use solarschools::session::Keys;
use solarschools::{create_app, AppState};

#[tokio::test]
async fn test_main_server_startup() {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .try_init();

    // Start the server in a separate task on a port the main app never uses
    let server_task: JoinHandle<()> = tokio::spawn(async {
        let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
        opts.max_connections(1);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let state = AppState {
            db,
            keys: Keys::new(b"test-session-secret"),
        };
        let app = create_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:3031").await.unwrap();
        tracing::info!("Test server running on http://127.0.0.1:3031");
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Wait a moment for the server to start up
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Make a request through a real TCP connection
    let client = reqwest::Client::new();
    let result = client.get("http://127.0.0.1:3031/health").send().await;

    // Cancel the server task after we've made our test request
    server_task.abort();

    let response = result.expect("server should be reachable");
    assert!(response.status().is_success());
}
