use std::net::SocketAddr;

use fleet_server::domain::TransitionTable;
use fleet_server::engine::GeneratorConfig;
use fleet_server::store::MemoryStore;
use fleet_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity; default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let store = MemoryStore::new();
    let config = GeneratorConfig::default();
    let transitions = TransitionTable::default();

    let state = AppState::new(store, config, transitions);
    let app = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    println!("Fleet scheduling server listening on http://{addr}");
    println!();
    println!("API Endpoints:");
    println!("  GET  /health                     - Health check");
    println!("  POST /schedules                  - Create a schedule");
    println!("  PUT  /schedules/:id              - Update a schedule");
    println!("  POST /schedules/:id/exceptions   - Add an exception date");
    println!("  POST /schedules/:id/overrides    - Override a service date");
    println!("  POST /schedules/:id/generate     - Generate trips for a window");
    println!("  POST /routes                     - Register a route");
    println!("  POST /bindings                   - Bind a route to a schedule");
    println!("  POST /trips/:id/status           - Transition a trip");
    println!("  POST /trips/:id/attendance       - Record attendance");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
