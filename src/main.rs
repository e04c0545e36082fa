use parking_management_api::config::AppConfig;
use parking_management_api::db::init_db;
use parking_management_api::routemount::route::{AppState, create_router};
use parking_management_api::sweeper::spawn_overstay_sweeper;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL is missing in env");
    let server_address = std::env::var("SERVER_ADDRESS").unwrap_or("127.0.0.1:7870".to_string());

    //connect to db
    let db_pool = init_db(&database_url).await;

    let config = AppConfig::from_env();

    //hourly overstay check, also triggerable via POST /admin/overstays/sweep
    spawn_overstay_sweeper(db_pool.clone(), config.clone());

    let app = create_router(AppState { pool: db_pool, config });

    let listener = tokio::net::TcpListener::bind(&server_address).await.unwrap();
    tracing::info!("server running on {}", server_address);
    axum::serve(listener, app).await.unwrap();
}
