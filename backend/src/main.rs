use actix_web::{web, HttpServer};
use coaching_backend::config::AppConfig;
use coaching_backend::{create_app, init_db, AppState};
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // A missing .env file is fine, the variables may come from the environment
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let db_pool = init_db(&config.database_url, config.max_connections)
        .await
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to initialize database: {}", e),
            )
        })?;

    info!("Database initialized successfully");

    let app_state = web::Data::new(AppState {
        db: db_pool,
        jwt_secret: config.jwt_secret,
    });

    info!("Starting server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || create_app(app_state.clone()))
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}
