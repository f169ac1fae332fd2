pub mod batches;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod response;
pub mod users;

use actix_cors::Cors;
use actix_web::{middleware, web, App};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_secret: String,
}

pub fn create_app(app_state: web::Data<AppState>) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    // Malformed bodies get the same envelope as every other validation error
    let json_config = web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ApiError::validation(format!("Invalid request body: {}", err)).into());

    App::new()
        .app_data(app_state)
        .app_data(json_config)
        .wrap(
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
        )
        .wrap(middleware::Logger::default())
        .configure(batches::configure)
}

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
