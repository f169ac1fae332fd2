#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::{test, web};
use coaching_backend::users::Claims;
use coaching_backend::{init_db, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";

/// State backed by a pool that never connects. Only usable for requests
/// that fail before touching the database.
pub fn offline_state() -> web::Data<AppState> {
    let db = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("lazy pool");

    web::Data::new(AppState {
        db,
        jwt_secret: SECRET.to_string(),
    })
}

/// State against `TEST_DATABASE_URL` with migrations applied, or `None`
/// when the variable is unset.
pub async fn database_state() -> Option<web::Data<AppState>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let db = init_db(&url, 5).await.expect("test database");

    Some(web::Data::new(AppState {
        db,
        jwt_secret: SECRET.to_string(),
    }))
}

pub fn token(phone: &str, roles: &[&str]) -> String {
    let claims = Claims {
        sub: phone.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_ref()))
        .expect("token")
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub async fn read_json<B: MessageBody>(resp: ServiceResponse<B>) -> (StatusCode, Value) {
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub struct TestUser {
    pub id: i32,
    pub phone: String,
}

pub async fn insert_user(pool: &PgPool, role: &str, first_name: &str) -> TestUser {
    let phone = format!("t{}", &Uuid::new_v4().simple().to_string()[..24]);
    let id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (phone_number, first_name, last_name, role)
         VALUES ($1, $2, 'Test', $3::user_role)
         RETURNING id",
    )
    .bind(&phone)
    .bind(first_name)
    .bind(role)
    .fetch_one(pool)
    .await
    .expect("insert user");

    TestUser { id, phone }
}

pub async fn insert_exam(pool: &PgPool, batch_id: i32, year: i32, month: i32) -> i32 {
    sqlx::query_scalar::<_, i32>(
        "INSERT INTO monthly_exams (batch_id, year, month) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(batch_id)
    .bind(year)
    .bind(month)
    .fetch_one(pool)
    .await
    .expect("insert exam")
}

pub async fn insert_ranking(pool: &PgPool, exam_id: i32, user_id: i32, position: i32) {
    sqlx::query(
        "INSERT INTO monthly_rankings (monthly_exam_id, user_id, position, is_final)
         VALUES ($1, $2, $3, TRUE)",
    )
    .bind(exam_id)
    .bind(user_id)
    .bind(position)
    .execute(pool)
    .await
    .expect("insert ranking");
}
