use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // phone number
    pub exp: usize,         // expiration time
    pub roles: Vec<String>, // user roles
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
    SuperUser,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::SuperUser => "super_user",
        }
    }
}

/// Roles allowed to manage batches.
pub const STAFF: &[Role] = &[Role::Teacher, Role::SuperUser];

pub const STUDENTS: &[Role] = &[Role::Student];

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }

    pub fn is_staff(&self) -> bool {
        STAFF.iter().any(|role| self.has_role(*role))
    }
}

/// Extract and validate the bearer token from the request.
pub fn verify_token(req: &HttpRequest, app_state: &AppState) -> ApiResult<Claims> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".into()))?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(app_state.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid token".into()))
}

/// Allow the request only if the caller holds one of `allowed`.
pub fn authorize(claims: &Claims, allowed: &[Role]) -> ApiResult<()> {
    if allowed.iter().any(|role| claims.has_role(*role)) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient permissions".into()))
    }
}

/// Verify the token and the caller's role in one step.
pub fn require_role(req: &HttpRequest, app_state: &AppState, allowed: &[Role]) -> ApiResult<Claims> {
    let claims = verify_token(req, app_state)?;
    authorize(&claims, allowed)?;
    Ok(claims)
}

fn claims_from_request(req: &HttpRequest, allowed: Option<&[Role]>) -> ApiResult<Claims> {
    let app_state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("Application state is not configured".into()))?;

    match allowed {
        Some(roles) => require_role(req, app_state.get_ref(), roles),
        None => verify_token(req, app_state.get_ref()),
    }
}

/// Any caller with a valid token.
///
/// Extractors run in argument order, so list this before a body extractor
/// to reject unauthenticated requests before the body is parsed.
pub struct AuthUser(pub Claims);

/// Caller holding a teacher or super user role.
pub struct Staff(pub Claims);

/// Caller holding the student role.
pub struct StudentUser(pub Claims);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req, None).map(AuthUser))
    }
}

impl FromRequest for Staff {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req, Some(STAFF)).map(Staff))
    }
}

impl FromRequest for StudentUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req, Some(STUDENTS)).map(StudentUser))
    }
}

pub async fn current_user_id(conn: &mut PgConnection, claims: &Claims) -> ApiResult<i32> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE phone_number = $1")
        .bind(&claims.sub)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))
}
