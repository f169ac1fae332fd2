use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;

use crate::pagination::PaginationMeta;

/// Uniform JSON envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    with_status(StatusCode::OK, message, Some(data))
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    with_status(StatusCode::CREATED, message, Some(data))
}

/// Success envelope with no payload.
pub fn message(message: impl Into<String>) -> HttpResponse {
    with_status::<()>(StatusCode::OK, message, None)
}

pub fn paginated<T: Serialize>(
    message: impl Into<String>,
    items: Vec<T>,
    pagination: PaginationMeta,
) -> HttpResponse {
    HttpResponse::Ok().json(Envelope {
        success: true,
        message: message.into(),
        data: Some(items),
        pagination: Some(pagination),
    })
}

pub fn failure(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(Envelope::<()> {
        success: false,
        message: message.into(),
        data: None,
        pagination: None,
    })
}

fn with_status<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> HttpResponse {
    HttpResponse::build(status).json(Envelope {
        success: true,
        message: message.into(),
        data,
        pagination: None,
    })
}
