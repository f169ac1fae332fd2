use std::str::FromStr;

use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::{Local, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::PgConnection;

use super::helpers::{
    active_students, count_active_students, fetch_batch, finish, lock_batch, name_taken,
    DUPLICATE_NAME,
};
use crate::catalog::{compose_description, ClassLevel, Subject};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::batch::{
    ActiveBatch, BatchDetail, BatchListItem, BatchListRow, CreateBatchRequest, StudentBatch,
    UpdateBatchRequest, DEFAULT_MAX_STUDENTS,
};
use crate::models::user::StudentSummary;
use crate::models::{BatchRecord, BatchResponse, BATCH_COLUMNS};
use crate::pagination::{PageQuery, PaginationMeta};
use crate::response;
use crate::users::{current_user_id, AuthUser, Staff, StudentUser};
use crate::AppState;

/// Largest value a NUMERIC(10, 2) column holds.
fn max_fee() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, PartialEq)]
pub(super) struct NewBatch {
    pub name: String,
    pub class: ClassLevel,
    pub subject: Subject,
}

pub(super) fn validate_create(req: &CreateBatchRequest) -> ApiResult<NewBatch> {
    let present = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let name = present(&req.name);
    let class = present(&req.class_name);
    let subject = present(&req.subject);

    match (name, class, subject) {
        (Some(name), Some(class), Some(subject)) => Ok(NewBatch {
            name,
            class: class.parse()?,
            subject: subject.parse()?,
        }),
        (name, class, subject) => {
            let missing: Vec<&str> = [("name", name), ("class", class), ("subject", subject)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(field, _)| field)
                .collect();
            Err(ApiError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Column values an update writes back, computed before anything is persisted.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct BatchChanges {
    pub name: String,
    pub description: String,
    pub class_name: Option<String>,
    pub subject: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub fee_amount: Decimal,
    pub max_students: i32,
}

pub(super) fn plan_update(current: &BatchRecord, req: &UpdateBatchRequest) -> ApiResult<BatchChanges> {
    let mut changes = BatchChanges {
        name: current.name.clone(),
        description: current.description.clone(),
        class_name: current.class_name.clone(),
        subject: current.subject.clone(),
        start_date: current.start_date,
        end_date: current.end_date,
        fee_amount: current.fee_amount,
        max_students: current.max_students,
    };

    if let Some(name) = req.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Batch name cannot be empty"));
        }
        changes.name = name.to_string();
    }

    let requested_class = non_blank(req.class_name.as_deref());
    let requested_subject = non_blank(req.subject.as_deref());
    if requested_class.is_some() || requested_subject.is_some() {
        let new_class = requested_class.or_else(|| current.class());
        let new_subject = requested_subject.or(Some(current.subject.as_str()));

        let class = new_class.map(ClassLevel::from_str).transpose()?;
        let subject = new_subject.map(Subject::from_str).transpose()?;

        if let Some(class) = class {
            changes.class_name = Some(class.to_string());
        }
        if let Some(subject) = subject {
            changes.subject = subject.to_string();
        }
        if let (Some(class), Some(subject)) = (class, subject) {
            changes.description = compose_description(class.as_str(), subject.as_str());
        }
    }

    if let Some(raw) = req.start_date.as_deref() {
        changes.start_date = parse_date("start_date", raw)?;
    }

    if let Some(raw) = req.end_date.as_deref() {
        changes.end_date = if raw.trim().is_empty() {
            None
        } else {
            Some(parse_date("end_date", raw)?)
        };
    }

    if let Some(value) = req.fee_amount.as_ref() {
        if let Some(fee) = parse_fee(value)? {
            changes.fee_amount = fee;
        }
    }

    if let Some(max_students) = req.max_students {
        if max_students < 1 {
            return Err(ApiError::validation("Max students must be at least 1"));
        }
        changes.max_students = max_students;
    }

    if let Some(end_date) = changes.end_date {
        if end_date <= changes.start_date {
            return Err(ApiError::validation("End date must be after start date"));
        }
    }

    Ok(changes)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Invalid {} format. Use YYYY-MM-DD", field)))
}

/// Parse a fee from a JSON number or numeric string. `null` means "unchanged".
pub(super) fn parse_fee(value: &Value) -> ApiResult<Option<Decimal>> {
    let invalid = || ApiError::validation("Invalid fee amount");

    let raw = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(invalid()),
    };

    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| invalid())?;

    if amount < Decimal::ZERO {
        return Err(ApiError::validation("Fee amount cannot be negative"));
    }
    let amount = amount.round_dp(2);
    if amount > max_fee() {
        return Err(ApiError::validation("Fee amount is too large"));
    }

    Ok(Some(amount))
}

// ============================================================================
// Persistence
// ============================================================================

async fn insert_batch(conn: &mut PgConnection, new_batch: &NewBatch) -> ApiResult<BatchRecord> {
    if name_taken(&mut *conn, &new_batch.name, None).await? {
        return Err(ApiError::conflict(DUPLICATE_NAME));
    }

    let batch = sqlx::query_as::<_, BatchRecord>(&format!(
        "INSERT INTO batches AS b
            (name, description, class_name, subject, start_date, fee_amount, max_students, status, is_active)
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'active', TRUE)
         RETURNING {}",
        BATCH_COLUMNS
    ))
    .bind(&new_batch.name)
    .bind(compose_description(new_batch.class.as_str(), new_batch.subject.as_str()))
    .bind(new_batch.class.as_str())
    .bind(new_batch.subject.as_str())
    .bind(Local::now().date_naive())
    .bind(Decimal::ZERO)
    .bind(DEFAULT_MAX_STUDENTS)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict(DUPLICATE_NAME)
        } else {
            ApiError::from(e)
        }
    })?;

    Ok(batch)
}

async fn apply_update(
    conn: &mut PgConnection,
    batch_id: i32,
    req: &UpdateBatchRequest,
) -> ApiResult<BatchRecord> {
    let current = lock_batch(&mut *conn, batch_id).await?;

    if let Some(name) = non_blank(req.name.as_deref()) {
        if name != current.name && name_taken(&mut *conn, name, Some(batch_id)).await? {
            return Err(ApiError::conflict(DUPLICATE_NAME));
        }
    }

    let changes = plan_update(&current, req)?;

    let batch = sqlx::query_as::<_, BatchRecord>(&format!(
        "UPDATE batches AS b
         SET name = $2,
             description = $3,
             class_name = $4,
             subject = $5,
             start_date = $6,
             end_date = $7,
             fee_amount = $8,
             max_students = $9,
             updated_at = NOW()
         WHERE b.id = $1
         RETURNING {}",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .bind(&changes.name)
    .bind(&changes.description)
    .bind(&changes.class_name)
    .bind(&changes.subject)
    .bind(changes.start_date)
    .bind(changes.end_date)
    .bind(changes.fee_amount)
    .bind(changes.max_students)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::conflict(DUPLICATE_NAME)
        } else {
            ApiError::from(e)
        }
    })?;

    Ok(batch)
}

async fn remove_batch(conn: &mut PgConnection, batch_id: i32) -> ApiResult<String> {
    let batch = lock_batch(&mut *conn, batch_id).await?;

    let active = count_active_students(&mut *conn, batch_id).await?;
    if active > 0 {
        return Err(ApiError::validation(format!(
            "Cannot delete batch with {} active students. Please remove students first.",
            active
        )));
    }

    sqlx::query("DELETE FROM user_batches WHERE batch_id = $1")
        .bind(batch_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM batches WHERE id = $1")
        .bind(batch_id)
        .execute(&mut *conn)
        .await?;

    Ok(batch.name)
}

async fn load_batch_page(
    app_state: &AppState,
    query: &PageQuery,
) -> ApiResult<(Vec<BatchListItem>, PaginationMeta)> {
    let pattern = query.search().map(|term| format!("%{}%", term));

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM batches b
         WHERE NOT b.is_archived
           AND ($1::TEXT IS NULL OR b.name ILIKE $1 OR b.description ILIKE $1)",
    )
    .bind(&pattern)
    .fetch_one(&app_state.db)
    .await?;

    let rows = sqlx::query_as::<_, BatchListRow>(&format!(
        "SELECT {},
                (SELECT COUNT(*)
                 FROM user_batches ub
                 JOIN users u ON u.id = ub.user_id
                 WHERE ub.batch_id = b.id AND u.is_active) AS current_students
         FROM batches b
         WHERE NOT b.is_archived
           AND ($1::TEXT IS NULL OR b.name ILIKE $1 OR b.description ILIKE $1)
         ORDER BY b.created_at DESC, b.id DESC
         LIMIT $2 OFFSET $3",
        BATCH_COLUMNS
    ))
    .bind(&pattern)
    .bind(query.per_page())
    .bind(query.offset())
    .fetch_all(&app_state.db)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| BatchListItem {
            max_students: row.batch.max_students,
            batch: BatchResponse::from(&row.batch),
            current_students: row.current_students,
        })
        .collect();

    Ok((items, PaginationMeta::new(query.page(), query.per_page(), total)))
}

async fn load_batch_detail(app_state: &AppState, batch_id: i32, with_roster: bool) -> ApiResult<BatchDetail> {
    let mut conn = app_state.db.acquire().await?;
    let batch = fetch_batch(&mut conn, batch_id).await?;

    let students = if with_roster {
        let students = active_students(&mut conn, batch_id).await?;
        Some(students.iter().map(StudentSummary::from).collect())
    } else {
        None
    };

    Ok(BatchDetail {
        batch: BatchResponse::from(&batch),
        students,
    })
}

async fn load_student_batches(app_state: &AppState, user_id: i32) -> ApiResult<Vec<StudentBatch>> {
    let batches = sqlx::query_as::<_, BatchRecord>(&format!(
        "SELECT {}
         FROM user_batches ub
         JOIN batches b ON b.id = ub.batch_id
         WHERE ub.user_id = $1 AND b.is_active
         ORDER BY b.name",
        BATCH_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&app_state.db)
    .await?;

    Ok(batches
        .iter()
        .map(|batch| StudentBatch {
            batch: BatchResponse::from(batch),
            enrollment_date: None,
        })
        .collect())
}

async fn load_active_batches(app_state: &AppState) -> ApiResult<Vec<ActiveBatch>> {
    let batches = sqlx::query_as::<_, ActiveBatch>(
        "SELECT b.id, b.name, b.description, b.fee_amount, b.start_date, b.end_date,
                (SELECT COUNT(*)
                 FROM user_batches ub
                 JOIN users u ON u.id = ub.user_id
                 WHERE ub.batch_id = b.id AND u.is_active AND NOT u.is_archived) AS student_count
         FROM batches b
         WHERE b.is_active AND NOT b.is_archived
         ORDER BY b.name",
    )
    .fetch_all(&app_state.db)
    .await?;

    Ok(batches)
}

// ============================================================================
// Routes
// ============================================================================

#[get("/api/batches")]
pub(super) async fn list_batches(
    _user: AuthUser,
    app_state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> ApiResult<HttpResponse> {
    let (items, pagination) = load_batch_page(&app_state, &query)
        .await
        .map_err(|e| e.context("Failed to retrieve batches"))?;

    Ok(response::paginated("Batches retrieved successfully", items, pagination))
}

#[get("/api/batches/{batch_id:\\d+}")]
pub(super) async fn get_batch(
    AuthUser(claims): AuthUser,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let detail = load_batch_detail(&app_state, path.into_inner(), claims.is_staff())
        .await
        .map_err(|e| e.context("Failed to get batch"))?;

    Ok(response::success("Batch details retrieved", json!({ "batch": detail })))
}

#[post("/api/batches")]
pub(super) async fn create_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    payload: web::Json<CreateBatchRequest>,
) -> ApiResult<HttpResponse> {
    let new_batch = validate_create(&payload)?;

    let mut tx = app_state.db.begin().await?;
    let result = insert_batch(&mut tx, &new_batch).await;
    let batch = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to create batch"))?;

    info!("Batch {} created: {}", batch.id, batch.name);

    Ok(response::created(
        "Batch created successfully",
        json!({ "batch": BatchResponse::from(&batch) }),
    ))
}

#[put("/api/batches/{batch_id:\\d+}")]
pub(super) async fn update_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<UpdateBatchRequest>,
) -> ApiResult<HttpResponse> {
    let batch_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    let result = apply_update(&mut tx, batch_id, &payload).await;
    let batch = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to update batch"))?;

    Ok(response::success(
        "Batch updated successfully",
        json!({ "batch": BatchResponse::from(&batch) }),
    ))
}

#[delete("/api/batches/{batch_id:\\d+}")]
pub(super) async fn delete_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let batch_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    let result = remove_batch(&mut tx, batch_id).await;
    let name = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to delete batch"))?;

    info!("Batch {} ({}) deleted permanently", batch_id, name);

    Ok(response::message(format!("Batch \"{}\" deleted permanently", name)))
}

#[get("/api/batches/my-batches")]
pub(super) async fn list_my_batches(
    StudentUser(claims): StudentUser,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let mut conn = app_state.db.acquire().await?;
    let user_id = current_user_id(&mut conn, &claims).await?;
    drop(conn);

    let batches = load_student_batches(&app_state, user_id)
        .await
        .map_err(|e| e.context("Failed to get student batches"))?;

    Ok(response::success("Student batches retrieved", json!({ "batches": batches })))
}

#[get("/api/batches/active")]
pub(super) async fn list_active_batches(
    _user: AuthUser,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let batches = load_active_batches(&app_state)
        .await
        .map_err(|e| e.context("Failed to get active batches"))?;

    Ok(response::success("Active batches retrieved", json!({ "batches": batches })))
}
