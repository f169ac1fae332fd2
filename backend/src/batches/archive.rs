use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sqlx::PgConnection;

use super::helpers::{enrolled_students, finish, lock_batch};
use crate::error::{ApiError, ApiResult};
use crate::models::batch::{ArchiveBatchRequest, ArchivedBatch, ArchivedBatchRow, RestoreBatchRequest};
use crate::models::{BatchRecord, StudentRecord, UserRole, BATCH_COLUMNS};
use crate::response;
use crate::users::{current_user_id, Claims, Staff};
use crate::AppState;

pub(super) const DEFAULT_REASON: &str = "Archived by teacher";

/// Archive reason written on students archived together with a batch.
pub(super) fn cascade_reason(batch_name: &str) -> String {
    format!("Archived with batch: {}", batch_name)
}

/// Whether `student` is archived because `batch` was archived.
///
/// Students archived by the cascade carry the batch id. Rows archived before
/// that column existed fall back to matching the reason text, which only
/// works while the batch keeps its name.
pub(super) fn archived_by_cascade(student: &StudentRecord, batch: &BatchRecord) -> bool {
    if !student.is_archived || student.role != UserRole::Student {
        return false;
    }

    match student.archived_with_batch_id {
        Some(batch_id) => batch_id == batch.id,
        None => student
            .archive_reason
            .as_deref()
            .is_some_and(|reason| reason.contains(&cascade_reason(&batch.name))),
    }
}

/// Decode a body that may be left out. Empty or `null` gives the defaults,
/// anything else must be valid JSON for `T`.
pub(super) fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    serde_json::from_slice::<Option<T>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::validation(format!("Invalid request body: {}", e)))
}

#[derive(Debug, Serialize)]
pub(super) struct ArchiveOutcome {
    pub batch_id: i32,
    pub batch_name: String,
    pub archived_students: usize,
    pub archived_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub(super) struct RestoreOutcome {
    pub batch_id: i32,
    pub batch_name: String,
    pub restored_students: usize,
}

async fn archive(
    conn: &mut PgConnection,
    batch_id: i32,
    claims: &Claims,
    reason: String,
) -> ApiResult<ArchiveOutcome> {
    let actor_id = current_user_id(&mut *conn, claims).await?;
    let batch = lock_batch(&mut *conn, batch_id).await?;

    if batch.is_archived {
        return Err(ApiError::validation("Batch is already archived"));
    }

    let archived_at = Utc::now();

    sqlx::query(
        "UPDATE batches
         SET is_archived = TRUE,
             archived_at = $2,
             archived_by = $3,
             archive_reason = $4,
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(batch_id)
    .bind(archived_at)
    .bind(actor_id)
    .bind(&reason)
    .execute(&mut *conn)
    .await?;

    let student_ids: Vec<i32> = enrolled_students(&mut *conn, batch_id)
        .await?
        .into_iter()
        .filter(|student| !student.is_archived)
        .map(|student| student.id)
        .collect();

    if !student_ids.is_empty() {
        sqlx::query(
            "UPDATE users
             SET is_archived = TRUE,
                 archived_at = $2,
                 archived_by = $3,
                 archive_reason = $4,
                 archived_with_batch_id = $5,
                 updated_at = NOW()
             WHERE id = ANY($1)",
        )
        .bind(&student_ids)
        .bind(archived_at)
        .bind(actor_id)
        .bind(cascade_reason(&batch.name))
        .bind(batch_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(ArchiveOutcome {
        batch_id,
        batch_name: batch.name,
        archived_students: student_ids.len(),
        archived_at,
        reason,
    })
}

async fn restore(
    conn: &mut PgConnection,
    batch_id: i32,
    restore_students: bool,
) -> ApiResult<RestoreOutcome> {
    let batch = lock_batch(&mut *conn, batch_id).await?;

    if !batch.is_archived {
        return Err(ApiError::validation("Batch is not archived"));
    }

    sqlx::query(
        "UPDATE batches
         SET is_archived = FALSE,
             archived_at = NULL,
             archived_by = NULL,
             archive_reason = NULL,
             updated_at = NOW()
         WHERE id = $1",
    )
    .bind(batch_id)
    .execute(&mut *conn)
    .await?;

    let mut student_ids = Vec::new();
    if restore_students {
        student_ids = enrolled_students(&mut *conn, batch_id)
            .await?
            .iter()
            .filter(|student| archived_by_cascade(student, &batch))
            .map(|student| student.id)
            .collect();
    }

    if !student_ids.is_empty() {
        sqlx::query(
            "UPDATE users
             SET is_archived = FALSE,
                 archived_at = NULL,
                 archived_by = NULL,
                 archive_reason = NULL,
                 archived_with_batch_id = NULL,
                 updated_at = NOW()
             WHERE id = ANY($1)",
        )
        .bind(&student_ids)
        .execute(&mut *conn)
        .await?;
    }

    Ok(RestoreOutcome {
        batch_id,
        batch_name: batch.name,
        restored_students: student_ids.len(),
    })
}

async fn load_archived_batches(app_state: &AppState) -> ApiResult<Vec<ArchivedBatch>> {
    let rows = sqlx::query_as::<_, ArchivedBatchRow>(&format!(
        "SELECT {},
                NULLIF(TRIM(CONCAT(a.first_name, ' ', a.last_name)), '') AS archived_by_name,
                (SELECT COUNT(*)
                 FROM user_batches ub
                 JOIN users u ON u.id = ub.user_id
                 WHERE ub.batch_id = b.id AND u.role = 'student' AND u.is_archived) AS archived_students_count,
                (SELECT COUNT(*)
                 FROM user_batches ub
                 JOIN users u ON u.id = ub.user_id
                 WHERE ub.batch_id = b.id AND u.role = 'student') AS total_students_count
         FROM batches b
         LEFT JOIN users a ON a.id = b.archived_by
         WHERE b.is_archived
         ORDER BY b.archived_at DESC NULLS LAST, b.id DESC",
        BATCH_COLUMNS
    ))
    .fetch_all(&app_state.db)
    .await?;

    Ok(rows.into_iter().map(ArchivedBatch::from).collect())
}

#[post("/api/batches/{batch_id:\\d+}/archive")]
pub(super) async fn archive_batch(
    Staff(claims): Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let batch_id = path.into_inner();

    let reason = optional_body::<ArchiveBatchRequest>(&body)?
        .reason
        .unwrap_or_else(|| DEFAULT_REASON.to_string());

    let mut tx = app_state.db.begin().await?;
    let result = archive(&mut tx, batch_id, &claims, reason).await;
    let outcome = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to archive batch"))?;

    info!(
        "Batch {} archived by {} with {} students",
        outcome.batch_id, claims.sub, outcome.archived_students
    );

    Ok(response::success("Batch and students archived successfully", outcome))
}

#[post("/api/batches/{batch_id:\\d+}/restore")]
pub(super) async fn restore_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let batch_id = path.into_inner();

    let restore_students = optional_body::<RestoreBatchRequest>(&body)?
        .restore_students
        .unwrap_or(true);

    let mut tx = app_state.db.begin().await?;
    let result = restore(&mut tx, batch_id, restore_students).await;
    let outcome = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to restore batch"))?;

    info!(
        "Batch {} restored with {} students",
        outcome.batch_id, outcome.restored_students
    );

    Ok(response::success("Batch restored successfully", outcome))
}

#[get("/api/batches/archived")]
pub(super) async fn list_archived_batches(
    _staff: Staff,
    app_state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let batches = load_archived_batches(&app_state)
        .await
        .map_err(|e| e.context("Failed to get archived batches"))?;

    Ok(response::success("Archived batches retrieved", json!({ "batches": batches })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::batch::tests::batch;
    use crate::models::user::tests::student;

    fn archived(mut s: StudentRecord, reason: &str, batch_id: Option<i32>) -> StudentRecord {
        s.is_archived = true;
        s.archive_reason = Some(reason.into());
        s.archived_with_batch_id = batch_id;
        s
    }

    #[test]
    fn missing_body_falls_back_to_defaults() {
        let bodies: [&[u8]; 4] = [b"", b"  \n", b"null", b"{}"];
        for body in bodies {
            let request = optional_body::<ArchiveBatchRequest>(body).unwrap();
            assert_eq!(request.reason, None);
        }
    }

    #[test]
    fn caller_reason_is_kept_verbatim() {
        let request = optional_body::<ArchiveBatchRequest>(br#"{"reason": ""}"#).unwrap();
        assert_eq!(request.reason.as_deref(), Some(""));

        let request = optional_body::<RestoreBatchRequest>(br#"{"restore_students": false}"#).unwrap();
        assert_eq!(request.restore_students, Some(false));
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = optional_body::<RestoreBatchRequest>(b"{ not json").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.starts_with("Invalid request body")));
    }

    #[test]
    fn cascade_reason_names_the_batch() {
        assert_eq!(cascade_reason("Morning A"), "Archived with batch: Morning A");
    }

    #[test]
    fn matches_students_archived_by_this_batch_id() {
        let morning = batch(7, "Morning A", "Class 5 - Physics");

        let ours = archived(student(1, "A", "B"), &cascade_reason("Morning A"), Some(7));
        let other_batch = archived(student(2, "C", "D"), &cascade_reason("Evening B"), Some(8));
        let manual = archived(student(3, "E", "F"), "Left the coaching centre", None);

        assert!(archived_by_cascade(&ours, &morning));
        assert!(!archived_by_cascade(&other_batch, &morning));
        assert!(!archived_by_cascade(&manual, &morning));
    }

    #[test]
    fn batch_id_survives_rename() {
        let renamed = batch(7, "Morning A (2025)", "Class 5 - Physics");
        let ours = archived(student(1, "A", "B"), &cascade_reason("Morning A"), Some(7));

        assert!(archived_by_cascade(&ours, &renamed));
    }

    #[test]
    fn legacy_rows_match_on_reason_text_only() {
        let morning = batch(7, "Morning A", "Class 5 - Physics");
        let legacy = archived(student(1, "A", "B"), &cascade_reason("Morning A"), None);
        assert!(archived_by_cascade(&legacy, &morning));

        let renamed = batch(7, "Morning B", "Class 5 - Physics");
        assert!(!archived_by_cascade(&legacy, &renamed));
    }

    #[test]
    fn active_and_non_student_users_are_never_restored() {
        let morning = batch(7, "Morning A", "Class 5 - Physics");

        let mut active = student(1, "A", "B");
        active.archived_with_batch_id = Some(7);
        assert!(!archived_by_cascade(&active, &morning));

        let mut teacher = archived(student(2, "C", "D"), &cascade_reason("Morning A"), Some(7));
        teacher.role = UserRole::Teacher;
        assert!(!archived_by_cascade(&teacher, &morning));
    }
}
