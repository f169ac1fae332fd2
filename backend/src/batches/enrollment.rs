use actix_web::{delete, get, post, web, HttpResponse};
use log::info;
use serde_json::json;
use sqlx::PgConnection;

use super::helpers::{active_students, fetch_batch, finish, is_enrolled, STUDENT_NOT_FOUND};
use super::ranking::{current_ranks, sort_by_rank};
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::models::batch::EnrollStudentRequest;
use crate::models::user::RosterEntry;
use crate::response;
use crate::users::Staff;
use crate::AppState;

const ALREADY_ENROLLED: &str = "Student is already enrolled in this batch";
const NOT_ENROLLED: &str = "Student is not enrolled in this batch";

/// Student ids match only users with the student role; `active_only` also
/// requires `is_active`.
async fn student_exists(conn: &mut PgConnection, student_id: i32, active_only: bool) -> ApiResult<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM users
            WHERE id = $1 AND role = 'student' AND (is_active OR NOT $2)
        )",
    )
    .bind(student_id)
    .bind(active_only)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Zero counts as missing, like an absent field.
pub(super) fn required_student_id(student_id: Option<i32>) -> ApiResult<i32> {
    student_id
        .filter(|id| *id != 0)
        .ok_or_else(|| ApiError::validation("Student ID is required"))
}

async fn enroll(conn: &mut PgConnection, batch_id: i32, student_id: Option<i32>) -> ApiResult<i32> {
    fetch_batch(&mut *conn, batch_id).await?;
    let student_id = required_student_id(student_id)?;

    if !student_exists(&mut *conn, student_id, true).await? {
        return Err(ApiError::not_found(STUDENT_NOT_FOUND));
    }

    if is_enrolled(&mut *conn, batch_id, student_id).await? {
        return Err(ApiError::conflict(ALREADY_ENROLLED));
    }

    sqlx::query("INSERT INTO user_batches (user_id, batch_id) VALUES ($1, $2)")
        .bind(student_id)
        .bind(batch_id)
        .execute(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict(ALREADY_ENROLLED)
            } else {
                ApiError::from(e)
            }
        })?;

    Ok(student_id)
}

async fn unenroll(conn: &mut PgConnection, batch_id: i32, student_id: i32) -> ApiResult<()> {
    fetch_batch(&mut *conn, batch_id).await?;

    if !student_exists(&mut *conn, student_id, false).await? {
        return Err(ApiError::not_found(STUDENT_NOT_FOUND));
    }

    let result = sqlx::query("DELETE FROM user_batches WHERE batch_id = $1 AND user_id = $2")
        .bind(batch_id)
        .bind(student_id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(NOT_ENROLLED));
    }

    Ok(())
}

async fn ranked_roster(app_state: &AppState, batch_id: i32) -> ApiResult<Vec<RosterEntry>> {
    let mut conn = app_state.db.acquire().await?;
    fetch_batch(&mut conn, batch_id).await?;

    let ranks = current_ranks(&mut conn, batch_id).await?;
    let mut roster: Vec<RosterEntry> = active_students(&mut conn, batch_id)
        .await?
        .into_iter()
        .map(|student| {
            let rank = ranks.get(&student.id).copied();
            RosterEntry::new(student, rank)
        })
        .collect();

    sort_by_rank(&mut roster, |entry| entry.current_rank);
    Ok(roster)
}

#[get("/api/batches/{batch_id:\\d+}/students")]
pub(super) async fn list_batch_students(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
) -> ApiResult<HttpResponse> {
    let students = ranked_roster(&app_state, path.into_inner())
        .await
        .map_err(|e| e.context("Failed to get batch students"))?;

    Ok(response::success(
        "Batch students retrieved",
        json!({ "students": students }),
    ))
}

#[post("/api/batches/{batch_id:\\d+}/students")]
pub(super) async fn add_student_to_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<EnrollStudentRequest>,
) -> ApiResult<HttpResponse> {
    let batch_id = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    let result = enroll(&mut tx, batch_id, payload.student_id).await;
    let student_id = finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to add student to batch"))?;

    info!("Student {} enrolled in batch {}", student_id, batch_id);

    Ok(response::message("Student added to batch successfully"))
}

#[delete("/api/batches/{batch_id:\\d+}/students/{student_id:\\d+}")]
pub(super) async fn remove_student_from_batch(
    _staff: Staff,
    app_state: web::Data<AppState>,
    path: web::Path<(i32, i32)>,
) -> ApiResult<HttpResponse> {
    let (batch_id, student_id) = path.into_inner();

    let mut tx = app_state.db.begin().await?;
    let result = unenroll(&mut tx, batch_id, student_id).await;
    finish(tx, result)
        .await
        .map_err(|e| e.context("Failed to remove student from batch"))?;

    info!("Student {} removed from batch {}", student_id, batch_id);

    Ok(response::message("Student removed from batch successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::student;
    use std::collections::HashMap;

    #[test]
    fn student_id_zero_counts_as_missing() {
        assert_eq!(required_student_id(Some(12)).unwrap(), 12);

        for missing in [None, Some(0)] {
            let err = required_student_id(missing).unwrap_err();
            assert!(matches!(err, ApiError::Validation(msg) if msg == "Student ID is required"));
        }
    }

    #[test]
    fn roster_orders_ranked_before_unranked() {
        let ranks = HashMap::from([(1, 3), (2, 1)]);
        let mut roster: Vec<RosterEntry> = vec![
            student(1, "A", "Student"),
            student(2, "B", "Student"),
            student(3, "C", "Student"),
        ]
        .into_iter()
        .map(|s| {
            let rank = ranks.get(&s.id).copied();
            RosterEntry::new(s, rank)
        })
        .collect();

        sort_by_rank(&mut roster, |entry| entry.current_rank);

        let names: Vec<&str> = roster.iter().map(|e| e.first_name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(roster[2].roll_number, None);
    }
}
