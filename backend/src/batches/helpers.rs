use log::error;
use sqlx::{PgConnection, Postgres, Transaction};

use crate::error::{ApiError, ApiResult};
use crate::models::{BatchRecord, StudentRecord, BATCH_COLUMNS, STUDENT_COLUMNS};

pub(super) const BATCH_NOT_FOUND: &str = "Batch not found";
pub(super) const STUDENT_NOT_FOUND: &str = "Student not found";
pub(super) const DUPLICATE_NAME: &str = "Batch with this name already exists";

pub(super) async fn fetch_batch(conn: &mut PgConnection, batch_id: i32) -> ApiResult<BatchRecord> {
    sqlx::query_as::<_, BatchRecord>(&format!(
        "SELECT {} FROM batches b WHERE b.id = $1",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ApiError::not_found(BATCH_NOT_FOUND))
}

/// Same as [`fetch_batch`] but holds a row lock until the transaction ends.
pub(super) async fn lock_batch(conn: &mut PgConnection, batch_id: i32) -> ApiResult<BatchRecord> {
    sqlx::query_as::<_, BatchRecord>(&format!(
        "SELECT {} FROM batches b WHERE b.id = $1 FOR UPDATE",
        BATCH_COLUMNS
    ))
    .bind(batch_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ApiError::not_found(BATCH_NOT_FOUND))
}

pub(super) async fn name_taken(
    conn: &mut PgConnection,
    name: &str,
    exclude_id: Option<i32>,
) -> ApiResult<bool> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
            SELECT 1 FROM batches
            WHERE name = $1 AND ($2::INTEGER IS NULL OR id <> $2)
        )",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(conn)
    .await?;

    Ok(taken)
}

/// Every student (active or not) enrolled in the batch, by name.
pub(super) async fn enrolled_students(
    conn: &mut PgConnection,
    batch_id: i32,
) -> ApiResult<Vec<StudentRecord>> {
    let students = sqlx::query_as::<_, StudentRecord>(&format!(
        "SELECT {}
         FROM user_batches ub
         JOIN users u ON u.id = ub.user_id
         WHERE ub.batch_id = $1 AND u.role = 'student'
         ORDER BY u.first_name, u.last_name, u.id",
        STUDENT_COLUMNS
    ))
    .bind(batch_id)
    .fetch_all(conn)
    .await?;

    Ok(students)
}

/// Enrolled students with `is_active` set.
pub(super) async fn active_students(
    conn: &mut PgConnection,
    batch_id: i32,
) -> ApiResult<Vec<StudentRecord>> {
    let mut students = enrolled_students(conn, batch_id).await?;
    students.retain(|s| s.is_active);
    Ok(students)
}

pub(super) async fn count_active_students(conn: &mut PgConnection, batch_id: i32) -> ApiResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*)
         FROM user_batches ub
         JOIN users u ON u.id = ub.user_id
         WHERE ub.batch_id = $1 AND u.is_active",
    )
    .bind(batch_id)
    .fetch_one(conn)
    .await?;

    Ok(count)
}

pub(super) async fn is_enrolled(
    conn: &mut PgConnection,
    batch_id: i32,
    student_id: i32,
) -> ApiResult<bool> {
    let enrolled = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM user_batches WHERE batch_id = $1 AND user_id = $2)",
    )
    .bind(batch_id)
    .bind(student_id)
    .fetch_one(conn)
    .await?;

    Ok(enrolled)
}

/// Commit the unit of work when `result` is ok, roll it back otherwise.
pub(super) async fn finish<T>(tx: Transaction<'_, Postgres>, result: ApiResult<T>) -> ApiResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Failed to roll back transaction: {}", rollback_err);
            }
            Err(e)
        }
    }
}
