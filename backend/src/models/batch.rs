use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::catalog::class_from_description;

pub const BATCH_COLUMNS: &str = "b.id, b.name, b.description, b.class_name, b.subject, \
     b.start_date, b.end_date, b.fee_amount, b.max_students, b.status, b.is_active, \
     b.is_archived, b.archived_at, b.archived_by, b.archive_reason, b.created_at, b.updated_at";

pub const DEFAULT_MAX_STUDENTS: i32 = 50;

#[derive(Debug, Clone, FromRow)]
pub struct BatchRecord {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub class_name: Option<String>,
    pub subject: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub fee_amount: Decimal,
    pub max_students: i32,
    pub status: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub archived_by: Option<i32>,
    pub archive_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchRecord {
    /// Stored class, or the description prefix for rows written before the column existed.
    pub fn class(&self) -> Option<&str> {
        self.class_name
            .as_deref()
            .or_else(|| class_from_description(&self.description))
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub class: Option<String>,
    pub subject: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    pub max_students: i32,
    pub status: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&BatchRecord> for BatchResponse {
    fn from(batch: &BatchRecord) -> Self {
        Self {
            id: batch.id,
            name: batch.name.clone(),
            description: batch.description.clone(),
            class: batch.class().map(str::to_string),
            subject: batch.subject.clone(),
            start_date: batch.start_date,
            end_date: batch.end_date,
            fee_amount: batch.fee_amount,
            max_students: batch.max_students,
            status: batch.status.clone(),
            is_active: batch.is_active,
            is_archived: batch.is_archived,
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        }
    }
}

/// Row for the paginated batch list.
#[derive(Debug, FromRow)]
pub struct BatchListRow {
    #[sqlx(flatten)]
    pub batch: BatchRecord,
    pub current_students: i64,
}

#[derive(Debug, Serialize)]
pub struct BatchListItem {
    #[serde(flatten)]
    pub batch: BatchResponse,
    #[serde(rename = "currentStudents")]
    pub current_students: i64,
    #[serde(rename = "maxStudents")]
    pub max_students: i32,
}

#[derive(Debug, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: BatchResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<super::user::StudentSummary>>,
}

#[derive(Debug, Serialize)]
pub struct StudentBatch {
    #[serde(flatten)]
    pub batch: BatchResponse,
    pub enrollment_date: Option<NaiveDate>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct ActiveBatch {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub student_count: i64,
}

#[derive(Debug, FromRow)]
pub struct ArchivedBatchRow {
    #[sqlx(flatten)]
    pub batch: BatchRecord,
    pub archived_by_name: Option<String>,
    pub archived_students_count: i64,
    pub total_students_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ArchivedBatch {
    #[serde(flatten)]
    pub batch: BatchResponse,
    pub archived_at: Option<DateTime<Utc>>,
    pub archive_reason: Option<String>,
    pub archived_by_name: String,
    pub archived_students_count: i64,
    pub total_students_count: i64,
}

impl From<ArchivedBatchRow> for ArchivedBatch {
    fn from(row: ArchivedBatchRow) -> Self {
        Self {
            batch: BatchResponse::from(&row.batch),
            archived_at: row.batch.archived_at,
            archive_reason: row.batch.archive_reason,
            archived_by_name: row
                .archived_by_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            archived_students_count: row.archived_students_count,
            total_students_count: row.total_students_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateBatchRequest {
    pub name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateBatchRequest {
    pub name: Option<String>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
    pub subject: Option<String>,
    pub start_date: Option<String>,
    /// An empty string clears the end date.
    pub end_date: Option<String>,
    /// JSON number or numeric string.
    pub fee_amount: Option<serde_json::Value>,
    pub max_students: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollStudentRequest {
    pub student_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveBatchRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreBatchRequest {
    pub restore_students: Option<bool>,
}
