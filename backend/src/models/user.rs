use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Teacher,
    SuperUser,
}

pub const STUDENT_COLUMNS: &str = "u.id, u.phone_number, u.first_name, u.last_name, u.email, \
     u.role, u.guardian_phone, u.emergency_contact, u.is_active, u.is_archived, \
     u.archive_reason, u.archived_with_batch_id, u.created_at";

#[derive(Debug, Clone, FromRow)]
pub struct StudentRecord {
    pub id: i32,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: UserRole,
    pub guardian_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub is_active: bool,
    pub is_archived: bool,
    pub archive_reason: Option<String>,
    pub archived_with_batch_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl StudentRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Student entry embedded in batch details.
#[derive(Debug, Serialize)]
pub struct StudentSummary {
    pub id: i32,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub guardian_phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&StudentRecord> for StudentSummary {
    fn from(student: &StudentRecord) -> Self {
        Self {
            id: student.id,
            phone_number: student.phone_number.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            full_name: student.full_name(),
            email: student.email.clone(),
            guardian_phone: student.guardian_phone.clone(),
            created_at: student.created_at,
        }
    }
}

/// Student entry in the ranked roster.
#[derive(Debug, Serialize)]
pub struct RosterEntry {
    pub id: i32,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: Option<String>,
    pub guardian_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub roll_number: Option<i32>,
    pub current_rank: Option<i32>,
}

impl RosterEntry {
    pub fn new(student: StudentRecord, rank: Option<i32>) -> Self {
        let full_name = student.full_name();
        Self {
            id: student.id,
            phone: student.phone_number.clone(),
            phone_number: student.phone_number,
            first_name: student.first_name,
            last_name: student.last_name,
            full_name,
            email: student.email,
            guardian_phone: student.guardian_phone,
            emergency_contact: student.emergency_contact,
            created_at: student.created_at,
            roll_number: rank,
            current_rank: rank,
        }
    }
}
