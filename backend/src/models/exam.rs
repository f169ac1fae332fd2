use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MonthlyExam {
    pub id: i32,
    pub batch_id: i32,
    pub year: i32,
    pub month: i32,
}

/// Only rankings with `is_final` set are authoritative.
#[derive(Debug, Clone, FromRow)]
pub struct MonthlyRanking {
    pub id: i32,
    pub monthly_exam_id: i32,
    pub user_id: i32,
    pub position: Option<i32>,
    pub is_final: bool,
}
