pub mod batch;
pub mod exam;
pub mod user;

pub use batch::{BatchRecord, BatchResponse, BATCH_COLUMNS};
pub use exam::{MonthlyExam, MonthlyRanking};
pub use user::{StudentRecord, UserRole, STUDENT_COLUMNS};
