use std::collections::HashMap;

use sqlx::PgConnection;

use crate::error::ApiResult;
use crate::models::{MonthlyExam, MonthlyRanking};

/// Most recent monthly exam of the batch by (year, month).
pub(super) async fn latest_exam(
    conn: &mut PgConnection,
    batch_id: i32,
) -> ApiResult<Option<MonthlyExam>> {
    let exam = sqlx::query_as::<_, MonthlyExam>(
        "SELECT id, batch_id, year, month
         FROM monthly_exams
         WHERE batch_id = $1
         ORDER BY year DESC, month DESC, id DESC
         LIMIT 1",
    )
    .bind(batch_id)
    .fetch_optional(conn)
    .await?;

    Ok(exam)
}

/// Student id to finalized position from the batch's latest exam.
/// Empty when the batch has no exams yet.
pub(super) async fn current_ranks(
    conn: &mut PgConnection,
    batch_id: i32,
) -> ApiResult<HashMap<i32, i32>> {
    let Some(exam) = latest_exam(&mut *conn, batch_id).await? else {
        return Ok(HashMap::new());
    };

    let rankings = sqlx::query_as::<_, MonthlyRanking>(
        "SELECT id, monthly_exam_id, user_id, position, is_final
         FROM monthly_rankings
         WHERE monthly_exam_id = $1 AND is_final = TRUE
         ORDER BY id",
    )
    .bind(exam.id)
    .fetch_all(conn)
    .await?;

    Ok(rank_map(&rankings))
}

pub(super) fn rank_map(rankings: &[MonthlyRanking]) -> HashMap<i32, i32> {
    let mut ranks = HashMap::new();
    for ranking in rankings.iter().filter(|r| r.is_final) {
        match ranking.position {
            Some(position) if position != 0 => {
                ranks.insert(ranking.user_id, position);
            }
            _ => {}
        }
    }
    ranks
}

/// Ranked entries first in ascending rank, unranked after in their original order.
pub(super) fn sort_by_rank<T>(items: &mut [T], rank: impl Fn(&T) -> Option<i32>) {
    items.sort_by_key(|item| match rank(item) {
        Some(position) => (false, position),
        None => (true, 0),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(id: i32, user_id: i32, position: Option<i32>, is_final: bool) -> MonthlyRanking {
        MonthlyRanking {
            id,
            monthly_exam_id: 1,
            user_id,
            position,
            is_final,
        }
    }

    #[test]
    fn ranked_students_come_first_in_rank_order() {
        let ranks = HashMap::from([(1, 3), (2, 1)]);
        let mut students = vec![("A", 1), ("B", 2), ("C", 3)];

        sort_by_rank(&mut students, |(_, id)| ranks.get(id).copied());

        let order: Vec<&str> = students.iter().map(|(name, _)| *name).collect();
        assert_eq!(order, ["B", "A", "C"]);
    }

    #[test]
    fn unranked_students_keep_their_order() {
        let ranks = HashMap::from([(4, 2)]);
        let mut students = vec![("Zara", 1), ("Amin", 2), ("Mitu", 3), ("Ria", 4)];

        sort_by_rank(&mut students, |(_, id)| ranks.get(id).copied());

        let order: Vec<&str> = students.iter().map(|(name, _)| *name).collect();
        assert_eq!(order, ["Ria", "Zara", "Amin", "Mitu"]);
    }

    #[test]
    fn rank_map_keeps_final_positioned_rows_only() {
        let ranks = rank_map(&[
            ranking(1, 10, Some(1), true),
            ranking(2, 11, Some(2), false),
            ranking(3, 12, None, true),
            ranking(4, 13, Some(0), true),
        ]);

        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks.get(&10), Some(&1));
    }

    #[test]
    fn duplicate_rankings_last_write_wins() {
        let ranks = rank_map(&[ranking(1, 10, Some(4), true), ranking(2, 10, Some(2), true)]);
        assert_eq!(ranks.get(&10), Some(&2));
    }
}
