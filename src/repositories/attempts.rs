use sqlx::PgPool;

use crate::db::models::Attempt;
use crate::db::types::SubmitReason;

const COLUMNS: &str = "id, user_id, exam_id, marks, reason, submitted_at";

/// Outcome of [`record_once`]: either this call inserted the attempt and
/// credited the cumulative total, or an earlier submission already holds
/// the (user, exam) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordOutcome {
    Recorded { total_marks: i64 },
    AlreadySubmitted,
}

pub(crate) struct RecordAttempt<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub exam_id: &'a str,
    pub marks: i64,
    pub reason: SubmitReason,
    pub submitted_at: time::PrimitiveDateTime,
}

/// Record an attempt and credit the user's cumulative total in one
/// statement. The INSERT arm relies on UNIQUE(user_id, exam_id); when it
/// inserts nothing the UPDATE arm matches no row either, so a duplicate
/// submission can never double-credit no matter how the calls interleave.
pub(crate) async fn record_once(
    pool: &PgPool,
    params: RecordAttempt<'_>,
) -> Result<RecordOutcome, sqlx::Error> {
    let total: Option<i64> = sqlx::query_scalar(
        "WITH ins AS (
            INSERT INTO attempts (id, user_id, exam_id, marks, reason, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, exam_id) DO NOTHING
            RETURNING user_id
        )
        UPDATE users
        SET total_marks = total_marks + $4,
            updated_at = $6
        WHERE id = $2
          AND EXISTS (SELECT 1 FROM ins)
        RETURNING total_marks",
    )
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.exam_id)
    .bind(params.marks)
    .bind(params.reason)
    .bind(params.submitted_at)
    .fetch_optional(pool)
    .await?;

    Ok(match total {
        Some(total_marks) => RecordOutcome::Recorded { total_marks },
        None => RecordOutcome::AlreadySubmitted,
    })
}

pub(crate) async fn find_for_user_exam(
    pool: &PgPool,
    user_id: &str,
    exam_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE user_id = $1 AND exam_id = $2"
    ))
    .bind(user_id)
    .bind(exam_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_exam_ids_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT exam_id FROM attempts WHERE user_id = $1")
        .bind(user_id)
        .fetch_all(pool)
        .await
}
