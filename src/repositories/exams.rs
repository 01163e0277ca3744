use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{Exam, Question};

pub(crate) const COLUMNS: &str = "\
    id, title, start_date, start_time, end_date, end_time, per_question_seconds, \
    syllabus_tags, created_by, created_at, updated_at";

const QUESTION_COLUMNS: &str =
    "id, exam_id, position, prompt, options, correct_answer, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Exams created by admins of the given branch, oldest first. Windows are
/// not materialized in the database, so activity filtering happens after
/// this fetch, once the stored strings are resolved.
pub(crate) async fn list_for_branch(pool: &PgPool, branch: &str) -> Result<Vec<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(
        "SELECT e.id, e.title, e.start_date, e.start_time, e.end_date, e.end_time,
                e.per_question_seconds, e.syllabus_tags, e.created_by, e.created_at, e.updated_at
         FROM exams e
         JOIN users u ON u.id = e.created_by
         WHERE u.branch = $1
         ORDER BY e.created_at ASC",
    )
    .bind(branch)
    .fetch_all(pool)
    .await
}

pub(crate) async fn question_counts(
    pool: &PgPool,
    exam_ids: &[String],
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    if exam_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, (String, i64)>(
        "SELECT exam_id, COUNT(*) FROM questions WHERE exam_id = ANY($1) GROUP BY exam_id",
    )
    .bind(exam_ids)
    .fetch_all(pool)
    .await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub start_date: &'a str,
    pub start_time: &'a str,
    pub end_date: &'a str,
    pub end_time: &'a str,
    pub per_question_seconds: Option<i32>,
    pub syllabus_tags: Vec<String>,
    pub created_by: &'a str,
    pub created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateExam<'_>) -> Result<Exam, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!(
        "INSERT INTO exams (
            id, title, start_date, start_time, end_date, end_time,
            per_question_seconds, syllabus_tags, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.start_date)
    .bind(params.start_time)
    .bind(params.end_date)
    .bind(params.end_time)
    .bind(params.per_question_seconds)
    .bind(Json(params.syllabus_tags))
    .bind(params.created_by)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY position ASC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

pub(crate) struct AppendQuestion<'a> {
    pub id: &'a str,
    pub exam_id: &'a str,
    pub prompt: &'a str,
    pub options: Vec<String>,
    pub correct_answer: &'a str,
    pub created_at: time::PrimitiveDateTime,
}

/// Append a question at the next free position. The position is taken
/// inside the statement so concurrent appends cannot race past the
/// UNIQUE(exam_id, position) constraint silently.
pub(crate) async fn append_question(
    pool: &PgPool,
    params: AppendQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, exam_id, position, prompt, options, correct_answer, created_at)
         SELECT $1, $2, COALESCE(MAX(position), 0) + 1, $3, $4, $5, $6
         FROM questions WHERE exam_id = $2
         RETURNING {QUESTION_COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.exam_id)
    .bind(params.prompt)
    .bind(Json(params.options))
    .bind(params.correct_answer)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}
