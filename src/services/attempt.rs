//! Attempt payload assembly.
//!
//! Pure helpers over already-fetched rows; eligibility checks and the
//! fetches themselves live with the handlers.

use crate::db::models::{Exam, Question};
use crate::schemas::exam::{AttemptQuestion, AttemptResponse};

/// The effective per-question budget. An absent or non-positive stored
/// value falls back to the configured default.
pub(crate) fn effective_per_question_seconds(exam: &Exam, default_seconds: i64) -> i64 {
    match exam.per_question_seconds {
        Some(seconds) if seconds > 0 => i64::from(seconds),
        _ => default_seconds,
    }
}

/// Build the sanitized payload handed to a starting client. Correct
/// answers and authoritative positions are stripped here and nowhere else
/// sees the difference, so this is the one choke point for answer leakage.
pub(crate) fn build_payload(
    exam: &Exam,
    questions: &[Question],
    default_per_question_seconds: i64,
) -> AttemptResponse {
    let per_question_seconds = effective_per_question_seconds(exam, default_per_question_seconds);

    AttemptResponse {
        exam_id: exam.id.clone(),
        title: exam.title.clone(),
        total_duration_seconds: per_question_seconds * questions.len() as i64,
        per_question_seconds,
        questions: questions
            .iter()
            .map(|question| AttemptQuestion {
                id: question.id.clone(),
                question: question.prompt.clone(),
                options: question.options.0.clone(),
            })
            .collect(),
    }
}
