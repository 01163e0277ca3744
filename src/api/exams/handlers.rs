use std::collections::{HashMap, HashSet};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{Exam, User};
use crate::db::types::SubmitReason;
use crate::repositories;
use crate::repositories::attempts::RecordOutcome;
use crate::schemas::exam::{
    ActiveExamResponse, AttemptResponse, ExamCreate, ExamResponse, GradingResponse,
    QuestionCreate, QuestionResponse, SubmitRequest,
};
use crate::services::{attempt, grading, window};

/// Submissions are still accepted this long after the window closes, to
/// absorb network jitter for a client that hit submit right at the end.
const SUBMIT_GRACE_SECONDS: i64 = 300;

pub(in crate::api::exams) async fn create_exam(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if let Some(seconds) = payload.per_question_seconds {
        if seconds <= 0 {
            return Err(ApiError::BadRequest(
                "per_question_seconds must be positive".to_string(),
            ));
        }
    }

    let offset = state.settings().exam().timezone_offset;
    let start = window::resolve_boundary(&payload.start_date, &payload.start_time, offset)
        .ok_or_else(|| ApiError::BadRequest("start_date is not a valid date".to_string()))?;
    let end = window::resolve_boundary(&payload.end_date, &payload.end_time, offset)
        .ok_or_else(|| ApiError::BadRequest("end_date is not a valid date".to_string()))?;
    if end <= start {
        return Err(ApiError::BadRequest("the window must end after it starts".to_string()));
    }

    let exam = repositories::exams::create(
        state.db(),
        repositories::exams::CreateExam {
            id: &Uuid::new_v4().to_string(),
            title: &payload.title,
            start_date: &payload.start_date,
            start_time: &payload.start_time,
            end_date: &payload.end_date,
            end_time: &payload.end_time,
            per_question_seconds: payload.per_question_seconds,
            syllabus_tags: payload.syllabus_tags.clone(),
            created_by: &admin.id,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    Ok((StatusCode::CREATED, Json(ExamResponse::from(&exam))))
}

pub(in crate::api::exams) async fn list_active_exams(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ActiveExamResponse>>, ApiError> {
    let exam_settings = state.settings().exam();
    let now = OffsetDateTime::now_utc();

    let exams = repositories::exams::list_for_branch(state.db(), &user.branch)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list exams"))?;

    let active: Vec<&Exam> = exams
        .iter()
        .filter(|exam| {
            window::resolve(exam, exam_settings.timezone_offset)
                .is_active(now, exam_settings.enforce_start_gate)
        })
        .collect();

    let active_ids: Vec<String> = active.iter().map(|exam| exam.id.clone()).collect();
    let counts: HashMap<String, i64> = repositories::exams::question_counts(state.db(), &active_ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?
        .into_iter()
        .collect();

    let attempted: HashSet<String> =
        repositories::attempts::list_exam_ids_for_user(state.db(), &user.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?
            .into_iter()
            .collect();

    let response = active
        .into_iter()
        .map(|exam| ActiveExamResponse {
            id: exam.id.clone(),
            title: exam.title.clone(),
            end_date: exam.end_date.clone(),
            end_time: exam.end_time.clone(),
            syllabus_tags: exam.syllabus_tags.0.clone(),
            question_count: counts.get(&exam.id).copied().unwrap_or(0),
            attempted: attempted.contains(&exam.id),
        })
        .collect();

    Ok(Json(response))
}

pub(in crate::api::exams) async fn append_question(
    Path(exam_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let exam = fetch_exam(&state, &exam_id).await?;

    let question = repositories::exams::append_question(
        state.db(),
        repositories::exams::AppendQuestion {
            id: &Uuid::new_v4().to_string(),
            exam_id: &exam.id,
            prompt: &payload.prompt,
            options: payload.options.clone(),
            correct_answer: &payload.correct_answer,
            created_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to append question"))?;

    Ok((StatusCode::CREATED, Json(QuestionResponse::from(&question))))
}

pub(in crate::api::exams) async fn begin_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResponse>, ApiError> {
    let exam = fetch_exam(&state, &exam_id).await?;
    require_same_branch(&state, &exam, &user).await?;

    let existing = repositories::attempts::find_for_user_exam(state.db(), &user.id, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check previous attempts"))?;
    if existing.is_some() {
        return Err(ApiError::Forbidden("You have already submitted this test"));
    }

    let questions = repositories::exams::list_questions(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let default_seconds = state.settings().exam().per_question_default_seconds;
    Ok(Json(attempt::build_payload(&exam, &questions, default_seconds)))
}

pub(in crate::api::exams) async fn submit_attempt(
    Path(exam_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<GradingResponse>, ApiError> {
    let exam_settings = state.settings().exam();

    let rate_key = format!("rl:submit:{}", user.id);
    let allowed = state
        .redis()
        .rate_limit(&rate_key, exam_settings.submit_rate_limit, exam_settings.submit_rate_window_seconds)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Too many submissions, try again later"));
    }

    let exam = fetch_exam(&state, &exam_id).await?;
    require_same_branch(&state, &exam, &user).await?;

    // The client-side window check is advisory only; the end boundary is
    // re-derived here, with a short grace for in-flight submissions.
    let resolved = window::resolve(&exam, exam_settings.timezone_offset);
    let deadline = resolved
        .end
        .map(|end| end + time::Duration::seconds(SUBMIT_GRACE_SECONDS));
    match deadline {
        Some(deadline) if OffsetDateTime::now_utc() < deadline => {}
        _ => return Err(ApiError::Forbidden("The test window has closed")),
    }

    let questions = repositories::exams::list_questions(state.db(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let outcome = grading::grade(&questions, &payload.answers, exam_settings.per_correct_marks);
    let reason = payload.reason.unwrap_or(SubmitReason::Manual);

    let recorded = repositories::attempts::record_once(
        state.db(),
        repositories::attempts::RecordAttempt {
            id: &Uuid::new_v4().to_string(),
            user_id: &user.id,
            exam_id: &exam.id,
            marks: outcome.score,
            reason,
            submitted_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to record attempt"))?;

    let total_marks_after = match recorded {
        RecordOutcome::Recorded { total_marks } => total_marks,
        RecordOutcome::AlreadySubmitted => {
            return Err(ApiError::Conflict("Test already submitted".to_string()));
        }
    };

    metrics::counter!(
        "attempts_recorded_total",
        "reason" => reason.as_str()
    )
    .increment(1);
    tracing::info!(
        exam_id = %exam.id,
        user_id = %user.id,
        score = outcome.score,
        correct = outcome.correct_count,
        reason = reason.as_str(),
        "Attempt recorded"
    );

    Ok(Json(GradingResponse {
        score: outcome.score,
        per_correct_marks: exam_settings.per_correct_marks,
        total_marks_after,
        reason: reason.as_str().to_string(),
        feedback: outcome.feedback,
    }))
}

async fn fetch_exam(state: &AppState, exam_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_by_id(state.db(), exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))
}

/// Exams are scoped to the creator admin's branch; students from another
/// branch never see or touch them.
async fn require_same_branch(state: &AppState, exam: &Exam, user: &User) -> Result<(), ApiError> {
    let creator = repositories::users::find_by_id(state.db(), &exam.created_by)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load exam creator"))?;

    match creator {
        Some(creator) if creator.branch == user.branch => Ok(()),
        _ => Err(ApiError::Forbidden("This test is not available for your branch")),
    }
}
