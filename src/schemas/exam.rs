use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Exam, Question};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(alias = "startDate")]
    #[validate(length(min = 1, message = "start_date must not be empty"))]
    pub(crate) start_date: String,
    #[serde(alias = "startTime")]
    #[validate(length(min = 1, message = "start_time must not be empty"))]
    pub(crate) start_time: String,
    #[serde(alias = "endDate")]
    #[validate(length(min = 1, message = "end_date must not be empty"))]
    pub(crate) end_date: String,
    #[serde(alias = "endTime")]
    #[validate(length(min = 1, message = "end_time must not be empty"))]
    pub(crate) end_time: String,
    #[serde(default)]
    #[serde(alias = "perQuestionSeconds")]
    pub(crate) per_question_seconds: Option<i32>,
    #[serde(default)]
    #[serde(alias = "syllabusTags")]
    pub(crate) syllabus_tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    #[validate(length(min = 1, message = "correct_answer must not be empty"))]
    pub(crate) correct_answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) start_date: String,
    pub(crate) start_time: String,
    pub(crate) end_date: String,
    pub(crate) end_time: String,
    pub(crate) per_question_seconds: Option<i32>,
    pub(crate) syllabus_tags: Vec<String>,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
}

impl From<&Exam> for ExamResponse {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id.clone(),
            title: exam.title.clone(),
            start_date: exam.start_date.clone(),
            start_time: exam.start_time.clone(),
            end_date: exam.end_date.clone(),
            end_time: exam.end_time.clone(),
            per_question_seconds: exam.per_question_seconds,
            syllabus_tags: exam.syllabus_tags.0.clone(),
            created_by: exam.created_by.clone(),
            created_at: format_primitive(exam.created_at),
        }
    }
}

/// One entry of the active-exam listing. Questions are omitted entirely;
/// only the attempt payload carries them.
#[derive(Debug, Serialize)]
pub(crate) struct ActiveExamResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) end_date: String,
    pub(crate) end_time: String,
    pub(crate) syllabus_tags: Vec<String>,
    pub(crate) question_count: i64,
    pub(crate) attempted: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) position: i32,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) created_at: String,
}

impl From<&Question> for QuestionResponse {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            exam_id: question.exam_id.clone(),
            position: question.position,
            prompt: question.prompt.clone(),
            options: question.options.0.clone(),
            created_at: format_primitive(question.created_at),
        }
    }
}

/// A question as the attempt payload carries it: no position, no correct
/// answer, nothing a client could use to reconstruct grading data.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptQuestion {
    pub(crate) id: String,
    pub(crate) question: String,
    pub(crate) options: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) exam_id: String,
    pub(crate) title: String,
    pub(crate) total_duration_seconds: i64,
    pub(crate) per_question_seconds: i64,
    pub(crate) questions: Vec<AttemptQuestion>,
}

/// One submitted answer. The id is preferred; the prompt text and the
/// array position are graceful fallbacks for clients that lost the id.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmittedAnswer {
    #[serde(default)]
    #[serde(alias = "questionId")]
    pub(crate) question_id: Option<String>,
    #[serde(default)]
    pub(crate) question: Option<String>,
    #[serde(default)]
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequest {
    pub(crate) answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub(crate) reason: Option<crate::db::types::SubmitReason>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AnswerFeedback {
    pub(crate) question_id: Option<String>,
    pub(crate) matched: bool,
    pub(crate) correct: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingResponse {
    pub(crate) score: i64,
    pub(crate) per_correct_marks: i64,
    pub(crate) total_marks_after: i64,
    pub(crate) reason: String,
    pub(crate) feedback: Vec<AnswerFeedback>,
}
