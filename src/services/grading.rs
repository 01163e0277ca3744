//! Deterministic grading against the authoritative question list.
//!
//! The client is never trusted for correctness data; everything here runs
//! over rows re-fetched at submission time. Matching tries a fixed
//! strategy order and reports an explicit verdict per answer instead of
//! guessing silently.

use std::collections::HashSet;

use crate::db::models::Question;
use crate::schemas::exam::{AnswerFeedback, SubmittedAnswer};

#[derive(Debug)]
pub(crate) struct GradingOutcome {
    pub(crate) score: i64,
    pub(crate) correct_count: i64,
    pub(crate) feedback: Vec<AnswerFeedback>,
}

/// How a submitted answer was tied to an authoritative question.
/// Strategies are tried in declaration order; the positional fallback is
/// only legal when the submission covers the paper exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    ById(usize),
    ByPrompt(usize),
    ByPosition(usize),
    Unmatched,
}

fn resolve(
    answer: &SubmittedAnswer,
    index: usize,
    questions: &[Question],
    positional_allowed: bool,
) -> Resolution {
    if let Some(id) = answer.question_id.as_deref() {
        if let Some(found) = questions.iter().position(|q| q.id == id) {
            return Resolution::ById(found);
        }
    }

    if let Some(prompt) = answer.question.as_deref() {
        let prompt = prompt.trim();
        if !prompt.is_empty() {
            if let Some(found) = questions.iter().position(|q| q.prompt.trim() == prompt) {
                return Resolution::ByPrompt(found);
            }
        }
    }

    if positional_allowed && index < questions.len() {
        return Resolution::ByPosition(index);
    }

    Resolution::Unmatched
}

/// Grade a full submission. Each authoritative question scores at most
/// once even if several submitted answers resolve to it; later duplicates
/// are reported unmatched.
pub(crate) fn grade(
    questions: &[Question],
    answers: &[SubmittedAnswer],
    per_correct_marks: i64,
) -> GradingOutcome {
    let positional_allowed = answers.len() == questions.len();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut correct_count = 0i64;
    let mut feedback = Vec::with_capacity(answers.len());

    for (index, answer) in answers.iter().enumerate() {
        let resolution = resolve(answer, index, questions, positional_allowed);

        let question_index = match resolution {
            Resolution::ById(i) | Resolution::ByPrompt(i) | Resolution::ByPosition(i) => {
                if claimed.insert(i) {
                    Some(i)
                } else {
                    None
                }
            }
            Resolution::Unmatched => None,
        };

        let Some(question_index) = question_index else {
            feedback.push(AnswerFeedback {
                question_id: answer.question_id.clone(),
                matched: false,
                correct: false,
            });
            continue;
        };

        let question = &questions[question_index];
        let submitted = answer.answer.trim();
        let correct = !submitted.is_empty() && submitted == question.correct_answer.trim();
        if correct {
            correct_count += 1;
        }

        feedback.push(AnswerFeedback {
            question_id: Some(question.id.clone()),
            matched: true,
            correct,
        });
    }

    GradingOutcome { score: correct_count * per_correct_marks, correct_count, feedback }
}
