//! The exam session state machine.
//!
//! One value of [`ExamSession`] owns everything a running attempt needs:
//! the shuffled question list, the answer map, both countdowns and the
//! violation log. It is deliberately free of clocks and I/O — callers feed
//! it ticks and events, which makes every transition deterministic and
//! testable. The tokio driver in [`super::runner`] supplies real time.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use super::monitor::{self, MonitorEvent, ViolationKind};

pub const DEFAULT_VIOLATION_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Start,
    Active,
    Submitting,
    Finished,
}

/// Why the session transitioned to `Submitting`. Forced submissions are
/// completions of the session, never surfaced as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitReason {
    Manual,
    Timeout,
    Integrity,
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub kind: ViolationKind,
    pub at: OffsetDateTime,
    pub question_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Unanswered,
    Answered,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct SessionQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub total_duration_seconds: u32,
    pub per_question_seconds: u32,
    pub violation_threshold: u32,
}

/// The resolved `[start, end]` attempt window, re-derived locally before a
/// session is allowed to begin.
#[derive(Debug, Clone, Copy)]
pub struct AttemptWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("the test is outside its allowed window")]
    OutsideWindow,
    #[error("the session has already been started")]
    AlreadyStarted,
}

/// One answer as the session will submit it: the locally-held question id
/// and the chosen option text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAnswer {
    pub question_id: String,
    pub answer: String,
}

/// Per-question grading verdict returned by the server. Correct answers are
/// never part of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerVerdict {
    pub question_id: Option<String>,
    pub matched: bool,
    pub correct: bool,
}

/// A row of the results view, assembled from the session's own shuffled
/// question list plus the returned verdicts — never from a re-fetch that
/// could carry correct answers.
#[derive(Debug, Clone)]
pub struct ResultRow {
    pub question_id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub chosen: Option<String>,
    pub status: QuestionStatus,
    pub matched: bool,
    pub correct: bool,
}

pub struct ExamSession {
    exam_id: String,
    title: String,
    phase: SessionPhase,
    questions: Vec<SessionQuestion>,
    statuses: Vec<QuestionStatus>,
    answers: HashMap<String, String>,
    violations: Vec<Violation>,
    cursor: usize,
    total_remaining: u32,
    question_remaining: u32,
    fullscreen_active: bool,
    fullscreen_warning: bool,
    submit_reason: Option<SubmitReason>,
    config: SessionConfig,
}

impl ExamSession {
    /// Build a session in the `Start` phase. Question order and each
    /// question's option order are shuffled independently, once, with the
    /// supplied RNG; the shuffle lives and dies with this session.
    pub fn new<R: Rng>(
        exam_id: impl Into<String>,
        title: impl Into<String>,
        mut questions: Vec<SessionQuestion>,
        config: SessionConfig,
        rng: &mut R,
    ) -> Self {
        questions.shuffle(rng);
        for question in &mut questions {
            question.options.shuffle(rng);
        }

        let statuses = vec![QuestionStatus::Unanswered; questions.len()];
        let total_remaining = config.total_duration_seconds;
        let question_remaining = config.per_question_seconds;

        Self {
            exam_id: exam_id.into(),
            title: title.into(),
            phase: SessionPhase::Start,
            questions,
            statuses,
            answers: HashMap::new(),
            violations: Vec::new(),
            cursor: 0,
            total_remaining,
            question_remaining,
            fullscreen_active: false,
            fullscreen_warning: false,
            submit_reason: None,
            config,
        }
    }

    /// `Start → Active`. Blocks with `OutsideWindow` when `now` falls
    /// outside the attempt window. A denied fullscreen request does not
    /// block starting; it raises the persistent warning banner instead.
    pub fn start(
        &mut self,
        window: AttemptWindow,
        now: OffsetDateTime,
        fullscreen_granted: bool,
    ) -> Result<(), StartError> {
        if self.phase != SessionPhase::Start {
            return Err(StartError::AlreadyStarted);
        }
        if now < window.start || now > window.end {
            return Err(StartError::OutsideWindow);
        }

        self.fullscreen_active = fullscreen_granted;
        self.fullscreen_warning = !fullscreen_granted;
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// Advance both countdowns by one second. Global expiry forces a
    /// timeout submission; per-question expiry skips and advances, except
    /// on the final question where it only re-arms the question timer.
    pub fn tick(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }

        self.total_remaining = self.total_remaining.saturating_sub(1);
        if self.total_remaining == 0 {
            self.force_submit(SubmitReason::Timeout);
            return;
        }

        self.question_remaining = self.question_remaining.saturating_sub(1);
        if self.question_remaining == 0 {
            self.expire_current_question();
        }
    }

    fn expire_current_question(&mut self) {
        if self.statuses[self.cursor] == QuestionStatus::Unanswered {
            self.statuses[self.cursor] = QuestionStatus::Skipped;
        }
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
        }
        self.question_remaining = self.config.per_question_seconds;
    }

    /// Record the chosen option for the current question, overwriting any
    /// earlier choice.
    pub fn select_answer(&mut self, option: impl Into<String>) {
        if self.phase != SessionPhase::Active || self.questions.is_empty() {
            return;
        }

        let question_id = self.questions[self.cursor].id.clone();
        self.answers.insert(question_id, option.into());
        self.statuses[self.cursor] = QuestionStatus::Answered;
    }

    /// Move to the next question, marking the current one skipped if it is
    /// still unanswered.
    pub fn next_question(&mut self) {
        if self.phase != SessionPhase::Active || self.questions.is_empty() {
            return;
        }

        if self.statuses[self.cursor] == QuestionStatus::Unanswered {
            self.statuses[self.cursor] = QuestionStatus::Skipped;
        }
        if self.cursor + 1 < self.questions.len() {
            self.cursor += 1;
            self.question_remaining = self.config.per_question_seconds;
        }
    }

    /// Move to the previous question. The cursor floors at zero.
    pub fn previous_question(&mut self) {
        if self.phase != SessionPhase::Active {
            return;
        }

        if self.cursor > 0 {
            self.cursor -= 1;
            self.question_remaining = self.config.per_question_seconds;
        }
    }

    /// Jump straight to a question index from the status grid.
    pub fn jump_to(&mut self, index: usize) {
        if self.phase != SessionPhase::Active {
            return;
        }

        if index < self.questions.len() && index != self.cursor {
            self.cursor = index;
            self.question_remaining = self.config.per_question_seconds;
        }
    }

    /// Feed a raw shell event through the integrity monitor. Returns true
    /// when the event was a violation and must be suppressed at the source.
    pub fn monitor_event(&mut self, event: &MonitorEvent, now: OffsetDateTime) -> bool {
        if self.phase != SessionPhase::Active {
            return false;
        }

        match monitor::classify(event) {
            Some(kind) => {
                self.record_violation(kind, now);
                true
            }
            None => false,
        }
    }

    /// Fullscreen was lost while active: raise the banner and log a
    /// violation. Counts once per loss, not per frame.
    pub fn fullscreen_lost(&mut self, now: OffsetDateTime) {
        if self.phase != SessionPhase::Active {
            return;
        }

        self.fullscreen_active = false;
        self.fullscreen_warning = true;
        self.record_violation(ViolationKind::FullscreenExit, now);
    }

    pub fn fullscreen_restored(&mut self) {
        self.fullscreen_active = true;
    }

    fn record_violation(&mut self, kind: ViolationKind, now: OffsetDateTime) {
        let question_id = self.questions.get(self.cursor).map(|q| q.id.clone());
        self.violations.push(Violation { kind, at: now, question_id });

        // The threshold must be re-evaluated after every append, not once
        // per tick; a burst of events between ticks still trips it.
        if self.violations.len() >= self.config.violation_threshold as usize {
            self.force_submit(SubmitReason::Integrity);
        }
    }

    /// Explicit user submit (offered on the last question).
    pub fn request_submit(&mut self) {
        self.force_submit(SubmitReason::Manual);
    }

    fn force_submit(&mut self, reason: SubmitReason) {
        if self.phase != SessionPhase::Active {
            return;
        }

        for status in &mut self.statuses {
            if *status == QuestionStatus::Unanswered {
                *status = QuestionStatus::Skipped;
            }
        }
        self.submit_reason = Some(reason);
        self.phase = SessionPhase::Submitting;
    }

    /// `Submitting → Finished`, once the grading service has responded
    /// (success or terminal failure).
    pub fn resolve_submission(&mut self) {
        if self.phase == SessionPhase::Submitting {
            self.phase = SessionPhase::Finished;
        }
    }

    /// The answers to hand to the grading service, in the session's own
    /// (shuffled) question order. Unanswered questions are omitted; they
    /// were already counted as skipped.
    pub fn submission_answers(&self) -> Vec<SessionAnswer> {
        self.questions
            .iter()
            .filter_map(|question| {
                self.answers.get(&question.id).map(|answer| SessionAnswer {
                    question_id: question.id.clone(),
                    answer: answer.clone(),
                })
            })
            .collect()
    }

    /// Build the results view from this session's own question list plus
    /// the verdicts the grading service returned.
    pub fn results_view(&self, verdicts: &[AnswerVerdict]) -> Vec<ResultRow> {
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let verdict = verdicts
                    .iter()
                    .find(|v| v.question_id.as_deref() == Some(question.id.as_str()));

                ResultRow {
                    question_id: question.id.clone(),
                    prompt: question.prompt.clone(),
                    options: question.options.clone(),
                    chosen: self.answers.get(&question.id).cloned(),
                    status: self.statuses[index],
                    matched: verdict.map(|v| v.matched).unwrap_or(false),
                    correct: verdict.map(|v| v.correct).unwrap_or(false),
                }
            })
            .collect()
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn submit_reason(&self) -> Option<SubmitReason> {
        self.submit_reason
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_question(&self) -> Option<&SessionQuestion> {
        self.questions.get(self.cursor)
    }

    pub fn questions(&self) -> &[SessionQuestion] {
        &self.questions
    }

    /// The per-question status grid rendered alongside the paper.
    pub fn status_grid(&self) -> &[QuestionStatus] {
        &self.statuses
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn total_remaining_seconds(&self) -> u32 {
        self.total_remaining
    }

    pub fn question_remaining_seconds(&self) -> u32 {
        self.question_remaining
    }

    pub fn fullscreen_warning(&self) -> bool {
        self.fullscreen_warning
    }

    pub fn fullscreen_active(&self) -> bool {
        self.fullscreen_active
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use time::Duration;

    use super::super::monitor::{ClipboardAction, KeyCombo};
    use super::*;

    fn sample_questions(count: usize) -> Vec<SessionQuestion> {
        (0..count)
            .map(|index| SessionQuestion {
                id: format!("q{index}"),
                prompt: format!("Question {index}?"),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            })
            .collect()
    }

    fn config(total: u32, per_question: u32) -> SessionConfig {
        SessionConfig {
            total_duration_seconds: total,
            per_question_seconds: per_question,
            violation_threshold: DEFAULT_VIOLATION_THRESHOLD,
        }
    }

    fn window_around(now: OffsetDateTime) -> AttemptWindow {
        AttemptWindow { start: now - Duration::hours(1), end: now + Duration::hours(1) }
    }

    fn active_session(count: usize, total: u32, per_question: u32) -> ExamSession {
        let mut rng = StdRng::seed_from_u64(7);
        let mut session =
            ExamSession::new("exam-1", "Sample", sample_questions(count), config(total, per_question), &mut rng);
        let now = OffsetDateTime::now_utc();
        session.start(window_around(now), now, true).expect("start");
        session
    }

    #[test]
    fn start_outside_window_is_blocked() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut session =
            ExamSession::new("exam-1", "Sample", sample_questions(3), config(360, 120), &mut rng);

        let now = OffsetDateTime::now_utc();
        let past = AttemptWindow { start: now - Duration::hours(3), end: now - Duration::hours(1) };
        assert_eq!(session.start(past, now, true), Err(StartError::OutsideWindow));
        assert_eq!(session.phase(), SessionPhase::Start);

        let future = AttemptWindow { start: now + Duration::hours(1), end: now + Duration::hours(2) };
        assert_eq!(session.start(future, now, true), Err(StartError::OutsideWindow));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = OffsetDateTime::now_utc();
        let window = AttemptWindow { start: now - Duration::hours(1), end: now };

        let mut rng = StdRng::seed_from_u64(1);
        let mut session =
            ExamSession::new("exam-1", "Sample", sample_questions(1), config(120, 120), &mut rng);
        assert!(session.start(window, now, true).is_ok());

        let mut rng = StdRng::seed_from_u64(1);
        let mut late =
            ExamSession::new("exam-1", "Sample", sample_questions(1), config(120, 120), &mut rng);
        assert_eq!(
            late.start(window, now + Duration::seconds(1), true),
            Err(StartError::OutsideWindow)
        );
    }

    #[test]
    fn denied_fullscreen_starts_with_warning_banner() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut session =
            ExamSession::new("exam-1", "Sample", sample_questions(2), config(240, 120), &mut rng);
        let now = OffsetDateTime::now_utc();

        session.start(window_around(now), now, false).expect("start");
        assert_eq!(session.phase(), SessionPhase::Active);
        assert!(session.fullscreen_warning());
        assert!(session.violations().is_empty());
    }

    #[test]
    fn shuffle_preserves_question_and_option_sets() {
        let mut rng = StdRng::seed_from_u64(42);
        let session =
            ExamSession::new("exam-1", "Sample", sample_questions(10), config(1200, 120), &mut rng);

        let mut ids: Vec<_> = session.questions().iter().map(|q| q.id.clone()).collect();
        ids.sort();
        let expected: Vec<_> = (0..10).map(|i| format!("q{i}")).collect();
        assert_eq!(ids, expected);

        for question in session.questions() {
            let mut options = question.options.clone();
            options.sort();
            assert_eq!(options, vec!["A", "B", "C", "D"]);
        }
    }

    #[test]
    fn answer_selection_overwrites_previous_choice() {
        let mut session = active_session(3, 360, 120);

        session.select_answer("A");
        session.select_answer("C");

        let current = session.current_question().unwrap().id.clone();
        let answers = session.submission_answers();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0], SessionAnswer { question_id: current, answer: "C".into() });
        assert_eq!(session.status_grid()[0], QuestionStatus::Answered);
    }

    #[test]
    fn next_marks_unanswered_as_skipped_and_resets_timer() {
        let mut session = active_session(3, 360, 120);

        session.tick();
        session.tick();
        assert_eq!(session.question_remaining_seconds(), 118);

        session.next_question();
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.status_grid()[0], QuestionStatus::Skipped);
        assert_eq!(session.question_remaining_seconds(), 120);
    }

    #[test]
    fn previous_floors_at_zero() {
        let mut session = active_session(3, 360, 120);
        session.previous_question();
        assert_eq!(session.cursor(), 0);

        session.next_question();
        session.previous_question();
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn jump_moves_anywhere_without_marking_skipped() {
        let mut session = active_session(4, 480, 120);

        session.jump_to(3);
        assert_eq!(session.cursor(), 3);
        assert_eq!(session.status_grid()[0], QuestionStatus::Unanswered);

        session.jump_to(99);
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn question_timer_expiry_skips_and_advances() {
        let mut session = active_session(3, 3600, 2);

        session.tick();
        session.tick();

        assert_eq!(session.cursor(), 1);
        assert_eq!(session.status_grid()[0], QuestionStatus::Skipped);
        assert_eq!(session.question_remaining_seconds(), 2);
    }

    #[test]
    fn question_timer_expiry_on_final_question_never_submits() {
        let mut session = active_session(2, 3600, 2);
        session.jump_to(1);

        for _ in 0..10 {
            session.tick();
        }

        assert_eq!(session.phase(), SessionPhase::Active);
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.status_grid()[1], QuestionStatus::Skipped);
    }

    #[test]
    fn global_timer_expiry_forces_timeout_submission() {
        let mut session = active_session(2, 3, 120);
        session.select_answer("B");

        session.tick();
        session.tick();
        session.tick();

        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(session.submit_reason(), Some(SubmitReason::Timeout));
        // The unanswered question counts as skipped in the forced submit.
        assert_eq!(session.status_grid()[1], QuestionStatus::Skipped);
        assert_eq!(session.submission_answers().len(), 1);
    }

    #[test]
    fn three_violations_force_integrity_submission() {
        let mut session = active_session(3, 3600, 120);
        let now = OffsetDateTime::now_utc();

        assert!(session.monitor_event(&MonitorEvent::VisibilityHidden, now));
        assert!(session.monitor_event(&MonitorEvent::VisibilityHidden, now));
        assert_eq!(session.phase(), SessionPhase::Active);

        assert!(session.monitor_event(&MonitorEvent::Clipboard(ClipboardAction::Copy), now));

        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(session.submit_reason(), Some(SubmitReason::Integrity));
        assert_eq!(session.violations().len(), 3);
    }

    #[test]
    fn fullscreen_loss_counts_toward_threshold() {
        let mut session = active_session(3, 3600, 120);
        let now = OffsetDateTime::now_utc();

        session.fullscreen_lost(now);
        session.fullscreen_restored();
        session.fullscreen_lost(now);
        session.fullscreen_lost(now);

        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(session.submit_reason(), Some(SubmitReason::Integrity));
        assert!(session.violations().iter().all(|v| v.kind == ViolationKind::FullscreenExit));
    }

    #[test]
    fn non_violation_keys_do_not_accumulate() {
        let mut session = active_session(3, 3600, 120);
        let now = OffsetDateTime::now_utc();

        assert!(!session.monitor_event(&MonitorEvent::Key(KeyCombo::plain("a")), now));
        assert!(session.violations().is_empty());
    }

    #[test]
    fn violations_record_the_current_question() {
        let mut session = active_session(3, 3600, 120);
        let now = OffsetDateTime::now_utc();

        session.jump_to(2);
        session.monitor_event(&MonitorEvent::FocusLost, now);

        let expected = session.questions()[2].id.clone();
        assert_eq!(session.violations()[0].question_id.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn manual_submit_then_resolution_reaches_finished() {
        let mut session = active_session(2, 3600, 120);
        session.select_answer("A");
        session.next_question();
        session.select_answer("D");

        session.request_submit();
        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(session.submit_reason(), Some(SubmitReason::Manual));

        session.resolve_submission();
        assert_eq!(session.phase(), SessionPhase::Finished);

        // Events after teardown are inert.
        session.select_answer("B");
        session.tick();
        assert_eq!(session.submission_answers().len(), 2);
    }

    #[test]
    fn results_view_is_built_from_local_questions_and_verdicts() {
        let mut session = active_session(2, 3600, 120);
        session.select_answer("A");
        session.request_submit();

        let answered_id = session.submission_answers()[0].question_id.clone();
        let verdicts = vec![AnswerVerdict {
            question_id: Some(answered_id.clone()),
            matched: true,
            correct: true,
        }];

        let rows = session.results_view(&verdicts);
        assert_eq!(rows.len(), 2);

        let answered_row = rows.iter().find(|row| row.question_id == answered_id).unwrap();
        assert!(answered_row.matched);
        assert!(answered_row.correct);
        assert_eq!(answered_row.chosen.as_deref(), Some("A"));

        let other_row = rows.iter().find(|row| row.question_id != answered_id).unwrap();
        assert!(!other_row.matched);
        assert_eq!(other_row.status, QuestionStatus::Skipped);
    }
}
