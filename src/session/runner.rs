//! Async driver for a running [`ExamSession`].
//!
//! The machine itself is synchronous; this runner owns the 1 Hz clock and
//! the command channel the UI shell feeds, and hands the session back the
//! moment it reaches `Submitting` so the caller can grade it.

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::machine::{ExamSession, SessionPhase};
use super::monitor::MonitorEvent;

/// Commands the surrounding shell can issue against a live session.
#[derive(Debug)]
pub enum SessionCommand {
    SelectAnswer(String),
    Next,
    Previous,
    Jump(usize),
    Monitor(MonitorEvent),
    FullscreenLost,
    FullscreenRestored,
    Submit,
    Abandon,
}

/// How a driven session ended. `Submitted` carries the session still in
/// the `Submitting` phase; the caller grades it and then calls
/// [`ExamSession::resolve_submission`].
pub enum SessionOutcome {
    Submitted(Box<ExamSession>),
    Abandoned,
}

/// Drive an active session until it submits or the shell hangs up. Timers,
/// the violation log and the answer map all live inside the session, so
/// dropping it on the `Abandoned` path tears everything down at once.
pub async fn drive(
    mut session: Box<ExamSession>,
    mut commands: mpsc::Receiver<SessionCommand>,
) -> SessionOutcome {
    debug_assert_eq!(session.phase(), SessionPhase::Active);

    let mut clock = interval(Duration::from_secs(1));
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // interval() fires immediately; consume that first tick so the
    // countdowns only move after a full second has passed.
    clock.tick().await;

    loop {
        tokio::select! {
            _ = clock.tick() => {
                session.tick();
            }
            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Abandon) | None => return SessionOutcome::Abandoned,
                    Some(command) => apply(&mut session, command),
                }
            }
        }

        if session.phase() == SessionPhase::Submitting {
            return SessionOutcome::Submitted(session);
        }
    }
}

fn apply(session: &mut ExamSession, command: SessionCommand) {
    let now = OffsetDateTime::now_utc();
    match command {
        SessionCommand::SelectAnswer(option) => session.select_answer(option),
        SessionCommand::Next => session.next_question(),
        SessionCommand::Previous => session.previous_question(),
        SessionCommand::Jump(index) => session.jump_to(index),
        SessionCommand::Monitor(event) => {
            session.monitor_event(&event, now);
        }
        SessionCommand::FullscreenLost => session.fullscreen_lost(now),
        SessionCommand::FullscreenRestored => session.fullscreen_restored(),
        SessionCommand::Submit => session.request_submit(),
        // Abandon never reaches here; the driver loop returns on it.
        SessionCommand::Abandon => {}
    }
}
