//! Client-resident exam session: the deterministic state machine, the
//! integrity monitor that feeds it, and the tokio driver that clocks it.
//!
//! Everything here runs on the invigilated device. The server side of the
//! crate only ever sees the final submission; nothing in this module
//! persists across a process restart by design.

mod machine;
pub mod monitor;
mod runner;

pub use machine::{
    AnswerVerdict, AttemptWindow, ExamSession, QuestionStatus, ResultRow, SessionAnswer,
    SessionConfig, SessionPhase, SessionQuestion, StartError, SubmitReason, Violation,
    DEFAULT_VIOLATION_THRESHOLD,
};
pub use monitor::{ClipboardAction, KeyCombo, MonitorEvent, ViolationKind};
pub use runner::{drive, SessionCommand, SessionOutcome};
