use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Student,
}

impl UserRole {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
        }
    }
}

/// How a recorded attempt reached the grading service. `Timeout` and
/// `Integrity` mark forced submissions; they are completions, not errors,
/// but the audit trail must tell them apart from a user-initiated submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submitreason", rename_all = "lowercase")]
pub(crate) enum SubmitReason {
    Manual,
    Timeout,
    Integrity,
}

impl SubmitReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timeout => "timeout",
            Self::Integrity => "integrity",
        }
    }
}

impl From<crate::session::SubmitReason> for SubmitReason {
    fn from(reason: crate::session::SubmitReason) -> Self {
        match reason {
            crate::session::SubmitReason::Manual => Self::Manual,
            crate::session::SubmitReason::Timeout => Self::Timeout,
            crate::session::SubmitReason::Integrity => Self::Integrity,
        }
    }
}
