pub(crate) mod attempts;
pub(crate) mod exams;
pub(crate) mod health;
pub(crate) mod users;
