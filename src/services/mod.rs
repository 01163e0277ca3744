pub(crate) mod attempt;
pub(crate) mod grading;
pub(crate) mod window;
