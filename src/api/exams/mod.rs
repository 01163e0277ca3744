mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_exam))
        .route("/active", get(handlers::list_active_exams))
        .route("/:exam_id/questions", post(handlers::append_question))
        .route("/:exam_id/attempt", post(handlers::begin_attempt))
        .route("/:exam_id/submit", post(handlers::submit_attempt))
}

#[cfg(test)]
mod tests;
