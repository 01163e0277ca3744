use axum::{
    http::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    http::{HeaderName, Method, Request, Response},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::api::auth;
use crate::api::exams;
use crate::api::handlers;
use crate::core::{config::Settings, state::AppState};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assembles the full application router: root/health probes, the
/// versioned API (auth + exams), and the middleware stack (request ids,
/// tracing spans, request metrics, CORS, trailing-slash normalization).
pub(crate) fn router(state: AppState) -> Router {
    let cors = cors_from_settings(state.settings());
    let prefix = state.settings().api().api_v1_str.clone();
    let versioned =
        Router::new().nest("/auth", auth::router()).nest("/exams", exams::router());

    let rid = HeaderName::from_static(REQUEST_ID_HEADER);
    let rid_for_span = rid.clone();
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(move |req: &Request<_>| {
            let request_id = req
                .headers()
                .get(&rid_for_span)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id
            )
        })
        .on_response(|res: &Response<axum::body::Body>, elapsed: Duration, _span: &Span| {
            let status = res.status().as_u16().to_string();
            metrics::counter!("http_requests_total", "status" => status.clone()).increment(1);
            metrics::histogram!("http_request_duration_seconds", "status" => status)
                .record(elapsed.as_secs_f64());
        });

    let mut app: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest(&prefix, versioned)
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(rid.clone()))
        .layer(SetRequestIdLayer::new(rid, MakeRequestUuid))
        .layer(tracing_layer)
        .layer(cors);

    if state.settings().telemetry().prometheus_enabled {
        app = app.route("/metrics", get(handlers::metrics));
    }

    app.with_state(state)
}

fn cors_from_settings(settings: &Settings) -> CorsLayer {
    let allowed: Vec<HeaderValue> = settings
        .cors()
        .origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600));

    if allowed.is_empty() {
        // Wildcard origin cannot be combined with allow_credentials
        layer.allow_origin(Any)
    } else {
        layer.allow_credentials(true).allow_origin(AllowOrigin::list(allowed))
    }
}
