use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level; JSON output is a settings flag for log shippers.
pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.clone()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    let installed = if telemetry.json { subscriber.json().try_init() } else { subscriber.try_init() };
    installed.map_err(|err| anyhow::anyhow!(err.to_string()))
}
