mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use types::{
    AdminSettings, ApiSettings, ConfigError, ExamSettings, RedisSettings, SecuritySettings,
    Settings, TelemetrySettings,
};
