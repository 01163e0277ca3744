use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_i64,
    parse_u16, parse_u32, parse_u64, parse_utc_offset,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("INVIGIL_HOST", "0.0.0.0");
        let port = env_or_default("INVIGIL_PORT", "8000");

        let environment =
            parse_environment(env_optional("INVIGIL_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("INVIGIL_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Invigil API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "invigil");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "invigil_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let per_question_default_seconds = parse_i64(
            "EXAM_PER_QUESTION_DEFAULT_SECONDS",
            env_or_default("EXAM_PER_QUESTION_DEFAULT_SECONDS", "120"),
        )?;
        let per_correct_marks =
            parse_i64("EXAM_PER_CORRECT_MARKS", env_or_default("EXAM_PER_CORRECT_MARKS", "2"))?;
        let violation_threshold = parse_u32(
            "EXAM_VIOLATION_THRESHOLD",
            env_or_default("EXAM_VIOLATION_THRESHOLD", "3"),
        )?;
        let timezone_offset = parse_utc_offset(
            "EXAM_TIMEZONE_OFFSET",
            env_or_default("EXAM_TIMEZONE_OFFSET", "+05:30"),
        )?;
        let enforce_start_gate = env_optional("EXAM_ENFORCE_START_GATE")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);
        let submit_rate_limit =
            parse_u64("SUBMIT_RATE_LIMIT", env_or_default("SUBMIT_RATE_LIMIT", "5"))?;
        let submit_rate_window_seconds = parse_u64(
            "SUBMIT_RATE_WINDOW_SECONDS",
            env_or_default("SUBMIT_RATE_WINDOW_SECONDS", "60"),
        )?;

        let first_superuser_username = env_or_default("FIRST_SUPERUSER_USERNAME", "admin");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");
        let first_superuser_branch = env_or_default("FIRST_SUPERUSER_BRANCH", "main");

        let log_level = env_or_default("INVIGIL_LOG_LEVEL", "info");
        let json = env_optional("INVIGIL_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            exam: ExamSettings {
                per_question_default_seconds,
                per_correct_marks,
                violation_threshold,
                timezone_offset,
                enforce_start_gate,
                submit_rate_limit,
                submit_rate_window_seconds,
            },
            admin: AdminSettings {
                first_superuser_username,
                first_superuser_password,
                first_superuser_branch,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exam.per_question_default_seconds <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_PER_QUESTION_DEFAULT_SECONDS",
                value: self.exam.per_question_default_seconds.to_string(),
            });
        }

        if self.exam.per_correct_marks <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_PER_CORRECT_MARKS",
                value: self.exam.per_correct_marks.to_string(),
            });
        }

        if self.exam.violation_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EXAM_VIOLATION_THRESHOLD",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::Settings;
    use crate::test_support;

    #[tokio::test]
    async fn exam_defaults_match_reference_policy() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.exam().per_question_default_seconds, 120);
        assert_eq!(settings.exam().per_correct_marks, 2);
        assert_eq!(settings.exam().violation_threshold, 3);
        assert!(!settings.exam().enforce_start_gate);
    }
}
