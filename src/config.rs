use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Optional `./config.yaml` picked up when no config file is named.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Route one consultation through the orchestrator", long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Require JWT authentication
    #[arg(long, env = "JWT_REQUIRED")]
    pub jwt_required: Option<bool>,

    /// Discovery timeout in milliseconds
    #[arg(long, env = "DISCOVERY_TIMEOUT_MS")]
    pub discovery_timeout_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: Option<bool>,

    /// Request type, e.g. "event-schema-design"
    #[arg(long = "type", default_value = "consultation")]
    pub request_type: String,

    /// Free-text description of the need
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Route to this service instead of detecting one
    #[arg(long)]
    pub target_service: Option<String>,

    /// Session to attach the consultation to
    #[arg(long)]
    pub session: Option<String>,

    /// Caller user id
    #[arg(long, default_value = "cli-user")]
    pub user: String,

    /// Caller token
    #[arg(long, env = "CONSULT_TOKEN", default_value = "")]
    pub token: String,

    /// Caller role (repeatable)
    #[arg(long = "role")]
    pub roles: Vec<String>,

    /// Caller permission (repeatable)
    #[arg(long = "permission")]
    pub permissions: Vec<String>,

    /// Request context entry as key=value (repeatable)
    #[arg(long = "context", value_parser = parse_key_val)]
    pub context: Vec<(String, String)>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub orchestration: OrchestrationConfig,
    pub security: SecurityConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestrationConfig {
    pub discovery_timeout_ms: u64,
    pub session_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
    pub max_suggestions: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SecurityConfig {
    pub jwt_required: bool,
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    pub log_filter: String,
    pub json: bool,
}

impl OrchestrationConfig {
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl AppConfig {
    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Self::from_cli(&cli)
    }

    /// Defaults, then the config file, then `ORCH_*` variables, then CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("orchestration.discovery_timeout_ms", 5000)?
            .set_default("orchestration.session_timeout_secs", 1800)?
            .set_default("orchestration.cleanup_interval_secs", 300)?
            .set_default("orchestration.max_suggestions", 5)?
            .set_default("security.jwt_required", false)?
            .set_default("security.jwt_secret", "")?
            .set_default("telemetry.log_filter", "info,consult_orchestrator=debug")?
            .set_default("telemetry.json", false)?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false)),
        };

        // E.g. ORCH_ORCHESTRATION__DISCOVERY_TIMEOUT_MS=250
        builder = builder.add_source(
            Environment::with_prefix("ORCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(required) = cli.jwt_required {
            builder = builder.set_override("security.jwt_required", required)?;
        }
        if let Some(timeout) = cli.discovery_timeout_ms {
            builder = builder.set_override("orchestration.discovery_timeout_ms", timeout)?;
        }
        if let Some(json) = cli.json_logs {
            builder = builder.set_override("telemetry.json", json)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.security.jwt_required && self.security.jwt_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "security.jwt_secret must be set when security.jwt_required is true".to_string(),
            ));
        }
        if self.orchestration.discovery_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "orchestration.discovery_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("task-objective=ship it").unwrap(),
            ("task-objective".to_string(), "ship it".to_string())
        );
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_cli_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "consult",
            "--type",
            "event-schema-design",
            "--role",
            "ARCHITECT",
            "--role",
            "DEVELOPER",
            "--context",
            "a=1",
        ])
        .unwrap();
        assert_eq!(cli.request_type, "event-schema-design");
        assert_eq!(cli.roles, vec!["ARCHITECT", "DEVELOPER"]);
        assert_eq!(cli.context, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_durations() {
        let cfg = OrchestrationConfig {
            discovery_timeout_ms: 250,
            session_timeout_secs: 60,
            cleanup_interval_secs: 5,
            max_suggestions: 3,
        };
        assert_eq!(cfg.discovery_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.session_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.cleanup_interval(), Duration::from_secs(5));
    }
}
