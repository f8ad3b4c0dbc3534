//! Configuration management for ssh-session.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::error::SessionError;
use crate::execution::DEFAULT_TICK;
use crate::session::Session;
use crate::transport::{Credentials, Launcher, PtyConnector, ShellMode};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where to connect and how to authenticate.
    pub connection: ConnectionSection,
    /// How commands are run.
    pub execution: ExecutionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Which program carries the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// The system ssh client.
    #[default]
    Ssh,
    /// A shell on this machine.
    Local,
}

/// Connection configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    /// Remote host.
    pub host: String,
    /// Remote port. The ssh client default when unset.
    pub port: Option<u16>,
    /// Remote user. Falls back to `$USER`.
    pub user: String,
    /// Private key file.
    pub identity_file: Option<PathBuf>,
    /// Password answered at the login prompt. Never written back out.
    #[serde(skip_serializing)]
    pub password: Option<Secret<String>>,
    /// Extra ssh client options.
    pub options: BTreeMap<String, String>,
    /// Bound on connecting, in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Transport.
    pub transport: TransportKind,
}

/// Execution configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Per-command timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Pump interval in milliseconds.
    pub tick_ms: u64,
    /// Whether commands share one shell.
    pub shell_mode: ShellMode,
    /// Record results in the session history.
    pub history: bool,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            tick_ms: DEFAULT_TICK.as_millis() as u64,
            shell_mode: ShellMode::default(),
            history: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("SSH_SESSION_HOST") {
            self.connection.host = host;
        }

        if let Some(user) = var("SSH_SESSION_USER") {
            self.connection.user = user;
        }

        if let Some(port) = var("SSH_SESSION_PORT") {
            self.connection.port = Some(
                port.parse()
                    .map_err(|_| ConfigError::InvalidValue("SSH_SESSION_PORT", port))?,
            );
        }

        if let Some(password) = var("SSH_SESSION_PASSWORD") {
            if !password.is_empty() {
                self.connection.password = Some(Secret::new(password));
            }
        }

        if let Some(timeout) = var("SSH_SESSION_TIMEOUT") {
            self.execution.timeout_secs = Some(parse_timeout("SSH_SESSION_TIMEOUT", timeout)?);
        }

        if let Some(level) = var("SSH_SESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref host) = args.host {
            self.connection.host = host.clone();
        }

        if let Some(ref user) = args.user {
            self.connection.user = user.clone();
        }

        if let Some(port) = args.port {
            self.connection.port = Some(port);
        }

        if let Some(ref identity) = args.identity {
            self.connection.identity_file = Some(identity.clone());
        }

        for (key, value) in &args.options {
            self.connection.options.insert(key.clone(), value.clone());
        }

        if args.local {
            self.connection.transport = TransportKind::Local;
        }

        if let Some(timeout) = args.timeout {
            self.execution.timeout_secs = Some(timeout);
        }

        if args.per_command {
            self.execution.shell_mode = ShellMode::PerCommand;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Build a closed session from this configuration.
    pub fn build_session(&self) -> crate::Result<Session> {
        let conn = &self.connection;

        let host = match (conn.host.trim(), conn.transport) {
            ("", TransportKind::Local) => "localhost".to_string(),
            (host, _) => host.to_string(),
        };
        let user = match (conn.user.is_empty(), conn.transport) {
            (false, _) => conn.user.clone(),
            (true, TransportKind::Local) => {
                std::env::var("USER").unwrap_or_else(|_| "local".to_string())
            }
            (true, TransportKind::Ssh) => std::env::var("USER").unwrap_or_default(),
        };

        let credentials = Credentials {
            password: conn.password.clone(),
            identity_file: conn.identity_file.clone(),
            options: conn
                .options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        let launcher = match conn.transport {
            TransportKind::Ssh => Launcher::ssh(),
            TransportKind::Local => Launcher::local(),
        };
        let mut connector = PtyConnector::new(launcher).mode(self.execution.shell_mode);

        let mut builder = Session::builder(host, user)
            .credentials(credentials)
            .tick(Duration::from_millis(self.execution.tick_ms))
            .history(self.execution.history);

        if let Some(port) = conn.port {
            builder = builder.port(port);
        }
        if let Some(secs) = self.execution.timeout_secs {
            builder = builder.timeout_secs(secs);
        }
        if let Some(secs) = conn.connect_timeout_secs {
            let timeout = Duration::from_secs(secs);
            connector = connector.handshake_timeout(timeout);
            builder = builder.connect_timeout(timeout);
        }

        builder.connector(connector).build()
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn parse_timeout(name: &'static str, value: String) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue(name, value)),
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A setting that cannot be used.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(name, value) => write!(f, "invalid value for {}: '{}'", name, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SessionError {
    fn from(e: ConfigError) -> Self {
        SessionError::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connection.host.is_empty());
        assert_eq!(config.connection.transport, TransportKind::Ssh);
        assert_eq!(config.execution.tick_ms, 10);
        assert_eq!(config.execution.shell_mode, ShellMode::Persistent);
        assert!(config.execution.history);
        assert!(config.execution.timeout_secs.is_none());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "connection": {
                "host": "db01.internal",
                "port": 2222,
                "user": "deploy",
                "password": "hunter2",
                "options": { "StrictHostKeyChecking": "no" }
            },
            "execution": {
                "timeout_secs": 30,
                "shell_mode": "per_command",
                "history": false
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.connection.host, "db01.internal");
        assert_eq!(config.connection.port, Some(2222));
        assert_eq!(
            config
                .connection
                .password
                .as_ref()
                .map(|p| p.expose_secret().as_str()),
            Some("hunter2")
        );
        assert_eq!(config.connection.options["StrictHostKeyChecking"], "no");
        assert_eq!(config.execution.timeout_secs, Some(30));
        assert_eq!(config.execution.shell_mode, ShellMode::PerCommand);
        assert!(!config.execution.history);
        assert_eq!(config.execution.tick_ms, 10); // Default
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/ssh-session.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_vars(vars(&[
                ("SSH_SESSION_HOST", "web01"),
                ("SSH_SESSION_USER", "ops"),
                ("SSH_SESSION_PORT", "2200"),
                ("SSH_SESSION_TIMEOUT", "15"),
                ("RUST_LOG", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.connection.host, "web01");
        assert_eq!(config.connection.user, "ops");
        assert_eq!(config.connection.port, Some(2200));
        assert_eq!(config.execution.timeout_secs, Some(15));
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_env_log_level_beats_rust_log() {
        let mut config = Config::default();
        config
            .apply_vars(vars(&[
                ("SSH_SESSION_LOG_LEVEL", "trace"),
                ("RUST_LOG", "debug"),
            ]))
            .unwrap();
        assert_eq!(config.log_filter(), "trace");
    }

    #[test]
    fn test_env_rejects_bad_timeout() {
        let mut config = Config::default();
        let err = config
            .apply_vars(vars(&[("SSH_SESSION_TIMEOUT", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("SSH_SESSION_TIMEOUT"));

        let err = config
            .apply_vars(vars(&[("SSH_SESSION_TIMEOUT", "later")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_, _)));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.connection.host = "from-file".to_string();

        let args = Args {
            host: Some("from-cli".to_string()),
            user: Some("deploy".to_string()),
            timeout: Some(5),
            options: vec![("ServerAliveInterval".to_string(), "30".to_string())],
            per_command: true,
            ..Args::default()
        };
        config.apply_args(&args);

        assert_eq!(config.connection.host, "from-cli");
        assert_eq!(config.connection.user, "deploy");
        assert_eq!(config.execution.timeout_secs, Some(5));
        assert_eq!(config.connection.options["ServerAliveInterval"], "30");
        assert_eq!(config.execution.shell_mode, ShellMode::PerCommand);
    }

    #[test]
    fn test_build_session() {
        let mut config = Config::default();
        config.connection.host = "web01".to_string();
        config.connection.user = "deploy".to_string();
        config.connection.port = Some(2222);
        config.execution.timeout_secs = Some(10);

        let session = config.build_session().unwrap();
        assert_eq!(session.host(), "web01");
        assert_eq!(session.user(), "deploy");
        assert_eq!(session.port(), Some(2222));
        assert_eq!(session.timeout(), Some(Duration::from_secs(10)));
        assert!(!session.is_open());
    }

    #[test]
    fn test_build_session_local_defaults_host() {
        let mut config = Config::default();
        config.connection.transport = TransportKind::Local;
        config.connection.user = "me".to_string();

        let session = config.build_session().unwrap();
        assert_eq!(session.host(), "localhost");
    }

    #[test]
    fn test_build_session_rejects_zero_timeout() {
        let mut config = Config::default();
        config.connection.host = "web01".to_string();
        config.connection.user = "deploy".to_string();
        config.execution.timeout_secs = Some(0);

        let err = config.build_session().unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
    }

    #[test]
    fn test_serialization_skips_password() {
        let mut config = Config::default();
        config.connection.password = Some(Secret::new("hunter2".to_string()));
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"connection\""));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_config_error_into_session_error() {
        let err: SessionError = ConfigError::InvalidValue("SSH_SESSION_PORT", "x".into()).into();
        assert!(matches!(err, SessionError::Configuration(_)));
    }
}
