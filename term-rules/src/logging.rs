//! Logging configuration for the rules engine.
//!
//! The engine emits `tracing` events and spans; it never installs a
//! subscriber on its own. Applications either bring their own subscriber or
//! call [`setup::init_logging`].

/// Verbosity knobs consulted by the validator while it runs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to log every evaluated check
    pub log_check_details: bool,
    /// Whether to log table materialization and casting
    pub log_table_operations: bool,
    /// Whether to log a summary of each appended report
    pub log_reports: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_check_details: false,
            log_table_operations: true,
            log_reports: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Logs everything, with long field values.
    pub fn verbose() -> Self {
        Self {
            log_check_details: true,
            log_table_operations: true,
            log_reports: true,
            max_field_length: 1024,
        }
    }

    /// No per-check, table or report logging.
    pub fn production() -> Self {
        Self {
            log_check_details: false,
            log_table_operations: false,
            log_reports: false,
            max_field_length: 128,
        }
    }
}

/// Logs a check-level event when check details are enabled.
#[macro_export]
macro_rules! log_check {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_check_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a table operation when table logging is enabled.
#[macro_export]
macro_rules! log_table_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_table_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a value to at most `max_length` characters.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    match value.char_indices().nth(max_length) {
        None => value.to_string(),
        Some((end, _)) => format!("{}...(truncated)", &value[..end]),
    }
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Configuration of the installed subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for the `term_rules` target
        pub rules_level: Level,
        /// Whether to emit JSON lines
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                rules_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                rules_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                rules_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_rules_level(mut self, level: Level) -> Self {
            self.rules_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive string, e.g. `info,term_rules=debug`.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_rules={}",
                    self.level.as_str().to_lowercase(),
                    self.rules_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter. Fails if a
    /// global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_rules::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        let default = LogConfig::default();
        assert!(!default.log_check_details);
        assert_eq!(default.max_field_length, 256);

        let verbose = LogConfig::verbose();
        assert!(verbose.log_check_details);
        assert_eq!(verbose.max_field_length, 1024);

        let production = LogConfig::production();
        assert!(!production.log_reports);
        assert_eq!(production.max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text", 10),
            "this is a ...(truncated)"
        );
        assert_eq!(truncate_field("çàéèü", 2), "çà...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        assert_eq!(LoggingConfig::default().env_filter(), "info,term_rules=debug");
        assert_eq!(
            LoggingConfig::production().env_filter(),
            "warn,term_rules=info"
        );
        assert_eq!(
            LoggingConfig::default()
                .with_env_filter("term_rules=trace")
                .env_filter(),
            "term_rules=trace"
        );
    }
}
