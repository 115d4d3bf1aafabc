//! Configuration validation utilities

use crate::schema::{Config, GatewayMode};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate complete configuration
    pub fn validate(config: &Config) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::validate_jdownloader(config, &mut report);
        Self::validate_replay(config, &mut report);
        Self::validate_server(config, &mut report);
        Self::validate_database(config, &mut report);
        Self::validate_logging(config, &mut report);
        Self::validate_security(config, &mut report);

        report
    }

    fn validate_jdownloader(config: &Config, report: &mut ValidationReport) {
        let jd = &config.jdownloader;

        if jd.mode == GatewayMode::Real && jd.host.trim().is_empty() {
            report.add_error("jdownloader.host", "JDownloader host cannot be empty");
        }

        if jd.port == 0 {
            report.add_error("jdownloader.port", "JDownloader port cannot be 0");
        }

        if jd.poll_interval_ms == 0 {
            report.add_error("jdownloader.poll_interval_ms", "Poll interval cannot be 0");
        } else if jd.poll_interval_ms < 500 {
            report.add_warning(
                "jdownloader.poll_interval_ms",
                "Poll interval below 500ms will hammer the downloader",
            );
        } else if jd.poll_interval_ms > 60_000 {
            report.add_warning(
                "jdownloader.poll_interval_ms",
                "Poll interval above one minute delays replay after reconnects",
            );
        }

        if jd.delivery_timeout_ms == 0 {
            report.add_error("jdownloader.delivery_timeout_ms", "Delivery timeout cannot be 0");
        } else if jd.delivery_timeout_ms > 120_000 {
            report.add_warning("jdownloader.delivery_timeout_ms", "Delivery timeout is very high");
        }

        if jd.mode == GatewayMode::Simulated {
            report.add_warning(
                "jdownloader.mode",
                "Simulated gateway selected, nothing will reach a real JDownloader",
            );
        }
    }

    fn validate_replay(config: &Config, report: &mut ValidationReport) {
        if config.replay.enabled && config.replay.interval_seconds == 0 {
            report.add_error("replay.interval_seconds", "Replay interval cannot be 0");
        }
    }

    fn validate_server(config: &Config, report: &mut ValidationReport) {
        if config.server.port == 0 {
            report.add_error("server.port", "Server port cannot be 0");
        } else if config.server.port < 1024 {
            report.add_warning("server.port", "Server port is below 1024, may require elevated privileges");
        }

        if config.server.request_timeout_seconds == 0 {
            report.add_error("server.request_timeout_seconds", "Request timeout cannot be 0");
        } else if config.server.request_timeout_seconds * 1000 < config.jdownloader.delivery_timeout_ms {
            report.add_warning(
                "server.request_timeout_seconds",
                "Request timeout is shorter than the delivery timeout, slow deliveries will be cut off",
            );
        }

        if config.server.max_body_size == 0 {
            report.add_error("server.max_body_size", "Max body size cannot be 0");
        }

        if config.server.host.is_empty() {
            report.add_error("server.host", "Server host cannot be empty");
        }
    }

    fn validate_database(config: &Config, report: &mut ValidationReport) {
        if config.database.url.is_empty() {
            report.add_error("database.url", "Database URL cannot be empty");
        } else if !config.database.url.starts_with("sqlite:") {
            report.add_error("database.url", "Only SQLite is supported");
        }

        if config.database.max_connections == 0 {
            report.add_error("database.max_connections", "Max connections cannot be 0");
        }

        if config.database.connection_timeout_seconds == 0 {
            report.add_error("database.connection_timeout_seconds", "Connection timeout cannot be 0");
        }

        if !config.database.wal_mode {
            report.add_warning("database.wal_mode", "WAL disabled, status reads will block on replay writes");
        }
    }

    fn validate_logging(config: &Config, report: &mut ValidationReport) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            report.add_error(
                "logging.level",
                &format!("Invalid log level: {}. Valid levels: {:?}", config.logging.level, valid_levels),
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            report.add_error(
                "logging.format",
                &format!("Invalid log format: {}. Valid formats: {:?}", config.logging.format, valid_formats),
            );
        }
    }

    fn validate_security(config: &Config, report: &mut ValidationReport) {
        match config.security.api_token.as_deref() {
            None => report.add_warning(
                "security.api_token",
                "No API token configured, every endpoint is unauthenticated",
            ),
            Some(token) if token.trim().is_empty() => {
                report.add_error("security.api_token", "API token cannot be blank")
            }
            Some(token) if token.len() < 16 => report.add_warning(
                "security.api_token",
                "API token is short, consider using a longer token",
            ),
            Some(_) => {}
        }
    }
}

/// Validation report containing errors and warnings
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// A validation issue (error or warning)
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn summary(&self) -> String {
        format!("Validation: {} errors, {} warnings", self.errors.len(), self.warnings.len())
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
