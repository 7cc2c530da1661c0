//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("listen.address and websocket.address must differ, both are {0}")]
    AddressClash(std::net::SocketAddr),
    #[error("websocket.max_message_bytes must be greater than zero")]
    ZeroMessageLimit,
    #[error("websocket.allow_origins contains an empty entry")]
    EmptyOrigin,
    #[error("relay.{0} must be greater than zero")]
    ZeroRelaySetting(&'static str),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    // Port 0 means "any free port" and never clashes.
    if config.listen.address == config.websocket.address && config.listen.address.port() != 0 {
        errors.push(ValidationError::AddressClash(config.listen.address));
    }

    if config.websocket.max_message_bytes == 0 {
        errors.push(ValidationError::ZeroMessageLimit);
    }
    if config
        .websocket
        .allow_origins
        .iter()
        .any(|o| o.trim().is_empty())
    {
        errors.push(ValidationError::EmptyOrigin);
    }

    let relay = &config.relay;
    if relay.send_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRelaySetting("send_timeout_ms"));
    }
    if relay.outbound_queue == 0 {
        errors.push(ValidationError::ZeroRelaySetting("outbound_queue"));
    }
    if relay.handshake_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRelaySetting("handshake_timeout_ms"));
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    fn minimal_valid_config() -> String {
        r#"
[server]
name = "relay.test"

[listen]
address = "127.0.0.1:8080"

[websocket]
address = "127.0.0.1:8081"

[database]
path = ":memory:"
"#
        .to_string()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&parse(&minimal_valid_config())).is_ok());
    }

    #[test]
    fn test_empty_server_name_fails() {
        let toml = minimal_valid_config().replace("relay.test", "  ");
        let errors = validate(&parse(&toml)).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingServerName)));
    }

    #[test]
    fn test_shared_address_fails() {
        let toml = minimal_valid_config().replace("8081", "8080");
        let errors = validate(&parse(&toml)).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::AddressClash(_))));
    }

    #[test]
    fn test_ephemeral_ports_do_not_clash() {
        let toml = minimal_valid_config()
            .replace("8080", "0")
            .replace("8081", "0");
        assert!(validate(&parse(&toml)).is_ok());
    }

    #[test]
    fn test_blank_origin_fails() {
        let toml = minimal_valid_config().replace(
            "address = \"127.0.0.1:8081\"",
            "address = \"127.0.0.1:8081\"\nallow_origins = [\"https://ok.example\", \"\"]",
        );
        let errors = validate(&parse(&toml)).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyOrigin)));
    }

    #[test]
    fn test_missing_database_directory_fails() {
        let toml = minimal_valid_config().replace(":memory:", "/nonexistent/dir/chat.db");
        let errors = validate(&parse(&toml)).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::DatabasePathInvalid(_)))
        );
    }
}
