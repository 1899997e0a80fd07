//! Configuration validation.

use keel_common::ConfigError;

use crate::schema::KeelConfig;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &KeelConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.server.port == 0 {
        errors.push("server.port must be nonzero".into());
    }
    if config.lsp.port == 0 {
        errors.push("lsp.port must be nonzero".into());
    }
    if config.server.port == config.lsp.port && config.server.bind == config.lsp.bind {
        errors.push(format!(
            "server.port and lsp.port collide on {}:{}",
            config.server.bind, config.server.port
        ));
    }

    validate_dim(&mut errors, "terminal.cols", config.terminal.cols);
    validate_dim(&mut errors, "terminal.rows", config.terminal.rows);

    for (language, spec) in &config.lsp.servers {
        if spec.command.is_empty() {
            errors.push(format!("lsp.servers.{language}.command must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_dim(errors: &mut Vec<String>, name: &str, value: u16) {
    if !(2..=500).contains(&value) {
        errors.push(format!("{name} must be in range 2-500, got {value}"));
    }
}
