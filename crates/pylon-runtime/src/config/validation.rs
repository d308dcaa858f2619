//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, PluginsConfig, PylonConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &PylonConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_plugins_config(&config.plugins)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.command_prefix.is_empty() {
        return Err(ConfigError::validation("bot.command_prefix must not be empty"));
    }
    if bot.command_prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(format!(
            "bot.command_prefix must not contain whitespace: {:?}",
            bot.command_prefix
        )));
    }
    if bot.default_language.trim().is_empty() {
        return Err(ConfigError::validation(
            "bot.default_language must not be empty",
        ));
    }
    if bot.secrets.iter().any(String::is_empty) {
        return Err(ConfigError::validation("bot.secrets must not contain empty strings"));
    }
    Ok(())
}

fn validate_plugins_config(plugins: &PluginsConfig) -> ConfigResult<()> {
    if plugins.disabled.iter().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::validation(
            "plugins.disabled must not contain empty names",
        ));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File
        && logging.file_path.as_ref().is_some_and(|p| p.file_name().is_none())
    {
        return Err(ConfigError::validation(
            "logging.file_path must name a file",
        ));
    }
    Ok(())
}
