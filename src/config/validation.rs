//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;

/// Validate the configuration.
///
/// Checks for:
/// - Valid log level
/// - Exit codes in 0-255 and a non-zero shutdown deadline
/// - A non-zero supervisor grace period
/// - Unique, non-empty hook names
/// - Non-empty hook commands and non-zero hook timeouts
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing the problem.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = config.shutdown.validate();

    if config.supervisor.grace_period.is_zero() {
        errors.push("supervisor grace_period must be greater than zero".to_string());
    }

    let mut hook_names = HashSet::new();

    for hook in &config.hooks {
        if hook.name.is_empty() {
            errors.push("hook name cannot be empty".to_string());
        }

        if !hook_names.insert(hook.name.as_str()) {
            errors.push(format!("duplicate hook name: {}", hook.name));
        }

        if hook.command.trim().is_empty() {
            errors.push(format!("hook '{}' has an empty command", hook.name));
        }

        if hook.timeout.is_some_and(|t| t.is_zero()) {
            errors.push(format!(
                "hook '{}' has a zero timeout (omit it to disable)",
                hook.name
            ));
        }
    }

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
