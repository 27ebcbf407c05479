//! Semantic configuration validation.
//!
//! Serde handles the syntactic layer; this module checks that the values
//! make sense before the config is accepted into the system. All problems
//! are reported, not just the first.

use thiserror::Error;

use crate::config::schema::ManagerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("paths.{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("commands.{0} must name a program to run")]
    EmptyCommand(&'static str),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.paths.sites_available.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("sites_available"));
    }
    if config.paths.sites_enabled.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("sites_enabled"));
    }
    if config.paths.log_dir.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("log_dir"));
    }
    if config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("store.path"));
    }

    if config.commands.check.is_empty() {
        errors.push(ValidationError::EmptyCommand("check"));
    }
    if config.commands.reload.is_empty() {
        errors.push(ValidationError::EmptyCommand("reload"));
    }

    if config.timeouts.check_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("check_secs"));
    }
    if config.timeouts.reload_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("reload_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
