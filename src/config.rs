//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Tool locations and naming settings for the launch and discovery steps.
///
/// Values merge defaults, `ec2deploy.toml`, and `EC2DEPLOY_*` environment
/// variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "EC2DEPLOY",
    discovery(
        app_name = "ec2deploy",
        env_var = "EC2DEPLOY_CONFIG_PATH",
        config_file_name = "ec2deploy.toml",
        dotfile_name = ".ec2deploy.toml",
        project_file_name = "ec2deploy.toml"
    )
)]
pub struct DeployConfig {
    /// Command used to launch instances.
    #[ortho_config(default = "ec2run".to_owned())]
    pub ec2run_bin: String,
    /// Command that prints the launcher's own option help.
    #[ortho_config(default = "ec2-run-instances".to_owned())]
    pub ec2run_help_bin: String,
    /// Command listing network interfaces.
    #[ortho_config(default = "ec2-describe-network-interfaces".to_owned())]
    pub describe_interfaces_bin: String,
    /// Command describing subnets.
    #[ortho_config(default = "ec2-describe-subnets".to_owned())]
    pub describe_subnets_bin: String,
    /// Domain appended to generated instance names.
    #[ortho_config(default = "foo.bar".to_owned())]
    pub domain_suffix: String,
    /// Seconds to keep looking for the instance's IP and subnet.
    #[ortho_config(default = 60)]
    pub attribute_timeout_secs: u32,
    /// Seconds to pause between network interface lookups.
    #[ortho_config(default = 5)]
    pub attribute_poll_interval_secs: u32,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to ec2deploy.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl DeployConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(metadata.missing());
        }
        Ok(())
    }

    fn require_positive(value: u32, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{} must be greater than zero: check {} or {} in ec2deploy.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ec2-deploy")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidValue`] when a duration is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.ec2run_bin,
            &FieldMetadata::new("launch command", "EC2DEPLOY_EC2RUN_BIN", "ec2run_bin"),
        )?;
        Self::require_field(
            &self.ec2run_help_bin,
            &FieldMetadata::new(
                "launch help command",
                "EC2DEPLOY_EC2RUN_HELP_BIN",
                "ec2run_help_bin",
            ),
        )?;
        Self::require_field(
            &self.describe_interfaces_bin,
            &FieldMetadata::new(
                "network interface command",
                "EC2DEPLOY_DESCRIBE_INTERFACES_BIN",
                "describe_interfaces_bin",
            ),
        )?;
        Self::require_field(
            &self.describe_subnets_bin,
            &FieldMetadata::new(
                "subnet command",
                "EC2DEPLOY_DESCRIBE_SUBNETS_BIN",
                "describe_subnets_bin",
            ),
        )?;
        Self::require_field(
            &self.domain_suffix,
            &FieldMetadata::new("domain suffix", "EC2DEPLOY_DOMAIN_SUFFIX", "domain_suffix"),
        )?;
        Self::require_positive(
            self.attribute_timeout_secs,
            &FieldMetadata::new(
                "attribute timeout",
                "EC2DEPLOY_ATTRIBUTE_TIMEOUT_SECS",
                "attribute_timeout_secs",
            ),
        )?;
        Self::require_positive(
            self.attribute_poll_interval_secs,
            &FieldMetadata::new(
                "attribute poll interval",
                "EC2DEPLOY_ATTRIBUTE_POLL_INTERVAL_SECS",
                "attribute_poll_interval_secs",
            ),
        )?;
        Ok(())
    }

    /// Polling policy for network attribute discovery.
    #[must_use]
    pub fn attribute_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_secs(u64::from(self.attribute_timeout_secs)),
            Duration::from_secs(u64::from(self.attribute_poll_interval_secs)),
        )
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds a value that cannot be used.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
