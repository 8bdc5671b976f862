//! SSH and Puppet master layout settings loaded via `ortho-config`.
//!
//! The defaults describe the Puppet master layout the templates and node
//! manifests live in, and the SSH options used to reach it.

use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use super::SessionError;

/// Default directory holding `<hostclass>.template` files.
pub const DEFAULT_TEMPLATES_DIR: &str = "/etc/puppet/common/templates";

/// Default directory holding one `<dns_name>.pp` manifest per node.
pub const DEFAULT_NODES_DIR: &str = "/etc/puppet/common/nodes.d";

/// Default aggregate manifest touched after adding a node.
pub const DEFAULT_NODES_MANIFEST: &str = "/etc/puppet/common/nodes.pp";

/// Default djbdns data file on the Puppet master.
pub const DEFAULT_DNS_DATA_FILE: &str = "/etc/puppet/modules/ndjbdns/files/data";

/// Placeholder replaced with the node's DNS name in new manifests.
pub const DEFAULT_NODE_NAME_PLACEHOLDER: &str = "__AWS_NODENAME";

/// SSH, Puppet and DNS settings for the provisioning session.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "EC2DEPLOY_SESSION",
    discovery(
        app_name = "ec2deploy",
        env_var = "EC2DEPLOY_CONFIG_PATH",
        config_file_name = "ec2deploy.toml",
        dotfile_name = ".ec2deploy.toml",
        project_file_name = "ec2deploy.toml"
    )
)]
pub struct SessionConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Remote user; when absent SSH picks the user from its own config.
    pub ssh_user: Option<String>,
    /// Private key used for authentication. Supports tilde expansion.
    pub ssh_identity_file: Option<String>,
    /// Known hosts file override. Host keys are always checked strictly.
    pub ssh_known_hosts_file: Option<String>,
    /// Control socket shared by every command of one session.
    #[ortho_config(default = "~/.ssh/ec2-deploy-%C".to_owned())]
    pub ssh_control_path: String,
    /// Directory holding `<hostclass>.template` files.
    #[ortho_config(default = DEFAULT_TEMPLATES_DIR.to_owned())]
    pub templates_dir: String,
    /// Directory receiving one manifest per node.
    #[ortho_config(default = DEFAULT_NODES_DIR.to_owned())]
    pub nodes_dir: String,
    /// Aggregate manifest touched so the master rereads the nodes directory.
    #[ortho_config(default = DEFAULT_NODES_MANIFEST.to_owned())]
    pub nodes_manifest: String,
    /// Path to the `puppet` executable on the master.
    #[ortho_config(default = "/usr/bin/puppet".to_owned())]
    pub puppet_bin: String,
    /// Whether Puppet certificate commands run through `sudo -n`.
    #[ortho_config(default = true)]
    pub use_sudo: bool,
    /// Token in templates replaced with the node's DNS name.
    #[ortho_config(default = DEFAULT_NODE_NAME_PLACEHOLDER.to_owned())]
    pub node_name_placeholder: String,
    /// Seconds to pause between certificate request listings.
    #[ortho_config(default = 10)]
    pub certificate_poll_interval_secs: u32,
    /// How appends to the DNS data file are guarded: `none` or
    /// `compare-and-swap`.
    #[ortho_config(default = "none".to_owned())]
    pub dns_lock_strategy: String,
}

/// Guard applied when appending to the shared DNS data file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DnsLockStrategy {
    /// Read, check and append without any lock. Two concurrent runs can
    /// both pass the duplicate check before either writes.
    #[default]
    None,
    /// Append under `flock` only while the file still has the length that
    /// was read; otherwise re-read and check again.
    CompareAndSwap,
}

impl FromStr for DnsLockStrategy {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "none" => Ok(Self::None),
            "compare-and-swap" | "cas" => Ok(Self::CompareAndSwap),
            other => Err(SessionError::InvalidConfig {
                field: String::from("dns_lock_strategy"),
                reason: format!("unknown strategy '{other}', expected none or compare-and-swap"),
            }),
        }
    }
}

impl SessionConfig {
    /// Loads configuration using defaults, configuration files, and
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SessionError> {
        Self::load_from_iter([std::ffi::OsString::from("ec2-deploy")]).map_err(|err| {
            SessionError::InvalidConfig {
                field: String::from("session"),
                reason: err.to_string(),
            }
        })
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when a required field is empty
    /// or holds an unusable value.
    pub fn validate(&self) -> Result<(), SessionError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_optional_value(self.ssh_user.as_deref(), "ssh_user")?;
        Self::require_optional_value(self.ssh_identity_file.as_deref(), "ssh_identity_file")?;
        Self::require_optional_value(self.ssh_known_hosts_file.as_deref(), "ssh_known_hosts_file")?;
        Self::require_value(&self.ssh_control_path, "ssh_control_path")?;
        Self::require_value(&self.templates_dir, "templates_dir")?;
        Self::require_value(&self.nodes_dir, "nodes_dir")?;
        Self::require_value(&self.nodes_manifest, "nodes_manifest")?;
        Self::require_value(&self.puppet_bin, "puppet_bin")?;
        Self::require_value(&self.node_name_placeholder, "node_name_placeholder")?;
        if !self
            .node_name_placeholder
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(SessionError::InvalidConfig {
                field: String::from("node_name_placeholder"),
                reason: String::from("only ASCII letters, digits and '_' are allowed"),
            });
        }
        if self.certificate_poll_interval_secs == 0 {
            return Err(SessionError::InvalidConfig {
                field: String::from("certificate_poll_interval_secs"),
                reason: String::from("must be greater than zero"),
            });
        }
        self.lock_strategy()?;
        Ok(())
    }

    /// Parsed DNS lock strategy.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] for unknown strategy names.
    pub fn lock_strategy(&self) -> Result<DnsLockStrategy, SessionError> {
        self.dns_lock_strategy.parse()
    }

    /// Pause between certificate request listings.
    #[must_use]
    pub fn certificate_poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.certificate_poll_interval_secs))
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SessionError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SessionError::InvalidConfig {
                field: field.to_owned(),
                reason: format!(
                    "set EC2DEPLOY_SESSION_{} or add {field} to [session] in ec2deploy.toml",
                    field.to_uppercase()
                ),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SessionError> {
        Self::require_optional_value(Some(value), field)
    }
}
