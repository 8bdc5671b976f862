//! SSH session to the Puppet master.
//!
//! One control-master connection is opened per run and every remote command
//! is multiplexed over it through the system `ssh` client. The session owns
//! the Puppet-side operations: listing hostclass templates, writing node
//! manifests and signing certificate requests. DNS registration builds on
//! [`ProvisioningSession::run_remote`].

use std::ffi::OsString;

use tracing::{debug, info, warn};

use crate::command::{
    CommandOutput, CommandRunner, ProcessCommandRunner, combined_output, describe_status,
};

mod certificate;
mod config;
mod error;
mod key_path;
mod manifest;
pub(crate) mod remote_command;

pub use camino::Utf8PathBuf;
pub use certificate::{CertificateRequest, SigningOutcome, find_certificate_request};
pub use config::{
    DEFAULT_DNS_DATA_FILE, DEFAULT_NODE_NAME_PLACEHOLDER, DEFAULT_NODES_DIR,
    DEFAULT_NODES_MANIFEST, DEFAULT_TEMPLATES_DIR, DnsLockStrategy, SessionConfig,
};
pub use error::SessionError;
pub use key_path::resolve_ssh_path;
pub use manifest::{ManifestOutcome, ManifestStep};

/// Exit status the `ssh` client reserves for its own failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

/// A connection to one Puppet master.
#[derive(Clone, Debug)]
pub struct ProvisioningSession<R: CommandRunner> {
    host: String,
    config: SessionConfig,
    runner: R,
    connected: bool,
}

impl ProvisioningSession<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(
        host: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::new(host, config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> ProvisioningSession<R> {
    /// Creates a disconnected session for `host`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(
        host: impl Into<String>,
        config: SessionConfig,
        runner: R,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            host: host.into(),
            config,
            runner,
            connected: false,
        })
    }

    /// Host this session talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns `true` between a successful [`connect`](Self::connect) and the
    /// next [`disconnect`](Self::disconnect).
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Opens the control-master connection in the background.
    ///
    /// Host keys are checked strictly and authentication is non-interactive.
    /// Calling this on an open session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] when `ssh` cannot be started or the
    /// master connection fails.
    pub fn connect(&mut self) -> Result<(), SessionError> {
        if self.connected {
            warn!(host = %self.host, "already connected to puppetmaster");
            return Ok(());
        }

        let mut args = self.common_ssh_options();
        args.extend(
            ["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-f", "-N"]
                .map(OsString::from),
        );
        args.push(OsString::from(self.destination()));

        let output = self
            .runner
            .run(&self.config.ssh_bin, &args)
            .map_err(|err| SessionError::Connect {
                host: self.host.clone(),
                message: err.to_string(),
            })?;
        if !output.is_success() {
            let message = combined_output(&output);
            return Err(SessionError::Connect {
                host: self.host.clone(),
                message: if message.is_empty() {
                    format!("ssh exited with status {}", describe_status(output.code))
                } else {
                    message
                },
            });
        }

        self.connected = true;
        info!(host = %self.host, "connected to puppetmaster");
        Ok(())
    }

    /// Closes the control-master connection.
    ///
    /// Never fails: closing a session that is not open, or a master that
    /// already went away, only logs a warning.
    pub fn disconnect(&mut self) {
        if !self.connected {
            warn!(host = %self.host, "attempted to close a connection that is not open");
            return;
        }
        self.connected = false;

        let mut args = self.common_ssh_options();
        args.extend(["-O", "exit"].map(OsString::from));
        args.push(OsString::from(self.destination()));

        match self.runner.run(&self.config.ssh_bin, &args) {
            Ok(output) if output.is_success() => {
                info!(host = %self.host, "disconnected from puppetmaster");
            }
            Ok(output) => warn!(
                host = %self.host,
                output = %combined_output(&output),
                "ssh control master did not exit cleanly"
            ),
            Err(err) => warn!(host = %self.host, error = %err, "could not stop ssh control master"),
        }
    }

    /// Runs `remote_command` over the open connection.
    ///
    /// The remote exit status is returned as-is; only failures of the SSH
    /// client itself become errors.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] before
    /// [`connect`](Self::connect), [`SessionError::Runner`] when `ssh` cannot
    /// be started, and [`SessionError::Transport`] when `ssh` reports a
    /// connection failure.
    ///
    /// # Security
    ///
    /// `remote_command` is passed verbatim to the remote shell. Callers must
    /// escape anything derived from input.
    pub fn run_remote(&self, remote_command: &str) -> Result<CommandOutput, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected {
                host: self.host.clone(),
            });
        }

        let mut args = self.common_ssh_options();
        args.extend(["-o", "ControlMaster=no"].map(OsString::from));
        args.push(OsString::from(self.destination()));
        args.push(OsString::from(remote_command));

        debug!(host = %self.host, command = remote_command, "running remote command");
        let output = self.runner.run(&self.config.ssh_bin, &args)?;
        if output.code == Some(SSH_TRANSPORT_FAILURE) {
            return Err(SessionError::Transport {
                host: self.host.clone(),
                command: remote_command.to_owned(),
                stderr: output.stderr.trim().to_owned(),
            });
        }
        Ok(output)
    }

    fn destination(&self) -> String {
        self.config.ssh_user.as_deref().map_or_else(
            || self.host.clone(),
            |user| format!("{user}@{}", self.host),
        )
    }

    fn common_ssh_options(&self) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from("StrictHostKeyChecking=yes"),
        ];

        let home = std::env::var_os("HOME");
        if let Some(ref known_hosts) = self.config.ssh_known_hosts_file {
            let mut option = OsString::from("UserKnownHostsFile=");
            option.push(resolve_ssh_path(known_hosts, home.as_deref()));
            args.push(OsString::from("-o"));
            args.push(option);
        }

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            args.push(OsString::from("-i"));
            args.push(resolve_ssh_path(identity_file, home.as_deref()));
        }

        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "ControlPath={}",
            self.config.ssh_control_path
        )));
        args
    }

    /// Runs a remote step and reports its stderr when it failed.
    ///
    /// A step fails when it exits non-zero or writes anything to stderr.
    fn run_step(&self, remote_command: &str) -> Result<Option<String>, SessionError> {
        let output = self.run_remote(remote_command)?;
        let stderr = output.stderr.trim();
        if output.is_success() && stderr.is_empty() {
            return Ok(None);
        }
        Ok(Some(if stderr.is_empty() {
            format!(
                "exited with status {}",
                describe_status(output.code)
            )
        } else {
            stderr.to_owned()
        }))
    }
}
