//! Error types for the provisioning session.

use thiserror::Error;

use crate::command::CommandError;

/// Errors raised by the provisioning session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when configuration is missing or holds an unusable value.
    #[error("invalid session setting {field}: {reason}")]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
        /// What is wrong and how to fix it.
        reason: String,
    },
    /// Raised when the SSH channel cannot be established.
    #[error("failed to connect to puppetmaster <{host}>: {message}")]
    Connect {
        /// Host that refused or failed the connection.
        host: String,
        /// SSH diagnostic.
        message: String,
    },
    /// Raised when a remote operation is attempted without a channel.
    #[error("no open connection to puppetmaster <{host}>")]
    NotConnected {
        /// Host the session was created for.
        host: String,
    },
    /// Raised when the SSH client itself fails mid-session.
    #[error("<{host}> -- ssh transport failed while running `{command}`: {stderr}")]
    Transport {
        /// Host of the session.
        host: String,
        /// Remote command that was being executed.
        command: String,
        /// Captured SSH diagnostics.
        stderr: String,
    },
    /// Raised when a remote command exits with an unexpected status.
    #[error("<{host}> -- `{command}` exited with status {status_text}: {stderr}")]
    UnexpectedStatus {
        /// Host of the session.
        host: String,
        /// Remote command that was executed.
        command: String,
        /// Human readable exit status.
        status_text: String,
        /// Captured stderr.
        stderr: String,
    },
    /// Raised when listing hostclass templates writes to stderr.
    #[error("<{host}> -- could not list hostclass templates: {stderr}")]
    Listing {
        /// Host of the session.
        host: String,
        /// Captured stderr.
        stderr: String,
    },
    /// Raised when the requested hostclass has no template.
    #[error("<{host}> -- hostclass <{hostclass}> not found!")]
    UnknownHostclass {
        /// Host of the session.
        host: String,
        /// Hostclass that was requested.
        hostclass: String,
    },
    /// Raised when a name is unsafe to embed in remote commands.
    #[error("refusing to use '{name}' as a node or hostclass name")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// Raised when the SSH client cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}
