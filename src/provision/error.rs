//! Fatal errors for a provisioning run.

use thiserror::Error;

use crate::instance::HostclassError;
use crate::launch::LaunchError;
use crate::resolve::ResolveError;
use crate::session::SessionError;

/// Errors that end a provisioning run with a non-zero exit.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// The hostclass cannot be used as a template or DNS label.
    #[error(transparent)]
    Hostclass(#[from] HostclassError),
    /// The instance could not be launched.
    #[error(transparent)]
    Launch(#[from] LaunchError),
    /// The launched instance could not be described.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The Puppet master step failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
