//! Node manifests created from hostclass templates.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use super::{ProvisioningSession, SessionError, remote_command};
use crate::command::{CommandRunner, describe_status};
use crate::instance::{is_valid_dns_name, validate_hostclass};

/// Suffix identifying hostclass templates on the master.
const TEMPLATE_SUFFIX: &str = ".template";

/// Remote step of manifest creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ManifestStep {
    /// Copying the hostclass template into place.
    Copy,
    /// Writing the node name into the copied manifest.
    Substitute,
    /// Touching the aggregate manifest so the master rereads it.
    Touch,
}

impl fmt::Display for ManifestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Copy => "copy template",
            Self::Substitute => "substitute node name",
            Self::Touch => "touch nodes manifest",
        };
        f.write_str(label)
    }
}

/// Result of [`ProvisioningSession::provision_node_manifest`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ManifestOutcome {
    /// A new manifest was written.
    Created {
        /// Manifest path on the master.
        path: Utf8PathBuf,
    },
    /// A manifest for the node already existed and was left untouched.
    AlreadyExists {
        /// Manifest path on the master.
        path: Utf8PathBuf,
    },
    /// A remote step reported an error; later steps were not run.
    Failed {
        /// Step that failed.
        step: ManifestStep,
        /// Diagnostic captured from the step.
        stderr: String,
    },
}

impl<R: CommandRunner> ProvisioningSession<R> {
    /// Lists hostclasses that have a template on the master.
    ///
    /// Names are returned in listing order with the `.template` suffix
    /// stripped; other files in the directory are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Listing`] when the listing fails or writes to
    /// stderr, and propagates channel errors from
    /// [`run_remote`](Self::run_remote).
    pub fn list_available_hostclasses(&self) -> Result<Vec<String>, SessionError> {
        let output =
            self.run_remote(&remote_command::list_templates(&self.config.templates_dir))?;
        let stderr = output.stderr.trim();
        if !output.is_success() || !stderr.is_empty() {
            return Err(SessionError::Listing {
                host: self.host.clone(),
                stderr: if stderr.is_empty() {
                    format!("exited with status {}", describe_status(output.code))
                } else {
                    stderr.to_owned()
                },
            });
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.trim().strip_suffix(TEMPLATE_SUFFIX))
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect())
    }

    /// Creates `<nodes_dir>/<dns_name>.pp` from the hostclass template.
    ///
    /// An existing manifest is never overwritten. Step failures are reported
    /// through [`ManifestOutcome::Failed`] rather than as errors so the
    /// caller can carry on with the remaining provisioning.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidName`] for unsafe names,
    /// [`SessionError::UnknownHostclass`] when no template exists, and
    /// channel errors from [`run_remote`](Self::run_remote).
    pub fn provision_node_manifest(
        &self,
        dns_name: &str,
        hostclass: &str,
    ) -> Result<ManifestOutcome, SessionError> {
        if !is_valid_dns_name(dns_name) {
            return Err(SessionError::InvalidName {
                name: dns_name.to_owned(),
            });
        }
        if validate_hostclass(hostclass).is_err() {
            return Err(SessionError::InvalidName {
                name: hostclass.to_owned(),
            });
        }

        let hostclasses = self.list_available_hostclasses()?;
        if !hostclasses.iter().any(|known| known == hostclass) {
            return Err(SessionError::UnknownHostclass {
                host: self.host.clone(),
                hostclass: hostclass.to_owned(),
            });
        }

        let manifest = Utf8Path::new(&self.config.nodes_dir).join(format!("{dns_name}.pp"));
        if self.path_exists(&manifest)? {
            warn!(path = %manifest, "node manifest already exists; not overwriting");
            return Ok(ManifestOutcome::AlreadyExists { path: manifest });
        }

        let template =
            Utf8Path::new(&self.config.templates_dir).join(format!("{hostclass}{TEMPLATE_SUFFIX}"));
        let steps = [
            (
                ManifestStep::Copy,
                remote_command::copy_with_backup(&template, &manifest),
            ),
            (
                ManifestStep::Substitute,
                remote_command::substitute_placeholder(
                    &self.config.node_name_placeholder,
                    dns_name,
                    &manifest,
                ),
            ),
            (
                ManifestStep::Touch,
                remote_command::touch(&self.config.nodes_manifest),
            ),
        ];
        for (step, command) in steps {
            if let Some(stderr) = self.run_step(&command)? {
                warn!(host = %self.host, %step, %stderr, "node manifest step failed");
                return Ok(ManifestOutcome::Failed { step, stderr });
            }
        }

        info!(path = %manifest, hostclass, "created node manifest");
        Ok(ManifestOutcome::Created { path: manifest })
    }

    /// Returns whether `path` exists on the master.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnexpectedStatus`] when `test` exits with
    /// anything other than 0 or 1.
    pub(crate) fn path_exists(&self, path: &Utf8Path) -> Result<bool, SessionError> {
        let command = remote_command::path_exists(path);
        let output = self.run_remote(&command)?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            other => Err(SessionError::UnexpectedStatus {
                host: self.host.clone(),
                command,
                status_text: describe_status(other),
                stderr: output.stderr.trim().to_owned(),
            }),
        }
    }
}
