//! Waiting for and signing a node's certificate request.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{ProvisioningSession, SessionError, remote_command};
use crate::command::{CommandRunner, combined_output};
use crate::instance::is_valid_dns_name;
use crate::retry::RetryPolicy;

/// A pending request as shown by `puppet cert list`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateRequest {
    /// Certificate name, without quotes.
    pub name: String,
    /// Digest text following the name, when present.
    pub fingerprint: Option<String>,
}

/// Result of [`ProvisioningSession::sign_certificate_request`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SigningOutcome {
    /// The request appeared and was signed.
    Signed {
        /// Request that was signed.
        request: CertificateRequest,
    },
    /// The request appeared but the sign command reported an error.
    SignFailed {
        /// Request that could not be signed.
        request: CertificateRequest,
        /// Diagnostic from the sign command.
        stderr: String,
    },
    /// No matching request appeared within the polling budget.
    TimedOut {
        /// Time spent polling.
        waited: Duration,
    },
}

/// Finds the pending request for `name` in `puppet cert list` output.
///
/// Only an exact match on the quoted first token counts, so a request for
/// `web-1.foo.bar` never matches `web-10.foo.bar`.
///
/// ```
/// # use ec2_deploy::session::find_certificate_request;
/// let listing = "  \"web-10-0-0-5.us-east-1a.foo.bar\" (SHA256) AB:CD\n";
/// let request = find_certificate_request(listing, "web-10-0-0-5.us-east-1a.foo.bar")
///     .expect("request should be listed");
/// assert_eq!(request.fingerprint.as_deref(), Some("(SHA256) AB:CD"));
/// ```
#[must_use]
pub fn find_certificate_request(listing: &str, name: &str) -> Option<CertificateRequest> {
    let quoted = format!("\"{name}\"");
    listing.lines().find_map(|line| {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != quoted {
            return None;
        }
        let rest = tokens.collect::<Vec<_>>().join(" ");
        Some(CertificateRequest {
            name: name.to_owned(),
            fingerprint: (!rest.is_empty()).then_some(rest),
        })
    })
}

impl<R: CommandRunner> ProvisioningSession<R> {
    /// Polls the master's pending requests until `name` appears, then signs
    /// it exactly once.
    ///
    /// At least one listing is always made. A listing that fails, whether
    /// the remote command exits non-zero or the SSH transport drops, is
    /// treated like an empty one and polling continues. Running out of time is not an
    /// error; it is reported as [`SigningOutcome::TimedOut`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidName`] for unsafe names, and
    /// [`SessionError::NotConnected`] or [`SessionError::Runner`] when the
    /// channel is closed or `ssh` cannot be started. Transport errors from
    /// the sign command itself are returned too.
    pub async fn sign_certificate_request(
        &self,
        name: &str,
        policy: RetryPolicy,
    ) -> Result<SigningOutcome, SessionError> {
        if !is_valid_dns_name(name) {
            return Err(SessionError::InvalidName {
                name: name.to_owned(),
            });
        }

        let started = Instant::now();
        let list_command = remote_command::puppet_cert(&self.config, &["list"]);
        info!(
            name,
            timeout_secs = policy.timeout.as_secs(),
            "waiting for certificate request"
        );

        let deadline = policy.deadline_from(started);
        loop {
            match self.run_remote(&list_command) {
                Ok(output) if output.is_success() => {
                    if let Some(request) = find_certificate_request(&output.stdout, name) {
                        return self.sign(request);
                    }
                    debug!(name, "certificate request not listed yet");
                }
                Ok(output) => debug!(
                    output = %combined_output(&output),
                    "listing certificate requests failed; retrying"
                ),
                Err(SessionError::Transport { stderr, .. }) => warn!(
                    host = %self.host,
                    %stderr,
                    "connection error while listing certificate requests; retrying"
                ),
                Err(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                let waited = started.elapsed();
                warn!(
                    name,
                    waited_secs = waited.as_secs(),
                    "certificate request did not appear; sign it manually once the node checks in"
                );
                return Ok(SigningOutcome::TimedOut { waited });
            }
            sleep(policy.interval).await;
        }
    }

    fn sign(&self, request: CertificateRequest) -> Result<SigningOutcome, SessionError> {
        let command = remote_command::puppet_cert(&self.config, &["sign", &request.name]);
        if let Some(stderr) = self.run_step(&command)? {
            warn!(name = %request.name, %stderr, "signing certificate request failed");
            return Ok(SigningOutcome::SignFailed { request, stderr });
        }
        info!(
            name = %request.name,
            fingerprint = request.fingerprint.as_deref().unwrap_or("unknown"),
            "signed certificate request"
        );
        Ok(SigningOutcome::Signed { request })
    }
}
