//! End-to-end provisioning: launch, discover, register with Puppet and DNS.
//!
//! Only launch and discovery failures, connection failures and unknown
//! hostclasses end a run. Manifest step failures, certificate timeouts and
//! DNS problems are logged and recorded in the [`ProvisionReport`].

mod error;

use std::fmt::Display;
use std::net::Ipv4Addr;

use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::config::DeployConfig;
use crate::dns::{DnsError, DnsRecordOutcome, DnsRegistrar};
use crate::instance::{InstanceDescriptor, validate_hostclass};
use crate::launch::{LaunchOptions, Launcher};
use crate::resolve::{AttributeResolver, ResolverSettings};
use crate::retry::RetryPolicy;
use crate::session::{
    DnsLockStrategy, ManifestOutcome, ProvisioningSession, SessionConfig, SessionError,
    SigningOutcome,
};

pub use error::ProvisionError;

/// Which Puppet master steps to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProvisionSteps {
    /// Create the node manifest and sign the node's certificate.
    pub manifest: bool,
    /// Add an address record to the DNS data file.
    pub dns: bool,
}

impl Default for ProvisionSteps {
    fn default() -> Self {
        Self {
            manifest: true,
            dns: true,
        }
    }
}

/// Everything one run needs from the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// AMI to launch.
    pub image_id: String,
    /// Hostclass of the new node.
    pub hostclass: String,
    /// Options forwarded to the launch tool.
    pub launch_options: LaunchOptions,
    /// Puppet master to register the node with; `None` skips registration.
    pub puppetmaster: Option<String>,
    /// Puppet master steps to run.
    pub steps: ProvisionSteps,
    /// djbdns data file on the Puppet master.
    pub dns_data_file: String,
    /// Budget for the node's certificate request to appear.
    pub certificate_policy: RetryPolicy,
}

/// What a run did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionReport {
    /// The launched instance.
    pub instance: InstanceDescriptor,
    /// Manifest step result, when it ran.
    pub manifest: Option<ManifestOutcome>,
    /// Certificate step result, when it ran.
    pub certificate: Option<SigningOutcome>,
    /// DNS step result, when it ran. Errors here are not fatal.
    pub dns: Option<Result<DnsRecordOutcome, DnsError>>,
}

impl ProvisionReport {
    const fn new(instance: InstanceDescriptor) -> Self {
        Self {
            instance,
            manifest: None,
            certificate: None,
            dns: None,
        }
    }

    /// Renders `Created EC2 Instance: <id>, <dns>, <ip>`.
    ///
    /// Attributes that were never discovered show as `unknown`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        format!(
            "Created EC2 Instance: {}, {}, {}",
            self.instance.instance_id,
            or_unknown(self.instance.dns_name.as_ref()),
            or_unknown(self.instance.ip_address.as_ref()),
        )
    }
}

fn or_unknown<T: Display>(value: Option<&T>) -> String {
    value.map_or_else(|| String::from("unknown"), ToString::to_string)
}

/// Runs the launch, discovery and Puppet master steps in order.
#[derive(Clone, Debug)]
pub struct ProvisionOrchestrator<R: CommandRunner + Clone> {
    launcher: Launcher<R>,
    resolver: AttributeResolver<R>,
    session_config: SessionConfig,
    registrar: DnsRegistrar,
    runner: R,
}

impl<R: CommandRunner + Clone> ProvisionOrchestrator<R> {
    /// Wires the steps from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when the DNS lock strategy is
    /// not recognised.
    pub fn new(
        config: &DeployConfig,
        session_config: SessionConfig,
        runner: R,
    ) -> Result<Self, SessionError> {
        let strategy: DnsLockStrategy = session_config.lock_strategy()?;
        let settings = ResolverSettings {
            describe_interfaces_bin: config.describe_interfaces_bin.clone(),
            describe_subnets_bin: config.describe_subnets_bin.clone(),
            domain_suffix: config.domain_suffix.clone(),
        };
        Ok(Self {
            launcher: Launcher::new(
                config.ec2run_bin.clone(),
                config.ec2run_help_bin.clone(),
                runner.clone(),
            ),
            resolver: AttributeResolver::new(settings, config.attribute_policy(), runner.clone()),
            session_config,
            registrar: DnsRegistrar::new(strategy),
            runner,
        })
    }

    /// Replaces the attribute discovery budget.
    #[must_use]
    pub fn with_attribute_policy(self, policy: RetryPolicy) -> Self {
        Self {
            resolver: self.resolver.with_policy(policy),
            ..self
        }
    }

    /// Runs one provisioning request.
    ///
    /// Once the Puppet master connection is open it is closed again on every
    /// path, including fatal errors.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] for the fatal failures listed in the
    /// module documentation.
    pub async fn execute(&self, request: &ProvisionRequest) -> Result<ProvisionReport, ProvisionError> {
        validate_hostclass(&request.hostclass)?;

        let launch_output = self
            .launcher
            .launch(&request.launch_options, &request.image_id)?;
        let instance = self
            .resolver
            .resolve(&launch_output, &request.hostclass)
            .await?;
        let mut report = ProvisionReport::new(instance);
        info!("{}", report.summary_line());

        let Some(host) = request.puppetmaster.as_deref() else {
            info!("--puppetmaster not specified; skipping Puppet and DNS provisioning");
            return Ok(report);
        };
        if !request.steps.manifest && !request.steps.dns {
            info!("Puppet and DNS provisioning both skipped");
            return Ok(report);
        }
        let (Some(dns_name), Some(ip)) = (
            report.instance.dns_name.clone(),
            report.instance.ip_address,
        ) else {
            warn!(
                instance_id = %report.instance.instance_id,
                "instance DNS name is unknown; skipping Puppet and DNS provisioning"
            );
            return Ok(report);
        };

        let mut session =
            ProvisioningSession::new(host, self.session_config.clone(), self.runner.clone())?;
        session.connect()?;
        let outcome = self
            .provision_connected(&session, request, &dns_name, ip, &mut report)
            .await;
        session.disconnect();
        outcome.map(|()| report)
    }

    async fn provision_connected(
        &self,
        session: &ProvisioningSession<R>,
        request: &ProvisionRequest,
        dns_name: &str,
        ip: Ipv4Addr,
        report: &mut ProvisionReport,
    ) -> Result<(), ProvisionError> {
        if request.steps.manifest {
            info!(host = session.host(), "executing Puppet provisioning tasks");
            report.manifest = Some(session.provision_node_manifest(dns_name, &request.hostclass)?);
            report.certificate = Some(
                session
                    .sign_certificate_request(dns_name, request.certificate_policy)
                    .await?,
            );
        }

        if request.steps.dns {
            info!(host = session.host(), "executing DNS provisioning tasks");
            let result =
                self.registrar
                    .add_dns_record(session, dns_name, ip, &request.dns_data_file);
            if let Err(ref err) = result {
                warn!(host = session.host(), error = %err, "DNS provisioning failed");
            }
            report.dns = Some(result);
        }
        Ok(())
    }
}

/// Connects, lists the available hostclasses and disconnects.
///
/// # Errors
///
/// Returns [`SessionError`] when the connection or the listing fails. The
/// connection is closed before returning either way.
pub fn list_hostclasses<R: CommandRunner>(
    session: &mut ProvisioningSession<R>,
) -> Result<Vec<String>, SessionError> {
    session.connect()?;
    let listed = session.list_available_hostclasses();
    session.disconnect();
    listed
}
