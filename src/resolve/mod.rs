//! Post-launch discovery of an instance's network attributes.
//!
//! The resolver only ever runs the two read-only describe commands: it
//! polls the interface listing until an IP and subnet appear, looks up the
//! subnet's availability zone once, and derives the instance's DNS name.

mod parse;

use std::ffi::OsString;
use std::net::Ipv4Addr;
use std::time::Instant;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::command::{CommandError, CommandOutput, CommandRunner, combined_output, describe_status};
use crate::instance::InstanceDescriptor;
use crate::retry::RetryPolicy;

pub use parse::{parse_availability_zone, parse_instance_id, parse_private_ip, parse_subnet_id};

/// Errors that end attribute discovery.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ResolveError {
    /// A describe command could not be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
    /// The launch output did not name an instance.
    #[error("launch output did not provide an instance ID. Output follows.\n---\n{output}\n---")]
    MissingInstanceId {
        /// Launch output that was searched.
        output: String,
    },
    /// A describe command exited unsuccessfully.
    #[error("{program} exited with status {status_text}. Output follows.\n---\n{output}\n---")]
    DescribeFailed {
        /// Program that was executed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Combined stdout and stderr.
        output: String,
    },
    /// The subnet description was too short to contain a zone.
    #[error("{program} output for {subnet_id} has no availability zone. Output follows.\n---\n{output}\n---")]
    MissingAvailabilityZone {
        /// Program that was executed.
        program: String,
        /// Subnet that was described.
        subnet_id: String,
        /// Output that was searched.
        output: String,
    },
}

/// Names of the describe commands and the domain used for naming.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolverSettings {
    /// Command listing network interfaces.
    pub describe_interfaces_bin: String,
    /// Command describing subnets.
    pub describe_subnets_bin: String,
    /// Domain appended to generated instance names.
    pub domain_suffix: String,
}

/// Discovers an instance's IP, subnet, zone and DNS name.
#[derive(Clone, Debug)]
pub struct AttributeResolver<R: CommandRunner> {
    settings: ResolverSettings,
    policy: RetryPolicy,
    runner: R,
}

impl<R: CommandRunner> AttributeResolver<R> {
    /// Creates a resolver that polls according to `policy`.
    pub const fn new(settings: ResolverSettings, policy: RetryPolicy, runner: R) -> Self {
        Self {
            settings,
            policy,
            runner,
        }
    }

    /// Returns a copy polling according to `policy` instead.
    #[must_use]
    pub fn with_policy(self, policy: RetryPolicy) -> Self {
        Self { policy, ..self }
    }

    /// Resolves a descriptor for the instance named in `launch_output`.
    ///
    /// When the interface listing never shows an IP and subnet inside the
    /// polling budget, those fields (and everything derived from them) stay
    /// empty and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingInstanceId`] when the launch output has
    /// no instance line, and [`ResolveError::DescribeFailed`] or
    /// [`ResolveError::MissingAvailabilityZone`] when a describe command
    /// fails.
    pub async fn resolve(
        &self,
        launch_output: &str,
        hostclass: &str,
    ) -> Result<InstanceDescriptor, ResolveError> {
        let instance_id =
            parse_instance_id(launch_output).ok_or_else(|| ResolveError::MissingInstanceId {
                output: launch_output.to_owned(),
            })?;
        let mut descriptor = InstanceDescriptor::new(instance_id, hostclass);

        if let Some((ip, subnet_id)) = self.wait_for_interface(&descriptor.instance_id).await? {
            descriptor.ip_address = Some(ip);
            descriptor.subnet_id = Some(subnet_id);
        } else {
            warn!(
                instance_id = %descriptor.instance_id,
                timeout_secs = self.policy.timeout.as_secs(),
                "could not discover IP address and subnet; continuing with an incomplete descriptor"
            );
        }

        if let Some(subnet_id) = descriptor.subnet_id.as_deref() {
            descriptor.availability_zone = Some(self.availability_zone(subnet_id)?);
        } else {
            warn!("skipping availability zone lookup without a subnet");
        }

        if let Some(name) = descriptor.assign_dns_name(&self.settings.domain_suffix) {
            info!(dns_name = %name, "derived instance DNS name");
        }
        Ok(descriptor)
    }

    async fn wait_for_interface(
        &self,
        instance_id: &str,
    ) -> Result<Option<(Ipv4Addr, String)>, ResolveError> {
        let deadline = self.policy.deadline_from(Instant::now());
        let args = [
            OsString::from("--filter"),
            OsString::from(format!("attachment.instance-id={instance_id}")),
        ];

        loop {
            let output = self
                .runner
                .run(&self.settings.describe_interfaces_bin, &args)?;
            let text = require_success(&self.settings.describe_interfaces_bin, &output)?;

            if let (Some(ip), Some(subnet)) = (parse_private_ip(&text), parse_subnet_id(&text)) {
                return Ok(Some((ip, subnet)));
            }
            debug!(output = %text, "interface listing lacks IP address or subnet; retrying");

            sleep(self.policy.interval).await;
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn availability_zone(&self, subnet_id: &str) -> Result<String, ResolveError> {
        let program = &self.settings.describe_subnets_bin;
        let output = self.runner.run(program, &[OsString::from(subnet_id)])?;
        let text = require_success(program, &output)?;
        parse_availability_zone(&text).ok_or_else(|| ResolveError::MissingAvailabilityZone {
            program: program.clone(),
            subnet_id: subnet_id.to_owned(),
            output: text,
        })
    }
}

fn require_success(program: &str, output: &CommandOutput) -> Result<String, ResolveError> {
    if output.is_success() {
        return Ok(output.stdout.clone());
    }
    Err(ResolveError::DescribeFailed {
        program: program.to_owned(),
        status_text: describe_status(output.code),
        output: combined_output(output),
    })
}
