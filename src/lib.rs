//! Core library for the `ec2-deploy` provisioning wrapper.
//!
//! A run launches one EC2 instance through the `ec2run` tool, discovers its
//! private IP, subnet and availability zone, derives a DNS name from them,
//! and then registers the node with a Puppet master: a node manifest from
//! the hostclass template, a signed certificate, and an address record in
//! the djbdns data file the master distributes.
//!
//! Every external program runs through [`command::CommandRunner`], so the
//! whole flow can be driven by scripted outputs in tests.

pub mod command;
pub mod config;
pub mod dns;
pub mod instance;
pub mod launch;
pub mod provision;
pub mod resolve;
pub mod retry;
pub mod session;
pub mod test_support;

pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, DeployConfig};
pub use dns::{DnsData, DnsError, DnsRecordOutcome, DnsRegistrar, SkipReason};
pub use instance::{HostclassError, InstanceDescriptor, derive_dns_name};
pub use launch::{LaunchError, LaunchOptions, Launcher};
pub use provision::{
    ProvisionError, ProvisionOrchestrator, ProvisionReport, ProvisionRequest, ProvisionSteps,
    list_hostclasses,
};
pub use resolve::{AttributeResolver, ResolveError, ResolverSettings};
pub use retry::RetryPolicy;
pub use session::{
    DnsLockStrategy, ManifestOutcome, ProvisioningSession, SessionConfig, SessionError,
    SigningOutcome,
};
