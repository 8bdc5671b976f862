//! Shared fixtures for provisioning BDD scenarios.

use std::cell::RefCell;
use std::time::Duration;

use ec2_deploy::config::DeployConfig;
use ec2_deploy::dns::{DnsError, DnsRecordOutcome};
use ec2_deploy::launch::LaunchOptions;
use ec2_deploy::provision::{ProvisionReport, ProvisionRequest, ProvisionSteps};
use ec2_deploy::retry::RetryPolicy;
use ec2_deploy::session::{
    DEFAULT_DNS_DATA_FILE, DEFAULT_NODE_NAME_PLACEHOLDER, DEFAULT_NODES_DIR,
    DEFAULT_NODES_MANIFEST, DEFAULT_TEMPLATES_DIR, ManifestOutcome, SessionConfig,
};
use ec2_deploy::test_support::ScriptedRunner;
use rstest::fixture;

use crate::simulated_host::SimulatedHost;

pub const PUPPETMASTER: &str = "puppet.foo.bar";

/// One scenario's world: the simulated master, the configuration and what
/// the last action produced.
#[derive(Debug)]
pub struct ProvisionContext {
    pub host: SimulatedHost,
    pub config: DeployConfig,
    pub session_config: RefCell<SessionConfig>,
    pub request: RefCell<ProvisionRequest>,
    pub outcome: RefCell<Option<Result<ProvisionReport, String>>>,
    pub manifest_runs: RefCell<Vec<ManifestOutcome>>,
    pub dns_runs: RefCell<Vec<Result<DnsRecordOutcome, DnsError>>>,
}

impl ProvisionContext {
    /// Returns the successful report of the last run.
    pub fn report(&self) -> Result<ProvisionReport, String> {
        match self.outcome.borrow().as_ref() {
            Some(Ok(report)) => Ok(report.clone()),
            Some(Err(err)) => Err(format!("provisioning failed: {err}")),
            None => Err(String::from("provisioning has not run")),
        }
    }

    /// Contents of the DNS data file, empty when it does not exist.
    pub fn dns_data(&self) -> String {
        let path = self.request.borrow().dns_data_file.clone();
        self.host.file(&path).unwrap_or_default()
    }
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    let host = SimulatedHost::new(ScriptedRunner::new());
    let session_config = SessionConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: Some(String::from("deploy")),
        ssh_identity_file: None,
        ssh_known_hosts_file: None,
        ssh_control_path: String::from("/tmp/ec2-deploy-%C"),
        templates_dir: String::from(DEFAULT_TEMPLATES_DIR),
        nodes_dir: String::from(DEFAULT_NODES_DIR),
        nodes_manifest: String::from(DEFAULT_NODES_MANIFEST),
        puppet_bin: String::from("/usr/bin/puppet"),
        use_sudo: true,
        node_name_placeholder: String::from(DEFAULT_NODE_NAME_PLACEHOLDER),
        certificate_poll_interval_secs: 1,
        dns_lock_strategy: String::from("none"),
    };
    let request = ProvisionRequest {
        image_id: String::from("ami-12345678"),
        hostclass: String::from("api"),
        launch_options: LaunchOptions::builder()
            .single("--instance-type", Some("m1.small"))
            .build(),
        puppetmaster: Some(String::from(PUPPETMASTER)),
        steps: ProvisionSteps::default(),
        dns_data_file: String::from(DEFAULT_DNS_DATA_FILE),
        certificate_policy: RetryPolicy::new(Duration::from_millis(200), Duration::from_millis(1)),
    };

    ProvisionContext {
        host,
        config: deploy_config(),
        session_config: RefCell::new(session_config),
        request: RefCell::new(request),
        outcome: RefCell::new(None),
        manifest_runs: RefCell::new(Vec::new()),
        dns_runs: RefCell::new(Vec::new()),
    }
}

fn deploy_config() -> DeployConfig {
    DeployConfig {
        ec2run_bin: String::from("ec2run"),
        ec2run_help_bin: String::from("ec2-run-instances"),
        describe_interfaces_bin: String::from("ec2-describe-network-interfaces"),
        describe_subnets_bin: String::from("ec2-describe-subnets"),
        domain_suffix: String::from("foo.bar"),
        attribute_timeout_secs: 5,
        attribute_poll_interval_secs: 1,
    }
}

/// Path of the node manifest for `dns_name`.
pub fn manifest_path(dns_name: &str) -> String {
    format!("{DEFAULT_NODES_DIR}/{dns_name}.pp")
}

/// Path of the template for `hostclass`.
pub fn template_path(hostclass: &str) -> String {
    format!("{DEFAULT_TEMPLATES_DIR}/{hostclass}.template")
}
