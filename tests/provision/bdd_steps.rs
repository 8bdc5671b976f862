//! BDD step definitions for provisioning and DNS registration.
#![expect(
    clippy::needless_pass_by_value,
    reason = "placeholder values are parsed into owned step arguments"
)]

use std::net::Ipv4Addr;
use std::time::Duration;

use ec2_deploy::dns::{DnsRecordOutcome, DnsRegistrar, SkipReason};
use ec2_deploy::provision::ProvisionOrchestrator;
use ec2_deploy::retry::RetryPolicy;
use ec2_deploy::session::{ManifestOutcome, ProvisioningSession, SigningOutcome};
use ec2_deploy::test_support::{
    describe_interfaces_output, describe_subnets_output, ec2run_output,
};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{PUPPETMASTER, ProvisionContext, manifest_path, template_path};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to start runtime: {0}")]
    Setup(#[from] std::io::Error),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message()))
    }
}

#[given(
    "a cloud that launches instance \"{instance_id}\" at \"{ip}\" in zone \"{zone}\""
)]
fn cloud_launches(provision_context: &ProvisionContext, instance_id: String, ip: String, zone: String) {
    let cloud = provision_context.host.fallback();
    cloud.push_stdout(ec2run_output(&instance_id));
    cloud.push_stdout("NETWORKINTERFACE\teni-1a2b3c4d\tpending\n");
    cloud.push_stdout(describe_interfaces_output("subnet-abc123", &ip));
    cloud.push_stdout(describe_subnets_output("subnet-abc123", &zone));
}

#[given("a puppetmaster with hostclass \"{hostclass}\"")]
fn puppetmaster_with_hostclass(provision_context: &ProvisionContext, hostclass: String) {
    provision_context.host.add_file(
        &template_path(&hostclass),
        "node '__AWS_NODENAME' {\n  include role::app\n}\n",
    );
    provision_context
        .host
        .add_file("/etc/puppet/common/templates/README", "templates live here\n");
}

#[given("the node \"{name}\" requests a certificate after \"{polls}\" polls")]
fn node_requests_certificate(provision_context: &ProvisionContext, name: String, polls: u32) {
    provision_context.host.request_certificate_after(&name, polls);
}

#[given("the certificate wait is short")]
fn short_certificate_wait(provision_context: &ProvisionContext) {
    provision_context.request.borrow_mut().certificate_policy =
        RetryPolicy::new(Duration::from_millis(20), Duration::from_millis(1));
}

#[given("no puppetmaster is configured")]
fn no_puppetmaster(provision_context: &ProvisionContext) {
    provision_context.request.borrow_mut().puppetmaster = None;
}

#[given("the DNS data file contains \"{line}\"")]
fn dns_data_contains(provision_context: &ProvisionContext, line: String) {
    let path = provision_context.request.borrow().dns_data_file.clone();
    let mut contents = provision_context.host.file(&path).unwrap_or_default();
    contents.push_str(&line);
    contents.push('\n');
    provision_context.host.add_file(&path, &contents);
}

#[given("DNS appends use compare-and-swap")]
fn compare_and_swap(provision_context: &ProvisionContext) {
    provision_context.session_config.borrow_mut().dns_lock_strategy =
        String::from("compare-and-swap");
}

#[given("another writer appends \"{line}\" during the next guarded append")]
fn racing_writer(provision_context: &ProvisionContext, line: String) {
    provision_context
        .host
        .race_next_guarded_append(&format!("{line}\n"));
}

#[when("the operator provisions hostclass \"{hostclass}\"")]
fn provision_hostclass(
    provision_context: &ProvisionContext,
    hostclass: String,
) -> Result<(), StepError> {
    provision_context.request.borrow_mut().hostclass = hostclass;
    let orchestrator = ProvisionOrchestrator::new(
        &provision_context.config,
        provision_context.session_config.borrow().clone(),
        provision_context.host.clone(),
    )
    .map_err(|err| StepError::Assertion(format!("orchestrator setup: {err}")))?
    .with_attribute_policy(RetryPolicy::new(
        Duration::from_secs(5),
        Duration::from_millis(1),
    ));
    let request = provision_context.request.borrow().clone();

    let runtime = Runtime::new()?;
    let result = runtime
        .block_on(orchestrator.execute(&request))
        .map_err(|err| err.to_string());
    *provision_context.outcome.borrow_mut() = Some(result);
    Ok(())
}

#[when(
    "node \"{name}\" at \"{ip}\" with hostclass \"{hostclass}\" is registered \"{times}\" times"
)]
fn register_node(
    provision_context: &ProvisionContext,
    name: String,
    ip: String,
    hostclass: String,
    times: u32,
) -> Result<(), StepError> {
    let address: Ipv4Addr = ip
        .parse()
        .map_err(|err| StepError::Assertion(format!("bad address {ip}: {err}")))?;
    let session_config = provision_context.session_config.borrow().clone();
    let strategy = session_config
        .lock_strategy()
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    let registrar = DnsRegistrar::new(strategy);
    let data_file = provision_context.request.borrow().dns_data_file.clone();

    for _ in 0..times {
        let mut session = ProvisioningSession::new(
            PUPPETMASTER,
            session_config.clone(),
            provision_context.host.clone(),
        )
        .map_err(|err| StepError::Assertion(err.to_string()))?;
        session
            .connect()
            .map_err(|err| StepError::Assertion(err.to_string()))?;
        let manifest = session.provision_node_manifest(&name, &hostclass);
        let dns = registrar.add_dns_record(&session, &name, address, &data_file);
        session.disconnect();

        let created = manifest.map_err(|err| StepError::Assertion(err.to_string()))?;
        provision_context.manifest_runs.borrow_mut().push(created);
        provision_context.dns_runs.borrow_mut().push(dns);
    }
    Ok(())
}

#[then("the summary reads \"{summary}\"")]
fn summary_reads(provision_context: &ProvisionContext, summary: String) -> Result<(), StepError> {
    let report = provision_context.report().map_err(StepError::Assertion)?;
    let actual = report.summary_line();
    ensure(actual == summary, || format!("expected summary {summary:?}, got {actual:?}"))
}

#[then("provisioning succeeds")]
fn provisioning_succeeds(provision_context: &ProvisionContext) -> Result<(), StepError> {
    provision_context
        .report()
        .map(drop)
        .map_err(StepError::Assertion)
}

#[then("provisioning fails mentioning \"{text}\"")]
fn provisioning_fails(provision_context: &ProvisionContext, text: String) -> Result<(), StepError> {
    match provision_context.outcome.borrow().as_ref() {
        Some(Err(message)) => ensure(message.contains(&text), || {
            format!("expected error mentioning {text:?}, got {message:?}")
        }),
        Some(Ok(_)) => Err(StepError::Assertion(String::from(
            "provisioning unexpectedly succeeded",
        ))),
        None => Err(StepError::Assertion(String::from(
            "provisioning has not run",
        ))),
    }
}

#[then("the manifest for \"{name}\" names the node")]
fn manifest_names_node(provision_context: &ProvisionContext, name: String) -> Result<(), StepError> {
    let path = manifest_path(&name);
    let contents = provision_context
        .host
        .file(&path)
        .ok_or_else(|| StepError::Assertion(format!("{path} was not created")))?;
    ensure(
        contents.contains(&format!("node '{name}'")) && !contents.contains("__AWS_NODENAME"),
        || format!("placeholder not substituted in {path}: {contents:?}"),
    )?;
    ensure(
        provision_context
            .host
            .file("/etc/puppet/common/nodes.pp")
            .is_some(),
        || String::from("aggregate manifest was not touched"),
    )
}

#[then("no node manifest was written for \"{name}\"")]
fn no_manifest(provision_context: &ProvisionContext, name: String) -> Result<(), StepError> {
    let path = manifest_path(&name);
    ensure(provision_context.host.file(&path).is_none(), || {
        format!("{path} should not exist")
    })
}

#[then("the certificate for \"{name}\" is signed once")]
fn certificate_signed(provision_context: &ProvisionContext, name: String) -> Result<(), StepError> {
    let signed = provision_context.host.signed();
    ensure(signed == vec![name.clone()], || {
        format!("expected only {name} signed, got {signed:?}")
    })?;
    let report = provision_context.report().map_err(StepError::Assertion)?;
    ensure(
        matches!(report.certificate, Some(SigningOutcome::Signed { .. })),
        || format!("unexpected certificate outcome {:?}", report.certificate),
    )
}

#[then("no certificate is signed")]
fn no_certificate_signed(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let signed = provision_context.host.signed();
    ensure(signed.is_empty(), || format!("unexpected signatures {signed:?}"))?;
    let report = provision_context.report().map_err(StepError::Assertion)?;
    ensure(
        matches!(report.certificate, Some(SigningOutcome::TimedOut { .. })),
        || format!("unexpected certificate outcome {:?}", report.certificate),
    )
}

#[then("the DNS data file has \"{count}\" record for \"{record}\"")]
fn dns_record_count(
    provision_context: &ProvisionContext,
    count: usize,
    record: String,
) -> Result<(), StepError> {
    let data = provision_context.dns_data();
    let found = data.lines().filter(|line| *line == record).count();
    ensure(found == count, || {
        format!("expected {count} x {record:?}, found {found} in {data:?}")
    })
}

#[then("the puppetmaster connection is closed")]
fn connection_closed(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let host = &provision_context.host;
    ensure(!host.is_connected(), || String::from("control master still open"))?;
    ensure(host.connections() == host.closes(), || {
        format!(
            "opened {} connections but closed {}",
            host.connections(),
            host.closes()
        )
    })
}

#[then("the puppetmaster was never contacted")]
fn never_contacted(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let host = &provision_context.host;
    ensure(
        host.connections() == 0 && host.remote_commands().is_empty(),
        || format!("unexpected remote commands {:?}", host.remote_commands()),
    )
}

#[then("the manifest was created once and then left alone")]
fn manifest_idempotent(provision_context: &ProvisionContext) -> Result<(), StepError> {
    let runs = provision_context.manifest_runs.borrow();
    let shape: Vec<&str> = runs
        .iter()
        .map(|outcome| match outcome {
            ManifestOutcome::Created { .. } => "created",
            ManifestOutcome::AlreadyExists { .. } => "exists",
            ManifestOutcome::Failed { .. } => "failed",
        })
        .collect();
    ensure(shape == ["created", "exists"], || {
        format!("unexpected manifest outcomes {shape:?}")
    })
}

#[then("the DNS outcomes are \"{expected}\"")]
fn dns_outcomes(provision_context: &ProvisionContext, expected: String) -> Result<(), StepError> {
    let runs = provision_context.dns_runs.borrow();
    let actual: Vec<&str> = runs
        .iter()
        .map(|outcome| match outcome {
            Ok(DnsRecordOutcome::Inserted { .. }) => "inserted",
            Ok(DnsRecordOutcome::Skipped(SkipReason::AddressExists)) => "address-exists",
            Ok(DnsRecordOutcome::Skipped(SkipReason::CnameExists)) => "cname-exists",
            Err(_) => "error",
        })
        .collect();
    let wanted: Vec<&str> = expected.split(", ").collect();
    ensure(actual == wanted, || {
        format!("expected DNS outcomes {wanted:?}, got {actual:?}")
    })
}
