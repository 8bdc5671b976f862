//! Binary entry point for the `ec2-deploy` CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ec2_deploy::instance::validate_hostclass;
use ec2_deploy::{
    ConfigError, DeployConfig, HostclassError, LaunchError, LaunchOptions, Launcher,
    ProcessCommandRunner, ProvisionError, ProvisionOrchestrator, ProvisionRequest, ProvisionSteps,
    ProvisioningSession, RetryPolicy, SessionConfig, SessionError, list_hostclasses,
};

mod cli;

use cli::{Cli, Ec2runArgs};

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "EC2DEPLOY_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("you must supply a --puppetmaster to check hostclasses on")]
    MissingPuppetmaster,
    #[error("you must supply a --hostclass")]
    MissingHostclass,
    #[error("you must specify an AMI ID as your final argument")]
    MissingImage,
    #[error(transparent)]
    Hostclass(#[from] HostclassError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.custom.verbose);

    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    if cli.custom.ec2run_help {
        return print_ec2run_help();
    }
    if cli.custom.list_available_hostclasses {
        let host = cli
            .custom
            .puppetmaster
            .as_deref()
            .ok_or(CliError::MissingPuppetmaster)?;
        return print_hostclasses(host);
    }

    let hostclass = cli
        .custom
        .hostclass
        .clone()
        .ok_or(CliError::MissingHostclass)?;
    validate_hostclass(&hostclass)?;
    let image_id = cli.image_id.clone().ok_or(CliError::MissingImage)?;

    let config = load_deploy_config()?;
    let session_config = SessionConfig::load_without_cli_args()?;
    let certificate_policy = RetryPolicy::new(
        Duration::from_secs(cli.custom.puppet_client_timeout),
        session_config.certificate_poll_interval(),
    );
    let request = ProvisionRequest {
        image_id,
        hostclass,
        launch_options: launch_options(&cli.ec2run),
        puppetmaster: cli.custom.puppetmaster.clone(),
        steps: ProvisionSteps {
            manifest: !cli.custom.skip_puppet_provisioning,
            dns: !cli.custom.skip_dns_provisioning,
        },
        dns_data_file: cli.custom.djbdns_data_file.clone(),
        certificate_policy,
    };

    let orchestrator = ProvisionOrchestrator::new(&config, session_config, ProcessCommandRunner)?;
    let report = orchestrator.execute(&request).await?;
    writeln!(io::stdout(), "{}", report.summary_line())?;
    info!(
        instance_id = %report.instance.instance_id,
        "completed provisioning"
    );
    Ok(())
}

fn load_deploy_config() -> Result<DeployConfig, CliError> {
    let config = DeployConfig::load_without_cli_args()?;
    config.validate()?;
    Ok(config)
}

fn print_ec2run_help() -> Result<(), CliError> {
    let config = load_deploy_config()?;
    let launcher = Launcher::new(
        config.ec2run_bin,
        config.ec2run_help_bin,
        ProcessCommandRunner,
    );
    let help = launcher.help()?;
    writeln!(io::stdout(), "{help}")?;
    Ok(())
}

fn print_hostclasses(host: &str) -> Result<(), CliError> {
    let session_config = SessionConfig::load_without_cli_args()?;
    let mut session = ProvisioningSession::with_process_runner(host, session_config)?;
    let hostclasses = list_hostclasses(&mut session)?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "Available --hostclass Options on Puppetmaster <{host}>:")?;
    for hostclass in hostclasses {
        writeln!(stdout, "{hostclass}")?;
    }
    Ok(())
}

/// Translates the pass-through flags into `ec2run` arguments, in the order
/// `ec2run` documents them.
fn launch_options(args: &Ec2runArgs) -> LaunchOptions {
    LaunchOptions::builder()
        .single("--aws-access-key", args.aws_access_key.as_deref())
        .single("--aws-secret-key", args.aws_secret_key.as_deref())
        .single("--security-token", args.security_token.as_deref())
        .single("--private-key", args.private_key.as_deref())
        .single("--cert", args.cert.as_deref())
        .single("--url", args.url.as_deref())
        .single("--region", args.region.as_deref())
        .switch("--headers", args.headers)
        .switch("--debug", args.debug)
        .switch("--show-empty-fields", args.show_empty_fields)
        .switch("--hide-tags", args.hide_tags)
        .single("--connection-timeout", args.connection_timeout.as_deref())
        .single("--request-timeout", args.request_timeout.as_deref())
        .repeated("--block-device-mapping", &args.block_device_mapping)
        .single("--user-data", args.user_data.as_deref())
        .single("--user-data-file", args.user_data_file.as_deref())
        .single("--group", args.group.as_deref())
        .single("--key", args.key.as_deref())
        .switch("--monitor", args.monitor)
        .single("--instance-count", args.instance_count.as_deref())
        .single("--subnet", args.subnet.as_deref())
        .single("--instance-type", args.instance_type.as_deref())
        .single("--availability-zone", args.availability_zone.as_deref())
        .single("--addressing", args.addressing.as_deref())
        .switch("--disable-api-termination", args.disable_api_termination)
        .single(
            "--instance-initiated-shutdown-behavior",
            args.instance_initiated_shutdown_behavior.as_deref(),
        )
        .single("--kernel", args.kernel.as_deref())
        .single("--license-pool", args.license_pool.as_deref())
        .single("--ramdisk", args.ramdisk.as_deref())
        .single("--placement-group", args.placement_group.as_deref())
        .single("--private-ip-address", args.private_ip_address.as_deref())
        .single("--iam-profile", args.iam_profile.as_deref())
        .single("--client-token", args.client_token.as_deref())
        .single("--tenancy", args.tenancy.as_deref())
        .switch("--ebs-optimized", args.ebs_optimized)
        .single("--network-attachment", args.network_attachment.as_deref())
        .single(
            "--secondary-private-ip-address",
            args.secondary_private_ip_address.as_deref(),
        )
        .single(
            "--secondary-private-ip-address-count",
            args.secondary_private_ip_address_count.as_deref(),
        )
        .build()
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
