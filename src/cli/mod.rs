//! Command-line interface definitions for the `ec2-deploy` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Default djbdns data file on the Puppet master.
pub(crate) const DEFAULT_DJBDNS_DATA_FILE: &str = "/etc/puppet/modules/ndjbdns/files/data";

/// Top-level CLI for the `ec2-deploy` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ec2-deploy",
    version,
    about = "Launch an EC2 instance and register it with Puppet and DNS",
    long_about = "Wraps ec2run, then provisions a Puppet node manifest, signs the node's \
                  certificate and adds a djbdns address record on the Puppet master."
)]
pub(crate) struct Cli {
    /// Options passed straight through to ec2run.
    #[command(flatten)]
    pub(crate) ec2run: Ec2runArgs,
    /// Options controlling the Puppet and DNS steps.
    #[command(flatten)]
    pub(crate) custom: CustomArgs,
    /// AMI to launch.
    #[arg(value_name = "IMAGE_ID")]
    pub(crate) image_id: Option<String>,
}

/// Options specific to the Puppet master and DNS steps.
#[derive(Debug, Args)]
#[command(next_help_heading = "Custom Options")]
pub(crate) struct CustomArgs {
    /// Log debug output, including raw command output.
    #[arg(short = 'v', long)]
    pub(crate) verbose: bool,
    /// The Puppet master to register the new node with.
    #[arg(long, value_name = "HOST")]
    pub(crate) puppetmaster: Option<String>,
    /// Seconds to wait for the node's certificate request to reach the
    /// Puppet master.
    #[arg(long, value_name = "SECS", default_value_t = 900)]
    pub(crate) puppet_client_timeout: u64,
    /// The hostclass of the new node; selects the manifest template.
    #[arg(long, value_name = "NAME")]
    pub(crate) hostclass: Option<String>,
    /// Print the hostclasses available on --puppetmaster and exit.
    #[arg(long)]
    pub(crate) list_available_hostclasses: bool,
    /// Do not create a node manifest or sign a certificate.
    #[arg(long)]
    pub(crate) skip_puppet_provisioning: bool,
    /// Path of the djbdns data file on the Puppet master.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DJBDNS_DATA_FILE)]
    pub(crate) djbdns_data_file: String,
    /// Do not add a DNS record on the Puppet master.
    #[arg(long)]
    pub(crate) skip_dns_provisioning: bool,
    /// Print ec2run's own option help and exit.
    #[arg(long)]
    pub(crate) ec2run_help: bool,
}

/// Options forwarded verbatim to `ec2run`, by their long names.
#[derive(Debug, Args)]
#[command(next_help_heading = "ec2run Options")]
pub(crate) struct Ec2runArgs {
    /// AWS access key ID.
    #[arg(short = 'O', long, value_name = "KEY")]
    pub(crate) aws_access_key: Option<String>,
    /// AWS secret access key.
    #[arg(short = 'W', long, value_name = "KEY")]
    pub(crate) aws_secret_key: Option<String>,
    /// AWS delegation (session) token.
    #[arg(short = 'T', long, value_name = "TOKEN")]
    pub(crate) security_token: Option<String>,
    /// EC2 private key file for legacy authentication.
    #[arg(short = 'K', long, value_name = "FILE")]
    pub(crate) private_key: Option<String>,
    /// EC2 X.509 certificate file for legacy authentication.
    #[arg(short = 'C', long, value_name = "FILE")]
    pub(crate) cert: Option<String>,
    /// EC2 service endpoint URL.
    #[arg(short = 'U', long, value_name = "URL")]
    pub(crate) url: Option<String>,
    /// AWS region to launch in.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Print column headers in ec2run output.
    #[arg(short = 'H', long)]
    pub(crate) headers: bool,
    /// Print ec2run debug output.
    #[arg(long)]
    pub(crate) debug: bool,
    /// Show empty columns in ec2run output.
    #[arg(long)]
    pub(crate) show_empty_fields: bool,
    /// Omit tags from ec2run output.
    #[arg(long)]
    pub(crate) hide_tags: bool,
    /// Connection timeout for EC2 API calls.
    #[arg(long, value_name = "SECS")]
    pub(crate) connection_timeout: Option<String>,
    /// Request timeout for EC2 API calls.
    #[arg(long, value_name = "SECS")]
    pub(crate) request_timeout: Option<String>,
    /// Block device mapping; may be given more than once.
    #[arg(short = 'b', long, value_name = "MAPPING")]
    pub(crate) block_device_mapping: Vec<String>,
    /// User data passed to the instance.
    #[arg(short = 'd', long, value_name = "DATA")]
    pub(crate) user_data: Option<String>,
    /// File whose contents become the instance user data.
    #[arg(short = 'f', long, value_name = "FILE")]
    pub(crate) user_data_file: Option<String>,
    /// Security group to launch into.
    #[arg(short = 'g', long, value_name = "GROUP")]
    pub(crate) group: Option<String>,
    /// Key pair installed on the instance.
    #[arg(short = 'k', long, value_name = "KEYPAIR")]
    pub(crate) key: Option<String>,
    /// Enable detailed CloudWatch monitoring.
    #[arg(short = 'm', long)]
    pub(crate) monitor: bool,
    /// Number of instances to launch.
    #[arg(short = 'n', long, value_name = "MIN[-MAX]")]
    pub(crate) instance_count: Option<String>,
    /// VPC subnet to launch into.
    #[arg(short = 's', long, value_name = "SUBNET")]
    pub(crate) subnet: Option<String>,
    /// Instance type, such as m1.small.
    #[arg(short = 't', long, value_name = "TYPE")]
    pub(crate) instance_type: Option<String>,
    /// Availability zone to launch in.
    #[arg(short = 'z', long, value_name = "ZONE")]
    pub(crate) availability_zone: Option<String>,
    /// Addressing type for the instance.
    #[arg(long, value_name = "TYPE")]
    pub(crate) addressing: Option<String>,
    /// Prevent termination through the EC2 API.
    #[arg(long)]
    pub(crate) disable_api_termination: bool,
    /// Whether a guest shutdown stops or terminates the instance.
    #[arg(long, value_name = "BEHAVIOR")]
    pub(crate) instance_initiated_shutdown_behavior: Option<String>,
    /// Kernel ID to boot.
    #[arg(long, value_name = "KERNEL")]
    pub(crate) kernel: Option<String>,
    /// License pool to draw from.
    #[arg(long, value_name = "POOL")]
    pub(crate) license_pool: Option<String>,
    /// RAM disk ID to boot.
    #[arg(long, value_name = "RAMDISK")]
    pub(crate) ramdisk: Option<String>,
    /// Cluster placement group.
    #[arg(long, value_name = "GROUP")]
    pub(crate) placement_group: Option<String>,
    /// Primary private IP address in the VPC.
    #[arg(long, value_name = "IP")]
    pub(crate) private_ip_address: Option<String>,
    /// IAM instance profile name or ARN.
    #[arg(short = 'p', long, value_name = "PROFILE")]
    pub(crate) iam_profile: Option<String>,
    /// Idempotency token for the launch request.
    #[arg(long, value_name = "TOKEN")]
    pub(crate) client_token: Option<String>,
    /// Placement tenancy, default or dedicated.
    #[arg(long, value_name = "TENANCY")]
    pub(crate) tenancy: Option<String>,
    /// Launch as an EBS-optimized instance.
    #[arg(long)]
    pub(crate) ebs_optimized: bool,
    /// Network interface attachment specification.
    #[arg(short = 'a', long, value_name = "ATTACHMENT")]
    pub(crate) network_attachment: Option<String>,
    /// Secondary private IP address to assign.
    #[arg(long, value_name = "IP")]
    pub(crate) secondary_private_ip_address: Option<String>,
    /// Number of secondary private IP addresses to assign.
    #[arg(long, value_name = "COUNT")]
    pub(crate) secondary_private_ip_address_count: Option<String>,
}
