//! Narrow extractors for EC2 API tool output.
//!
//! Each function returns `None` for output it does not recognise, so
//! malformed tool output surfaces as a typed absence.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

static INSTANCE_ID: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^INSTANCE\s+(i-(?:[a-f0-9]{17}|[a-f0-9]{8}))\b"));
static PRIVATE_IP: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?m)^PRIVATEIPADDRESS\s+(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b")
});
static SUBNET_ID: LazyLock<Regex> = LazyLock::new(|| compile(r"\s(subnet-[a-zA-Z0-9]+)"));

#[expect(
    clippy::expect_used,
    reason = "patterns are string literals exercised by the unit tests below"
)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern must compile")
}

/// Token index of the availability zone in `ec2-describe-subnets` output.
const ZONE_TOKEN_INDEX: usize = 6;

/// Extracts the instance ID from an `INSTANCE <id> ...` line.
#[must_use]
pub fn parse_instance_id(output: &str) -> Option<String> {
    INSTANCE_ID
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_owned())
}

/// Extracts the first `PRIVATEIPADDRESS <ip>` line as an IPv4 address.
#[must_use]
pub fn parse_private_ip(output: &str) -> Option<Ipv4Addr> {
    PRIVATE_IP
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|ip| ip.as_str().parse().ok())
}

/// Extracts the first whitespace-preceded `subnet-<alnum>` token.
#[must_use]
pub fn parse_subnet_id(output: &str) -> Option<String> {
    SUBNET_ID
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|subnet| subnet.as_str().to_owned())
}

/// Takes the seventh whitespace-delimited token as the availability zone.
#[must_use]
pub fn parse_availability_zone(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .nth(ZONE_TOKEN_INDEX)
        .map(str::to_owned)
}
