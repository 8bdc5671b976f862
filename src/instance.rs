//! Descriptor for a single launched EC2 instance.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Everything learned about one launched instance.
///
/// Only `instance_id` and `hostclass` are known at creation; the remaining
/// fields are filled in once by the attribute resolver and stay `None` when
/// discovery gives up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceDescriptor {
    /// Identifier assigned by EC2 (for example `i-0a1b2c3d`).
    pub instance_id: String,
    /// Operator-selected hostclass, also the Puppet template name.
    pub hostclass: String,
    /// Primary private IPv4 address.
    pub ip_address: Option<Ipv4Addr>,
    /// VPC subnet the primary interface is attached to.
    pub subnet_id: Option<String>,
    /// Availability zone of the subnet.
    pub availability_zone: Option<String>,
    /// Derived DNS name; present only once the IP and zone are known.
    pub dns_name: Option<String>,
}

impl InstanceDescriptor {
    /// Creates a descriptor with nothing resolved yet.
    #[must_use]
    pub fn new(instance_id: impl Into<String>, hostclass: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            hostclass: hostclass.into(),
            ip_address: None,
            subnet_id: None,
            availability_zone: None,
            dns_name: None,
        }
    }

    /// Derives and stores the DNS name when both inputs are available.
    ///
    /// Returns the name that was stored, if any.
    pub fn assign_dns_name(&mut self, domain_suffix: &str) -> Option<&str> {
        if let (Some(ip), Some(zone)) = (self.ip_address, self.availability_zone.as_deref()) {
            self.dns_name = Some(derive_dns_name(&self.hostclass, ip, zone, domain_suffix));
        }
        self.dns_name.as_deref()
    }

    /// Returns `true` when every attribute needed for provisioning is known.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.ip_address.is_some() && self.availability_zone.is_some() && self.dns_name.is_some()
    }
}

/// Builds `{hostclass}-{a-b-c-d}.{zone}.{suffix}`.
///
/// ```
/// # use std::net::Ipv4Addr;
/// # use ec2_deploy::instance::derive_dns_name;
/// let name = derive_dns_name("web", Ipv4Addr::new(10, 0, 0, 5), "us-east-1a", "foo.bar");
/// assert_eq!(name, "web-10-0-0-5.us-east-1a.foo.bar");
/// ```
#[must_use]
pub fn derive_dns_name(hostclass: &str, ip: Ipv4Addr, zone: &str, domain_suffix: &str) -> String {
    let dashed = ip.to_string().replace('.', "-");
    format!("{hostclass}-{dashed}.{zone}.{domain_suffix}")
}

/// Raised when an operator-supplied hostclass cannot be used.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HostclassError {
    /// The hostclass was empty after trimming.
    #[error("hostclass must not be empty")]
    Empty,
    /// The hostclass contains characters unusable in a file or DNS name.
    #[error("hostclass '{0}' may only contain ASCII letters, digits, '-' and '_'")]
    InvalidCharacters(String),
}

/// Checks that `hostclass` is safe to use as a template name and DNS label
/// prefix.
///
/// # Errors
///
/// Returns [`HostclassError`] when the value is empty or contains other
/// characters than ASCII alphanumerics, `-` and `_`.
pub fn validate_hostclass(hostclass: &str) -> Result<(), HostclassError> {
    if hostclass.trim().is_empty() {
        return Err(HostclassError::Empty);
    }
    if !hostclass
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
    {
        return Err(HostclassError::InvalidCharacters(hostclass.to_owned()));
    }
    Ok(())
}

/// Returns `true` for names built only from ASCII alphanumerics, `-` and
/// `.`.
///
/// Remote commands embed DNS names in file paths and `sed` expressions, so
/// anything else is refused before it reaches a shell.
#[must_use]
pub fn is_valid_dns_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.'))
}
