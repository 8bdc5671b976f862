//! Address records in the Puppet-managed djbdns data file.
//!
//! The data file lives on the Puppet master and is shipped to the DNS
//! servers by Puppet, so registration is a remote read followed by an
//! append. Every step is a single remote command; nothing stays open
//! between them.

mod records;

use std::net::Ipv4Addr;

use shell_escape::unix::escape;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, describe_status};
use crate::instance::is_valid_dns_name;
use crate::session::{DnsLockStrategy, ProvisioningSession, SessionError};

pub use records::{DnsData, address_record_block};

/// Attempts made under [`DnsLockStrategy::CompareAndSwap`] before giving up.
pub const MAX_APPEND_ATTEMPTS: u32 = 3;

/// Exit status signalling that the file changed since it was read.
const LENGTH_MISMATCH_STATUS: i32 = 3;

/// Why no record was added.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// An address record already points at the instance's IP.
    AddressExists,
    /// An alias record already claims the instance's name.
    CnameExists,
}

/// Result of [`DnsRegistrar::add_dns_record`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DnsRecordOutcome {
    /// A new `=name:ip` record was appended.
    Inserted {
        /// Record line that was written.
        record: String,
    },
    /// The file already covers this instance; nothing was written.
    Skipped(SkipReason),
}

/// Errors raised while registering a record.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DnsError {
    /// The name cannot be written safely into a record line.
    #[error("refusing to write DNS record for '{name}'")]
    InvalidName {
        /// Offending name.
        name: String,
    },
    /// The data file could not be read or created.
    #[error("could not read DNS data file {path}: {stderr}")]
    ReadFailed {
        /// Remote path of the data file.
        path: String,
        /// Diagnostic from the remote command.
        stderr: String,
    },
    /// The record could not be appended.
    #[error("could not append to DNS data file {path}: {stderr}")]
    AppendFailed {
        /// Remote path of the data file.
        path: String,
        /// Diagnostic from the remote command.
        stderr: String,
    },
    /// Another writer kept changing the file between read and append.
    #[error("DNS data file {path} changed during each of {attempts} append attempts")]
    ConcurrentModification {
        /// Remote path of the data file.
        path: String,
        /// Attempts made.
        attempts: u32,
    },
    /// The remote channel failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Adds address records for new instances.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DnsRegistrar {
    strategy: DnsLockStrategy,
}

enum AppendResult {
    Written,
    Changed,
}

/// Data file contents plus its size as counted on the master.
///
/// The contents are decoded lossily, so only `byte_len` is fit for the
/// compare-and-swap guard.
struct DataFile {
    contents: String,
    byte_len: u64,
}

impl DnsRegistrar {
    /// Creates a registrar using `strategy` to guard appends.
    #[must_use]
    pub const fn new(strategy: DnsLockStrategy) -> Self {
        Self { strategy }
    }

    /// Appends `=dns_name:ip` to `data_file` unless the file already has a
    /// record for the address or an alias claiming the name.
    ///
    /// The file is created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::InvalidName`] for unsafe names,
    /// [`DnsError::ReadFailed`] or [`DnsError::AppendFailed`] when a remote
    /// step fails, [`DnsError::ConcurrentModification`] when the
    /// compare-and-swap guard never sees a stable file, and
    /// [`DnsError::Session`] for channel failures.
    pub fn add_dns_record<R: CommandRunner>(
        &self,
        session: &ProvisioningSession<R>,
        dns_name: &str,
        ip: Ipv4Addr,
        data_file: &str,
    ) -> Result<DnsRecordOutcome, DnsError> {
        if !is_valid_dns_name(dns_name) {
            return Err(DnsError::InvalidName {
                name: dns_name.to_owned(),
            });
        }

        let block = address_record_block(dns_name, ip);
        let attempts = match self.strategy {
            DnsLockStrategy::None => 1,
            DnsLockStrategy::CompareAndSwap => MAX_APPEND_ATTEMPTS,
        };

        for attempt in 1..=attempts {
            let snapshot = read_data_file(session, data_file)?;
            let data = DnsData::parse(&snapshot.contents);
            if data.has_address(ip) {
                warn!(host = session.host(), %ip, "DNS address record already exists; skipping");
                return Ok(DnsRecordOutcome::Skipped(SkipReason::AddressExists));
            }
            if data.cname_claims(dns_name) {
                warn!(host = session.host(), dns_name, "DNS CNAME record already exists; skipping");
                return Ok(DnsRecordOutcome::Skipped(SkipReason::CnameExists));
            }

            let expected_len = match self.strategy {
                DnsLockStrategy::None => None,
                DnsLockStrategy::CompareAndSwap => Some(snapshot.byte_len),
            };
            match append(session, data_file, &block, expected_len)? {
                AppendResult::Written => {
                    let record = format!("={dns_name}:{ip}");
                    info!(host = session.host(), path = data_file, %record, "provisioned DNS address record");
                    return Ok(DnsRecordOutcome::Inserted { record });
                }
                AppendResult::Changed => {
                    debug!(attempt, path = data_file, "DNS data file changed since it was read");
                }
            }
        }

        Err(DnsError::ConcurrentModification {
            path: data_file.to_owned(),
            attempts,
        })
    }
}

fn quote(value: &str) -> String {
    escape(value.into()).into_owned()
}

/// Creates the file when missing and returns `wc -c` on the first line
/// followed by the contents.
fn read_data_file<R: CommandRunner>(
    session: &ProvisioningSession<R>,
    data_file: &str,
) -> Result<DataFile, DnsError> {
    let path = quote(data_file);
    let output = session.run_remote(&format!(
        "touch -- {path} && wc -c < {path} && cat -- {path}"
    ))?;
    if !output.is_success() {
        return Err(DnsError::ReadFailed {
            path: data_file.to_owned(),
            stderr: failure_text(output.code, &output.stderr),
        });
    }

    let (count, contents) = output.stdout.split_once('\n').unwrap_or((output.stdout.as_str(), ""));
    let byte_len = count.trim().parse::<u64>().map_err(|_| DnsError::ReadFailed {
        path: data_file.to_owned(),
        stderr: format!("unexpected byte count '{}'", count.trim()),
    })?;
    Ok(DataFile {
        contents: contents.to_owned(),
        byte_len,
    })
}

/// Appends `block`, optionally only while the file is `expected_len` bytes.
fn append<R: CommandRunner>(
    session: &ProvisioningSession<R>,
    data_file: &str,
    block: &str,
    expected_len: Option<u64>,
) -> Result<AppendResult, DnsError> {
    let path = quote(data_file);
    let lines = block.lines().map(quote).collect::<Vec<_>>().join(" ");
    let write = format!("printf {} {lines} >> {path}", quote(r"%s\n"));
    let command = match expected_len {
        None => write,
        Some(len) => {
            let guarded = format!(
                "if test \"$(wc -c < {path})\" -eq {len}; then {write}; else exit {LENGTH_MISMATCH_STATUS}; fi"
            );
            format!("flock {path} -c {}", quote(&guarded))
        }
    };

    let output = session.run_remote(&command)?;
    match output.code {
        Some(0) => Ok(AppendResult::Written),
        Some(LENGTH_MISMATCH_STATUS) if expected_len.is_some() => Ok(AppendResult::Changed),
        code => Err(DnsError::AppendFailed {
            path: data_file.to_owned(),
            stderr: failure_text(code, &output.stderr),
        }),
    }
}

fn failure_text(code: Option<i32>, stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with status {}", describe_status(code))
    } else {
        trimmed.to_owned()
    }
}
