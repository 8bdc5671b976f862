//! Reading the record lines of a djbdns `data` file.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

#[expect(
    clippy::expect_used,
    reason = "patterns are static literals covered by unit tests"
)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static record pattern must compile")
}

static ADDRESS_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?m)^=([a-zA-Z0-9.-]+):(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")
});

static CNAME_RECORD: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^C([a-zA-Z0-9.-]+):"));

/// Address and alias records found in a data file.
///
/// Comment lines and every other record type are ignored.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DnsData {
    addresses: Vec<(String, Ipv4Addr)>,
    aliases: Vec<String>,
}

impl DnsData {
    /// Scans `text` for `=name:ip` and `Cname:target` lines.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let addresses = ADDRESS_RECORD
            .captures_iter(text)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str().to_owned();
                let ip = caps.get(2)?.as_str().parse().ok()?;
                Some((name, ip))
            })
            .collect();
        let aliases = CNAME_RECORD
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|name| name.as_str().to_owned()))
            .collect();
        Self { addresses, aliases }
    }

    /// Returns `true` when any address record points at `ip`.
    #[must_use]
    pub fn has_address(&self, ip: Ipv4Addr) -> bool {
        self.addresses.iter().any(|(_, known)| *known == ip)
    }

    /// Returns `true` when an alias record already claims `name`.
    ///
    /// Names compare case-insensitively and ignore a trailing root dot.
    #[must_use]
    pub fn cname_claims(&self, name: &str) -> bool {
        let wanted = normalise(name);
        self.aliases.iter().any(|alias| normalise(alias) == wanted)
    }

    /// Number of address records found.
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }
}

fn normalise(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}

/// Text appended for a new address record, blank separator line included.
#[must_use]
pub fn address_record_block(name: &str, ip: Ipv4Addr) -> String {
    format!("\n# autogenerated entry follows.\n={name}:{ip}\n")
}
