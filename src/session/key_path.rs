//! Resolution of the identity and known-hosts paths handed to `ssh`.

use std::ffi::{OsStr, OsString};

/// Resolves a home-relative SSH path against `home`.
///
/// A bare `~` and a leading `~/` are replaced. `~user` forms and every other
/// path pass through as written, as does everything when `home` is `None`,
/// so `ssh` itself reports a missing key. A non-UTF-8 home directory is kept
/// byte for byte.
#[must_use]
pub fn resolve_ssh_path(path: &str, home: Option<&OsStr>) -> OsString {
    match (path.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_owned(),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            let mut resolved = home.to_owned();
            resolved.push(rest);
            resolved
        }
        _ => OsString::from(path),
    }
}
