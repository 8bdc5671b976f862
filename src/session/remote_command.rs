//! Remote command lines run on the Puppet master.
//!
//! Every path and name is shell-escaped here so the session methods only
//! deal with outcomes.

use camino::Utf8Path;
use shell_escape::unix::escape;

use super::SessionConfig;

fn quote(value: &str) -> String {
    escape(value.into()).into_owned()
}

pub(crate) fn list_templates(templates_dir: &str) -> String {
    format!("ls -1 -- {}", quote(templates_dir))
}

pub(crate) fn path_exists(path: &Utf8Path) -> String {
    format!("test -e {}", quote(path.as_str()))
}

/// Copies `source` to `target`, keeping a backup of any existing target.
pub(crate) fn copy_with_backup(source: &Utf8Path, target: &Utf8Path) -> String {
    format!("cp -b -- {} {}", quote(source.as_str()), quote(target.as_str()))
}

/// Replaces the first placeholder on each line in place.
pub(crate) fn substitute_placeholder(placeholder: &str, value: &str, file: &Utf8Path) -> String {
    let expression = format!("s/{placeholder}/{value}/");
    format!("sed -i {} {}", quote(&expression), quote(file.as_str()))
}

pub(crate) fn touch(path: &str) -> String {
    format!("touch -- {}", quote(path))
}

/// Builds `[sudo -n ]<puppet> cert <args..>`.
pub(crate) fn puppet_cert(config: &SessionConfig, args: &[&str]) -> String {
    let mut line = String::new();
    if config.use_sudo {
        line.push_str("sudo -n ");
    }
    line.push_str(&quote(&config.puppet_bin));
    line.push_str(" cert");
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg));
    }
    line
}
