//! Pass-through option set for the launch command.

use std::ffi::OsString;

/// Value carried by a single launch flag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FlagValue {
    /// Flag takes no value (for example `--monitor`).
    Switch,
    /// Flag followed by one value.
    Single(String),
    /// Flag repeated once per value, in order.
    Repeated(Vec<String>),
}

/// One flag forwarded to the launch command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchFlag {
    /// Flag text as passed on the command line (for example `--subnet`).
    pub flag: String,
    /// Value or values emitted after the flag.
    pub value: FlagValue,
}

impl LaunchFlag {
    /// Number of times the flag appears on the command line.
    #[must_use]
    pub fn occurrences(&self) -> usize {
        match &self.value {
            FlagValue::Switch | FlagValue::Single(_) => 1,
            FlagValue::Repeated(values) => values.len(),
        }
    }
}

/// Ordered, immutable set of options for one launch.
///
/// Built once from parsed arguments with [`LaunchOptionsBuilder`]; options
/// that were not supplied are never recorded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchOptions {
    flags: Vec<LaunchFlag>,
}

impl LaunchOptions {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> LaunchOptionsBuilder {
        LaunchOptionsBuilder::default()
    }

    /// Recorded flags in emission order.
    #[must_use]
    pub fn flags(&self) -> &[LaunchFlag] {
        &self.flags
    }

    /// Looks up a recorded flag by its text.
    #[must_use]
    pub fn get(&self, flag: &str) -> Option<&FlagValue> {
        self.flags
            .iter()
            .find(|entry| entry.flag == flag)
            .map(|entry| &entry.value)
    }

    /// Total number of flag occurrences [`Self::to_args`] will emit.
    #[must_use]
    pub fn flag_occurrences(&self) -> usize {
        self.flags.iter().map(LaunchFlag::occurrences).sum()
    }

    /// Renders the argument vector, with `image_id` as the trailing
    /// positional argument.
    #[must_use]
    pub fn to_args(&self, image_id: &str) -> Vec<OsString> {
        let mut args = Vec::new();
        for entry in &self.flags {
            match &entry.value {
                FlagValue::Switch => args.push(OsString::from(&entry.flag)),
                FlagValue::Single(value) => {
                    args.push(OsString::from(&entry.flag));
                    args.push(OsString::from(value));
                }
                FlagValue::Repeated(values) => {
                    for value in values {
                        args.push(OsString::from(&entry.flag));
                        args.push(OsString::from(value));
                    }
                }
            }
        }
        args.push(OsString::from(image_id));
        args
    }

    /// Renders the command line for display in logs.
    #[must_use]
    pub fn display_command(&self, program: &str, image_id: &str) -> String {
        let mut parts = vec![program.to_owned()];
        parts.extend(
            self.to_args(image_id)
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

/// Collects flags in insertion order, skipping anything not supplied.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchOptionsBuilder {
    flags: Vec<LaunchFlag>,
}

impl LaunchOptionsBuilder {
    /// Records `flag` without a value when `enabled` is set.
    #[must_use]
    pub fn switch(mut self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.push(flag, FlagValue::Switch);
        }
        self
    }

    /// Records `flag value` when a value was supplied.
    #[must_use]
    pub fn single(mut self, flag: &str, value: Option<&str>) -> Self {
        if let Some(text) = value {
            self.push(flag, FlagValue::Single(text.to_owned()));
        }
        self
    }

    /// Records `flag` once per value when at least one value was supplied.
    #[must_use]
    pub fn repeated(mut self, flag: &str, values: &[String]) -> Self {
        if !values.is_empty() {
            self.push(flag, FlagValue::Repeated(values.to_vec()));
        }
        self
    }

    /// Finishes the option set.
    #[must_use]
    pub fn build(self) -> LaunchOptions {
        LaunchOptions { flags: self.flags }
    }

    fn push(&mut self, flag: &str, value: FlagValue) {
        self.flags.push(LaunchFlag {
            flag: flag.to_owned(),
            value,
        });
    }
}
