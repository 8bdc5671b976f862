//! External process execution behind a small trait seam.
//!
//! Every EC2 tool and every SSH invocation goes through [`CommandRunner`], so
//! tests can script process outcomes without spawning anything.

mod types;

pub use types::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};

/// Renders an optional exit code for diagnostics.
///
/// Processes killed by a signal report no code, which is shown as
/// `unknown`.
#[must_use]
pub fn describe_status(code: Option<i32>) -> String {
    code.map_or_else(|| String::from("unknown"), |value| value.to_string())
}

/// Joins stdout and stderr the way a shell capturing `2>&1` would present
/// them to an operator.
#[must_use]
pub fn combined_output(output: &CommandOutput) -> String {
    let stdout = output.stdout.trim_end();
    let stderr = output.stderr.trim_end();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_owned(),
        (true, false) => stderr.to_owned(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
