//! Instance launch through the `ec2run` command line tool.

mod options;

use thiserror::Error;
use tracing::{debug, info};

use crate::command::{CommandError, CommandRunner, combined_output, describe_status};

pub use options::{FlagValue, LaunchFlag, LaunchOptions, LaunchOptionsBuilder};

/// Errors raised while launching an instance.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LaunchError {
    /// The launch command could not be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
    /// The launch command exited unsuccessfully.
    #[error("{program} exited with status {status_text}. Output follows.\n---\n{output}\n---")]
    Failed {
        /// Program that was executed.
        program: String,
        /// Human readable exit status.
        status_text: String,
        /// Combined stdout and stderr.
        output: String,
    },
}

/// Runs the launch command with a fixed option set.
#[derive(Clone, Debug)]
pub struct Launcher<R: CommandRunner> {
    program: String,
    help_program: String,
    runner: R,
}

impl<R: CommandRunner> Launcher<R> {
    /// Creates a launcher for `program`, using `help_program -h` for
    /// [`Launcher::help`].
    pub fn new(program: impl Into<String>, help_program: impl Into<String>, runner: R) -> Self {
        Self {
            program: program.into(),
            help_program: help_program.into(),
            runner,
        }
    }

    /// Launches one instance and returns the tool's combined output.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Failed`] on a non-zero exit; there is no retry.
    pub fn launch(&self, options: &LaunchOptions, image_id: &str) -> Result<String, LaunchError> {
        info!(
            command = %options.display_command(&self.program, image_id),
            "executing launch command"
        );
        let output = self.runner.run(&self.program, &options.to_args(image_id))?;
        let text = combined_output(&output);
        if !output.is_success() {
            return Err(LaunchError::Failed {
                program: self.program.clone(),
                status_text: describe_status(output.code),
                output: text,
            });
        }
        debug!(output = %text, "launch command output");
        Ok(text)
    }

    /// Returns the launch tool's own option help.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Runner`] when the help command cannot start.
    pub fn help(&self) -> Result<String, LaunchError> {
        let output = self
            .runner
            .run(&self.help_program, &[std::ffi::OsString::from("-h")])?;
        Ok(combined_output(&output))
    }
}
