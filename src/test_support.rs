//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;

use crate::command::{CommandError, CommandOutput, CommandRunner};

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns the final argument, which for SSH invocations is the remote
    /// command line.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the programs invoked so far, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|call| call.program.clone())
            .collect()
    }

    /// Returns how many scripted responses have not been consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Pushes a successful exit status with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Canned `ec2run` output for a freshly launched instance.
#[must_use]
pub fn ec2run_output(instance_id: &str) -> String {
    format!(
        concat!(
            "RESERVATION\tr-1a2b3c4d\t123456789012\n",
            "INSTANCE\t{id}\tami-12345678\t\t\tpending\tops\t0\t\tm1.small\t",
            "2013-05-01T10:00:00+0000\tus-east-1b\n"
        ),
        id = instance_id
    )
}

/// Canned `ec2-describe-network-interfaces` output listing one interface.
#[must_use]
pub fn describe_interfaces_output(subnet_id: &str, ip: &str) -> String {
    format!(
        concat!(
            "NETWORKINTERFACE\teni-1a2b3c4d\t\t{subnet}\tvpc-1a2b3c4d\tus-east-1b\t",
            "123456789012\tfalse\tin-use\t0e:aa:bb:cc:dd:ee\t{ip}\ttrue\n",
            "ATTACHMENT\teni-attach-1a2b3c4d\tattached\t2013-05-01T10:00:05+0000\ttrue\n",
            "PRIVATEIPADDRESS\t{ip}\n"
        ),
        subnet = subnet_id,
        ip = ip
    )
}

/// Canned `ec2-describe-subnets` output with the zone as the 7th token.
#[must_use]
pub fn describe_subnets_output(subnet_id: &str, zone: &str) -> String {
    format!("SUBNET\t{subnet_id}\tavailable\tvpc-1a2b3c4d\t10.0.0.0/24\t250\t{zone}\n")
}
