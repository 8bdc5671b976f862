//! In-memory Puppet master reached through `ssh`.
//!
//! `SimulatedHost` implements `CommandRunner`: `ssh` invocations are
//! interpreted against an in-memory filesystem and certificate queue, and
//! every other program is delegated to a `ScriptedRunner` so EC2 tool output
//! can still be scripted. Only the command shapes the crate emits are
//! understood; anything else fails loudly with status 127.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::rc::Rc;

use ec2_deploy::command::{CommandError, CommandOutput, CommandRunner};
use ec2_deploy::test_support::ScriptedRunner;

#[derive(Clone, Debug)]
struct CertificateScript {
    name: String,
    visible_after_polls: u32,
}

#[derive(Debug, Default)]
struct HostState {
    files: BTreeMap<String, String>,
    connected: bool,
    connections: u32,
    closes: u32,
    remote_commands: Vec<String>,
    certificate: Option<CertificateScript>,
    list_polls: u32,
    signed: Vec<String>,
    racing_append: Option<String>,
}

/// Puppet master double shared between clones.
#[derive(Clone, Debug, Default)]
pub struct SimulatedHost {
    state: Rc<RefCell<HostState>>,
    fallback: ScriptedRunner,
}

impl SimulatedHost {
    /// Creates an empty host that delegates non-SSH programs to `fallback`.
    pub fn new(fallback: ScriptedRunner) -> Self {
        Self {
            state: Rc::default(),
            fallback,
        }
    }

    /// Runner receiving every non-SSH invocation.
    pub const fn fallback(&self) -> &ScriptedRunner {
        &self.fallback
    }

    /// Creates or replaces a file.
    pub fn add_file(&self, path: &str, contents: &str) {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_owned(), contents.to_owned());
    }

    /// Returns a file's contents, if present.
    pub fn file(&self, path: &str) -> Option<String> {
        self.state.borrow().files.get(path).cloned()
    }

    /// Makes a certificate request for `name` visible once `polls` listings
    /// have come back empty.
    pub fn request_certificate_after(&self, name: &str, polls: u32) {
        self.state.borrow_mut().certificate = Some(CertificateScript {
            name: name.to_owned(),
            visible_after_polls: polls,
        });
    }

    /// Appends `text` to the target file just before the next guarded
    /// append checks the file length, as a concurrent writer would.
    pub fn race_next_guarded_append(&self, text: &str) {
        self.state.borrow_mut().racing_append = Some(text.to_owned());
    }

    /// Certificates signed so far, in order.
    pub fn signed(&self) -> Vec<String> {
        self.state.borrow().signed.clone()
    }

    /// Number of control masters opened.
    pub fn connections(&self) -> u32 {
        self.state.borrow().connections
    }

    /// Number of control masters closed.
    pub fn closes(&self) -> u32 {
        self.state.borrow().closes
    }

    /// Whether a control master is currently open.
    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    /// Remote command lines received over the control master.
    pub fn remote_commands(&self) -> Vec<String> {
        self.state.borrow().remote_commands.clone()
    }

    fn handle_ssh(&self, args: &[OsString]) -> CommandOutput {
        let words: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let mut state = self.state.borrow_mut();

        if words.iter().any(|word| word == "-N") {
            state.connected = true;
            state.connections += 1;
            return ok("");
        }
        if words.iter().any(|word| word == "-O") {
            if !state.connected {
                return fail(255, "Control socket connect: No such file or directory");
            }
            state.connected = false;
            state.closes += 1;
            return ok("");
        }
        if !state.connected {
            return fail(255, "ssh: no control master running");
        }

        let Some(line) = words.last() else {
            return fail(255, "ssh: missing destination");
        };
        state.remote_commands.push(line.clone());
        state.execute(line)
    }
}

impl CommandRunner for SimulatedHost {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        if program == "ssh" {
            return Ok(self.handle_ssh(args));
        }
        self.fallback.run(program, args)
    }
}

impl HostState {
    fn execute(&mut self, line: &str) -> CommandOutput {
        let tokens = split_shell(line);
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
        match words.as_slice() {
            ["ls", "-1", "--", dir] => self.list(dir),
            ["test", "-e", path] => {
                if self.files.contains_key(*path) {
                    ok("")
                } else {
                    fail(1, "")
                }
            }
            ["cp", "-b", "--", source, target] => self.copy(source, target),
            ["sed", "-i", expression, path] => self.substitute(expression, path),
            ["touch", "--", path] => {
                self.files.entry((*path).to_owned()).or_default();
                ok("")
            }
            ["touch", "--", path, "&&", "wc", "-c", "<", counted, "&&", "cat", "--", same]
                if path == counted && path == same =>
            {
                let contents = self.files.entry((*path).to_owned()).or_default();
                ok(&format!("{}\n{contents}", contents.len()))
            }
            ["printf", "%s\\n", rest @ ..] => self.append_lines(rest),
            ["flock", path, "-c", script] => self.guarded(path, script),
            [.., "cert", "list"] => self.list_certificates(),
            [.., "cert", "sign", name] => self.sign(name),
            _ => fail(127, &format!("simulated host cannot run: {line}")),
        }
    }

    fn list(&self, dir: &str) -> CommandOutput {
        let prefix = format!("{dir}/");
        let names: String = self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&prefix))
            .filter(|name| !name.contains('/'))
            .map(|name| format!("{name}\n"))
            .collect();
        ok(&names)
    }

    fn copy(&mut self, source: &str, target: &str) -> CommandOutput {
        let Some(contents) = self.files.get(source).cloned() else {
            return fail(1, &format!("cp: cannot stat '{source}': No such file or directory"));
        };
        if let Some(previous) = self.files.insert(target.to_owned(), contents) {
            self.files.insert(format!("{target}~"), previous);
        }
        ok("")
    }

    fn substitute(&mut self, expression: &str, path: &str) -> CommandOutput {
        let Some((pattern, replacement)) = expression
            .strip_prefix("s/")
            .and_then(|rest| rest.strip_suffix('/'))
            .and_then(|rest| rest.split_once('/'))
        else {
            return fail(1, &format!("sed: unsupported expression {expression}"));
        };
        let Some(contents) = self.files.get_mut(path) else {
            return fail(2, &format!("sed: can't read {path}: No such file or directory"));
        };
        let replaced: String = contents
            .lines()
            .map(|line| format!("{}\n", line.replacen(pattern, replacement, 1)))
            .collect();
        *contents = replaced;
        ok("")
    }

    fn append_lines(&mut self, rest: &[&str]) -> CommandOutput {
        let [lines @ .., ">>", path] = rest else {
            return fail(127, "printf without append target");
        };
        let file = self.files.entry((*path).to_owned()).or_default();
        for line in lines {
            file.push_str(line);
            file.push('\n');
        }
        ok("")
    }

    fn guarded(&mut self, path: &str, script: &str) -> CommandOutput {
        let parsed = script
            .strip_prefix("if test \"$(wc -c < ")
            .and_then(|rest| rest.split_once(")\" -eq "))
            .and_then(|(_, rest)| rest.split_once("; then "))
            .and_then(|(len, rest)| {
                let (inner, _) = rest.split_once("; else exit 3; fi")?;
                Some((len.parse::<usize>().ok()?, inner.to_owned()))
            });
        let Some((expected_len, inner)) = parsed else {
            return fail(127, &format!("unsupported guarded script: {script}"));
        };

        if let Some(racer) = self.racing_append.take() {
            self.files.entry(path.to_owned()).or_default().push_str(&racer);
        }
        let current_len = self.files.get(path).map_or(0, String::len);
        if current_len != expected_len {
            return fail(3, "");
        }
        self.execute(&inner)
    }

    fn list_certificates(&mut self) -> CommandOutput {
        self.list_polls += 1;
        match self.certificate {
            Some(ref request)
                if self.list_polls > request.visible_after_polls
                    && !self.signed.contains(&request.name) =>
            {
                ok(&format!("  \"{}\" (SHA256) AB:CD:EF\n", request.name))
            }
            _ => ok(""),
        }
    }

    fn sign(&mut self, name: &str) -> CommandOutput {
        let requested = self
            .certificate
            .as_ref()
            .is_some_and(|request| request.name == name);
        if !requested || self.signed.iter().any(|signed| signed == name) {
            return fail(24, &format!("Error: Could not find CSR for {name}"));
        }
        self.signed.push(name.to_owned());
        ok(&format!("Notice: Signed certificate request for {name}\n"))
    }
}

fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

/// Splits a POSIX shell line into words, honouring single quotes, double
/// quotes and backslash escapes. Operators stay separate words only when
/// surrounded by whitespace, which is how the crate renders them.
fn split_shell(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                in_word = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                in_word = true;
            }
            '\\' if !in_single => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            other if other.is_whitespace() && !in_single && !in_double => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                current.push(other);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
