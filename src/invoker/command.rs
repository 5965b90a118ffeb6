use crate::error::{DumpSiftError, Result};
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a single tool invocation. There is no retry edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Called on every state transition of a [`ToolCommand`].
pub type ProgressCallback = Arc<dyn Fn(InvocationState) + Send + Sync>;

/// A fully materialized external command. Arguments stay separate argv entries
/// all the way to the OS, so no shell ever splits them.
#[derive(Clone)]
pub struct ToolCommand {
    tool: String,
    program: PathBuf,
    args: Vec<OsString>,
    state: InvocationState,
    progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCommand")
            .field("tool", &self.tool)
            .field("program", &self.program)
            .field("args", &self.args)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

impl ToolCommand {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(tool: S, program: P) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            state: InvocationState::Idle,
            progress_callback: None,
        }
    }

    /// Observe `Running` right before the spawn and `Completed` or `Failed`
    /// right after the wait. No log line is emitted in between.
    pub fn with_progress(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    pub fn arg<A: AsRef<OsStr>>(mut self, arg: A) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Program followed by arguments, lossily converted for inspection.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    /// Spawn the child, wait once for it to exit and collect both streams.
    ///
    /// A non-zero exit status is reported but not turned into an error; the
    /// caller decides whether the captured output is usable.
    pub fn run(&mut self) -> Result<ToolOutput> {
        info!("Running {}: {}", self.tool, self);
        self.transition(InvocationState::Running);

        let start = Instant::now();
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = match spawned {
            Ok(output) => output,
            Err(source) => {
                self.transition(InvocationState::Failed);
                return Err(DumpSiftError::ToolInvocation {
                    tool: self.tool.clone(),
                    program: self.program.display().to_string(),
                    source,
                });
            }
        };

        let result = ToolOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
            duration: start.elapsed(),
        };
        self.transition(InvocationState::Completed);

        if !result.success() {
            warn!(
                "{} exited with status {:?}; keeping its output",
                self.tool, result.exit_code
            );
        }

        if !result.stderr.is_empty() {
            debug!(
                "{} stderr: {}",
                self.tool,
                String::from_utf8_lossy(&result.stderr).trim_end()
            );
        }

        Ok(result)
    }

    fn transition(&mut self, state: InvocationState) {
        self.state = state;
        if let Some(ref callback) = self.progress_callback {
            callback(state);
        }
    }
}

impl fmt::Display for ToolCommand {
    /// POSIX shell rendering, suitable for copy-paste from logs and dry runs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.argv().iter().map(|a| shell_quote(a)).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

pub fn shell_quote(arg: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c);

    if !arg.is_empty() && arg.chars().all(is_safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("crash1.DMP"), "crash1.DMP");
        assert_eq!(shell_quote("/tmp/work/bins/a b.DMP"), "'/tmp/work/bins/a b.DMP'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("{num_threads}"), "'{num_threads}'");
    }

    #[test]
    fn test_arguments_stay_whole() {
        let command = ToolCommand::new("radare2", "r2")
            .args(["-qc", "iSj"])
            .arg("/tmp/my dumps/crash 1.DMP");

        assert_eq!(command.get_args().len(), 3);
        assert_eq!(
            command.argv(),
            vec!["r2", "-qc", "iSj", "/tmp/my dumps/crash 1.DMP"]
        );
        assert_eq!(
            command.to_string(),
            "r2 -qc iSj '/tmp/my dumps/crash 1.DMP'"
        );
        assert_eq!(command.state(), InvocationState::Idle);
    }

    #[test]
    fn test_missing_executable_is_invocation_error() {
        let mut command = ToolCommand::new("radare2", "/nonexistent/dumpsift/r2").arg("x");

        let err = command.run().unwrap_err();
        match err {
            DumpSiftError::ToolInvocation { tool, source, .. } => {
                assert_eq!(tool, "radare2");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(command.state(), InvocationState::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let mut command = ToolCommand::new("shell", "sh").args(["-c", "echo partial; exit 3"]);

        let output = command.run().unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout_lossy(), "partial\n");
        assert_eq!(command.state(), InvocationState::Completed);
    }

    #[test]
    fn test_progress_callback_sees_transitions() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |state| sink.lock().unwrap().push(state));

        let mut command = ToolCommand::new("radare2", "/nonexistent/dumpsift/r2")
            .with_progress(Some(callback));
        assert!(command.run().is_err());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![InvocationState::Running, InvocationState::Failed]
        );
    }
}
