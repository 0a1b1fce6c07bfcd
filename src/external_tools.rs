use crate::errors::{AppError, Result, StageExecutionError, StageFailure};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use tracing::{info, warn};

/// Executable names for every external collaborator of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub homer_tools: String,
    pub bowtie2: String,
    pub bowtie2_inspect: String,
    pub samtools: String,
    pub make_tag_directory: String,
    pub make_ucsc_file: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            homer_tools: "homerTools".to_string(),
            bowtie2: "bowtie2".to_string(),
            bowtie2_inspect: "bowtie2-inspect".to_string(),
            samtools: "samtools".to_string(),
            make_tag_directory: "makeTagDirectory".to_string(),
            make_ucsc_file: "makeUCSCfile".to_string(),
        }
    }
}

impl Toolchain {
    /// Runs `bowtie2-inspect -s <index>` and discards its output. Any launch
    /// failure or non-zero exit means the index is unusable.
    pub fn inspect_index(&self, index: &str) -> Result<()> {
        let output = Command::new(&self.bowtie2_inspect)
            .arg("-s")
            .arg(index)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| AppError::BadReferenceIndex {
                index: index.to_string(),
                reason: if err.kind() == std::io::ErrorKind::NotFound {
                    format!("{} not found in PATH", self.bowtie2_inspect)
                } else {
                    err.to_string()
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output");
            return Err(AppError::BadReferenceIndex {
                index: index.to_string(),
                reason: format!(
                    "{} exited with {}: {detail}",
                    self.bowtie2_inspect,
                    describe_status(&output.status)
                ),
            });
        }
        Ok(())
    }
}

/// One executable plus its discrete argument tokens. Nothing is passed
/// through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl AsRef<OsStr>) -> Self {
        self.args.push(value.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(values.into_iter().map(|value| value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// A single command or a chain of commands where each stdout feeds the next
/// stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    steps: Vec<ToolCommand>,
}

impl Invocation {
    pub fn single(command: ToolCommand) -> Self {
        Self {
            steps: vec![command],
        }
    }

    pub fn pipe(mut self, next: ToolCommand) -> Self {
        self.steps.push(next);
        self
    }

    pub fn steps(&self) -> &[ToolCommand] {
        &self.steps
    }
}

impl From<ToolCommand> for Invocation {
    fn from(command: ToolCommand) -> Self {
        Self::single(command)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Runs `invocation` to completion with stdout and stderr of every process
/// appended to `log_path`, then classifies the outcome.
pub fn invoke(
    stage: &'static str,
    invocation: &Invocation,
    log_path: &Path,
) -> std::result::Result<(), StageExecutionError> {
    let fail = |failure: StageFailure| StageExecutionError {
        stage,
        log_path: log_path.to_path_buf(),
        failure,
    };
    let log_failure = |source: std::io::Error| {
        fail(StageFailure::Housekeeping {
            action: format!("opening log {}", log_path.display()),
            source,
        })
    };

    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(log_failure)?;
    }
    let log = File::create(log_path).map_err(log_failure)?;

    info!(stage, command = %invocation, log = %log_path.display(), "running external tool");

    let mut children: Vec<(String, Child)> = Vec::with_capacity(invocation.steps.len());
    let mut upstream: Option<ChildStdout> = None;
    let last = invocation.steps.len().saturating_sub(1);
    for (index, step) in invocation.steps.iter().enumerate() {
        let mut command = step.to_command();
        command.stdin(upstream.take().map_or_else(Stdio::null, Stdio::from));
        command.stderr(Stdio::from(log.try_clone().map_err(log_failure)?));
        if index == last {
            command.stdout(Stdio::from(log.try_clone().map_err(log_failure)?));
        } else {
            command.stdout(Stdio::piped());
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                abandon(children);
                return Err(fail(StageFailure::Launch {
                    program: step.program.clone(),
                    source,
                }));
            }
        };
        upstream = child.stdout.take();
        children.push((step.program.clone(), child));
    }

    let mut first_failure = None;
    for (program, mut child) in children {
        let status = child.wait().map_err(|source| {
            fail(StageFailure::Housekeeping {
                action: format!("waiting for {program}"),
                source,
            })
        })?;
        if !status.success() && first_failure.is_none() {
            warn!(stage, program = %program, status = %describe_status(&status), "external tool failed");
            first_failure = Some(match status.code() {
                Some(code) => StageFailure::ExitStatus { code },
                None => StageFailure::Signal,
            });
        }
    }

    match first_failure {
        Some(failure) => Err(fail(failure)),
        None => Ok(()),
    }
}

fn abandon(children: Vec<(String, Child)>) {
    for (program, mut child) in children {
        if let Err(error) = child.kill() {
            warn!(program = %program, error = %error, "failed to stop upstream process");
        }
        let _ = child.wait();
    }
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
