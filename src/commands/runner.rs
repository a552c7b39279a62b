//! Process runner for candidate and reference search programs.
//!
//! Both programs share one positional convention:
//!
//! ```text
//! <executable> <inputFile> <deviceSelector> <outputSink>
//! ```
//!
//! Arguments are built from a validated [`Invocation`] rather than assembled
//! by hand, so the two call sites cannot drift apart.

use crate::error::{OracleError, Result};
use crate::streaming::CapturedOutput;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Backend selector passed as the second positional argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceSelector(String);

impl DeviceSelector {
    /// Selector reserved for deterministic (gold) reference output.
    pub const GOLD: &'static str = "G";

    /// Validate a selector token.
    ///
    /// The token is opaque to the oracle but must be a single non-empty
    /// word that cannot be mistaken for an option.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(OracleError::Usage("device selector is empty".to_string()));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(OracleError::Usage(format!(
                "device selector '{}' contains whitespace",
                token
            )));
        }
        if token.starts_with('-') {
            return Err(OracleError::Usage(format!(
                "device selector '{}' looks like an option",
                token
            )));
        }
        Ok(Self(token))
    }

    /// The gold-mode selector.
    pub fn gold() -> Self {
        Self(Self::GOLD.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the program should write its match records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// `-`: records go to standard output.
    Stdout,
    /// Records go to the named file.
    File(PathBuf),
}

impl OutputSink {
    fn to_arg(&self) -> OsString {
        match self {
            OutputSink::Stdout => OsString::from("-"),
            OutputSink::File(path) => path.as_os_str().to_owned(),
        }
    }
}

/// One fully validated program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    input: PathBuf,
    device: DeviceSelector,
    sink: OutputSink,
}

impl Invocation {
    /// Build an invocation, rejecting inputs the oracle cannot track.
    ///
    /// The input must name a real path: `-` (stdin) is refused because gold
    /// artifacts are keyed by the input path.
    pub fn new(input: impl Into<PathBuf>, device: DeviceSelector, sink: OutputSink) -> Result<Self> {
        let input = input.into();
        if input.as_os_str().is_empty() {
            return Err(OracleError::Usage("input file path is empty".to_string()));
        }
        if input.as_os_str() == "-" {
            return Err(OracleError::Usage(
                "input must be a file path, not '-'".to_string(),
            ));
        }
        if let OutputSink::File(path) = &sink {
            if path.as_os_str().is_empty() {
                return Err(OracleError::Usage("output sink path is empty".to_string()));
            }
        }
        Ok(Self {
            input,
            device,
            sink,
        })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn device(&self) -> &DeviceSelector {
        &self.device
    }

    pub fn sink(&self) -> &OutputSink {
        &self.sink
    }

    /// Positional argument vector: `[input, device, sink]`.
    pub fn args(&self) -> [OsString; 3] {
        [
            self.input.as_os_str().to_owned(),
            OsString::from(self.device.as_str()),
            self.sink.to_arg(),
        ]
    }
}

/// Result of running a program to completion.
#[derive(Debug)]
pub struct ProcessOutput {
    /// Everything the program wrote to standard output.
    pub stdout: CapturedOutput,
    /// Exit status; non-zero is reported, not treated as an error here.
    pub status: ExitStatus,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or None if the process was killed by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Runs one external executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the program and block until it exits.
    ///
    /// Standard output is spooled to an anonymous temp file so large result
    /// sets never have to be concatenated in memory; stderr passes through.
    pub fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let spool = tempfile::tempfile()?;
        let stdout = spool.try_clone()?;

        let status = Command::new(&self.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| OracleError::ProcessLaunch {
                program: self.program.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            stdout: CapturedOutput::from_file(spool)?,
            status,
        })
    }
}
