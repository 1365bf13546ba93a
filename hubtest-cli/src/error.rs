//! CLI-specific error types and exit code mapping

use hubtest_core::error::HubtestError;

/// Exit code for configuration errors (`EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;
/// Exit code for orchestration-startup errors (`EX_UNAVAILABLE`).
pub const EXIT_STARTUP: i32 = 69;
/// Exit code for local I/O and output errors (`EX_IOERR`).
pub const EXIT_IO: i32 = 74;
/// Exit code after an operator interrupt (shell convention for SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;

/// CLI-specific error type.
///
/// A failing test is *not* an error: `run` returns the test runner's exit
/// code as a value. Everything here is a reason the verdict could not be
/// produced, and maps to a code in the sysexits range so it cannot be
/// mistaken for a small count of failed tests.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// The harness failed before the test runner produced an exit code.
    #[error("startup error: {0}")]
    Startup(String),

    /// An operator signal stopped the run.
    #[error("interrupted by {0}")]
    Interrupted(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (current directory, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from hubtest-core.
    #[error("{0}")]
    Core(#[from] HubtestError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 1    | General / command error              |
    /// | 69   | Orchestration-startup error          |
    /// | 74   | IO / output error                    |
    /// | 78   | Configuration error                  |
    /// | 130  | Interrupted                          |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Startup(_) => EXIT_STARTUP,
            Self::Interrupted(_) => EXIT_INTERRUPTED,
            Self::Io(_) | Self::JsonSerialize(_) => EXIT_IO,
            Self::Command(_) => 1,
            Self::Core(core) => match core {
                HubtestError::Config(_) => EXIT_CONFIG,
                HubtestError::Io(_) => EXIT_IO,
            },
        }
    }
}

/// Narrow an exit code to the `u8` a process can actually return.
///
/// Mirrors the shell's `& 0xff`, except that a non-zero code is never
/// folded into 0: a failing run must not look like a pass.
pub fn process_exit_code(code: i32) -> u8 {
    let low = (code & 0xff) as u8;
    if code != 0 && low == 0 { 1 } else { low }
}
