//! Compose adapter error types.

/// Errors raised while driving the orchestration tool.
///
/// None of these represent a test failure: a test runner that exits
/// non-zero is reported through the `up` exit code, not through this type.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The program could not be started at all (not installed, not executable).
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The topology file was rejected by `config -q`.
    #[error("compose topology is invalid: {stderr}")]
    InvalidTopology { stderr: String },

    /// A helper command (`ps`, `inspect`, `down`) exited non-zero.
    #[error("'{command}' exited with {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Output of a helper command could not be understood.
    #[error("unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },

    /// `up` did not finish within the configured limit.
    #[error("'up' did not finish within {secs}s")]
    Timeout { secs: u64 },

    /// Waiting on a spawned child failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    /// True when the failure happened before any container could exist.
    pub fn is_pre_spawn(&self) -> bool {
        matches!(self, Self::Spawn { .. } | Self::InvalidTopology { .. })
    }
}
