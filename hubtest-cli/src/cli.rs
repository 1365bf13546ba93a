//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative apart from [`RunArgs::apply`], which folds flag
//! overrides into an already-loaded configuration.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use hubtest_core::config::HubtestConfig;

/// Config file used when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_PATH: &str = "hubtest.toml";

/// hubtest -- run the JupyterHub end-to-end login test through a compose harness.
///
/// Use `hubtest <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "hubtest", version, about, long_about = None)]
pub struct Cli {
    /// Path to the hubtest.toml configuration file [default: hubtest.toml].
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective config path and whether the user named it explicitly.
    pub fn config_path(&self) -> (&Path, bool) {
        match &self.config {
            Some(path) => (path.as_path(), true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring the harness up, wait for the test runner, tear it down.
    Run(RunArgs),

    /// Inspect or validate configuration.
    Config(ConfigArgs),

    /// Print the variables exported to the compose harness.
    Env,
}

// ---- run ----

/// Run the end-to-end test once.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JupyterHub image under test (image[:tag]).
    #[arg(long)]
    pub base_image: Option<String>,

    /// Test spec path or glob handed to the test runner.
    #[arg(long)]
    pub spec: Option<String>,

    /// Host path of the JupyterHub config to inject.
    #[arg(long)]
    pub config_src: Option<String>,

    /// In-container destination of the JupyterHub config.
    #[arg(long)]
    pub config_dest: Option<String>,

    /// Host path of a pre-seeded SQLite database (pair with --db-dest).
    #[arg(long)]
    pub db_src: Option<String>,

    /// In-container destination of the database (pair with --db-src).
    #[arg(long)]
    pub db_dest: Option<String>,

    /// Compose topology file.
    #[arg(long)]
    pub compose_file: Option<String>,

    /// Service whose exit code decides the run.
    #[arg(long)]
    pub service: Option<String>,

    /// Compose project name.
    #[arg(long)]
    pub project_name: Option<String>,

    /// Resolve configuration and print the planned commands without running them.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Fold flag overrides into `config`. Flags win over file and environment.
    pub fn apply(&self, config: &mut HubtestConfig) {
        let overrides = [
            (&self.base_image, &mut config.harness.base_image),
            (&self.spec, &mut config.harness.spec),
            (&self.config_src, &mut config.harness.config_src),
            (&self.config_dest, &mut config.harness.config_dest),
            (&self.db_src, &mut config.harness.db_src),
            (&self.db_dest, &mut config.harness.db_dest),
            (&self.compose_file, &mut config.compose.file),
            (&self.service, &mut config.compose.test_runner_service),
            (&self.project_name, &mut config.compose.project_name),
        ];
        for (flag, target) in overrides {
            if let Some(value) = flag {
                *target = value.clone();
            }
        }
    }
}

// ---- config ----

/// Manage hubtest configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and check that host paths exist.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, harness, compose).
        #[arg(long)]
        section: Option<String>,
    },
}
