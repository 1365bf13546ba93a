//! `hubtest config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use hubtest_core::config::HubtestConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, explicit, writer).await,
        ConfigAction::Show { section } => {
            execute_show(config_path, explicit, section, writer).await
        }
    }
}

/// Validate values and check that every host-side file exists.
///
/// # Errors
///
/// Returns `CliError::Config` if anything is wrong; the report listing the
/// problem is rendered first.
async fn execute_validate(
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let working_dir = std::env::current_dir()?;
    let result = match super::load_validated(config_path, explicit).await {
        Ok(config) => config.check_host_paths(&working_dir).map_err(CliError::from),
        Err(e) => Err(e),
    };

    let report = ConfigValidationReport {
        source: source_label(config_path, explicit),
        valid: result.is_ok(),
        errors: result.err().map(|e| e.to_string()).into_iter().collect(),
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Show the effective configuration (file + env overrides + defaults).
async fn execute_show(
    config_path: &Path,
    explicit: bool,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = super::load_validated(config_path, explicit).await?;
    let report = ConfigReport {
        source: source_label(config_path, explicit),
        section: section.clone(),
        config_toml: section_toml(&config, section.as_deref())?,
    };

    writer.render(&report)?;
    Ok(())
}

fn section_toml(config: &HubtestConfig, section: Option<&str>) -> Result<String, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("harness") => toml::to_string_pretty(&config.harness),
        Some("compose") => toml::to_string_pretty(&config.compose),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: general, harness, compose)",
                other
            )));
        }
    };
    Ok(rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)))
}

fn source_label(config_path: &Path, explicit: bool) -> String {
    if explicit || config_path.exists() {
        config_path.display().to_string()
    } else {
        "(defaults)".to_owned()
    }
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
