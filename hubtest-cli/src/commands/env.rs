//! `hubtest env` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use hubtest_compose::HarnessEnv;

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `env` command.
///
/// Prints exactly what `run` would export to the orchestration tool, so the
/// harness can be brought up by hand with `docker-compose --env-file`.
pub async fn execute(
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = super::load_validated(config_path, explicit).await?;
    let working_dir = std::env::current_dir()?;
    let env = HarnessEnv::from_config(&config.harness, &working_dir);
    writer.render(&EnvReport::from(&env))?;
    Ok(())
}

/// Exported harness variables.
#[derive(Serialize)]
pub struct EnvReport {
    pub vars: BTreeMap<String, String>,
    /// Pre-rendered `.env` text, in export order.
    #[serde(skip)]
    pub dotenv: String,
}

impl From<&HarnessEnv> for EnvReport {
    fn from(env: &HarnessEnv) -> Self {
        Self {
            vars: env.vars().iter().cloned().collect(),
            dotenv: env.render_dotenv(),
        }
    }
}

impl Render for EnvReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        write!(w, "{}", self.dotenv)
    }
}
