//! `hubtest run` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hubtest_compose::DockerComposeClient;
use hubtest_compose::HarnessEnv;
use hubtest_core::types::{RunOutcome, TeardownStatus};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::launcher::{Launcher, RunReport};
use crate::output::{OutputWriter, Render};
use crate::signal;

/// Execute the `run` command.
///
/// Returns the test runner's exit code on a completed run (zero or not).
///
/// # Errors
///
/// - `CliError::Config` / `CliError::Core`: bad configuration or missing host files
/// - `CliError::Startup`: the harness never produced a verdict
/// - `CliError::Interrupted`: an operator signal stopped the run
pub async fn execute(
    args: RunArgs,
    config_path: &Path,
    explicit: bool,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    let mut config = super::load_config(config_path, explicit).await?;
    args.apply(&mut config);
    config.validate()?;

    let working_dir = std::env::current_dir()?;
    config.check_host_paths(&working_dir)?;

    let env = HarnessEnv::from_config(&config.harness, &working_dir);
    let client = DockerComposeClient::from_config(&config.compose, env, &working_dir);
    let service = config.compose.test_runner_service.clone();

    if args.dry_run {
        info!("dry run, no commands will be executed");
        writer.render(&RunPlan::new(&client, &service, &working_dir))?;
        return Ok(0);
    }

    let token = CancellationToken::new();
    let abort = CancellationToken::new();
    let listener = signal::spawn_listener(token.clone(), abort.clone());

    let report = Launcher::new(client, service)
        .with_teardown_abort(abort.clone())
        .run(token.clone())
        .await;

    let signal = if token.is_cancelled() {
        // 실행이 끝났으므로 두 번째 시그널 대기를 해제
        abort.cancel();
        listener.await.ok().flatten()
    } else {
        listener.abort();
        None
    };

    // 보고서 출력 실패가 테스트 결과 코드를 바꾸면 안 됨
    if let Err(e) = writer.render(&report) {
        warn!(error = %e, "failed to write run report");
    }

    verdict(&report, signal)
}

/// Map a finished run to the process result.
fn verdict(report: &RunReport, signal: Option<&str>) -> Result<i32, CliError> {
    match report.outcome {
        RunOutcome::Passed | RunOutcome::TestFailed => report
            .exit_code
            .ok_or_else(|| CliError::Startup("test runner produced no exit code".to_owned())),
        RunOutcome::StartupError => Err(CliError::Startup(
            report
                .error
                .clone()
                .unwrap_or_else(|| "harness failed to start".to_owned()),
        )),
        RunOutcome::Interrupted => Err(CliError::Interrupted(
            signal.unwrap_or("operator").to_owned(),
        )),
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let outcome = match self.outcome {
            RunOutcome::Passed => "PASSED".green().bold(),
            RunOutcome::TestFailed => "FAILED".red().bold(),
            RunOutcome::StartupError => "STARTUP ERROR".yellow().bold(),
            RunOutcome::Interrupted => "INTERRUPTED".yellow().bold(),
        };

        writeln!(w, "Run {} ({})", self.run_id, self.service.bold())?;
        writeln!(w, "  Outcome:   {}", outcome)?;
        if let Some(code) = self.exit_code {
            writeln!(w, "  Exit code: {}", code)?;
        }
        let teardown = match &self.teardown {
            TeardownStatus::Ok => "ok".green(),
            TeardownStatus::Failed { .. } => self.teardown.to_string().red(),
            TeardownStatus::Skipped => "skipped".dimmed(),
        };
        writeln!(w, "  Teardown:  {}", teardown)?;

        if !self.phases.is_empty() {
            let phases: Vec<String> = self
                .phases
                .iter()
                .map(|p| format!("{} {}ms", p.phase, p.elapsed_ms))
                .collect();
            writeln!(w, "  Phases:    {}", phases.join(", "))?;
        }
        if let Some(ref error) = self.error {
            writeln!(w, "  Error:     {}", error.red())?;
        }
        Ok(())
    }
}

/// What `run` would do, without doing it.
#[derive(Serialize)]
pub struct RunPlan {
    pub service: String,
    pub working_dir: String,
    pub env: BTreeMap<String, String>,
    pub steps: Vec<PlannedStep>,
}

#[derive(Serialize)]
pub struct PlannedStep {
    pub step: &'static str,
    pub command: Vec<String>,
}

impl RunPlan {
    pub fn new(client: &DockerComposeClient, service: &str, working_dir: &Path) -> Self {
        let steps = vec![
            PlannedStep {
                step: "validate",
                command: client.validate_args(),
            },
            PlannedStep {
                step: "snapshot",
                command: client.ps_args(service),
            },
            PlannedStep {
                step: "up",
                command: client.up_args(service),
            },
            PlannedStep {
                step: "inspect",
                command: client.ps_args(service),
            },
            PlannedStep {
                step: "down",
                command: client.down_args(),
            },
        ];
        Self {
            service: service.to_owned(),
            working_dir: working_dir.display().to_string(),
            env: client.env().vars().iter().cloned().collect(),
            steps,
        }
    }
}

impl Render for RunPlan {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Dry run for service {}", self.service.bold())?;
        writeln!(w, "  Working dir: {}", self.working_dir)?;
        writeln!(w)?;
        writeln!(w, "Environment:")?;
        for (key, value) in &self.env {
            writeln!(w, "  {}={}", key, value)?;
        }
        writeln!(w)?;
        writeln!(w, "Steps:")?;
        for step in &self.steps {
            writeln!(w, "  {:<9} {}", step.step.cyan(), step.command.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubtest_compose::ServiceState;
    use hubtest_core::config::HubtestConfig;
    use hubtest_core::types::RunPhase;
    use uuid::Uuid;

    use crate::error::{EXIT_INTERRUPTED, EXIT_STARTUP};
    use crate::launcher::PhaseTiming;

    fn report(outcome: RunOutcome, exit_code: Option<i32>) -> RunReport {
        RunReport {
            run_id: Uuid::nil(),
            service: "cypress".to_owned(),
            outcome,
            exit_code,
            runner_state: exit_code.map(|c| ServiceState::Exited { exit_code: c }),
            phases: vec![PhaseTiming {
                phase: RunPhase::Running,
                elapsed_ms: 1200,
            }],
            teardown: TeardownStatus::Ok,
            error: None,
        }
    }

    fn render(payload: &impl Render) -> String {
        let mut buffer = Vec::new();
        payload.render_text(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn verdict_passes_runner_code_through() {
        assert_eq!(verdict(&report(RunOutcome::Passed, Some(0)), None).unwrap(), 0);
        assert_eq!(
            verdict(&report(RunOutcome::TestFailed, Some(3)), None).unwrap(),
            3
        );
    }

    #[test]
    fn verdict_startup_error_is_distinct() {
        let mut r = report(RunOutcome::StartupError, None);
        r.error = Some("test runner 'cypress' never ran to completion".to_owned());
        let err = verdict(&r, None).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_STARTUP);
        assert!(err.to_string().contains("never ran"));
    }

    #[test]
    fn verdict_interrupted_names_signal() {
        let err = verdict(&report(RunOutcome::Interrupted, None), Some("SIGTERM")).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert!(err.to_string().contains("SIGTERM"));
    }

    #[test]
    fn report_text_shows_outcome_and_teardown() {
        let mut r = report(RunOutcome::TestFailed, Some(1));
        r.teardown = TeardownStatus::Failed {
            reason: "network in use".to_owned(),
        };
        let output = render(&r);
        assert!(output.contains("FAILED"));
        assert!(output.contains("Exit code: 1"));
        assert!(output.contains("network in use"));
        assert!(output.contains("running 1200ms"));
    }

    #[test]
    fn plan_lists_steps_in_order() {
        let config = HubtestConfig::default();
        let work = Path::new("/work");
        let env = HarnessEnv::from_config(&config.harness, work);
        let client = DockerComposeClient::from_config(&config.compose, env, work);
        let plan = RunPlan::new(&client, "cypress", work);

        let steps: Vec<&str> = plan.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, vec!["validate", "snapshot", "up", "inspect", "down"]);
        assert_eq!(
            plan.env.get("HUBTEST_CONFIG_SRC").map(String::as_str),
            Some("/work/e2e/jupyterhub_config.py")
        );

        let output = render(&plan);
        assert!(output.contains("--exit-code-from cypress"));
    }
}
