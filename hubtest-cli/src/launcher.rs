//! Test-run launcher -- one harness run from provisioning to teardown.
//!
//! The [`Launcher`] owns a [`ComposeClient`] and walks a strictly linear
//! lifecycle:
//!
//! ```text
//! Idle -> Provisioning -> Running -> TearingDown -> Done
//! ```
//!
//! # Guarantees
//!
//! - The test runner's exit code is captured *before* teardown starts and is
//!   the run's verdict; teardown's own result never replaces it.
//! - Once `up` has been spawned, `down` runs exactly once on every path:
//!   pass, fail, startup error, timeout, operator interrupt.
//! - When nothing was ever created (topology rejected, compose binary
//!   missing, interrupted before `up`), teardown is skipped.
//! - A run whose test runner never reached `exited` is a startup error, not a
//!   test failure, even though `up` itself exits non-zero in both cases.
//! - Runner containers that already existed before `up` never decide the
//!   verdict; `--force-recreate` gives this run's runner a fresh id.
//! - A second interrupt abandons a teardown that is still running.

use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hubtest_compose::{ComposeClient, ServiceState};
use hubtest_core::types::{RunOutcome, RunPhase, TeardownStatus};

/// Time spent in one lifecycle phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTiming {
    pub phase: RunPhase,
    pub elapsed_ms: u64,
}

/// Result of one harness run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id for correlating logs of this run.
    pub run_id: Uuid,
    /// Test-runner service name.
    pub service: String,
    pub outcome: RunOutcome,
    /// Test runner's exit code, when it produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// What the launcher observed about the runner container after `up`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_state: Option<ServiceState>,
    /// Phases visited, in order.
    pub phases: Vec<PhaseTiming>,
    pub teardown: TeardownStatus,
    /// Why no verdict was produced (startup error / interrupt).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verdict captured before teardown.
struct Verdict {
    outcome: RunOutcome,
    exit_code: Option<i32>,
    runner_state: Option<ServiceState>,
    error: Option<String>,
    /// Whether `up` may have created anything that needs tearing down.
    spawned: bool,
}

impl Verdict {
    fn startup(error: String, spawned: bool) -> Self {
        Self {
            outcome: RunOutcome::StartupError,
            exit_code: None,
            runner_state: None,
            error: Some(error),
            spawned,
        }
    }

    fn interrupted(spawned: bool) -> Self {
        Self {
            outcome: RunOutcome::Interrupted,
            exit_code: None,
            runner_state: None,
            error: Some("interrupted before the test runner finished".to_owned()),
            spawned,
        }
    }

    fn from_runner(exit_code: i32, runner_state: Option<ServiceState>) -> Self {
        Self {
            outcome: RunOutcome::from_exit_code(exit_code),
            exit_code: Some(exit_code),
            runner_state,
            error: None,
            spawned: true,
        }
    }
}

/// Drives a single run of the harness.
pub struct Launcher<C: ComposeClient> {
    client: C,
    service: String,
    run_id: Uuid,
    phase: RunPhase,
    phase_started: Instant,
    phases: Vec<PhaseTiming>,
    abort_teardown: CancellationToken,
}

impl<C: ComposeClient> Launcher<C> {
    pub fn new(client: C, service: impl Into<String>) -> Self {
        Self {
            client,
            service: service.into(),
            run_id: Uuid::new_v4(),
            phase: RunPhase::Idle,
            phase_started: Instant::now(),
            phases: Vec::new(),
            abort_teardown: CancellationToken::new(),
        }
    }

    /// Cancelling `token` abandons a `down` that is still in progress.
    pub fn with_teardown_abort(mut self, token: CancellationToken) -> Self {
        self.abort_teardown = token;
        self
    }

    /// Run the harness once.
    ///
    /// Never fails: every failure mode is folded into the returned report so
    /// that teardown status and verdict are always reported together.
    /// Cancelling `cancel` stops waiting on the harness and proceeds to
    /// teardown.
    pub async fn run(mut self, cancel: CancellationToken) -> RunReport {
        info!(run_id = %self.run_id, service = %self.service, "starting harness run");
        self.enter(RunPhase::Provisioning);

        let validated = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.client.validate() => Some(result),
        };

        let verdict = match validated {
            None => Verdict::interrupted(false),
            Some(Err(e)) => {
                warn!(run_id = %self.run_id, error = %e, "harness topology rejected");
                Verdict::startup(e.to_string(), false)
            }
            Some(Ok(())) => self.bring_up(&cancel).await,
        };

        if let Some(code) = verdict.exit_code {
            info!(
                run_id = %self.run_id,
                exit_code = code,
                outcome = %verdict.outcome,
                "test runner finished"
            );
        }

        let teardown = if verdict.spawned {
            self.enter(RunPhase::TearingDown);
            self.teardown().await
        } else {
            debug!(run_id = %self.run_id, "nothing was created, skipping teardown");
            TeardownStatus::Skipped
        };

        self.enter(RunPhase::Done);
        info!(
            run_id = %self.run_id,
            outcome = %verdict.outcome,
            teardown = %teardown,
            "harness run complete"
        );

        RunReport {
            run_id: self.run_id,
            service: self.service,
            outcome: verdict.outcome,
            exit_code: verdict.exit_code,
            runner_state: verdict.runner_state,
            phases: self.phases,
            teardown,
            error: verdict.error,
        }
    }

    async fn bring_up(&mut self, cancel: &CancellationToken) -> Verdict {
        // up 이전에 존재하던 러너 컨테이너: 판정에 사용하지 않음
        let previous = match self.client.container_ids(&self.service).await {
            Ok(ids) => {
                if !ids.is_empty() {
                    debug!(
                        run_id = %self.run_id,
                        leftovers = ids.len(),
                        "runner containers exist before 'up'"
                    );
                }
                Some(ids)
            }
            Err(e) => {
                warn!(
                    run_id = %self.run_id,
                    error = %e,
                    "could not list runner containers before 'up'"
                );
                None
            }
        };

        if cancel.is_cancelled() {
            return Verdict::interrupted(false);
        }
        self.enter(RunPhase::Running);

        let up = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.client.up(&self.service) => Some(result),
        };

        match up {
            // up 퓨처가 drop되면서 compose 프로세스도 종료됨
            None => Verdict::interrupted(true),
            Some(Err(e)) => {
                warn!(run_id = %self.run_id, error = %e, "harness failed to come up");
                Verdict::startup(e.to_string(), !e.is_pre_spawn())
            }
            Some(Ok(code)) => self.judge(code, previous.as_deref()).await,
        }
    }

    /// Decide between "test runner exited with `code`" and "it never ran".
    ///
    /// `previous` is `None` when the pre-`up` container list is unknown; the
    /// runner's code then only counts when it agrees with `up`.
    async fn judge(&self, up_code: i32, previous: Option<&[String]>) -> Verdict {
        let state = self
            .client
            .service_state(&self.service, previous.unwrap_or_default())
            .await;
        match state {
            Ok(ServiceState::Exited { exit_code }) if exit_code == up_code => {
                Verdict::from_runner(exit_code, Some(ServiceState::Exited { exit_code }))
            }
            Ok(ServiceState::Exited { exit_code }) if previous.is_some() => {
                warn!(
                    run_id = %self.run_id,
                    up_exit_code = up_code,
                    runner_exit_code = exit_code,
                    "'up' and test runner disagree, using the runner's code"
                );
                Verdict::from_runner(exit_code, Some(ServiceState::Exited { exit_code }))
            }
            Ok(ServiceState::Exited { exit_code }) => {
                warn!(
                    run_id = %self.run_id,
                    up_exit_code = up_code,
                    runner_exit_code = exit_code,
                    "runner container may predate this run, using 'up' exit code"
                );
                Verdict::from_runner(up_code, None)
            }
            Ok(state) => {
                let mut verdict = Verdict::startup(
                    format!(
                        "test runner '{}' never ran to completion ('up' exited with {})",
                        self.service, up_code
                    ),
                    true,
                );
                verdict.runner_state = Some(state);
                verdict
            }
            Err(e) => {
                warn!(
                    run_id = %self.run_id,
                    error = %e,
                    "could not inspect test runner, using 'up' exit code"
                );
                Verdict::from_runner(up_code, None)
            }
        }
    }

    async fn teardown(&self) -> TeardownStatus {
        let result = tokio::select! {
            biased;
            _ = self.abort_teardown.cancelled() => {
                warn!(run_id = %self.run_id, "teardown abandoned, harness may still be running");
                return TeardownStatus::Failed {
                    reason: "abandoned after a second interrupt".to_owned(),
                };
            }
            result = self.client.down() => result,
        };

        match result {
            Ok(()) => {
                info!(run_id = %self.run_id, "harness torn down");
                TeardownStatus::Ok
            }
            Err(e) => {
                warn!(
                    run_id = %self.run_id,
                    error = %e,
                    "teardown failed, run result is unaffected"
                );
                TeardownStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn enter(&mut self, next: RunPhase) {
        debug_assert!(next > self.phase, "phases only move forward");
        let now = Instant::now();
        if self.phase != RunPhase::Idle {
            self.phases.push(PhaseTiming {
                phase: self.phase,
                elapsed_ms: u64::try_from(now.duration_since(self.phase_started).as_millis())
                    .unwrap_or(u64::MAX),
            });
        }
        debug!(run_id = %self.run_id, from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        self.phase_started = now;
    }
}
