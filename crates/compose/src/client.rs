//! Orchestration tool abstraction for testability.
//!
//! The [`ComposeClient`] trait abstracts the handful of compose operations the
//! launcher needs, allowing production code to use [`DockerComposeClient`]
//! while launcher tests substitute a scripted mock.
//!
//! # Operations
//!
//! | Method            | Command                                                      |
//! |-------------------|--------------------------------------------------------------|
//! | `validate`        | `<compose> -f <file> config -q`                              |
//! | `up`              | `<compose> -f <file> up --force-recreate --exit-code-from S` |
//! | `container_ids`   | `<compose> -f <file> ps -a -q S`                             |
//! | `service_state`   | `<compose> -f <file> ps -a -q S` + `docker inspect`          |
//! | `down`            | `<compose> -f <file> down [--volumes] [--remove-orphans]`    |
//!
//! Every compose invocation receives the [`HarnessEnv`] variables so that
//! interpolation resolves identically across all four calls.

use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use hubtest_core::config::ComposeConfig;

use crate::env::HarnessEnv;
use crate::error::ComposeError;

/// Number of trailing stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Go template handed to `docker inspect`.
const STATE_FORMAT: &str = "{{.State.Status}} {{.State.ExitCode}}";

/// Observed state of the test-runner service after `up` returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceState {
    /// No container was ever created for the service.
    NotCreated,
    /// A container exists but never reached `exited` (created, restarting, ...).
    Pending { status: String },
    /// The container ran and exited with this code.
    Exited { exit_code: i32 },
    /// The only container found predates this run (left over by an earlier
    /// run whose teardown failed or was killed).
    Stale { container_id: String },
}

/// Trait abstracting the orchestration tool.
///
/// # Implementations
///
/// - [`DockerComposeClient`]: drives the `docker-compose` / `docker compose` CLI
/// - `MockCompose`: scripted responses for launcher tests (tests only)
pub trait ComposeClient: Send + Sync + 'static {
    /// Checks the topology file before anything is created.
    ///
    /// # Errors
    ///
    /// - `ComposeError::Spawn`: the compose program cannot be started
    /// - `ComposeError::InvalidTopology`: the file is rejected
    fn validate(&self) -> impl Future<Output = Result<(), ComposeError>> + Send;

    /// Brings the topology up attached and blocks until `service` exits.
    ///
    /// Returns the exit code of the `up` process, which compose sets to the
    /// exit code of `service`. A non-zero value is *not* an error.
    ///
    /// # Errors
    ///
    /// - `ComposeError::Spawn`: the compose program cannot be started
    /// - `ComposeError::Timeout`: the configured wait limit elapsed
    fn up(&self, service: &str) -> impl Future<Output = Result<i32, ComposeError>> + Send;

    /// Lists the ids of every container (running or not) of `service`.
    ///
    /// Taken before `up` so leftovers from earlier runs can be told apart
    /// from the containers `up --force-recreate` creates.
    fn container_ids(
        &self,
        service: &str,
    ) -> impl Future<Output = Result<Vec<String>, ComposeError>> + Send;

    /// Reports whether `service` ran to completion in this run, and with which code.
    ///
    /// Containers whose id is in `previous` belong to an earlier run and are
    /// never used as the verdict.
    fn service_state(
        &self,
        service: &str,
        previous: &[String],
    ) -> impl Future<Output = Result<ServiceState, ComposeError>> + Send;

    /// Removes containers, networks and other state created by `up`.
    fn down(&self) -> impl Future<Output = Result<(), ComposeError>> + Send;
}

/// Production client driving the compose CLI as a child process.
#[derive(Debug, Clone)]
pub struct DockerComposeClient {
    command: Vec<String>,
    docker_command: Vec<String>,
    file: String,
    project_name: Option<String>,
    remove_volumes: bool,
    remove_orphans: bool,
    up_timeout: Option<Duration>,
    working_dir: PathBuf,
    env: HarnessEnv,
}

impl DockerComposeClient {
    /// Create a client from the `[compose]` section.
    ///
    /// `working_dir` is where compose runs; a relative `file` resolves against it.
    pub fn from_config(
        config: &ComposeConfig,
        env: HarnessEnv,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            command: config.command.clone(),
            docker_command: config.docker_command.clone(),
            file: config.file.clone(),
            project_name: (!config.project_name.is_empty()).then(|| config.project_name.clone()),
            remove_volumes: config.remove_volumes,
            remove_orphans: config.remove_orphans,
            up_timeout: (config.up_timeout_secs > 0)
                .then(|| Duration::from_secs(config.up_timeout_secs)),
            working_dir: working_dir.into(),
            env,
        }
    }

    pub fn env(&self) -> &HarnessEnv {
        &self.env
    }

    /// Full argv of the topology check.
    pub fn validate_args(&self) -> Vec<String> {
        self.compose_argv(&["config", "-q"])
    }

    /// Full argv of the attached `up` call.
    pub fn up_args(&self, service: &str) -> Vec<String> {
        self.compose_argv(&["up", "--force-recreate", "--exit-code-from", service])
    }

    /// Full argv of the container lookup for `service`.
    pub fn ps_args(&self, service: &str) -> Vec<String> {
        self.compose_argv(&["ps", "-a", "-q", service])
    }

    /// Full argv of the teardown call.
    pub fn down_args(&self) -> Vec<String> {
        let mut tail = vec!["down"];
        if self.remove_volumes {
            tail.push("--volumes");
        }
        if self.remove_orphans {
            tail.push("--remove-orphans");
        }
        self.compose_argv(&tail)
    }

    fn inspect_args(&self, container_id: &str) -> Vec<String> {
        let mut argv = self.docker_command.clone();
        argv.extend(
            ["inspect", "-f", STATE_FORMAT, container_id]
                .iter()
                .map(|s| (*s).to_owned()),
        );
        argv
    }

    fn compose_argv(&self, tail: &[&str]) -> Vec<String> {
        let mut argv = self.command.clone();
        argv.push("-f".to_owned());
        argv.push(self.file.clone());
        if let Some(project) = &self.project_name {
            argv.push("-p".to_owned());
            argv.push(project.clone());
        }
        argv.extend(tail.iter().map(|s| (*s).to_owned()));
        argv
    }

    fn build(&self, argv: &[String]) -> Result<Command, ComposeError> {
        let (program, args) = argv.split_first().ok_or_else(|| ComposeError::Spawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .envs(self.env.vars().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// Run a short helper command to completion, capturing its output.
    async fn capture(&self, argv: &[String]) -> Result<std::process::Output, ComposeError> {
        let mut cmd = self.build(argv)?;
        debug!(command = %argv.join(" "), "running compose helper");
        cmd.output().await.map_err(|source| spawn_error(argv, source))
    }
}

impl ComposeClient for DockerComposeClient {
    async fn validate(&self) -> Result<(), ComposeError> {
        let argv = self.validate_args();
        let output = self.capture(&argv).await?;
        if output.status.success() {
            debug!(file = %self.file, "compose topology is valid");
            Ok(())
        } else {
            Err(ComposeError::InvalidTopology {
                stderr: stderr_tail(&output.stderr),
            })
        }
    }

    async fn up(&self, service: &str) -> Result<i32, ComposeError> {
        let argv = self.up_args(service);
        let mut cmd = self.build(&argv)?;
        // 하네스 출력은 stderr로, stdout은 실행 보고서 전용
        cmd.stdout(std::io::stderr()).stderr(std::io::stderr());

        info!(command = %argv.join(" "), service, "bringing harness up");
        let mut child = cmd.spawn().map_err(|source| spawn_error(&argv, source))?;

        let status = match self.up_timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited?,
                Err(_) => {
                    warn!(secs = limit.as_secs(), "'up' timed out, killing compose");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill compose after timeout");
                    }
                    return Err(ComposeError::Timeout {
                        secs: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await?,
        };

        let code = exit_code(status);
        debug!(exit_code = code, "'up' returned");
        Ok(code)
    }

    async fn container_ids(&self, service: &str) -> Result<Vec<String>, ComposeError> {
        let argv = self.ps_args(service);
        let output = self.capture(&argv).await?;
        if !output.status.success() {
            return Err(ComposeError::CommandFailed {
                command: argv.join(" "),
                code: exit_code(output.status),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect())
    }

    async fn service_state(
        &self,
        service: &str,
        previous: &[String],
    ) -> Result<ServiceState, ComposeError> {
        let ids = self.container_ids(service).await?;
        let fresh = ids.iter().find(|id| !previous.contains(id)).cloned();
        let container_id = match fresh {
            Some(id) => id,
            None => {
                return Ok(match ids.into_iter().next() {
                    Some(container_id) => {
                        debug!(%container_id, "only a leftover runner container exists");
                        ServiceState::Stale { container_id }
                    }
                    None => ServiceState::NotCreated,
                });
            }
        };

        let argv = self.inspect_args(&container_id);
        let output = self.capture(&argv).await?;
        if !output.status.success() {
            return Err(ComposeError::CommandFailed {
                command: argv.join(" "),
                code: exit_code(output.status),
                stderr: stderr_tail(&output.stderr),
            });
        }
        parse_state(&argv.join(" "), &String::from_utf8_lossy(&output.stdout))
    }

    async fn down(&self) -> Result<(), ComposeError> {
        let argv = self.down_args();
        info!(command = %argv.join(" "), "tearing harness down");
        let output = self.capture(&argv).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ComposeError::CommandFailed {
                command: argv.join(" "),
                code: exit_code(output.status),
                stderr: stderr_tail(&output.stderr),
            })
        }
    }
}

/// Parse `docker inspect -f '{{.State.Status}} {{.State.ExitCode}}'` output.
fn parse_state(command: &str, output: &str) -> Result<ServiceState, ComposeError> {
    let unexpected = || ComposeError::UnexpectedOutput {
        command: command.to_owned(),
        output: output.trim().to_owned(),
    };
    let mut fields = output.split_whitespace();
    let status = fields.next().ok_or_else(unexpected)?;
    let code = fields
        .next()
        .and_then(|c| c.parse::<i32>().ok())
        .ok_or_else(unexpected)?;

    if status == "exited" {
        Ok(ServiceState::Exited { exit_code: code })
    } else {
        Ok(ServiceState::Pending {
            status: status.to_owned(),
        })
    }
}

fn spawn_error(argv: &[String], source: std::io::Error) -> ComposeError {
    ComposeError::Spawn {
        program: argv.first().cloned().unwrap_or_default(),
        source,
    }
}

/// Exit code of a finished child; signal deaths map to `128 + signal` like a shell.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubtest_core::config::HarnessConfig;
    use std::path::Path;

    fn client_with(config: ComposeConfig) -> DockerComposeClient {
        let env = HarnessEnv::from_config(&HarnessConfig::default(), Path::new("/work"));
        DockerComposeClient::from_config(&config, env, std::env::temp_dir())
    }

    fn default_client() -> DockerComposeClient {
        client_with(ComposeConfig::default())
    }

    #[test]
    fn up_args_force_recreate_and_exit_code_from() {
        let argv = default_client().up_args("cypress");
        assert_eq!(
            argv,
            vec![
                "docker-compose",
                "-f",
                "e2e/docker-compose.yml",
                "up",
                "--force-recreate",
                "--exit-code-from",
                "cypress",
            ]
        );
    }

    #[test]
    fn project_name_is_passed_before_subcommand() {
        let config = ComposeConfig {
            command: vec!["docker".to_owned(), "compose".to_owned()],
            project_name: "hubtest-ci".to_owned(),
            ..ComposeConfig::default()
        };
        let argv = client_with(config).validate_args();
        assert_eq!(
            argv,
            vec![
                "docker",
                "compose",
                "-f",
                "e2e/docker-compose.yml",
                "-p",
                "hubtest-ci",
                "config",
                "-q",
            ]
        );
    }

    #[test]
    fn down_args_plain_by_default() {
        let argv = default_client().down_args();
        assert_eq!(argv.last().map(String::as_str), Some("down"));
    }

    #[test]
    fn down_args_with_volumes_and_orphans() {
        let config = ComposeConfig {
            remove_volumes: true,
            remove_orphans: true,
            ..ComposeConfig::default()
        };
        let argv = client_with(config).down_args();
        let tail: Vec<&str> = argv.iter().rev().take(3).rev().map(String::as_str).collect();
        assert_eq!(tail, vec!["down", "--volumes", "--remove-orphans"]);
    }

    #[test]
    fn ps_args_list_all_quietly() {
        let argv = default_client().ps_args("cypress");
        assert!(argv.ends_with(&[
            "ps".to_owned(),
            "-a".to_owned(),
            "-q".to_owned(),
            "cypress".to_owned()
        ]));
    }

    #[test]
    fn inspect_uses_docker_command() {
        let argv = default_client().inspect_args("abc123");
        assert_eq!(argv[0], "docker");
        assert_eq!(argv[1], "inspect");
        assert_eq!(argv.last().map(String::as_str), Some("abc123"));
    }

    #[test]
    fn parse_state_exited() {
        let state = parse_state("inspect", "exited 1\n").unwrap();
        assert_eq!(state, ServiceState::Exited { exit_code: 1 });
    }

    #[test]
    fn parse_state_created_is_pending() {
        let state = parse_state("inspect", "created 0").unwrap();
        assert_eq!(
            state,
            ServiceState::Pending {
                status: "created".to_owned()
            }
        );
    }

    #[test]
    fn parse_state_rejects_garbage() {
        assert!(matches!(
            parse_state("inspect", "Error: No such object"),
            Err(ComposeError::UnexpectedOutput { .. })
        ));
        assert!(parse_state("inspect", "").is_err());
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let text: String = (0..30).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(text.as_bytes());
        assert!(tail.starts_with("line 10"));
        assert!(tail.ends_with("line 29"));
    }

    // `sh -c '<script>' sh <compose args...>`: compose 인자는 위치 인자로 무시됨
    fn shell_client(script: &str) -> DockerComposeClient {
        let config = ComposeConfig {
            command: vec![
                "sh".to_owned(),
                "-c".to_owned(),
                script.to_owned(),
                "sh".to_owned(),
            ],
            ..ComposeConfig::default()
        };
        client_with(config)
    }

    #[tokio::test]
    async fn up_returns_runner_exit_code() {
        let code = shell_client("exit 3").up("cypress").await.unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn up_sees_harness_env() {
        let code = shell_client(r#"[ "$HUBTEST_SPEC" = "cypress/integration/login.spec.js" ]"#)
            .up("cypress")
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn up_reports_missing_program_as_spawn_error() {
        let config = ComposeConfig {
            command: vec!["hubtest-definitely-not-installed".to_owned()],
            ..ComposeConfig::default()
        };
        let err = client_with(config).up("cypress").await.unwrap_err();
        assert!(err.is_pre_spawn());
    }

    #[tokio::test]
    async fn up_times_out() {
        let config = ComposeConfig {
            command: vec![
                "sh".to_owned(),
                "-c".to_owned(),
                "sleep 30".to_owned(),
                "sh".to_owned(),
            ],
            up_timeout_secs: 1,
            ..ComposeConfig::default()
        };
        let err = client_with(config).up("cypress").await.unwrap_err();
        assert!(matches!(err, ComposeError::Timeout { secs: 1 }));
    }

    #[tokio::test]
    async fn validate_maps_failure_to_invalid_topology() {
        let err = shell_client("echo 'services.cypress: bad key' >&2; exit 1")
            .validate()
            .await
            .unwrap_err();
        match err {
            ComposeError::InvalidTopology { stderr } => assert!(stderr.contains("bad key")),
            other => panic!("expected InvalidTopology, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn service_state_not_created_when_ps_is_empty() {
        let state = shell_client("exit 0")
            .service_state("cypress", &[])
            .await
            .unwrap();
        assert_eq!(state, ServiceState::NotCreated);
    }

    #[tokio::test]
    async fn container_ids_lists_every_line() {
        let ids = shell_client("printf 'abc\\n\\ndef\\n'")
            .container_ids("cypress")
            .await
            .unwrap();
        assert_eq!(ids, vec!["abc", "def"]);
    }

    #[tokio::test]
    async fn service_state_ignores_containers_from_earlier_runs() {
        // ps가 이전 실행의 컨테이너만 돌려줌: inspect 없이 Stale
        let state = shell_client("echo old1")
            .service_state("cypress", &["old1".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            state,
            ServiceState::Stale {
                container_id: "old1".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn down_failure_carries_stderr() {
        let err = shell_client("echo 'network in use' >&2; exit 1")
            .down()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("network in use"));
    }
}
