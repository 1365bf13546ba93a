//! 설정 관리 — hubtest.toml 파싱 및 런타임 설정
//!
//! [`HubtestConfig`]는 런처가 사용하는 모든 설정을 담는 최상위 구조체입니다.
//! 기본값은 단일 로그인 시나리오의 고정 상수와 같습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`HUBTEST_HARNESS_BASE_IMAGE=...` 형식)
//! 3. 설정 파일 (`hubtest.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), hubtest_core::error::HubtestError> {
//! use hubtest_core::config::HubtestConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HubtestConfig::load("hubtest.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HubtestConfig::parse("[harness]\nspec = \"cypress/integration/*.js\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, HubtestError};
use crate::types::HARNESS_ENV_KEYS;

/// hubtest 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubtestConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 하네스에 전달할 값
    #[serde(default)]
    pub harness: HarnessConfig,
    /// 오케스트레이션 도구 설정
    #[serde(default)]
    pub compose: ComposeConfig,
}

impl HubtestConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HubtestError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없으면 기본값에서 시작합니다.
    ///
    /// 사용자가 경로를 명시하지 않은 경우에만 사용합니다. 파싱 실패는
    /// 그대로 에러로 반환합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, HubtestError> {
        let path = path.as_ref();
        match Self::from_file(path).await {
            Ok(mut config) => {
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            Err(HubtestError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(e),
        }
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, HubtestError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HubtestError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                HubtestError::Io(e)
            }
        })?;
        // 검증은 오버라이드 적용 후 호출자가 수행
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, HubtestError> {
        toml::from_str(toml_str).map_err(|e| {
            HubtestError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `HUBTEST_{SECTION}_{FIELD}`
    /// 예: `HUBTEST_COMPOSE_TEST_RUNNER_SERVICE=cypress`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "HUBTEST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "HUBTEST_GENERAL_LOG_FORMAT");

        // Harness
        override_string(&mut self.harness.base_image, "HUBTEST_HARNESS_BASE_IMAGE");
        override_string(&mut self.harness.config_src, "HUBTEST_HARNESS_CONFIG_SRC");
        override_string(&mut self.harness.config_dest, "HUBTEST_HARNESS_CONFIG_DEST");
        override_string(&mut self.harness.db_src, "HUBTEST_HARNESS_DB_SRC");
        override_string(&mut self.harness.db_dest, "HUBTEST_HARNESS_DB_DEST");
        override_string(&mut self.harness.spec, "HUBTEST_HARNESS_SPEC");

        // Compose
        override_words(&mut self.compose.command, "HUBTEST_COMPOSE_COMMAND");
        override_words(
            &mut self.compose.docker_command,
            "HUBTEST_COMPOSE_DOCKER_COMMAND",
        );
        override_string(&mut self.compose.file, "HUBTEST_COMPOSE_FILE");
        override_string(
            &mut self.compose.project_name,
            "HUBTEST_COMPOSE_PROJECT_NAME",
        );
        override_string(
            &mut self.compose.test_runner_service,
            "HUBTEST_COMPOSE_TEST_RUNNER_SERVICE",
        );
        override_bool(
            &mut self.compose.remove_volumes,
            "HUBTEST_COMPOSE_REMOVE_VOLUMES",
        );
        override_bool(
            &mut self.compose.remove_orphans,
            "HUBTEST_COMPOSE_REMOVE_ORPHANS",
        );
        override_u64(
            &mut self.compose.up_timeout_secs,
            "HUBTEST_COMPOSE_UP_TIMEOUT_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 파일 시스템은 보지 않습니다. 호스트 경로 확인은 [`Self::check_host_paths`]가 합니다.
    pub fn validate(&self) -> Result<(), HubtestError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.harness.validate()?;
        self.compose.validate()?;

        Ok(())
    }

    /// 호스트 쪽에 있어야 하는 파일을 확인합니다.
    ///
    /// 상대 경로는 `base_dir` 기준으로 해석합니다 (compose 실행 디렉토리와 동일).
    pub fn check_host_paths(&self, base_dir: &Path) -> Result<(), HubtestError> {
        require_file(base_dir, "harness.config_src", &self.harness.config_src)?;
        if self.harness.has_database() {
            require_file(base_dir, "harness.db_src", &self.harness.db_src)?;
        }
        require_file(base_dir, "compose.file", &self.compose.file)?;
        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 하네스 설정 — compose 파일이 환경변수로 읽는 값
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// 테스트 대상 JupyterHub 이미지 (`image[:tag]`)
    pub base_image: String,
    /// 주입할 JupyterHub 설정 파일 (호스트 경로)
    pub config_src: String,
    /// 컨테이너 내부 설정 파일 경로
    pub config_dest: String,
    /// 사전 시딩된 SQLite DB (호스트 경로, 빈 문자열이면 비활성)
    pub db_src: String,
    /// 컨테이너 내부 DB 경로 (빈 문자열이면 비활성)
    pub db_dest: String,
    /// 테스트 스펙 경로 (파일 또는 glob)
    pub spec: String,
    /// 추가로 전달할 환경변수 (예: `SSL_CERT`, `SSL_KEY`)
    pub extra_env: BTreeMap<String, String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_image: "jupyterhub/jupyterhub:latest".to_owned(),
            config_src: "e2e/jupyterhub_config.py".to_owned(),
            config_dest: "/srv/jupyterhub/jupyterhub_config.py".to_owned(),
            db_src: String::new(),
            db_dest: String::new(),
            spec: "cypress/integration/login.spec.js".to_owned(),
            extra_env: BTreeMap::new(),
        }
    }
}

impl HarnessConfig {
    /// DB 주입이 켜져 있는지 (검증 후에는 두 값이 함께 비어 있거나 함께 채워져 있음)
    pub fn has_database(&self) -> bool {
        !self.db_src.is_empty() && !self.db_dest.is_empty()
    }

    fn validate(&self) -> Result<(), HubtestError> {
        if self.base_image.trim().is_empty() {
            return Err(invalid("harness.base_image", "must not be empty"));
        }
        if self.base_image.chars().any(char::is_whitespace) {
            return Err(invalid(
                "harness.base_image",
                "must be an image reference without whitespace",
            ));
        }
        if self.config_src.is_empty() {
            return Err(invalid("harness.config_src", "must not be empty"));
        }
        if !self.config_dest.starts_with('/') {
            return Err(invalid(
                "harness.config_dest",
                "must be an absolute path inside the container",
            ));
        }
        if self.spec.is_empty() {
            return Err(invalid("harness.spec", "must not be empty"));
        }

        // DB 경로는 둘 다 있거나 둘 다 없어야 함
        match (self.db_src.is_empty(), self.db_dest.is_empty()) {
            (true, true) => {}
            (false, false) => {
                if !self.db_dest.starts_with('/') {
                    return Err(invalid(
                        "harness.db_dest",
                        "must be an absolute path inside the container",
                    ));
                }
            }
            (true, false) => {
                return Err(invalid(
                    "harness.db_src",
                    "db_src and db_dest must be set together (db_dest is set)",
                ));
            }
            (false, true) => {
                return Err(invalid(
                    "harness.db_dest",
                    "db_src and db_dest must be set together (db_src is set)",
                ));
            }
        }

        for key in self.extra_env.keys() {
            if !is_env_name(key) {
                return Err(invalid(
                    "harness.extra_env",
                    format!("'{key}' is not a valid environment variable name"),
                ));
            }
            if HARNESS_ENV_KEYS.contains(&key.as_str()) {
                return Err(invalid(
                    "harness.extra_env",
                    format!("'{key}' is reserved for the harness"),
                ));
            }
        }

        Ok(())
    }
}

/// 오케스트레이션 도구 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// compose 실행 명령 (예: `["docker-compose"]`, `["docker", "compose"]`)
    pub command: Vec<String>,
    /// 컨테이너 상태 조회용 docker 명령
    pub docker_command: Vec<String>,
    /// 서비스 토폴로지 파일
    pub file: String,
    /// compose 프로젝트 이름 (비어 있으면 compose 기본값)
    pub project_name: String,
    /// 종료 코드가 실행 결과가 되는 서비스
    pub test_runner_service: String,
    /// `down --volumes`
    pub remove_volumes: bool,
    /// `down --remove-orphans`
    pub remove_orphans: bool,
    /// `up` 대기 제한 (초, 0이면 무제한)
    pub up_timeout_secs: u64,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            command: vec!["docker-compose".to_owned()],
            docker_command: vec!["docker".to_owned()],
            file: "e2e/docker-compose.yml".to_owned(),
            project_name: String::new(),
            test_runner_service: "cypress".to_owned(),
            remove_volumes: false,
            remove_orphans: false,
            up_timeout_secs: 0,
        }
    }
}

impl ComposeConfig {
    fn validate(&self) -> Result<(), HubtestError> {
        if self.command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(invalid("compose.command", "must name a program"));
        }
        if self.docker_command.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(invalid("compose.docker_command", "must name a program"));
        }
        if self.file.is_empty() {
            return Err(invalid("compose.file", "must not be empty"));
        }
        if self.test_runner_service.is_empty()
            || !self
                .test_runner_service
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid(
                "compose.test_runner_service",
                "must be a non-empty service name ([a-zA-Z0-9._-])",
            ));
        }
        if !self.project_name.is_empty()
            && !self.project_name.chars().all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_')
            })
        {
            return Err(invalid(
                "compose.project_name",
                "must contain only lowercase letters, digits, '-' and '_'",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> HubtestError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn require_file(base_dir: &Path, field: &str, path: &str) -> Result<(), HubtestError> {
    let resolved = base_dir.join(path);
    if resolved.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingPath {
            field: field.to_owned(),
            path: resolved.display().to_string(),
        }
        .into())
    }
}

fn is_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

// 공백으로 구분된 명령줄 (예: "docker compose")
fn override_words(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val.split_whitespace().map(str::to_owned).collect();
    }
}
