//! 도메인 타입 — 실행 단계, 결과, 하네스 환경변수 이름
//!
//! 런처와 compose 어댑터가 공유하는 타입을 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

// --- 하네스 환경변수 ---
// compose 파일의 `${VAR}` 보간이 읽는 이름입니다.

/// JupyterHub 베이스 이미지 (`image[:tag]`)
pub const ENV_BASE_IMAGE: &str = "HUBTEST_BASE_IMAGE";
/// 주입할 JupyterHub 설정 파일 (호스트 경로)
pub const ENV_CONFIG_SRC: &str = "HUBTEST_CONFIG_SRC";
/// 컨테이너 내부 설정 파일 경로
pub const ENV_CONFIG_DEST: &str = "HUBTEST_CONFIG_DEST";
/// 사전 시딩된 SQLite DB (호스트 경로, 비어 있으면 비활성)
pub const ENV_DB_SRC: &str = "HUBTEST_DB_SRC";
/// 컨테이너 내부 DB 경로 (비어 있으면 비활성)
pub const ENV_DB_DEST: &str = "HUBTEST_DB_DEST";
/// 실행할 테스트 스펙 (파일 또는 glob)
pub const ENV_SPEC: &str = "HUBTEST_SPEC";

/// 런처가 항상 내보내는 환경변수 이름 (순서 고정)
pub const HARNESS_ENV_KEYS: [&str; 6] = [
    ENV_BASE_IMAGE,
    ENV_CONFIG_SRC,
    ENV_CONFIG_DEST,
    ENV_DB_SRC,
    ENV_DB_DEST,
    ENV_SPEC,
];

/// 실행 단계
///
/// `Idle -> Provisioning -> Running -> TearingDown -> Done` 순서로만 진행합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// 아직 아무것도 하지 않음
    Idle,
    /// 설정 검증, 토폴로지 검증, `up` 기동
    Provisioning,
    /// `up`이 테스트 러너 종료를 기다리는 중
    Running,
    /// `down` 실행 중
    TearingDown,
    /// 종료
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::TearingDown => "tearing_down",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 실행 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// 테스트 러너가 0으로 종료
    Passed,
    /// 테스트 러너가 0이 아닌 코드로 종료 (정상적인 결과 경로)
    TestFailed,
    /// 테스트 러너가 실행되기 전에 오케스트레이션 실패
    StartupError,
    /// 운영자 시그널로 중단
    Interrupted,
}

impl RunOutcome {
    /// 테스트 러너 종료 코드로부터 결과를 판정합니다.
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            Self::Passed
        } else {
            Self::TestFailed
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::TestFailed => "test_failed",
            Self::StartupError => "startup_error",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 정리(`down`) 결과
///
/// 정리 실패는 보고만 하고 실행 결과를 덮어쓰지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownStatus {
    /// `down` 성공
    Ok,
    /// `down` 실패
    Failed { reason: String },
    /// 컨테이너가 만들어지지 않아 건너뜀
    Skipped,
}

impl fmt::Display for TeardownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}
