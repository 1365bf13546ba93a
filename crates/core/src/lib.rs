#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, HubtestError};

// 설정
pub use config::{ComposeConfig, GeneralConfig, HarnessConfig, HubtestConfig};

// 도메인 타입
pub use types::{HARNESS_ENV_KEYS, RunOutcome, RunPhase, TeardownStatus};
