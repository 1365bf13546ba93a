//! 에러 타입 — 도메인별 에러 정의

/// hubtest 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum HubtestError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 호스트에 존재해야 하는 경로가 없음
    #[error("path for '{field}' does not exist: {path}")]
    MissingPath { field: String, path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_hubtest_error() {
        let err: HubtestError = ConfigError::InvalidValue {
            field: "harness.db_src".to_owned(),
            reason: "both or neither".to_owned(),
        }
        .into();
        assert!(matches!(err, HubtestError::Config(_)));
        assert!(err.to_string().starts_with("config error:"));
        assert!(err.to_string().contains("harness.db_src"));
    }

    #[test]
    fn missing_path_display_names_field_and_path() {
        let err = ConfigError::MissingPath {
            field: "harness.config_src".to_owned(),
            path: "/nope/jupyterhub_config.py".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("harness.config_src"));
        assert!(msg.contains("/nope/jupyterhub_config.py"));
    }
}
