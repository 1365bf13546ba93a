//! Harness environment rendering.
//!
//! The compose file reads its inputs through `${VAR}` interpolation, so the
//! resolved [`HarnessConfig`] has to cross the process boundary as
//! environment variables. [`HarnessEnv`] is that boundary: it is applied to
//! each child `Command` and never written into the launcher's own environment.

use std::path::{Path, PathBuf};

use hubtest_core::config::HarnessConfig;
use hubtest_core::types::{
    ENV_BASE_IMAGE, ENV_CONFIG_DEST, ENV_CONFIG_SRC, ENV_DB_DEST, ENV_DB_SRC, ENV_SPEC,
};

/// Ordered set of variables exported to the orchestration tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessEnv {
    vars: Vec<(String, String)>,
}

impl HarnessEnv {
    /// Build the variable set from the harness section.
    ///
    /// Host-side paths are made absolute against `base_dir`, because compose
    /// resolves relative bind-mount sources against the compose file's
    /// directory rather than the caller's. An empty DB pair stays empty.
    pub fn from_config(harness: &HarnessConfig, base_dir: &Path) -> Self {
        let mut vars = vec![
            (ENV_BASE_IMAGE.to_owned(), harness.base_image.clone()),
            (
                ENV_CONFIG_SRC.to_owned(),
                absolutize(base_dir, &harness.config_src),
            ),
            (ENV_CONFIG_DEST.to_owned(), harness.config_dest.clone()),
            (ENV_DB_SRC.to_owned(), absolutize(base_dir, &harness.db_src)),
            (ENV_DB_DEST.to_owned(), harness.db_dest.clone()),
            (ENV_SPEC.to_owned(), harness.spec.clone()),
        ];
        vars.extend(
            harness
                .extra_env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Self { vars }
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Render as `KEY=VALUE` lines, quoting values that a shell or a
    /// compose `.env` file would otherwise split or expand.
    pub fn render_dotenv(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.vars {
            out.push_str(key);
            out.push('=');
            out.push_str(&quote(value));
            out.push('\n');
        }
        out
    }
}

fn absolutize(base_dir: &Path, path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let p = PathBuf::from(path);
    if p.is_absolute() {
        path.to_owned()
    } else {
        base_dir.join(p).display().to_string()
    }
}

fn quote(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '$' | '\\' | '`'));
    if !needs_quotes {
        return value.to_owned();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubtest_core::types::HARNESS_ENV_KEYS;

    fn harness() -> HarnessConfig {
        HarnessConfig::default()
    }

    #[test]
    fn exports_all_six_variables_in_order() {
        let env = HarnessEnv::from_config(&harness(), Path::new("/work"));
        let keys: Vec<&str> = env.vars().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, HARNESS_ENV_KEYS.to_vec());
    }

    #[test]
    fn host_paths_are_absolutized() {
        let env = HarnessEnv::from_config(&harness(), Path::new("/work"));
        assert_eq!(
            env.get(ENV_CONFIG_SRC),
            Some("/work/e2e/jupyterhub_config.py")
        );
        // 컨테이너 경로는 그대로
        assert_eq!(
            env.get(ENV_CONFIG_DEST),
            Some("/srv/jupyterhub/jupyterhub_config.py")
        );
        assert_eq!(env.get(ENV_SPEC), Some("cypress/integration/login.spec.js"));
    }

    #[test]
    fn empty_db_pair_is_exported_empty() {
        let env = HarnessEnv::from_config(&harness(), Path::new("/work"));
        assert_eq!(env.get(ENV_DB_SRC), Some(""));
        assert_eq!(env.get(ENV_DB_DEST), Some(""));
    }

    #[test]
    fn absolute_db_src_is_kept() {
        let mut h = harness();
        h.db_src = "/data/seed.sqlite".to_owned();
        h.db_dest = "/srv/jupyterhub/jupyterhub.sqlite".to_owned();
        let env = HarnessEnv::from_config(&h, Path::new("/work"));
        assert_eq!(env.get(ENV_DB_SRC), Some("/data/seed.sqlite"));
    }

    #[test]
    fn extra_env_follows_harness_vars() {
        let mut h = harness();
        h.extra_env
            .insert("SSL_CERT".to_owned(), "/certs/hub.crt".to_owned());
        let env = HarnessEnv::from_config(&h, Path::new("/work"));
        assert_eq!(env.vars().len(), 7);
        assert_eq!(env.vars()[6].0, "SSL_CERT");
    }

    #[test]
    fn dotenv_quotes_only_when_needed() {
        let mut h = harness();
        h.spec = "cypress/integration/login spec.js".to_owned();
        let env = HarnessEnv::from_config(&h, Path::new("/work"));
        let rendered = env.render_dotenv();
        assert!(rendered.contains("HUBTEST_BASE_IMAGE=jupyterhub/jupyterhub:latest\n"));
        assert!(rendered.contains("HUBTEST_DB_SRC=\n"));
        assert!(rendered.contains("HUBTEST_SPEC=\"cypress/integration/login spec.js\"\n"));
    }

    #[test]
    fn dotenv_escapes_dollar_and_quotes() {
        assert_eq!(quote("a$b"), "\"a\\$b\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }
}
