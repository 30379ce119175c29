use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FixtureError, FixtureResult};

static APP_NAME: &str = "ckan-functional-tests";
static DEFAULT_VARIABLES: Lazy<Variables> = Lazy::new(Variables::default);

/// Variables steering a functional-test run against one CKAN instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variables {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_api_user_agent")]
    pub api_user_agent: String,
    /// Include checks that assume the database and search index agree.
    #[serde(default = "default_true")]
    pub inc_sync_sensitive: bool,
    /// Include checks that compare against stored "stable" data.
    #[serde(default = "default_true")]
    pub inc_fixed_data: bool,
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_vars_file")]
    pub vars_file: Utf8PathBuf,
    #[serde(default)]
    pub golden_root: Option<Utf8PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Variables {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_user_agent: default_api_user_agent(),
            inc_sync_sensitive: true,
            inc_fixed_data: true,
            random_seed: None,
            vars_file: default_vars_file(),
            golden_root: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:5000/api".into()
}

fn default_api_user_agent() -> String {
    format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_vars_file() -> Utf8PathBuf {
    Utf8PathBuf::from("ckan-vars.conf")
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Variables {
    /// Defaults < TOML file < `CKAN_FT_*` environment variables.
    pub fn load(explicit_path: Option<&Utf8Path>) -> FixtureResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(DEFAULT_VARIABLES.clone()));

        if let Some(path) = explicit_path {
            figment = figment.merge(Toml::file(path));
        } else if let Some(path) = resolve_default_variables_path() {
            figment = figment.merge(Toml::file(path));
        } else {
            warn!("no variables file found; relying on defaults + env overrides");
        }

        figment = figment.merge(Env::prefixed("CKAN_FT_"));

        figment
            .extract()
            .map_err(|err| FixtureError::Config(err.to_string()))
    }

    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Base URLs for endpoints published both under `/api` and `/api/3`.
    pub fn base_urls_3(&self) -> [String; 2] {
        let base = self.base_url();
        [base.to_string(), format!("{base}/3")]
    }

    /// The template-vars file; relative paths are taken from the workspace root.
    pub fn vars_file_path(&self) -> Utf8PathBuf {
        if self.vars_file.is_absolute() {
            self.vars_file.clone()
        } else {
            workspace_root().join(&self.vars_file)
        }
    }

    pub fn golden_root(&self) -> Utf8PathBuf {
        self.golden_root
            .clone()
            .unwrap_or_else(|| workspace_root().join("fixtures").join("responses"))
    }
}

pub fn workspace_root() -> &'static Utf8Path {
    static ROOT: Lazy<Utf8PathBuf> = Lazy::new(|| {
        let manifest_dir = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        manifest_dir
            .parent()
            .and_then(|p| p.parent())
            .map(Utf8PathBuf::from)
            .unwrap_or(manifest_dir)
    });
    ROOT.as_path()
}

fn resolve_default_variables_path() -> Option<Utf8PathBuf> {
    let repo_relative = workspace_root().join("config/variables.toml");
    if repo_relative.exists() {
        return Some(repo_relative);
    }

    if let Some(dirs) = ProjectDirs::from("org", "CKAN", APP_NAME)
        && let Ok(path) = Utf8PathBuf::from_path_buf(dirs.config_dir().join("variables.toml"))
        && path.exists()
    {
        return Some(path);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_3_adds_versioned_variant() {
        let vars = Variables {
            api_base_url: "https://ckan.example/api/".into(),
            ..Variables::default()
        };
        assert_eq!(vars.base_url(), "https://ckan.example/api");
        assert_eq!(
            vars.base_urls_3(),
            [
                "https://ckan.example/api".to_string(),
                "https://ckan.example/api/3".to_string()
            ]
        );
    }
}
