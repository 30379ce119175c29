use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Variables;
use crate::error::{FixtureError, FixtureResult};
use crate::normalize::{UnstableTemplater, is_unstable_key, strip_unstable_data};
use crate::template::TemplateVars;

pub const STABLE_PKG: &str = "stable/package_show.inner.test.json";
pub const STABLE_PKG_SEARCH: &str = "stable/package_search.inner.test.json";
pub const STABLE_PKG_DEFAULT_SCHEMA: &str = "stable/package_show.default_schema.inner.test.json";
pub const STABLE_ORG: &str = "stable/organization_show.inner.test.json";
pub const STABLE_ORG_WITH_DATASETS: &str =
    "stable/organization_show_with_datasets.inner.test.json";
pub const STABLE_DATASET: &str = "stable/search_dataset.inner.test.json";

/// Load a stored response relative to `root`.
pub fn load_json(root: &Path, name: impl AsRef<Path>) -> FixtureResult<Value> {
    let full = root.join(name.as_ref());
    let data = fs::read_to_string(&full).map_err(|source| FixtureError::Io {
        source,
        path: full.clone(),
    })?;
    serde_json::from_str(&data).map_err(|source| FixtureError::Parse { source, path: full })
}

/// Outcome of resolving every stored response under a golden root.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub checked: usize,
    pub failures: Vec<String>,
}

/// Golden ("stable") responses, resolved for the environment under test.
#[derive(Debug, Clone)]
pub struct GoldenFixtures {
    root: PathBuf,
    vars_file: PathBuf,
    enabled: bool,
    allowed_placeholders: BTreeSet<String>,
}

impl GoldenFixtures {
    pub fn new(root: impl Into<PathBuf>, vars_file: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vars_file: vars_file.into(),
            enabled: true,
            allowed_placeholders: BTreeSet::new(),
        }
    }

    pub fn from_variables(vars: &Variables) -> Self {
        Self {
            root: vars.golden_root().into_std_path_buf(),
            vars_file: vars.vars_file_path().into_std_path_buf(),
            enabled: vars.inc_fixed_data,
            allowed_placeholders: BTreeSet::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Extra placeholder names `check` accepts, e.g. keys captured with a clean set.
    pub fn allow_placeholders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_placeholders
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vars_file(&self) -> &Path {
        &self.vars_file
    }

    /// Raw stored document, with no substitution or normalization.
    pub fn load(&self, name: &str) -> FixtureResult<Value> {
        debug!(name, root = %self.root.display(), "loading golden response");
        load_json(&self.root, name)
    }

    fn guard(&self, name: &str) -> FixtureResult<()> {
        if self.enabled {
            Ok(())
        } else {
            warn!(name, "skipping fixed data fixture");
            Err(FixtureError::FixedDataDisabled)
        }
    }

    fn vars(&self) -> FixtureResult<TemplateVars> {
        TemplateVars::load(&self.vars_file)
    }

    fn resolved(&self, name: &str) -> FixtureResult<Value> {
        self.guard(name)?;
        let raw = self.load(name)?;
        self.vars()?.apply(&raw)
    }

    pub fn stable_pkg(&self) -> FixtureResult<Value> {
        self.resolved(STABLE_PKG)
    }

    pub fn stable_pkg_search(&self) -> FixtureResult<Value> {
        self.guard(STABLE_PKG_SEARCH)?;
        let templated = UnstableTemplater::new().template(self.load(STABLE_PKG_SEARCH)?);
        self.vars()?.apply(&templated)
    }

    pub fn stable_pkg_default_schema(&self) -> FixtureResult<Value> {
        self.resolved(STABLE_PKG_DEFAULT_SCHEMA)
    }

    /// Templated then stripped; needs no template vars.
    pub fn stable_org(&self) -> FixtureResult<Value> {
        self.guard(STABLE_ORG)?;
        let templated = UnstableTemplater::new().template(self.load(STABLE_ORG)?);
        Ok(strip_unstable_data(templated))
    }

    pub fn stable_org_with_datasets(&self) -> FixtureResult<Value> {
        self.resolved(STABLE_ORG_WITH_DATASETS)
    }

    pub fn stable_dataset(&self) -> FixtureResult<Value> {
        self.resolved(STABLE_DATASET)
    }

    /// Load every `*.json` under the root and apply `vars`, reporting parse failures and
    /// placeholders that no template var resolved. Templater placeholders (`<<id>>`,
    /// `<<name-value>>`) and allowed placeholder names are expected to remain.
    pub fn check(&self, vars: &TemplateVars) -> FixtureResult<CheckReport> {
        let mut report = CheckReport::default();
        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|err| FixtureError::Io {
                path: err.path().unwrap_or(&self.root).to_path_buf(),
                source: err.into(),
            })?;
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|s| s.to_str()) != Some("json")
            {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            report.checked += 1;

            match self.load(&name).and_then(|raw| vars.apply(&raw)) {
                Ok(doc) => {
                    let unresolved = TemplateVars::unresolved(&doc)
                        .into_iter()
                        .filter(|token| {
                            !token.ends_with("-value")
                                && !is_unstable_key(token)
                                && !self.allowed_placeholders.contains(token)
                        })
                        .collect::<Vec<_>>();
                    if !unresolved.is_empty() {
                        report
                            .failures
                            .push(format!("{name}: unresolved placeholders {unresolved:?}"));
                    }
                }
                Err(err) => report.failures.push(format!("{name}: {err}")),
            }
        }
        Ok(report)
    }
}
