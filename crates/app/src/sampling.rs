//! Fixtures that pick sample records from a live CKAN instance.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde_json::Value;
use tracing::info;

use crate::client::{ApiSession, is_uuid_like};
use crate::config::Variables;
use crate::error::{FixtureError, FixtureResult};

/// Slug of the dataset every fixed-data instance is expected to carry.
pub const STABLE_PKG_SLUG: &str = "example-dataset-number-one";

/// `package_list` is large and slow, so only the first page is sampled.
const PACKAGE_LIST_LIMIT: &str = "200";

const HARVEST_OBJECT_QUERY: &str = "harvest_object_id:*";

pub struct Sampler {
    session: ApiSession,
    rng: StdRng,
}

impl Sampler {
    /// Unseeded: selections differ from run to run.
    pub fn new(session: ApiSession) -> Self {
        Self {
            session,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(session: ApiSession, seed: u64) -> Self {
        Self {
            session,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_variables(vars: &Variables) -> Self {
        let session = ApiSession::from_variables(vars);
        match vars.random_seed {
            Some(seed) => Self::seeded(session, seed),
            None => Self::new(session),
        }
    }

    pub fn session(&self) -> &ApiSession {
        &self.session
    }

    pub fn random_org_slug(&mut self) -> FixtureResult<String> {
        let result = self.session.action("organization_list", &[])?;
        let slugs = string_list(&result, "organization_list")?;
        let slug = self.choose(&slugs, "organization_list returned no organizations")?;
        info!(%slug, "selected random organization");
        Ok(slug)
    }

    /// A random package slug, skipping packages that are only addressable by UUID.
    pub fn random_pkg_slug(&mut self) -> FixtureResult<String> {
        let result = self
            .session
            .action("package_list", &[("limit", PACKAGE_LIST_LIMIT)])?;
        let suitable: Vec<String> = string_list(&result, "package_list")?
            .into_iter()
            .filter(|name| !is_uuid_like(name))
            .collect();
        let slug = self.choose(&suitable, "No suitable package slugs found")?;
        info!(%slug, "selected random package");
        Ok(slug)
    }

    pub fn stable_pkg_slug(&self) -> &'static str {
        STABLE_PKG_SLUG
    }

    /// `package_show` for a randomly chosen package.
    pub fn random_pkg(&mut self) -> FixtureResult<Value> {
        let slug = self.random_pkg_slug()?;
        self.session.action("package_show", &[("id", slug.as_str())])
    }

    /// The `harvest_object_id` extra of a random harvested package.
    pub fn random_harvestobject_id(&mut self) -> FixtureResult<String> {
        // The first request is only for the count, to bound the random offset.
        let counted = self.session.action(
            "package_search",
            &[("q", HARVEST_OBJECT_QUERY), ("rows", "1")],
        )?;
        let count = counted
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| FixtureError::MissingResult {
                url: self.session.action_url("package_search"),
                reason: "package_search result has no numeric `count`".into(),
            })?;
        if count == 0 {
            return Err(FixtureError::NoCandidates(
                "no packages carry a harvest_object_id".into(),
            ));
        }

        let start = self.rng.gen_range(0..count).to_string();
        let detail = self.session.action(
            "package_search",
            &[
                ("q", HARVEST_OBJECT_QUERY),
                ("rows", "1"),
                ("start", start.as_str()),
            ],
        )?;

        let id = detail
            .pointer("/results/0/extras")
            .and_then(Value::as_array)
            .and_then(|extras| {
                extras.iter().find_map(|kv| {
                    (kv.get("key").and_then(Value::as_str) == Some("harvest_object_id"))
                        .then(|| kv.get("value").and_then(Value::as_str))
                        .flatten()
                })
            })
            .ok_or_else(|| {
                FixtureError::NoCandidates(format!(
                    "package at offset {start} has no harvest_object_id extra"
                ))
            })?;
        info!(harvest_object_id = %id, %start, "selected random harvest object");
        Ok(id.to_string())
    }

    fn choose(&mut self, candidates: &[String], empty: &str) -> FixtureResult<String> {
        candidates
            .choose(&mut self.rng)
            .cloned()
            .ok_or_else(|| FixtureError::NoCandidates(empty.to_string()))
    }
}

fn string_list(result: &Value, endpoint: &str) -> FixtureResult<Vec<String>> {
    let items = result
        .as_array()
        .ok_or_else(|| FixtureError::NoCandidates(format!("{endpoint} result is not a list")))?;
    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}
