use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use ureq::Agent;

use crate::config::Variables;
use crate::error::{FixtureError, FixtureResult};

/// Blocking session against a CKAN action API, sharing one agent and user agent across calls.
#[derive(Clone)]
pub struct ApiSession {
    agent: Agent,
    base_url: String,
    user_agent: String,
}

impl ApiSession {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self::with_timeout(base_url, user_agent, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        let base_url: String = base_url.into();
        Self {
            agent: config.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    pub fn from_variables(vars: &Variables) -> Self {
        Self::with_timeout(
            vars.base_url(),
            vars.api_user_agent.clone(),
            Duration::from_secs(vars.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn action_url(&self, endpoint: &str) -> String {
        format!("{}/action/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// GET `{base_url}/action/<endpoint>` and return the full decoded body.
    /// Anything other than 200 is an error.
    pub fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> FixtureResult<Value> {
        let url = self.action_url(endpoint);
        let mut request = self
            .agent
            .get(&url)
            .header("User-Agent", self.user_agent.as_str());
        for (key, value) in query {
            request = request.query(*key, *value);
        }

        debug!(%url, ?query, "GET");
        let mut resp = request.call().map_err(|source| FixtureError::Transport {
            source: Box::new(source),
            url: url.clone(),
        })?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(FixtureError::Status { url, status });
        }

        resp.body_mut()
            .read_json::<Value>()
            .map_err(|err| FixtureError::MissingResult {
                url,
                reason: format!("invalid JSON body: {err}"),
            })
    }

    /// Like [`ApiSession::get`] but unwraps the `result` member of the body.
    pub fn action(&self, endpoint: &str, query: &[(&str, &str)]) -> FixtureResult<Value> {
        let body = self.get(endpoint, query)?;
        extract_result(body).map_err(|reason| FixtureError::MissingResult {
            url: self.action_url(endpoint),
            reason,
        })
    }
}

fn extract_result(body: Value) -> Result<Value, String> {
    match body {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| "missing `result` member".to_string()),
        other => Err(format!("expected an object, got {other}")),
    }
}

/// Matches the canonical 8-4-4-4-12 hex UUID layout.
pub fn is_uuid_like(s: &str) -> bool {
    s.len() == 36
        && s.chars().enumerate().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uuid_detection() {
        assert!(is_uuid_like("0d1c7f2e-6b1a-4c3e-9f0a-1b2c3d4e5f60"));
        assert!(is_uuid_like("0D1C7F2E-6B1A-4C3E-9F0A-1B2C3D4E5F60"));
        assert!(!is_uuid_like("example-dataset-number-one"));
        assert!(!is_uuid_like("0d1c7f2e66b1a-4c3e-9f0a-1b2c3d4e5f60"));
        assert!(!is_uuid_like("0d1c7f2e-6b1a-4c3e-9f0a-1b2c3d4e5f6"));
    }

    #[test]
    fn action_url_joins_cleanly() {
        let session = ApiSession::new("http://ckan.local/api/", "ua");
        assert_eq!(
            session.action_url("package_list"),
            "http://ckan.local/api/action/package_list"
        );
    }

    #[test]
    fn extract_result_requires_result_member() {
        assert_eq!(extract_result(json!({"result": [1]})), Ok(json!([1])));
        assert!(extract_result(json!({"success": false})).is_err());
        assert!(extract_result(json!([1])).is_err());
    }
}
