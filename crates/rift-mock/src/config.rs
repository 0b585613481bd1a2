//! YAML mock definitions for the `rift-mock` binary.
//!
//! ```yaml
//! server:
//!   port: 8080
//! mocksDir: ./fixtures
//! mocks:
//!   - method: GET
//!     path:
//!       endsWith: /users
//!     responses:
//!       - status: 200
//!         file: users.json
//!         headers:
//!           Content-Type: application/json
//!       - status: 503
//!     bodyDelaysMs: [250]
//! ```

use crate::call::{MatchableCall, TimeUnit};
use crate::loader::{FileLoader, FsFileLoader};
use crate::logger::MockLogger;
use crate::matcher::{
    all_of, any_request, has_header_names, has_query_parameter_names, http_method_is,
    path_contains, path_does_not_contain, path_ends_with, path_matches, path_starts_with, Matcher,
};
use crate::response::MockResponse;
use crate::server::{MockServer, ServerOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MocksConfig {
    #[serde(default)]
    pub server: ServerOptions,
    /// Root for `file` responses, relative to the working directory
    #[serde(default)]
    pub mocks_dir: Option<String>,
    #[serde(default)]
    pub mocks: Vec<MockDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDefinition {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: PathRule,
    #[serde(default)]
    pub query_params: Vec<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    pub responses: Vec<ResponseDefinition>,
    #[serde(default)]
    pub body_delays_ms: Vec<u64>,
    #[serde(default)]
    pub header_delays_ms: Vec<u64>,
}

/// Path predicates. All given rules must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRule {
    pub contains: Option<String>,
    pub does_not_contain: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub matches: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_status() -> u16 {
    200
}

impl MocksConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: MocksConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.use_https {
            if let Some(tls) = &self.server.tls {
                if tls.cert_path.is_empty() || tls.key_path.is_empty() {
                    anyhow::bail!("Both 'server.tls.certPath' and 'server.tls.keyPath' are required");
                }
            }
        }
        for (i, mock) in self.mocks.iter().enumerate() {
            mock.validate()
                .map_err(|e| anyhow::anyhow!("Invalid mock #{}: {}", i, e))?;
        }
        Ok(())
    }

    pub fn file_loader(&self) -> FsFileLoader {
        FsFileLoader::new(self.mocks_dir.as_deref().unwrap_or("."))
    }

    /// Declare every mock on `server`, in file order.
    pub fn register(&self, server: &MockServer) -> Result<Vec<MatchableCall>, anyhow::Error> {
        self.mocks
            .iter()
            .map(|mock| mock.register(server))
            .collect()
    }
}

impl MockDefinition {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.responses.is_empty() {
            anyhow::bail!("at least one response is required");
        }
        for response in &self.responses {
            if response.body.is_some() && response.file.is_some() {
                anyhow::bail!("a response has both 'body' and 'file'");
            }
            if !(100..=999).contains(&response.status) {
                anyhow::bail!("unsupported status code {}", response.status);
            }
        }
        if let Some(pattern) = &self.path.matches {
            regex::Regex::new(pattern)
                .map_err(|e| anyhow::anyhow!("invalid path regex '{}': {}", pattern, e))?;
        }
        Ok(())
    }

    pub fn matcher(&self) -> Result<Matcher, anyhow::Error> {
        let mut matchers = Vec::new();
        if let Some(method) = &self.method {
            matchers.push(http_method_is(method.as_str()));
        }
        let path = &self.path;
        if let Some(part) = &path.contains {
            matchers.push(path_contains(part.as_str()));
        }
        if let Some(part) = &path.does_not_contain {
            matchers.push(path_does_not_contain(part.as_str()));
        }
        if let Some(part) = &path.starts_with {
            matchers.push(path_starts_with(part.as_str()));
        }
        if let Some(part) = &path.ends_with {
            matchers.push(path_ends_with(part.as_str()));
        }
        if let Some(pattern) = &path.matches {
            matchers.push(path_matches(pattern)?);
        }
        if !self.query_params.is_empty() {
            matchers.push(has_query_parameter_names(self.query_params.iter()));
        }
        if !self.headers.is_empty() {
            matchers.push(has_header_names(self.headers.iter()));
        }

        Ok(match matchers.len() {
            0 => any_request(),
            1 => matchers.remove(0),
            _ => all_of(matchers),
        })
    }

    pub fn register(&self, server: &MockServer) -> Result<MatchableCall, anyhow::Error> {
        let loader = server.file_loader();
        let logger = server.dispatcher().logger();
        let responses: Vec<MockResponse> = self
            .responses
            .iter()
            .map(|response| response.build(loader.as_ref(), logger.as_ref()))
            .collect();

        let call = server
            .when_requested(self.matcher()?)
            .delay_body(TimeUnit::Milliseconds, self.body_delays_ms.iter().copied())
            .delay_headers(TimeUnit::Milliseconds, self.header_delays_ms.iter().copied())
            .then_return_all(responses);
        Ok(call)
    }
}

impl ResponseDefinition {
    /// A file that cannot be read is reported to `logger` and becomes a 500
    /// error response.
    pub fn build(&self, loader: &dyn FileLoader, logger: &dyn MockLogger) -> MockResponse {
        let response = match (&self.body, &self.file) {
            (_, Some(path)) => match loader.read_file(path) {
                Ok(contents) => MockResponse::new(self.status).with_body(contents),
                Err(e) => {
                    let error = anyhow::Error::new(e);
                    logger.error(
                        &format!("## Error while setting up response from file: {}", path),
                        Some(&*error),
                    );
                    return MockResponse::from_error(&error);
                }
            },
            (Some(body), None) => MockResponse::text(self.status, body.as_str()),
            (None, None) => MockResponse::new(self.status),
        };
        self.headers
            .iter()
            .fold(response, |response, (name, value)| {
                response.with_header(name.as_str(), value.as_str())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticFileLoader;
    use crate::logger::{NoopLogger, RecordingLogger};
    use crate::request::RecordedRequest;

    const YAML: &str = r#"
server:
  port: 0
mocksDir: ./fixtures
mocks:
  - method: GET
    path:
      startsWith: /api/users
    queryParams: [page]
    responses:
      - file: users.json
        headers:
          Content-Type: application/json
      - status: 503
    bodyDelaysMs: [250]
  - path:
      matches: "^/orders/[0-9]+$"
    responses:
      - status: 201
        body: created
"#;

    #[test]
    fn test_parse_config() {
        let config = MocksConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.mocks.len(), 2);
        assert_eq!(config.mocks_dir.as_deref(), Some("./fixtures"));
        assert_eq!(config.file_loader().root(), Path::new("./fixtures"));

        let users = &config.mocks[0];
        assert_eq!(users.method.as_deref(), Some("GET"));
        assert_eq!(users.responses[0].status, 200);
        assert_eq!(users.responses[1].status, 503);
        assert_eq!(users.body_delays_ms, vec![250]);
    }

    #[test]
    fn test_matcher_from_definition() {
        let config = MocksConfig::from_yaml(YAML).unwrap();
        let users = config.mocks[0].matcher().unwrap();
        assert!(users.matches(&RecordedRequest::new("GET", "/api/users?page=2")));
        assert!(!users.matches(&RecordedRequest::new("GET", "/api/users")));
        assert!(!users.matches(&RecordedRequest::new("POST", "/api/users?page=2")));

        let orders = config.mocks[1].matcher().unwrap();
        assert!(orders.matches(&RecordedRequest::new("PUT", "/orders/17")));
        assert!(!orders.matches(&RecordedRequest::new("PUT", "/orders/abc")));
    }

    #[test]
    fn test_empty_definition_matches_everything() {
        let mock = MockDefinition {
            responses: vec![ResponseDefinition {
                status: 200,
                body: None,
                file: None,
                headers: BTreeMap::new(),
            }],
            ..Default::default()
        };
        assert!(mock.matcher().unwrap().matches(&RecordedRequest::new("DELETE", "/x")));
    }

    #[test]
    fn test_build_response() {
        let loader = StaticFileLoader::new().with_file("users.json", "[]");
        let config = MocksConfig::from_yaml(YAML).unwrap();

        let ok = config.mocks[0].responses[0].build(&loader, &NoopLogger);
        assert_eq!(ok.status(), 200);
        assert_eq!(ok.body_string(), "[]");
        assert_eq!(ok.header("content-type"), Some("application/json"));

        let missing = StaticFileLoader::new();
        let logger = RecordingLogger::default();
        let failed = config.mocks[0].responses[0].build(&missing, &logger);
        assert_eq!(failed.status(), 500);
        assert!(failed.body_string().contains("users.json"));
        assert!(logger.contains("ERROR ## Error while setting up response from file: users.json"));
    }

    #[test]
    fn test_validation_errors() {
        let no_responses = "mocks:\n  - method: GET\n    responses: []\n";
        let err = MocksConfig::from_yaml(no_responses).unwrap_err();
        assert!(err.to_string().contains("at least one response"));

        let both = "mocks:\n  - responses:\n      - body: a\n        file: b.json\n";
        let err = MocksConfig::from_yaml(both).unwrap_err();
        assert!(err.to_string().contains("both 'body' and 'file'"));

        let bad_regex = "mocks:\n  - path:\n      matches: \"(\"\n    responses:\n      - status: 200\n";
        let err = MocksConfig::from_yaml(bad_regex).unwrap_err();
        assert!(err.to_string().contains("invalid path regex"));
    }

    #[test]
    fn test_missing_file() {
        let err = MocksConfig::from_file("/nonexistent/mocks.yaml").unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }
}
