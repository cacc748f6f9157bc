use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logging;
use crate::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuetype {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("jira request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("jira returned HTTP {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode jira response: {source}; body: {body}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },
    #[error("invalid jira base url '{0}'")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub http: Client,
    max_retries: usize,
    metrics: Arc<Metrics>,
}

impl JiraClient {
    pub fn new(base_url: String, email: String, api_token: String) -> Result<Self, JiraError> {
        Self::new_with_metrics(base_url, email, api_token, Arc::new(Metrics::new()))
    }

    pub fn new_with_metrics(
        base_url: String,
        email: String,
        api_token: String,
        metrics: Arc<Metrics>,
    ) -> Result<Self, JiraError> {
        let http = Client::builder().build()?;
        let normalized_base_url = normalize_base_url(&base_url)?;
        Ok(Self {
            base_url: normalized_base_url,
            email,
            api_token,
            http,
            max_retries: 3,
            metrics,
        })
    }

    fn request_with_retry<F>(&self, mut send: F) -> Result<Response, JiraError>
    where
        F: FnMut() -> Result<Response, reqwest::Error>,
    {
        for attempt in 0..=self.max_retries {
            self.metrics.inc_api_request();
            let response = match send() {
                Ok(resp) => resp,
                Err(err) => {
                    logging::warn(format!(
                        "jira request transport error on attempt {}: {}",
                        attempt + 1,
                        err
                    ));
                    return Err(JiraError::Request(err));
                }
            };

            if !is_retryable(response.status()) || attempt == self.max_retries {
                if !response.status().is_success() {
                    logging::warn(format!(
                        "jira request completed with status {} after {} attempt(s)",
                        response.status(),
                        attempt + 1
                    ));
                }
                return Ok(response);
            }

            let wait = retry_after_or_backoff(&response, attempt);
            logging::debug(format!(
                "jira retryable status {} attempt {} waiting {:?}",
                response.status(),
                attempt + 1,
                wait
            ));
            self.metrics.inc_retry();
            thread::sleep(wait);
        }

        unreachable!("retry loop should always return");
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, JiraError> {
        let response = self.request_with_retry(|| {
            self.http
                .get(url)
                .basic_auth(&self.email, Some(&self.api_token))
                .query(query)
                .send()
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(JiraError::Http { status, body });
        }

        let body = response.text()?;
        serde_json::from_str(&body).map_err(|source| JiraError::Decode {
            source,
            body: truncate_body(&body),
        })
    }

    /// All projects visible to the authenticated user, walking the
    /// paginated search endpoint until it reports the last page.
    pub fn list_projects(&self) -> Result<Vec<Project>, JiraError> {
        let url = format!("{}/rest/api/3/project/search", self.base_url);
        let max_results: usize = 50;
        let mut start_at: usize = 0;
        let mut all = Vec::new();

        loop {
            let payload: ProjectSearchResponse = self.get_json(
                &url,
                &[
                    ("startAt", start_at.to_string()),
                    ("maxResults", max_results.to_string()),
                ],
            )?;
            let page_count = payload.values.len();
            logging::debug(format!(
                "jira projects page_count={} start_at={} is_last={:?}",
                page_count, start_at, payload.is_last
            ));
            all.extend(payload.values);

            start_at += page_count;
            if payload.is_last.unwrap_or(true) || page_count == 0 {
                break;
            }
            if let Some(total) = payload.total {
                if start_at >= total {
                    break;
                }
            }
        }

        if all.is_empty() {
            logging::warn("jira returned zero visible projects; verify Browse Projects permission");
        }

        Ok(all)
    }

    /// Issue types come back as a bare array, not a paginated wrapper.
    pub fn list_issuetypes(&self) -> Result<Vec<Issuetype>, JiraError> {
        let url = format!("{}/rest/api/3/issuetype", self.base_url);
        self.get_json(&url, &[])
    }

    pub fn list_statuses(&self) -> Result<Vec<Status>, JiraError> {
        let url = format!("{}/rest/api/3/status", self.base_url);
        self.get_json(&url, &[])
    }
}

fn normalize_base_url(raw: &str) -> Result<String, JiraError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(JiraError::InvalidBaseUrl(raw.to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed =
        reqwest::Url::parse(&candidate).map_err(|_| JiraError::InvalidBaseUrl(raw.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn retry_after_or_backoff(response: &Response, attempt: usize) -> Duration {
    if let Some(header) = response.headers().get("Retry-After") {
        if let Ok(value) = header.to_str() {
            if let Ok(seconds) = value.parse::<u64>() {
                return Duration::from_secs(seconds.min(30));
            }
        }
    }

    let seconds = 1_u64 << attempt.min(4);
    Duration::from_secs(seconds)
}

fn truncate_body(body: &str) -> String {
    if body.len() <= 1000 {
        return body.to_string();
    }
    let mut end = 1000;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectSearchResponse {
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    is_last: Option<bool>,
    #[serde(default)]
    values: Vec<Project>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    #[test]
    fn paginates_project_listing() {
        let server = MockServer::start();

        let _page_1 = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/3/project/search")
                .query_param("startAt", "0")
                .query_param("maxResults", "50");
            then.status(200).json_body_obj(&serde_json::json!({
                "startAt": 0,
                "maxResults": 50,
                "total": 2,
                "isLast": false,
                "values": [
                    {"key": "PLAT", "name": "Platform"}
                ]
            }));
        });

        let _page_2 = server.mock(|when, then| {
            when.method(GET)
                .path("/rest/api/3/project/search")
                .query_param("startAt", "1")
                .query_param("maxResults", "50");
            then.status(200).json_body_obj(&serde_json::json!({
                "startAt": 1,
                "maxResults": 50,
                "total": 2,
                "isLast": true,
                "values": [
                    {"key": "OPS", "name": "Operations"}
                ]
            }));
        });

        let client = JiraClient::new(server.base_url(), "e".into(), "t".into()).expect("client");
        let projects = client.list_projects().expect("list should succeed");

        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].key, "PLAT");
        assert_eq!(projects[1].name, "Operations");
    }

    #[test]
    fn lists_issuetypes_from_bare_array() {
        let server = MockServer::start();

        let _mock = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/issuetype");
            then.status(200).json_body_obj(&serde_json::json!([
                {"id": "10001", "name": "Bug"},
                {"id": "10002", "name": "Story"}
            ]));
        });

        let client = JiraClient::new(server.base_url(), "e".into(), "t".into()).expect("client");
        let issuetypes = client.list_issuetypes().expect("list should succeed");

        assert_eq!(issuetypes.len(), 2);
        assert_eq!(issuetypes[0].name, "Bug");
        assert_eq!(issuetypes[1].id, "10002");
    }

    #[test]
    fn retries_on_429_then_succeeds() {
        use tiny_http::{Header, Response, Server, StatusCode};

        let server = Server::http("127.0.0.1:0").expect("server start");
        let addr = format!("http://{}", server.server_addr());
        std::thread::spawn(move || {
            let mut requests = server.incoming_requests();

            if let Some(req) = requests.next() {
                let response = Response::empty(StatusCode(429))
                    .with_header(Header::from_bytes("Retry-After", "0").expect("header"));
                let _ = req.respond(response);
            }

            if let Some(req) = requests.next() {
                let body = serde_json::json!([
                    {"id": "1", "name": "Open"},
                    {"id": "2", "name": "Done"}
                ])
                .to_string();
                let response = Response::from_string(body)
                    .with_status_code(StatusCode(200))
                    .with_header(
                        Header::from_bytes("Content-Type", "application/json").expect("header"),
                    );
                let _ = req.respond(response);
            }
        });

        let client = JiraClient::new(addr, "e".into(), "t".into()).expect("client");
        let statuses = client.list_statuses().expect("eventually succeeds");
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].name, "Open");
    }

    #[test]
    fn auth_failure_surfaces_status_and_body() {
        let server = MockServer::start();

        let _mock = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/status");
            then.status(401).body("unauthorized");
        });

        let client = JiraClient::new(server.base_url(), "e".into(), "t".into()).expect("client");
        let err = client.list_statuses().unwrap_err();
        match err {
            JiraError::Http { status, body } => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_surfaces_decode_error() {
        let server = MockServer::start();

        let _mock = server.mock(|when, then| {
            when.method(GET).path("/rest/api/3/issuetype");
            then.status(200).body("not json");
        });

        let client = JiraClient::new(server.base_url(), "e".into(), "t".into()).expect("client");
        let err = client.list_issuetypes().unwrap_err();
        assert!(matches!(err, JiraError::Decode { .. }));
    }

    #[test]
    fn normalizes_base_urls() {
        let a = normalize_base_url("yourcompany.atlassian.net").expect("normalize");
        assert_eq!(a, "https://yourcompany.atlassian.net");

        let b = normalize_base_url("https://yourcompany.atlassian.net/").expect("normalize");
        assert_eq!(b, "https://yourcompany.atlassian.net");

        let c = normalize_base_url("http://localhost:8080").expect("normalize");
        assert_eq!(c, "http://localhost:8080");

        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("   ").is_err());
    }
}
