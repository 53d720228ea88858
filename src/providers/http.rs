//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::SourceError;

/// Bytes of an error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 512;

pub fn user_agent() -> &'static str {
    concat!("contentgate/", env!("CARGO_PKG_VERSION"))
}

/// One backend endpoint with its credentials and a bounded request timeout.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    /// `base` is treated as a directory: relative paths are appended to it.
    pub fn new(base: &str, token: Option<String>, timeout: Duration) -> Result<Self, SourceError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized)
            .map_err(|err| SourceError::Config(format!("invalid base url `{base}`: {err}")))?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Config(format!("cannot build http client: {err}")))?;
        Ok(Self {
            client,
            base,
            token: token.filter(|token| !token.is_empty()),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn url(&self, path: &str) -> Result<Url, SourceError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| SourceError::Config(format!("invalid request path `{path}`: {err}")))
    }

    fn auth_header(&self) -> Result<Option<HeaderValue>, SourceError> {
        self.token
            .as_ref()
            .map(|token| {
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|err| SourceError::Config(format!("invalid api token: {err}")))
            })
            .transpose()
    }

    /// GET `path` with `query` and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, SourceError> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let mut request = self
            .client
            .get(url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(header) = self.auth_header()? {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(path = url.path(), status = status.as_u16(), "Content backend responded");

        let bytes = response.bytes().await?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use serde_json::{Value, json};

    use super::*;

    fn api(server: &MockServer, token: Option<&str>) -> ApiClient {
        ApiClient::new(
            &server.base_url(),
            token.map(String::from),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[test]
    fn paths_are_joined_under_base() {
        let api = ApiClient::new("https://cms.example.com/v1", None, Duration::from_secs(1))
            .expect("client");
        assert_eq!(
            api.url("/data/query").expect("url").as_str(),
            "https://cms.example.com/v1/data/query"
        );
    }

    #[test]
    fn invalid_base_is_a_config_error() {
        let err = ApiClient::new("not a url", None, Duration::from_secs(1)).expect_err("invalid");
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[tokio::test]
    async fn sends_bearer_token_and_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/api/pages")
                .query_param("pagination[limit]", "5")
                .header("authorization", "Bearer secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"data": []}));
        });

        let body: Value = api(&server, Some("secret"))
            .get_json(
                "api/pages",
                &[("pagination[limit]".to_string(), "5".to_string())],
            )
            .await
            .expect("json");
        mock.assert();
        assert_eq!(body, json!({"data": []}));
    }

    #[tokio::test]
    async fn error_status_keeps_code_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/api/pages");
            then.status(401).body("invalid token");
        });

        let err = api(&server, None)
            .get_json::<Value>("api/pages", &[])
            .await
            .expect_err("unauthorized");
        match err {
            SourceError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/broken");
            then.status(200).body("{not json");
        });

        let err = api(&server, None)
            .get_json::<Value>("broken", &[])
            .await
            .expect_err("decode");
        assert!(matches!(err, SourceError::Decode(_)));
    }
}
