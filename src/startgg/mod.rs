//! Access to the start.gg GraphQL API.

use {
    async_trait::async_trait,
    reqwest::{
        StatusCode,
        header::RETRY_AFTER,
    },
    url::Url,
    crate::prelude::*,
};

pub(crate) mod executor;
#[cfg(test)] pub(crate) mod fake;
pub(crate) mod queries;
pub(crate) mod rate_limit;

#[derive(Debug, thiserror::Error)]
pub(crate) enum TransportError {
    #[error(transparent)] Reqwest(#[from] reqwest::Error),
    #[cfg(test)]
    #[error("connection reset")]
    ConnectionReset,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdInner {
    Number(serde_json::Number),
    String(String),
}

impl From<IdInner> for ID {
    fn from(inner: IdInner) -> Self {
        Self(match inner {
            IdInner::Number(n) => n.to_string(),
            IdInner::String(s) => s,
        })
    }
}

/// start.gg returns IDs as numbers or strings depending on the query, see <https://github.com/smashgg/developer-portal/issues/171>
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(from = "IdInner", into = "String")]
pub(crate) struct ID(pub(crate) String);

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<ID> for String {
    fn from(ID(s): ID) -> Self {
        s
    }
}

impl From<&str> for ID {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// What came back from one POST, before any GraphQL-level interpretation.
#[derive(Debug, Clone)]
pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) retry_after: Option<Duration>,
    pub(crate) body: String,
}

#[async_trait]
pub(crate) trait Transport: Send + Sync {
    async fn post(&self, body: &QueryBody<Value>) -> Result<RawResponse, TransportError>;
}

pub(crate) struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: Url,
    auth_token: String,
    timeout: Duration,
}

impl HttpTransport {
    pub(crate) fn new(http_client: reqwest::Client, endpoint: Url, auth_token: String, timeout: Duration) -> Self {
        Self { http_client, endpoint, auth_token, timeout }
    }
}

/// `Retry-After` is either delay-seconds or an HTTP-date. A date in the past means no wait.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs))
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some((date.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &QueryBody<Value>) -> Result<RawResponse, TransportError> {
        let response = self.http_client.post(self.endpoint.clone())
            .bearer_auth(&self.auth_token)
            .timeout(self.timeout)
            .json(body)
            .send().await?;
        let status = response.status();
        let retry_after = response.headers().get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));
        let body = response.text().await?;
        Ok(RawResponse { status, retry_after, body })
    }
}
