use {
    reqwest::StatusCode,
    crate::{
        config::ConfigApi,
        prelude::*,
        startgg::{
            RawResponse,
            Transport,
            rate_limit::RateLimiter,
        },
    },
};

/// Why a request produced no usable payload.
#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum Failure {
    #[error("transport failure after {attempts} attempts: {message}")]
    Transport {
        attempts: u32,
        message: String,
    },
    #[error("server error {status} after {attempts} attempts")]
    Server {
        attempts: u32,
        status: StatusCode,
    },
    #[error("still rate limited after {waits} waits")]
    RateLimited {
        waits: u32,
    },
    #[error("HTTP status {0}")]
    Status(StatusCode),
    #[error("{} GraphQL errors: {}", .0.len(), .0.iter().join("; "))]
    Application(Vec<String>),
}

/// How long to wait and whether to retry, per attempt.
#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) server_error_delay: Duration,
    pub(crate) backoff_base: Duration,
    pub(crate) default_retry_after: Duration,
    pub(crate) max_rate_limit_waits: u32,
}

impl RetryPolicy {
    fn transport_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

impl From<&ConfigApi> for RetryPolicy {
    fn from(api: &ConfigApi) -> Self {
        Self {
            max_attempts: api.max_attempts.max(1),
            server_error_delay: Duration::from_secs(api.server_error_delay_secs),
            backoff_base: Duration::from_secs(api.backoff_base_secs),
            default_retry_after: Duration::from_secs(api.default_retry_after_secs),
            max_rate_limit_waits: api.max_rate_limit_waits,
        }
    }
}

enum Attempt {
    Done(Result<Value, Failure>),
    RateLimited(Option<Duration>),
    Retry(Failure),
}

pub(crate) struct RequestExecutor {
    transport: Box<dyn Transport>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    request_count: AtomicUsize,
}

impl RequestExecutor {
    pub(crate) fn new(transport: Box<dyn Transport>, limiter: RateLimiter, policy: RetryPolicy) -> Self {
        Self {
            request_count: AtomicUsize::default(),
            transport, limiter, policy,
        }
    }

    /// Number of network calls issued so far, retries included.
    pub(crate) fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Runs one GraphQL request to completion.
    ///
    /// Returns the `data` member of the response, which may be `null`.
    /// Failures are reported as values; this never panics on upstream misbehavior.
    pub(crate) async fn execute(&self, body: &QueryBody<Value>) -> Result<Value, Failure> {
        let mut attempt = 1;
        let mut rate_limit_waits = 0;
        loop {
            self.limiter.wait_for_slot().await;
            self.request_count.fetch_add(1, Ordering::SeqCst);
            let classified = match self.transport.post(body).await {
                Ok(response) => classify(response, attempt),
                Err(e) => Attempt::Retry(Failure::Transport { attempts: attempt, message: e.to_string() }),
            };
            match classified {
                Attempt::Done(result) => break result,
                Attempt::RateLimited(retry_after) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.policy.max_rate_limit_waits {
                        break Err(Failure::RateLimited { waits: rate_limit_waits - 1 })
                    }
                    let wait = retry_after.unwrap_or(self.policy.default_retry_after);
                    log::warn!("{}: rate limited, waiting {}s", body.operation_name, wait.as_secs());
                    sleep(wait).await;
                }
                Attempt::Retry(failure) => {
                    if attempt >= self.policy.max_attempts {
                        log::warn!("{}: giving up: {failure}", body.operation_name);
                        break Err(failure)
                    }
                    let wait = match failure {
                        Failure::Server { .. } => self.policy.server_error_delay,
                        _ => self.policy.transport_delay(attempt),
                    };
                    log::warn!("{}: attempt {attempt} failed ({failure}), retrying in {}s", body.operation_name, wait.as_secs());
                    sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn graphql_errors(errors: Option<Vec<graphql_client::Error>>) -> Option<Vec<String>> {
    errors
        .filter(|errors| !errors.is_empty())
        .map(|errors| errors.into_iter().map(|graphql_client::Error { message, .. }| message).collect())
}

fn classify(RawResponse { status, retry_after, body }: RawResponse, attempt: u32) -> Attempt {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Attempt::RateLimited(retry_after)
    }
    if status.is_server_error() {
        return Attempt::Retry(Failure::Server { attempts: attempt, status })
    }
    let parsed = serde_json::from_str::<graphql_client::Response<Value>>(&body);
    if status.is_client_error() {
        return Attempt::Done(Err(match parsed.ok().and_then(|response| graphql_errors(response.errors)) {
            Some(messages) => Failure::Application(messages),
            None => Failure::Status(status),
        }))
    }
    match parsed {
        Ok(graphql_client::Response { data, errors, extensions: _ }) => Attempt::Done(match graphql_errors(errors) {
            Some(messages) => Err(Failure::Application(messages)),
            None => Ok(data.unwrap_or(Value::Null)),
        }),
        Err(e) => Attempt::Retry(Failure::Transport { attempts: attempt, message: format!("unreadable response body: {e}") }),
    }
}
