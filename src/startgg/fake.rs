//! Scripted stand-in for the HTTP transport.

use {
    std::{
        collections::VecDeque,
        sync::Mutex as SyncMutex,
    },
    async_trait::async_trait,
    reqwest::StatusCode,
    serde_json::json,
    crate::{
        prelude::*,
        startgg::{
            RawResponse,
            Transport,
            TransportError,
            executor::RetryPolicy,
            rate_limit::{
                DEFAULT_INTERVAL,
                RateLimiter,
            },
        },
    },
};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Body(StatusCode, Value),
    RateLimited(Option<Duration>),
    Reset,
}

impl Reply {
    pub(crate) fn data(data: Value) -> Self {
        Self::Body(StatusCode::OK, json!({ "data": data }))
    }

    pub(crate) fn errors(messages: &[&str]) -> Self {
        Self::Body(StatusCode::OK, json!({
            "data": null,
            "errors": messages.iter().map(|message| json!({ "message": message })).collect_vec(),
        }))
    }

    pub(crate) fn status(status: StatusCode) -> Self {
        Self::Body(status, json!({}))
    }
}

enum Script {
    Queue(SyncMutex<VecDeque<Reply>>),
    Route(Box<dyn Fn(&QueryBody<Value>) -> Reply + Send + Sync>),
}

pub(crate) struct FakeTransport {
    script: Script,
    calls: Arc<SyncMutex<Vec<(&'static str, Value)>>>,
    call_times: Arc<SyncMutex<Vec<Instant>>>,
}

impl FakeTransport {
    /// Replies in order, then fails every further call.
    pub(crate) fn scripted(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Script::Queue(SyncMutex::new(replies.into_iter().collect())),
            calls: Arc::default(),
            call_times: Arc::default(),
        }
    }

    /// Replies by inspecting each request.
    pub(crate) fn routed(route: impl Fn(&QueryBody<Value>) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            script: Script::Route(Box::new(route)),
            calls: Arc::default(),
            call_times: Arc::default(),
        }
    }

    /// Handle on the (operation name, variables) log, usable after the transport is boxed.
    pub(crate) fn calls(&self) -> Arc<SyncMutex<Vec<(&'static str, Value)>>> {
        Arc::clone(&self.calls)
    }

    /// When each call arrived, in arrival order.
    pub(crate) fn call_times(&self) -> Arc<SyncMutex<Vec<Instant>>> {
        Arc::clone(&self.call_times)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post(&self, body: &QueryBody<Value>) -> Result<RawResponse, TransportError> {
        self.call_times.lock().unwrap().push(Instant::now());
        self.calls.lock().unwrap().push((body.operation_name, body.variables.clone()));
        let reply = match &self.script {
            Script::Queue(replies) => replies.lock().unwrap().pop_front().unwrap_or(Reply::Reset),
            Script::Route(route) => route(body),
        };
        match reply {
            Reply::Body(status, body) => Ok(RawResponse { status, retry_after: None, body: body.to_string() }),
            Reply::RateLimited(retry_after) => Ok(RawResponse { status: StatusCode::TOO_MANY_REQUESTS, retry_after, body: String::default() }),
            Reply::Reset => Err(TransportError::ConnectionReset),
        }
    }
}

/// An executor over `transport` with the default retry policy and start.gg pacing.
pub(crate) fn executor(transport: FakeTransport) -> Arc<RequestExecutor> {
    Arc::new(RequestExecutor::new(Box::new(transport), RateLimiter::new(DEFAULT_INTERVAL), RetryPolicy {
        max_attempts: 3,
        server_error_delay: Duration::from_secs(10),
        backoff_base: Duration::from_secs(10),
        default_retry_after: Duration::from_secs(60),
        max_rate_limit_waits: 10,
    }))
}
