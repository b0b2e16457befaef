//! Request backlog, outcomes, and the per-run result store.

use {
    std::collections::VecDeque,
    crate::{
        model::TournamentDetail,
        prelude::*,
        startgg::{
            executor::Failure,
            queries::Query,
        },
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RequestClass {
    TournamentPlayers,
    PlayerSets,
    TournamentData,
    TournamentSets,
    SetScore,
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TournamentPlayers => write!(f, "tournament_players"),
            Self::PlayerSets => write!(f, "player_sets"),
            Self::TournamentData => write!(f, "tournament_data"),
            Self::TournamentSets => write!(f, "tournament_sets"),
            Self::SetScore => write!(f, "set_score"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Failed(#[from] Failure),
    #[error("failed to encode variables for {class} request {id}: {source}")]
    Encode {
        class: RequestClass,
        id: String,
        source: serde_json::Error,
    },
    #[error("failed to decode {class} response: {source}")]
    Decode {
        class: RequestClass,
        source: serde_json::Error,
    },
    #[error("no outcome recorded for request {0}")]
    Missing(String),
}

pub(crate) struct Request {
    pub(crate) id: String,
    pub(crate) class: RequestClass,
    pub(crate) body: QueryBody<Value>,
    /// Recorded for diagnostics only. The backlog is strictly first-in-first-out.
    pub(crate) priority: u8,
    pub(crate) created_at: Instant,
}

impl Request {
    pub(crate) fn new<Q: Query>(id: impl Into<String>, priority: u8, variables: Q::Variables) -> Result<Self, Error> {
        let id = id.into();
        let QueryBody { variables, query, operation_name } = Q::build_query(variables);
        let variables = serde_json::to_value(variables).map_err(|source| Error::Encode { class: Q::CLASS, id: id.clone(), source })?;
        Ok(Self {
            class: Q::CLASS,
            body: QueryBody { variables, query, operation_name },
            created_at: Instant::now(),
            id, priority,
        })
    }
}

/// What a request produced.
#[derive(Debug, Clone)]
pub(crate) enum Fetched {
    Data(Value),
    /// Well-formed response for a resource that doesn't exist or has nothing in it.
    Empty,
    Failed(Failure),
}

impl From<Result<Value, Failure>> for Fetched {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(Value::Null) => Self::Empty,
            Ok(Value::Object(fields)) if fields.values().all(Value::is_null) => Self::Empty,
            Ok(data) => Self::Data(data),
            Err(failure) => Self::Failed(failure),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub(crate) class: RequestClass,
    pub(crate) fetched: Fetched,
    pub(crate) completed_at: Instant,
}

impl Outcome {
    /// `Ok(None)` means the upstream resource is absent, as opposed to the request having failed.
    pub(crate) fn decode<Q: Query>(&self) -> Result<Option<Q::ResponseData>, Error> {
        match &self.fetched {
            Fetched::Data(data) => serde_json::from_value(data.clone()).map(Some).map_err(|source| Error::Decode { class: self.class, source }),
            Fetched::Empty => Ok(None),
            Fetched::Failed(failure) => Err(failure.clone().into()),
        }
    }
}

/// Outcomes by request identifier, plus the tournament detail cache keyed by slug.
#[derive(Default)]
pub(crate) struct ResultStore {
    outcomes: RwLock<HashMap<String, Arc<Outcome>>>,
    tournaments: RwLock<HashMap<String, Arc<TournamentDetail>>>,
}

impl ResultStore {
    pub(crate) async fn put(&self, id: String, outcome: Outcome) {
        self.outcomes.write().await.insert(id, Arc::new(outcome));
    }

    pub(crate) async fn get(&self, id: &str) -> Option<Arc<Outcome>> {
        self.outcomes.read().await.get(id).cloned()
    }

    /// Decodes the outcome recorded for `id`, treating a missing outcome as an error.
    pub(crate) async fn decode<Q: Query>(&self, id: &str) -> Result<Option<Q::ResponseData>, Error> {
        self.get(id).await.ok_or_else(|| Error::Missing(id.to_owned()))?.decode::<Q>()
    }

    pub(crate) async fn get_cached(&self, slug: &str) -> Option<Arc<TournamentDetail>> {
        self.tournaments.read().await.get(slug).cloned()
    }

    pub(crate) async fn put_cached(&self, slug: String, detail: Arc<TournamentDetail>) {
        self.tournaments.write().await.insert(slug, detail);
    }
}

/// FIFO backlog drained through a shared executor into a shared store.
///
/// Each worker owns its own scheduler, so draining one request always runs the request the same worker enqueued.
pub(crate) struct RequestScheduler {
    executor: Arc<RequestExecutor>,
    store: Arc<ResultStore>,
    backlog: VecDeque<Request>,
}

impl RequestScheduler {
    pub(crate) fn new(executor: Arc<RequestExecutor>, store: Arc<ResultStore>) -> Self {
        Self {
            backlog: VecDeque::default(),
            executor, store,
        }
    }

    pub(crate) fn store(&self) -> &Arc<ResultStore> {
        &self.store
    }

    pub(crate) fn enqueue(&mut self, request: Request) {
        self.backlog.push_back(request);
    }

    pub(crate) fn enqueue_query<Q: Query>(&mut self, id: impl Into<String>, priority: u8, variables: Q::Variables) -> Result<(), Error> {
        self.enqueue(Request::new::<Q>(id, priority, variables)?);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.backlog.len()
    }

    /// Executes queued requests oldest first until the backlog is empty or `max_requests` outcomes are recorded.
    ///
    /// Returns the number of outcomes recorded. Pacing is left entirely to the executor's rate limiter.
    pub(crate) async fn drain(&mut self, max_requests: usize) -> usize {
        let mut processed = 0;
        while processed < max_requests {
            let Some(Request { id, class, body, priority, created_at }) = self.backlog.pop_front() else { break };
            let fetched = Fetched::from(self.executor.execute(&body).await);
            if let Fetched::Failed(failure) = &fetched {
                log::warn!("{class} request {id} failed: {failure}");
            }
            processed += 1;
            let outcome = Outcome { completed_at: Instant::now(), class, fetched };
            log::debug!("processed {processed}/{max_requests} - {class} {id} (priority {priority}, {:?} after enqueue)", outcome.completed_at - created_at);
            self.store.put(id, outcome).await;
        }
        processed
    }

    /// Drains one batch round. Requests left over once `max_requests` is reached are dropped,
    /// so their outcomes read as missing instead of leaking into the next round.
    pub(crate) async fn drain_round(&mut self, max_requests: usize) -> usize {
        let processed = self.drain(max_requests).await;
        if !self.backlog.is_empty() {
            log::warn!("request budget of {max_requests} exhausted, skipping {} queued requests", self.backlog.len());
            self.backlog.clear();
        }
        processed
    }

    /// Enqueues one request, drains it, and decodes its outcome.
    pub(crate) async fn fetch<Q: Query>(&mut self, id: impl Into<String>, priority: u8, variables: Q::Variables) -> Result<Option<Q::ResponseData>, Error> {
        let id = id.into();
        self.enqueue_query::<Q>(id.clone(), priority, variables)?;
        // requests queued earlier by this scheduler run first
        let pending = self.len();
        self.drain(pending).await;
        self.store.decode::<Q>(&id).await
    }
}
