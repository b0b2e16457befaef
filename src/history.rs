//! Per-competitor tournament histories, fetched by a small worker pool.

use {
    futures::future,
    crate::{
        prelude::*,
        scheduler,
        startgg::queries::{
            PlayerSets,
            player_sets,
        },
    },
};

/// Keeps only target-game tournaments that started within the trailing window ending at `now`.
#[derive(Debug, Clone)]
pub(crate) struct HistoryFilter {
    pub(crate) game: String,
    pub(crate) window: TimeDelta,
    pub(crate) now: DateTime<Utc>,
}

impl HistoryFilter {
    pub(crate) fn admits(&self, game: Option<&str>, start_at: Option<i64>) -> bool {
        if game != Some(self.game.as_str()) {
            return false
        }
        let Some(start_at) = start_at else { return false };
        ((self.now - self.window).timestamp()..=self.now.timestamp()).contains(&start_at)
    }

    /// Adds admitted entries to `tournaments`. The first entry seen for a tournament wins.
    fn collect(&self, entries: Vec<player_sets::HistoryEntry>, tournaments: &mut HashMap<ID, TournamentRef>) {
        for player_sets::HistoryEntry { game, tournament_id, slug, name, start_at } in entries {
            if !self.admits(game.as_deref(), start_at) {
                continue
            }
            let Some(start_at) = start_at else { continue };
            if let hash_map::Entry::Vacant(entry) = tournaments.entry(tournament_id) {
                let id = entry.key().clone();
                entry.insert(TournamentRef { id, slug, name, start_at });
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Paging {
    pub(crate) page_size: i64,
    /// Pages fetched after the first, at most.
    pub(crate) max_extra_pages: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct CompetitorHistory {
    pub(crate) competitor: Competitor,
    pub(crate) tournaments: HashMap<ID, TournamentRef>,
}

pub(crate) struct FetchCoordinator {
    executor: Arc<RequestExecutor>,
    store: Arc<ResultStore>,
    filter: Arc<HistoryFilter>,
    workers: usize,
    paging: Paging,
}

impl FetchCoordinator {
    pub(crate) fn new(executor: Arc<RequestExecutor>, store: Arc<ResultStore>, filter: HistoryFilter, workers: usize, paging: Paging) -> Self {
        Self {
            filter: Arc::new(filter),
            workers: workers.max(1),
            executor, store, paging,
        }
    }

    /// Fetches every competitor's filtered history.
    ///
    /// Competitors whose history can't be fetched are logged and left out of the result.
    pub(crate) async fn fetch_all(&self, competitors: impl IntoIterator<Item = Competitor>) -> HashMap<ID, CompetitorHistory> {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        for competitor in competitors {
            // the receiver is alive until the workers below finish
            let _ = work_tx.send(competitor);
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let workers = (0..self.workers).map(|worker| {
            let work_rx = Arc::clone(&work_rx);
            let filter = Arc::clone(&self.filter);
            let paging = self.paging;
            let mut scheduler = RequestScheduler::new(Arc::clone(&self.executor), Arc::clone(&self.store));
            tokio::spawn(async move {
                let mut histories = Vec::default();
                loop {
                    let Some(competitor) = work_rx.lock().await.recv().await else { break };
                    match fetch_history(&mut scheduler, &filter, paging, &competitor).await {
                        Ok(tournaments) => {
                            log::info!("{}: {} {} tournaments", competitor.tag, tournaments.len(), filter.game);
                            histories.push(CompetitorHistory { competitor, tournaments });
                        }
                        Err(e) => log::warn!("worker {worker}: dropping {competitor}, no tournament history: {e}"),
                    }
                }
                histories
            })
        }).collect_vec();
        let mut by_id = HashMap::default();
        for result in future::join_all(workers).await {
            match result {
                Ok(histories) => for history in histories {
                    by_id.insert(history.competitor.id.clone(), history);
                },
                Err(e) => log::error!("history worker failed: {e} ({e:?})"),
            }
        }
        by_id
    }
}

fn page_request_id(competitor: &Competitor, page: i64) -> String {
    format!("player_sets:{}:{page}", competitor.id)
}

/// Page 1, then up to `max_extra_pages` more, each fetched and filtered in turn.
async fn fetch_history(scheduler: &mut RequestScheduler, filter: &HistoryFilter, paging: Paging, competitor: &Competitor) -> Result<HashMap<ID, TournamentRef>, scheduler::Error> {
    let variables = |page| player_sets::Variables { player_id: competitor.id.clone(), page, per_page: paging.page_size };
    let mut tournaments = HashMap::default();
    let Some(first) = scheduler.fetch::<PlayerSets>(page_request_id(competitor, 1), 2, variables(1)).await? else {
        log::info!("{}: no tournament history found", competitor.tag);
        return Ok(tournaments)
    };
    let total_pages = first.total_pages();
    filter.collect(first.into_entries(), &mut tournaments);
    let last_page = total_pages.min(1 + paging.max_extra_pages);
    if last_page > 1 {
        log::info!("{}: fetching {} additional pages sequentially", competitor.tag, last_page - 1);
    }
    for page in 2..=last_page {
        match scheduler.fetch::<PlayerSets>(page_request_id(competitor, page), 2, variables(page)).await {
            Ok(Some(data)) => filter.collect(data.into_entries(), &mut tournaments),
            Ok(None) => break,
            Err(e) => log::warn!("{}: skipping page {page} of {total_pages}: {e}", competitor.tag),
        }
    }
    Ok(tournaments)
}
