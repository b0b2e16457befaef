//! The full collection run, from seed tournament to report records.

use {
    std::collections::HashSet,
    crate::{
        config::ConfigCollection,
        graph::TournamentGraph,
        h2h::HeadToHeadExtractor,
        history::{
            CompetitorHistory,
            FetchCoordinator,
            HistoryFilter,
            Paging,
        },
        model::{
            HeadToHeadOutcome,
            Placement,
            PlacementRecord,
            SharedTournament,
            TournamentDetail,
        },
        prelude::*,
        scheduler,
        startgg::queries::{
            TournamentData,
            TournamentPlayers,
            tournament_data,
            tournament_players,
        },
    },
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Scheduler(#[from] scheduler::Error),
    #[error("seed tournament {0} not found")]
    SeedNotFound(String),
    #[error("seed tournament {0} has no event with a game")]
    NoGame(String),
    #[error("no players found in seed tournament {0}")]
    NoPlayers(String),
}

/// Target competitors and game, as resolved from the seed tournament.
#[derive(Debug, Clone)]
pub(crate) struct Seed {
    pub(crate) game: String,
    pub(crate) competitors: BTreeMap<ID, Competitor>,
}

#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) game: String,
    pub(crate) targets: Vec<Competitor>,
    pub(crate) shared: Vec<SharedTournament>,
    pub(crate) placements: Vec<PlacementRecord>,
    pub(crate) head_to_head: Vec<HeadToHeadOutcome>,
    pub(crate) request_count: usize,
}

impl Report {
    /// Players with at least one placement, and players represented only by a placeholder.
    pub(crate) fn history_counts(&self) -> (usize, usize) {
        let (with, without) = self.placements.iter().partition::<Vec<_>, _>(|record| record.placement.is_some());
        (with.into_iter().unique_by(|record| record.competitor.id.clone()).count(), without.len())
    }
}

pub(crate) struct Collector {
    executor: Arc<RequestExecutor>,
    store: Arc<ResultStore>,
    collection: ConfigCollection,
    now: DateTime<Utc>,
}

impl Collector {
    pub(crate) fn new(executor: Arc<RequestExecutor>, collection: ConfigCollection) -> Self {
        Self {
            store: Arc::default(),
            now: Utc::now(),
            executor, collection,
        }
    }

    fn paging(&self) -> Paging {
        Paging {
            page_size: self.collection.page_size,
            max_extra_pages: self.collection.max_extra_pages,
        }
    }

    fn seed_variables(&self, slug: &str, page: i64) -> tournament_players::Variables {
        tournament_players::Variables { slug: slug.to_owned(), page, per_page: self.collection.page_size }
    }

    /// Target game is the game of the seed's first event; targets are the players of every event in that game.
    ///
    /// Any failure here is fatal to the run.
    pub(crate) async fn resolve_seed(&self, scheduler: &mut RequestScheduler, slug: &str) -> Result<Seed, Error> {
        let request_id = |page| format!("tournament_players:{slug}:{page}");
        let Some(first) = scheduler.fetch::<TournamentPlayers>(request_id(1), 1, self.seed_variables(slug, 1)).await? else {
            return Err(Error::SeedNotFound(slug.to_owned()))
        };
        let mut events = first.into_events();
        let game = events.first().and_then(|event| event.game.clone()).ok_or_else(|| Error::NoGame(slug.to_owned()))?;
        log::info!("target game: {game}");
        let total_pages = events.iter()
            .filter(|event| event.game.as_ref() == Some(&game))
            .map(|event| event.total_pages)
            .max()
            .unwrap_or(1);
        for page in 2..=total_pages {
            scheduler.enqueue_query::<TournamentPlayers>(request_id(page), 1, self.seed_variables(slug, page))?;
        }
        scheduler.drain_round(self.collection.max_requests).await;
        for page in 2..=total_pages {
            match scheduler.store().decode::<TournamentPlayers>(&request_id(page)).await {
                Ok(Some(data)) => events.extend(data.into_events()),
                Ok(None) => {}
                Err(e) => log::warn!("{slug}: skipping entrants page {page}: {e}"),
            }
        }
        let mut competitors = BTreeMap::default();
        for event in events.into_iter().filter(|event| event.game.as_ref() == Some(&game)) {
            for competitor in event.competitors {
                competitors.entry(competitor.id.clone()).or_insert(competitor);
            }
        }
        if competitors.is_empty() {
            return Err(Error::NoPlayers(slug.to_owned()))
        }
        Ok(Seed { game, competitors })
    }

    /// Details of the given tournaments, fetched at most once per slug for the lifetime of this collector.
    ///
    /// Tournaments whose details can't be fetched are missing from the result.
    pub(crate) async fn fetch_tournament_details<'a>(&self, scheduler: &mut RequestScheduler, tournaments: impl IntoIterator<Item = &'a TournamentRef>) -> HashMap<ID, Arc<TournamentDetail>> {
        let tournaments = tournaments.into_iter().collect_vec();
        let mut pending = Vec::default();
        let mut queued = HashSet::new();
        for tournament in &tournaments {
            if self.store.get_cached(&tournament.slug).await.is_some() || !queued.insert(&tournament.slug) {
                continue
            }
            let variables = tournament_data::Variables { slug: tournament.slug.clone(), per_page: self.collection.page_size };
            match scheduler.enqueue_query::<TournamentData>(format!("tournament_data:{}", tournament.slug), 3, variables) {
                Ok(()) => pending.push(*tournament),
                Err(e) => log::warn!("{}: {e}", tournament.name),
            }
        }
        if !pending.is_empty() {
            log::info!("getting data for {} tournaments...", pending.len());
            scheduler.drain_round(self.collection.max_requests).await;
        }
        for tournament in pending {
            match scheduler.store().decode::<TournamentData>(&format!("tournament_data:{}", tournament.slug)).await {
                Ok(Some(data)) => match data.into_detail() {
                    Some(detail) => self.store.put_cached(tournament.slug.clone(), Arc::new(detail)).await,
                    None => log::warn!("{}: tournament data has no ID", tournament.name),
                },
                Ok(None) => log::info!("{}: no tournament data", tournament.name),
                Err(e) => log::warn!("{}: no tournament data: {e}", tournament.name),
            }
        }
        let mut details = HashMap::default();
        for tournament in tournaments {
            if let Some(detail) = self.store.get_cached(&tournament.slug).await {
                details.insert(tournament.id.clone(), detail);
            }
        }
        details
    }

    pub(crate) async fn run(&self, slug: &str) -> Result<Report, Error> {
        let mut scheduler = RequestScheduler::new(Arc::clone(&self.executor), Arc::clone(&self.store));
        let Seed { game, competitors } = self.resolve_seed(&mut scheduler, slug).await?;
        log::info!("found {} target players in {game}: {}", competitors.len(), competitors.values().map(|competitor| &competitor.tag).join(", "));
        log::info!("getting player tournament histories...");
        let coordinator = FetchCoordinator::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.store),
            HistoryFilter { game: game.clone(), window: self.collection.window(), now: self.now },
            self.collection.workers,
            self.paging(),
        );
        let histories = coordinator.fetch_all(competitors.values().cloned()).await;
        let graph = TournamentGraph::build(histories.values());
        let tournament_ids = graph.compute_tournament_id_set();
        log::info!("{} distinct {game} tournaments in the last {} days", tournament_ids.len(), self.collection.window_days);
        let details = self.fetch_tournament_details(&mut scheduler, tournament_ids.iter().filter_map(|id| graph.tournament(id))).await;
        let placements = placement_records(&competitors, &histories, &details, &game);
        let shared = graph.find_shared_tournaments();
        log::info!("{} tournaments shared by two or more target players", shared.len());
        let sets_paging = Paging { page_size: self.collection.sets_page_size, ..self.paging() };
        let extractor = HeadToHeadExtractor::new(competitors.iter().map(|(id, competitor)| (id.clone(), competitor.clone())).collect(), game.clone(), sets_paging, self.collection.max_requests);
        let head_to_head = extractor.extract(&mut scheduler, &shared).await;
        Ok(Report {
            targets: competitors.into_values().collect(),
            request_count: self.executor.request_count(),
            game, shared, placements, head_to_head,
        })
    }
}

/// The competitor's placement in the first event of `game` whose standings list them.
pub(crate) fn find_placement(detail: &TournamentDetail, game: &str, competitor: &ID) -> Option<Placement> {
    detail.events.iter()
        .filter(|event| event.game.as_deref() == Some(game))
        .find_map(|event| {
            let standing = event.standings.iter().find(|standing| standing.competitors.iter().any(|participant| participant.id == *competitor))?;
            Some(Placement {
                tournament_name: detail.name.clone(),
                tournament_start_at: detail.start_at,
                event_name: event.name.clone(),
                placement: standing.placement,
                total_entrants: event.num_entrants.unwrap_or(0),
            })
        })
}

/// One record per placement found, earliest tournament first.
/// Competitors without any placement get a single placeholder record.
pub(crate) fn placement_records(targets: &BTreeMap<ID, Competitor>, histories: &HashMap<ID, CompetitorHistory>, details: &HashMap<ID, Arc<TournamentDetail>>, game: &str) -> Vec<PlacementRecord> {
    let mut records = Vec::default();
    for (id, competitor) in targets {
        let before = records.len();
        if let Some(CompetitorHistory { tournaments, .. }) = histories.get(id) {
            for tournament in tournaments.values().sorted_by_key(|tournament| (tournament.start_at, tournament.id.clone())) {
                let Some(detail) = details.get(&tournament.id) else { continue };
                if let Some(placement) = find_placement(detail, game, id) {
                    records.push(PlacementRecord { competitor: competitor.clone(), placement: Some(placement) });
                }
            }
        }
        if records.len() == before {
            log::info!("{}: no {game} placements found", competitor.tag);
            records.push(PlacementRecord { competitor: competitor.clone(), placement: None });
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use {
        serde_json::json,
        crate::{
            model::{
                Event,
                Standing,
            },
            startgg::fake::{
                FakeTransport,
                Reply,
                executor,
            },
        },
        super::*,
    };

    const GAME: &str = "Street Fighter 6";

    fn test_collector(transport: FakeTransport, now: DateTime<Utc>) -> Collector {
        Collector {
            executor: executor(transport),
            store: Arc::default(),
            collection: ConfigCollection::default(),
            now,
        }
    }

    fn competitor(id: &str, tag: &str) -> Competitor {
        Competitor { id: ID::from(id), tag: tag.to_owned() }
    }

    fn player(id: &str, tag: &str) -> Value {
        json!({ "player": { "id": id, "gamerTag": tag } })
    }

    fn tournament_data_reply(id: u64, name: &str, start_at: i64) -> Reply {
        Reply::data(json!({
            "tournament": {
                "id": id,
                "name": name,
                "startAt": start_at,
                "events": [
                    { "id": 1, "name": "Tekken", "numEntrants": 8, "videogame": { "name": "Tekken 8" }, "standings": { "nodes": [{ "placement": 1, "entrant": { "id": 9, "participants": [player("1", "Alpha")] } }] } },
                    { "id": 2, "name": "SF6 Singles", "numEntrants": 64, "videogame": { "name": GAME }, "standings": { "nodes": [
                        { "placement": 1, "entrant": { "id": 10, "participants": [player("1", "Alpha")] } },
                        { "placement": 3, "entrant": { "id": 11, "participants": [player("2", "Beta")] } },
                    ] } },
                ],
            },
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn tournament_details_are_cached_by_slug() {
        let transport = FakeTransport::routed(|_| tournament_data_reply(5, "Five", 1_700_000_000));
        let calls = transport.calls();
        let collector = test_collector(transport, Utc::now());
        let mut scheduler = RequestScheduler::new(Arc::clone(&collector.executor), Arc::clone(&collector.store));
        let tournament = TournamentRef { id: ID::from("5"), slug: format!("tournament/five"), name: format!("Five"), start_at: 1_700_000_000 };
        let first = collector.fetch_tournament_details(&mut scheduler, [&tournament, &tournament]).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        let second = collector.fetch_tournament_details(&mut scheduler, [&tournament]).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(Arc::ptr_eq(&first[&tournament.id], &second[&tournament.id]));
        assert_eq!(second[&tournament.id].name, "Five");
    }

    #[test]
    fn placement_uses_first_matching_game_event() {
        let detail = TournamentDetail {
            id: ID::from("5"),
            name: format!("Five"),
            start_at: Some(1_700_000_000),
            events: vec![
                Event { id: ID::from("1"), name: format!("Tekken"), game: Some(format!("Tekken 8")), num_entrants: Some(8), standings: vec![Standing { placement: 1, competitors: vec![competitor("1", "Alpha")] }] },
                Event { id: ID::from("2"), name: format!("SF6 Singles"), game: Some(GAME.to_owned()), num_entrants: Some(64), standings: vec![Standing { placement: 5, competitors: vec![competitor("1", "Alpha")] }] },
            ],
        };
        assert_eq!(find_placement(&detail, GAME, &ID::from("1")), Some(Placement {
            tournament_name: format!("Five"),
            tournament_start_at: Some(1_700_000_000),
            event_name: format!("SF6 Singles"),
            placement: 5,
            total_entrants: 64,
        }));
        assert_eq!(find_placement(&detail, GAME, &ID::from("2")), None);
    }

    #[test]
    fn competitors_without_placements_get_placeholders() {
        let targets = [competitor("1", "Alpha"), competitor("2", "Beta")].into_iter().map(|competitor| (competitor.id.clone(), competitor)).collect();
        let placements = placement_records(&targets, &HashMap::default(), &HashMap::default(), GAME);
        assert_eq!(placements, vec![
            PlacementRecord { competitor: competitor("1", "Alpha"), placement: None },
            PlacementRecord { competitor: competitor("2", "Beta"), placement: None },
        ]);
    }

    #[test]
    fn history_counts_split_placeholders() {
        let placement = |tournament: &str| Some(Placement {
            tournament_name: tournament.to_owned(),
            tournament_start_at: None,
            event_name: format!("Singles"),
            placement: 1,
            total_entrants: 8,
        });
        let report = Report {
            game: GAME.to_owned(),
            targets: Vec::default(),
            shared: Vec::default(),
            placements: vec![
                PlacementRecord { competitor: competitor("1", "Alpha"), placement: placement("One") },
                PlacementRecord { competitor: competitor("1", "Alpha"), placement: placement("Two") },
                PlacementRecord { competitor: competitor("2", "Beta"), placement: None },
                PlacementRecord { competitor: competitor("3", "Gamma"), placement: None },
            ],
            head_to_head: Vec::default(),
            request_count: 0,
        };
        assert_eq!(report.history_counts(), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn seed_failure_is_fatal() {
        let collector = test_collector(FakeTransport::routed(|_| Reply::Reset), Utc::now());
        assert!(matches!(collector.run("tournament/seed").await, Err(Error::Scheduler(scheduler::Error::Failed(_)))));
        let collector = test_collector(FakeTransport::routed(|_| Reply::data(json!({ "tournament": null }))), Utc::now());
        assert!(matches!(collector.run("tournament/seed").await, Err(Error::SeedNotFound(_))));
        let collector = test_collector(FakeTransport::routed(|_| Reply::data(json!({ "tournament": { "id": 1, "events": [] } }))), Utc::now());
        assert!(matches!(collector.run("tournament/seed").await, Err(Error::NoGame(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn seed_players_come_from_target_game_events() {
        let transport = FakeTransport::routed(|body| {
            assert_eq!(body.operation_name, "TournamentPlayers");
            let page = body.variables["page"].as_i64().unwrap();
            Reply::data(json!({ "tournament": { "id": 1, "name": "Seed", "events": [
                { "id": 1, "name": "Main", "videogame": { "name": GAME }, "entrants": {
                    "pageInfo": { "totalPages": 2 },
                    "nodes": [{ "id": 100 + page, "participants": [if page == 1 { player("1", "Alpha") } else { player("2", "Beta") }] }],
                }, "standings": null },
                { "id": 2, "name": "Side", "videogame": { "name": "Tekken 8" }, "entrants": {
                    "pageInfo": { "totalPages": 1 },
                    "nodes": [{ "id": 200, "participants": [player("3", "Gamma")] }],
                }, "standings": null },
            ] } }))
        });
        let collector = test_collector(transport, Utc::now());
        let mut scheduler = RequestScheduler::new(Arc::clone(&collector.executor), Arc::clone(&collector.store));
        let seed = collector.resolve_seed(&mut scheduler, "tournament/seed").await.unwrap();
        assert_eq!(seed.game, GAME);
        assert_eq!(seed.competitors.values().map(|competitor| competitor.tag.as_str()).collect_vec(), vec!["Alpha", "Beta"]);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end() {
        let now = Utc::now();
        let common_start = (now - TimeDelta::days(30)).timestamp();
        let solo_start = (now - TimeDelta::days(60)).timestamp();
        let transport = FakeTransport::routed(move |body| match body.operation_name {
            "TournamentPlayers" => Reply::data(json!({ "tournament": { "id": 1, "name": "Seed", "events": [
                { "id": 1, "name": "Main", "videogame": { "name": GAME }, "entrants": {
                    "pageInfo": { "totalPages": 1 },
                    "nodes": [
                        { "id": 10, "participants": [player("1", "Alpha")] },
                        { "id": 11, "participants": [player("2", "Beta")] },
                    ],
                }, "standings": { "pageInfo": { "totalPages": 1 }, "nodes": [] } },
            ] } })),
            "PlayerSets" => {
                let common = json!({ "id": 1, "event": { "id": 2, "name": "SF6 Singles", "videogame": { "name": GAME }, "tournament": { "id": 5, "slug": "tournament/common", "name": "Common", "startAt": common_start } } });
                let solo = json!({ "id": 2, "event": { "id": 3, "name": "SF6 Singles", "videogame": { "name": GAME }, "tournament": { "id": 6, "slug": "tournament/solo", "name": "Solo", "startAt": solo_start } } });
                let nodes = if body.variables["playerId"] == "1" { vec![common, solo] } else { vec![common] };
                Reply::data(json!({ "player": { "id": body.variables["playerId"], "gamerTag": "x", "sets": { "pageInfo": { "totalPages": 1 }, "nodes": nodes } } }))
            }
            "TournamentData" => if body.variables["slug"] == "tournament/common" {
                tournament_data_reply(5, "Common", common_start)
            } else {
                tournament_data_reply(6, "Solo", solo_start)
            },
            "TournamentSets" => {
                assert_eq!(body.variables["slug"], "tournament/common");
                assert_eq!(body.variables["perPage"], 20);
                Reply::data(json!({ "tournament": { "id": 5, "events": [
                    { "id": 2, "name": "SF6 Singles", "videogame": { "name": GAME }, "sets": { "pageInfo": { "totalPages": 1 }, "nodes": [
                        { "id": 99, "slots": [
                            { "entrant": { "id": 11, "participants": [player("2", "Beta")] }, "standing": { "placement": 2, "stats": { "score": { "value": 1 } } } },
                            { "entrant": { "id": 10, "participants": [player("1", "Alpha")] }, "standing": { "placement": 1, "stats": { "score": { "value": 3 } } } },
                        ] },
                    ] } },
                ] } }))
            }
            "SetScore" => Reply::data(json!({ "set": { "id": 99, "slots": [
                { "entrant": { "id": 11 }, "standing": { "placement": 2, "stats": { "score": { "value": 1 } } } },
                { "entrant": { "id": 10 }, "standing": { "placement": 1, "stats": { "score": { "value": 3 } } } },
            ] } })),
            other => panic!("unexpected operation {other}"),
        });
        let report = test_collector(transport, now).run("tournament/seed").await.unwrap();
        assert_eq!(report.game, GAME);
        assert_eq!(report.targets.len(), 2);
        assert_eq!(report.shared.len(), 1);
        assert_eq!(report.shared[0].tournament.name, "Common");
        assert_eq!(report.head_to_head.len(), 1);
        let outcome = &report.head_to_head[0];
        assert_eq!(outcome.winner, competitor("1", "Alpha"));
        assert_eq!(outcome.loser, competitor("2", "Beta"));
        assert_eq!(outcome.competitors, [competitor("2", "Beta"), competitor("1", "Alpha")]);
        assert_eq!(outcome.score, "3-1");
        let placements = report.placements.iter()
            .map(|record| (record.competitor.tag.as_str(), record.placement.as_ref().map(|placement| (placement.tournament_name.as_str(), placement.placement))))
            .collect_vec();
        assert_eq!(placements, vec![
            ("Alpha", Some(("Solo", 1))),
            ("Alpha", Some(("Common", 1))),
            ("Beta", Some(("Common", 3))),
        ]);
        assert_eq!(report.history_counts(), (2, 0));
        // seed, two histories, two tournaments, one sets page, one score
        assert_eq!(report.request_count, 7);
    }
}
