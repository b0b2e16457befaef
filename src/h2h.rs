//! Head-to-head outcomes between target competitors at shared tournaments.

use crate::{
    history::Paging,
    model::{
        HeadToHeadOutcome,
        MatchRecord,
        SharedTournament,
        Slot,
    },
    prelude::*,
    startgg::queries::{
        SetScore,
        TournamentSets,
        set_score,
        tournament_sets,
    },
};

/// A match between two target competitors with a known winner.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedMatch {
    pub(crate) set_id: ID,
    /// In slot order.
    pub(crate) competitors: [Competitor; 2],
    pub(crate) entrant_ids: [Option<ID>; 2],
    pub(crate) winner_slot: usize,
    pub(crate) inline_scores: [Option<f64>; 2],
}

impl ResolvedMatch {
    fn loser_slot(&self) -> usize {
        1 - self.winner_slot
    }

    /// Scores in slot order from a separately fetched copy of the set, matched up by entrant where possible.
    fn scores_from(&self, record: &MatchRecord) -> Option<[Option<f64>; 2]> {
        let [first, second] = record.slots.as_slice() else { return None };
        let entrant_id = |slot: &Slot| slot.entrant.as_ref().and_then(|entrant| entrant.id.clone());
        if entrant_id(first).is_some() && entrant_id(first) == self.entrant_ids[1] && entrant_id(second) == self.entrant_ids[0] {
            Some([second.score, first.score])
        } else {
            Some([first.score, second.score])
        }
    }

    fn into_outcome(self, tournament: &TournamentRef, scores: [Option<f64>; 2]) -> HeadToHeadOutcome {
        let winner = self.competitors[self.winner_slot].clone();
        let loser = self.competitors[self.loser_slot()].clone();
        HeadToHeadOutcome {
            score: format_score(scores[self.winner_slot], scores[self.loser_slot()]),
            competitors: self.competitors,
            set_id: self.set_id,
            tournament_name: tournament.name.clone(),
            tournament_start_at: tournament.start_at,
            winner, loser,
        }
    }
}

pub(crate) fn format_score(winner: Option<f64>, loser: Option<f64>) -> String {
    match (winner, loser) {
        (Some(winner), Some(loser)) => format!("{winner}-{loser}"),
        _ => format!("N/A"),
    }
}

/// The single target competitor on one side of a match, if there is exactly one.
///
/// Byes have no entrant and never resolve.
fn slot_target<'a>(slot: &Slot, targets: &'a HashMap<ID, Competitor>) -> Option<&'a Competitor> {
    let entrant = slot.entrant.as_ref()?;
    let mut found = entrant.participants.iter()
        .filter_map(|participant| targets.get(&participant.id))
        .unique_by(|competitor| competitor.id.clone());
    let target = found.next()?;
    found.next().is_none().then_some(target)
}

/// Decides whether a match is a head-to-head between two target competitors, and who won.
///
/// Excluded: anything but two slots, byes, sides without exactly one target competitor,
/// the same target on both sides, and matches without exactly one first-place slot.
pub(crate) fn resolve_match(record: &MatchRecord, targets: &HashMap<ID, Competitor>) -> Option<ResolvedMatch> {
    let [first, second] = record.slots.as_slice() else { return None };
    let (a, b) = (slot_target(first, targets)?, slot_target(second, targets)?);
    if a.id == b.id {
        return None
    }
    let winner_slot = match (first.placement, second.placement) {
        (Some(1), Some(1)) => return None,
        (Some(1), _) => 0,
        (_, Some(1)) => 1,
        (_, _) => return None,
    };
    let entrant_id = |slot: &Slot| slot.entrant.as_ref().and_then(|entrant| entrant.id.clone());
    Some(ResolvedMatch {
        set_id: record.id.clone(),
        competitors: [a.clone(), b.clone()],
        entrant_ids: [entrant_id(first), entrant_id(second)],
        inline_scores: [first.score, second.score],
        winner_slot,
    })
}

pub(crate) struct HeadToHeadExtractor {
    targets: HashMap<ID, Competitor>,
    game: String,
    paging: Paging,
    max_requests: usize,
}

impl HeadToHeadExtractor {
    pub(crate) fn new(targets: HashMap<ID, Competitor>, game: String, paging: Paging, max_requests: usize) -> Self {
        Self { targets, game, paging, max_requests }
    }

    fn sets_request_id(tournament: &TournamentRef, page: i64) -> String {
        format!("tournament_sets:{}:{page}", tournament.id)
    }

    fn sets_variables(&self, tournament: &TournamentRef, page: i64) -> tournament_sets::Variables {
        tournament_sets::Variables { slug: tournament.slug.clone(), page, per_page: self.paging.page_size }
    }

    /// Match records of every shared tournament, deduplicated by set ID.
    async fn fetch_match_records<'a>(&self, scheduler: &mut RequestScheduler, shared: &'a [SharedTournament]) -> Vec<(&'a TournamentRef, Vec<MatchRecord>)> {
        for SharedTournament { tournament, .. } in shared {
            if let Err(e) = scheduler.enqueue_query::<TournamentSets>(Self::sets_request_id(tournament, 1), 4, self.sets_variables(tournament, 1)) {
                log::warn!("{}: {e}", tournament.name);
            }
        }
        scheduler.drain_round(self.max_requests).await;
        let mut collected = Vec::default();
        let mut continuations = Vec::default();
        for SharedTournament { tournament, .. } in shared {
            match scheduler.store().decode::<TournamentSets>(&Self::sets_request_id(tournament, 1)).await {
                Ok(Some(data)) => {
                    let last_page = data.total_pages().min(1 + self.paging.max_extra_pages);
                    for page in 2..=last_page {
                        match scheduler.enqueue_query::<TournamentSets>(Self::sets_request_id(tournament, page), 4, self.sets_variables(tournament, page)) {
                            Ok(()) => continuations.push((collected.len(), page)),
                            Err(e) => log::warn!("{}: {e}", tournament.name),
                        }
                    }
                    collected.push((tournament, data.into_match_records(&self.game)));
                }
                Ok(None) => log::info!("{}: no sets found", tournament.name),
                Err(e) => log::warn!("{}: no match data: {e}", tournament.name),
            }
        }
        scheduler.drain_round(self.max_requests).await;
        for (index, page) in continuations {
            let tournament = collected[index].0;
            match scheduler.store().decode::<TournamentSets>(&Self::sets_request_id(tournament, page)).await {
                Ok(Some(data)) => collected[index].1.extend(data.into_match_records(&self.game)),
                Ok(None) => {}
                Err(e) => log::warn!("{}: skipping sets page {page}: {e}", tournament.name),
            }
        }
        for (_, records) in &mut collected {
            let mut seen = BTreeSet::default();
            records.retain(|record| seen.insert(record.id.clone()));
        }
        collected
    }

    /// Resolves every qualifying match of the shared tournaments into an outcome, fetching each match's score.
    pub(crate) async fn extract(&self, scheduler: &mut RequestScheduler, shared: &[SharedTournament]) -> Vec<HeadToHeadOutcome> {
        let mut resolved = Vec::default();
        for (tournament, records) in self.fetch_match_records(scheduler, shared).await {
            let before = resolved.len();
            resolved.extend(records.iter().filter_map(|record| resolve_match(record, &self.targets)).map(|matched| (tournament, matched)));
            log::info!("{}: {} head-to-head matches among {} sets", tournament.name, resolved.len() - before, records.len());
        }
        for (_, matched) in &resolved {
            if let Err(e) = scheduler.enqueue_query::<SetScore>(format!("set_score:{}", matched.set_id), 5, set_score::Variables { set_id: matched.set_id.clone() }) {
                log::warn!("set {}: {e}", matched.set_id);
            }
        }
        scheduler.drain_round(self.max_requests).await;
        let mut outcomes = Vec::with_capacity(resolved.len());
        for (tournament, resolved) in resolved {
            let fetched = match scheduler.store().decode::<SetScore>(&format!("set_score:{}", resolved.set_id)).await {
                Ok(data) => data.and_then(set_score::ResponseData::into_match_record).and_then(|record| resolved.scores_from(&record)),
                Err(e) => {
                    log::warn!("set {}: using scores from the sets query: {e}", resolved.set_id);
                    None
                }
            };
            let scores = match fetched {
                Some(scores) if scores.iter().all(Option::is_some) => scores,
                _ => resolved.inline_scores,
            };
            outcomes.push(resolved.into_outcome(tournament, scores));
        }
        outcomes
    }
}
