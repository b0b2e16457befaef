use crate::{
    history::CompetitorHistory,
    model::SharedTournament,
    prelude::*,
};

/// Which target competitors attended which tournaments.
#[derive(Debug, Default)]
pub(crate) struct TournamentGraph {
    tournaments: HashMap<ID, TournamentRef>,
    attendance: BTreeMap<ID, BTreeSet<ID>>,
}

impl TournamentGraph {
    /// Tournament metadata is taken from whichever competitor's history lists the tournament first;
    /// all histories report the same metadata for a given ID.
    pub(crate) fn build<'a>(histories: impl IntoIterator<Item = &'a CompetitorHistory>) -> Self {
        let mut graph = Self::default();
        for CompetitorHistory { competitor, tournaments } in histories {
            for (tournament_id, tournament) in tournaments {
                graph.tournaments.entry(tournament_id.clone()).or_insert_with(|| tournament.clone());
                graph.attendance.entry(tournament_id.clone()).or_default().insert(competitor.id.clone());
            }
        }
        graph
    }

    pub(crate) fn compute_tournament_id_set(&self) -> BTreeSet<ID> {
        self.attendance.keys().cloned().collect()
    }

    pub(crate) fn tournament(&self, id: &ID) -> Option<&TournamentRef> {
        self.tournaments.get(id)
    }

    /// Tournaments attended by at least two target competitors, earliest first.
    pub(crate) fn find_shared_tournaments(&self) -> Vec<SharedTournament> {
        self.attendance.iter()
            .filter(|(_, competitors)| competitors.len() >= 2)
            .filter_map(|(id, competitors)| Some(SharedTournament {
                tournament: self.tournaments.get(id)?.clone(),
                competitors: competitors.clone(),
            }))
            .sorted_by(|a, b| a.tournament.start_at.cmp(&b.tournament.start_at).then_with(|| a.tournament.id.cmp(&b.tournament.id)))
            .collect()
    }
}
