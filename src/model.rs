//! Domain types shared by the collection phases.

use crate::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Competitor {
    pub(crate) id: ID,
    pub(crate) tag: String,
}

impl fmt::Display for Competitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tag, self.id)
    }
}

/// Lightweight handle on a tournament, as seen from a competitor's set history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TournamentRef {
    pub(crate) id: ID,
    pub(crate) slug: String,
    pub(crate) name: String,
    /// Seconds since the Unix epoch.
    pub(crate) start_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TournamentDetail {
    pub(crate) id: ID,
    pub(crate) name: String,
    pub(crate) start_at: Option<i64>,
    pub(crate) events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Event {
    pub(crate) id: ID,
    pub(crate) name: String,
    pub(crate) game: Option<String>,
    pub(crate) num_entrants: Option<i64>,
    pub(crate) standings: Vec<Standing>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Standing {
    /// 1 is first place.
    pub(crate) placement: i64,
    pub(crate) competitors: Vec<Competitor>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MatchRecord {
    pub(crate) id: ID,
    pub(crate) slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entrant {
    pub(crate) id: Option<ID>,
    pub(crate) participants: Vec<Competitor>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slot {
    /// `None` for a bye.
    pub(crate) entrant: Option<Entrant>,
    pub(crate) placement: Option<i64>,
    pub(crate) score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SharedTournament {
    pub(crate) tournament: TournamentRef,
    /// Always at least two target competitors.
    pub(crate) competitors: BTreeSet<ID>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HeadToHeadOutcome {
    /// In slot order.
    pub(crate) competitors: [Competitor; 2],
    pub(crate) winner: Competitor,
    pub(crate) loser: Competitor,
    /// `"{winner}-{loser}"`, or `N/A` if no scores were reported.
    pub(crate) score: String,
    pub(crate) set_id: ID,
    pub(crate) tournament_name: String,
    pub(crate) tournament_start_at: i64,
}

/// Where a competitor finished in one tournament.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placement {
    pub(crate) tournament_name: String,
    pub(crate) tournament_start_at: Option<i64>,
    pub(crate) event_name: String,
    pub(crate) placement: i64,
    pub(crate) total_entrants: i64,
}

/// One row of the placement report. `placement` is `None` for a competitor without any usable history.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlacementRecord {
    pub(crate) competitor: Competitor,
    pub(crate) placement: Option<Placement>,
}

pub(crate) fn timestamp_date(start_at: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(start_at, 0)
}
