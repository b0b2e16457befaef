//! The GraphQL queries this tool sends, with hand-written response types.
//!
//! Every field of the start.gg schema is nullable, so the response types are too.
//! Conversions into [`crate::model`] types drop null nodes.

use crate::{
    model::{
        Competitor,
        Entrant,
        Event,
        MatchRecord,
        Slot,
        Standing,
        TournamentDetail,
    },
    prelude::*,
};

/// A query with a fixed request class, so the scheduler can tag it.
pub(crate) trait Query: GraphQLQuery + 'static {
    const CLASS: RequestClass;
}

macro_rules! query {
    ($name:ident, $module:ident, $class:expr, $text:expr) => {
        pub(crate) struct $name;

        impl GraphQLQuery for $name {
            type Variables = $module::Variables;
            type ResponseData = $module::ResponseData;

            fn build_query(variables: Self::Variables) -> QueryBody<Self::Variables> {
                QueryBody {
                    variables,
                    query: $text,
                    operation_name: stringify!($name),
                }
            }
        }

        impl Query for $name {
            const CLASS: RequestClass = $class;
        }
    };
}

query!(TournamentPlayers, tournament_players, RequestClass::TournamentPlayers, "
query TournamentPlayers($slug: String!, $page: Int!, $perPage: Int!) {
    tournament(slug: $slug) {
        events {
            videogame { name }
            entrants(query: {page: $page, perPage: $perPage}) {
                pageInfo { totalPages }
                nodes { id participants { player { id gamerTag } } }
            }
            standings(query: {page: $page, perPage: $perPage}) {
                pageInfo { totalPages }
                nodes { placement entrant { id participants { player { id gamerTag } } } }
            }
        }
    }
}
");

query!(PlayerSets, player_sets, RequestClass::PlayerSets, "
query PlayerSets($playerId: ID!, $page: Int!, $perPage: Int!) {
    player(id: $playerId) {
        sets(page: $page, perPage: $perPage) {
            pageInfo { totalPages }
            nodes {
                event {
                    videogame { name }
                    tournament { id slug name startAt }
                }
            }
        }
    }
}
");

query!(TournamentData, tournament_data, RequestClass::TournamentData, "
query TournamentData($slug: String!, $perPage: Int!) {
    tournament(slug: $slug) {
        id
        name
        startAt
        events {
            id
            name
            numEntrants
            videogame { name }
            standings(query: {perPage: $perPage}) {
                nodes { placement entrant { id participants { player { id gamerTag } } } }
            }
        }
    }
}
");

query!(TournamentSets, tournament_sets, RequestClass::TournamentSets, "
query TournamentSets($slug: String!, $page: Int!, $perPage: Int!) {
    tournament(slug: $slug) {
        events {
            videogame { name }
            sets(page: $page, perPage: $perPage, sortType: STANDARD) {
                pageInfo { totalPages }
                nodes {
                    id
                    slots {
                        entrant { id participants { player { id gamerTag } } }
                        standing { placement stats { score { value } } }
                    }
                }
            }
        }
    }
}
");

query!(SetScore, set_score, RequestClass::SetScore, "
query SetScore($setId: ID!) {
    set(id: $setId) {
        id
        slots {
            entrant { id }
            standing { placement stats { score { value } } }
        }
    }
}
");

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    pub(crate) total_pages: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Connection<T> {
    pub(crate) page_info: Option<PageInfo>,
    pub(crate) nodes: Option<Vec<Option<T>>>,
}

impl<T> Connection<T> {
    /// Never less than 1: a connection that exists has at least the page it came on.
    pub(crate) fn total_pages(&self) -> i64 {
        self.page_info.as_ref().and_then(|PageInfo { total_pages }| *total_pages).unwrap_or(1).max(1)
    }

    pub(crate) fn into_nodes(self) -> impl Iterator<Item = T> {
        self.nodes.into_iter().flatten().filter_map(identity)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Videogame {
    pub(crate) name: Option<String>,
}

pub(crate) fn game_name(videogame: Option<Videogame>) -> Option<String> {
    videogame.and_then(|Videogame { name }| name)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Player {
    pub(crate) id: Option<ID>,
    pub(crate) gamer_tag: Option<String>,
}

impl Player {
    pub(crate) fn into_competitor(self) -> Option<Competitor> {
        let Self { id: Some(id), gamer_tag } = self else { return None };
        Some(Competitor { id, tag: gamer_tag.unwrap_or_else(|| format!("Unknown")) })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Participant {
    pub(crate) player: Option<Player>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EntrantNode {
    pub(crate) id: Option<ID>,
    pub(crate) participants: Option<Vec<Option<Participant>>>,
}

impl EntrantNode {
    pub(crate) fn into_entrant(self) -> Entrant {
        Entrant {
            id: self.id,
            participants: self.participants.into_iter()
                .flatten()
                .filter_map(identity)
                .filter_map(|Participant { player }| player?.into_competitor())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StandingNode {
    pub(crate) placement: Option<i64>,
    pub(crate) entrant: Option<EntrantNode>,
}

impl StandingNode {
    fn into_standing(self) -> Option<Standing> {
        Some(Standing {
            placement: self.placement?,
            competitors: self.entrant?.into_entrant().participants,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Score {
    pub(crate) value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SlotStats {
    pub(crate) score: Option<Score>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SlotStanding {
    pub(crate) placement: Option<i64>,
    pub(crate) stats: Option<SlotStats>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SlotNode {
    pub(crate) entrant: Option<EntrantNode>,
    pub(crate) standing: Option<SlotStanding>,
}

impl SlotNode {
    fn into_slot(self) -> Slot {
        let (placement, score) = match self.standing {
            Some(SlotStanding { placement, stats }) => (placement, stats.and_then(|SlotStats { score }| score).and_then(|Score { value }| value)),
            None => (None, None),
        };
        Slot {
            entrant: self.entrant.map(EntrantNode::into_entrant),
            placement, score,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SetNode {
    pub(crate) id: Option<ID>,
    pub(crate) slots: Option<Vec<Option<SlotNode>>>,
}

impl SetNode {
    /// A null slot stays in place as a bye so slot positions are preserved.
    pub(crate) fn into_match_record(self) -> Option<MatchRecord> {
        Some(MatchRecord {
            id: self.id?,
            slots: self.slots?.into_iter()
                .map(|slot| slot.map(SlotNode::into_slot).unwrap_or(Slot { entrant: None, placement: None, score: None }))
                .collect(),
        })
    }
}

pub(crate) mod tournament_players {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct Variables {
        pub(crate) slug: String,
        pub(crate) page: i64,
        pub(crate) per_page: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct ResponseData {
        pub(crate) tournament: Option<TournamentPlayersTournament>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct TournamentPlayersTournament {
        pub(crate) events: Option<Vec<Option<TournamentPlayersEvent>>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct TournamentPlayersEvent {
        pub(crate) videogame: Option<Videogame>,
        pub(crate) entrants: Option<Connection<EntrantNode>>,
        pub(crate) standings: Option<Connection<StandingNode>>,
    }

    /// One event of the seed tournament, flattened.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct SeedEvent {
        pub(crate) game: Option<String>,
        pub(crate) competitors: Vec<Competitor>,
        pub(crate) total_pages: i64,
    }

    impl ResponseData {
        /// Events in response order, with entrant and standing participants merged.
        pub(crate) fn into_events(self) -> Vec<SeedEvent> {
            self.tournament
                .and_then(|tournament| tournament.events)
                .into_iter()
                .flatten()
                .filter_map(identity)
                .map(|TournamentPlayersEvent { videogame, entrants, standings }| {
                    let total_pages = entrants.as_ref().map_or(1, Connection::total_pages)
                        .max(standings.as_ref().map_or(1, Connection::total_pages));
                    let mut competitors = Vec::default();
                    for entrant in entrants.into_iter().flat_map(Connection::into_nodes) {
                        competitors.extend(entrant.into_entrant().participants);
                    }
                    for standing in standings.into_iter().flat_map(Connection::into_nodes) {
                        if let Some(entrant) = standing.entrant {
                            competitors.extend(entrant.into_entrant().participants);
                        }
                    }
                    SeedEvent { game: game_name(videogame), competitors, total_pages }
                })
                .collect()
        }
    }
}

pub(crate) mod player_sets {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct Variables {
        pub(crate) player_id: ID,
        pub(crate) page: i64,
        pub(crate) per_page: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct ResponseData {
        pub(crate) player: Option<PlayerSetsPlayer>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct PlayerSetsPlayer {
        pub(crate) sets: Option<Connection<PlayerSetsSet>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct PlayerSetsSet {
        pub(crate) event: Option<PlayerSetsEvent>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct PlayerSetsEvent {
        pub(crate) videogame: Option<Videogame>,
        pub(crate) tournament: Option<PlayerSetsTournament>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct PlayerSetsTournament {
        pub(crate) id: Option<ID>,
        pub(crate) slug: Option<String>,
        pub(crate) name: Option<String>,
        pub(crate) start_at: Option<i64>,
    }

    /// One set of a player's history: the event's game and the tournament it belongs to.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct HistoryEntry {
        pub(crate) game: Option<String>,
        pub(crate) tournament_id: ID,
        pub(crate) slug: String,
        pub(crate) name: String,
        pub(crate) start_at: Option<i64>,
    }

    impl ResponseData {
        pub(crate) fn total_pages(&self) -> i64 {
            self.player.as_ref()
                .and_then(|player| player.sets.as_ref())
                .map_or(1, Connection::total_pages)
        }

        /// Entries without a tournament ID or slug are unusable downstream and skipped.
        pub(crate) fn into_entries(self) -> Vec<HistoryEntry> {
            self.player
                .and_then(|player| player.sets)
                .into_iter()
                .flat_map(Connection::into_nodes)
                .filter_map(|PlayerSetsSet { event }| {
                    let PlayerSetsEvent { videogame, tournament: Some(PlayerSetsTournament { id: Some(tournament_id), slug: Some(slug), name, start_at }) } = event? else { return None };
                    Some(HistoryEntry {
                        game: game_name(videogame),
                        name: name.unwrap_or_else(|| format!("Unknown")),
                        tournament_id, slug, start_at,
                    })
                })
                .collect()
        }
    }
}

pub(crate) mod tournament_data {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct Variables {
        pub(crate) slug: String,
        pub(crate) per_page: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct ResponseData {
        pub(crate) tournament: Option<TournamentDataTournament>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct TournamentDataTournament {
        pub(crate) id: Option<ID>,
        pub(crate) name: Option<String>,
        pub(crate) start_at: Option<i64>,
        pub(crate) events: Option<Vec<Option<TournamentDataEvent>>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct TournamentDataEvent {
        pub(crate) id: Option<ID>,
        pub(crate) name: Option<String>,
        pub(crate) num_entrants: Option<i64>,
        pub(crate) videogame: Option<Videogame>,
        pub(crate) standings: Option<Connection<StandingNode>>,
    }

    impl ResponseData {
        pub(crate) fn into_detail(self) -> Option<TournamentDetail> {
            let TournamentDataTournament { id: Some(id), name, start_at, events } = self.tournament? else { return None };
            Some(TournamentDetail {
                name: name.unwrap_or_else(|| format!("Unknown")),
                events: events.into_iter()
                    .flatten()
                    .filter_map(identity)
                    .filter_map(|TournamentDataEvent { id, name, num_entrants, videogame, standings }| Some(Event {
                        id: id?,
                        name: name.unwrap_or_else(|| format!("Unknown")),
                        game: game_name(videogame),
                        standings: standings.into_iter().flat_map(Connection::into_nodes).filter_map(StandingNode::into_standing).collect(),
                        num_entrants,
                    }))
                    .collect(),
                id, start_at,
            })
        }
    }
}

pub(crate) mod tournament_sets {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct Variables {
        pub(crate) slug: String,
        pub(crate) page: i64,
        pub(crate) per_page: i64,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct ResponseData {
        pub(crate) tournament: Option<TournamentSetsTournament>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct TournamentSetsTournament {
        pub(crate) events: Option<Vec<Option<TournamentSetsEvent>>>,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct TournamentSetsEvent {
        pub(crate) videogame: Option<Videogame>,
        pub(crate) sets: Option<Connection<SetNode>>,
    }

    impl ResponseData {
        fn events(&self) -> impl Iterator<Item = &TournamentSetsEvent> {
            self.tournament.iter()
                .flat_map(|tournament| tournament.events.iter().flatten())
                .filter_map(Option::as_ref)
        }

        /// The largest page count of any event, since pages are requested for all events at once.
        pub(crate) fn total_pages(&self) -> i64 {
            self.events()
                .filter_map(|event| event.sets.as_ref().map(Connection::total_pages))
                .max()
                .unwrap_or(1)
        }

        /// Match records of the events played in `game`.
        pub(crate) fn into_match_records(self, game: &str) -> Vec<MatchRecord> {
            self.tournament
                .and_then(|tournament| tournament.events)
                .into_iter()
                .flatten()
                .filter_map(identity)
                .filter(|event| event.videogame.as_ref().and_then(|videogame| videogame.name.as_deref()) == Some(game))
                .flat_map(|event| event.sets.into_iter().flat_map(Connection::into_nodes))
                .filter_map(SetNode::into_match_record)
                .collect()
        }
    }
}

pub(crate) mod set_score {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub(crate) struct Variables {
        pub(crate) set_id: ID,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub(crate) struct ResponseData {
        pub(crate) set: Option<SetNode>,
    }

    impl ResponseData {
        pub(crate) fn into_match_record(self) -> Option<MatchRecord> {
            self.set?.into_match_record()
        }
    }
}
