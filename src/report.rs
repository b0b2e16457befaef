//! CSV output of a collection run.

use {
    std::fs,
    crate::{
        collector::Report,
        model::{
            HeadToHeadOutcome,
            PlacementRecord,
            timestamp_date,
        },
        prelude::*,
    },
};

const PLACEHOLDER: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error(transparent)] Csv(#[from] csv::Error),
    #[error(transparent)] Io(#[from] io::Error),
}

#[derive(Serialize)]
struct PlacementRow<'a> {
    player_id: String,
    player_tag: &'a str,
    tournament_name: &'a str,
    tournament_date: String,
    event_name: &'a str,
    placement: String,
    total_entrants: String,
}

impl<'a> From<&'a PlacementRecord> for PlacementRow<'a> {
    fn from(PlacementRecord { competitor, placement }: &'a PlacementRecord) -> Self {
        match placement {
            Some(placement) => Self {
                player_id: competitor.id.to_string(),
                player_tag: &competitor.tag,
                tournament_name: &placement.tournament_name,
                tournament_date: format_date(placement.tournament_start_at),
                event_name: &placement.event_name,
                placement: placement.placement.to_string(),
                total_entrants: placement.total_entrants.to_string(),
            },
            None => Self {
                player_id: competitor.id.to_string(),
                player_tag: &competitor.tag,
                tournament_name: PLACEHOLDER,
                tournament_date: PLACEHOLDER.to_owned(),
                event_name: PLACEHOLDER,
                placement: PLACEHOLDER.to_owned(),
                total_entrants: PLACEHOLDER.to_owned(),
            },
        }
    }
}

#[derive(Serialize)]
struct HeadToHeadRow<'a> {
    tournament_name: &'a str,
    tournament_date: String,
    player1_id: String,
    player1_tag: &'a str,
    player2_id: String,
    player2_tag: &'a str,
    winner_id: String,
    winner_tag: &'a str,
    loser_id: String,
    loser_tag: &'a str,
    score: &'a str,
    set_id: String,
}

impl<'a> From<&'a HeadToHeadOutcome> for HeadToHeadRow<'a> {
    fn from(outcome: &'a HeadToHeadOutcome) -> Self {
        let [player1, player2] = &outcome.competitors;
        Self {
            tournament_name: &outcome.tournament_name,
            tournament_date: format_date(Some(outcome.tournament_start_at)),
            player1_id: player1.id.to_string(),
            player1_tag: &player1.tag,
            player2_id: player2.id.to_string(),
            player2_tag: &player2.tag,
            winner_id: outcome.winner.id.to_string(),
            winner_tag: &outcome.winner.tag,
            loser_id: outcome.loser.id.to_string(),
            loser_tag: &outcome.loser.tag,
            score: &outcome.score,
            set_id: outcome.set_id.to_string(),
        }
    }
}

fn format_date(start_at: Option<i64>) -> String {
    start_at.and_then(timestamp_date).map_or_else(|| PLACEHOLDER.to_owned(), |date| date.format("%Y-%m-%d").to_string())
}

/// Paths of the files written by [`write`].
#[derive(Debug)]
pub(crate) struct ReportFiles {
    pub(crate) placements: PathBuf,
    pub(crate) head_to_head: PathBuf,
}

fn file_name(prefix: &str, slug: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}_{}.csv", slug.replace('/', "_"), now.format("%Y%m%d_%H%M%S"))
}

const PLACEMENT_HEADERS: [&str; 7] = ["player_id", "player_tag", "tournament_name", "tournament_date", "event_name", "placement", "total_entrants"];
const HEAD_TO_HEAD_HEADERS: [&str; 12] = ["tournament_name", "tournament_date", "player1_id", "player1_tag", "player2_id", "player2_tag", "winner_id", "winner_tag", "loser_id", "loser_tag", "score", "set_id"];

/// The header row is written explicitly so that files without data rows still have one.
fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: impl IntoIterator<Item = T>) -> Result<(), Error> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the placement and head-to-head files for `slug` into `output_dir`, creating it if needed.
///
/// Placement rows are grouped by player tag, keeping each player's rows in their original order.
pub(crate) fn write(report: &Report, output_dir: &Path, slug: &str, now: DateTime<Utc>) -> Result<ReportFiles, Error> {
    fs::create_dir_all(output_dir)?;
    let files = ReportFiles {
        placements: output_dir.join(file_name("player_histories", slug, now)),
        head_to_head: output_dir.join(file_name("head_to_head", slug, now)),
    };
    write_rows(&files.placements, &PLACEMENT_HEADERS, report.placements.iter()
        .sorted_by(|a, b| a.competitor.tag.cmp(&b.competitor.tag))
        .map(PlacementRow::from)
    )?;
    write_rows(&files.head_to_head, &HEAD_TO_HEAD_HEADERS, report.head_to_head.iter().map(HeadToHeadRow::from))?;
    if report.placements.is_empty() {
        log::warn!("no placement data to write");
    }
    log::info!("player histories saved to {}", files.placements.display());
    log::info!("head-to-head results saved to {}", files.head_to_head.display());
    Ok(files)
}

#[cfg(test)]
mod tests {
    use {
        chrono::TimeZone as _,
        crate::model::Placement,
        super::*,
    };

    fn competitor(id: &str, tag: &str) -> Competitor {
        Competitor { id: ID::from(id), tag: tag.to_owned() }
    }

    fn report() -> Report {
        // 2024-03-01T12:00:00Z
        let start_at = 1_709_294_400;
        Report {
            game: format!("Street Fighter 6"),
            targets: vec![competitor("1", "Zed"), competitor("2", "Amy")],
            shared: Vec::default(),
            placements: vec![
                PlacementRecord { competitor: competitor("1", "Zed"), placement: Some(Placement {
                    tournament_name: format!("Spring Clash"),
                    tournament_start_at: Some(start_at),
                    event_name: format!("SF6 Singles"),
                    placement: 2,
                    total_entrants: 48,
                }) },
                PlacementRecord { competitor: competitor("2", "Amy"), placement: None },
            ],
            head_to_head: vec![HeadToHeadOutcome {
                competitors: [competitor("1", "Zed"), competitor("2", "Amy")],
                winner: competitor("2", "Amy"),
                loser: competitor("1", "Zed"),
                score: format!("3-2"),
                set_id: ID::from("77"),
                tournament_name: format!("Spring Clash"),
                tournament_start_at: start_at,
            }],
            request_count: 0,
        }
    }

    #[test]
    fn file_names_flatten_the_slug() {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(file_name("head_to_head", "tournament/evo-2024", now), "head_to_head_tournament_evo-2024_20240506_070809.csv");
    }

    #[test]
    fn writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let files = write(&report(), dir.path(), "tournament/spring", now).unwrap();
        assert_eq!(files.placements, dir.path().join("player_histories_tournament_spring_20240506_070809.csv"));
        assert_eq!(fs::read_to_string(&files.placements).unwrap(), "\
player_id,player_tag,tournament_name,tournament_date,event_name,placement,total_entrants
2,Amy,N/A,N/A,N/A,N/A,N/A
1,Zed,Spring Clash,2024-03-01,SF6 Singles,2,48
");
        assert_eq!(fs::read_to_string(&files.head_to_head).unwrap(), "\
tournament_name,tournament_date,player1_id,player1_tag,player2_id,player2_tag,winner_id,winner_tag,loser_id,loser_tag,score,set_id
Spring Clash,2024-03-01,1,Zed,2,Amy,2,Amy,1,Zed,3-2,77
");
    }

    #[test]
    fn empty_head_to_head_still_has_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let report = Report { head_to_head: Vec::default(), ..report() };
        let files = write(&report, &dir.path().join("nested"), "tournament/spring", Utc::now()).unwrap();
        let contents = fs::read_to_string(&files.head_to_head).unwrap();
        assert!(contents.starts_with("tournament_name,tournament_date,player1_id"));
        assert_eq!(contents.lines().count(), 1);
    }
}
