// One-time CSV import into an empty database.
//
// Reads `;`-delimited files from the data directory (leagues, seasons, races,
// teams_and_coaches, matches, additional_statistics), resolves every
// reference by short name or name, and hands a fully resolved plan to
// `Database::import_plan`, which writes it in one transaction.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use bbleague_core::model::{InvalidMatch, MatchResult};
use bbleague_core::scoring::{ConfigError as RuleError, ScoringRule};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;

pub const LEAGUES_CSV: &str = "leagues.csv";
pub const SEASONS_CSV: &str = "seasons.csv";
pub const RACES_CSV: &str = "races.csv";
pub const TEAMS_CSV: &str = "teams_and_coaches.csv";
pub const MATCHES_CSV: &str = "matches.csv";
pub const STATISTICS_CSV: &str = "additional_statistics.csv";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{file}: {kind} `{name}` not found")]
    MissingReference {
        file: &'static str,
        kind: &'static str,
        name: String,
    },

    #[error("{file}: duplicate {kind} `{name}`")]
    Duplicate {
        file: &'static str,
        kind: &'static str,
        name: String,
    },

    #[error("seasons.csv: invalid scoring rule for season `{season}`: {source}")]
    InvalidRule { season: String, source: RuleError },

    #[error("matches.csv: invalid match `{label}`: {source}")]
    InvalidMatch { label: String, source: InvalidMatch },
}

// ---------------------------------------------------------------------------
// Raw CSV rows (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct LeagueRow {
    name: String,
    short_name: String,
    #[serde(default, deserialize_with = "de_flag")]
    is_selected: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SeasonRow {
    league_short_name: String,
    name: String,
    short_name: String,
    #[serde(default, deserialize_with = "de_flag")]
    is_selected: bool,
    /// Rule text with newlines written as a literal `\n`.
    #[serde(default)]
    scorings: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RaceRow {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TeamRow {
    league_short_name: String,
    season_short_name: String,
    name: String,
    race_name: String,
    coach_first_name: String,
    coach_last_name: String,
    coach_display_name: String,
    #[serde(default, deserialize_with = "de_flag")]
    is_disqualified: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct MatchRow {
    #[serde(default)]
    match_number: Option<u32>,
    league_short_name: String,
    season_short_name: String,
    team1: String,
    team2: String,
    td_team_1: u32,
    td_team_2: u32,
    #[serde(default)]
    point_modification_team_1: i32,
    #[serde(default)]
    point_modification_team_2: i32,
    #[serde(default, deserialize_with = "de_flag")]
    team_1_surrendered: bool,
    #[serde(default, deserialize_with = "de_flag")]
    team_2_surrendered: bool,
    #[serde(default, deserialize_with = "de_flag")]
    is_team_1_victory_by_kickoff: bool,
    #[serde(default, deserialize_with = "de_flag")]
    is_team_2_victory_by_kickoff: bool,
    #[serde(default, deserialize_with = "de_flag")]
    is_playoff_match: bool,
    #[serde(default, deserialize_with = "de_flag")]
    is_tournament_match: bool,
    #[serde(default)]
    casualties_team_1: u32,
    #[serde(default)]
    casualties_team_2: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct StatisticRow {
    league_short_name: String,
    season_short_name: String,
    team_name: String,
    casualties: u32,
}

/// Boolean columns as exported by spreadsheet tools: `True`/`False`,
/// `1`/`0`, `yes`/`no`; empty means false.
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, got `{other}`"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Reader-based loading (private, enables testing without temp files)
// ---------------------------------------------------------------------------

/// What to do with a row that does not deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowPolicy {
    /// Log it and keep reading.
    Skip,
    /// Stop at the first bad row; the error carries its position.
    Reject,
}

fn read_rows<T: DeserializeOwned, R: Read>(
    rdr: R,
    file: &str,
    policy: RowPolicy,
) -> Result<Vec<T>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if policy == RowPolicy::Skip => {
                warn!("skipping malformed row in {}: {}", file, e)
            }
            Err(e) => return Err(e),
        }
    }
    Ok(rows)
}

fn load_file<T: DeserializeOwned>(
    dir: &Path,
    file: &str,
    policy: RowPolicy,
) -> Result<Vec<T>, BootstrapError> {
    let path = dir.join(file);
    if !path.exists() {
        info!("no {} in {}, skipping", file, dir.display());
        return Ok(Vec::new());
    }
    let handle = std::fs::File::open(&path).map_err(|e| BootstrapError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    read_rows(handle, file, policy).map_err(|e| BootstrapError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Dataset and plan
// ---------------------------------------------------------------------------

/// Raw rows of every bootstrap file, before reference resolution.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    leagues: Vec<LeagueRow>,
    seasons: Vec<SeasonRow>,
    races: Vec<RaceRow>,
    teams: Vec<TeamRow>,
    matches: Vec<MatchRow>,
    statistics: Vec<StatisticRow>,
}

/// Read all bootstrap files from `data_dir`. Missing files count as empty.
///
/// A malformed match or statistic row fails the read, since dropping it
/// would silently change the tables. Malformed rows in the other files are
/// skipped with a warning; anything that referenced them then fails to
/// resolve during planning.
pub fn read_dataset(data_dir: &Path) -> Result<Dataset, BootstrapError> {
    Ok(Dataset {
        leagues: load_file(data_dir, LEAGUES_CSV, RowPolicy::Skip)?,
        seasons: load_file(data_dir, SEASONS_CSV, RowPolicy::Skip)?,
        races: load_file(data_dir, RACES_CSV, RowPolicy::Skip)?,
        teams: load_file(data_dir, TEAMS_CSV, RowPolicy::Skip)?,
        matches: load_file(data_dir, MATCHES_CSV, RowPolicy::Reject)?,
        statistics: load_file(data_dir, STATISTICS_CSV, RowPolicy::Reject)?,
    })
}

#[derive(Debug, Clone)]
pub struct PlannedLeague {
    pub name: String,
    pub short_name: String,
    pub is_selected: bool,
}

/// Index fields (`league`, `season`, `team`, ...) point into the sibling
/// vectors of the same [`ImportPlan`].
#[derive(Debug, Clone)]
pub struct PlannedSeason {
    pub league: usize,
    pub name: String,
    pub short_name: String,
    pub is_selected: bool,
    pub rule: ScoringRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlannedCoach {
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct PlannedTeam {
    pub season: usize,
    pub name: String,
    pub race: usize,
    pub coach: usize,
    pub is_disqualified: bool,
}

/// `result` carries everything but the row ids; its season and team ids are
/// placeholders replaced on insert.
#[derive(Debug, Clone)]
pub struct PlannedMatch {
    pub season: usize,
    pub team1: usize,
    pub team2: usize,
    pub result: MatchResult,
}

#[derive(Debug, Clone)]
pub struct PlannedStatistic {
    pub season: usize,
    pub team: usize,
    pub casualties: u32,
}

/// A fully resolved import: every reference has been checked.
#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub leagues: Vec<PlannedLeague>,
    pub seasons: Vec<PlannedSeason>,
    pub races: Vec<String>,
    pub coaches: Vec<PlannedCoach>,
    pub teams: Vec<PlannedTeam>,
    pub matches: Vec<PlannedMatch>,
    pub statistics: Vec<PlannedStatistic>,
}

/// Row counts written by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub leagues: usize,
    pub seasons: usize,
    pub races: usize,
    pub coaches: usize,
    pub teams: usize,
    pub matches: usize,
    pub statistics: usize,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.leagues.is_empty()
    }

    /// Resolve every reference. Seasons with an empty `scorings` column get
    /// `default_rule`.
    pub fn plan(&self, default_rule: &ScoringRule) -> Result<ImportPlan, BootstrapError> {
        let mut plan = ImportPlan::default();

        // Leagues by short name.
        let mut leagues: HashMap<&str, usize> = HashMap::new();
        for row in &self.leagues {
            if leagues.insert(row.short_name.as_str(), plan.leagues.len()).is_some() {
                return Err(BootstrapError::Duplicate {
                    file: LEAGUES_CSV,
                    kind: "league",
                    name: row.short_name.clone(),
                });
            }
            plan.leagues.push(PlannedLeague {
                name: row.name.clone(),
                short_name: row.short_name.clone(),
                is_selected: row.is_selected,
            });
        }

        // Seasons by (league short name, season short name).
        let mut seasons: HashMap<(&str, &str), usize> = HashMap::new();
        for row in &self.seasons {
            let league = *leagues.get(row.league_short_name.as_str()).ok_or_else(|| {
                BootstrapError::MissingReference {
                    file: SEASONS_CSV,
                    kind: "league",
                    name: row.league_short_name.clone(),
                }
            })?;
            let text = row.scorings.replace("\\n", "\n");
            let rule = if text.trim().is_empty() {
                default_rule.clone()
            } else {
                ScoringRule::parse(&text).map_err(|source| BootstrapError::InvalidRule {
                    season: row.short_name.clone(),
                    source,
                })?
            };
            let key = (row.league_short_name.as_str(), row.short_name.as_str());
            if seasons.insert(key, plan.seasons.len()).is_some() {
                return Err(BootstrapError::Duplicate {
                    file: SEASONS_CSV,
                    kind: "season",
                    name: format!("{}/{}", row.league_short_name, row.short_name),
                });
            }
            plan.seasons.push(PlannedSeason {
                league,
                name: row.name.clone(),
                short_name: row.short_name.clone(),
                is_selected: row.is_selected,
                rule,
            });
        }
        let season_of = |file: &'static str, league: &str, season: &str| {
            seasons
                .get(&(league, season))
                .copied()
                .ok_or_else(|| BootstrapError::MissingReference {
                    file,
                    kind: "season",
                    name: format!("{league}/{season}"),
                })
        };

        // Races by name; repeats collapse.
        let mut races: HashMap<&str, usize> = HashMap::new();
        for row in &self.races {
            races.entry(row.name.as_str()).or_insert_with(|| {
                plan.races.push(row.name.clone());
                plan.races.len() - 1
            });
        }

        // Teams by (season, name); coaches are created on first mention.
        let mut coaches: HashMap<PlannedCoach, usize> = HashMap::new();
        let mut teams: HashMap<(usize, &str), usize> = HashMap::new();
        for row in &self.teams {
            let season = season_of(TEAMS_CSV, row.league_short_name.as_str(), row.season_short_name.as_str())?;
            let race = *races.get(row.race_name.as_str()).ok_or_else(|| {
                BootstrapError::MissingReference {
                    file: TEAMS_CSV,
                    kind: "race",
                    name: row.race_name.clone(),
                }
            })?;
            let coach_key = PlannedCoach {
                first_name: row.coach_first_name.clone(),
                last_name: row.coach_last_name.clone(),
                display_name: row.coach_display_name.clone(),
            };
            let coach = match coaches.get(&coach_key) {
                Some(idx) => *idx,
                None => {
                    plan.coaches.push(coach_key.clone());
                    coaches.insert(coach_key, plan.coaches.len() - 1);
                    plan.coaches.len() - 1
                }
            };
            if teams.insert((season, row.name.as_str()), plan.teams.len()).is_some() {
                return Err(BootstrapError::Duplicate {
                    file: TEAMS_CSV,
                    kind: "team",
                    name: row.name.clone(),
                });
            }
            plan.teams.push(PlannedTeam {
                season,
                name: row.name.clone(),
                race,
                coach,
                is_disqualified: row.is_disqualified,
            });
        }
        let team_of = |file: &'static str, season: usize, name: &str| {
            teams
                .get(&(season, name))
                .copied()
                .ok_or_else(|| BootstrapError::MissingReference {
                    file,
                    kind: "team",
                    name: name.to_string(),
                })
        };

        for row in &self.matches {
            let season = season_of(MATCHES_CSV, row.league_short_name.as_str(), row.season_short_name.as_str())?;
            let team1 = team_of(MATCHES_CSV, season, row.team1.as_str())?;
            let team2 = team_of(MATCHES_CSV, season, row.team2.as_str())?;
            let result = MatchResult {
                match_number: row.match_number,
                team1_point_modification: row.point_modification_team_1,
                team2_point_modification: row.point_modification_team_2,
                team1_surrendered: row.team_1_surrendered,
                team2_surrendered: row.team_2_surrendered,
                team1_kickoff_victory: row.is_team_1_victory_by_kickoff,
                team2_kickoff_victory: row.is_team_2_victory_by_kickoff,
                team1_casualties: row.casualties_team_1,
                team2_casualties: row.casualties_team_2,
                is_playoff: row.is_playoff_match,
                is_tournament: row.is_tournament_match,
                ..MatchResult::new(0, team1 as i64, row.td_team_1, row.td_team_2, team2 as i64)
            };
            // Historical records may contain double forfeits.
            result
                .validate(true)
                .map_err(|source| BootstrapError::InvalidMatch {
                    label: format!(
                        "{} {}-{} {}",
                        row.team1, row.td_team_1, row.td_team_2, row.team2
                    ),
                    source,
                })?;
            plan.matches.push(PlannedMatch {
                season,
                team1,
                team2,
                result,
            });
        }

        for row in &self.statistics {
            let season = season_of(
                STATISTICS_CSV,
                row.league_short_name.as_str(),
                row.season_short_name.as_str(),
            )?;
            let team = team_of(STATISTICS_CSV, season, row.team_name.as_str())?;
            plan.statistics.push(PlannedStatistic {
                season,
                team,
                casualties: row.casualties,
            });
        }

        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Import the CSV files in `data_dir` when the database has no league yet.
///
/// Returns `None` when nothing was imported (database already populated or
/// no leagues file).
pub fn bootstrap_if_empty(
    db: &Database,
    data_dir: &Path,
    default_rule: &ScoringRule,
) -> anyhow::Result<Option<ImportSummary>> {
    if db.league_count()? > 0 {
        info!("database already has leagues, skipping CSV bootstrap");
        return Ok(None);
    }

    let dataset = read_dataset(data_dir)?;
    if dataset.is_empty() {
        info!("no leagues to import from {}", data_dir.display());
        return Ok(None);
    }

    let plan = dataset.plan(default_rule)?;
    let summary = db.import_plan(&plan)?;
    Ok(Some(summary))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
