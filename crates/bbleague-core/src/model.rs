// League records: leagues, seasons, teams, coaches, races, match results and
// casualty statistics.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type LeagueId = i64;
pub type SeasonId = i64;
pub type TeamId = i64;
pub type CoachId = i64;
pub type RaceId = i64;
pub type MatchId = i64;

// ---------------------------------------------------------------------------
// Directory records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub short_name: String,
    pub is_selected: bool,
}

/// A season as stored. The scoring rule is kept as its source text; it is
/// parsed into a [`crate::scoring::ScoringRule`] when the season is created
/// and again whenever a snapshot is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub league_id: LeagueId,
    pub name: String,
    pub short_name: String,
    pub is_selected: bool,
    pub scoring_rule: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coach {
    pub id: CoachId,
    pub first_name: String,
    pub last_name: String,
    /// Name shown in standings tables.
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub season_id: SeasonId,
    pub name: String,
    pub short_name: String,
    pub race_id: RaceId,
    pub coach_id: CoachId,
    /// Disqualified teams are hidden from every table, but the matches they
    /// played still count for their opponents.
    pub is_disqualified: bool,
}

/// Per-team, per-season casualty count, recorded independently of matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasualtyStatistic {
    pub season_id: SeasonId,
    pub team_id: TeamId,
    pub casualties: u32,
}

/// Derive a team short name: the upper-cased initial of every word, or the
/// first three letters for a single-word name.
///
/// "Reikland Reavers" -> "RR", "Orcs" -> "ORC".
pub fn generate_team_short_name(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    match words.as_slice() {
        [] => String::new(),
        [single] => single.chars().take(3).collect::<String>().to_uppercase(),
        many => many
            .iter()
            .filter_map(|w| w.chars().next())
            .collect::<String>()
            .to_uppercase(),
    }
}

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// The three groupings every table can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Team,
    Coach,
    Race,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Team, EntityKind::Coach, EntityKind::Race];

    /// Parse a grouping name ("team", "coach", "race"), case-insensitively.
    pub fn from_str_kind(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "team" | "teams" => Some(EntityKind::Team),
            "coach" | "coaches" => Some(EntityKind::Coach),
            "race" | "races" => Some(EntityKind::Race),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            EntityKind::Team => "team",
            EntityKind::Coach => "coach",
            EntityKind::Race => "race",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// One side of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Team1,
    Team2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Team1 => Side::Team2,
            Side::Team2 => Side::Team1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Team1 => write!(f, "team 1"),
            Side::Team2 => write!(f, "team 2"),
        }
    }
}

/// A played match. Once built it is immutable input to aggregation;
/// corrections are a delete and re-create in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Row id once committed; `None` for a freshly parsed, unsaved result.
    #[serde(default)]
    pub id: Option<MatchId>,
    pub season_id: SeasonId,
    /// Sequential number within the season, assigned on commit.
    #[serde(default)]
    pub match_number: Option<u32>,
    pub team1_id: TeamId,
    pub team2_id: TeamId,
    pub team1_touchdowns: u32,
    pub team2_touchdowns: u32,
    /// Manual point adjustments, added after every scoring clause.
    #[serde(default)]
    pub team1_point_modification: i32,
    #[serde(default)]
    pub team2_point_modification: i32,
    #[serde(default)]
    pub team1_surrendered: bool,
    #[serde(default)]
    pub team2_surrendered: bool,
    #[serde(default)]
    pub team1_kickoff_victory: bool,
    #[serde(default)]
    pub team2_kickoff_victory: bool,
    /// Casualties inflicted by each side during the match.
    #[serde(default)]
    pub team1_casualties: u32,
    #[serde(default)]
    pub team2_casualties: u32,
    #[serde(default)]
    pub is_playoff: bool,
    #[serde(default)]
    pub is_tournament: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMatch {
    #[error("a team cannot play against itself")]
    SameTeam,

    #[error("both sides cannot surrender")]
    BothSurrendered,

    #[error("at most one side can claim a kickoff victory")]
    BothKickoffVictories,

    #[error("{0} cannot both surrender and claim a kickoff victory")]
    SurrenderAndKickoff(Side),
}

impl MatchResult {
    /// A plain result with no flags or adjustments.
    pub fn new(
        season_id: SeasonId,
        team1_id: TeamId,
        team1_touchdowns: u32,
        team2_touchdowns: u32,
        team2_id: TeamId,
    ) -> Self {
        MatchResult {
            id: None,
            season_id,
            match_number: None,
            team1_id,
            team2_id,
            team1_touchdowns,
            team2_touchdowns,
            team1_point_modification: 0,
            team2_point_modification: 0,
            team1_surrendered: false,
            team2_surrendered: false,
            team1_kickoff_victory: false,
            team2_kickoff_victory: false,
            team1_casualties: 0,
            team2_casualties: 0,
            is_playoff: false,
            is_tournament: false,
        }
    }

    /// Check the per-match invariants shared by parsed and directly entered
    /// results.
    ///
    /// A double surrender is still accepted here only when `allow_double_surrender`
    /// is set; the shorthand parser never allows it, imported history may.
    pub fn validate(&self, allow_double_surrender: bool) -> Result<(), InvalidMatch> {
        if self.team1_id == self.team2_id {
            return Err(InvalidMatch::SameTeam);
        }
        if self.team1_surrendered && self.team1_kickoff_victory {
            return Err(InvalidMatch::SurrenderAndKickoff(Side::Team1));
        }
        if self.team2_surrendered && self.team2_kickoff_victory {
            return Err(InvalidMatch::SurrenderAndKickoff(Side::Team2));
        }
        if self.team1_kickoff_victory && self.team2_kickoff_victory {
            return Err(InvalidMatch::BothKickoffVictories);
        }
        if self.team1_surrendered && self.team2_surrendered && !allow_double_surrender {
            return Err(InvalidMatch::BothSurrendered);
        }
        Ok(())
    }

    pub fn team_id(&self, side: Side) -> TeamId {
        match side {
            Side::Team1 => self.team1_id,
            Side::Team2 => self.team2_id,
        }
    }

    pub fn touchdowns(&self, side: Side) -> u32 {
        match side {
            Side::Team1 => self.team1_touchdowns,
            Side::Team2 => self.team2_touchdowns,
        }
    }

    pub fn point_modification(&self, side: Side) -> i32 {
        match side {
            Side::Team1 => self.team1_point_modification,
            Side::Team2 => self.team2_point_modification,
        }
    }

    pub fn surrendered(&self, side: Side) -> bool {
        match side {
            Side::Team1 => self.team1_surrendered,
            Side::Team2 => self.team2_surrendered,
        }
    }

    pub fn kickoff_victory(&self, side: Side) -> bool {
        match side {
            Side::Team1 => self.team1_kickoff_victory,
            Side::Team2 => self.team2_kickoff_victory,
        }
    }

    pub fn casualties(&self, side: Side) -> u32 {
        match side {
            Side::Team1 => self.team1_casualties,
            Side::Team2 => self.team2_casualties,
        }
    }

    /// Actual touchdown difference from `side`'s point of view.
    pub fn touchdown_difference(&self, side: Side) -> i64 {
        self.touchdowns(side) as i64 - self.touchdowns(side.opponent()) as i64
    }
}
