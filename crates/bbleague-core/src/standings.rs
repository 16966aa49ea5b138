// Standings aggregation: folds a season's matches into ordered team, coach
// and race tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{
    Coach, CoachId, EntityKind, MatchId, MatchResult, Race, RaceId, SeasonId, Side, Team, TeamId,
};
use crate::repository::SeasonSnapshot;
use crate::scoring::{decide, score, ScoringRule, SideResult};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Season data that contradicts itself. Not recoverable by the user; the
/// whole query fails instead of returning a partial table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationInvariantError {
    #[error("match {match_id:?} references team {team_id}, which is not part of the season")]
    UnknownMatchTeam {
        match_id: Option<MatchId>,
        team_id: TeamId,
    },

    #[error("team {team_id} references missing coach {coach_id}")]
    MissingCoach { team_id: TeamId, coach_id: CoachId },

    #[error("team {team_id} references missing race {race_id}")]
    MissingRace { team_id: TeamId, race_id: RaceId },

    #[error("casualty statistic references team {team_id}, which is not part of the season")]
    UnknownStatisticTeam { team_id: TeamId },

    #[error(
        "match {match_id:?} is recorded for season {match_season}, \
         but team {team_id} plays in season {team_season}"
    )]
    MatchSeasonMismatch {
        match_id: Option<MatchId>,
        match_season: SeasonId,
        team_id: TeamId,
        team_season: SeasonId,
    },

    #[error(
        "casualty statistic for team {team_id} is recorded for season {statistic_season}, \
         but the team plays in season {team_season}"
    )]
    StatisticSeasonMismatch {
        team_id: TeamId,
        statistic_season: SeasonId,
        team_season: SeasonId,
    },
}

// ---------------------------------------------------------------------------
// Table rows
// ---------------------------------------------------------------------------

/// One row of a standings table. `id` is a team, coach or race id depending
/// on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub kind: EntityKind,
    pub id: i64,
    pub name: String,
    pub points: i64,
    pub touchdowns_for: u64,
    pub touchdowns_against: u64,
    /// Recorded touchdowns for minus against. Margin-based scoring clauses
    /// use the effective margin instead, which can differ for forfeits.
    pub touchdown_difference: i64,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Casualties inflicted in counted matches, as entered with the results.
    pub casualties: u64,
}

pub type TeamStanding = Standing;
pub type CoachStanding = Standing;
pub type RaceStanding = Standing;

impl Standing {
    fn empty(kind: EntityKind, id: i64, name: &str) -> Self {
        Standing {
            kind,
            id,
            name: name.to_string(),
            points: 0,
            touchdowns_for: 0,
            touchdowns_against: 0,
            touchdown_difference: 0,
            played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            casualties: 0,
        }
    }

    fn credit(&mut self, m: &MatchResult, side: Side, points: i64, result: SideResult) {
        let scored = m.touchdowns(side) as u64;
        let conceded = m.touchdowns(side.opponent()) as u64;
        self.points += points;
        self.touchdowns_for += scored;
        self.touchdowns_against += conceded;
        self.touchdown_difference += m.touchdown_difference(side);
        self.casualties += m.casualties(side) as u64;
        self.played += 1;
        match result {
            SideResult::Won => self.wins += 1,
            SideResult::Drawn => self.draws += 1,
            SideResult::Lost => self.losses += 1,
        }
    }
}

/// Table order: points desc, touchdown difference desc, name asc, id asc.
pub(crate) fn table_order(a: &Standing, b: &Standing) -> Ordering {
    b.points
        .cmp(&a.points)
        .then_with(|| b.touchdown_difference.cmp(&a.touchdown_difference))
        .then_with(|| compare_names(&a.name, &b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Case-insensitive name order, falling back to exact text so distinct names
/// never compare equal.
pub(crate) fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Maps each team of a season onto the table entity it contributes to.
///
/// `known` holds every team of the season with the season it plays in;
/// `members` only the non-disqualified ones. A disqualified team is known
/// (its matches are valid) but credits nobody.
pub(crate) struct Grouping {
    pub(crate) kind: EntityKind,
    known: HashMap<TeamId, SeasonId>,
    members: HashMap<TeamId, i64>,
    /// Entity id -> display name, for every entity with at least one
    /// non-disqualified team.
    pub(crate) entities: BTreeMap<i64, String>,
}

impl Grouping {
    pub(crate) fn new(
        kind: EntityKind,
        teams: &[Team],
        coaches: &[Coach],
        races: &[Race],
    ) -> Result<Self, AggregationInvariantError> {
        let coach_names: HashMap<CoachId, &str> = coaches
            .iter()
            .map(|c| (c.id, c.display_name.as_str()))
            .collect();
        let race_names: HashMap<RaceId, &str> =
            races.iter().map(|r| (r.id, r.name.as_str())).collect();

        let mut grouping = Grouping {
            kind,
            known: HashMap::new(),
            members: HashMap::new(),
            entities: BTreeMap::new(),
        };

        for team in teams {
            grouping.known.insert(team.id, team.season_id);
            if team.is_disqualified {
                continue;
            }
            let (entity_id, name) = match kind {
                EntityKind::Team => (team.id, team.name.as_str()),
                EntityKind::Coach => {
                    let name = coach_names.get(&team.coach_id).ok_or(
                        AggregationInvariantError::MissingCoach {
                            team_id: team.id,
                            coach_id: team.coach_id,
                        },
                    )?;
                    (team.coach_id, *name)
                }
                EntityKind::Race => {
                    let name = race_names.get(&team.race_id).ok_or(
                        AggregationInvariantError::MissingRace {
                            team_id: team.id,
                            race_id: team.race_id,
                        },
                    )?;
                    (team.race_id, *name)
                }
            };
            grouping.members.insert(team.id, entity_id);
            grouping
                .entities
                .entry(entity_id)
                .or_insert_with(|| name.to_string());
        }
        Ok(grouping)
    }

    /// Season of `team_id`, or `None` when the team is not part of the
    /// grouped teams.
    pub(crate) fn season_of(&self, team_id: TeamId) -> Option<SeasonId> {
        self.known.get(&team_id).copied()
    }

    /// Entity credited for `team_id`, or `None` for a disqualified team.
    pub(crate) fn entity_of(&self, team_id: TeamId) -> Option<i64> {
        self.members.get(&team_id).copied()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Build the table for `kind` from a season snapshot.
pub fn aggregate(
    kind: EntityKind,
    snapshot: &SeasonSnapshot,
) -> Result<Vec<Standing>, AggregationInvariantError> {
    let grouping = Grouping::new(kind, &snapshot.teams, &snapshot.coaches, &snapshot.races)?;
    aggregate_grouped(&grouping, &snapshot.matches, &snapshot.rule)
}

/// Team table from raw matches and teams.
pub fn aggregate_teams(
    matches: &[MatchResult],
    teams: &[Team],
    rule: &ScoringRule,
) -> Result<Vec<TeamStanding>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Team, teams, &[], &[])?;
    aggregate_grouped(&grouping, matches, rule)
}

pub fn aggregate_coaches(
    matches: &[MatchResult],
    teams: &[Team],
    coaches: &[Coach],
    rule: &ScoringRule,
) -> Result<Vec<CoachStanding>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Coach, teams, coaches, &[])?;
    aggregate_grouped(&grouping, matches, rule)
}

pub fn aggregate_races(
    matches: &[MatchResult],
    teams: &[Team],
    races: &[Race],
    rule: &ScoringRule,
) -> Result<Vec<RaceStanding>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Race, teams, &[], races)?;
    aggregate_grouped(&grouping, matches, rule)
}

fn aggregate_grouped(
    grouping: &Grouping,
    matches: &[MatchResult],
    rule: &ScoringRule,
) -> Result<Vec<Standing>, AggregationInvariantError> {
    let mut table: BTreeMap<i64, Standing> = grouping
        .entities
        .iter()
        .map(|(id, name)| (*id, Standing::empty(grouping.kind, *id, name)))
        .collect();

    for m in matches {
        for side in [Side::Team1, Side::Team2] {
            let team_id = m.team_id(side);
            let Some(team_season) = grouping.season_of(team_id) else {
                return Err(AggregationInvariantError::UnknownMatchTeam {
                    match_id: m.id,
                    team_id,
                });
            };
            if team_season != m.season_id {
                return Err(AggregationInvariantError::MatchSeasonMismatch {
                    match_id: m.id,
                    match_season: m.season_id,
                    team_id,
                    team_season,
                });
            }
        }
        if !rule.counts(m) {
            debug!(match_id = ?m.id, "match excluded by scoring rule");
            continue;
        }

        let verdict = decide(m);
        let (points1, points2) = score(m, rule);
        debug!(
            match_id = ?m.id,
            team1 = m.team1_id,
            team2 = m.team2_id,
            points1,
            points2,
            outcome = ?verdict.outcome,
            "scored match"
        );

        for (side, points) in [(Side::Team1, points1), (Side::Team2, points2)] {
            let Some(entity) = grouping.entity_of(m.team_id(side)) else {
                continue;
            };
            if let Some(row) = table.get_mut(&entity) {
                row.credit(m, side, points, verdict.result_for(side));
            }
        }
    }

    let mut rows: Vec<Standing> = table.into_values().collect();
    rows.sort_by(table_order);
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Season;

    fn team(id: TeamId, name: &str, coach_id: CoachId, race_id: RaceId) -> Team {
        Team {
            id,
            season_id: 1,
            name: name.to_string(),
            short_name: crate::model::generate_team_short_name(name),
            race_id,
            coach_id,
            is_disqualified: false,
        }
    }

    fn coach(id: CoachId, name: &str) -> Coach {
        Coach {
            id,
            first_name: name.to_string(),
            last_name: String::new(),
            display_name: name.to_string(),
        }
    }

    fn race(id: RaceId, name: &str) -> Race {
        Race {
            id,
            name: name.to_string(),
        }
    }

    fn rule() -> ScoringRule {
        ScoringRule::parse("win=3; draw=1; loss=0").unwrap()
    }

    fn row<'a>(rows: &'a [Standing], name: &str) -> &'a Standing {
        rows.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn basic_team_table() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let matches = vec![
            MatchResult::new(1, 1, 2, 1, 2),
            MatchResult::new(1, 2, 1, 1, 1),
        ];
        let rows = aggregate_teams(&matches, &teams, &rule()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Orcs");
        assert_eq!(rows[0].points, 4);
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[0].draws, 1);
        assert_eq!(rows[0].touchdowns_for, 3);
        assert_eq!(rows[0].touchdowns_against, 2);
        assert_eq!(rows[0].touchdown_difference, 1);
        assert_eq!(rows[1].name, "Humans");
        assert_eq!(rows[1].points, 1);
        assert_eq!(rows[1].losses, 1);
        assert_eq!(rows[1].played, 2);
    }

    #[test]
    fn match_casualties_are_summed() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let matches = vec![
            MatchResult {
                team1_casualties: 3,
                team2_casualties: 1,
                ..MatchResult::new(1, 1, 2, 1, 2)
            },
            MatchResult {
                team1_casualties: 2,
                ..MatchResult::new(1, 2, 0, 0, 1)
            },
        ];
        let rows = aggregate_teams(&matches, &teams, &rule()).unwrap();
        assert_eq!(row(&rows, "Orcs").casualties, 3);
        assert_eq!(row(&rows, "Humans").casualties, 3);
    }

    #[test]
    fn teams_without_matches_are_listed() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let rows = aggregate_teams(&[], &teams, &rule()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.played == 0 && r.points == 0));
        assert_eq!(rows[0].name, "Humans");
    }

    #[test]
    fn disqualified_team_hidden_but_opponent_credited() {
        let mut a = team(1, "Team A", 1, 1);
        a.is_disqualified = true;
        let teams = vec![a, team(2, "Team B", 2, 2)];
        let matches = vec![MatchResult::new(1, 1, 1, 3, 2)];
        let rows = aggregate_teams(&matches, &teams, &rule()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Team B");
        assert_eq!(rows[0].wins, 1);
        assert_eq!(rows[0].touchdown_difference, 2);
        assert_eq!(rows[0].points, 3);
    }

    #[test]
    fn tie_break_by_touchdown_difference_then_name() {
        let teams = vec![
            team(1, "Zombies", 1, 1),
            team(2, "Orcs", 2, 2),
            team(3, "Elves", 3, 3),
        ];
        // Zombies and Orcs both win once by one; Elves lose twice.
        let matches = vec![
            MatchResult::new(1, 1, 1, 0, 3),
            MatchResult::new(1, 2, 2, 1, 3),
        ];
        let rows = aggregate_teams(&matches, &teams, &rule()).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Orcs", "Zombies", "Elves"]);

        // A bigger margin beats the name order.
        let matches = vec![
            MatchResult::new(1, 1, 3, 0, 3),
            MatchResult::new(1, 2, 2, 1, 3),
        ];
        let rows = aggregate_teams(&matches, &teams, &rule()).unwrap();
        assert_eq!(rows[0].name, "Zombies");
    }

    #[test]
    fn surrender_precedence_in_table() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let m = MatchResult {
            team1_surrendered: true,
            ..MatchResult::new(1, 1, 5, 2, 2)
        };
        let rows = aggregate_teams(&[m], &teams, &rule()).unwrap();
        let humans = row(&rows, "Humans");
        assert_eq!(humans.wins, 1);
        assert_eq!(humans.points, 3);
        // The table keeps the recorded touchdowns.
        assert_eq!(humans.touchdown_difference, -3);
        assert_eq!(row(&rows, "Orcs").losses, 1);
    }

    #[test]
    fn excluded_matches_do_not_count() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let playoff = MatchResult {
            is_playoff: true,
            ..MatchResult::new(1, 1, 2, 0, 2)
        };
        let rule = ScoringRule::parse("win=3; draw=1; exclude=playoff").unwrap();
        let rows = aggregate_teams(&[playoff], &teams, &rule).unwrap();
        assert!(rows.iter().all(|r| r.played == 0));
    }

    #[test]
    fn match_with_foreign_team_fails() {
        let teams = vec![team(1, "Orcs", 1, 1)];
        let m = MatchResult {
            id: Some(9),
            ..MatchResult::new(1, 1, 1, 0, 42)
        };
        let err = aggregate_teams(&[m], &teams, &rule()).unwrap_err();
        assert_eq!(
            err,
            AggregationInvariantError::UnknownMatchTeam {
                match_id: Some(9),
                team_id: 42
            }
        );
    }

    #[test]
    fn match_recorded_for_another_season_fails() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let m = MatchResult {
            id: Some(3),
            ..MatchResult::new(2, 1, 1, 0, 2)
        };
        let err = aggregate_teams(&[m], &teams, &rule()).unwrap_err();
        assert_eq!(
            err,
            AggregationInvariantError::MatchSeasonMismatch {
                match_id: Some(3),
                match_season: 2,
                team_id: 1,
                team_season: 1
            }
        );
    }

    #[test]
    fn coach_table_sums_teams() {
        let teams = vec![
            team(1, "Orcs", 1, 1),
            team(2, "Humans", 2, 2),
            team(3, "Dwarves", 1, 3),
        ];
        let coaches = vec![coach(1, "Alice"), coach(2, "Bob")];
        let matches = vec![
            MatchResult::new(1, 1, 2, 0, 2),
            MatchResult::new(1, 3, 1, 1, 2),
        ];
        let rows = aggregate_coaches(&matches, &teams, &coaches, &rule()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Alice");
        assert_eq!(rows[0].kind, EntityKind::Coach);
        assert_eq!(rows[0].points, 4);
        assert_eq!(rows[0].played, 2);
        assert_eq!(rows[1].name, "Bob");
        assert_eq!(rows[1].points, 1);
    }

    #[test]
    fn race_without_active_team_is_excluded() {
        let mut dq = team(2, "Humans", 2, 2);
        dq.is_disqualified = true;
        let teams = vec![team(1, "Orcs", 1, 1), dq];
        let races = vec![race(1, "Orc"), race(2, "Human")];
        let matches = vec![MatchResult::new(1, 2, 0, 1, 1)];
        let rows = aggregate_races(&matches, &teams, &races, &rule()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Orc");
        assert_eq!(rows[0].wins, 1);
    }

    #[test]
    fn missing_coach_fails() {
        let teams = vec![team(1, "Orcs", 77, 1)];
        let err = aggregate_coaches(&[], &teams, &[], &rule()).unwrap_err();
        assert_eq!(
            err,
            AggregationInvariantError::MissingCoach {
                team_id: 1,
                coach_id: 77
            }
        );
    }

    #[test]
    fn aggregate_from_snapshot() {
        let snapshot = SeasonSnapshot {
            season: Season {
                id: 1,
                league_id: 1,
                name: "Season 1".into(),
                short_name: "S1".into(),
                is_selected: true,
                scoring_rule: "win=3; draw=1; loss=0".into(),
            },
            rule: rule(),
            teams: vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)],
            coaches: vec![coach(1, "Alice"), coach(2, "Bob")],
            races: vec![race(1, "Orc"), race(2, "Human")],
            matches: vec![MatchResult::new(1, 1, 2, 1, 2)],
            casualty_statistics: vec![],
        };
        let races = aggregate(EntityKind::Race, &snapshot).unwrap();
        assert_eq!(races[0].name, "Orc");
        assert_eq!(races[0].points, 3);
        let teams = aggregate(EntityKind::Team, &snapshot).unwrap();
        assert_eq!(teams, aggregate(EntityKind::Team, &snapshot).unwrap());
    }

    #[test]
    fn name_order_is_case_insensitive() {
        assert_eq!(compare_names("orcs", "Zombies"), Ordering::Less);
        assert_eq!(compare_names("Orcs", "orcs"), Ordering::Less);
        assert_eq!(compare_names("Orcs", "Orcs"), Ordering::Equal);
    }
}
