// Casualty tables, built from the per-team casualty statistics rather than
// from match records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{CasualtyStatistic, Coach, EntityKind, Race, Team};
use crate::repository::SeasonSnapshot;
use crate::standings::{compare_names, AggregationInvariantError, Grouping};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CasualtyRow {
    pub kind: EntityKind,
    pub id: i64,
    pub name: String,
    pub casualties: u64,
}

/// Casualty table for `kind` from a season snapshot.
pub fn aggregate(
    kind: EntityKind,
    snapshot: &SeasonSnapshot,
) -> Result<Vec<CasualtyRow>, AggregationInvariantError> {
    let grouping = Grouping::new(kind, &snapshot.teams, &snapshot.coaches, &snapshot.races)?;
    aggregate_grouped(&grouping, &snapshot.casualty_statistics)
}

/// Team casualty table. Every non-disqualified team gets a row, zero when it
/// has no statistic; several statistics for one team are summed.
pub fn aggregate_casualties(
    statistics: &[CasualtyStatistic],
    teams: &[Team],
) -> Result<Vec<CasualtyRow>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Team, teams, &[], &[])?;
    aggregate_grouped(&grouping, statistics)
}

pub fn aggregate_coach_casualties(
    statistics: &[CasualtyStatistic],
    teams: &[Team],
    coaches: &[Coach],
) -> Result<Vec<CasualtyRow>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Coach, teams, coaches, &[])?;
    aggregate_grouped(&grouping, statistics)
}

pub fn aggregate_race_casualties(
    statistics: &[CasualtyStatistic],
    teams: &[Team],
    races: &[Race],
) -> Result<Vec<CasualtyRow>, AggregationInvariantError> {
    let grouping = Grouping::new(EntityKind::Race, teams, &[], races)?;
    aggregate_grouped(&grouping, statistics)
}

fn aggregate_grouped(
    grouping: &Grouping,
    statistics: &[CasualtyStatistic],
) -> Result<Vec<CasualtyRow>, AggregationInvariantError> {
    let mut table: BTreeMap<i64, CasualtyRow> = grouping
        .entities
        .iter()
        .map(|(id, name)| {
            (
                *id,
                CasualtyRow {
                    kind: grouping.kind,
                    id: *id,
                    name: name.clone(),
                    casualties: 0,
                },
            )
        })
        .collect();

    for stat in statistics {
        let Some(team_season) = grouping.season_of(stat.team_id) else {
            return Err(AggregationInvariantError::UnknownStatisticTeam {
                team_id: stat.team_id,
            });
        };
        if team_season != stat.season_id {
            return Err(AggregationInvariantError::StatisticSeasonMismatch {
                team_id: stat.team_id,
                statistic_season: stat.season_id,
                team_season,
            });
        }
        let Some(entity) = grouping.entity_of(stat.team_id) else {
            continue;
        };
        if let Some(row) = table.get_mut(&entity) {
            row.casualties += stat.casualties as u64;
        }
    }

    let mut rows: Vec<CasualtyRow> = table.into_values().collect();
    rows.sort_by(|a, b| {
        b.casualties
            .cmp(&a.casualties)
            .then_with(|| compare_names(&a.name, &b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: i64, name: &str, coach_id: i64, race_id: i64) -> Team {
        Team {
            id,
            season_id: 1,
            name: name.to_string(),
            short_name: String::new(),
            race_id,
            coach_id,
            is_disqualified: false,
        }
    }

    fn stat(team_id: i64, casualties: u32) -> CasualtyStatistic {
        CasualtyStatistic {
            season_id: 1,
            team_id,
            casualties,
        }
    }

    #[test]
    fn sorted_by_count_then_name() {
        let teams = vec![
            team(1, "Zombies", 1, 1),
            team(2, "Orcs", 2, 2),
            team(3, "Elves", 3, 3),
        ];
        let stats = vec![stat(1, 4), stat(2, 4), stat(3, 9)];
        let rows = aggregate_casualties(&stats, &teams).unwrap();
        let names: Vec<(&str, u64)> = rows.iter().map(|r| (r.name.as_str(), r.casualties)).collect();
        assert_eq!(names, vec![("Elves", 9), ("Orcs", 4), ("Zombies", 4)]);
    }

    #[test]
    fn teams_without_statistics_get_zero() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Humans", 2, 2)];
        let rows = aggregate_casualties(&[stat(1, 2)], &teams).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].name, "Humans");
        assert_eq!(rows[1].casualties, 0);
    }

    #[test]
    fn statistics_are_summed_and_disqualified_hidden() {
        let mut dq = team(2, "Humans", 2, 2);
        dq.is_disqualified = true;
        let teams = vec![team(1, "Orcs", 1, 1), dq];
        let rows = aggregate_casualties(&[stat(1, 2), stat(1, 3), stat(2, 7)], &teams).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].casualties, 5);
    }

    #[test]
    fn race_grouping_sums_teams() {
        let teams = vec![team(1, "Orcs", 1, 1), team(2, "Black Orcs", 2, 1)];
        let races = vec![Race {
            id: 1,
            name: "Orc".into(),
        }];
        let rows = aggregate_race_casualties(&[stat(1, 2), stat(2, 3)], &teams, &races).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, EntityKind::Race);
        assert_eq!(rows[0].casualties, 5);
    }

    #[test]
    fn statistic_for_foreign_team_fails() {
        let teams = vec![team(1, "Orcs", 1, 1)];
        let err = aggregate_casualties(&[stat(5, 1)], &teams).unwrap_err();
        assert_eq!(
            err,
            AggregationInvariantError::UnknownStatisticTeam { team_id: 5 }
        );
    }

    #[test]
    fn statistic_recorded_for_another_season_fails() {
        let teams = vec![team(1, "Orcs", 1, 1)];
        let foreign = CasualtyStatistic {
            season_id: 2,
            ..stat(1, 4)
        };
        let err = aggregate_casualties(&[stat(1, 1), foreign], &teams).unwrap_err();
        assert_eq!(
            err,
            AggregationInvariantError::StatisticSeasonMismatch {
                team_id: 1,
                statistic_season: 2,
                team_season: 1
            }
        );
    }
}
