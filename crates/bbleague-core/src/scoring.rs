// Scoring rules: clause grammar, outcome resolution and per-match points.
//
// Rule text is a list of `key=value` clauses separated by `;` or newlines,
// e.g. "win=3; draw=1; loss=0; td_diff=1/td". It is parsed once when a season
// is set up; scoring a match never fails.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::model::{MatchResult, Side};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A scoring configuration that cannot be accepted. Raised while setting up a
/// season and blocks its activation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("scoring rule contains no clauses")]
    Empty,

    #[error("unknown scoring clause `{clause}`")]
    UnknownClause { clause: String },

    #[error("scoring clause `{clause}` is missing `=value`")]
    MissingValue { clause: String },

    #[error("invalid value `{value}` for scoring clause `{key}`: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("scoring clause `{key}` expects unit `/{expected}`, got `/{found}`")]
    UnitMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("scoring clause `{key}` is declared more than once")]
    Duplicate { key: String },
}

// ---------------------------------------------------------------------------
// Clauses
// ---------------------------------------------------------------------------

/// One typed scoring clause. Values are points awarded to a single side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    /// Points for winning.
    Win(i32),
    /// Points for each side of a draw.
    Draw(i32),
    /// Points for losing (a surrendering side gets `Surrender` instead when
    /// that clause is present).
    Loss(i32),
    /// Points for the side that surrendered.
    Surrender(i32),
    /// Points for every match played.
    Played(i32),
    /// Points per touchdown scored.
    Touchdown(i32),
    /// Points per touchdown of effective margin; negative for the losing side.
    TouchdownDifference(i32),
    /// Points per casualty inflicted.
    Casualty(i32),
    /// Extra points for a win by at least `margin` touchdowns.
    BigWin { points: i32, margin: u32 },
}

impl Clause {
    /// The key this clause is written with in rule text.
    pub fn key(&self) -> &'static str {
        match self {
            Clause::Win(_) => "win",
            Clause::Draw(_) => "draw",
            Clause::Loss(_) => "loss",
            Clause::Surrender(_) => "surrender",
            Clause::Played(_) => "played",
            Clause::Touchdown(_) => "td",
            Clause::TouchdownDifference(_) => "td_diff",
            Clause::Casualty(_) => "cas",
            Clause::BigWin { .. } => "big_win",
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Win(n) | Clause::Draw(n) | Clause::Loss(n) | Clause::Surrender(n)
            | Clause::Played(n) => write!(f, "{}={}", self.key(), n),
            Clause::Touchdown(n) | Clause::TouchdownDifference(n) => {
                write!(f, "{}={}/td", self.key(), n)
            }
            Clause::Casualty(n) => write!(f, "{}={}/cas", self.key(), n),
            Clause::BigWin { points, margin } => write!(f, "big_win={}@{}", points, margin),
        }
    }
}

/// Match categories that can be left out of standings altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Exclusion {
    Playoff,
    Tournament,
}

impl Exclusion {
    fn from_str_exclusion(s: &str) -> Option<Self> {
        match s {
            "playoff" | "playoffs" => Some(Exclusion::Playoff),
            "tournament" | "tournaments" => Some(Exclusion::Tournament),
            _ => None,
        }
    }

    fn display_str(&self) -> &'static str {
        match self {
            Exclusion::Playoff => "playoff",
            Exclusion::Tournament => "tournament",
        }
    }
}

/// A parsed, immutable scoring configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRule {
    clauses: Vec<Clause>,
    exclusions: Vec<Exclusion>,
}

impl ScoringRule {
    /// Parse rule text. Every segment must be a known clause; anything else
    /// is a [`ConfigError`].
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut clauses = Vec::new();
        let mut exclusions = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for segment in text.split(['\n', ';']) {
            let segment = match segment.find('#') {
                Some(idx) => &segment[..idx],
                None => segment,
            }
            .trim();
            if segment.is_empty() {
                continue;
            }

            let Some((raw_key, raw_value)) = segment.split_once('=') else {
                return Err(if is_known_key(&segment.to_lowercase()) {
                    ConfigError::MissingValue {
                        clause: segment.to_string(),
                    }
                } else {
                    ConfigError::UnknownClause {
                        clause: segment.to_string(),
                    }
                });
            };
            let key = raw_key.trim().to_lowercase();
            let value = raw_value.trim();

            if key == "exclude" {
                let exclusion = Exclusion::from_str_exclusion(&value.to_lowercase()).ok_or_else(
                    || ConfigError::InvalidValue {
                        key: key.clone(),
                        value: value.to_string(),
                        message: "expected `playoff` or `tournament`".into(),
                    },
                )?;
                if exclusions.contains(&exclusion) {
                    return Err(ConfigError::Duplicate {
                        key: format!("exclude={}", exclusion.display_str()),
                    });
                }
                exclusions.push(exclusion);
                continue;
            }

            let clause = match key.as_str() {
                "win" => Clause::Win(parse_points(&key, value)?),
                "draw" => Clause::Draw(parse_points(&key, value)?),
                "loss" => Clause::Loss(parse_points(&key, value)?),
                "surrender" => Clause::Surrender(parse_points(&key, value)?),
                "played" => Clause::Played(parse_points(&key, value)?),
                "td" => Clause::Touchdown(parse_rate(&key, value, "td")?),
                "td_diff" => Clause::TouchdownDifference(parse_rate(&key, value, "td")?),
                "cas" => Clause::Casualty(parse_rate(&key, value, "cas")?),
                "big_win" => parse_big_win(&key, value)?,
                _ => {
                    return Err(ConfigError::UnknownClause {
                        clause: segment.to_string(),
                    })
                }
            };
            if !seen.insert(key.clone()) {
                return Err(ConfigError::Duplicate { key });
            }
            clauses.push(clause);
        }

        if clauses.is_empty() {
            return Err(ConfigError::Empty);
        }
        Ok(ScoringRule {
            clauses,
            exclusions,
        })
    }

    /// Clauses in declaration order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// Whether `m` takes part in standings under this rule.
    pub fn counts(&self, m: &MatchResult) -> bool {
        !self.exclusions.iter().any(|e| match e {
            Exclusion::Playoff => m.is_playoff,
            Exclusion::Tournament => m.is_tournament,
        })
    }

    fn has_surrender_clause(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c, Clause::Surrender(_)))
    }
}

impl fmt::Display for ScoringRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        parts.extend(
            self.exclusions
                .iter()
                .map(|e| format!("exclude={}", e.display_str())),
        );
        write!(f, "{}", parts.join("; "))
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "win" | "draw" | "loss" | "surrender" | "played" | "td" | "td_diff" | "cas" | "big_win"
            | "exclude"
    )
}

fn parse_points(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.parse::<i32>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: "expected a whole number".into(),
    })
}

/// `N` or `N/unit`, where the unit must be `expected`.
fn parse_rate(key: &str, value: &str, expected: &'static str) -> Result<i32, ConfigError> {
    match value.split_once('/') {
        Some((number, unit)) => {
            let unit = unit.trim().to_lowercase();
            if unit != expected {
                return Err(ConfigError::UnitMismatch {
                    key: key.to_string(),
                    expected,
                    found: unit,
                });
            }
            parse_points(key, number.trim())
        }
        None => parse_points(key, value),
    }
}

/// `N@M`: N points for a win by at least M touchdowns.
fn parse_big_win(key: &str, value: &str) -> Result<Clause, ConfigError> {
    let Some((points, margin)) = value.split_once('@') else {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "expected `points@margin`".into(),
        });
    };
    let points = parse_points(key, points.trim())?;
    let margin = margin
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|m| *m >= 1)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "margin must be a whole number of at least 1".into(),
        })?;
    Ok(Clause::BigWin { points, margin })
}

// ---------------------------------------------------------------------------
// Outcome resolution
// ---------------------------------------------------------------------------

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Side),
    Draw,
    /// Both sides surrendered; both are scored as losers.
    DoubleForfeit,
}

/// What decided the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Touchdowns,
    Surrender,
    Kickoff,
}

/// Resolved outcome of a match plus the touchdown margin used for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    pub decided_by: Decision,
    /// Margin from team 1's point of view, as used by margin-based clauses.
    /// Zero for kickoff victories; never negative for the winner of a
    /// surrendered match.
    pub effective_margin: i64,
}

/// Side result from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideResult {
    Won,
    Drawn,
    Lost,
}

impl Verdict {
    pub fn result_for(&self, side: Side) -> SideResult {
        match self.outcome {
            Outcome::Win(winner) if winner == side => SideResult::Won,
            Outcome::Win(_) | Outcome::DoubleForfeit => SideResult::Lost,
            Outcome::Draw => SideResult::Drawn,
        }
    }

    pub fn margin_for(&self, side: Side) -> i64 {
        match side {
            Side::Team1 => self.effective_margin,
            Side::Team2 => -self.effective_margin,
        }
    }
}

/// Apply outcome precedence: surrender, then kickoff victory, then
/// touchdowns.
pub fn decide(m: &MatchResult) -> Verdict {
    let actual = m.touchdown_difference(Side::Team1);

    match (m.team1_surrendered, m.team2_surrendered) {
        (true, true) => {
            return Verdict {
                outcome: Outcome::DoubleForfeit,
                decided_by: Decision::Surrender,
                effective_margin: 0,
            }
        }
        (true, false) => {
            return Verdict {
                outcome: Outcome::Win(Side::Team2),
                decided_by: Decision::Surrender,
                effective_margin: actual.min(0),
            }
        }
        (false, true) => {
            return Verdict {
                outcome: Outcome::Win(Side::Team1),
                decided_by: Decision::Surrender,
                effective_margin: actual.max(0),
            }
        }
        (false, false) => {}
    }

    if m.team1_kickoff_victory || m.team2_kickoff_victory {
        let winner = if m.team1_kickoff_victory {
            Side::Team1
        } else {
            Side::Team2
        };
        return Verdict {
            outcome: Outcome::Win(winner),
            decided_by: Decision::Kickoff,
            effective_margin: 0,
        };
    }

    let outcome = match actual.cmp(&0) {
        std::cmp::Ordering::Greater => Outcome::Win(Side::Team1),
        std::cmp::Ordering::Less => Outcome::Win(Side::Team2),
        std::cmp::Ordering::Equal => Outcome::Draw,
    };
    Verdict {
        outcome,
        decided_by: Decision::Touchdowns,
        effective_margin: actual,
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Points awarded to (team 1, team 2) for one match.
///
/// Clauses are summed in declaration order; point modifications are added
/// last, to each side independently.
pub fn score(m: &MatchResult, rule: &ScoringRule) -> (i64, i64) {
    let verdict = decide(m);
    (
        score_side(m, rule, &verdict, Side::Team1),
        score_side(m, rule, &verdict, Side::Team2),
    )
}

fn score_side(m: &MatchResult, rule: &ScoringRule, verdict: &Verdict, side: Side) -> i64 {
    let result = verdict.result_for(side);
    let surrendered = m.surrendered(side);
    let surrender_replaces_loss = surrendered && rule.has_surrender_clause();
    let margin = verdict.margin_for(side);

    let mut points: i64 = 0;
    for clause in rule.clauses() {
        points += match *clause {
            Clause::Win(n) if result == SideResult::Won => n as i64,
            Clause::Draw(n) if result == SideResult::Drawn => n as i64,
            Clause::Loss(n) if result == SideResult::Lost && !surrender_replaces_loss => n as i64,
            Clause::Surrender(n) if surrendered => n as i64,
            Clause::Played(n) => n as i64,
            Clause::Touchdown(n) => n as i64 * m.touchdowns(side) as i64,
            Clause::TouchdownDifference(n) => n as i64 * margin,
            Clause::Casualty(n) => n as i64 * m.casualties(side) as i64,
            Clause::BigWin { points: bonus, margin: needed }
                if result == SideResult::Won && margin >= needed as i64 =>
            {
                bonus as i64
            }
            _ => 0,
        };
    }
    points + m.point_modification(side) as i64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(text: &str) -> ScoringRule {
        ScoringRule::parse(text).expect("rule should parse")
    }

    fn result(td1: u32, td2: u32) -> MatchResult {
        MatchResult::new(1, 1, td1, td2, 2)
    }

    // -- Parsing --

    #[test]
    fn parses_basic_clauses_in_order() {
        let r = rule("win=3; draw=1\nloss=0");
        assert_eq!(
            r.clauses(),
            &[Clause::Win(3), Clause::Draw(1), Clause::Loss(0)]
        );
    }

    #[test]
    fn parses_rates_with_and_without_units() {
        let r = rule("td=1/td; td_diff = 2; cas=1/CAS");
        assert_eq!(
            r.clauses(),
            &[
                Clause::Touchdown(1),
                Clause::TouchdownDifference(2),
                Clause::Casualty(1)
            ]
        );
    }

    #[test]
    fn ignores_comments_and_blank_segments() {
        let r = rule("# league default\nwin=3;;\n\n draw=1 # tie\n");
        assert_eq!(r.clauses(), &[Clause::Win(3), Clause::Draw(1)]);
    }

    #[test]
    fn keys_are_case_insensitive_and_values_may_be_signed() {
        let r = rule("WIN=+3; Surrender=-1");
        assert_eq!(r.clauses(), &[Clause::Win(3), Clause::Surrender(-1)]);
    }

    #[test]
    fn parses_big_win_and_exclusions() {
        let r = rule("win=3; big_win=1@3; exclude=playoff; exclude=Tournament");
        assert_eq!(
            r.clauses(),
            &[Clause::Win(3), Clause::BigWin { points: 1, margin: 3 }]
        );
        assert_eq!(r.exclusions(), &[Exclusion::Playoff, Exclusion::Tournament]);
    }

    #[test]
    fn rejects_unknown_clause() {
        let err = ScoringRule::parse("win=3; bonus=2").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownClause {
                clause: "bonus=2".into()
            }
        );
    }

    #[test]
    fn rejects_bare_word() {
        assert!(matches!(
            ScoringRule::parse("win").unwrap_err(),
            ConfigError::MissingValue { .. }
        ));
        assert!(matches!(
            ScoringRule::parse("victory").unwrap_err(),
            ConfigError::UnknownClause { .. }
        ));
    }

    #[test]
    fn rejects_non_numeric_value() {
        assert!(matches!(
            ScoringRule::parse("win=three").unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn rejects_wrong_unit() {
        let err = ScoringRule::parse("td_diff=1/cas").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnitMismatch {
                key: "td_diff".into(),
                expected: "td",
                found: "cas".into()
            }
        );
    }

    #[test]
    fn rejects_duplicates() {
        assert_eq!(
            ScoringRule::parse("win=3; win=2").unwrap_err(),
            ConfigError::Duplicate { key: "win".into() }
        );
        assert!(matches!(
            ScoringRule::parse("win=3; exclude=playoff; exclude=playoffs").unwrap_err(),
            ConfigError::Duplicate { .. }
        ));
    }

    #[test]
    fn rejects_bad_big_win_threshold() {
        assert!(ScoringRule::parse("big_win=1@0").is_err());
        assert!(ScoringRule::parse("big_win=1").is_err());
    }

    #[test]
    fn rejects_unknown_exclusion() {
        assert!(matches!(
            ScoringRule::parse("win=3; exclude=friendly").unwrap_err(),
            ConfigError::InvalidValue { .. }
        ));
    }

    #[test]
    fn rejects_empty_rule() {
        assert_eq!(ScoringRule::parse("").unwrap_err(), ConfigError::Empty);
        assert_eq!(
            ScoringRule::parse(" ; # nothing\n").unwrap_err(),
            ConfigError::Empty
        );
        assert_eq!(
            ScoringRule::parse("exclude=playoff").unwrap_err(),
            ConfigError::Empty
        );
    }

    #[test]
    fn display_round_trips_through_parse() {
        let r = rule("win=3;draw=1;td_diff=1/td;cas=2;big_win=1@2;exclude=playoff");
        let again = rule(&r.to_string());
        assert_eq!(r, again);
    }

    // -- Outcome precedence --

    #[test]
    fn touchdowns_decide_normal_match() {
        assert_eq!(decide(&result(2, 1)).outcome, Outcome::Win(Side::Team1));
        assert_eq!(decide(&result(0, 3)).outcome, Outcome::Win(Side::Team2));
        assert_eq!(decide(&result(1, 1)).outcome, Outcome::Draw);
    }

    #[test]
    fn surrender_beats_touchdowns() {
        let m = MatchResult {
            team1_surrendered: true,
            ..result(5, 2)
        };
        let v = decide(&m);
        assert_eq!(v.outcome, Outcome::Win(Side::Team2));
        assert_eq!(v.decided_by, Decision::Surrender);
        assert_eq!(v.margin_for(Side::Team2), 0);
    }

    #[test]
    fn surrender_keeps_winner_margin_when_leading() {
        let m = MatchResult {
            team2_surrendered: true,
            ..result(3, 1)
        };
        assert_eq!(decide(&m).margin_for(Side::Team1), 2);
    }

    #[test]
    fn surrender_beats_kickoff_claim() {
        let m = MatchResult {
            team1_surrendered: true,
            team2_kickoff_victory: true,
            ..result(0, 0)
        };
        let v = decide(&m);
        assert_eq!(v.outcome, Outcome::Win(Side::Team2));
        assert_eq!(v.decided_by, Decision::Surrender);
    }

    #[test]
    fn kickoff_victory_wins_with_zero_margin() {
        let m = MatchResult {
            team2_kickoff_victory: true,
            ..result(2, 0)
        };
        let v = decide(&m);
        assert_eq!(v.outcome, Outcome::Win(Side::Team2));
        assert_eq!(v.decided_by, Decision::Kickoff);
        assert_eq!(v.effective_margin, 0);
    }

    #[test]
    fn double_surrender_is_double_forfeit() {
        let m = MatchResult {
            team1_surrendered: true,
            team2_surrendered: true,
            ..result(1, 1)
        };
        let v = decide(&m);
        assert_eq!(v.outcome, Outcome::DoubleForfeit);
        assert_eq!(v.result_for(Side::Team1), SideResult::Lost);
        assert_eq!(v.result_for(Side::Team2), SideResult::Lost);
    }

    // -- Scoring --

    #[test]
    fn standard_points() {
        let r = rule("win=3;draw=1;loss=0");
        assert_eq!(score(&result(2, 1), &r), (3, 0));
        assert_eq!(score(&result(1, 1), &r), (1, 1));
        assert_eq!(score(&result(0, 4), &r), (0, 3));
    }

    #[test]
    fn surrendering_side_loses_even_when_ahead() {
        let r = rule("win=3;draw=1;loss=0");
        let m = MatchResult {
            team1_surrendered: true,
            ..result(5, 2)
        };
        assert_eq!(score(&m, &r), (0, 3));
    }

    #[test]
    fn surrender_clause_replaces_loss_points() {
        let r = rule("win=3;loss=1;surrender=-1");
        let m = MatchResult {
            team2_surrendered: true,
            ..result(1, 0)
        };
        assert_eq!(score(&m, &r), (3, -1));
    }

    #[test]
    fn touchdown_difference_clause() {
        let r = rule("win=3;td_diff=1/td");
        assert_eq!(score(&result(3, 1), &r), (5, -2));
    }

    #[test]
    fn kickoff_victory_ignores_margin_clauses() {
        let r = rule("win=3;td_diff=1/td;big_win=2@1");
        let m = MatchResult {
            team1_kickoff_victory: true,
            ..result(0, 2)
        };
        assert_eq!(score(&m, &r), (3, 0));
    }

    #[test]
    fn per_touchdown_and_casualty_clauses() {
        let r = rule("played=1;td=2/td;cas=1/cas");
        let m = MatchResult {
            team1_casualties: 3,
            ..result(2, 1)
        };
        assert_eq!(score(&m, &r), (1 + 4 + 3, 1 + 2));
    }

    #[test]
    fn big_win_requires_margin() {
        let r = rule("win=3;big_win=1@2");
        assert_eq!(score(&result(2, 1), &r), (3, 0));
        assert_eq!(score(&result(3, 1), &r), (4, 0));
    }

    #[test]
    fn point_modifications_added_last_per_side() {
        let r = rule("win=3;draw=1");
        let m = MatchResult {
            team1_point_modification: -2,
            team2_point_modification: 1,
            ..result(1, 1)
        };
        assert_eq!(score(&m, &r), (-1, 2));
    }

    #[test]
    fn exclusions_filter_matches() {
        let r = rule("win=3;exclude=playoff");
        let playoff = MatchResult {
            is_playoff: true,
            ..result(1, 0)
        };
        let tournament = MatchResult {
            is_tournament: true,
            ..result(1, 0)
        };
        assert!(!r.counts(&playoff));
        assert!(r.counts(&tournament));
        assert!(r.counts(&result(1, 0)));
    }

    #[test]
    fn scoring_is_deterministic() {
        let r = rule("win=3;draw=1;td_diff=1;cas=1");
        let m = MatchResult {
            team2_casualties: 2,
            ..result(2, 2)
        };
        assert_eq!(score(&m, &r), score(&m, &r));
    }
}
