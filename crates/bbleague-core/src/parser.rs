// Shorthand match-result parser.
//
// Accepted form: `<team1> <td1>-<td2> <team2> [| playoff tournament]`.
// Either side may carry markers: `ff`/`forfeit` (surrender), `ko` (kickoff
// victory), `[+N]` (point modification) and `{N}` (casualties inflicted).

use thiserror::Error;

use crate::model::{InvalidMatch, MatchResult, SeasonId, Side, Team};

/// Pattern reported for lines that do not have the basic shape.
pub const SHORTHAND_PATTERN: &str = "<team1> <td1>-<td2> <team2>";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error: expected {pattern}, got `{text}`")]
    Syntax { pattern: String, text: String },

    #[error("unknown team `{name}`")]
    UnknownTeam { name: String },

    #[error("ambiguous team `{name}`: matches {}", candidates.join(", "))]
    AmbiguousTeam {
        name: String,
        candidates: Vec<String>,
    },
}

impl ParseError {
    fn syntax(pattern: impl Into<String>, text: impl Into<String>) -> Self {
        ParseError::Syntax {
            pattern: pattern.into(),
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Season context
// ---------------------------------------------------------------------------

/// The teams a line can refer to: every team of the active season,
/// disqualified ones included.
#[derive(Debug, Clone, Copy)]
pub struct SeasonContext<'a> {
    pub season_id: SeasonId,
    pub teams: &'a [Team],
}

impl<'a> SeasonContext<'a> {
    pub fn new(season_id: SeasonId, teams: &'a [Team]) -> Self {
        SeasonContext { season_id, teams }
    }

    /// Resolve a team name case-insensitively.
    ///
    /// Tiers are tried in order (full name, short name, full-name prefix) and
    /// the first tier with any hit decides; more than one hit there is
    /// ambiguous.
    pub fn resolve_team(&self, name: &str) -> Result<&'a Team, ParseError> {
        let wanted = normalize(name);
        let in_season = || self.teams.iter().filter(|t| t.season_id == self.season_id);

        let tiers: [Vec<&'a Team>; 3] = [
            in_season().filter(|t| normalize(&t.name) == wanted).collect(),
            in_season()
                .filter(|t| normalize(&t.short_name) == wanted)
                .collect(),
            in_season()
                .filter(|t| normalize(&t.name).starts_with(&wanted))
                .collect(),
        ];

        for hits in tiers {
            match hits.as_slice() {
                [] => continue,
                [team] => return Ok(team),
                many => {
                    let mut candidates: Vec<String> = many.iter().map(|t| t.name.clone()).collect();
                    candidates.sort();
                    return Err(ParseError::AmbiguousTeam {
                        name: name.trim().to_string(),
                        candidates,
                    });
                }
            }
        }
        Err(ParseError::UnknownTeam {
            name: name.trim().to_string(),
        })
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Markers and name collected from one side of the score.
#[derive(Debug, Default)]
struct SideTokens {
    name: String,
    surrendered: bool,
    kickoff_markers: u32,
    point_modification: i32,
    casualties: u32,
}

/// Parse one shorthand line into an unsaved [`MatchResult`].
pub fn parse(text: &str, ctx: &SeasonContext<'_>) -> Result<MatchResult, ParseError> {
    let line = text.trim();
    if line.is_empty() {
        return Err(ParseError::syntax(SHORTHAND_PATTERN, text));
    }

    let (body, tags) = match line.split_once('|') {
        Some((body, tags)) => (body, Some(tags)),
        None => (line, None),
    };

    let (mut is_playoff, mut is_tournament) = (false, false);
    for tag in tags.into_iter().flat_map(str::split_whitespace) {
        match tag.to_lowercase().as_str() {
            "playoff" => is_playoff = true,
            "tournament" => is_tournament = true,
            _ => return Err(ParseError::syntax("`| playoff` or `| tournament`", tag)),
        }
    }

    let Some(score) = find_score(body)? else {
        return Err(ParseError::syntax(SHORTHAND_PATTERN, line));
    };

    let left = parse_side(&body[..score.start])?;
    let right = parse_side(&body[score.end..])?;

    if left.name.is_empty() || right.name.is_empty() {
        return Err(ParseError::syntax(
            "a team name on both sides of the score",
            line,
        ));
    }
    if left.kickoff_markers + right.kickoff_markers > 1 {
        return Err(ParseError::syntax("at most one `ko` marker", line));
    }

    let mut result = MatchResult {
        team1_point_modification: left.point_modification,
        team2_point_modification: right.point_modification,
        team1_surrendered: left.surrendered,
        team2_surrendered: right.surrendered,
        team1_kickoff_victory: left.kickoff_markers == 1,
        team2_kickoff_victory: right.kickoff_markers == 1,
        team1_casualties: left.casualties,
        team2_casualties: right.casualties,
        is_playoff,
        is_tournament,
        ..MatchResult::new(ctx.season_id, 0, score.td1, score.td2, 0)
    };
    // Flag conflicts are syntax problems; report them before touching names.
    if let Err(e @ (InvalidMatch::BothSurrendered | InvalidMatch::SurrenderAndKickoff(_))) =
        flag_check(&result)
    {
        return Err(ParseError::syntax(e.to_string(), line));
    }

    result.team1_id = ctx.resolve_team(&left.name)?.id;
    result.team2_id = ctx.resolve_team(&right.name)?.id;

    result
        .validate(false)
        .map_err(|e| ParseError::syntax(e.to_string(), line))?;
    Ok(result)
}

/// Flag-only subset of [`MatchResult::validate`], usable before team ids are
/// known.
fn flag_check(m: &MatchResult) -> Result<(), InvalidMatch> {
    MatchResult {
        team1_id: 1,
        team2_id: 2,
        ..m.clone()
    }
    .validate(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScoreSpan {
    start: usize,
    end: usize,
    td1: u32,
    td2: u32,
}

/// Locate the first `<digits> - <digits>` (or `:`) group that stands as its
/// own token(s). Offsets are byte positions of ASCII characters, so slicing
/// at them is always valid. A group whose numbers do not fit a touchdown
/// count is an error rather than a miss.
fn find_score(body: &str) -> Result<Option<ScoreSpan>, ParseError> {
    let bytes = body.as_bytes();
    let digits_from = |mut i: usize| {
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        (start, i)
    };
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        i
    };

    for start in 0..bytes.len() {
        if !bytes[start].is_ascii_digit() {
            continue;
        }
        if start > 0 && !bytes[start - 1].is_ascii_whitespace() {
            continue;
        }
        let (_, first_end) = digits_from(start);
        let sep = skip_ws(first_end);
        if sep >= bytes.len() || !matches!(bytes[sep], b'-' | b':') {
            continue;
        }
        let (second_start, end) = digits_from(skip_ws(sep + 1));
        if second_start == end {
            continue;
        }
        if end < bytes.len() && !bytes[end].is_ascii_whitespace() {
            continue;
        }
        let touchdowns = |digits: &str| {
            digits
                .parse::<u32>()
                .map_err(|_| ParseError::syntax("a touchdown count within range", digits))
        };
        let td1 = touchdowns(&body[start..first_end])?;
        let td2 = touchdowns(&body[second_start..end])?;
        return Ok(Some(ScoreSpan {
            start,
            end,
            td1,
            td2,
        }));
    }
    Ok(None)
}

fn parse_side(segment: &str) -> Result<SideTokens, ParseError> {
    let mut side = SideTokens::default();
    let mut words: Vec<&str> = Vec::new();

    for token in segment.split_whitespace() {
        let lower = token.to_lowercase();
        match lower.as_str() {
            "ff" | "forfeit" => side.surrendered = true,
            "ko" => side.kickoff_markers += 1,
            _ if token.starts_with('[') && token.ends_with(']') && token.len() >= 2 => {
                let inner = &token[1..token.len() - 1];
                let value = inner
                    .parse::<i32>()
                    .map_err(|_| ParseError::syntax("a point modification like `[+1]`", token))?;
                side.point_modification = side
                    .point_modification
                    .checked_add(value)
                    .ok_or_else(|| ParseError::syntax("a point modification within range", token))?;
            }
            _ if token.starts_with('{') && token.ends_with('}') && token.len() >= 2 => {
                let inner = &token[1..token.len() - 1];
                let value = inner
                    .parse::<u32>()
                    .map_err(|_| ParseError::syntax("a casualty count like `{2}`", token))?;
                side.casualties = side
                    .casualties
                    .checked_add(value)
                    .ok_or_else(|| ParseError::syntax("a casualty count within range", token))?;
            }
            _ => words.push(token),
        }
    }
    side.name = words.join(" ");
    Ok(side)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SEASON: SeasonId = 7;

    fn team(id: i64, name: &str, short_name: &str) -> Team {
        Team {
            id,
            season_id: SEASON,
            name: name.to_string(),
            short_name: short_name.to_string(),
            race_id: 1,
            coach_id: 1,
            is_disqualified: false,
        }
    }

    fn teams() -> Vec<Team> {
        vec![
            team(1, "Orcs", "ORC"),
            team(2, "Humans", "HUM"),
            team(3, "Reikland Reavers", "RR"),
            team(4, "Reikland Rovers", "RRO"),
            Team {
                season_id: SEASON + 1,
                ..team(5, "Unicorns", "UNI")
            },
        ]
    }

    #[test]
    fn parses_plain_line() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Orcs 2-1 Humans", &ctx).unwrap();
        assert_eq!(m.season_id, SEASON);
        assert_eq!(m.team1_id, 1);
        assert_eq!(m.team2_id, 2);
        assert_eq!(m.team1_touchdowns, 2);
        assert_eq!(m.team2_touchdowns, 1);
        assert!(!m.team1_surrendered && !m.team2_surrendered);
        assert!(!m.team1_kickoff_victory && !m.team2_kickoff_victory);
        assert_eq!(m.id, None);
        assert_eq!(m.match_number, None);
    }

    #[test]
    fn tolerates_whitespace_and_colon() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("   orcs   3 :  0   HUMANS  ", &ctx).unwrap();
        assert_eq!((m.team1_id, m.team2_id), (1, 2));
        assert_eq!((m.team1_touchdowns, m.team2_touchdowns), (3, 0));
    }

    #[test]
    fn multi_word_names_and_short_names() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Reikland Reavers 1-1 hum", &ctx).unwrap();
        assert_eq!((m.team1_id, m.team2_id), (3, 2));
        let m = parse("RR 0-0 RRO", &ctx).unwrap();
        assert_eq!((m.team1_id, m.team2_id), (3, 4));
    }

    #[test]
    fn prefix_resolution() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Hum 1-0 Orc", &ctx).unwrap();
        assert_eq!((m.team1_id, m.team2_id), (2, 1));
    }

    #[test]
    fn ambiguous_prefix_is_reported() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let err = parse("Reikland 1-0 Orcs", &ctx).unwrap_err();
        assert_eq!(
            err,
            ParseError::AmbiguousTeam {
                name: "Reikland".into(),
                candidates: vec!["Reikland Reavers".into(), "Reikland Rovers".into()],
            }
        );
    }

    #[test]
    fn unknown_team_is_reported() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let err = parse("Orcs 2-1 Unicorns", &ctx).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownTeam {
                name: "Unicorns".into()
            }
        );
    }

    #[test]
    fn empty_input_is_syntax_error() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(parse("", &ctx), Err(ParseError::Syntax { .. })));
        assert!(matches!(parse("  \t ", &ctx), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn garbage_is_syntax_error() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let err = parse("garbage text", &ctx).unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                pattern: SHORTHAND_PATTERN.into(),
                text: "garbage text".into()
            }
        );
    }

    #[test]
    fn negative_or_fractional_touchdowns_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(
            parse("Orcs -1-2 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse("Orcs 1-2.5 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn missing_team_name_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(
            parse("2-1 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse("Orcs 2-1 ff", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn surrender_and_kickoff_markers() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Orcs ff 2-1 Humans", &ctx).unwrap();
        assert!(m.team1_surrendered);
        assert!(!m.team2_surrendered);

        let m = parse("Orcs 0-0 Humans KO", &ctx).unwrap();
        assert!(m.team2_kickoff_victory);
        assert!(!m.team1_kickoff_victory);

        let m = parse("Orcs 0-3 forfeit Humans", &ctx).unwrap();
        assert!(m.team2_surrendered);
    }

    #[test]
    fn two_kickoff_markers_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(
            parse("Orcs ko 0-0 Humans ko", &ctx),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse("Orcs ko ko 0-0 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn conflicting_flags_rejected_before_resolution() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        // Unknown names would otherwise be reported first.
        assert!(matches!(
            parse("Nobody ff 1-0 Noone ff", &ctx),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse("Nobody ff ko 1-0 Noone", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn point_modifications_and_casualties() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Orcs [+2] {3} 1-1 Humans [-1] [-1] {1}", &ctx).unwrap();
        assert_eq!(m.team1_point_modification, 2);
        assert_eq!(m.team2_point_modification, -2);
        assert_eq!(m.team1_casualties, 3);
        assert_eq!(m.team2_casualties, 1);
    }

    #[test]
    fn malformed_markers_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(
            parse("Orcs [x] 1-1 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
        assert!(matches!(
            parse("Orcs {-1} 1-1 Humans", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn tags_after_pipe() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Orcs 1-0 Humans | playoff", &ctx).unwrap();
        assert!(m.is_playoff);
        assert!(!m.is_tournament);
        let m = parse("Orcs 1-0 Humans | Tournament playoff", &ctx).unwrap();
        assert!(m.is_playoff && m.is_tournament);
        assert!(matches!(
            parse("Orcs 1-0 Humans | friendly", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn same_team_on_both_sides_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert!(matches!(
            parse("Orcs 1-0 ORC", &ctx),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn digits_inside_team_name_do_not_confuse_score() {
        let mut teams = teams();
        teams.push(team(6, "Team 2", "T2"));
        let ctx = SeasonContext::new(SEASON, &teams);
        let m = parse("Team 2 3-1 Orcs", &ctx).unwrap();
        assert_eq!((m.team1_id, m.team2_id), (6, 1));
        assert_eq!((m.team1_touchdowns, m.team2_touchdowns), (3, 1));
    }

    #[test]
    fn find_score_spans() {
        assert_eq!(
            find_score("A 2-1 B"),
            Ok(Some(ScoreSpan {
                start: 2,
                end: 5,
                td1: 2,
                td2: 1
            }))
        );
        assert_eq!(
            find_score("A 2 - 10 B").map(|s| s.map(|s| (s.td1, s.td2))),
            Ok(Some((2, 10)))
        );
        assert_eq!(find_score("A2-1 B"), Ok(None));
        assert_eq!(find_score("A 2-1B"), Ok(None));
        assert_eq!(find_score("no score"), Ok(None));
    }

    #[test]
    fn oversized_touchdowns_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        let err = parse("Orcs 4294967296-0 Humans", &ctx).unwrap_err();
        assert_eq!(
            err,
            ParseError::Syntax {
                pattern: "a touchdown count within range".into(),
                text: "4294967296".into()
            }
        );
        let m = parse("Orcs 4294967295-0 Humans", &ctx).unwrap();
        assert_eq!(m.team1_touchdowns, u32::MAX);
    }

    #[test]
    fn overflowing_marker_sums_rejected() {
        let teams = teams();
        let ctx = SeasonContext::new(SEASON, &teams);
        assert_eq!(
            parse("Orcs [2147483647] [1] 1-0 Humans", &ctx).unwrap_err(),
            ParseError::Syntax {
                pattern: "a point modification within range".into(),
                text: "[1]".into()
            }
        );
        assert_eq!(
            parse("Orcs 1-0 Humans [-2147483648] [-1]", &ctx).unwrap_err(),
            ParseError::Syntax {
                pattern: "a point modification within range".into(),
                text: "[-1]".into()
            }
        );
        assert_eq!(
            parse("Orcs {4294967295} {1} 1-0 Humans", &ctx).unwrap_err(),
            ParseError::Syntax {
                pattern: "a casualty count within range".into(),
                text: "{1}".into()
            }
        );
        let m = parse("Orcs [2147483647] {4294967295} 1-0 Humans", &ctx).unwrap();
        assert_eq!(m.team1_point_modification, i32::MAX);
        assert_eq!(m.team1_casualties, u32::MAX);
    }
}
