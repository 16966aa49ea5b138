// Batch submission of shorthand result lines.
//
// Every line is parsed and committed on its own; a failing line is reported
// in its status entry and never stops the lines after it.

use serde::Serialize;
use tracing::{info, warn};

use crate::model::MatchId;
use crate::parser::{self, ParseError, SeasonContext};
use crate::repository::MatchWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOutcome {
    Success,
    SyntaxError,
    UnknownTeam,
    AmbiguousTeam,
    PersistenceError,
}

impl LineOutcome {
    pub fn is_success(self) -> bool {
        self == LineOutcome::Success
    }
}

impl From<&ParseError> for LineOutcome {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::Syntax { .. } => LineOutcome::SyntaxError,
            ParseError::UnknownTeam { .. } => LineOutcome::UnknownTeam,
            ParseError::AmbiguousTeam { .. } => LineOutcome::AmbiguousTeam,
        }
    }
}

/// Status of one submitted line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineStatus {
    pub input_text: String,
    pub outcome: LineOutcome,
    /// Human-readable message; empty on success.
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
}

/// Parse and commit each line in order, returning one status per line.
pub fn submit_batch<S, W>(lines: &[S], ctx: &SeasonContext<'_>, writer: &W) -> Vec<LineStatus>
where
    S: AsRef<str>,
    W: MatchWriter + ?Sized,
{
    let statuses: Vec<LineStatus> = lines
        .iter()
        .map(|line| submit_line(line.as_ref(), ctx, writer))
        .collect();

    let committed = statuses.iter().filter(|s| s.outcome.is_success()).count();
    info!(
        season_id = ctx.season_id,
        lines = statuses.len(),
        committed,
        "processed result batch"
    );
    statuses
}

fn submit_line<W: MatchWriter + ?Sized>(
    line: &str,
    ctx: &SeasonContext<'_>,
    writer: &W,
) -> LineStatus {
    let result = match parser::parse(line, ctx) {
        Ok(result) => result,
        Err(e) => {
            warn!(line, error = %e, "rejected result line");
            return LineStatus {
                input_text: line.to_string(),
                outcome: LineOutcome::from(&e),
                detail: e.to_string(),
                match_id: None,
            };
        }
    };

    match writer.append_match(&result) {
        Ok(id) => LineStatus {
            input_text: line.to_string(),
            outcome: LineOutcome::Success,
            detail: String::new(),
            match_id: Some(id),
        },
        Err(e) => {
            warn!(line, error = %e, "failed to commit result line");
            LineStatus {
                input_text: line.to_string(),
                outcome: LineOutcome::PersistenceError,
                detail: e.to_string(),
                match_id: None,
            }
        }
    }
}
