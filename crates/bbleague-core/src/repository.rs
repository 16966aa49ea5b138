// Storage seam: the read and write capabilities the core needs from whatever
// holds league data.

use thiserror::Error;

use crate::model::{CasualtyStatistic, Coach, MatchId, MatchResult, Race, Season, SeasonId, Team};
use crate::parser::SeasonContext;
use crate::scoring::{ConfigError, ScoringRule};

/// Everything the aggregators need for one season, materialized in memory.
///
/// Each query builds its own snapshot; nothing in the core holds on to one
/// between calls.
#[derive(Debug, Clone)]
pub struct SeasonSnapshot {
    pub season: Season,
    pub rule: ScoringRule,
    /// All teams of the season, disqualified ones included.
    pub teams: Vec<Team>,
    /// Coaches and races referenced by `teams`.
    pub coaches: Vec<Coach>,
    pub races: Vec<Race>,
    pub matches: Vec<MatchResult>,
    pub casualty_statistics: Vec<CasualtyStatistic>,
}

impl SeasonSnapshot {
    /// Name-resolution context for parsing result lines against this season.
    pub fn context(&self) -> SeasonContext<'_> {
        SeasonContext::new(self.season.id, &self.teams)
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("season {season_id} not found")]
    SeasonNotFound { season_id: SeasonId },

    #[error("season {season_id} has an invalid scoring rule: {source}")]
    InvalidRule {
        season_id: SeasonId,
        #[source]
        source: ConfigError,
    },

    #[error("storage error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Read access to a season's records.
pub trait SeasonRepository {
    fn load_season(&self, season_id: SeasonId) -> Result<SeasonSnapshot, RepositoryError>;
}

/// Write access for committing one parsed result.
pub trait MatchWriter {
    /// Persist `result` and return its new id.
    fn append_match(&self, result: &MatchResult) -> Result<MatchId, RepositoryError>;
}

impl<T: SeasonRepository + ?Sized> SeasonRepository for &T {
    fn load_season(&self, season_id: SeasonId) -> Result<SeasonSnapshot, RepositoryError> {
        (**self).load_season(season_id)
    }
}

impl<T: MatchWriter + ?Sized> MatchWriter for &T {
    fn append_match(&self, result: &MatchResult) -> Result<MatchId, RepositoryError> {
        (**self).append_match(result)
    }
}

/// Parse a stored rule for `season_id`, mapping a failure to
/// [`RepositoryError::InvalidRule`].
pub fn parse_season_rule(season_id: SeasonId, text: &str) -> Result<ScoringRule, RepositoryError> {
    ScoringRule::parse(text).map_err(|source| RepositoryError::InvalidRule { season_id, source })
}
