// Query and submission entry points over an injected repository.

use thiserror::Error;
use tracing::debug;

use crate::casualties::{self, CasualtyRow};
use crate::model::{EntityKind, SeasonId};
use crate::repository::{MatchWriter, RepositoryError, SeasonRepository};
use crate::standings::{self, AggregationInvariantError, Standing};
use crate::submission::{submit_batch, LineStatus};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("inconsistent season data: {0}")]
    Aggregation(#[from] AggregationInvariantError),
}

/// League queries. Every call loads a fresh snapshot; nothing is cached.
pub struct LeagueService<R> {
    repo: R,
}

impl<R> LeagueService<R> {
    pub fn new(repo: R) -> Self {
        LeagueService { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }
}

impl<R: SeasonRepository> LeagueService<R> {
    pub fn standings(
        &self,
        kind: EntityKind,
        season_id: SeasonId,
    ) -> Result<Vec<Standing>, QueryError> {
        let snapshot = self.repo.load_season(season_id)?;
        debug!(
            season_id,
            %kind,
            matches = snapshot.matches.len(),
            "building standings"
        );
        Ok(standings::aggregate(kind, &snapshot)?)
    }

    pub fn team_standings(&self, season_id: SeasonId) -> Result<Vec<Standing>, QueryError> {
        self.standings(EntityKind::Team, season_id)
    }

    pub fn coach_standings(&self, season_id: SeasonId) -> Result<Vec<Standing>, QueryError> {
        self.standings(EntityKind::Coach, season_id)
    }

    pub fn race_standings(&self, season_id: SeasonId) -> Result<Vec<Standing>, QueryError> {
        self.standings(EntityKind::Race, season_id)
    }

    pub fn casualties(
        &self,
        kind: EntityKind,
        season_id: SeasonId,
    ) -> Result<Vec<CasualtyRow>, QueryError> {
        let snapshot = self.repo.load_season(season_id)?;
        Ok(casualties::aggregate(kind, &snapshot)?)
    }

    pub fn team_casualties(&self, season_id: SeasonId) -> Result<Vec<CasualtyRow>, QueryError> {
        self.casualties(EntityKind::Team, season_id)
    }

    pub fn coach_casualties(&self, season_id: SeasonId) -> Result<Vec<CasualtyRow>, QueryError> {
        self.casualties(EntityKind::Coach, season_id)
    }

    pub fn race_casualties(&self, season_id: SeasonId) -> Result<Vec<CasualtyRow>, QueryError> {
        self.casualties(EntityKind::Race, season_id)
    }

    /// Submit result lines against `season_id`, committing through `writer`
    /// instead of the repository itself (e.g. a writer that tags a batch).
    pub fn submit_with<S, W>(
        &self,
        season_id: SeasonId,
        lines: &[S],
        writer: &W,
    ) -> Result<Vec<LineStatus>, QueryError>
    where
        S: AsRef<str>,
        W: MatchWriter + ?Sized,
    {
        let snapshot = self.repo.load_season(season_id)?;
        Ok(submit_batch(lines, &snapshot.context(), writer))
    }
}

impl<R: SeasonRepository + MatchWriter> LeagueService<R> {
    /// Submit result lines against `season_id`.
    ///
    /// Only loading the season can fail as a whole; per-line problems are
    /// reported in the returned statuses.
    pub fn submit<S: AsRef<str>>(
        &self,
        season_id: SeasonId,
        lines: &[S],
    ) -> Result<Vec<LineStatus>, QueryError> {
        self.submit_with(season_id, lines, &self.repo)
    }
}
