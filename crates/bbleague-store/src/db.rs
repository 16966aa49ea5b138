// SQLite persistence for leagues, seasons, teams, matches and casualty
// statistics.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use bbleague_core::model::{
    CasualtyStatistic, Coach, CoachId, League, LeagueId, MatchId, MatchResult, Race, RaceId,
    Season, SeasonId, Team, TeamId, generate_team_short_name,
};
use bbleague_core::repository::{
    parse_season_rule, MatchWriter, RepositoryError, SeasonRepository, SeasonSnapshot,
};
use bbleague_core::scoring::ScoringRule;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::bootstrap::{ImportPlan, ImportSummary};

/// SQLite-backed league store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leagues (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                short_name  TEXT NOT NULL UNIQUE,
                is_selected INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                league_id    INTEGER NOT NULL REFERENCES leagues(id),
                name         TEXT NOT NULL,
                short_name   TEXT NOT NULL,
                is_selected  INTEGER NOT NULL DEFAULT 0,
                scoring_rule TEXT NOT NULL,
                UNIQUE(league_id, short_name)
            );

            CREATE TABLE IF NOT EXISTS races (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS coaches (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name   TEXT NOT NULL,
                last_name    TEXT NOT NULL,
                display_name TEXT NOT NULL,
                UNIQUE(first_name, last_name, display_name)
            );

            CREATE TABLE IF NOT EXISTS teams (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id       INTEGER NOT NULL REFERENCES seasons(id),
                name            TEXT NOT NULL,
                short_name      TEXT NOT NULL,
                race_id         INTEGER NOT NULL REFERENCES races(id),
                coach_id        INTEGER NOT NULL REFERENCES coaches(id),
                is_disqualified INTEGER NOT NULL DEFAULT 0,
                UNIQUE(season_id, name)
            );

            CREATE TABLE IF NOT EXISTS matches (
                id                       INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id                INTEGER NOT NULL REFERENCES seasons(id),
                match_number             INTEGER NOT NULL,
                team1_id                 INTEGER NOT NULL REFERENCES teams(id),
                team2_id                 INTEGER NOT NULL REFERENCES teams(id),
                team1_touchdowns         INTEGER NOT NULL,
                team2_touchdowns         INTEGER NOT NULL,
                team1_point_modification INTEGER NOT NULL DEFAULT 0,
                team2_point_modification INTEGER NOT NULL DEFAULT 0,
                team1_surrendered        INTEGER NOT NULL DEFAULT 0,
                team2_surrendered        INTEGER NOT NULL DEFAULT 0,
                team1_kickoff_victory    INTEGER NOT NULL DEFAULT 0,
                team2_kickoff_victory    INTEGER NOT NULL DEFAULT 0,
                team1_casualties         INTEGER NOT NULL DEFAULT 0,
                team2_casualties         INTEGER NOT NULL DEFAULT 0,
                is_playoff               INTEGER NOT NULL DEFAULT 0,
                is_tournament            INTEGER NOT NULL DEFAULT 0,
                batch_id                 TEXT,
                created_at               TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(season_id, match_number)
            );

            CREATE TABLE IF NOT EXISTS casualty_statistics (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id  INTEGER NOT NULL REFERENCES seasons(id),
                team_id    INTEGER NOT NULL REFERENCES teams(id),
                casualties INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
            CREATE INDEX IF NOT EXISTS idx_matches_batch ON matches(batch_id);
            CREATE INDEX IF NOT EXISTS idx_teams_season ON teams(season_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Leagues and seasons
    // ------------------------------------------------------------------

    pub fn create_league(&self, name: &str, short_name: &str, is_selected: bool) -> Result<LeagueId> {
        insert_league(&self.conn(), name, short_name, is_selected)
    }

    /// Create a season. The scoring rule is parsed first; a malformed rule
    /// is returned as a [`bbleague_core::scoring::ConfigError`] and nothing
    /// is inserted.
    pub fn create_season(
        &self,
        league_id: LeagueId,
        name: &str,
        short_name: &str,
        is_selected: bool,
        scoring_rule: &str,
    ) -> Result<SeasonId> {
        let rule = ScoringRule::parse(scoring_rule)
            .with_context(|| format!("invalid scoring rule for season `{short_name}`"))?;
        insert_season(&self.conn(), league_id, name, short_name, is_selected, &rule)
    }

    pub fn league_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM leagues", [], |row| row.get(0))
            .context("failed to count leagues")?;
        Ok(count as usize)
    }

    pub fn list_leagues(&self) -> Result<Vec<League>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, short_name, is_selected FROM leagues ORDER BY id")
            .context("failed to prepare list_leagues query")?;
        let leagues = stmt
            .query_map([], |row| {
                Ok(League {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    short_name: row.get(2)?,
                    is_selected: row.get(3)?,
                })
            })
            .context("failed to query leagues")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map league rows")?;
        Ok(leagues)
    }

    /// Seasons of one league, or of every league when `league_id` is `None`.
    pub fn list_seasons(&self, league_id: Option<LeagueId>) -> Result<Vec<Season>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, league_id, name, short_name, is_selected, scoring_rule
                 FROM seasons WHERE ?1 IS NULL OR league_id = ?1 ORDER BY league_id, id",
            )
            .context("failed to prepare list_seasons query")?;
        let seasons = stmt
            .query_map(params![league_id], season_from_row)
            .context("failed to query seasons")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map season rows")?;
        Ok(seasons)
    }

    pub fn season(&self, season_id: SeasonId) -> Result<Option<Season>> {
        query_season(&self.conn(), season_id)
    }

    /// The selected season of the selected league, if any.
    pub fn selected_season(&self) -> Result<Option<Season>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT s.id, s.league_id, s.name, s.short_name, s.is_selected, s.scoring_rule
             FROM seasons s JOIN leagues l ON l.id = s.league_id
             WHERE l.is_selected = 1 AND s.is_selected = 1
             ORDER BY s.id LIMIT 1",
            [],
            season_from_row,
        )
        .optional()
        .context("failed to query selected season")
    }

    /// Make `season_id` the only selected season of its league, and its
    /// league the only selected league.
    pub fn select_season(&self, season_id: SeasonId) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let league_id: Option<LeagueId> = tx
            .query_row(
                "SELECT league_id FROM seasons WHERE id = ?1",
                params![season_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up season")?;
        let Some(league_id) = league_id else {
            bail!("season {season_id} not found");
        };
        tx.execute(
            "UPDATE seasons SET is_selected = (id = ?1) WHERE league_id = ?2",
            params![season_id, league_id],
        )
        .context("failed to update selected season")?;
        tx.execute(
            "UPDATE leagues SET is_selected = (id = ?1)",
            params![league_id],
        )
        .context("failed to update selected league")?;
        tx.commit().context("failed to commit select_season")?;
        info!(season_id, league_id, "selected season");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Races, coaches, teams
    // ------------------------------------------------------------------

    /// Insert a race, or return the id of the existing race with that name.
    pub fn upsert_race(&self, name: &str) -> Result<RaceId> {
        upsert_race(&self.conn(), name)
    }

    /// Return the coach with exactly these (trimmed) names, creating it when
    /// missing.
    pub fn get_or_create_coach(
        &self,
        first_name: &str,
        last_name: &str,
        display_name: &str,
    ) -> Result<CoachId> {
        upsert_coach(&self.conn(), first_name, last_name, display_name)
    }

    /// Create a team; its short name is derived from `name`.
    pub fn create_team(
        &self,
        season_id: SeasonId,
        name: &str,
        race_id: RaceId,
        coach_id: CoachId,
        is_disqualified: bool,
    ) -> Result<TeamId> {
        insert_team(&self.conn(), season_id, name, race_id, coach_id, is_disqualified)
    }

    pub fn set_team_disqualified(&self, team_id: TeamId, is_disqualified: bool) -> Result<()> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE teams SET is_disqualified = ?1 WHERE id = ?2",
                params![is_disqualified, team_id],
            )
            .context("failed to update team")?;
        if changed == 0 {
            bail!("team {team_id} not found");
        }
        Ok(())
    }

    pub fn teams(&self, season_id: SeasonId) -> Result<Vec<Team>> {
        query_teams(&self.conn(), season_id)
    }

    // ------------------------------------------------------------------
    // Matches and statistics
    // ------------------------------------------------------------------

    /// Commit a match result and return its id. A missing match number is
    /// assigned as the next one in the season.
    ///
    /// `batch_id` tags results submitted together (see
    /// [`Database::generate_batch_id`]).
    pub fn add_match(&self, result: &MatchResult, batch_id: Option<&str>) -> Result<MatchId> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let id = insert_match(&tx, result, batch_id)?;
        tx.commit().context("failed to commit match")?;
        Ok(id)
    }

    /// Delete one match. Corrections are a delete followed by a new result.
    pub fn delete_match(&self, match_id: MatchId) -> Result<()> {
        let conn = self.conn();
        let changed = conn
            .execute("DELETE FROM matches WHERE id = ?1", params![match_id])
            .context("failed to delete match")?;
        if changed == 0 {
            bail!("match {match_id} not found");
        }
        Ok(())
    }

    pub fn matches(&self, season_id: SeasonId) -> Result<Vec<MatchResult>> {
        query_matches(&self.conn(), season_id)
    }

    /// Matches committed under `batch_id`, in commit order.
    pub fn batch_matches(&self, batch_id: &str) -> Result<Vec<MatchResult>> {
        let conn = self.conn();
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE batch_id = ?1 ORDER BY id");
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare batch_matches query")?;
        let matches = stmt
            .query_map(params![batch_id], match_from_row)
            .context("failed to query batch matches")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map match rows")?;
        Ok(matches)
    }

    pub fn add_casualty_statistic(
        &self,
        season_id: SeasonId,
        team_id: TeamId,
        casualties: u32,
    ) -> Result<()> {
        insert_statistic(&self.conn(), season_id, team_id, casualties)
    }

    // ------------------------------------------------------------------
    // Batch ids and bulk import
    // ------------------------------------------------------------------

    /// Generate a new submission batch id from the current UTC time.
    ///
    /// Format: `batch_YYYYMMDD_HHMMSS_SSS` (e.g. `batch_20260228_143022_123`).
    pub fn generate_batch_id() -> String {
        let now = chrono::Utc::now();
        now.format("batch_%Y%m%d_%H%M%S_%3f").to_string()
    }

    /// A writer that tags every committed match with a fresh batch id.
    pub fn batch_writer(&self) -> BatchWriter<'_> {
        BatchWriter {
            db: self,
            batch_id: Self::generate_batch_id(),
        }
    }

    /// Insert a resolved import plan in a single transaction. Plan indexes
    /// are translated to the new row ids as rows are inserted.
    pub fn import_plan(&self, plan: &ImportPlan) -> Result<ImportSummary> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;

        let mut league_ids = Vec::with_capacity(plan.leagues.len());
        for league in &plan.leagues {
            league_ids.push(insert_league(
                &tx,
                &league.name,
                &league.short_name,
                league.is_selected,
            )?);
        }

        let mut season_ids = Vec::with_capacity(plan.seasons.len());
        for season in &plan.seasons {
            season_ids.push(insert_season(
                &tx,
                league_ids[season.league],
                &season.name,
                &season.short_name,
                season.is_selected,
                &season.rule,
            )?);
        }

        let mut race_ids = Vec::with_capacity(plan.races.len());
        for race in &plan.races {
            race_ids.push(upsert_race(&tx, race)?);
        }

        let mut coach_ids = Vec::with_capacity(plan.coaches.len());
        for coach in &plan.coaches {
            coach_ids.push(upsert_coach(
                &tx,
                &coach.first_name,
                &coach.last_name,
                &coach.display_name,
            )?);
        }

        let mut team_ids = Vec::with_capacity(plan.teams.len());
        for team in &plan.teams {
            team_ids.push(insert_team(
                &tx,
                season_ids[team.season],
                &team.name,
                race_ids[team.race],
                coach_ids[team.coach],
                team.is_disqualified,
            )?);
        }

        for planned in &plan.matches {
            let result = MatchResult {
                season_id: season_ids[planned.season],
                team1_id: team_ids[planned.team1],
                team2_id: team_ids[planned.team2],
                ..planned.result.clone()
            };
            insert_match(&tx, &result, None)?;
        }

        for stat in &plan.statistics {
            insert_statistic(
                &tx,
                season_ids[stat.season],
                team_ids[stat.team],
                stat.casualties,
            )?;
        }

        tx.commit().context("failed to commit import")?;

        let summary = ImportSummary {
            leagues: league_ids.len(),
            seasons: season_ids.len(),
            races: race_ids.len(),
            coaches: coach_ids.len(),
            teams: team_ids.len(),
            matches: plan.matches.len(),
            statistics: plan.statistics.len(),
        };
        info!(?summary, "imported league data");
        Ok(summary)
    }

    /// Load everything the aggregators need for one season under a single
    /// lock.
    fn load_snapshot(&self, season_id: SeasonId) -> Result<Option<(Season, SnapshotRows)>> {
        let conn = self.conn();
        let Some(season) = query_season(&conn, season_id)? else {
            return Ok(None);
        };
        let rows = SnapshotRows {
            teams: query_teams(&conn, season_id)?,
            coaches: query_coaches(&conn, season_id)?,
            races: query_races(&conn, season_id)?,
            matches: query_matches(&conn, season_id)?,
            casualty_statistics: query_statistics(&conn, season_id)?,
        };
        Ok(Some((season, rows)))
    }
}

struct SnapshotRows {
    teams: Vec<Team>,
    coaches: Vec<Coach>,
    races: Vec<Race>,
    matches: Vec<MatchResult>,
    casualty_statistics: Vec<CasualtyStatistic>,
}

// ---------------------------------------------------------------------------
// Repository seam
// ---------------------------------------------------------------------------

fn backend(e: anyhow::Error) -> RepositoryError {
    RepositoryError::Backend(e.into())
}

impl SeasonRepository for Database {
    fn load_season(&self, season_id: SeasonId) -> Result<SeasonSnapshot, RepositoryError> {
        let (season, rows) = self
            .load_snapshot(season_id)
            .map_err(backend)?
            .ok_or(RepositoryError::SeasonNotFound { season_id })?;
        let rule = parse_season_rule(season.id, &season.scoring_rule)?;
        debug!(
            season_id,
            teams = rows.teams.len(),
            matches = rows.matches.len(),
            "loaded season snapshot"
        );
        Ok(SeasonSnapshot {
            season,
            rule,
            teams: rows.teams,
            coaches: rows.coaches,
            races: rows.races,
            matches: rows.matches,
            casualty_statistics: rows.casualty_statistics,
        })
    }
}

impl MatchWriter for Database {
    fn append_match(&self, result: &MatchResult) -> Result<MatchId, RepositoryError> {
        self.add_match(result, None).map_err(backend)
    }
}

/// Match writer tagging every result with one batch id.
pub struct BatchWriter<'a> {
    db: &'a Database,
    batch_id: String,
}

impl BatchWriter<'_> {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

impl MatchWriter for BatchWriter<'_> {
    fn append_match(&self, result: &MatchResult) -> Result<MatchId, RepositoryError> {
        self.db
            .add_match(result, Some(&self.batch_id))
            .map_err(backend)
    }
}

// ---------------------------------------------------------------------------
// Row helpers (shared by single operations and the import transaction)
// ---------------------------------------------------------------------------

const MATCH_COLUMNS: &str = "id, season_id, match_number, team1_id, team2_id, \
     team1_touchdowns, team2_touchdowns, team1_point_modification, team2_point_modification, \
     team1_surrendered, team2_surrendered, team1_kickoff_victory, team2_kickoff_victory, \
     team1_casualties, team2_casualties, is_playoff, is_tournament";

fn season_from_row(row: &Row<'_>) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        league_id: row.get(1)?,
        name: row.get(2)?,
        short_name: row.get(3)?,
        is_selected: row.get(4)?,
        scoring_rule: row.get(5)?,
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        season_id: row.get(1)?,
        name: row.get(2)?,
        short_name: row.get(3)?,
        race_id: row.get(4)?,
        coach_id: row.get(5)?,
        is_disqualified: row.get(6)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchResult> {
    Ok(MatchResult {
        id: row.get(0)?,
        season_id: row.get(1)?,
        match_number: row.get(2)?,
        team1_id: row.get(3)?,
        team2_id: row.get(4)?,
        team1_touchdowns: row.get(5)?,
        team2_touchdowns: row.get(6)?,
        team1_point_modification: row.get(7)?,
        team2_point_modification: row.get(8)?,
        team1_surrendered: row.get(9)?,
        team2_surrendered: row.get(10)?,
        team1_kickoff_victory: row.get(11)?,
        team2_kickoff_victory: row.get(12)?,
        team1_casualties: row.get(13)?,
        team2_casualties: row.get(14)?,
        is_playoff: row.get(15)?,
        is_tournament: row.get(16)?,
    })
}

fn insert_league(conn: &Connection, name: &str, short_name: &str, is_selected: bool) -> Result<LeagueId> {
    conn.query_row(
        "INSERT INTO leagues (name, short_name, is_selected) VALUES (?1, ?2, ?3) RETURNING id",
        params![name.trim(), short_name.trim(), is_selected],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to insert league `{short_name}`"))
}

/// Seasons store the normalized rule text, so what is read back always
/// parses.
fn insert_season(
    conn: &Connection,
    league_id: LeagueId,
    name: &str,
    short_name: &str,
    is_selected: bool,
    rule: &ScoringRule,
) -> Result<SeasonId> {
    conn.query_row(
        "INSERT INTO seasons (league_id, name, short_name, is_selected, scoring_rule)
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
        params![
            league_id,
            name.trim(),
            short_name.trim(),
            is_selected,
            rule.to_string()
        ],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to insert season `{short_name}`"))
}

fn upsert_race(conn: &Connection, name: &str) -> Result<RaceId> {
    conn.query_row(
        "INSERT INTO races (name) VALUES (?1)
         ON CONFLICT(name) DO UPDATE SET name = excluded.name
         RETURNING id",
        params![name.trim()],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to upsert race `{name}`"))
}

fn upsert_coach(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    display_name: &str,
) -> Result<CoachId> {
    conn.query_row(
        "INSERT INTO coaches (first_name, last_name, display_name) VALUES (?1, ?2, ?3)
         ON CONFLICT(first_name, last_name, display_name) DO UPDATE SET
            display_name = excluded.display_name
         RETURNING id",
        params![first_name.trim(), last_name.trim(), display_name.trim()],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to upsert coach `{display_name}`"))
}

fn insert_team(
    conn: &Connection,
    season_id: SeasonId,
    name: &str,
    race_id: RaceId,
    coach_id: CoachId,
    is_disqualified: bool,
) -> Result<TeamId> {
    let name = name.trim();
    conn.query_row(
        "INSERT INTO teams (season_id, name, short_name, race_id, coach_id, is_disqualified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
        params![
            season_id,
            name,
            generate_team_short_name(name),
            race_id,
            coach_id,
            is_disqualified
        ],
        |row| row.get(0),
    )
    .with_context(|| format!("failed to insert team `{name}`"))
}

fn insert_match(conn: &Connection, m: &MatchResult, batch_id: Option<&str>) -> Result<MatchId> {
    m.validate(true)
        .with_context(|| format!("invalid match between teams {} and {}", m.team1_id, m.team2_id))?;

    let in_season: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM teams WHERE season_id = ?1 AND id IN (?2, ?3)",
            params![m.season_id, m.team1_id, m.team2_id],
            |row| row.get(0),
        )
        .context("failed to check match teams")?;
    if in_season != 2 {
        bail!(
            "teams {} and {} do not both belong to season {}",
            m.team1_id,
            m.team2_id,
            m.season_id
        );
    }

    let match_number: u32 = match m.match_number {
        Some(n) => n,
        None => conn
            .query_row(
                "SELECT COALESCE(MAX(match_number), 0) + 1 FROM matches WHERE season_id = ?1",
                params![m.season_id],
                |row| row.get(0),
            )
            .context("failed to assign match number")?,
    };

    let id: MatchId = conn
        .query_row(
            "INSERT INTO matches (
                season_id, match_number, team1_id, team2_id,
                team1_touchdowns, team2_touchdowns,
                team1_point_modification, team2_point_modification,
                team1_surrendered, team2_surrendered,
                team1_kickoff_victory, team2_kickoff_victory,
                team1_casualties, team2_casualties,
                is_playoff, is_tournament, batch_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             RETURNING id",
            params![
                m.season_id,
                match_number,
                m.team1_id,
                m.team2_id,
                m.team1_touchdowns,
                m.team2_touchdowns,
                m.team1_point_modification,
                m.team2_point_modification,
                m.team1_surrendered,
                m.team2_surrendered,
                m.team1_kickoff_victory,
                m.team2_kickoff_victory,
                m.team1_casualties,
                m.team2_casualties,
                m.is_playoff,
                m.is_tournament,
                batch_id,
            ],
            |row| row.get(0),
        )
        .context("failed to insert match")?;
    debug!(match_id = id, match_number, season_id = m.season_id, "committed match");
    Ok(id)
}

fn insert_statistic(
    conn: &Connection,
    season_id: SeasonId,
    team_id: TeamId,
    casualties: u32,
) -> Result<()> {
    conn.execute(
        "INSERT INTO casualty_statistics (season_id, team_id, casualties) VALUES (?1, ?2, ?3)",
        params![season_id, team_id, casualties],
    )
    .context("failed to insert casualty statistic")?;
    Ok(())
}

fn query_season(conn: &Connection, season_id: SeasonId) -> Result<Option<Season>> {
    conn.query_row(
        "SELECT id, league_id, name, short_name, is_selected, scoring_rule
         FROM seasons WHERE id = ?1",
        params![season_id],
        season_from_row,
    )
    .optional()
    .context("failed to query season")
}

fn query_teams(conn: &Connection, season_id: SeasonId) -> Result<Vec<Team>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, season_id, name, short_name, race_id, coach_id, is_disqualified
             FROM teams WHERE season_id = ?1 ORDER BY id",
        )
        .context("failed to prepare teams query")?;
    let teams = stmt
        .query_map(params![season_id], team_from_row)
        .context("failed to query teams")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map team rows")?;
    Ok(teams)
}

fn query_coaches(conn: &Connection, season_id: SeasonId) -> Result<Vec<Coach>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, first_name, last_name, display_name FROM coaches
             WHERE id IN (SELECT coach_id FROM teams WHERE season_id = ?1) ORDER BY id",
        )
        .context("failed to prepare coaches query")?;
    let coaches = stmt
        .query_map(params![season_id], |row| {
            Ok(Coach {
                id: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                display_name: row.get(3)?,
            })
        })
        .context("failed to query coaches")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map coach rows")?;
    Ok(coaches)
}

fn query_races(conn: &Connection, season_id: SeasonId) -> Result<Vec<Race>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name FROM races
             WHERE id IN (SELECT race_id FROM teams WHERE season_id = ?1) ORDER BY id",
        )
        .context("failed to prepare races query")?;
    let races = stmt
        .query_map(params![season_id], |row| {
            Ok(Race {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .context("failed to query races")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map race rows")?;
    Ok(races)
}

fn query_matches(conn: &Connection, season_id: SeasonId) -> Result<Vec<MatchResult>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE season_id = ?1 ORDER BY match_number, id"
    );
    let mut stmt = conn.prepare(&sql).context("failed to prepare matches query")?;
    let matches = stmt
        .query_map(params![season_id], match_from_row)
        .context("failed to query matches")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map match rows")?;
    Ok(matches)
}

fn query_statistics(conn: &Connection, season_id: SeasonId) -> Result<Vec<CasualtyStatistic>> {
    let mut stmt = conn
        .prepare(
            "SELECT season_id, team_id, casualties FROM casualty_statistics
             WHERE season_id = ?1 ORDER BY id",
        )
        .context("failed to prepare casualty statistics query")?;
    let stats = stmt
        .query_map(params![season_id], |row| {
            Ok(CasualtyStatistic {
                season_id: row.get(0)?,
                team_id: row.get(1)?,
                casualties: row.get(2)?,
            })
        })
        .context("failed to query casualty statistics")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map casualty statistic rows")?;
    Ok(stats)
}
