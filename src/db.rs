use crate::api::*;
use crate::stake::{from_cents, to_cents};
use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use log::debug;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

const MEMORY_DB: &str = "sqlite::memory:";

pub struct SQLite {
    connection: SqlitePool,
}
impl SQLite {
    pub async fn new(db_conn: Option<String>) -> Result<Self> {
        let url = db_conn.unwrap_or_else(|| MEMORY_DB.to_string());
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database url {}", url))?
            .busy_timeout(Duration::from_secs(5));
        let pool = if in_memory {
            // Every connection to an in-memory database is a database of its own
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            options = options
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new().max_connections(8)
        };
        let connection = pool
            .connect_with(options)
            .await
            .with_context(|| format!("couldn't open database {}", url))?;
        for statement in SCHEMA {
            connection
                .execute(*statement)
                .await
                .context("couldn't create schema")?;
        }
        debug!("Opened database {}", url);
        Ok(Self { connection })
    }
    pub fn pool(&self) -> &SqlitePool {
        &self.connection
    }
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Sqlite>, sqlx::Error> {
        self.connection.begin().await
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        name TEXT NOT NULL UNIQUE,\
        balance INTEGER NOT NULL CHECK (balance >= 0),\
        role TEXT NOT NULL DEFAULT 'user',\
        created_at INTEGER NOT NULL\
        )",
    "CREATE TABLE IF NOT EXISTS matches (\
        id TEXT PRIMARY KEY,\
        sport TEXT NOT NULL,\
        team_a TEXT NOT NULL,\
        team_b TEXT NOT NULL,\
        odds_a TEXT NOT NULL,\
        odds_b TEXT NOT NULL,\
        status TEXT NOT NULL,\
        winner TEXT,\
        settled INTEGER NOT NULL DEFAULT 0,\
        updated_at INTEGER NOT NULL\
        )",
    "CREATE TABLE IF NOT EXISTS odds (\
        match_id TEXT PRIMARY KEY,\
        sport TEXT NOT NULL,\
        team_a TEXT NOT NULL,\
        team_b TEXT NOT NULL,\
        odds_a TEXT NOT NULL,\
        odds_b TEXT NOT NULL,\
        status TEXT NOT NULL,\
        winner TEXT,\
        updated_at INTEGER NOT NULL\
        )",
    "CREATE TABLE IF NOT EXISTS wagers (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        match_id TEXT NOT NULL REFERENCES matches(id),\
        sport TEXT NOT NULL,\
        maker_id INTEGER NOT NULL REFERENCES accounts(id),\
        maker_team TEXT NOT NULL,\
        maker_stake INTEGER NOT NULL CHECK (maker_stake > 0),\
        maker_odds TEXT NOT NULL,\
        taker_id INTEGER REFERENCES accounts(id),\
        taker_team TEXT,\
        taker_stake INTEGER CHECK (taker_stake IS NULL OR taker_stake > 0),\
        taker_odds TEXT,\
        opposite_odds TEXT NOT NULL,\
        potential_win INTEGER NOT NULL,\
        status TEXT NOT NULL,\
        created_at INTEGER NOT NULL,\
        expires_at INTEGER NOT NULL,\
        matched_at INTEGER,\
        settled_at INTEGER,\
        settled_by TEXT,\
        winner_team TEXT,\
        commission INTEGER NOT NULL DEFAULT 0,\
        CHECK (status <> 'pending' OR taker_id IS NULL)\
        )",
    "CREATE INDEX IF NOT EXISTS wagers_match ON wagers (match_id, status)",
    "CREATE TABLE IF NOT EXISTS transactions (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        user_id INTEGER NOT NULL REFERENCES accounts(id),\
        amount INTEGER NOT NULL CHECK (amount > 0),\
        direction TEXT NOT NULL,\
        method TEXT NOT NULL,\
        status TEXT NOT NULL,\
        note TEXT NOT NULL DEFAULT '',\
        meta TEXT NOT NULL DEFAULT '{}',\
        created_at INTEGER NOT NULL\
        )",
    "CREATE INDEX IF NOT EXISTS transactions_user ON transactions (user_id, created_at)",
    "CREATE TABLE IF NOT EXISTS commissions (\
        id INTEGER PRIMARY KEY AUTOINCREMENT,\
        match_id TEXT NOT NULL,\
        user_id INTEGER NOT NULL REFERENCES accounts(id),\
        wager_id INTEGER NOT NULL,\
        amount INTEGER NOT NULL,\
        percent TEXT NOT NULL,\
        status TEXT NOT NULL DEFAULT 'pending',\
        created_at INTEGER NOT NULL\
        )",
];

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
pub fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("invalid timestamp {}", secs))
}
pub fn cents(amount: Decimal) -> Result<i64> {
    to_cents(amount).with_context(|| format!("{} can't be stored in cents", amount))
}
pub(crate) fn get_amount(row: &SqliteRow, column: &str) -> Result<Decimal> {
    Ok(from_cents(row.try_get(column)?))
}
pub(crate) fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal> {
    let text: String = row.try_get(column)?;
    Decimal::from_str(&text).with_context(|| format!("invalid decimal in {}: {}", column, text))
}
pub(crate) fn get_time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    timestamp(row.try_get(column)?)
}
pub(crate) fn get_opt_time(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(timestamp)
        .transpose()
}
pub(crate) fn get_parsed<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let text: String = row.try_get(column)?;
    T::from_str(&text)
}

// Matches

fn match_from_row(row: &SqliteRow) -> Result<Match> {
    Ok(Match {
        id: row.try_get("id")?,
        sport: row.try_get("sport")?,
        team_a: row.try_get("team_a")?,
        team_b: row.try_get("team_b")?,
        odds_a: get_decimal(row, "odds_a")?,
        odds_b: get_decimal(row, "odds_b")?,
        status: get_parsed(row, "status")?,
        winner: row.try_get("winner")?,
        settled: row.try_get("settled")?,
    })
}
pub async fn insert_match(conn: &mut SqliteConnection, game: &Match) -> Result<()> {
    query(
        "INSERT INTO matches (\
        id, sport, team_a, team_b, odds_a, odds_b, status, winner, settled, updated_at)\
        VALUES (?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(&game.id)
    .bind(&game.sport)
    .bind(&game.team_a)
    .bind(&game.team_b)
    .bind(game.odds_a.to_string())
    .bind(game.odds_b.to_string())
    .bind(game.status.to_string())
    .bind(&game.winner)
    .bind(game.settled)
    .bind(now().timestamp())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't insert match {}", game.id))?;
    Ok(())
}
pub async fn get_match(conn: &mut SqliteConnection, id: &str) -> Result<Option<Match>> {
    let row = query("SELECT * FROM matches WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get match {}", id))?;
    row.as_ref().map(match_from_row).transpose()
}
pub async fn save_match(conn: &mut SqliteConnection, game: &Match) -> Result<()> {
    query(
        "UPDATE matches SET \
        odds_a = ?, odds_b = ?, status = ?, winner = ?, settled = ?, updated_at = ? \
        WHERE id = ?",
    )
    .bind(game.odds_a.to_string())
    .bind(game.odds_b.to_string())
    .bind(game.status.to_string())
    .bind(&game.winner)
    .bind(game.settled)
    .bind(now().timestamp())
    .bind(&game.id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't update match {}", game.id))?;
    Ok(())
}
pub async fn list_matches(
    conn: &mut SqliteConnection,
    status: Option<MatchStatus>,
) -> Result<Vec<Match>> {
    let rows = match status {
        Some(status) => {
            query("SELECT * FROM matches WHERE status = ? ORDER BY id")
                .bind(status.to_string())
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            query("SELECT * FROM matches ORDER BY id")
                .fetch_all(&mut *conn)
                .await
        }
    }
    .context("couldn't list matches")?;
    rows.iter().map(match_from_row).collect()
}
pub async fn settleable_matches(conn: &mut SqliteConnection) -> Result<Vec<Match>> {
    let rows = query(
        "SELECT * FROM matches \
        WHERE status IN ('completed', 'finished') AND settled = 0 AND winner IS NOT NULL \
        ORDER BY updated_at",
    )
    .fetch_all(&mut *conn)
    .await
    .context("couldn't list settleable matches")?;
    rows.iter().map(match_from_row).collect()
}
pub async fn cancelled_matches(conn: &mut SqliteConnection) -> Result<Vec<Match>> {
    let rows = query("SELECT * FROM matches WHERE status = 'cancelled' AND settled = 0")
        .fetch_all(&mut *conn)
        .await
        .context("couldn't list cancelled matches")?;
    rows.iter().map(match_from_row).collect()
}

// Odds quotes

fn quote_from_row(row: &SqliteRow) -> Result<OddsQuote> {
    Ok(OddsQuote {
        match_id: row.try_get("match_id")?,
        sport: row.try_get("sport")?,
        team_a: row.try_get("team_a")?,
        team_b: row.try_get("team_b")?,
        odds_a: get_decimal(row, "odds_a")?,
        odds_b: get_decimal(row, "odds_b")?,
        status: get_parsed(row, "status")?,
        winner: row.try_get("winner")?,
    })
}
pub async fn upsert_odds(conn: &mut SqliteConnection, quote: &OddsQuote) -> Result<()> {
    query(
        "INSERT INTO odds (\
        match_id, sport, team_a, team_b, odds_a, odds_b, status, winner, updated_at)\
        VALUES (?,?,?,?,?,?,?,?,?) \
        ON CONFLICT (match_id) DO UPDATE SET \
        sport = excluded.sport, team_a = excluded.team_a, team_b = excluded.team_b,\
        odds_a = excluded.odds_a, odds_b = excluded.odds_b, status = excluded.status,\
        winner = excluded.winner, updated_at = excluded.updated_at",
    )
    .bind(&quote.match_id)
    .bind(&quote.sport)
    .bind(&quote.team_a)
    .bind(&quote.team_b)
    .bind(quote.odds_a.to_string())
    .bind(quote.odds_b.to_string())
    .bind(quote.status.to_string())
    .bind(&quote.winner)
    .bind(now().timestamp())
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't store odds for match {}", quote.match_id))?;
    Ok(())
}
pub async fn get_odds(conn: &mut SqliteConnection, match_id: &str) -> Result<Option<OddsQuote>> {
    let row = query("SELECT * FROM odds WHERE match_id = ?")
        .bind(match_id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get odds for match {}", match_id))?;
    row.as_ref().map(quote_from_row).transpose()
}

// Wagers

fn wager_from_row(row: &SqliteRow) -> Result<Wager> {
    let taker_stake: Option<i64> = row.try_get("taker_stake")?;
    let taker_odds: Option<String> = row.try_get("taker_odds")?;
    Ok(Wager {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        sport: row.try_get("sport")?,
        maker_id: row.try_get("maker_id")?,
        maker_team: row.try_get("maker_team")?,
        maker_stake: get_amount(row, "maker_stake")?,
        maker_odds: get_decimal(row, "maker_odds")?,
        taker_id: row.try_get("taker_id")?,
        taker_team: row.try_get("taker_team")?,
        taker_stake: taker_stake.map(from_cents),
        taker_odds: taker_odds
            .map(|odds| Decimal::from_str(&odds))
            .transpose()
            .context("invalid taker odds")?,
        opposite_odds: get_decimal(row, "opposite_odds")?,
        potential_win: get_amount(row, "potential_win")?,
        status: get_parsed(row, "status")?,
        created_at: get_time(row, "created_at")?,
        expires_at: get_time(row, "expires_at")?,
        matched_at: get_opt_time(row, "matched_at")?,
        settled_at: get_opt_time(row, "settled_at")?,
        settled_by: row.try_get("settled_by")?,
        winner_team: row.try_get("winner_team")?,
        commission: get_amount(row, "commission")?,
    })
}
/// Inserts a freshly placed wager. The id of `wager` is ignored.
pub async fn insert_wager(conn: &mut SqliteConnection, wager: &Wager) -> Result<RowId> {
    let id = query(
        "INSERT INTO wagers (\
        match_id, sport, maker_id, maker_team, maker_stake, maker_odds, opposite_odds,\
        potential_win, status, created_at, expires_at)\
        VALUES (?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(&wager.match_id)
    .bind(&wager.sport)
    .bind(wager.maker_id)
    .bind(&wager.maker_team)
    .bind(cents(wager.maker_stake)?)
    .bind(wager.maker_odds.to_string())
    .bind(wager.opposite_odds.to_string())
    .bind(cents(wager.potential_win)?)
    .bind(wager.status.to_string())
    .bind(wager.created_at.timestamp())
    .bind(wager.expires_at.timestamp())
    .execute(&mut *conn)
    .await
    .context("couldn't insert wager")?
    .last_insert_rowid();
    Ok(id)
}
pub async fn get_wager(conn: &mut SqliteConnection, id: RowId) -> Result<Option<Wager>> {
    let row = query("SELECT * FROM wagers WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("couldn't get wager {}", id))?;
    row.as_ref().map(wager_from_row).transpose()
}
/// Fills in the taker side. Returns false if the wager was no longer pending.
pub async fn fill_taker(conn: &mut SqliteConnection, wager: &Wager) -> Result<bool> {
    let taker_stake = wager.taker_stake.map(cents).transpose()?;
    let result = query(
        "UPDATE wagers SET \
        taker_id = ?, taker_team = ?, taker_stake = ?, taker_odds = ?, status = 'active', matched_at = ? \
        WHERE id = ? AND status = 'pending'",
    )
    .bind(wager.taker_id)
    .bind(&wager.taker_team)
    .bind(taker_stake)
    .bind(wager.taker_odds.map(|odds| odds.to_string()))
    .bind(wager.matched_at.map(|at| at.timestamp()))
    .bind(wager.id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't match wager {}", wager.id))?;
    Ok(result.rows_affected() == 1)
}
/// Rewrites the terms of a pending wager. Returns false if it was no longer pending.
pub async fn update_terms(conn: &mut SqliteConnection, wager: &Wager) -> Result<bool> {
    let result = query(
        "UPDATE wagers SET maker_stake = ?, maker_odds = ?, potential_win = ? \
        WHERE id = ? AND status = 'pending'",
    )
    .bind(cents(wager.maker_stake)?)
    .bind(wager.maker_odds.to_string())
    .bind(cents(wager.potential_win)?)
    .bind(wager.id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't edit wager {}", wager.id))?;
    Ok(result.rows_affected() == 1)
}
/// Claims an active wager for settlement.
///
/// Only one caller can ever see `true` for a given wager, which makes this the idempotence guard
/// for every settlement path.
pub async fn claim_settlement(conn: &mut SqliteConnection, wager: &Wager) -> Result<bool> {
    let result = query(
        "UPDATE wagers SET \
        status = ?, winner_team = ?, commission = ?, settled_at = ?, settled_by = ? \
        WHERE id = ? AND status = 'active'",
    )
    .bind(wager.status.to_string())
    .bind(&wager.winner_team)
    .bind(cents(wager.commission)?)
    .bind(wager.settled_at.map(|at| at.timestamp()))
    .bind(&wager.settled_by)
    .bind(wager.id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't settle wager {}", wager.id))?;
    Ok(result.rows_affected() == 1)
}
/// Marks a pending or active wager refunded. Returns false if it was already closed.
pub async fn mark_refunded(
    conn: &mut SqliteConnection,
    id: RowId,
    at: DateTime<Utc>,
    by: &str,
) -> Result<bool> {
    let result = query(
        "UPDATE wagers SET status = 'refunded', settled_at = ?, settled_by = ? \
        WHERE id = ? AND status IN ('pending', 'active')",
    )
    .bind(at.timestamp())
    .bind(by)
    .bind(id)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("couldn't refund wager {}", id))?;
    Ok(result.rows_affected() == 1)
}
pub async fn delete_pending_wager(conn: &mut SqliteConnection, id: RowId) -> Result<bool> {
    let result = query("DELETE FROM wagers WHERE id = ? AND status = 'pending'")
        .bind(id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("couldn't delete wager {}", id))?;
    Ok(result.rows_affected() == 1)
}
pub async fn open_wagers(conn: &mut SqliteConnection) -> Result<Vec<Wager>> {
    let rows = query(
        "SELECT wagers.* FROM wagers JOIN matches ON matches.id = wagers.match_id \
        WHERE wagers.status = 'pending' AND matches.status = 'upcoming' \
        ORDER BY wagers.created_at DESC, wagers.id DESC",
    )
    .fetch_all(&mut *conn)
    .await
    .context("couldn't list open wagers")?;
    rows.iter().map(wager_from_row).collect()
}
pub async fn orphaned_wagers(conn: &mut SqliteConnection) -> Result<Vec<Wager>> {
    let rows = query(
        "SELECT wagers.* FROM wagers JOIN matches ON matches.id = wagers.match_id \
        WHERE wagers.status = 'pending' AND matches.status IN ('completed', 'finished') \
        ORDER BY wagers.id",
    )
    .fetch_all(&mut *conn)
    .await
    .context("couldn't list orphaned wagers")?;
    rows.iter().map(wager_from_row).collect()
}
pub async fn user_wagers(conn: &mut SqliteConnection, user: RowId) -> Result<Vec<Wager>> {
    let rows = query(
        "SELECT * FROM wagers WHERE maker_id = ? OR taker_id = ? \
        ORDER BY created_at DESC, id DESC",
    )
    .bind(user)
    .bind(user)
    .fetch_all(&mut *conn)
    .await
    .with_context(|| format!("couldn't list wagers of user {}", user))?;
    rows.iter().map(wager_from_row).collect()
}
pub async fn match_wagers(
    conn: &mut SqliteConnection,
    match_id: &str,
    status: Option<WagerStatus>,
) -> Result<Vec<Wager>> {
    let rows = match status {
        Some(status) => {
            query("SELECT * FROM wagers WHERE match_id = ? AND status = ? ORDER BY id")
                .bind(match_id)
                .bind(status.to_string())
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            query("SELECT * FROM wagers WHERE match_id = ? ORDER BY id")
                .bind(match_id)
                .fetch_all(&mut *conn)
                .await
        }
    }
    .with_context(|| format!("couldn't list wagers of match {}", match_id))?;
    rows.iter().map(wager_from_row).collect()
}

pub async fn list_wagers(
    conn: &mut SqliteConnection,
    status: Option<WagerStatus>,
    limit: u32,
) -> Result<Vec<Wager>> {
    let rows = match status {
        Some(status) => {
            query("SELECT * FROM wagers WHERE status = ? ORDER BY created_at DESC, id DESC LIMIT ?")
                .bind(status.to_string())
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
        }
        None => {
            query("SELECT * FROM wagers ORDER BY created_at DESC, id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&mut *conn)
                .await
        }
    }
    .context("couldn't list wagers")?;
    rows.iter().map(wager_from_row).collect()
}
