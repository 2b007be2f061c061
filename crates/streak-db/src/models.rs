//! Database row types. These map directly to SQLite rows.
//! Distinct from streak-types models: rows carry the password hash and keep
//! timestamps as the raw SQLite text.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use tracing::warn;

use streak_types::models::{Account, Challenge, ChallengeState, ChallengeStatus};

#[derive(Debug, Clone)]
pub struct AccountRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
    pub points: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: String,
}

/// Input for [`crate::Database::create_account`]. `password_hash` is already
/// hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChallengeRow {
    pub id: i64,
    pub description: String,
    pub points: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct StatusRow {
    pub account_id: i64,
    pub challenge_id: i64,
    pub state: ChallengeState,
    pub accepted_at: String,
    pub resolved_at: Option<String>,
}

pub(crate) const ACCOUNT_COLUMNS: &str =
    "a.id, a.email, a.username, a.password, a.points, a.first_name, a.last_name, a.created_at";

pub(crate) const CHALLENGE_COLUMNS: &str = "c.id, c.description, c.points, c.created_at";

pub(crate) const STATUS_COLUMNS: &str =
    "s.account_id, s.challenge_id, s.state, s.accepted_at, s.resolved_at";

impl AccountRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            password: row.get(3)?,
            points: row.get(4)?,
            first_name: row.get(5)?,
            last_name: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl ChallengeRow {
    /// Reads the four challenge columns starting at `offset`.
    pub(crate) fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            description: row.get(offset + 1)?,
            points: row.get(offset + 2)?,
            created_at: row.get(offset + 3)?,
        })
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }
}

impl StatusRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let state: String = row.get(2)?;
        let state = state.parse::<ChallengeState>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            account_id: row.get(0)?,
            challenge_id: row.get(1)?,
            state,
            accepted_at: row.get(3)?,
            resolved_at: row.get(4)?,
        })
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let created_at = parse_timestamp(&row.created_at, "account", row.id);
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            points: row.points,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at,
        }
    }
}

impl From<ChallengeRow> for Challenge {
    fn from(row: ChallengeRow) -> Self {
        let created_at = parse_timestamp(&row.created_at, "challenge", row.id);
        Self {
            id: row.id,
            description: row.description,
            points: row.points,
            created_at,
        }
    }
}

impl From<StatusRow> for ChallengeStatus {
    fn from(row: StatusRow) -> Self {
        Self {
            account_id: row.account_id,
            challenge_id: row.challenge_id,
            state: row.state,
            accepted_at: parse_timestamp(&row.accepted_at, "status", row.challenge_id),
            resolved_at: row
                .resolved_at
                .as_deref()
                .map(|ts| parse_timestamp(ts, "status", row.challenge_id)),
        }
    }
}

/// SQLite stores `datetime('now')` as "YYYY-MM-DD HH:MM:SS" without a zone.
/// Accepts RFC 3339 too, and falls back to the epoch for corrupt values.
pub fn parse_timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_datetime_text() {
        let ts = parse_timestamp("2024-05-01 12:30:00", "account", 1);
        assert_eq!(ts.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn corrupt_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("yesterday", "account", 1), DateTime::<Utc>::default());
    }
}
