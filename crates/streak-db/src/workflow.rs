use std::collections::HashSet;

use rand::Rng;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use streak_types::models::ChallengeState;

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{AccountRow, CHALLENGE_COLUMNS, ChallengeRow, STATUS_COLUMNS, StatusRow};
use crate::queries::{query_challenge, require_account};
use crate::selection::pick_available;

impl Database {
    /// Record that `account_id` took on `challenge_id`. A challenge can only
    /// be accepted once per account, whatever its outcome.
    pub fn accept_challenge(&self, account_id: i64, challenge_id: i64) -> Result<StatusRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_account(&tx, account_id)?;
            if query_challenge(&tx, challenge_id)?.is_none() {
                return Err(StoreError::NotFound("Challenge not found"));
            }
            if query_status(&tx, account_id, challenge_id)?.is_some() {
                return Err(StoreError::Conflict("Challenge already accepted.".into()));
            }

            tx.execute(
                "INSERT INTO challenge_statuses (account_id, challenge_id, state) VALUES (?1, ?2, ?3)",
                params![account_id, challenge_id, ChallengeState::Accepted.as_str()],
            )?;
            let status = query_status(&tx, account_id, challenge_id)?
                .ok_or(StoreError::NotFound("Challenge has not been accepted"))?;
            tx.commit()?;

            info!("Account {} accepted challenge {}", account_id, challenge_id);
            Ok(status)
        })
    }

    pub fn complete_challenge(&self, account_id: i64, challenge_id: i64) -> Result<AccountRow> {
        self.resolve_challenge(account_id, challenge_id, ChallengeState::Completed)
    }

    pub fn fail_challenge(&self, account_id: i64, challenge_id: i64) -> Result<AccountRow> {
        self.resolve_challenge(account_id, challenge_id, ChallengeState::Failed)
    }

    /// Move an accepted challenge to a terminal state and apply its points.
    /// The status write and the balance write commit together.
    fn resolve_challenge(
        &self,
        account_id: i64,
        challenge_id: i64,
        target: ChallengeState,
    ) -> Result<AccountRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let status = query_status(&tx, account_id, challenge_id)?
                .ok_or(StoreError::NotFound("Challenge has not been accepted"))?;
            let next = status.state.transition(target)?;

            let challenge = query_challenge(&tx, challenge_id)?
                .ok_or(StoreError::NotFound("Challenge not found"))?;
            let current = require_account(&tx, account_id)?;

            let delta = challenge
                .points
                .checked_mul(next.point_sign())
                .ok_or_else(points_out_of_range)?;
            let balance = current.points.checked_add(delta).ok_or_else(points_out_of_range)?;

            tx.execute(
                "UPDATE challenge_statuses
                 SET state = ?1, resolved_at = datetime('now')
                 WHERE account_id = ?2 AND challenge_id = ?3",
                params![next.as_str(), account_id, challenge_id],
            )?;
            tx.execute(
                "UPDATE accounts SET points = ?1 WHERE id = ?2",
                params![balance, account_id],
            )?;

            let account = require_account(&tx, account_id)?;
            tx.commit()?;

            info!(
                "Account {} {} challenge {} ({:+} points, balance {})",
                account_id, next, challenge_id, delta, account.points
            );
            Ok(account)
        })
    }

    /// Every challenge the account has taken on, newest first.
    pub fn account_challenges(&self, account_id: i64) -> Result<Vec<(StatusRow, ChallengeRow)>> {
        self.with_conn(|conn| {
            require_account(conn, account_id)?;
            let sql = format!(
                "SELECT {STATUS_COLUMNS}, {CHALLENGE_COLUMNS}
                 FROM challenge_statuses s
                 JOIN challenges c ON c.id = s.challenge_id
                 WHERE s.account_id = ?1
                 ORDER BY s.accepted_at DESC, s.challenge_id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([account_id], |row| {
                    Ok((StatusRow::from_row(row)?, ChallengeRow::from_row_at(row, 5)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// A random challenge worth between `min_points` and `max_points`
    /// (inclusive) that the account has never accepted.
    pub fn available_challenge(
        &self,
        account_id: i64,
        min_points: i64,
        max_points: i64,
    ) -> Result<Option<ChallengeRow>> {
        self.available_challenge_with(account_id, min_points, max_points, &mut rand::rng())
    }

    pub fn available_challenge_with<R>(
        &self,
        account_id: i64,
        min_points: i64,
        max_points: i64,
        rng: &mut R,
    ) -> Result<Option<ChallengeRow>>
    where
        R: Rng + ?Sized,
    {
        if min_points > max_points {
            return Err(StoreError::Invalid(format!(
                "min_points ({}) is greater than max_points ({})",
                min_points, max_points
            )));
        }

        let (candidates, taken) = self.with_conn(|conn| {
            require_account(conn, account_id)?;
            Ok((
                challenges_in_range(conn, min_points, max_points)?,
                accepted_ids(conn, account_id)?,
            ))
        })?;

        Ok(pick_available(&candidates, &taken, rng).cloned())
    }
}

fn points_out_of_range() -> StoreError {
    StoreError::Invalid("Point balance would be out of range".into())
}

fn query_status(conn: &Connection, account_id: i64, challenge_id: i64) -> Result<Option<StatusRow>> {
    let sql = format!(
        "SELECT {STATUS_COLUMNS} FROM challenge_statuses s
         WHERE s.account_id = ?1 AND s.challenge_id = ?2"
    );
    Ok(conn
        .query_row(&sql, params![account_id, challenge_id], StatusRow::from_row)
        .optional()?)
}

fn challenges_in_range(conn: &Connection, min_points: i64, max_points: i64) -> Result<Vec<ChallengeRow>> {
    let sql = format!(
        "SELECT {CHALLENGE_COLUMNS} FROM challenges c
         WHERE c.points BETWEEN ?1 AND ?2
         ORDER BY c.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![min_points, max_points], ChallengeRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn accepted_ids(conn: &Connection, account_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT challenge_id FROM challenge_statuses WHERE account_id = ?1")?;
    let ids = stmt
        .query_map([account_id], |row| row.get::<_, i64>(0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tests::new_account;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use streak_types::models::TransitionError;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let account = db.create_account(&new_account("alice")).unwrap();
        (db, account.id)
    }

    #[test]
    fn accept_creates_an_accepted_status() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();

        let status = db.accept_challenge(alice, run.id).unwrap();
        assert_eq!(status.state, ChallengeState::Accepted);
        assert!(status.resolved_at.is_none());
    }

    #[test]
    fn accepting_twice_is_rejected() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();

        db.accept_challenge(alice, run.id).unwrap();
        assert!(matches!(db.accept_challenge(alice, run.id), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn accept_requires_both_rows() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();

        assert!(matches!(db.accept_challenge(999, run.id), Err(StoreError::NotFound(_))));
        assert!(matches!(db.accept_challenge(alice, 999), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn complete_adds_points_and_fail_subtracts_them() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();
        let swim = db.create_challenge("Swim 1k", 12).unwrap();

        db.accept_challenge(alice, run.id).unwrap();
        db.accept_challenge(alice, swim.id).unwrap();

        let after_complete = db.complete_challenge(alice, run.id).unwrap();
        assert_eq!(after_complete.points, 30);

        let after_fail = db.fail_challenge(alice, swim.id).unwrap();
        assert_eq!(after_fail.points, 30 - 12);
    }

    #[test]
    fn opposite_outcome_is_rejected_and_leaves_points_alone() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();
        let swim = db.create_challenge("Swim 1k", 12).unwrap();

        db.accept_challenge(alice, run.id).unwrap();
        db.fail_challenge(alice, run.id).unwrap();
        match db.complete_challenge(alice, run.id) {
            Err(StoreError::Transition(TransitionError::CompleteAfterFail)) => {}
            other => panic!("expected CompleteAfterFail, got {other:?}"),
        }

        db.accept_challenge(alice, swim.id).unwrap();
        db.complete_challenge(alice, swim.id).unwrap();
        match db.fail_challenge(alice, swim.id) {
            Err(StoreError::Transition(TransitionError::FailAfterComplete)) => {}
            other => panic!("expected FailAfterComplete, got {other:?}"),
        }

        assert_eq!(db.get_account(alice).unwrap().unwrap().points, -30 + 12);
    }

    #[test]
    fn completing_twice_does_not_double_count() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();

        db.accept_challenge(alice, run.id).unwrap();
        db.complete_challenge(alice, run.id).unwrap();
        assert!(matches!(
            db.complete_challenge(alice, run.id),
            Err(StoreError::Transition(TransitionError::AlreadyResolved(ChallengeState::Completed)))
        ));
        assert_eq!(db.get_account(alice).unwrap().unwrap().points, 30);
    }

    fn insert_raw_challenge(db: &Database, description: &str, points: i64) -> i64 {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO challenges (description, points) VALUES (?1, ?2)",
                params![description, points],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .unwrap()
    }

    #[test]
    fn failing_a_minimum_value_challenge_is_rejected_without_poisoning() {
        let (db, alice) = setup();
        let edge = insert_raw_challenge(&db, "edge", i64::MIN);

        db.accept_challenge(alice, edge).unwrap();
        assert!(matches!(db.fail_challenge(alice, edge), Err(StoreError::Invalid(_))));

        let account = db.get_account(alice).unwrap().unwrap();
        assert_eq!(account.points, 0);
        let rows = db.account_challenges(alice).unwrap();
        assert_eq!(rows[0].0.state, ChallengeState::Accepted);
    }

    #[test]
    fn balance_overflow_is_rejected_before_writing() {
        let (db, alice) = setup();
        let huge = insert_raw_challenge(&db, "huge", i64::MAX);
        let one = insert_raw_challenge(&db, "one", 1);

        db.accept_challenge(alice, huge).unwrap();
        assert_eq!(db.complete_challenge(alice, huge).unwrap().points, i64::MAX);

        db.accept_challenge(alice, one).unwrap();
        assert!(matches!(db.complete_challenge(alice, one), Err(StoreError::Invalid(_))));
        assert_eq!(db.get_account(alice).unwrap().unwrap().points, i64::MAX);

        // Still resolvable the other way.
        assert_eq!(db.fail_challenge(alice, one).unwrap().points, i64::MAX - 1);
    }

    #[test]
    fn resolving_without_accepting_is_not_found() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();

        assert!(matches!(db.complete_challenge(alice, run.id), Err(StoreError::NotFound(_))));
        assert!(matches!(db.fail_challenge(alice, run.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn account_challenges_lists_status_with_challenge() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();
        db.accept_challenge(alice, run.id).unwrap();
        db.complete_challenge(alice, run.id).unwrap();

        let rows = db.account_challenges(alice).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.state, ChallengeState::Completed);
        assert!(rows[0].0.resolved_at.is_some());
        assert_eq!(rows[0].1.description, "Run 5k");
    }

    #[test]
    fn available_challenge_skips_accepted_ones_regardless_of_outcome() {
        let (db, alice) = setup();
        let a = db.create_challenge("a", 10).unwrap();
        let b = db.create_challenge("b", 20).unwrap();
        let c = db.create_challenge("c", 30).unwrap();
        db.create_challenge("d", 100).unwrap();

        db.accept_challenge(alice, a.id).unwrap();
        db.accept_challenge(alice, b.id).unwrap();
        db.fail_challenge(alice, b.id).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let picked = db.available_challenge_with(alice, 10, 30, &mut rng).unwrap().unwrap();
            assert_eq!(picked.id, c.id);
        }

        db.accept_challenge(alice, c.id).unwrap();
        assert!(db.available_challenge(alice, 10, 30).unwrap().is_none());
    }

    #[test]
    fn available_challenge_validates_range_and_account() {
        let (db, alice) = setup();
        db.create_challenge("a", 10).unwrap();

        assert!(matches!(db.available_challenge(alice, 20, 10), Err(StoreError::Invalid(_))));
        assert!(matches!(db.available_challenge(999, 0, 10), Err(StoreError::NotFound(_))));
        assert!(db.available_challenge(alice, 50, 60).unwrap().is_none());
    }

    #[test]
    fn deleting_an_account_drops_its_statuses() {
        let (db, alice) = setup();
        let run = db.create_challenge("Run 5k", 30).unwrap();
        db.accept_challenge(alice, run.id).unwrap();

        db.delete_account(alice).unwrap();
        let remaining: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM challenge_statuses", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
