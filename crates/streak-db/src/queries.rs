use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use streak_types::models::{MAX_CHALLENGE_POINTS, points_in_range};

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{ACCOUNT_COLUMNS, AccountRow, CHALLENGE_COLUMNS, ChallengeRow, NewAccount};

impl Database {
    // -- Accounts --

    pub fn create_account(&self, new: &NewAccount) -> Result<AccountRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if email_taken(&tx, &new.email, None)? {
                return Err(StoreError::Conflict("Email already registered".into()));
            }
            if username_taken(&tx, &new.username, None)? {
                return Err(StoreError::Conflict("Username already taken".into()));
            }

            tx.execute(
                "INSERT INTO accounts (email, username, password, first_name, last_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.email, new.username, new.password_hash, new.first_name, new.last_name],
            )?;
            let id = tx.last_insert_rowid();
            let row = query_account(&tx, id)?.ok_or(StoreError::NotFound("Account not found"))?;

            tx.commit()?;
            info!("Account {} created ({})", row.id, row.username);
            Ok(row)
        })
    }

    pub fn get_account(&self, id: i64) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, id))
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.email = ?1");
            Ok(conn.query_row(&sql, [email], AccountRow::from_row).optional()?)
        })
    }

    pub fn list_accounts(&self, skip: u32, limit: u32) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a ORDER BY a.id LIMIT ?1 OFFSET ?2");
            collect_accounts(conn, &sql, params![limit, skip])
        })
    }

    /// Returns `false` when no account had that id.
    pub fn delete_account(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
            if removed > 0 {
                info!("Account {} deleted", id);
            }
            Ok(removed > 0)
        })
    }

    pub fn update_username(&self, id: i64, username: &str) -> Result<AccountRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_account(&tx, id)?.is_none() {
                return Err(StoreError::NotFound("Account not found"));
            }
            if username_taken(&tx, username, Some(id))? {
                return Err(StoreError::Conflict("Username already taken".into()));
            }

            tx.execute("UPDATE accounts SET username = ?1 WHERE id = ?2", params![username, id])?;
            let row = query_account(&tx, id)?.ok_or(StoreError::NotFound("Account not found"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn update_email(&self, id: i64, email: &str) -> Result<AccountRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_account(&tx, id)?.is_none() {
                return Err(StoreError::NotFound("Account not found"));
            }
            if email_taken(&tx, email, Some(id))? {
                return Err(StoreError::Conflict("Email already registered".into()));
            }

            tx.execute("UPDATE accounts SET email = ?1 WHERE id = ?2", params![email, id])?;
            let row = query_account(&tx, id)?.ok_or(StoreError::NotFound("Account not found"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Case-sensitive substring match on the username.
    pub fn search_accounts(&self, fragment: &str) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE instr(a.username, ?1) > 0 ORDER BY a.id"
            );
            collect_accounts(conn, &sql, params![fragment])
        })
    }

    /// Accounts by points, highest first. Ties go to the older account.
    pub fn leaderboard(&self, skip: u32, limit: u32) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts a
                 ORDER BY a.points DESC, a.id ASC
                 LIMIT ?1 OFFSET ?2"
            );
            collect_accounts(conn, &sql, params![limit, skip])
        })
    }

    // -- Challenges --

    pub fn create_challenge(&self, description: &str, points: i64) -> Result<ChallengeRow> {
        if !points_in_range(points) {
            return Err(StoreError::Invalid(format!(
                "Challenge points must be between -{MAX_CHALLENGE_POINTS} and {MAX_CHALLENGE_POINTS}"
            )));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM challenges WHERE description = ?1)",
                [description],
                |r| r.get(0),
            )?;
            if exists {
                return Err(StoreError::Conflict("Challenge already exists".into()));
            }

            tx.execute(
                "INSERT INTO challenges (description, points) VALUES (?1, ?2)",
                params![description, points],
            )?;
            let id = tx.last_insert_rowid();
            let row = query_challenge(&tx, id)?.ok_or(StoreError::NotFound("Challenge not found"))?;
            tx.commit()?;

            info!("Challenge {} created ({} points)", row.id, row.points);
            Ok(row)
        })
    }

    pub fn get_challenge(&self, id: i64) -> Result<Option<ChallengeRow>> {
        self.with_conn(|conn| query_challenge(conn, id))
    }

    pub fn list_challenges(&self, skip: u32, limit: u32) -> Result<Vec<ChallengeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges c ORDER BY c.id LIMIT ?1 OFFSET ?2");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit, skip], ChallengeRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_account(conn: &Connection, id: i64) -> Result<Option<AccountRow>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts a WHERE a.id = ?1");
    Ok(conn.query_row(&sql, [id], AccountRow::from_row).optional()?)
}

pub(crate) fn query_challenge(conn: &Connection, id: i64) -> Result<Option<ChallengeRow>> {
    let sql = format!("SELECT {CHALLENGE_COLUMNS} FROM challenges c WHERE c.id = ?1");
    Ok(conn.query_row(&sql, [id], ChallengeRow::from_row).optional()?)
}

pub(crate) fn require_account(conn: &Connection, id: i64) -> Result<AccountRow> {
    query_account(conn, id)?.ok_or(StoreError::NotFound("Account not found"))
}

pub(crate) fn collect_accounts<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<AccountRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, AccountRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn email_taken(conn: &Connection, email: &str, except: Option<i64>) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?1 AND id IS NOT ?2)",
        params![email, except],
        |r| r.get(0),
    )?)
}

fn username_taken(conn: &Connection, username: &str, except: Option<i64>) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?1 AND id IS NOT ?2)",
        params![username, except],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn new_account(name: &str) -> NewAccount {
        NewAccount {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn create_account_starts_with_zero_points() {
        let db = Database::open_in_memory().unwrap();
        let row = db.create_account(&new_account("alice")).unwrap();
        assert_eq!(row.points, 0);
        assert_eq!(row.email, "alice@example.com");
        assert!(db.get_account(row.id).unwrap().is_some());
    }

    #[test]
    fn duplicate_email_or_username_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_account(&new_account("alice")).unwrap();

        let mut same_email = new_account("bob");
        same_email.email = "alice@example.com".into();
        match db.create_account(&same_email) {
            Err(StoreError::Conflict(msg)) => assert_eq!(msg, "Email already registered"),
            other => panic!("expected conflict, got {other:?}"),
        }

        let mut same_name = new_account("alice");
        same_name.email = "other@example.com".into();
        assert!(matches!(db.create_account(&same_name), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn updates_keep_uniqueness_but_allow_own_value() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_account(&new_account("alice")).unwrap();
        db.create_account(&new_account("bob")).unwrap();

        assert!(matches!(db.update_username(alice.id, "bob"), Err(StoreError::Conflict(_))));
        assert_eq!(db.update_username(alice.id, "alice").unwrap().username, "alice");
        assert_eq!(db.update_username(alice.id, "alicia").unwrap().username, "alicia");

        assert!(matches!(
            db.update_email(alice.id, "bob@example.com"),
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(db.update_email(alice.id, "a@x.io").unwrap().email, "a@x.io");
        assert!(matches!(db.update_email(999, "z@x.io"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_reports_whether_a_row_was_removed() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_account(&new_account("alice")).unwrap();
        assert!(db.delete_account(alice.id).unwrap());
        assert!(!db.delete_account(alice.id).unwrap());
        assert!(db.get_account(alice.id).unwrap().is_none());
    }

    #[test]
    fn search_matches_substrings() {
        let db = Database::open_in_memory().unwrap();
        db.create_account(&new_account("runner42")).unwrap();
        db.create_account(&new_account("walker")).unwrap();
        db.create_account(&new_account("frontrunner")).unwrap();

        let names: Vec<_> = db
            .search_accounts("runner")
            .unwrap()
            .into_iter()
            .map(|r| r.username)
            .collect();
        assert_eq!(names, vec!["runner42", "frontrunner"]);
        assert!(db.search_accounts("%").unwrap().is_empty());
    }

    #[test]
    fn leaderboard_orders_by_points_descending() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_account(&new_account("a")).unwrap();
        let b = db.create_account(&new_account("b")).unwrap();
        let c = db.create_account(&new_account("c")).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE accounts SET points = 5 WHERE id = ?1", [a.id])?;
            conn.execute("UPDATE accounts SET points = 20 WHERE id = ?1", [b.id])?;
            conn.execute("UPDATE accounts SET points = 5 WHERE id = ?1", [c.id])?;
            Ok(())
        })
        .unwrap();

        let ids: Vec<_> = db.leaderboard(0, 10).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);

        let page: Vec<_> = db.leaderboard(1, 1).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(page, vec![a.id]);
    }

    #[test]
    fn challenge_descriptions_are_unique() {
        let db = Database::open_in_memory().unwrap();
        let row = db.create_challenge("Run 5k", 50).unwrap();
        assert_eq!(row.points, 50);
        assert!(matches!(db.create_challenge("Run 5k", 10), Err(StoreError::Conflict(_))));
        assert_eq!(db.list_challenges(0, 10).unwrap().len(), 1);
    }

    #[test]
    fn challenge_points_outside_the_bound_are_invalid() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.create_challenge("low", i64::MIN), Err(StoreError::Invalid(_))));
        assert!(matches!(db.create_challenge("high", i64::MAX), Err(StoreError::Invalid(_))));
        assert!(db.list_challenges(0, 10).unwrap().is_empty());
    }
}
