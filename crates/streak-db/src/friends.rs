use rusqlite::{Connection, params};
use tracing::info;

use crate::Database;
use crate::error::{Result, StoreError};
use crate::models::{ACCOUNT_COLUMNS, AccountRow};
use crate::queries::{collect_accounts, require_account};

impl Database {
    /// Create a pending request from `sender_id` to `receiver_id`.
    pub fn send_friend_request(&self, sender_id: i64, receiver_id: i64) -> Result<()> {
        if sender_id == receiver_id {
            return Err(StoreError::Invalid("Cannot send a friend request to yourself.".into()));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            require_account(&tx, sender_id)?;
            require_account(&tx, receiver_id)?;

            if request_exists(&tx, sender_id, receiver_id)? {
                return Err(StoreError::Conflict("Friend request already sent.".into()));
            }
            if are_friends(&tx, sender_id, receiver_id)? {
                return Err(StoreError::Conflict("Already friends.".into()));
            }

            tx.execute(
                "INSERT INTO friend_requests (sender_id, receiver_id) VALUES (?1, ?2)",
                params![sender_id, receiver_id],
            )?;
            tx.commit()?;

            info!("Friend request {} -> {}", sender_id, receiver_id);
            Ok(())
        })
    }

    /// Promote the pending request `sender_id -> receiver_id` into a
    /// friendship stored in both directions.
    pub fn accept_friend_request(&self, sender_id: i64, receiver_id: i64) -> Result<()> {
        if sender_id == receiver_id {
            return Err(StoreError::Invalid("Cannot accept a friend request from yourself.".into()));
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if !request_exists(&tx, sender_id, receiver_id)? {
                return Err(StoreError::NotFound("Friend request not found."));
            }

            // OR IGNORE: existing friendship rows are left as they are.
            tx.execute(
                "INSERT OR IGNORE INTO friendships (account_id, friend_id) VALUES (?1, ?2), (?2, ?1)",
                params![sender_id, receiver_id],
            )?;
            delete_request(&tx, sender_id, receiver_id)?;
            // A crossed request in the other direction is settled too.
            delete_request(&tx, receiver_id, sender_id)?;
            tx.commit()?;

            info!("Friend request {} -> {} accepted", sender_id, receiver_id);
            Ok(())
        })
    }

    pub fn reject_friend_request(&self, sender_id: i64, receiver_id: i64) -> Result<()> {
        if sender_id == receiver_id {
            return Err(StoreError::Invalid("Cannot reject a friend request from yourself.".into()));
        }

        self.with_conn(|conn| {
            if delete_request(conn, sender_id, receiver_id)? == 0 {
                return Err(StoreError::NotFound("Friend request not found."));
            }

            info!("Friend request {} -> {} rejected", sender_id, receiver_id);
            Ok(())
        })
    }

    pub fn friends_of(&self, account_id: i64) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            require_account(conn, account_id)?;
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM friendships f
                 JOIN accounts a ON a.id = f.friend_id
                 WHERE f.account_id = ?1
                 ORDER BY a.username"
            );
            collect_accounts(conn, &sql, [account_id])
        })
    }

    /// Accounts that `account_id` has a pending request out to.
    pub fn sent_friend_requests(&self, account_id: i64) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            require_account(conn, account_id)?;
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM friend_requests r
                 JOIN accounts a ON a.id = r.receiver_id
                 WHERE r.sender_id = ?1
                 ORDER BY r.created_at, a.id"
            );
            collect_accounts(conn, &sql, [account_id])
        })
    }

    /// Accounts with a pending request addressed to `account_id`.
    pub fn received_friend_requests(&self, account_id: i64) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            require_account(conn, account_id)?;
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM friend_requests r
                 JOIN accounts a ON a.id = r.sender_id
                 WHERE r.receiver_id = ?1
                 ORDER BY r.created_at, a.id"
            );
            collect_accounts(conn, &sql, [account_id])
        })
    }
}

fn request_exists(conn: &Connection, sender_id: i64, receiver_id: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2)",
        params![sender_id, receiver_id],
        |r| r.get(0),
    )?)
}

fn are_friends(conn: &Connection, a: i64, b: i64) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM friendships WHERE account_id = ?1 AND friend_id = ?2)",
        params![a, b],
        |r| r.get(0),
    )?)
}

fn delete_request(conn: &Connection, sender_id: i64, receiver_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM friend_requests WHERE sender_id = ?1 AND receiver_id = ?2",
        params![sender_id, receiver_id],
    )?)
}
