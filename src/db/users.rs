//! Singleton user row: XP accumulation and level persistence.

use super::{DEFAULT_USERNAME, Database};
use crate::error::ApiError;
use crate::types::User;
use anyhow::Result;
use rusqlite::{Connection, Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        xp: row.get("xp")?,
        level: row.get("level")?,
        created_at: row.get("created_at")?,
    })
}

fn get_user_internal(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;

    let result = stmt.query_row(params![user_id], parse_user_row);

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Get a user by ID.
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Get a user by username.
    pub fn get_user_by_name(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE username = ?1")?;

            let result = stmt.query_row(params![username], parse_user_row);

            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Get the implicit single user seeded at startup.
    pub fn default_user(&self) -> Result<User> {
        self.get_user_by_name(DEFAULT_USERNAME)?
            .ok_or_else(|| ApiError::user_not_found(DEFAULT_USERNAME).into())
    }

    /// Add XP to a user with an in-storage increment, so two concurrent
    /// awards cannot lose an update, and return the fresh row. The returned
    /// `level` is still the pre-award value; the caller decides whether to
    /// persist an increase via [`Database::set_level`].
    pub fn add_xp(&self, user_id: i64, amount: i64) -> Result<User> {
        if amount < 0 {
            return Err(ApiError::invariant(format!(
                "refusing to award negative xp ({}) to user {}",
                amount, user_id
            ))
            .into());
        }

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET xp = xp + ?1 WHERE id = ?2",
                params![amount, user_id],
            )?;
            if updated == 0 {
                return Err(ApiError::user_not_found(&user_id.to_string()).into());
            }

            get_user_internal(conn, user_id)?
                .ok_or_else(|| ApiError::user_not_found(&user_id.to_string()).into())
        })
    }

    /// Persist a recomputed level.
    pub fn set_level(&self, user_id: i64, level: i64) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET level = ?1 WHERE id = ?2",
                params![level, user_id],
            )?;
            if updated == 0 {
                return Err(ApiError::user_not_found(&user_id.to_string()).into());
            }
            Ok(())
        })
    }
}
