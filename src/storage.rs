//! SQLite storage for the bounty board
//!
//! All winner-field mutations run inside a single transaction, and the
//! connection mutex serializes winner mutations across requests, so no
//! reader ever observes two submissions holding the same position or a
//! half-applied announcement. A partial unique index on
//! (bounty_id, position) backs the uniqueness invariant at the schema
//! level as well.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Bounty, BountyStatus, OrgRole, Submission, SubmissionStatus, Winnings,
};

/// Pool-sum comparison tolerance for batch announcements.
pub const AMOUNT_EPSILON: f64 = 0.01;

/// One entry of a batch winner announcement. Request-shape validation
/// happens in the announcement engine; checks against stored state happen
/// inside the announcement transaction.
#[derive(Debug, Clone)]
pub struct WinnerSlot {
    pub submission_id: String,
    pub position: u32,
    pub amount: f64,
}

pub struct MarketStore {
    conn: Mutex<Connection>,
}

impl MarketStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let migration_sql = include_str!("../migrations/001_schema.sql");
        conn.execute_batch(migration_sql)?;
        info!("Applied migration 001_schema");
        Ok(())
    }

    // ========================================================================
    // ORGANIZATIONS & AUTHORIZATION LOOKUPS
    // ========================================================================

    pub fn create_organization(&self, name: &str) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO organizations (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
        Ok(id)
    }

    pub fn add_member(&self, user_id: &str, org_id: &str, role: OrgRole) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO org_members (user_id, org_id, role) VALUES (?1, ?2, ?3)",
            params![user_id, org_id, role.as_str()],
        )?;
        Ok(())
    }

    pub fn grant_curator(&self, user_id: &str, bounty_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO bounty_curators (user_id, bounty_id) VALUES (?1, ?2)",
            params![user_id, bounty_id],
        )?;
        Ok(())
    }

    /// Organization role held by a user, if any.
    pub fn membership_role(&self, user_id: &str, org_id: &str) -> Result<Option<OrgRole>> {
        let conn = self.conn.lock().unwrap();
        let role: Option<String> = conn
            .query_row(
                "SELECT role FROM org_members WHERE user_id = ?1 AND org_id = ?2",
                params![user_id, org_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(role.as_deref().and_then(OrgRole::parse))
    }

    /// Whether a user holds a curator grant for a specific bounty.
    pub fn is_curator(&self, user_id: &str, bounty_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM bounty_curators WHERE user_id = ?1 AND bounty_id = ?2",
                params![user_id, bounty_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    // ========================================================================
    // BOUNTIES
    // ========================================================================

    pub fn create_bounty(
        &self,
        org_id: &str,
        title: &str,
        token: Option<&str>,
        total_amount: Option<f64>,
        winnings: Option<&Winnings>,
    ) -> Result<Bounty> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let winnings_json = winnings.map(serde_json::to_string).transpose()?;

        conn.execute(
            "INSERT INTO bounties (id, org_id, title, status, token, total_amount, winnings)
             VALUES (?1, ?2, ?3, 'OPEN', ?4, ?5, ?6)",
            params![id, org_id, title, token, total_amount, winnings_json],
        )?;

        let bounty = fetch_bounty(&conn, &id)?
            .ok_or_else(|| anyhow::anyhow!("bounty {} missing after insert", id))?;
        info!("Created bounty {} for org {}", bounty.id, org_id);
        Ok(bounty)
    }

    pub fn get_bounty(&self, id: &str) -> Result<Option<Bounty>> {
        let conn = self.conn.lock().unwrap();
        Ok(fetch_bounty(&conn, id)?)
    }

    /// Lifecycle transitions outside the winner subsystem (e.g. an
    /// organization closing a bounty) go through here.
    pub fn set_bounty_status(&self, id: &str, status: BountyStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE bounties SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            anyhow::bail!("bounty {} not found", id);
        }
        Ok(())
    }

    // ========================================================================
    // SUBMISSIONS
    // ========================================================================

    pub fn create_submission(&self, bounty_id: &str, user_id: &str) -> Result<Submission> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO submissions (id, bounty_id, user_id, status, is_winner, created_at)
             VALUES (?1, ?2, ?3, 'SUBMITTED', 0, ?4)",
            params![id, bounty_id, user_id, Utc::now().to_rfc3339()],
        )?;
        let submission = fetch_submission(&conn, &id)?
            .ok_or_else(|| anyhow::anyhow!("submission {} missing after insert", id))?;
        debug!("Created submission {} on bounty {}", id, bounty_id);
        Ok(submission)
    }

    pub fn get_submission(&self, id: &str) -> Result<Option<Submission>> {
        let conn = self.conn.lock().unwrap();
        Ok(fetch_submission(&conn, id)?)
    }

    /// Review-flow transition; winner fields are untouched here.
    pub fn set_submission_status(&self, id: &str, status: SubmissionStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE submissions SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            anyhow::bail!("submission {} not found", id);
        }
        Ok(())
    }

    /// Current winners of a bounty, ordered by position.
    pub fn winner_submissions(&self, bounty_id: &str) -> Result<Vec<Submission>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, bounty_id, user_id, status, position, winning_amount,
                    winning_amount_usd, is_winner, reviewed_at, created_at
             FROM submissions
             WHERE bounty_id = ?1 AND is_winner = 1
             ORDER BY position ASC",
        )?;
        let submissions = stmt
            .query_map(params![bounty_id], row_to_submission)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(submissions)
    }

    // ========================================================================
    // WINNER MUTATIONS (transactional)
    // ========================================================================

    /// Clear a submission's position and prize fields. `status` is left
    /// untouched.
    pub fn clear_position(&self, submission_id: &str) -> Result<Submission> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;

        tx.execute(
            "UPDATE submissions
             SET position = NULL, winning_amount = NULL, winning_amount_usd = NULL,
                 is_winner = 0
             WHERE id = ?1",
            params![submission_id],
        )?;
        let submission = fetch_submission(&tx, submission_id)?
            .ok_or_else(|| anyhow::anyhow!("submission {} not found", submission_id))?;

        tx.commit()?;
        info!("Cleared position for submission {}", submission_id);
        Ok(submission)
    }

    /// Assign a position to a submission, displacing any other submission
    /// in the same bounty that currently holds it. Returns the updated
    /// submission and whether a displacement occurred. The find-displace-
    /// assign sequence is one transaction.
    pub fn assign_position(
        &self,
        bounty_id: &str,
        submission_id: &str,
        position: u32,
        amount: f64,
        amount_usd: f64,
    ) -> Result<(Submission, bool)> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;

        let holder: Option<String> = tx
            .query_row(
                "SELECT id FROM submissions
                 WHERE bounty_id = ?1 AND position = ?2 AND id != ?3",
                params![bounty_id, position as i64, submission_id],
                |row| row.get(0),
            )
            .optional()?;

        let displaced = holder.is_some();
        if let Some(holder_id) = &holder {
            tx.execute(
                "UPDATE submissions
                 SET position = NULL, winning_amount = NULL, winning_amount_usd = NULL,
                     is_winner = 0
                 WHERE id = ?1",
                params![holder_id],
            )?;
            debug!(
                "Displaced submission {} from position {} on bounty {}",
                holder_id, position, bounty_id
            );
        }

        tx.execute(
            "UPDATE submissions
             SET position = ?1, winning_amount = ?2, winning_amount_usd = ?3,
                 is_winner = 1
             WHERE id = ?4",
            params![position as i64, amount, amount_usd, submission_id],
        )?;
        let submission = fetch_submission(&tx, submission_id)?
            .ok_or_else(|| anyhow::anyhow!("submission {} not found", submission_id))?;

        tx.commit()?;
        info!(
            "Assigned position {} on bounty {} to submission {} ({} / {} USD)",
            position, bounty_id, submission_id, amount, amount_usd
        );
        Ok((submission, displaced))
    }

    /// Apply a full winner slate: wipe the prior winner set, mark each slot,
    /// and move the bounty to COMPLETED, all in one transaction. Returns the
    /// updated bounty and its winner submissions.
    ///
    /// Preconditions that depend on stored state (bounty still accepts
    /// announcements, every slot names an APPROVED submission of this
    /// bounty, amounts sum to the pool) are checked here, inside the
    /// transaction, against what the database holds at apply time rather
    /// than against a caller's earlier read.
    pub fn apply_announcement(
        &self,
        bounty_id: &str,
        slots: &[WinnerSlot],
    ) -> Result<(Bounty, Vec<Submission>), ApiError> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;
        let now = Utc::now().to_rfc3339();

        let bounty = fetch_bounty(&tx, bounty_id)?
            .ok_or_else(|| ApiError::NotFound("Bounty not found".to_string()))?;
        if !bounty.status.accepts_announcement() {
            return Err(ApiError::invalid(format!(
                "Bounty is {} and no longer accepts winner announcements",
                bounty.status.as_str()
            )));
        }

        for slot in slots {
            let submission = fetch_submission(&tx, &slot.submission_id)?
                .filter(|s| s.bounty_id == bounty_id);
            match submission {
                Some(s) if s.status == SubmissionStatus::Approved => {}
                Some(_) => {
                    return Err(ApiError::invalid(format!(
                        "Submission {} is not APPROVED",
                        slot.submission_id
                    )))
                }
                None => {
                    return Err(ApiError::invalid(format!(
                        "Submission {} does not belong to this bounty",
                        slot.submission_id
                    )))
                }
            }
        }

        let requested_total: f64 = slots.iter().map(|s| s.amount).sum();
        let pool = bounty.total_pool();
        if (requested_total - pool).abs() > AMOUNT_EPSILON {
            return Err(ApiError::invalid_field(
                format!(
                    "Winner amounts total {} but the prize pool is {}",
                    requested_total, pool
                ),
                "winners",
                "amounts must sum to the prize pool",
            ));
        }

        // Unconditionally wipe the prior winner set, whatever its overlap
        // with the new slate.
        let wiped = tx.execute(
            "UPDATE submissions
             SET is_winner = 0, position = NULL, winning_amount = NULL,
                 winning_amount_usd = NULL
             WHERE bounty_id = ?1 AND is_winner = 1",
            params![bounty_id],
        )?;
        if wiped > 0 {
            debug!("Wiped {} prior winners on bounty {}", wiped, bounty_id);
        }

        for slot in slots {
            tx.execute(
                "UPDATE submissions
                 SET is_winner = 1, position = ?1, winning_amount = ?2,
                     status = 'APPROVED', reviewed_at = ?3
                 WHERE id = ?4",
                params![slot.position as i64, slot.amount, now, slot.submission_id],
            )?;
        }

        tx.execute(
            "UPDATE bounties SET status = 'COMPLETED', winners_announced_at = ?1 WHERE id = ?2",
            params![now, bounty_id],
        )?;

        let bounty = fetch_bounty(&tx, bounty_id)?
            .ok_or_else(|| anyhow::anyhow!("bounty {} not found", bounty_id))?;

        let mut stmt = tx.prepare(
            "SELECT id, bounty_id, user_id, status, position, winning_amount,
                    winning_amount_usd, is_winner, reviewed_at, created_at
             FROM submissions
             WHERE bounty_id = ?1 AND is_winner = 1
             ORDER BY position ASC",
        )?;
        let winners = stmt
            .query_map(params![bounty_id], row_to_submission)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        tx.commit()?;
        info!(
            "Announced {} winners on bounty {} (wiped {} prior)",
            slots.len(),
            bounty_id,
            wiped
        );
        Ok((bounty, winners))
    }

    /// Revert every APPROVED submission of a bounty to SUBMITTED with all
    /// winner fields cleared. Returns the affected submission ids.
    pub fn reset_approved(&self, bounty_id: &str) -> Result<Vec<String>> {
        let mut guard = self.conn.lock().unwrap();
        let tx = guard.transaction()?;

        let mut stmt = tx.prepare(
            "SELECT id FROM submissions WHERE bounty_id = ?1 AND status = 'APPROVED'",
        )?;
        let affected = stmt
            .query_map(params![bounty_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        if affected.is_empty() {
            return Ok(affected);
        }

        tx.execute(
            "UPDATE submissions
             SET status = 'SUBMITTED', position = NULL, winning_amount = NULL,
                 winning_amount_usd = NULL, is_winner = 0, reviewed_at = ?1
             WHERE bounty_id = ?2 AND status = 'APPROVED'",
            params![Utc::now().to_rfc3339(), bounty_id],
        )?;

        tx.commit()?;
        info!(
            "Reset {} approved submissions on bounty {}",
            affected.len(),
            bounty_id
        );
        Ok(affected)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn parse_datetime(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, format!("bad timestamp {:?}: {}", raw, e)))
}

fn row_to_submission(row: &Row<'_>) -> rusqlite::Result<Submission> {
    let status_raw: String = row.get(3)?;
    let status = SubmissionStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(3, format!("unknown submission status {:?}", status_raw)))?;

    let reviewed_at = row
        .get::<_, Option<String>>(8)?
        .map(|raw| parse_datetime(8, raw))
        .transpose()?;

    Ok(Submission {
        id: row.get(0)?,
        bounty_id: row.get(1)?,
        user_id: row.get(2)?,
        status,
        position: row.get::<_, Option<i64>>(4)?.map(|p| p as u32),
        winning_amount: row.get(5)?,
        winning_amount_usd: row.get(6)?,
        is_winner: row.get::<_, i64>(7)? != 0,
        reviewed_at,
        created_at: parse_datetime(9, row.get::<_, String>(9)?)?,
    })
}

fn row_to_bounty(row: &Row<'_>) -> rusqlite::Result<Bounty> {
    let status_raw: String = row.get(3)?;
    let status = BountyStatus::parse(&status_raw)
        .ok_or_else(|| conversion_err(3, format!("unknown bounty status {:?}", status_raw)))?;

    let winnings = row
        .get::<_, Option<String>>(6)?
        .map(|raw| {
            serde_json::from_str::<Winnings>(&raw)
                .map_err(|e| conversion_err(6, format!("bad winnings table: {}", e)))
        })
        .transpose()?;

    let winners_announced_at = row
        .get::<_, Option<String>>(7)?
        .map(|raw| parse_datetime(7, raw))
        .transpose()?;

    Ok(Bounty {
        id: row.get(0)?,
        org_id: row.get(1)?,
        title: row.get(2)?,
        status,
        token: row.get(4)?,
        total_amount: row.get(5)?,
        winnings,
        winners_announced_at,
    })
}

fn fetch_bounty(conn: &Connection, id: &str) -> rusqlite::Result<Option<Bounty>> {
    conn.query_row(
        "SELECT id, org_id, title, status, token, total_amount, winnings, winners_announced_at
         FROM bounties WHERE id = ?1",
        params![id],
        row_to_bounty,
    )
    .optional()
}

fn fetch_submission(conn: &Connection, id: &str) -> rusqlite::Result<Option<Submission>> {
    conn.query_row(
        "SELECT id, bounty_id, user_id, status, position, winning_amount,
                winning_amount_usd, is_winner, reviewed_at, created_at
         FROM submissions WHERE id = ?1",
        params![id],
        row_to_submission,
    )
    .optional()
}
