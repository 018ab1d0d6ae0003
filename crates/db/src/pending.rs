//! Pending-action lifecycle: the confirmation gate in front of every
//! mutating intent.
//!
//! State machine per contact: none → pending → {confirmed, cancelled}.
//! Creating a new pending action supersedes the previous one, and
//! confirm/cancel are compare-and-swap transitions so the loser of a raced
//! duplicate delivery gets a conflict instead of a double execution.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};

use rollcall_core::ActionSet;
use rollcall_core::types::UnknownVariant;

use crate::{Db, Result, StoreError, conv_err};

/// How long a pending action stays confirmable, in minutes.
pub const PENDING_TTL_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Pending => "pending",
            PendingStatus::Confirmed => "confirmed",
            PendingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for PendingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PendingStatus::Pending),
            "confirmed" => Ok(PendingStatus::Confirmed),
            "cancelled" => Ok(PendingStatus::Cancelled),
            _ => Err(UnknownVariant::new("pending status", s)),
        }
    }
}

/// A buffered action set awaiting the user's yes/no reply.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub id: i64,
    pub contact_id: String,
    /// Serialized [`ActionSet`].
    pub payload: String,
    pub confirmation_message: String,
    pub status: PendingStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    /// Deserialize the buffered action set.
    pub fn action_set(&self) -> serde_json::Result<ActionSet> {
        serde_json::from_str(&self.payload)
    }
}

impl Db {
    /// Buffer a new action set for confirmation, superseding any action
    /// still pending for this contact.
    pub fn create_pending(&self, contact_id: &str, set: &ActionSet) -> Result<PendingAction> {
        let payload = serde_json::to_string(set)
            .map_err(|e| StoreError::invalid(format!("unserializable action set: {e}")))?;
        let now = Utc::now();
        let expires = now + Duration::minutes(PENDING_TTL_MINUTES);

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let superseded = tx.execute(
            "UPDATE pending_actions SET status = 'cancelled' \
             WHERE contact_id = ?1 AND status = 'pending'",
            params![contact_id],
        )?;
        if superseded > 0 {
            tracing::info!(contact_id, "superseded existing pending action");
        }
        tx.execute(
            "INSERT INTO pending_actions \
             (contact_id, payload, confirmation_message, status, created_at, expires_at) \
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
            params![
                contact_id,
                payload,
                set.confirmation_message,
                now.to_rfc3339(),
                expires.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(PendingAction {
            id,
            contact_id: contact_id.to_string(),
            payload,
            confirmation_message: set.confirmation_message.clone(),
            status: PendingStatus::Pending,
            created_at: now,
            expires_at: expires,
        })
    }

    /// The active (unexpired, still pending) action for a contact, if any.
    ///
    /// Expired rows are invisible here but stay in the table until purged;
    /// expiry is a lookup-time check, not a background sweep.
    pub fn active_pending(&self, contact_id: &str) -> Result<Option<PendingAction>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, contact_id, payload, confirmation_message, status, created_at, expires_at \
                 FROM pending_actions WHERE contact_id = ?1 AND status = 'pending'",
                params![contact_id],
                row_to_pending,
            )
            .optional()?;
        Ok(row.filter(|p| p.expires_at > Utc::now()))
    }

    /// Transition pending → confirmed. Conflict if the row is no longer
    /// pending (already resolved by a raced duplicate delivery).
    pub fn confirm_pending(&self, id: i64) -> Result<()> {
        self.transition_pending(id, PendingStatus::Confirmed)
    }

    /// Transition pending → cancelled.
    pub fn cancel_pending(&self, id: i64) -> Result<()> {
        self.transition_pending(id, PendingStatus::Cancelled)
    }

    fn transition_pending(&self, id: i64, to: PendingStatus) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE pending_actions SET status = ?1 WHERE id = ?2 AND status = 'pending'",
            params![to.as_str(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::conflict("This action is no longer pending"));
        }
        tracing::debug!(id, status = to.as_str(), "pending action resolved");
        Ok(())
    }

    /// Delete expired rows that never got confirmed. Storage hygiene only;
    /// the lifecycle is correct without it.
    pub fn purge_expired_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM pending_actions WHERE status != 'confirmed' AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(affected)
    }
}

fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingAction> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let expires_at: String = row.get(6)?;
    Ok(PendingAction {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        payload: row.get(2)?,
        confirmation_message: row.get(3)?,
        status: status.parse().map_err(|e| conv_err(4, e))?,
        created_at: parse_instant(5, &created_at)?,
        expires_at: parse_instant(6, &expires_at)?,
    })
}

fn parse_instant(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conv_err(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::action::{Action, ActionParams, ActionSet, HttpMethod, Intent};

    fn sample_set(message: &str) -> ActionSet {
        ActionSet {
            actions: vec![Action {
                intent: Intent::GetAttendanceStats,
                method: HttpMethod::Get,
                params: ActionParams::default(),
            }],
            confirmation_message: message.to_string(),
        }
    }

    fn expire(db: &Db, id: i64) {
        let past = (Utc::now() - Duration::minutes(1)).to_rfc3339();
        db.conn()
            .execute(
                "UPDATE pending_actions SET expires_at = ?1 WHERE id = ?2",
                params![past, id],
            )
            .unwrap();
    }

    #[test]
    fn create_and_lookup_active() {
        let db = Db::open_in_memory().unwrap();
        let created = db.create_pending("tg-1", &sample_set("Confirm?")).unwrap();
        assert_eq!(created.status, PendingStatus::Pending);
        assert!(created.expires_at > created.created_at);

        let active = db.active_pending("tg-1").unwrap().unwrap();
        assert_eq!(active.id, created.id);
        assert_eq!(active.confirmation_message, "Confirm?");

        // Other contacts see nothing.
        assert!(db.active_pending("tg-2").unwrap().is_none());
    }

    #[test]
    fn payload_round_trips_the_action_set() {
        let db = Db::open_in_memory().unwrap();
        db.create_pending("tg-1", &sample_set("Confirm?")).unwrap();
        let active = db.active_pending("tg-1").unwrap().unwrap();
        let set = active.action_set().unwrap();
        assert_eq!(set.actions.len(), 1);
        assert_eq!(set.actions[0].intent, Intent::GetAttendanceStats);
    }

    #[test]
    fn new_pending_supersedes_the_old_one() {
        let db = Db::open_in_memory().unwrap();
        let first = db.create_pending("tg-1", &sample_set("First?")).unwrap();
        let second = db.create_pending("tg-1", &sample_set("Second?")).unwrap();

        let active = db.active_pending("tg-1").unwrap().unwrap();
        assert_eq!(active.id, second.id);

        let pending_rows: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM pending_actions WHERE status = 'pending'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(pending_rows, 1);

        let first_status: String = db
            .conn()
            .query_row(
                "SELECT status FROM pending_actions WHERE id = ?1",
                params![first.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(first_status, "cancelled");
    }

    #[test]
    fn expired_rows_are_invisible_but_kept() {
        let db = Db::open_in_memory().unwrap();
        let created = db.create_pending("tg-1", &sample_set("Confirm?")).unwrap();
        expire(&db, created.id);

        assert!(db.active_pending("tg-1").unwrap().is_none());
        let rows: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM pending_actions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn confirm_is_a_one_shot_transition() {
        let db = Db::open_in_memory().unwrap();
        let created = db.create_pending("tg-1", &sample_set("Confirm?")).unwrap();

        db.confirm_pending(created.id).unwrap();
        // The raced second delivery loses.
        assert!(matches!(
            db.confirm_pending(created.id),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            db.cancel_pending(created.id),
            Err(StoreError::Conflict(_))
        ));
        assert!(db.active_pending("tg-1").unwrap().is_none());
    }

    #[test]
    fn cancel_transitions_and_clears_active() {
        let db = Db::open_in_memory().unwrap();
        let created = db.create_pending("tg-1", &sample_set("Confirm?")).unwrap();
        db.cancel_pending(created.id).unwrap();
        assert!(db.active_pending("tg-1").unwrap().is_none());
    }

    #[test]
    fn purge_drops_expired_unconfirmed_rows_only() {
        let db = Db::open_in_memory().unwrap();

        let expired = db.create_pending("tg-1", &sample_set("Old?")).unwrap();
        expire(&db, expired.id);

        let confirmed = db.create_pending("tg-2", &sample_set("Done?")).unwrap();
        db.confirm_pending(confirmed.id).unwrap();
        expire(&db, confirmed.id);

        db.create_pending("tg-3", &sample_set("Live?")).unwrap();

        let purged = db.purge_expired_pending(Utc::now()).unwrap();
        assert_eq!(purged, 1);

        assert!(db.active_pending("tg-3").unwrap().is_some());
        let remaining: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM pending_actions", [], |row| row.get(0))
            .unwrap();
        // The confirmed row is history, the live one is active.
        assert_eq!(remaining, 2);
        assert!(db.active_pending("tg-1").unwrap().is_none());
    }

    #[test]
    fn supersession_chain_keeps_exactly_one_active() {
        let db = Db::open_in_memory().unwrap();
        for i in 0..4 {
            db.create_pending("tg-1", &sample_set(&format!("Round {i}?")))
                .unwrap();
        }
        let active = db.active_pending("tg-1").unwrap().unwrap();
        assert_eq!(active.confirmation_message, "Round 3?");
    }
}
