//! One conversation turn: pending handshake or intent extraction.

use chrono::Local;

use rollcall_core::dates::extract_date_refs;
use rollcall_db::pending::PendingAction;
use rollcall_db::users::User;
use rollcall_db::{Db, StoreError};
use rollcall_llm::{IntentParser, IntentRequest};

use crate::{dispatch, format};

const MSG_UNREGISTERED: &str = "I couldn't find you. Please register first.";
const MSG_CANCELLED: &str = "Action cancelled.";
const MSG_ALREADY_HANDLED: &str = "That action was already handled.";
const MSG_PARSE_FAILED: &str = "Sorry, there was an error processing your request.";
const MSG_EXEC_FAILED: &str = "Sorry, there was an error performing the action.";

/// One-turn conversation handler. Generic over the intent parser so tests
/// can script the model instead of calling one.
#[derive(Clone)]
pub struct BotEngine<P> {
    db: Db,
    parser: P,
}

impl<P: IntentParser> BotEngine<P> {
    pub fn new(db: Db, parser: P) -> Self {
        Self { db, parser }
    }

    /// Handle one inbound message and produce the reply text.
    ///
    /// With an active pending action the message is treated as its yes/no
    /// resolution; otherwise it goes through intent extraction and becomes
    /// the next pending action.
    pub async fn handle_message(&self, contact_id: &str, text: &str) -> String {
        let user = match self.db.user_by_contact(contact_id) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return MSG_UNREGISTERED.to_string(),
            Err(e) => {
                tracing::error!(contact_id, "user lookup failed: {e}");
                return MSG_EXEC_FAILED.to_string();
            }
        };
        tracing::info!(contact_id, user = %user.name, "handling message");

        match self.db.active_pending(contact_id) {
            Ok(Some(pending)) => self.resolve_pending(&user, &pending, text),
            Ok(None) => self.extract_intent(&user, contact_id, text).await,
            Err(e) => {
                tracing::error!(contact_id, "pending lookup failed: {e}");
                MSG_EXEC_FAILED.to_string()
            }
        }
    }

    fn resolve_pending(&self, user: &User, pending: &PendingAction, text: &str) -> String {
        let confirmed = matches!(text.trim().to_lowercase().as_str(), "yes" | "y");
        if !confirmed {
            if let Err(e) = self.db.cancel_pending(pending.id) {
                // Lost a race against another delivery; the cancel reply is
                // still the honest one for this turn.
                tracing::warn!(id = pending.id, "cancel skipped: {e}");
            }
            return MSG_CANCELLED.to_string();
        }

        // Conditional transition: only the delivery that wins it executes
        // the side effects.
        match self.db.confirm_pending(pending.id) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return MSG_ALREADY_HANDLED.to_string(),
            Err(e) => {
                tracing::error!(id = pending.id, "confirm failed: {e}");
                return MSG_EXEC_FAILED.to_string();
            }
        }

        let set = match pending.action_set() {
            Ok(set) => set,
            Err(e) => {
                tracing::error!(id = pending.id, "corrupt pending payload: {e}");
                return MSG_EXEC_FAILED.to_string();
            }
        };

        dispatch::dispatch(&self.db, user, &set).join("\n")
    }

    async fn extract_intent(&self, user: &User, contact_id: &str, text: &str) -> String {
        let today = Local::now().date_naive();
        let date_refs = extract_date_refs(text, today);
        let timetable_summary = format::weekly_summary(&self.db, user.id);

        let req = IntentRequest {
            contact_id: contact_id.to_string(),
            message: text.to_string(),
            timetable_summary,
            date_refs,
        };
        let set = match self.parser.parse(&req).await {
            Ok(set) => set,
            Err(e) => {
                tracing::error!(contact_id, "intent extraction failed: {e}");
                return MSG_PARSE_FAILED.to_string();
            }
        };

        match self.db.create_pending(contact_id, &set) {
            Ok(pending) => pending.confirmation_message,
            Err(e) => {
                tracing::error!(contact_id, "buffering action set failed: {e}");
                MSG_PARSE_FAILED.to_string()
            }
        }
    }
}
