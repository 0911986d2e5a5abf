//! Administrative force operations.
//!
//! These ignore every time window but still clean up ledgers the same way
//! the normal cancel/delete path does. A match with a confirmed result is
//! refused: rolling a confirmed result back is not supported.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{CoreError, PlatformState};
use crate::ledger;
use crate::models::{Match, MatchId, MatchState, PlayerId, Role};

impl PlatformState {
    /// A result counts as confirmed once the draft, the match or any ledger says so.
    fn check_no_confirmed_result(&self, match_id: &MatchId) -> Result<(), CoreError> {
        let confirmed = self.draft_for_match(match_id).is_some_and(|d| d.confirmed)
            || self
                .get_match(match_id)
                .is_ok_and(|m| m.state == MatchState::Finished)
            || self
                .players
                .values()
                .any(|p| ledger::has_confirmed_entry(p, match_id));
        if confirmed {
            warn!("Refusing force operation on match {} with a confirmed result", match_id);
            return Err(CoreError::conflict(format!(
                "match {} has a confirmed result",
                match_id
            )));
        }
        Ok(())
    }

    /// Cancel a match regardless of time, discarding any unconfirmed draft.
    pub fn force_cancel_match(
        &mut self,
        match_id: &MatchId,
        actor_id: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Match, CoreError> {
        self.require_role(actor_id, Role::Admin)?;
        let game_match = self.get_match(match_id)?;
        if game_match.state == MatchState::Cancelled {
            return Err(CoreError::conflict(format!(
                "match {} is already cancelled",
                match_id
            )));
        }
        self.check_no_confirmed_result(match_id)?;

        let discarded = self.drafts.len();
        self.drafts.retain(|_, d| &d.match_id != match_id);
        if self.drafts.len() < discarded {
            info!("Discarded unconfirmed draft of match {}", match_id);
        }

        self.cancel_match(match_id, now);
        info!("Match {} force-cancelled by {}", match_id, actor_id);
        self.get_match(match_id).cloned()
    }

    /// Delete a match and everything hanging off it, regardless of time.
    pub fn force_delete_match(
        &mut self,
        match_id: &MatchId,
        actor_id: &PlayerId,
    ) -> Result<(), CoreError> {
        self.require_role(actor_id, Role::Admin)?;
        self.get_match(match_id)?;
        self.check_no_confirmed_result(match_id)?;

        self.delete_match(match_id);
        info!("Match {} force-deleted by {}", match_id, actor_id);
        Ok(())
    }
}
